use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::IntakeConfig;

use super::blueprint::FlowBlueprint;
use super::coordinator::SubmissionReceipt;
use super::domain::{ApplicationRecord, FlowKind, SubjectId, UploadSlot};
use super::session::{IntakeCollaborators, IntakeError, IntakeSession};
use super::uploads::FileBlob;
use super::view::SessionView;

/// Handle of a mounted intake session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

static SESSION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_session_id() -> SessionId {
    let id = SESSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    SessionId(format!("intake-{id:06}"))
}

/// Request to mount a new session, optionally hydrated from an existing profile.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenSession {
    pub flow: FlowKind,
    pub subject_id: SubjectId,
    #[serde(default)]
    pub profile: Option<ApplicationRecord>,
}

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("intake session '{0}' does not exist")]
    UnknownSession(SessionId),
    #[error(transparent)]
    Intake(#[from] IntakeError),
}

/// A mounted session plus the background uploads the host drives for it.
#[derive(Debug)]
pub struct SessionEntry {
    pub session: Mutex<IntakeSession>,
    uploads: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionEntry {
    fn new(session: IntakeSession) -> Self {
        Self {
            session: Mutex::new(session),
            uploads: Mutex::new(Vec::new()),
        }
    }

    /// Wait for every upload the host spawned for this session.
    pub async fn settle_uploads(&self) {
        let handles = std::mem::take(&mut *self.uploads.lock().await);
        for outcome in join_all(handles).await {
            if let Err(error) = outcome {
                warn!(%error, "background upload task did not complete");
            }
        }
    }
}

/// Owns every mounted intake session and the collaborators they share.
#[derive(Debug)]
pub struct IntakeHost {
    collaborators: IntakeCollaborators,
    settings: IntakeConfig,
    sessions: Mutex<HashMap<SessionId, Arc<SessionEntry>>>,
}

impl IntakeHost {
    pub fn new(collaborators: IntakeCollaborators, settings: IntakeConfig) -> Self {
        Self {
            collaborators,
            settings,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> IntakeConfig {
        self.settings
    }

    pub async fn open(&self, request: OpenSession) -> Result<(SessionId, SessionView), HostError> {
        let id = next_session_id();
        let blueprint = FlowBlueprint::for_kind(request.flow)
            .with_max_upload_bytes(self.settings.max_upload_bytes);

        let hook_id = id.clone();
        let mut session =
            IntakeSession::new(blueprint, request.subject_id, self.collaborators.clone())?
                .with_consent_threshold(self.settings.consent_threshold)
                .on_submitted(Box::new(move |receipt: &SubmissionReceipt| {
                    info!(
                        session = %hook_id,
                        confirmation = %receipt.confirmation,
                        "intake session completed"
                    );
                }));

        if let Some(profile) = request.profile {
            session.hydrate(profile)?;
        }

        let view = session.view();
        self.sessions
            .lock()
            .await
            .insert(id.clone(), Arc::new(SessionEntry::new(session)));
        info!(session = %id, flow = request.flow.label(), "intake session opened");
        Ok((id, view))
    }

    pub async fn entry(&self, id: &SessionId) -> Result<Arc<SessionEntry>, HostError> {
        self.sessions
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| HostError::UnknownSession(id.clone()))
    }

    pub async fn view(&self, id: &SessionId) -> Result<SessionView, HostError> {
        let entry = self.entry(id).await?;
        let session = entry.session.lock().await;
        Ok(session.view())
    }

    /// Register the upload and drive it in the background; the result lands on the session
    /// whenever the provider answers.
    pub async fn start_upload(
        &self,
        id: &SessionId,
        slot: UploadSlot,
        file: FileBlob,
    ) -> Result<SessionView, HostError> {
        let entry = self.entry(id).await?;
        let (job, view) = {
            let mut session = entry.session.lock().await;
            let job = session.begin_upload(slot, file)?;
            (job, session.view())
        };

        let target = Arc::clone(&entry);
        let handle = tokio::spawn(async move {
            let completion = job.run().await;
            target.session.lock().await.resolve_upload(completion);
        });
        entry.uploads.lock().await.push(handle);
        Ok(view)
    }

    /// Wait for the session's uploads, gate the record, then call the collaborator with the
    /// session unlocked so readers see `Submitting`. A submitted session is unmounted.
    pub async fn submit(&self, id: &SessionId) -> Result<SubmissionReceipt, HostError> {
        let entry = self.entry(id).await?;
        entry.settle_uploads().await;

        let pending = entry.session.lock().await.begin_submit()?;
        let result = pending.send().await;
        let receipt = entry.session.lock().await.finish_submit(result)?;

        self.sessions.lock().await.remove(id);
        info!(session = %id, "submitted intake session unmounted");
        Ok(receipt)
    }

    /// Discard the session's record and unmount it.
    pub async fn discard(
        &self,
        id: &SessionId,
        confirmed: bool,
    ) -> Result<ApplicationRecord, HostError> {
        let entry = self.entry(id).await?;
        let draft = entry.session.lock().await.discard(confirmed)?;
        self.sessions.lock().await.remove(id);
        info!(session = %id, "intake session discarded");
        Ok(draft)
    }

    /// Unmount a session. Uploads still in flight are ignored when they finish.
    pub async fn close(&self, id: &SessionId) -> Result<(), HostError> {
        let entry = self
            .sessions
            .lock()
            .await
            .remove(id)
            .ok_or_else(|| HostError::UnknownSession(id.clone()))?;
        entry.session.lock().await.dispose();
        Ok(())
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
