use async_trait::async_trait;
use chrono::Utc;
use member_intake::workflows::intake::{
    FileBlob, IntakeCollaborators, IntakeSubmission, MemberRef, MemberSummary, StaticDirectory,
    SubmissionReceipt, SubmissionRejection, SubmissionService, UploadError, UploadReceipt,
    UploadService, UploadSlot,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Keeps uploaded blobs in memory, keyed by the reference handed back to the session.
#[derive(Default, Clone)]
pub(crate) struct InMemoryUploadStore {
    blobs: Arc<Mutex<HashMap<String, FileBlob>>>,
    sequence: Arc<AtomicU64>,
}

impl InMemoryUploadStore {
    pub(crate) fn stored(&self) -> usize {
        self.blobs.lock().expect("upload store mutex poisoned").len()
    }

    pub(crate) fn fetch(&self, reference: &str) -> Option<FileBlob> {
        self.blobs
            .lock()
            .expect("upload store mutex poisoned")
            .get(reference)
            .cloned()
    }
}

#[async_trait]
impl UploadService for InMemoryUploadStore {
    async fn upload(
        &self,
        slot: UploadSlot,
        file: FileBlob,
    ) -> Result<UploadReceipt, UploadError> {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let reference = format!("{}-{id:06}", slot.label());
        let mut guard = self.blobs.lock().expect("upload store mutex poisoned");
        guard.insert(reference.clone(), file);
        Ok(UploadReceipt {
            reference,
            uploaded_at: Utc::now(),
        })
    }
}

/// Accepts every submission and keeps it for inspection.
#[derive(Default, Clone)]
pub(crate) struct InMemorySubmissionInbox {
    received: Arc<Mutex<Vec<IntakeSubmission>>>,
}

impl InMemorySubmissionInbox {
    pub(crate) fn received(&self) -> Vec<IntakeSubmission> {
        self.received
            .lock()
            .expect("submission inbox mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl SubmissionService for InMemorySubmissionInbox {
    async fn apply(
        &self,
        submission: IntakeSubmission,
    ) -> Result<SubmissionReceipt, SubmissionRejection> {
        let flow = submission.flow;
        let mut guard = self
            .received
            .lock()
            .expect("submission inbox mutex poisoned");
        guard.push(submission);
        let confirmation = format!("APP-{:06}", guard.len());
        info!(flow = flow.label(), %confirmation, "submission stored");
        Ok(SubmissionReceipt {
            confirmation,
            submitted_at: Utc::now(),
        })
    }
}

pub(crate) fn default_directory() -> StaticDirectory {
    let members = [
        ("member-0001", "Rosalind Franklin"),
        ("member-0002", "Barbara McClintock"),
        ("member-0003", "Katherine Johnson"),
    ];
    StaticDirectory::new(
        members
            .into_iter()
            .map(|(member_ref, display_name)| MemberSummary {
                member_ref: MemberRef(member_ref.to_string()),
                display_name: display_name.to_string(),
            })
            .collect(),
    )
}

pub(crate) fn collaborators(
    uploads: InMemoryUploadStore,
    submissions: InMemorySubmissionInbox,
) -> IntakeCollaborators {
    IntakeCollaborators {
        uploads: Arc::new(uploads),
        submissions: Arc::new(submissions),
        directory: Arc::new(default_directory()),
    }
}
