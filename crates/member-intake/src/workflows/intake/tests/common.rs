use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::Utc;
use serde_json::Value;

use crate::config::IntakeConfig;
use crate::workflows::intake::{
    intake_router, ApplicationRecord, FileBlob, FlowBlueprint, IntakeCollaborators, IntakeHost,
    IntakeSession, IntakeSubmission, MemberRef, MemberSummary, ScrollGeometry, Specialization,
    StaticDirectory, SubjectId, SubmissionReceipt, SubmissionRejection, SubmissionService,
    UploadError, UploadReceipt, UploadService, UploadSlot,
};

/// `count` distinct words separated by single spaces.
pub(super) fn words(count: usize) -> String {
    (1..=count)
        .map(|index| format!("word{index}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub(super) fn motivation() -> String {
    words(60)
}

pub(super) fn photo(name: &str) -> FileBlob {
    FileBlob::new(name, "image/png", vec![0x89, b'P', b'N', b'G'])
}

pub(super) fn document(name: &str) -> FileBlob {
    FileBlob::new(name, "application/pdf", b"%PDF-1.7".to_vec())
}

pub(super) fn subject() -> SubjectId {
    SubjectId("member-7".to_string())
}

pub(super) fn directory() -> StaticDirectory {
    StaticDirectory::new(vec![
        MemberSummary {
            member_ref: MemberRef("member-1".to_string()),
            display_name: "Ada Lovelace".to_string(),
        },
        MemberSummary {
            member_ref: MemberRef("member-2".to_string()),
            display_name: "Grace Hopper".to_string(),
        },
    ])
}

/// Record that passes every member-application gate.
pub(super) fn complete_member_record() -> ApplicationRecord {
    ApplicationRecord {
        subject_id: Some(subject()),
        profile_photo_ref: Some("a".to_string()),
        document_ref: Some("b".to_string()),
        specialization_area: Some(Specialization::Listed("Biotechnology".to_string())),
        motivation_text: Some(motivation()),
        ..ApplicationRecord::default()
    }
}

/// Terms that fit the viewport, so the gate unlocks on first observation.
pub(super) fn short_terms() -> ScrollGeometry {
    ScrollGeometry {
        scroll_top: 0.0,
        scroll_height: 400.0,
        client_height: 600.0,
    }
}

pub(super) fn scrolled_to(scroll_top: f64) -> ScrollGeometry {
    ScrollGeometry {
        scroll_top,
        scroll_height: 1100.0,
        client_height: 100.0,
    }
}

/// Upload provider that echoes the file name back as the reference.
#[derive(Default, Clone)]
pub(super) struct MemoryUploads {
    calls: Arc<Mutex<Vec<(UploadSlot, String)>>>,
    failing: Arc<Mutex<BTreeSet<UploadSlot>>>,
}

impl MemoryUploads {
    pub(super) fn calls(&self) -> usize {
        self.calls.lock().expect("upload mutex poisoned").len()
    }

    pub(super) fn fail(&self, slot: UploadSlot) {
        self.failing
            .lock()
            .expect("upload mutex poisoned")
            .insert(slot);
    }

    pub(super) fn recover(&self, slot: UploadSlot) {
        self.failing
            .lock()
            .expect("upload mutex poisoned")
            .remove(&slot);
    }
}

#[async_trait]
impl UploadService for MemoryUploads {
    async fn upload(
        &self,
        slot: UploadSlot,
        file: FileBlob,
    ) -> Result<UploadReceipt, UploadError> {
        self.calls
            .lock()
            .expect("upload mutex poisoned")
            .push((slot, file.file_name.clone()));
        if self
            .failing
            .lock()
            .expect("upload mutex poisoned")
            .contains(&slot)
        {
            return Err(UploadError::Transport("storage offline".to_string()));
        }
        Ok(UploadReceipt {
            reference: file.file_name,
            uploaded_at: Utc::now(),
        })
    }
}

#[derive(Default, Clone)]
pub(super) struct MemorySubmissions {
    received: Arc<Mutex<Vec<IntakeSubmission>>>,
    offline: Arc<Mutex<bool>>,
}

impl MemorySubmissions {
    pub(super) fn calls(&self) -> usize {
        self.received.lock().expect("submission mutex poisoned").len()
    }

    pub(super) fn received(&self) -> Vec<IntakeSubmission> {
        self.received
            .lock()
            .expect("submission mutex poisoned")
            .clone()
    }

    pub(super) fn set_offline(&self, offline: bool) {
        *self.offline.lock().expect("submission mutex poisoned") = offline;
    }
}

#[async_trait]
impl SubmissionService for MemorySubmissions {
    async fn apply(
        &self,
        submission: IntakeSubmission,
    ) -> Result<SubmissionReceipt, SubmissionRejection> {
        let mut received = self.received.lock().expect("submission mutex poisoned");
        received.push(submission);
        if *self.offline.lock().expect("submission mutex poisoned") {
            return Err(SubmissionRejection::Transport("gateway timeout".to_string()));
        }
        Ok(SubmissionReceipt {
            confirmation: format!("conf-{}", received.len()),
            submitted_at: Utc::now(),
        })
    }
}

pub(super) fn collaborators(
    uploads: &MemoryUploads,
    submissions: &MemorySubmissions,
) -> IntakeCollaborators {
    IntakeCollaborators {
        uploads: Arc::new(uploads.clone()),
        submissions: Arc::new(submissions.clone()),
        directory: Arc::new(directory()),
    }
}

pub(super) fn session_for(
    blueprint: FlowBlueprint,
) -> (IntakeSession, MemoryUploads, MemorySubmissions) {
    let uploads = MemoryUploads::default();
    let submissions = MemorySubmissions::default();
    let session = IntakeSession::new(blueprint, subject(), collaborators(&uploads, &submissions))
        .expect("blueprint has sections");
    (session, uploads, submissions)
}

pub(super) fn member_session() -> (IntakeSession, MemoryUploads, MemorySubmissions) {
    session_for(FlowBlueprint::member_application())
}

pub(super) fn event_session() -> (IntakeSession, MemoryUploads, MemorySubmissions) {
    session_for(FlowBlueprint::event_registration())
}

pub(super) fn accept_terms(session: &mut IntakeSession) {
    session.observe_terms(short_terms());
    session.set_consent(true);
}

pub(super) fn build_host() -> (Arc<IntakeHost>, MemoryUploads, MemorySubmissions) {
    build_host_with(IntakeConfig::default())
}

pub(super) fn build_host_with(
    settings: IntakeConfig,
) -> (Arc<IntakeHost>, MemoryUploads, MemorySubmissions) {
    let uploads = MemoryUploads::default();
    let submissions = MemorySubmissions::default();
    let host = IntakeHost::new(collaborators(&uploads, &submissions), settings);
    (Arc::new(host), uploads, submissions)
}

pub(super) fn router_for(host: &Arc<IntakeHost>) -> axum::Router {
    intake_router(Arc::clone(host))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
