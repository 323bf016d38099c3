use std::collections::BTreeMap;

use serde::Serialize;

use super::consent::ConsentState;
use super::coordinator::FlowState;
use super::directory::MemberSummary;
use super::domain::{ApplicationRecord, FlowKind, SectionId, UploadSlot};
use super::sections::{PrimaryAction, SectionProgress};
use super::uploads::UploadStatus;
use super::validation::FieldErrors;

/// Read-only snapshot of a session, shaped for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub flow: FlowKind,
    pub state: FlowState,
    pub active_section: SectionId,
    pub primary_action: PrimaryAction,
    pub sections: Vec<SectionProgress>,
    pub consent: ConsentState,
    pub uploads: BTreeMap<UploadSlot, UploadStatus>,
    pub field_errors: FieldErrors,
    pub dirty: bool,
    pub can_submit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub motivation_prompt: String,
    pub motivation_words: usize,
    pub record: ApplicationRecord,
    pub referral_options: Vec<MemberSummary>,
    pub specialization_options: Vec<String>,
}

impl SessionView {
    pub fn upload(&self, slot: UploadSlot) -> UploadStatus {
        self.uploads.get(&slot).cloned().unwrap_or(UploadStatus::Idle)
    }

    pub fn section(&self, id: SectionId) -> Option<&SectionProgress> {
        self.sections.iter().find(|section| section.id == id)
    }
}
