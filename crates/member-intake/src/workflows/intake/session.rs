use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info};

use super::blueprint::FlowBlueprint;
use super::consent::{ConsentState, ScrollGate, ScrollGeometry};
use super::coordinator::{
    FlowState, FlowTransitionError, PendingSubmission, SubmissionCoordinator, SubmissionError,
    SubmissionGate, SubmissionReceipt, SubmissionRejection, SubmissionService,
};
use super::directory::{MemberDirectory, MemberSummary};
use super::dirty::{DirtyTracker, LeaveDecision};
use super::domain::{
    word_count, ApplicationRecord, FieldName, RecordEdit, SectionId, SubjectId, UploadSlot,
};
use super::sections::{ContinueOutcome, NavigationError, SectionController};
use super::uploads::{
    FileBlob, Resolution, UploadCompletion, UploadJob, UploadRegistry, UploadService,
    UploadStatus, UploadTicket,
};
use super::validation::{FieldErrors, ValidationGate};
use super::view::SessionView;

/// External collaborators a session talks to.
#[derive(Clone)]
pub struct IntakeCollaborators {
    pub uploads: Arc<dyn UploadService>,
    pub submissions: Arc<dyn SubmissionService>,
    pub directory: Arc<dyn MemberDirectory>,
}

impl fmt::Debug for IntakeCollaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntakeCollaborators").finish_non_exhaustive()
    }
}

/// Callback fired once the submission collaborator accepts the record.
pub type CompletionHook = Box<dyn FnMut(&SubmissionReceipt) + Send>;

/// Result of pressing "Back".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackOutcome {
    Moved(SectionId),
    /// Already on the first section: "Back" means leaving the flow.
    Leave(LeaveDecision),
}

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("the intake session has been closed")]
    Disposed,
    #[error("the record cannot be changed while {state}")]
    Locked { state: &'static str },
    #[error("unsaved changes must be confirmed before discarding")]
    ConfirmationRequired,
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    Transition(#[from] FlowTransitionError),
}

/// One mounted intake workflow: the single owner and writer of its record.
pub struct IntakeSession {
    blueprint: FlowBlueprint,
    record: ApplicationRecord,
    consent: ScrollGate,
    sections: SectionController,
    dirty: DirtyTracker,
    uploads: UploadRegistry,
    in_flight: Vec<UploadJob>,
    validation: ValidationGate,
    coordinator: SubmissionCoordinator,
    upload_service: Arc<dyn UploadService>,
    referral_options: Vec<MemberSummary>,
    on_submitted: Option<CompletionHook>,
    disposed: bool,
}

impl fmt::Debug for IntakeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntakeSession")
            .field("flow", &self.blueprint.kind())
            .field("state", self.coordinator.state())
            .field("active", &self.sections.active())
            .field("dirty", &self.dirty.is_dirty())
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl IntakeSession {
    pub fn new(
        blueprint: FlowBlueprint,
        subject_id: SubjectId,
        collaborators: IntakeCollaborators,
    ) -> Result<Self, IntakeError> {
        let referral_options = collaborators.directory.members();
        let candidates: Vec<_> = referral_options
            .iter()
            .map(|member| member.member_ref.clone())
            .collect();
        let validation = ValidationGate::new(blueprint.schema(&candidates));
        let sections = SectionController::new(blueprint.sections().to_vec())?;

        info!(
            flow = blueprint.kind().label(),
            subject = %subject_id.0,
            "intake session mounted"
        );

        Ok(Self {
            record: ApplicationRecord::for_subject(subject_id),
            consent: ScrollGate::default(),
            sections,
            dirty: DirtyTracker::new(),
            uploads: UploadRegistry::new(),
            in_flight: Vec::new(),
            validation,
            coordinator: SubmissionCoordinator::new(collaborators.submissions),
            upload_service: collaborators.uploads,
            referral_options,
            on_submitted: None,
            disposed: false,
            blueprint,
        })
    }

    pub fn with_consent_threshold(mut self, threshold: f64) -> Self {
        self.consent = ScrollGate::new(threshold);
        self
    }

    pub fn on_submitted(mut self, hook: CompletionHook) -> Self {
        self.on_submitted = Some(hook);
        self
    }

    fn ensure_editable(&self) -> Result<(), IntakeError> {
        if self.disposed {
            return Err(IntakeError::Disposed);
        }
        let state = self.coordinator.state();
        if !state.accepts_edits() {
            return Err(IntakeError::Locked {
                state: state.label(),
            });
        }
        Ok(())
    }

    fn note_mutation(&mut self, field: FieldName) -> Result<(), IntakeError> {
        self.dirty.record_mutation(field);
        self.coordinator.record_edit()?;
        Ok(())
    }

    /// Populate the record from an existing profile without marking it dirty.
    ///
    /// Upload references already present count as succeeded uploads.
    pub fn hydrate(&mut self, profile: ApplicationRecord) -> Result<(), IntakeError> {
        self.ensure_editable()?;
        let subject_id = profile.subject_id.clone().or_else(|| self.record.subject_id.take());
        self.record = ApplicationRecord {
            subject_id,
            ..profile
        };
        for slot in UploadSlot::ALL {
            match self.record.upload_ref(slot).map(str::to_string) {
                Some(reference) if !reference.trim().is_empty() => {
                    self.uploads.seed(slot, reference)
                }
                _ => self.uploads.clear(slot),
            }
        }
        self.dirty.mark_saved();
        debug!(flow = self.blueprint.kind().label(), "record hydrated from profile");
        Ok(())
    }

    /// Checkpoint the current record as saved.
    pub fn mark_saved(&mut self) {
        self.dirty.mark_saved();
    }

    pub fn observe_terms(&mut self, geometry: ScrollGeometry) -> ConsentState {
        self.consent.observe(geometry)
    }

    pub fn record_terms_progress(&mut self, progress: f64) -> ConsentState {
        self.consent.record_progress(progress)
    }

    pub fn set_consent(&mut self, accepted: bool) -> ConsentState {
        self.consent.set_accepted(accepted)
    }

    pub fn edit(&mut self, edit: RecordEdit) -> Result<FieldName, IntakeError> {
        self.ensure_editable()?;
        let field = self.record.apply(edit);
        self.note_mutation(field)?;
        Ok(field)
    }

    fn register_upload(
        &mut self,
        slot: UploadSlot,
        file: FileBlob,
    ) -> Result<UploadJob, IntakeError> {
        self.ensure_editable()?;
        let ticket = self.uploads.start(slot, &file.file_name);
        self.record.set_upload_ref(slot, None);
        self.note_mutation(slot.field())?;

        let checked = self
            .blueprint
            .upload_policy(slot)
            .map(|policy| policy.check(&file))
            .unwrap_or(Ok(()));
        let job = match checked {
            Ok(()) => UploadJob::spawn_with(ticket, Arc::clone(&self.upload_service), file),
            Err(error) => {
                self.resolve_upload(UploadCompletion {
                    ticket,
                    result: Err(error.clone()),
                });
                UploadJob::failed(ticket, error)
            }
        };
        Ok(job)
    }

    /// Select a file for `slot`. The upload runs the next time uploads are settled.
    pub fn select_file(
        &mut self,
        slot: UploadSlot,
        file: FileBlob,
    ) -> Result<UploadTicket, IntakeError> {
        let job = self.register_upload(slot, file)?;
        let ticket = job.ticket();
        if self.uploads.is_pending(slot) {
            self.in_flight.push(job);
        }
        Ok(ticket)
    }

    /// Select a file for `slot` and hand the upload to the caller to drive.
    ///
    /// Feed the job's [`UploadCompletion`] back through [`Self::resolve_upload`].
    pub fn begin_upload(
        &mut self,
        slot: UploadSlot,
        file: FileBlob,
    ) -> Result<UploadJob, IntakeError> {
        self.register_upload(slot, file)
    }

    /// Apply a provider response. Stale or post-dispose responses never touch the record.
    pub fn resolve_upload(&mut self, completion: UploadCompletion) -> Resolution {
        let slot = completion.ticket.slot;
        let resolution = self.uploads.resolve(completion.ticket, completion.result);
        if let Resolution::Applied(status) = &resolution {
            self.record
                .set_upload_ref(slot, status.reference().map(str::to_string));
        }
        resolution
    }

    /// Wait for every upload started via [`Self::select_file`] and apply the results.
    pub async fn settle_uploads(&mut self) {
        let jobs = std::mem::take(&mut self.in_flight);
        if jobs.is_empty() {
            return;
        }
        debug!(count = jobs.len(), "waiting for in-flight uploads");
        let completions = join_all(jobs.into_iter().map(UploadJob::run)).await;
        for completion in completions {
            self.resolve_upload(completion);
        }
    }

    /// Remove an optional asset. Any in-flight upload for the slot becomes stale.
    pub fn clear_upload(&mut self, slot: UploadSlot) -> Result<(), IntakeError> {
        self.ensure_editable()?;
        self.uploads.clear(slot);
        self.record.set_upload_ref(slot, None);
        self.note_mutation(slot.field())
    }

    /// Primary button. On the last section this requests submission instead of advancing.
    pub fn advance(&mut self) -> ContinueOutcome {
        self.sections.next()
    }

    pub fn back(&mut self) -> BackOutcome {
        match self.sections.previous() {
            Some(section) => BackOutcome::Moved(section),
            None => BackOutcome::Leave(self.dirty.leave_decision()),
        }
    }

    pub fn go_to(&mut self, section: SectionId) -> Result<SectionId, IntakeError> {
        Ok(self.sections.go_to(section)?)
    }

    pub fn leave_decision(&self) -> LeaveDecision {
        self.dirty.leave_decision()
    }

    /// Discard the workflow. Unsaved edits need `confirmed`; the returned copy lets the caller
    /// keep a recoverable draft.
    pub fn discard(&mut self, confirmed: bool) -> Result<ApplicationRecord, IntakeError> {
        if self.disposed {
            return Err(IntakeError::Disposed);
        }
        if self.dirty.leave_decision() == LeaveDecision::ConfirmDiscard && !confirmed {
            return Err(IntakeError::ConfirmationRequired);
        }
        info!(
            flow = self.blueprint.kind().label(),
            dirty = self.dirty.is_dirty(),
            "intake record discarded"
        );
        let draft = std::mem::take(&mut self.record);
        self.dispose();
        Ok(draft)
    }

    /// Tear the session down. Late upload results are ignored from here on.
    pub fn dispose(&mut self) {
        if !self.disposed {
            self.disposed = true;
            self.uploads.dispose();
            self.in_flight.clear();
            debug!(flow = self.blueprint.kind().label(), "intake session disposed");
        }
    }

    fn gate(&self) -> SubmissionGate<'_> {
        SubmissionGate {
            flow: self.blueprint.kind(),
            record: &self.record,
            uploads: &self.uploads,
            required_slots: self.blueprint.required_slots(),
            validation: &self.validation,
            consent_accepted: self.consent.is_accepted(),
        }
    }

    /// Run the submit gates and enter `Submitting`. Uploads must already be settled.
    ///
    /// The returned submission borrows nothing from the session; hand the collaborator's
    /// answer back through [`Self::finish_submit`].
    pub fn begin_submit(&mut self) -> Result<PendingSubmission, IntakeError> {
        if self.disposed && !self.coordinator.state().is_terminal() {
            return Err(IntakeError::Disposed);
        }
        let gate = SubmissionGate {
            flow: self.blueprint.kind(),
            record: &self.record,
            uploads: &self.uploads,
            required_slots: self.blueprint.required_slots(),
            validation: &self.validation,
            consent_accepted: self.consent.is_accepted(),
        };
        Ok(self.coordinator.start(gate)?)
    }

    /// Record the collaborator's answer. On success the record is discarded and the session
    /// disposed; on failure the record stays for a retry.
    pub fn finish_submit(
        &mut self,
        result: Result<SubmissionReceipt, SubmissionRejection>,
    ) -> Result<SubmissionReceipt, IntakeError> {
        let receipt = self.coordinator.finish(result)?;

        self.record = ApplicationRecord::default();
        self.dirty.mark_saved();
        self.dispose();
        if let Some(hook) = self.on_submitted.as_mut() {
            hook(&receipt);
        }
        Ok(receipt)
    }

    /// Join all uploads, validate, then submit once.
    pub async fn submit(&mut self) -> Result<SubmissionReceipt, IntakeError> {
        self.settle_uploads().await;
        let pending = self.begin_submit()?;
        let result = pending.send().await;
        self.finish_submit(result)
    }

    pub fn validate(&self) -> Result<(), FieldErrors> {
        self.validation.validate(&self.record)
    }

    pub fn field_error(&self, field: FieldName) -> Option<String> {
        self.validation.validate_field(&self.record, field)
    }

    pub fn is_complete(&self, section: SectionId) -> bool {
        self.sections.is_complete(section, &self.record)
    }

    pub fn all_sections_complete(&self) -> bool {
        self.sections.all_complete(&self.record)
    }

    pub fn can_submit(&self) -> bool {
        !self.disposed && self.coordinator.can_submit(&self.gate())
    }

    pub fn record(&self) -> &ApplicationRecord {
        &self.record
    }

    pub fn state(&self) -> &FlowState {
        self.coordinator.state()
    }

    pub fn consent(&self) -> ConsentState {
        self.consent.state()
    }

    pub fn active_section(&self) -> SectionId {
        self.sections.active()
    }

    pub fn upload_status(&self, slot: UploadSlot) -> UploadStatus {
        self.uploads.status(slot)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.is_dirty()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn blueprint(&self) -> &FlowBlueprint {
        &self.blueprint
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            flow: self.blueprint.kind(),
            state: self.coordinator.state().clone(),
            active_section: self.sections.active(),
            primary_action: self.sections.primary_action(),
            sections: self.sections.progress(&self.record),
            consent: self.consent.state(),
            uploads: UploadSlot::ALL
                .into_iter()
                .map(|slot| (slot, self.uploads.status(slot)))
                .collect(),
            field_errors: self.validate().err().unwrap_or_default(),
            dirty: self.dirty.is_dirty(),
            can_submit: self.can_submit(),
            last_error: self.coordinator.last_error().map(str::to_string),
            motivation_prompt: self.blueprint.motivation_prompt(),
            motivation_words: self
                .record
                .motivation_text
                .as_deref()
                .map(word_count)
                .unwrap_or(0),
            referral_options: self.referral_options.clone(),
            specialization_options: self
                .blueprint
                .specialization_options()
                .iter()
                .map(|option| option.to_string())
                .collect(),
            record: self.record.clone(),
        }
    }
}
