use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{ApplicationRecord, FlowKind, UploadSlot};
use super::uploads::{UploadRegistry, UploadStatus};
use super::validation::{FieldErrors, ValidationGate};

/// Payload handed to the submission collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeSubmission {
    pub flow: FlowKind,
    pub record: ApplicationRecord,
}

/// Confirmation returned by the submission collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub confirmation: String,
    pub submitted_at: DateTime<Utc>,
}

/// Remote side of "apply"/"register". Called at most once per explicit submit action.
#[async_trait]
pub trait SubmissionService: Send + Sync {
    async fn apply(
        &self,
        submission: IntakeSubmission,
    ) -> Result<SubmissionReceipt, SubmissionRejection>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionRejection {
    #[error("submission rejected: {0}")]
    Rejected(String),
    #[error("submission service unreachable: {0}")]
    Transport(String),
}

/// Lifecycle of one record instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FlowState {
    Idle,
    Editing,
    Submitting,
    Submitted { receipt: SubmissionReceipt },
    SubmissionFailed { reason: String },
}

/// Inputs that drive [`FlowState`] transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    Edited,
    SubmitStarted,
    SubmitSucceeded(SubmissionReceipt),
    SubmitFailed(String),
}

impl FlowEvent {
    pub const fn label(&self) -> &'static str {
        match self {
            FlowEvent::Edited => "edit",
            FlowEvent::SubmitStarted => "submit",
            FlowEvent::SubmitSucceeded(_) => "submit success",
            FlowEvent::SubmitFailed(_) => "submit failure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot apply {event} while {state}")]
pub struct FlowTransitionError {
    pub state: &'static str,
    pub event: &'static str,
}

impl FlowState {
    pub const fn label(&self) -> &'static str {
        match self {
            FlowState::Idle => "idle",
            FlowState::Editing => "editing",
            FlowState::Submitting => "submitting",
            FlowState::Submitted { .. } => "submitted",
            FlowState::SubmissionFailed { .. } => "submission_failed",
        }
    }

    /// Pure transition function over the flow state machine.
    pub fn apply(&self, event: FlowEvent) -> Result<FlowState, FlowTransitionError> {
        let next = match (self, &event) {
            (
                FlowState::Idle | FlowState::Editing | FlowState::SubmissionFailed { .. },
                FlowEvent::Edited,
            ) => FlowState::Editing,
            (
                FlowState::Idle | FlowState::Editing | FlowState::SubmissionFailed { .. },
                FlowEvent::SubmitStarted,
            ) => FlowState::Submitting,
            (FlowState::Submitting, FlowEvent::SubmitSucceeded(receipt)) => FlowState::Submitted {
                receipt: receipt.clone(),
            },
            (FlowState::Submitting, FlowEvent::SubmitFailed(reason)) => {
                FlowState::SubmissionFailed {
                    reason: reason.clone(),
                }
            }
            _ => {
                return Err(FlowTransitionError {
                    state: self.label(),
                    event: event.label(),
                })
            }
        };
        Ok(next)
    }

    pub fn accepts_edits(&self) -> bool {
        matches!(
            self,
            FlowState::Idle | FlowState::Editing | FlowState::SubmissionFailed { .. }
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Submitted { .. })
    }
}

/// A gate that held back a submit attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PreconditionFailure {
    ConsentNotAccepted,
    UploadPending { slot: UploadSlot },
    UploadMissing { slot: UploadSlot },
    UploadFailed { slot: UploadSlot, reason: String },
    InvalidFields { errors: FieldErrors },
}

impl fmt::Display for PreconditionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreconditionFailure::ConsentNotAccepted => write!(f, "terms have not been accepted"),
            PreconditionFailure::UploadPending { slot } => {
                write!(f, "{} upload is still in progress", slot.label())
            }
            PreconditionFailure::UploadMissing { slot } => {
                write!(f, "{} has not been uploaded", slot.label())
            }
            PreconditionFailure::UploadFailed { slot, reason } => {
                write!(f, "{} upload failed ({reason})", slot.label())
            }
            PreconditionFailure::InvalidFields { errors } => write!(f, "invalid fields: {errors}"),
        }
    }
}

/// Every gate that failed for one submit attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedSubmission {
    pub failures: Vec<PreconditionFailure>,
}

impl BlockedSubmission {
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        self.failures.iter().find_map(|failure| match failure {
            PreconditionFailure::InvalidFields { errors } => Some(errors),
            _ => None,
        })
    }
}

impl fmt::Display for BlockedSubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.failures.iter().map(ToString::to_string).collect();
        write!(f, "{}", rendered.join("; "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    #[error("submission blocked: {0}")]
    Blocked(BlockedSubmission),
    #[error("a submission is already in progress")]
    InProgress,
    #[error("this record has already been submitted")]
    AlreadySubmitted,
    #[error(transparent)]
    Remote(#[from] SubmissionRejection),
    #[error(transparent)]
    Transition(#[from] FlowTransitionError),
}

/// Borrowed view of everything the submit gates inspect.
#[derive(Debug, Clone, Copy)]
pub struct SubmissionGate<'a> {
    pub flow: FlowKind,
    pub record: &'a ApplicationRecord,
    pub uploads: &'a UploadRegistry,
    pub required_slots: &'a [UploadSlot],
    pub validation: &'a ValidationGate,
    pub consent_accepted: bool,
}

impl SubmissionGate<'_> {
    /// Evaluate all gates. Pure; performs no I/O.
    pub fn check(&self) -> Result<(), BlockedSubmission> {
        let mut failures = Vec::new();

        if !self.consent_accepted {
            failures.push(PreconditionFailure::ConsentNotAccepted);
        }

        for slot in UploadSlot::ALL {
            let status = self.uploads.status(slot);
            let required = self.required_slots.contains(&slot);
            match status {
                UploadStatus::Uploading => {
                    failures.push(PreconditionFailure::UploadPending { slot })
                }
                UploadStatus::Failed { reason } if required => {
                    failures.push(PreconditionFailure::UploadFailed { slot, reason })
                }
                UploadStatus::Idle if required => {
                    failures.push(PreconditionFailure::UploadMissing { slot })
                }
                _ => {}
            }
        }

        if let Err(errors) = self.validation.validate(self.record) {
            failures.push(PreconditionFailure::InvalidFields { errors });
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(BlockedSubmission { failures })
        }
    }
}

/// A submission that passed every gate and now waits on the collaborator.
///
/// It owns its payload, so the session can be released while [`Self::send`] runs.
pub struct PendingSubmission {
    service: Arc<dyn SubmissionService>,
    submission: IntakeSubmission,
}

impl fmt::Debug for PendingSubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSubmission")
            .field("flow", &self.submission.flow)
            .finish_non_exhaustive()
    }
}

impl PendingSubmission {
    pub fn submission(&self) -> &IntakeSubmission {
        &self.submission
    }

    pub async fn send(self) -> Result<SubmissionReceipt, SubmissionRejection> {
        info!(flow = self.submission.flow.label(), "submitting intake record");
        self.service.apply(self.submission).await
    }
}

/// Owns the flow state machine and the hand-off to the submission collaborator.
pub struct SubmissionCoordinator {
    service: Arc<dyn SubmissionService>,
    state: FlowState,
    last_error: Option<String>,
}

impl fmt::Debug for SubmissionCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmissionCoordinator")
            .field("state", &self.state)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

impl SubmissionCoordinator {
    pub fn new(service: Arc<dyn SubmissionService>) -> Self {
        Self {
            service,
            state: FlowState::Idle,
            last_error: None,
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    /// Message for the top-level banner, if the last attempt failed.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn transition(&mut self, event: FlowEvent) -> Result<(), FlowTransitionError> {
        self.state = self.state.apply(event)?;
        Ok(())
    }

    /// Note a user mutation (`Idle`/`SubmissionFailed` → `Editing`).
    pub fn record_edit(&mut self) -> Result<(), FlowTransitionError> {
        if self.state != FlowState::Editing {
            self.transition(FlowEvent::Edited)?;
        }
        Ok(())
    }

    /// Whether the submit control should be enabled right now.
    pub fn can_submit(&self, gate: &SubmissionGate<'_>) -> bool {
        self.state.accepts_edits() && gate.check().is_ok()
    }

    /// Run the local gates and enter `Submitting`. No I/O happens here.
    pub fn begin(
        &mut self,
        gate: SubmissionGate<'_>,
    ) -> Result<IntakeSubmission, SubmissionError> {
        match self.state {
            FlowState::Submitting => return Err(SubmissionError::InProgress),
            FlowState::Submitted { .. } => return Err(SubmissionError::AlreadySubmitted),
            _ => {}
        }

        if let Err(blocked) = gate.check() {
            warn!(flow = gate.flow.label(), %blocked, "submission blocked locally");
            self.last_error = Some(blocked.to_string());
            return Err(SubmissionError::Blocked(blocked));
        }

        self.transition(FlowEvent::SubmitStarted)?;
        self.last_error = None;
        Ok(IntakeSubmission {
            flow: gate.flow,
            record: gate.record.clone(),
        })
    }

    /// Apply the collaborator's answer to a submission started with [`Self::begin`].
    pub fn finish(
        &mut self,
        result: Result<SubmissionReceipt, SubmissionRejection>,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        match result {
            Ok(receipt) => {
                self.transition(FlowEvent::SubmitSucceeded(receipt.clone()))?;
                info!(confirmation = %receipt.confirmation, "submission accepted");
                Ok(receipt)
            }
            Err(rejection) => {
                let reason = rejection.to_string();
                self.transition(FlowEvent::SubmitFailed(reason.clone()))?;
                warn!(%reason, "submission failed; record kept for retry");
                self.last_error = Some(reason);
                Err(SubmissionError::Remote(rejection))
            }
        }
    }

    /// [`Self::begin`], paired with the collaborator that will receive the record.
    pub fn start(
        &mut self,
        gate: SubmissionGate<'_>,
    ) -> Result<PendingSubmission, SubmissionError> {
        let submission = self.begin(gate)?;
        Ok(PendingSubmission {
            service: Arc::clone(&self.service),
            submission,
        })
    }

}
