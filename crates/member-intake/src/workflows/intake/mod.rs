//! Membership application and event registration intake.
//!
//! A session owns one [`ApplicationRecord`] for as long as the flow is mounted. Section
//! navigation, the terms scroll gate, per-slot uploads and the submit gates all read and write
//! that record through [`IntakeSession`], which is the only writer.

pub mod blueprint;
pub mod consent;
pub mod coordinator;
pub mod directory;
pub mod dirty;
pub mod domain;
pub mod host;
pub mod router;
pub mod sections;
pub mod session;
pub mod uploads;
pub mod validation;
pub mod view;

#[cfg(test)]
mod tests;

pub use blueprint::{
    CompletionRule, FlowBlueprint, SectionTemplate, DEFAULT_MAX_UPLOAD_BYTES,
    EVENT_MOTIVATION_MIN_WORDS, MEMBER_MOTIVATION_MIN_WORDS,
};
pub use consent::{ConsentState, ScrollGate, ScrollGeometry, DEFAULT_UNLOCK_THRESHOLD};
pub use coordinator::{
    BlockedSubmission, FlowEvent, FlowState, FlowTransitionError, IntakeSubmission,
    PendingSubmission, PreconditionFailure, SubmissionCoordinator, SubmissionError, SubmissionGate,
    SubmissionReceipt, SubmissionRejection, SubmissionService,
};
pub use directory::{MemberDirectory, MemberSummary, StaticDirectory};
pub use dirty::{DirtyTracker, LeaveDecision};
pub use domain::{
    word_count, ApplicationRecord, FieldName, FlowKind, MemberRef, RecordEdit, SectionId,
    Specialization, SubjectId, UploadSlot,
};
pub use host::{HostError, IntakeHost, OpenSession, SessionEntry, SessionId};
pub use router::{intake_router, FILE_NAME_HEADER};
pub use sections::{
    ContinueOutcome, NavigationError, PrimaryAction, SectionController, SectionProgress,
};
pub use session::{BackOutcome, CompletionHook, IntakeCollaborators, IntakeError, IntakeSession};
pub use uploads::{
    FileBlob, Resolution, UploadCompletion, UploadError, UploadJob, UploadPolicy, UploadReceipt,
    UploadRegistry, UploadService, UploadStatus, UploadTicket,
};
pub use validation::{FieldErrors, ValidationGate};
pub use view::SessionView;
