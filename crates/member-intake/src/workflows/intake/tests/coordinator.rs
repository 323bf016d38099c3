use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::common::*;
use crate::workflows::intake::{
    ApplicationRecord, ContinueOutcome, FieldName, FlowState, IntakeError, PreconditionFailure,
    RecordEdit, SectionId, Specialization, SubmissionError, SubmissionReceipt, UploadSlot,
};

fn blocked(error: IntakeError) -> Vec<PreconditionFailure> {
    match error {
        IntakeError::Submission(SubmissionError::Blocked(blocked)) => blocked.failures,
        other => panic!("expected a blocked submission, got {other:?}"),
    }
}

#[tokio::test]
async fn complete_application_submits_exactly_once() {
    let (session, uploads, submissions) = member_session();
    let completed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&completed);
    let mut session = session.on_submitted(Box::new(move |_: &SubmissionReceipt| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    accept_terms(&mut session);
    session
        .select_file(UploadSlot::Photo, photo("a"))
        .expect("photo registered");
    session
        .select_file(UploadSlot::Document, document("b"))
        .expect("document registered");
    assert_eq!(
        session.advance(),
        ContinueOutcome::Advanced(SectionId::Specialization)
    );
    session
        .edit(RecordEdit::Specialization(Some(Specialization::Listed(
            "Biotechnology".to_string(),
        ))))
        .expect("edit accepted");
    assert_eq!(
        session.advance(),
        ContinueOutcome::Advanced(SectionId::Motivation)
    );
    session
        .edit(RecordEdit::Motivation(motivation()))
        .expect("edit accepted");
    assert_eq!(session.advance(), ContinueOutcome::SubmitRequested);

    let receipt = session.submit().await.expect("submission accepted");
    assert_eq!(receipt.confirmation, "conf-1");
    assert_eq!(submissions.calls(), 1);
    assert_eq!(uploads.calls(), 2);
    assert_eq!(completed.load(Ordering::SeqCst), 1);

    let sent = &submissions.received()[0];
    assert_eq!(sent.record.profile_photo_ref.as_deref(), Some("a"));
    assert_eq!(sent.record.document_ref.as_deref(), Some("b"));
    assert!(matches!(session.state(), FlowState::Submitted { .. }));
    assert!(!session.is_dirty());

    let again = session.submit().await.expect_err("already submitted");
    assert!(matches!(
        again,
        IntakeError::Submission(SubmissionError::AlreadySubmitted)
    ));
    assert!(matches!(
        session.edit(RecordEdit::Motivation("late edit".to_string())),
        Err(IntakeError::Disposed)
    ));
    assert_eq!(submissions.calls(), 1);
}

#[tokio::test]
async fn accepted_submission_discards_the_record() {
    let (mut session, _, submissions) = member_session();
    session
        .hydrate(complete_member_record())
        .expect("profile hydrates");
    accept_terms(&mut session);

    session.submit().await.expect("submission accepted");

    assert_eq!(submissions.received()[0].record, complete_member_record());
    assert_eq!(session.record(), &ApplicationRecord::default());
    assert!(session.is_disposed());
    assert!(!session.can_submit());
    assert!(matches!(
        session.select_file(UploadSlot::Photo, photo("late.png")),
        Err(IntakeError::Disposed)
    ));
}

#[tokio::test]
async fn split_submission_reports_submitting_until_answered() {
    let (mut session, _, submissions) = member_session();
    session
        .hydrate(complete_member_record())
        .expect("profile hydrates");
    accept_terms(&mut session);

    let pending = session.begin_submit().expect("gates pass");
    assert_eq!(session.state(), &FlowState::Submitting);
    assert!(!session.view().can_submit);
    assert!(matches!(
        session.begin_submit(),
        Err(IntakeError::Submission(SubmissionError::InProgress))
    ));
    assert!(matches!(
        session.edit(RecordEdit::Motivation("mid-flight".to_string())),
        Err(IntakeError::Locked { .. })
    ));

    let result = pending.send().await;
    session.finish_submit(result).expect("submission accepted");
    assert!(matches!(session.state(), FlowState::Submitted { .. }));
    assert_eq!(submissions.calls(), 1);
}

#[tokio::test]
async fn missing_consent_blocks_without_calling_the_service() {
    let (mut session, _, submissions) = member_session();
    session
        .hydrate(complete_member_record())
        .expect("hydrates while idle");
    assert!(!session.can_submit());

    let failures = blocked(session.submit().await.expect_err("consent missing"));
    assert_eq!(failures, vec![PreconditionFailure::ConsentNotAccepted]);
    assert_eq!(submissions.calls(), 0);
    assert_eq!(session.state(), &FlowState::Idle);
    assert!(session.view().last_error.is_some());

    accept_terms(&mut session);
    assert!(session.can_submit());
    session.submit().await.expect("hydrated record submits");
    assert_eq!(submissions.calls(), 1);
}

#[tokio::test]
async fn invalid_fields_and_missing_uploads_are_all_reported() {
    let (mut session, _, submissions) = member_session();
    accept_terms(&mut session);
    session
        .edit(RecordEdit::Motivation(words(49)))
        .expect("edit accepted");

    let failures = blocked(session.submit().await.expect_err("incomplete"));
    assert!(failures.contains(&PreconditionFailure::UploadMissing {
        slot: UploadSlot::Photo
    }));
    assert!(failures.contains(&PreconditionFailure::UploadMissing {
        slot: UploadSlot::Document
    }));
    let errors = failures
        .iter()
        .find_map(|failure| match failure {
            PreconditionFailure::InvalidFields { errors } => Some(errors.clone()),
            _ => None,
        })
        .expect("field errors reported");
    assert!(errors.contains(FieldName::MotivationText));
    assert!(errors.contains(FieldName::SpecializationArea));
    assert_eq!(submissions.calls(), 0);
    assert_eq!(session.state(), &FlowState::Editing);
}

#[tokio::test]
async fn failed_required_upload_blocks_submission() {
    let (mut session, uploads, submissions) = member_session();
    session
        .hydrate(complete_member_record())
        .expect("hydrates while idle");
    accept_terms(&mut session);
    uploads.fail(UploadSlot::Document);
    session
        .select_file(UploadSlot::Document, document("replacement.pdf"))
        .expect("registered");

    let failures = blocked(session.submit().await.expect_err("document failed"));
    assert!(failures.iter().any(|failure| matches!(
        failure,
        PreconditionFailure::UploadFailed {
            slot: UploadSlot::Document,
            ..
        }
    )));
    assert_eq!(submissions.calls(), 0);
}

#[tokio::test]
async fn remote_failure_keeps_the_record_for_retry() {
    let (mut session, _, submissions) = member_session();
    session
        .hydrate(complete_member_record())
        .expect("hydrates while idle");
    accept_terms(&mut session);
    submissions.set_offline(true);

    let error = session.submit().await.expect_err("service offline");
    assert!(matches!(
        error,
        IntakeError::Submission(SubmissionError::Remote(_))
    ));
    assert!(matches!(
        session.state(),
        FlowState::SubmissionFailed { .. }
    ));
    assert_eq!(session.record(), &complete_member_record());
    assert!(session.view().last_error.is_some());

    session
        .edit(RecordEdit::PortfolioUrl(Some(
            "https://example.org/ada".to_string(),
        )))
        .expect("edits allowed after failure");
    assert_eq!(session.state(), &FlowState::Editing);

    submissions.set_offline(false);
    session.submit().await.expect("retry succeeds");
    assert_eq!(submissions.calls(), 2);
    assert!(session.view().last_error.is_none());
}

#[tokio::test]
async fn submit_waits_for_pending_uploads() {
    let (mut session, _, submissions) = event_session();
    accept_terms(&mut session);
    session
        .edit(RecordEdit::ContactEmail(Some("ada@example.org".to_string())))
        .expect("edit accepted");
    session
        .edit(RecordEdit::Motivation(words(20)))
        .expect("edit accepted");
    session
        .select_file(UploadSlot::Photo, photo("badge.jpg"))
        .expect("registered");
    assert!(!session.can_submit());

    session.submit().await.expect("upload settles before submit");
    let sent = &submissions.received()[0];
    assert_eq!(sent.record.profile_photo_ref.as_deref(), Some("badge.jpg"));
    assert_eq!(sent.record.document_ref, None);
}
