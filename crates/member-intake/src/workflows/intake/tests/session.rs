use super::common::*;
use crate::workflows::intake::{
    BackOutcome, FlowKind, FlowState, IntakeError, LeaveDecision, PrimaryAction, RecordEdit,
    SectionId, UploadSlot, UploadStatus,
};

#[test]
fn hydrated_record_leaves_without_prompt() {
    let (mut session, _, _) = member_session();
    session
        .hydrate(complete_member_record())
        .expect("hydrates while idle");

    assert!(!session.is_dirty());
    assert_eq!(session.state(), &FlowState::Idle);
    assert_eq!(session.back(), BackOutcome::Leave(LeaveDecision::DiscardNow));

    let draft = session.discard(false).expect("clean record discards");
    assert_eq!(draft, complete_member_record());
    assert!(session.is_disposed());
}

#[test]
fn edited_record_requires_confirmation() {
    let (mut session, _, _) = member_session();
    session
        .hydrate(complete_member_record())
        .expect("hydrates while idle");
    session
        .edit(RecordEdit::Motivation(words(55)))
        .expect("edit accepted");

    assert_eq!(session.state(), &FlowState::Editing);
    assert_eq!(
        session.back(),
        BackOutcome::Leave(LeaveDecision::ConfirmDiscard)
    );
    assert!(matches!(
        session.discard(false),
        Err(IntakeError::ConfirmationRequired)
    ));
    assert!(!session.is_disposed());

    let draft = session.discard(true).expect("confirmed discard");
    assert_eq!(draft.motivation_text, Some(words(55)));
    assert!(matches!(
        session.edit(RecordEdit::Motivation(words(3))),
        Err(IntakeError::Disposed)
    ));
}

#[test]
fn marking_saved_clears_the_prompt() {
    let (mut session, _, _) = member_session();
    session
        .edit(RecordEdit::Referral(None))
        .expect("edit accepted");
    assert_eq!(session.leave_decision(), LeaveDecision::ConfirmDiscard);

    session.mark_saved();
    assert_eq!(session.leave_decision(), LeaveDecision::DiscardNow);
}

#[test]
fn hydration_keeps_the_session_subject_when_profile_has_none() {
    let (mut session, _, _) = member_session();
    let mut profile = complete_member_record();
    profile.subject_id = None;
    session.hydrate(profile).expect("hydrates while idle");
    assert_eq!(session.record().subject_id, Some(subject()));
}

#[test]
fn view_reflects_the_blueprint() {
    let (mut session, _, _) = member_session();
    session
        .edit(RecordEdit::Motivation(words(12)))
        .expect("edit accepted");
    let view = session.view();

    assert_eq!(view.flow, FlowKind::MemberApplication);
    assert_eq!(view.active_section, SectionId::Profile);
    assert_eq!(view.primary_action, PrimaryAction::Continue);
    assert_eq!(view.sections.len(), 3);
    assert_eq!(
        view.motivation_prompt,
        "Tell us why you would like to join (minimum 50 words)."
    );
    assert_eq!(view.motivation_words, 12);
    assert_eq!(view.referral_options.len(), 2);
    assert_eq!(view.specialization_options.len(), 6);
    assert_eq!(view.upload(UploadSlot::Photo), UploadStatus::Idle);
    assert!(view.field_errors.contains(crate::workflows::intake::FieldName::MotivationText));
    assert!(view.dirty);
    assert!(!view.can_submit);
}

#[test]
fn event_view_uses_its_own_threshold() {
    let (session, _, _) = event_session();
    let view = session.view();
    assert_eq!(view.flow, FlowKind::EventRegistration);
    assert_eq!(view.active_section, SectionId::Attendee);
    assert_eq!(
        view.motivation_prompt,
        "Tell us why you would like to attend (minimum 20 words)."
    );
    assert!(view.specialization_options.is_empty());
}

#[test]
fn view_serializes_for_rendering() {
    let (session, _, _) = member_session();
    let payload = serde_json::to_value(session.view()).expect("view serializes");
    assert_eq!(payload["state"]["state"], "idle");
    assert_eq!(payload["uploads"]["photo"]["status"], "idle");
    assert_eq!(payload["primary_action"], "continue");
    assert!(payload.get("last_error").is_none());
}
