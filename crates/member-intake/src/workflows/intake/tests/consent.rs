use super::common::*;
use crate::workflows::intake::{ScrollGate, DEFAULT_UNLOCK_THRESHOLD};

#[test]
fn consent_stays_locked_until_terms_pass_threshold() {
    let (mut session, _, _) = member_session();

    let state = session.observe_terms(scrolled_to(0.0));
    assert!(!state.unlocked);
    assert!(!session.set_consent(true).accepted);

    let state = session.observe_terms(scrolled_to(500.0));
    assert_eq!(state.scroll_progress, 50.0);
    assert!(!state.unlocked);

    let state = session.observe_terms(scrolled_to(910.0));
    assert!(state.unlocked);

    let state = session.observe_terms(scrolled_to(100.0));
    assert!(state.unlocked, "scrolling back up never re-locks consent");
    assert!(session.set_consent(true).accepted);
}

#[test]
fn short_terms_unlock_on_mount() {
    let (mut session, _, _) = member_session();
    let state = session.observe_terms(short_terms());
    assert_eq!(state.scroll_progress, 100.0);
    assert!(state.unlocked);
    assert!(!state.accepted);
}

#[test]
fn consent_can_be_withdrawn_once_unlocked() {
    let (mut session, _, _) = member_session();
    accept_terms(&mut session);
    assert!(session.consent().accepted);

    let state = session.set_consent(false);
    assert!(state.unlocked);
    assert!(!state.accepted);
}

#[test]
fn session_threshold_override_applies() {
    let (session, _, _) = member_session();
    let mut session = session.with_consent_threshold(40.0);
    assert!(session.observe_terms(scrolled_to(450.0)).unlocked);

    let mut gate = ScrollGate::new(f64::NAN);
    assert_eq!(gate.threshold(), DEFAULT_UNLOCK_THRESHOLD);
    assert!(!gate.record_progress(DEFAULT_UNLOCK_THRESHOLD).unlocked);
}
