//! FSM unit tests

use llm_deployer::deploy::fsm::{RequestEvent, RequestFsm, RequestState};

fn validated() -> RequestFsm {
    let mut fsm = RequestFsm::new();
    fsm.process(RequestEvent::Validate).unwrap();
    fsm
}

#[test]
fn test_fsm_initial_state() {
    let fsm = RequestFsm::new();
    assert_eq!(fsm.state(), &RequestState::Unauthenticated);
    assert!(fsm.error().is_none());
    assert!(!fsm.is_terminal());
}

#[test]
fn test_fsm_success_flow() {
    let mut fsm = validated();

    fsm.process(RequestEvent::RepoEnsured).unwrap();
    assert_eq!(fsm.state(), &RequestState::RepoEnsured);

    fsm.process(RequestEvent::FilesReconciled).unwrap();
    assert_eq!(fsm.state(), &RequestState::FilesReconciled);

    fsm.process(RequestEvent::PublishAttempted).unwrap();
    assert_eq!(fsm.state(), &RequestState::Published);

    fsm.process(RequestEvent::NotifySucceeded).unwrap();
    assert_eq!(fsm.state(), &RequestState::Notified);
    assert!(fsm.is_terminal());
}

#[test]
fn test_fsm_notification_failure() {
    let mut fsm = validated();
    fsm.process(RequestEvent::RepoEnsured).unwrap();
    fsm.process(RequestEvent::FilesReconciled).unwrap();
    fsm.process(RequestEvent::PublishAttempted).unwrap();
    fsm.process(RequestEvent::NotifyFailed("5 attempts failed".to_string()))
        .unwrap();

    assert_eq!(fsm.state(), &RequestState::NotificationFailed);
    assert_eq!(fsm.error(), Some("5 attempts failed"));
    assert!(fsm.is_terminal());
}

#[test]
fn test_fsm_rejected_before_validation() {
    let mut fsm = RequestFsm::new();
    fsm.process(RequestEvent::Abort("Invalid secret".to_string()))
        .unwrap();

    assert_eq!(fsm.state(), &RequestState::Failed);
    assert_eq!(fsm.error(), Some("Invalid secret"));
}

#[test]
fn test_fsm_abort_mid_flight() {
    let mut fsm = validated();
    fsm.process(RequestEvent::RepoEnsured).unwrap();
    fsm.process(RequestEvent::Abort("generation failed".to_string()))
        .unwrap();

    assert_eq!(fsm.state(), &RequestState::Failed);
    assert!(fsm.process(RequestEvent::FilesReconciled).is_err());
}

#[test]
fn test_fsm_steps_cannot_be_skipped() {
    let mut fsm = RequestFsm::new();
    assert!(fsm.process(RequestEvent::RepoEnsured).is_err());

    let mut fsm = validated();
    assert!(fsm.process(RequestEvent::PublishAttempted).is_err());
    assert!(fsm.process(RequestEvent::NotifySucceeded).is_err());
    assert_eq!(fsm.state(), &RequestState::Validated);
}

#[test]
fn test_fsm_terminal_states_are_final() {
    let mut fsm = validated();
    fsm.process(RequestEvent::Abort("boom".to_string())).unwrap();
    assert!(fsm.process(RequestEvent::Abort("again".to_string())).is_err());
    assert_eq!(fsm.error(), Some("boom"));
}
