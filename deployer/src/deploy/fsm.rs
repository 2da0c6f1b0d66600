//! Finite State Machine for a deployment request

use serde::{Deserialize, Serialize};

/// Request state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    /// Received, secret not yet checked
    Unauthenticated,

    /// Secret matched and required fields present
    Validated,

    /// Target repository exists
    RepoEnsured,

    /// License, artifact, narrative and attachments reconciled
    FilesReconciled,

    /// Publishing attempted (best effort)
    Published,

    /// Evaluator acknowledged the completion report
    Notified,

    /// Every notification attempt failed
    NotificationFailed,

    /// Aborted before notification
    Failed,
}

/// Request event
#[derive(Debug, Clone)]
pub enum RequestEvent {
    Validate,
    RepoEnsured,
    FilesReconciled,
    PublishAttempted,
    NotifySucceeded,
    NotifyFailed(String),
    Abort(String),
}

/// Request FSM
#[derive(Debug, Clone)]
pub struct RequestFsm {
    state: RequestState,
    error: Option<String>,
}

impl RequestFsm {
    /// Create a new FSM in the unauthenticated state
    pub fn new() -> Self {
        Self {
            state: RequestState::Unauthenticated,
            error: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> &RequestState {
        &self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            RequestState::Notified | RequestState::NotificationFailed | RequestState::Failed
        )
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: RequestEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            (RequestState::Unauthenticated, RequestEvent::Validate) => RequestState::Validated,
            (RequestState::Validated, RequestEvent::RepoEnsured) => RequestState::RepoEnsured,
            (RequestState::RepoEnsured, RequestEvent::FilesReconciled) => {
                RequestState::FilesReconciled
            }
            (RequestState::FilesReconciled, RequestEvent::PublishAttempted) => {
                RequestState::Published
            }
            (RequestState::Published, RequestEvent::NotifySucceeded) => RequestState::Notified,
            (RequestState::Published, RequestEvent::NotifyFailed(err)) => {
                self.error = Some(err.clone());
                RequestState::NotificationFailed
            }

            // Any non-terminal state can abort
            (state, RequestEvent::Abort(err))
                if !matches!(
                    state,
                    RequestState::Notified | RequestState::NotificationFailed | RequestState::Failed
                ) =>
            {
                self.error = Some(err.clone());
                RequestState::Failed
            }

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }
}

impl Default for RequestFsm {
    fn default() -> Self {
        Self::new()
    }
}
