//! Crate-level error type.
//!
//! Each layer keeps its own error enum; [`WaypointError`] unifies them for
//! callers that drive the whole runtime.

use thiserror::Error;

use crate::config::ConfigurationError;
use crate::orchestration::OrchestrationError;
use crate::queue::QueueError;
use crate::services::{LocationError, StoreError};
use crate::state_machine::{StateMachineError, ValidationError};
use crate::sync::{ApplyError, SubmitError, SyncError};

#[derive(Debug, Error)]
pub enum WaypointError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("State transition error: {0}")]
    StateTransition(#[from] StateMachineError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Commit error: {0}")]
    Apply(#[from] ApplyError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Submission error: {0}")]
    Submit(#[from] SubmitError),

    #[error("Orchestration error: {0}")]
    Orchestration(#[from] OrchestrationError),

    #[error("Location error: {0}")]
    Location(#[from] LocationError),
}

impl WaypointError {
    /// Whether retrying the same operation later may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Store(error) => error.is_transient(),
            Self::Apply(error) => error.is_transient(),
            Self::Orchestration(OrchestrationError::Store(error)) => error.is_transient(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, WaypointError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_layer_errors_convert_and_classify() {
        let error: WaypointError = StoreError::Timeout(Duration::from_secs(3)).into();
        assert!(error.is_transient());
        assert!(error.to_string().starts_with("Store error"));

        let error: WaypointError = ValidationError::SignatureWithoutUnloading {
            answer: crate::models::UnloadingAnswer::No,
        }
        .into();
        assert!(!error.is_transient());
    }
}
