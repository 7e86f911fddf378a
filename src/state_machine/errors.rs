use thiserror::Error;

use super::states::{ExecutionStatus, StopStatus};
use crate::models::{CheckpointId, OperatorId, RouteId, StopId, StopType, UnloadingAnswer};

/// Comprehensive error types for state machine operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateMachineError {
    #[error("Guard condition failed: {0}")]
    GuardFailed(#[from] GuardError),

    #[error("Invalid state transition from {from:?} on {event}")]
    InvalidTransition { from: Option<String>, event: String },

    #[error("Payload validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Action execution failed: {reason}")]
    ActionFailed { reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Specific error type for guard condition failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GuardError {
    #[error("Stop {stop_id} is already {status}")]
    StopNotPending { stop_id: StopId, status: StopStatus },

    #[error("Stop {stop_id} is a {stop_type} stop but the confirmation is for a {payload_type} stop")]
    ConfirmationMismatch {
        stop_id: StopId,
        stop_type: StopType,
        payload_type: StopType,
    },

    #[error("Route {route_id} still has {pending} pending stops")]
    StopsRemaining { route_id: RouteId, pending: usize },

    #[error("Operator {operator_id} is not assigned to route {route_id}")]
    NotAssignedOperator {
        route_id: RouteId,
        operator_id: OperatorId,
    },

    #[error("Route {route_id} is {status}")]
    RouteNotActive {
        route_id: RouteId,
        status: ExecutionStatus,
    },
}

/// Rejections of operator input before anything is queued or committed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("A signature may only be attached when unloading is confirmed (answer was {answer:?})")]
    SignatureWithoutUnloading { answer: UnloadingAnswer },

    #[error("Empty image payload in {field}")]
    EmptyImage { field: &'static str },

    #[error("Missing required fields for {stop_type} stop: {}", .fields.join(", "))]
    MissingFields {
        stop_type: StopType,
        fields: Vec<&'static str>,
    },

    #[error("A {form_type} form cannot confirm a {stop_type} stop")]
    FormMismatch {
        stop_type: StopType,
        form_type: StopType,
    },

    #[error("Checkpoint id {id} does not match its route, stop and creation time")]
    InconsistentCheckpointId { id: CheckpointId },

    #[error("Stop {stop_id} is not pending (status {status})")]
    StopNotPending { stop_id: StopId, status: StopStatus },
}

/// Specific error type for action execution failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    #[error("Event publishing failed: {event_name}")]
    EventPublishFailed { event_name: String },

    #[error("Action timeout: {action}")]
    Timeout { action: String },
}

impl From<ActionError> for StateMachineError {
    fn from(err: ActionError) -> Self {
        Self::ActionFailed {
            reason: err.to_string(),
        }
    }
}

/// Result type alias for state machine operations
pub type StateMachineResult<T> = Result<T, StateMachineError>;
pub type GuardResult<T> = Result<T, GuardError>;
pub type ActionResult<T> = Result<T, ActionError>;

/// Helper function to create internal errors
pub fn internal_error(msg: impl Into<String>) -> StateMachineError {
    StateMachineError::Internal(msg.into())
}
