//! # Stop and Route State Machines
//!
//! Per-stop lifecycle (`pending -> completed | skipped`) and per-route
//! execution lifecycle (`pending -> in-progress -> completed`, plus
//! cancellation). Transitions are computed as pure values, persisted by the
//! caller, and followed by post-commit actions that publish lifecycle events.

pub mod actions;
pub mod confirmation_form;
pub mod errors;
pub mod events;
pub mod guards;
pub mod route_state_machine;
pub mod states;
pub mod stop_state_machine;

// Re-export main types for convenient access
pub use confirmation_form::{
    can_confirm, ConfirmationForm, DestinationForm, IntermediateForm, OriginForm,
};
pub use errors::{ActionError, GuardError, StateMachineError, StateMachineResult, ValidationError};
pub use events::{RouteEvent, StopEvent};
pub use route_state_machine::{RouteStateMachine, RouteTransition};
pub use states::{ExecutionStatus, StopStatus};
pub use stop_state_machine::{StopStateMachine, StopTransition};

// Common traits
pub use actions::StateAction;
pub use guards::{AssignedOperatorGuard, StateGuard};
