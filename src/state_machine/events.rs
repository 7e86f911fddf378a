use serde::{Deserialize, Serialize};

use crate::models::{CheckpointOutcome, Confirmation, SkipReason};

/// Events that can trigger stop state transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StopEvent {
    /// Check the stop in with a validated confirmation
    Complete(Confirmation),
    /// Skip the stop for the given reason
    Skip(SkipReason),
}

impl StopEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Complete(_) => "complete",
            Self::Skip(_) => "skip",
        }
    }
}

impl From<&CheckpointOutcome> for StopEvent {
    fn from(outcome: &CheckpointOutcome) -> Self {
        match outcome {
            CheckpointOutcome::Completed { confirmation } => Self::Complete(confirmation.clone()),
            CheckpointOutcome::Skipped { reason } => Self::Skip(*reason),
        }
    }
}

/// Events that can trigger route execution transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RouteEvent {
    /// Operator starts driving the route
    Start,
    /// Last pending stop reached a terminal state
    Finish,
    /// Back office cancelled the route
    Cancel,
}

impl RouteEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Finish => "finish",
            Self::Cancel => "cancel",
        }
    }
}
