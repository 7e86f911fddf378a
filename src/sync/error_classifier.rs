//! # Sync Error Classification
//!
//! Maps a failed checkpoint commit onto the handling the drain applies to it.
//!
//! | Category        | Transient | Drain behaviour                                  |
//! |-----------------|-----------|--------------------------------------------------|
//! | `Network`       | yes       | keep entry, halt the pass, retry with backoff    |
//! | `Timeout`       | yes       | keep entry, halt the pass, retry with backoff    |
//! | `Unavailable`   | yes       | keep entry, halt the pass, retry with backoff    |
//! | `Authorization` | no        | keep entry, surface, block the route this pass   |
//! | `Validation`    | no        | keep entry, surface, block the route this pass   |
//! | `Data`          | no        | keep entry, surface, block the route this pass   |

use serde::{Deserialize, Serialize};
use std::fmt;

use super::applier::ApplyError;
use crate::services::StoreError;

/// Primary error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Connection dropped or refused
    Network,

    /// The store did not answer within the configured timeout
    Timeout,

    /// The store answered but is temporarily unable to serve
    Unavailable,

    /// Caller not allowed to touch the route
    Authorization,

    /// Payload or transition rejected by the state machine
    Validation,

    /// The store rejected the data, or the route is not in a state that accepts it
    Data,
}

impl ErrorCategory {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::Unavailable)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Network => write!(f, "Network"),
            ErrorCategory::Timeout => write!(f, "Timeout"),
            ErrorCategory::Unavailable => write!(f, "Unavailable"),
            ErrorCategory::Authorization => write!(f, "Authorization"),
            ErrorCategory::Validation => write!(f, "Validation"),
            ErrorCategory::Data => write!(f, "Data"),
        }
    }
}

/// Result of error classification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorClassification {
    pub category: ErrorCategory,
    pub is_transient: bool,
    /// Short stable code for logs and status events
    pub error_code: &'static str,
    pub message: String,
}

/// Strategy for classifying commit failures
pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, error: &ApplyError) -> ErrorClassification;

    fn classifier_name(&self) -> &'static str;
}

/// Default classification used by the drain and the online submitter
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardErrorClassifier;

impl StandardErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    fn classify_store_error(error: &StoreError) -> (ErrorCategory, &'static str) {
        match error {
            StoreError::Network(_) => (ErrorCategory::Network, "STORE_NETWORK"),
            StoreError::Timeout(_) => (ErrorCategory::Timeout, "STORE_TIMEOUT"),
            StoreError::Unavailable(_) => (ErrorCategory::Unavailable, "STORE_UNAVAILABLE"),
            StoreError::Unauthorized(_) => (ErrorCategory::Authorization, "STORE_UNAUTHORIZED"),
            StoreError::RouteNotFound(_) | StoreError::StopNotFound { .. } => {
                (ErrorCategory::Data, "STORE_NOT_FOUND")
            }
            StoreError::Rejected(_) => (ErrorCategory::Data, "STORE_REJECTED"),
        }
    }
}

impl ErrorClassifier for StandardErrorClassifier {
    fn classify(&self, error: &ApplyError) -> ErrorClassification {
        let (category, error_code) = match error {
            ApplyError::Store(store_error) => Self::classify_store_error(store_error),
            ApplyError::NotAssignedOperator { .. } => {
                (ErrorCategory::Authorization, "NOT_ASSIGNED_OPERATOR")
            }
            ApplyError::RouteNotStarted { .. } => (ErrorCategory::Data, "ROUTE_NOT_STARTED"),
            ApplyError::Rejected(_) => (ErrorCategory::Validation, "TRANSITION_REJECTED"),
        };

        ErrorClassification {
            category,
            is_transient: category.is_transient(),
            error_code,
            message: error.to_string(),
        }
    }

    fn classifier_name(&self) -> &'static str {
        "standard"
    }
}
