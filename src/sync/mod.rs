//! # Checkpoint Synchronization
//!
//! Everything between a queued checkpoint and its authoritative commit:
//!
//! - [`CheckpointApplier`]: the one commit path, shared by online submission
//!   and the drain
//! - [`SyncCoordinator`]: serialized drain passes with per-entry failure
//!   isolation, retraction and the observable pending count
//! - [`SyncScheduler`]: connectivity, explicit and backoff-driven triggers
//! - [`CheckpointSubmitter`]: validate, enqueue, then try to commit online
//! - [`StandardErrorClassifier`]: transient versus permanent failures

pub mod applier;
pub mod backoff;
pub mod coordinator;
pub mod error_classifier;
pub mod scheduler;
pub mod submitter;

pub use applier::{ApplyError, ApplyOutcome, CheckpointApplier};
pub use backoff::BackoffCalculator;
pub use coordinator::{DrainReport, PermanentFailure, SyncCoordinator, SyncError, SyncTrigger};
pub use error_classifier::{
    ErrorCategory, ErrorClassification, ErrorClassifier, StandardErrorClassifier,
};
pub use scheduler::{SyncHandle, SyncScheduler};
pub use submitter::{CheckpointSubmitter, SubmitError, SubmitOutcome};
