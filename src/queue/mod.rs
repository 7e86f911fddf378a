//! # Offline Checkpoint Queue
//!
//! Durable, append-only store of checkpoints that have been accepted from the
//! operator but not yet committed to the authoritative store.
//!
//! ## Guarantees
//!
//! - An entry is durable once `enqueue` returns; nothing is sent to the network
//!   before that point.
//! - Entries keep their identity across restarts and retries. Enqueuing an id
//!   that is already present is a no-op reported as [`EnqueueOutcome::AlreadyQueued`].
//! - `list` returns entries in insertion order, which is the replay order.
//! - An entry only leaves the queue through `remove`, after a confirmed commit
//!   or an explicit drop decision.
//! - An entry that can no longer be decoded is moved aside into a quarantine
//!   when it is listed, so it never blocks the entries behind it. Quarantined
//!   entries are kept for manual inspection.
//!
//! ## Backends
//!
//! - [`SqliteCheckpointQueue`]: production backend on an [`OfflineDatabase`]
//!   (WAL journal, full synchronous writes).
//! - [`InMemoryCheckpointQueue`]: same semantics, process lifetime only.
//!
//! The same database also holds the route snapshot cache ([`RouteCache`]) so the
//! last known state of every active route survives a restart while offline.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{CheckpointId, PendingCheckpoint, RouteId};
use crate::state_machine::ValidationError;

pub mod memory;
pub mod snapshot;
pub mod sqlite;

pub use memory::{InMemoryCheckpointQueue, InMemoryRouteCache};
pub use snapshot::{RouteCache, SqliteRouteCache};
pub use sqlite::{OfflineDatabase, SqliteCheckpointQueue};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Local storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid checkpoint: {0}")]
    Invalid(#[from] ValidationError),

    #[error("Corrupt queue entry {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

pub type QueueResult<T> = Result<T, QueueError>;

/// Result of an enqueue call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Inserted,
    AlreadyQueued,
}

/// Raw queue row set aside because it could not be decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuarantinedEntry {
    pub checkpoint_id: String,
    pub route_id: String,
    pub payload: String,
    pub reason: String,
}

/// Durable queue of checkpoints awaiting authoritative commit
#[async_trait]
pub trait CheckpointQueue: Send + Sync + 'static {
    /// Persist `checkpoint`; returns once the entry is durable
    async fn enqueue(&self, checkpoint: &PendingCheckpoint) -> QueueResult<EnqueueOutcome>;

    /// All entries, oldest first
    async fn list(&self) -> QueueResult<Vec<PendingCheckpoint>>;

    /// Entries of one route, oldest first
    async fn list_for_route(&self, route_id: &RouteId) -> QueueResult<Vec<PendingCheckpoint>>;

    async fn get(&self, id: &CheckpointId) -> QueueResult<Option<PendingCheckpoint>>;

    /// Delete an entry; returns whether it existed
    async fn remove(&self, id: &CheckpointId) -> QueueResult<bool>;

    async fn len(&self) -> QueueResult<usize>;

    async fn is_empty(&self) -> QueueResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Entries removed from replay because their payload was unreadable
    async fn quarantined(&self) -> QueueResult<Vec<QuarantinedEntry>> {
        Ok(Vec::new())
    }
}

/// Reject checkpoints whose id no longer matches its derivation
pub(crate) fn ensure_consistent(checkpoint: &PendingCheckpoint) -> QueueResult<()> {
    if checkpoint.has_consistent_id() {
        Ok(())
    } else {
        Err(ValidationError::InconsistentCheckpointId {
            id: checkpoint.id.clone(),
        }
        .into())
    }
}
