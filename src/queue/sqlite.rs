use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info};

use super::snapshot::SqliteRouteCache;
use super::{
    ensure_consistent, CheckpointQueue, EnqueueOutcome, QuarantinedEntry, QueueError, QueueResult,
};
use crate::models::{CheckpointId, PendingCheckpoint, RouteId};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS pending_checkpoints (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        checkpoint_id TEXT NOT NULL UNIQUE,
        route_id TEXT NOT NULL,
        stop_id TEXT NOT NULL,
        outcome TEXT NOT NULL,
        payload TEXT NOT NULL,
        created_at TEXT NOT NULL,
        enqueued_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_pending_checkpoints_route ON pending_checkpoints (route_id, seq)",
    r#"
    CREATE TABLE IF NOT EXISTS quarantined_checkpoints (
        checkpoint_id TEXT PRIMARY KEY,
        route_id TEXT NOT NULL,
        payload TEXT NOT NULL,
        reason TEXT NOT NULL,
        quarantined_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS saved_routes (
        route_id TEXT PRIMARY KEY,
        payload TEXT NOT NULL,
        saved_at TEXT NOT NULL
    )
    "#,
];

/// Local SQLite database backing the offline queue and the route cache
#[derive(Debug, Clone)]
pub struct OfflineDatabase {
    pool: SqlitePool,
}

impl OfflineDatabase {
    /// Open (creating if needed) the database file at `path`
    pub async fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> QueueResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let database = Self { pool };
        database.migrate().await?;

        info!(path = %path.as_ref().display(), "💾 Offline database opened");
        Ok(database)
    }

    /// Private in-memory database, mostly for tests
    pub async fn in_memory() -> QueueResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // Every connection to :memory: is a separate database, so pin exactly one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let database = Self { pool };
        database.migrate().await?;
        Ok(database)
    }

    async fn migrate(&self) -> QueueResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("📋 Offline database schema ready");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn checkpoint_queue(&self) -> SqliteCheckpointQueue {
        SqliteCheckpointQueue::new(self.clone())
    }

    pub fn route_cache(&self) -> SqliteRouteCache {
        SqliteRouteCache::new(self.clone())
    }

    /// Close every pooled connection, flushing the WAL
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Offline queue persisted in SQLite.
///
/// Payloads are stored as self-describing JSON; the insertion sequence column
/// defines the replay order. Rows that fail to decode while listing are moved
/// to `quarantined_checkpoints` in the same transaction that deletes them.
#[derive(Debug, Clone)]
pub struct SqliteCheckpointQueue {
    database: OfflineDatabase,
}

impl SqliteCheckpointQueue {
    pub fn new(database: OfflineDatabase) -> Self {
        Self { database }
    }

    async fn decode_or_quarantine(
        &self,
        rows: Vec<(String, String)>,
    ) -> QueueResult<Vec<PendingCheckpoint>> {
        let mut entries = Vec::with_capacity(rows.len());
        for (id, payload) in rows {
            match decode_entry(&id, &payload) {
                Ok(checkpoint) => entries.push(checkpoint),
                Err(decode_error) => self.quarantine(&id, &decode_error).await?,
            }
        }
        Ok(entries)
    }

    async fn quarantine(&self, id: &str, reason: &QueueError) -> QueueResult<()> {
        let mut tx = self.database.pool().begin().await?;
        sqlx::query(
            "INSERT OR REPLACE INTO quarantined_checkpoints
                 (checkpoint_id, route_id, payload, reason, quarantined_at)
             SELECT checkpoint_id, route_id, payload, ?, ?
               FROM pending_checkpoints WHERE checkpoint_id = ?",
        )
        .bind(reason.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM pending_checkpoints WHERE checkpoint_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        error!(
            checkpoint_id = id,
            error = %reason,
            "☣️ Unreadable queue entry moved to quarantine"
        );
        Ok(())
    }
}

fn decode_entry(id: &str, payload: &str) -> QueueResult<PendingCheckpoint> {
    let checkpoint: PendingCheckpoint = serde_json::from_str(payload)?;
    if checkpoint.id.as_str() != id {
        return Err(QueueError::Corrupt {
            id: id.to_string(),
            reason: format!("payload carries id {}", checkpoint.id),
        });
    }
    Ok(checkpoint)
}

#[async_trait]
impl CheckpointQueue for SqliteCheckpointQueue {
    async fn enqueue(&self, checkpoint: &PendingCheckpoint) -> QueueResult<EnqueueOutcome> {
        ensure_consistent(checkpoint)?;
        let payload = serde_json::to_string(checkpoint)?;

        let result = sqlx::query(
            "INSERT OR IGNORE INTO pending_checkpoints
                 (checkpoint_id, route_id, stop_id, outcome, payload, created_at, enqueued_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(checkpoint.id.as_str())
        .bind(checkpoint.route_id.as_str())
        .bind(checkpoint.stop_id.as_str())
        .bind(checkpoint.outcome.kind())
        .bind(&payload)
        .bind(checkpoint.created_at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(self.database.pool())
        .await?;

        if result.rows_affected() == 0 {
            debug!(checkpoint_id = %checkpoint.id, "🔁 Checkpoint already queued");
            Ok(EnqueueOutcome::AlreadyQueued)
        } else {
            debug!(checkpoint_id = %checkpoint.id, "📥 Checkpoint queued durably");
            Ok(EnqueueOutcome::Inserted)
        }
    }

    async fn list(&self) -> QueueResult<Vec<PendingCheckpoint>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT checkpoint_id, payload FROM pending_checkpoints ORDER BY seq",
        )
        .fetch_all(self.database.pool())
        .await?;
        self.decode_or_quarantine(rows).await
    }

    async fn list_for_route(&self, route_id: &RouteId) -> QueueResult<Vec<PendingCheckpoint>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT checkpoint_id, payload FROM pending_checkpoints WHERE route_id = ? ORDER BY seq",
        )
        .bind(route_id.as_str())
        .fetch_all(self.database.pool())
        .await?;
        self.decode_or_quarantine(rows).await
    }

    async fn get(&self, id: &CheckpointId) -> QueueResult<Option<PendingCheckpoint>> {
        let payload = sqlx::query_scalar::<_, String>(
            "SELECT payload FROM pending_checkpoints WHERE checkpoint_id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(self.database.pool())
        .await?;

        payload
            .map(|payload| decode_entry(id.as_str(), &payload))
            .transpose()
    }

    async fn remove(&self, id: &CheckpointId) -> QueueResult<bool> {
        let result = sqlx::query("DELETE FROM pending_checkpoints WHERE checkpoint_id = ?")
            .bind(id.as_str())
            .execute(self.database.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn len(&self) -> QueueResult<usize> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM pending_checkpoints")
            .fetch_one(self.database.pool())
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn quarantined(&self) -> QueueResult<Vec<QuarantinedEntry>> {
        let rows = sqlx::query_as::<_, (String, String, String, String)>(
            "SELECT checkpoint_id, route_id, payload, reason
               FROM quarantined_checkpoints ORDER BY quarantined_at",
        )
        .fetch_all(self.database.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(checkpoint_id, route_id, payload, reason)| QuarantinedEntry {
                checkpoint_id,
                route_id,
                payload,
                reason,
            })
            .collect())
    }
}
