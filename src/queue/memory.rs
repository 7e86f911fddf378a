use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;

use super::snapshot::RouteCache;
use super::{ensure_consistent, CheckpointQueue, EnqueueOutcome, QueueResult};
use crate::models::{CheckpointId, PendingCheckpoint, Route, RouteId};

/// Process-lifetime queue with the same ordering and idempotency rules as the
/// SQLite backend
#[derive(Debug, Default)]
pub struct InMemoryCheckpointQueue {
    entries: Mutex<Vec<PendingCheckpoint>>,
}

impl InMemoryCheckpointQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointQueue for InMemoryCheckpointQueue {
    async fn enqueue(&self, checkpoint: &PendingCheckpoint) -> QueueResult<EnqueueOutcome> {
        ensure_consistent(checkpoint)?;

        let mut entries = self.entries.lock();
        if entries.iter().any(|entry| entry.id == checkpoint.id) {
            return Ok(EnqueueOutcome::AlreadyQueued);
        }
        entries.push(checkpoint.clone());
        Ok(EnqueueOutcome::Inserted)
    }

    async fn list(&self) -> QueueResult<Vec<PendingCheckpoint>> {
        Ok(self.entries.lock().clone())
    }

    async fn list_for_route(&self, route_id: &RouteId) -> QueueResult<Vec<PendingCheckpoint>> {
        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|entry| &entry.route_id == route_id)
            .cloned()
            .collect())
    }

    async fn get(&self, id: &CheckpointId) -> QueueResult<Option<PendingCheckpoint>> {
        Ok(self.entries.lock().iter().find(|entry| &entry.id == id).cloned())
    }

    async fn remove(&self, id: &CheckpointId) -> QueueResult<bool> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|entry| &entry.id != id);
        Ok(entries.len() != before)
    }

    async fn len(&self) -> QueueResult<usize> {
        Ok(self.entries.lock().len())
    }
}

/// Route snapshot cache kept in memory
#[derive(Debug, Default)]
pub struct InMemoryRouteCache {
    routes: RwLock<HashMap<RouteId, Route>>,
}

impl InMemoryRouteCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RouteCache for InMemoryRouteCache {
    async fn save_route(&self, route: &Route) -> QueueResult<()> {
        self.routes.write().insert(route.id.clone(), route.clone());
        Ok(())
    }

    async fn load_route(&self, route_id: &RouteId) -> QueueResult<Option<Route>> {
        Ok(self.routes.read().get(route_id).cloned())
    }

    async fn remove_route(&self, route_id: &RouteId) -> QueueResult<bool> {
        Ok(self.routes.write().remove(route_id).is_some())
    }

    async fn load_all(&self) -> QueueResult<Vec<Route>> {
        let mut routes: Vec<Route> = self.routes.read().values().cloned().collect();
        routes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(routes)
    }
}
