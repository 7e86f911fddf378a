use async_trait::async_trait;
use chrono::Utc;

use super::sqlite::OfflineDatabase;
use super::QueueResult;
use crate::models::{Route, RouteId};

/// Last known state of each active route, kept for offline restarts
#[async_trait]
pub trait RouteCache: Send + Sync + 'static {
    async fn save_route(&self, route: &Route) -> QueueResult<()>;

    async fn load_route(&self, route_id: &RouteId) -> QueueResult<Option<Route>>;

    async fn remove_route(&self, route_id: &RouteId) -> QueueResult<bool>;

    /// Every cached route, ordered by id
    async fn load_all(&self) -> QueueResult<Vec<Route>>;
}

#[derive(Debug, Clone)]
pub struct SqliteRouteCache {
    database: OfflineDatabase,
}

impl SqliteRouteCache {
    pub fn new(database: OfflineDatabase) -> Self {
        Self { database }
    }
}

#[async_trait]
impl RouteCache for SqliteRouteCache {
    async fn save_route(&self, route: &Route) -> QueueResult<()> {
        let payload = serde_json::to_string(route)?;
        sqlx::query(
            "INSERT INTO saved_routes (route_id, payload, saved_at) VALUES (?, ?, ?)
             ON CONFLICT(route_id) DO UPDATE SET payload = excluded.payload, saved_at = excluded.saved_at",
        )
        .bind(route.id.as_str())
        .bind(&payload)
        .bind(Utc::now().to_rfc3339())
        .execute(self.database.pool())
        .await?;
        Ok(())
    }

    async fn load_route(&self, route_id: &RouteId) -> QueueResult<Option<Route>> {
        let payload =
            sqlx::query_scalar::<_, String>("SELECT payload FROM saved_routes WHERE route_id = ?")
                .bind(route_id.as_str())
                .fetch_optional(self.database.pool())
                .await?;

        Ok(payload
            .map(|payload| serde_json::from_str(&payload))
            .transpose()?)
    }

    async fn remove_route(&self, route_id: &RouteId) -> QueueResult<bool> {
        let result = sqlx::query("DELETE FROM saved_routes WHERE route_id = ?")
            .bind(route_id.as_str())
            .execute(self.database.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn load_all(&self) -> QueueResult<Vec<Route>> {
        let payloads =
            sqlx::query_scalar::<_, String>("SELECT payload FROM saved_routes ORDER BY route_id")
                .fetch_all(self.database.pool())
                .await?;

        payloads
            .iter()
            .map(|payload| serde_json::from_str(payload).map_err(Into::into))
            .collect()
    }
}
