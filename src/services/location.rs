use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::models::{LiveLocationRecord, LocationSample, OperatorId};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Position unavailable: {0}")]
    Unavailable(String),

    #[error("Live location publish failed: {0}")]
    PublishFailed(String),
}

/// Source of device position samples
pub trait LocationProvider: Send + Sync + 'static {
    /// Start watching the device position; the stream ends when watching stops
    fn watch(&self) -> Result<BoxStream<'static, LocationSample>, LocationError>;
}

/// Ephemeral per-operator position record shared with the back office
#[async_trait]
pub trait LiveLocationSink: Send + Sync + 'static {
    async fn publish(
        &self,
        operator_id: &OperatorId,
        record: LiveLocationRecord,
    ) -> Result<(), LocationError>;
}
