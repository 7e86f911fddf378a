//! Live position publishing.
//!
//! Every `publish_interval` the latest kept sample is written to the
//! operator's [`LiveLocationRecord`], provided the device is online, the
//! operator has at least one active route and a position is known. Failures
//! are logged and the next tick tries again.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::sampler::PositionFeed;
use crate::models::{LiveLocationRecord, OperatorId};
use crate::services::{Connectivity, LiveLocationSink};

/// Result of one publishing tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    SkippedOffline,
    SkippedNoActiveRoute,
    SkippedNoPosition,
    Failed,
}

pub struct LiveLocationPublisher {
    operator_id: OperatorId,
    sink: Arc<dyn LiveLocationSink>,
    feed: PositionFeed,
    connectivity: Connectivity,
    active_routes: watch::Receiver<usize>,
    interval: Duration,
}

/// Running publisher task
#[derive(Debug)]
pub struct PublisherHandle {
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl PublisherHandle {
    /// Stop publishing and wait for the task to finish
    pub async fn stop(self) {
        self.shutdown.notify_one();
        if let Err(error) = self.task.await {
            warn!(error = %error, "⚠️ Live location publisher ended abnormally");
        }
    }
}

impl LiveLocationPublisher {
    pub fn new(
        operator_id: OperatorId,
        sink: Arc<dyn LiveLocationSink>,
        feed: PositionFeed,
        connectivity: Connectivity,
        active_routes: watch::Receiver<usize>,
        interval: Duration,
    ) -> Self {
        Self {
            operator_id,
            sink,
            feed,
            connectivity,
            active_routes,
            interval,
        }
    }

    /// Publish the latest position once, if the preconditions hold
    pub async fn publish_once(&self) -> PublishOutcome {
        if !self.connectivity.is_online() {
            return PublishOutcome::SkippedOffline;
        }
        if *self.active_routes.borrow() == 0 {
            return PublishOutcome::SkippedNoActiveRoute;
        }
        let Some(sample) = self.feed.latest() else {
            return PublishOutcome::SkippedNoPosition;
        };

        match self
            .sink
            .publish(&self.operator_id, LiveLocationRecord::from(&sample))
            .await
        {
            Ok(()) => {
                debug!(operator_id = %self.operator_id, "Live location published");
                PublishOutcome::Published
            }
            Err(error) => {
                warn!(operator_id = %self.operator_id, error = %error, "⚠️ Live location publish failed");
                PublishOutcome::Failed
            }
        }
    }

    pub fn spawn(self) -> PublisherHandle {
        let shutdown = Arc::new(Notify::new());
        let stop = shutdown.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                operator_id = %self.operator_id,
                interval_secs = self.interval.as_secs(),
                "📡 Live location publisher started"
            );

            loop {
                tokio::select! {
                    _ = stop.notified() => break,
                    _ = ticker.tick() => {
                        self.publish_once().await;
                    }
                }
            }

            info!(operator_id = %self.operator_id, "📡 Live location publisher stopped");
        });

        PublisherHandle { shutdown, task }
    }
}
