//! Location sampling.
//!
//! [`LocationSampler`] consumes the provider stream and keeps a sample only
//! when it is the first one or it moved at least the configured distance from
//! the last kept sample. Kept samples land in a [`PositionFeed`], the single
//! observed position shared by every active route of the operator.

use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::distance::haversine_distance_m;
use crate::models::{GeoPoint, LocationSample};
use crate::services::{LocationError, LocationProvider};

/// Latest kept position sample
#[derive(Debug, Clone)]
pub struct PositionFeed {
    sender: Arc<watch::Sender<Option<LocationSample>>>,
}

impl PositionFeed {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn latest(&self) -> Option<LocationSample> {
        self.sender.borrow().clone()
    }

    pub fn position(&self) -> Option<GeoPoint> {
        self.sender.borrow().as_ref().map(|sample| sample.position)
    }

    pub fn update(&self, sample: LocationSample) {
        self.sender.send_replace(Some(sample));
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<LocationSample>> {
        self.sender.subscribe()
    }
}

impl Default for PositionFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Minimum-movement filter over a sample sequence
#[derive(Debug, Clone)]
pub struct DistanceFilter {
    min_distance_meters: f64,
    last_kept: Option<GeoPoint>,
}

impl DistanceFilter {
    pub fn new(min_distance_meters: f64) -> Self {
        Self {
            min_distance_meters,
            last_kept: None,
        }
    }

    /// Whether `sample` should be kept; a kept sample becomes the new reference
    pub fn admit(&mut self, sample: &LocationSample) -> bool {
        if !sample.position.is_valid() {
            return false;
        }

        let keep = match self.last_kept {
            None => true,
            Some(last) => haversine_distance_m(last, sample.position) >= self.min_distance_meters,
        };

        if keep {
            self.last_kept = Some(sample.position);
        }
        keep
    }
}

pub struct LocationSampler {
    provider: Arc<dyn LocationProvider>,
    filter: DistanceFilter,
    feed: PositionFeed,
}

impl LocationSampler {
    pub fn new(provider: Arc<dyn LocationProvider>, distance_filter_meters: f64, feed: PositionFeed) -> Self {
        Self {
            provider,
            filter: DistanceFilter::new(distance_filter_meters),
            feed,
        }
    }

    /// Start watching the provider; the task ends when the provider stream ends
    pub fn spawn(mut self) -> Result<JoinHandle<()>, LocationError> {
        let mut samples = self.provider.watch()?;
        info!("📍 Location sampling started");

        Ok(tokio::spawn(async move {
            let mut kept = 0usize;
            while let Some(sample) = samples.next().await {
                if self.filter.admit(&sample) {
                    kept += 1;
                    self.feed.update(sample);
                } else if !sample.position.is_valid() {
                    warn!(
                        latitude = sample.position.latitude,
                        longitude = sample.position.longitude,
                        "⚠️ Ignoring invalid location sample"
                    );
                } else {
                    debug!("Sample within distance filter, ignored");
                }
            }
            info!(kept_samples = kept, "📍 Location stream ended");
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_distance_filter_keeps_first_and_far_samples() {
        let mut filter = DistanceFilter::new(10.0);
        let now = Utc::now();

        assert!(filter.admit(&LocationSample::new(-28.47740, -49.00790, now)));
        // about 5.5 m north
        assert!(!filter.admit(&LocationSample::new(-28.47735, -49.00790, now)));
        // about 22 m north of the first kept sample
        assert!(filter.admit(&LocationSample::new(-28.47720, -49.00790, now)));
        assert!(!filter.admit(&LocationSample::new(95.0, 0.0, now)));
    }

    #[test]
    fn test_feed_reports_latest_position() {
        let feed = PositionFeed::new();
        assert!(feed.position().is_none());

        feed.update(LocationSample::new(-28.0, -49.0, Utc::now()));
        assert_eq!(feed.position(), Some(GeoPoint::new(-28.0, -49.0)));
    }
}
