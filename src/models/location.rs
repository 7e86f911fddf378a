use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A WGS84 coordinate pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Finite and inside the latitude/longitude ranges
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A raw sample emitted by the location provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub position: GeoPoint,
    /// Degrees clockwise from north, when the device reports one
    pub heading: Option<f64>,
    /// Meters per second, when the device reports one
    pub speed: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl LocationSample {
    pub fn new(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            position: GeoPoint::new(latitude, longitude),
            heading: None,
            speed: None,
            timestamp,
        }
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = Some(heading);
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }
}

/// The operator's shared, last-writer-wins live position record.
///
/// There is exactly one of these per operator no matter how many routes the
/// operator has in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveLocationRecord {
    pub lat: f64,
    pub lng: f64,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

impl From<&LocationSample> for LiveLocationRecord {
    fn from(sample: &LocationSample) -> Self {
        Self {
            lat: sample.position.latitude,
            lng: sample.position.longitude,
            heading: sample.heading,
            speed: sample.speed,
            updated_at: sample.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_point_validity() {
        assert!(GeoPoint::new(-28.4774, -49.0079).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, -180.5).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_live_record_from_sample() {
        let now = Utc::now();
        let sample = LocationSample::new(-28.48, -49.01, now)
            .with_heading(90.0)
            .with_speed(12.5);
        let record = LiveLocationRecord::from(&sample);

        assert_eq!(record.lat, -28.48);
        assert_eq!(record.lng, -49.01);
        assert_eq!(record.heading, Some(90.0));
        assert_eq!(record.speed, Some(12.5));
        assert_eq!(record.updated_at, now);
    }
}
