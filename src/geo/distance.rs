//! Great-circle math on a spherical Earth.

use crate::constants::defaults::EARTH_RADIUS_METERS;
use crate::models::GeoPoint;

/// Haversine distance between two points, in meters
pub fn haversine_distance_m(from: GeoPoint, to: GeoPoint) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Initial bearing from `from` towards `to`, degrees clockwise from north in `[0, 360)`
pub fn initial_bearing_deg(from: GeoPoint, to: GeoPoint) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let y = d_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();

    y.atan2(x).to_degrees().rem_euclid(360.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_distance() {
        // Criciúma to Florianópolis, about 145 km
        let criciuma = GeoPoint::new(-28.6775, -49.3697);
        let florianopolis = GeoPoint::new(-27.5954, -48.5480);
        let distance = haversine_distance_m(criciuma, florianopolis);
        assert!((140_000.0..150_000.0).contains(&distance), "{distance}");
    }

    #[test]
    fn test_zero_distance_and_symmetry() {
        let a = GeoPoint::new(-28.4774, -49.0079);
        let b = GeoPoint::new(-28.4790, -49.0100);
        assert_eq!(haversine_distance_m(a, a), 0.0);
        assert!((haversine_distance_m(a, b) - haversine_distance_m(b, a)).abs() < 1e-9);
    }

    #[test]
    fn test_cardinal_bearings() {
        let origin = GeoPoint::new(0.0, 0.0);
        assert!((initial_bearing_deg(origin, GeoPoint::new(1.0, 0.0)) - 0.0).abs() < 1e-9);
        assert!((initial_bearing_deg(origin, GeoPoint::new(0.0, 1.0)) - 90.0).abs() < 1e-9);
        assert!((initial_bearing_deg(origin, GeoPoint::new(-1.0, 0.0)) - 180.0).abs() < 1e-9);
        assert!((initial_bearing_deg(origin, GeoPoint::new(0.0, -1.0)) - 270.0).abs() < 1e-9);
    }
}
