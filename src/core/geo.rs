use serde::{Deserialize, Serialize};
use crate::core::Waypoint;

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A geographic position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl From<&Waypoint> for LatLng {
    fn from(wp: &Waypoint) -> Self {
        wp.position()
    }
}

/// Great-circle distance in meters using the haversine formula
pub fn distance(a: LatLng, b: LatLng) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let delta_phi = (b.lat - a.lat).to_radians();
    let delta_lambda = (b.lng - a.lng).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Initial compass bearing from `a` toward `b` in degrees, in [0, 360).
///
/// North is 0 and angles grow clockwise. Coincident points yield 0.
pub fn bearing(a: LatLng, b: LatLng) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let delta_lambda = (b.lng - a.lng).to_radians();

    let y = delta_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Average speed in km/h needed to cover `prev` → `next` in the time between them.
///
/// A zero or negative time delta gives 0 rather than an infinite speed.
pub fn speed_kmh(prev: &Waypoint, next: &Waypoint) -> f64 {
    let dt = (next.timestamp - prev.timestamp).num_milliseconds() as f64 / 1000.0;
    if dt <= 0.0 {
        return 0.0;
    }
    distance(prev.position(), next.position()) / dt * 3.6
}

/// Linear interpolation in lat/lng space
pub fn interpolate(a: LatLng, b: LatLng, t: f64) -> LatLng {
    LatLng {
        lat: a.lat + (b.lat - a.lat) * t,
        lng: a.lng + (b.lng - a.lng) * t,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};

    fn wp(lat: f64, lng: f64, secs: i64) -> Waypoint {
        Waypoint {
            latitude: lat,
            longitude: lng,
            timestamp: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_coincident_points() {
        let p = LatLng::new(12.9716, 77.5946);
        assert_eq!(distance(p, p), 0.0);
        assert_eq!(bearing(p, p), 0.0);
    }

    #[test]
    fn test_one_degree_at_equator() {
        let a = LatLng::new(0.0, 0.0);
        let b = LatLng::new(0.0, 1.0);
        let d = distance(a, b);
        assert!((d - 111_195.0).abs() < 111_195.0 * 0.01, "distance was {}", d);
        assert_relative_eq!(bearing(a, b), 90.0, epsilon = 1e-9);
    }

    #[test]
    fn test_distance_symmetry() {
        let a = LatLng::new(51.5007, -0.1246);
        let b = LatLng::new(40.6892, -74.0445);
        assert_relative_eq!(distance(a, b), distance(b, a), epsilon = 1e-6);
    }

    #[test]
    fn test_reverse_bearing_on_meridian_and_equator() {
        let pairs = [
            (LatLng::new(10.0, 20.0), LatLng::new(15.0, 20.0)),
            (LatLng::new(0.0, -3.0), LatLng::new(0.0, 4.0)),
        ];
        for (a, b) in pairs {
            let diff = (bearing(a, b) - bearing(b, a)).rem_euclid(360.0);
            assert_relative_eq!(diff, 180.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_reverse_bearing_short_hop() {
        let a = LatLng::new(12.9716, 77.5946);
        let b = LatLng::new(12.9730, 77.5961);
        let diff = (bearing(a, b) - bearing(b, a)).rem_euclid(360.0);
        assert!((diff - 180.0).abs() < 0.01, "diff was {}", diff);
    }

    #[test]
    fn test_bearing_range() {
        let origin = LatLng::new(0.0, 0.0);
        for target in [
            LatLng::new(1.0, 0.0),
            LatLng::new(0.0, -1.0),
            LatLng::new(-1.0, 0.0),
            LatLng::new(-1.0, -1.0),
        ] {
            let b = bearing(origin, target);
            assert!((0.0..360.0).contains(&b), "bearing {} out of range", b);
        }
        assert_relative_eq!(bearing(origin, LatLng::new(0.0, -1.0)), 270.0, epsilon = 1e-9);
        assert_relative_eq!(bearing(origin, LatLng::new(-1.0, 0.0)), 180.0, epsilon = 1e-9);
    }

    #[test]
    fn test_speed_zero_time_delta() {
        let a = wp(0.0, 0.0, 10);
        let b = wp(0.0, 1.0, 10);
        let s = speed_kmh(&a, &b);
        assert_eq!(s, 0.0);
        assert!(!s.is_nan());
    }

    #[test]
    fn test_speed_known_value() {
        // 1 degree of longitude in one hour
        let a = wp(0.0, 0.0, 0);
        let b = wp(0.0, 1.0, 3600);
        let expected = distance(a.position(), b.position()) / 1000.0;
        assert_relative_eq!(speed_kmh(&a, &b), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_interpolate_endpoints() {
        let a = LatLng::new(1.0, 2.0);
        let b = LatLng::new(3.0, 6.0);
        assert_eq!(interpolate(a, b, 0.0), a);
        assert_eq!(interpolate(a, b, 1.0), b);
        assert_eq!(interpolate(a, b, 0.5), LatLng::new(2.0, 4.0));
    }
}
