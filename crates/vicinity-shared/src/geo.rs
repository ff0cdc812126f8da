//! Great-circle distance between two coordinates.

use crate::constants::EARTH_RADIUS_METERS;
use crate::types::LocationFix;

/// Haversine distance between two fixes, in meters.
///
/// Accurate enough for the movement gate; the reporter only cares
/// whether a displacement clears a ~20 m threshold.
pub fn haversine_distance_m(a: LocationFix, b: LocationFix) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance() {
        let p = LocationFix::new(48.8566, 2.3522);
        assert_eq!(haversine_distance_m(p, p), 0.0);
    }

    #[test]
    fn test_paris_to_london() {
        let paris = LocationFix::new(48.8566, 2.3522);
        let london = LocationFix::new(51.5074, -0.1278);

        let d = haversine_distance_m(paris, london);
        // Roughly 344 km.
        assert!((d - 344_000.0).abs() < 5_000.0, "got {d}");
    }

    #[test]
    fn test_small_displacement_in_meters() {
        // ~0.0002 degrees of latitude is ~22 m.
        let a = LocationFix::new(52.5200, 13.4050);
        let b = LocationFix::new(52.5202, 13.4050);

        let d = haversine_distance_m(a, b);
        assert!(d > 20.0 && d < 25.0, "got {d}");
    }

    #[test]
    fn test_symmetry() {
        let a = LocationFix::new(-33.8688, 151.2093);
        let b = LocationFix::new(35.6762, 139.6503);
        assert!((haversine_distance_m(a, b) - haversine_distance_m(b, a)).abs() < 1e-6);
    }
}
