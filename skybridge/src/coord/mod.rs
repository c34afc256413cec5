//! Geographic coordinate math.
//!
//! Provides the great-circle distance used to rank aircraft by proximity to
//! the configured observer position.

/// Mean Earth radius in kilometres, used for great-circle distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points using the haversine formula.
///
/// Coordinates are in decimal degrees; the result is in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_zero_distance() {
        assert_eq!(haversine_km(53.27, -9.05, 53.27, -9.05), 0.0);
    }

    #[test]
    fn test_haversine_one_degree_longitude_at_equator() {
        // One degree of longitude at the equator is roughly 111.2 km.
        let d = haversine_km(0.0, 0.0, 0.0, 1.0);
        assert!((d - 111.19).abs() < 0.5, "got {}", d);
    }

    #[test]
    fn test_haversine_is_symmetric() {
        let a = haversine_km(53.27, -9.05, 52.37, 4.89);
        let b = haversine_km(52.37, 4.89, 53.27, -9.05);
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn test_haversine_orders_by_distance() {
        // Observer at the origin: 1 degree away is closer than 5 degrees.
        let near = haversine_km(0.0, 0.0, 0.0, 1.0);
        let far = haversine_km(0.0, 0.0, 0.0, 5.0);
        assert!(near < far);
    }
}
