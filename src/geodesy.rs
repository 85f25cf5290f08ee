//! Geodesic math: bearing normalization, distance units, and the direct
//! Vincenty solution on the WGS-84 ellipsoid.

use thiserror::Error;

/// Meters per international nautical mile.
pub const METERS_PER_NAUTICAL_MILE: f64 = 1852.0;

// WGS-84 ellipsoid parameters.
const WGS84_A: f64 = 6_378_137.0;
const WGS84_B: f64 = 6_356_752.314245;
const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// Convergence threshold for the sigma iteration (radians).
const CONVERGENCE_EPSILON: f64 = 1e-12;
/// Iteration cap; the direct formula converges in a handful of steps for
/// any real input, so hitting this means the input is degenerate.
const MAX_ITERATIONS: usize = 100;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("projection did not converge after {0} iterations")]
    NoConvergence(usize),
    #[error("non-finite projection input: {0}")]
    NonFiniteInput(&'static str),
}

/// Distance unit accepted at the ingestion boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeUnit {
    NauticalMiles,
    Meters,
}

/// Convert a distance to meters.
pub fn to_meters(value: f64, unit: RangeUnit) -> f64 {
    match unit {
        RangeUnit::NauticalMiles => value * METERS_PER_NAUTICAL_MILE,
        RangeUnit::Meters => value,
    }
}

/// Normalize a bearing into `[0, 360)` degrees. Idempotent on values
/// already in range.
pub fn wrap_bearing(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid(360.0) can yield exactly 360.0 for tiny negative inputs.
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Normalize a longitude into `[-180, 180)` degrees.
pub fn wrap_longitude(degrees: f64) -> f64 {
    let wrapped = (degrees + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped >= 180.0 {
        -180.0
    } else {
        wrapped
    }
}

/// Direct Vincenty solution: destination point given an origin, an initial
/// bearing in degrees, and a distance in meters.
///
/// A zero distance returns the origin unchanged. The sigma iteration is
/// capped; failure to converge is reported rather than looped on.
pub fn destination(
    lat: f64,
    lon: f64,
    bearing_degrees: f64,
    distance_meters: f64,
) -> Result<(f64, f64), ProjectionError> {
    if !lat.is_finite() || !lon.is_finite() {
        return Err(ProjectionError::NonFiniteInput("origin"));
    }
    if !bearing_degrees.is_finite() {
        return Err(ProjectionError::NonFiniteInput("bearing"));
    }
    if !distance_meters.is_finite() {
        return Err(ProjectionError::NonFiniteInput("distance"));
    }
    if distance_meters == 0.0 {
        return Ok((lat, lon));
    }

    let alpha1 = bearing_degrees.to_radians();
    let (sin_alpha1, cos_alpha1) = alpha1.sin_cos();

    let tan_u1 = (1.0 - WGS84_F) * lat.to_radians().tan();
    let cos_u1 = 1.0 / (1.0 + tan_u1 * tan_u1).sqrt();
    let sin_u1 = tan_u1 * cos_u1;

    let sigma1 = tan_u1.atan2(cos_alpha1);
    let sin_alpha = cos_u1 * sin_alpha1;
    let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;

    let u_sq = cos_sq_alpha * (WGS84_A * WGS84_A - WGS84_B * WGS84_B) / (WGS84_B * WGS84_B);
    let a_term = 1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
    let b_term = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));

    let mut sigma = distance_meters / (WGS84_B * a_term);
    let mut sin_sigma;
    let mut cos_sigma;
    let mut cos_2sigma_m;
    let mut iterations = 0;

    loop {
        cos_2sigma_m = (2.0 * sigma1 + sigma).cos();
        sin_sigma = sigma.sin();
        cos_sigma = sigma.cos();

        let delta_sigma = b_term
            * sin_sigma
            * (cos_2sigma_m
                + b_term / 4.0
                    * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)
                        - b_term / 6.0
                            * cos_2sigma_m
                            * (-3.0 + 4.0 * sin_sigma * sin_sigma)
                            * (-3.0 + 4.0 * cos_2sigma_m * cos_2sigma_m)));

        let next = distance_meters / (WGS84_B * a_term) + delta_sigma;
        let converged = (next - sigma).abs() < CONVERGENCE_EPSILON;
        sigma = next;
        if converged {
            break;
        }

        iterations += 1;
        if iterations >= MAX_ITERATIONS {
            return Err(ProjectionError::NoConvergence(iterations));
        }
    }

    cos_2sigma_m = (2.0 * sigma1 + sigma).cos();
    sin_sigma = sigma.sin();
    cos_sigma = sigma.cos();

    let tmp = sin_u1 * sin_sigma - cos_u1 * cos_sigma * cos_alpha1;
    let lat2 = (sin_u1 * cos_sigma + cos_u1 * sin_sigma * cos_alpha1)
        .atan2((1.0 - WGS84_F) * (sin_alpha * sin_alpha + tmp * tmp).sqrt());

    let lambda = (sin_sigma * sin_alpha1).atan2(cos_u1 * cos_sigma - sin_u1 * sin_sigma * cos_alpha1);
    let c_term = WGS84_F / 16.0 * cos_sq_alpha * (4.0 + WGS84_F * (4.0 - 3.0 * cos_sq_alpha));
    let l_term = lambda
        - (1.0 - c_term)
            * WGS84_F
            * sin_alpha
            * (sigma
                + c_term
                    * sin_sigma
                    * (cos_2sigma_m + c_term * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)));

    let lon2 = wrap_longitude(lon + l_term.to_degrees());

    Ok((lat2.to_degrees(), lon2))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON_DEG: f64 = 1e-6;

    #[test]
    fn test_wrap_bearing_range() {
        assert_eq!(wrap_bearing(0.0), 0.0);
        assert_eq!(wrap_bearing(359.9), 359.9);
        assert_eq!(wrap_bearing(360.0), 0.0);
        assert_eq!(wrap_bearing(-90.0), 270.0);
        assert_eq!(wrap_bearing(720.0), 0.0);
        assert_eq!(wrap_bearing(-720.0), 0.0);
    }

    #[test]
    fn test_wrap_bearing_idempotent() {
        for raw in [-1234.5, -90.0, 0.0, 45.0, 359.999, 360.0, 1080.25] {
            let once = wrap_bearing(raw);
            assert!((0.0..360.0).contains(&once), "wrap({raw}) = {once}");
            assert_eq!(wrap_bearing(once), once);
        }
    }

    #[test]
    fn test_nautical_mile_conversion() {
        assert_eq!(to_meters(1.0, RangeUnit::NauticalMiles), 1852.0);
        assert_eq!(to_meters(2.5, RangeUnit::NauticalMiles), 4630.0);
        assert_eq!(to_meters(0.0, RangeUnit::NauticalMiles), 0.0);
        assert_eq!(to_meters(1234.5, RangeUnit::Meters), 1234.5);
    }

    #[test]
    fn test_zero_range_returns_origin() {
        let (lat, lon) = destination(-6.0, 107.0, 123.4, 0.0).unwrap();
        assert!((lat - -6.0).abs() < EPSILON_DEG);
        assert!((lon - 107.0).abs() < EPSILON_DEG);
    }

    #[test]
    fn test_due_east_along_equator() {
        // One degree of longitude along the equator is a*pi/180 meters.
        let one_degree = WGS84_A * std::f64::consts::PI / 180.0;
        let (lat, lon) = destination(0.0, 0.0, 90.0, one_degree).unwrap();
        assert!(lat.abs() < EPSILON_DEG, "lat = {lat}");
        assert!((lon - 1.0).abs() < EPSILON_DEG, "lon = {lon}");
    }

    #[test]
    fn test_due_north_meridian_arc() {
        // One degree of meridian arc from the equator is roughly 110574 m.
        let (lat, lon) = destination(0.0, 0.0, 0.0, 110_574.0).unwrap();
        assert!((lat - 1.0).abs() < 1e-3, "lat = {lat}");
        assert!(lon.abs() < EPSILON_DEG, "lon = {lon}");
    }

    #[test]
    fn test_longitude_wraps_at_antimeridian() {
        let one_degree = WGS84_A * std::f64::consts::PI / 180.0;
        let (_, lon) = destination(0.0, 179.5, 90.0, one_degree).unwrap();
        assert!((-180.0..180.0).contains(&lon));
        assert!((lon - -179.5).abs() < EPSILON_DEG, "lon = {lon}");
    }

    #[test]
    fn test_latitude_stays_in_bounds() {
        for bearing in [0.0, 45.0, 90.0, 180.0, 270.0] {
            let (lat, lon) = destination(-6.0, 107.0, bearing, 5_000_000.0).unwrap();
            assert!((-90.0..=90.0).contains(&lat));
            assert!((-180.0..180.0).contains(&lon));
        }
    }

    #[test]
    fn test_non_finite_input_rejected() {
        assert!(destination(f64::NAN, 0.0, 0.0, 100.0).is_err());
        assert!(destination(0.0, 0.0, f64::INFINITY, 100.0).is_err());
        assert!(destination(0.0, 0.0, 0.0, f64::NAN).is_err());
    }
}
