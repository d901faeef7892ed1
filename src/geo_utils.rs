//! Geographic utilities: great-circle distance and radius checks.
//!
//! Distances are in kilometers on a sphere of radius [`EARTH_RADIUS_KM`].

use crate::Coordinate;

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two coordinates in kilometers (haversine).
///
/// Total over finite inputs: the haversine term is clamped to `[0, 1]` so
/// rounding near antipodal points cannot produce a NaN.
///
/// # Example
/// ```
/// use garmin_gpx::{haversine_km, Coordinate};
/// let london = Coordinate::new(51.5074, -0.1278);
/// let paris = Coordinate::new(48.8566, 2.3522);
/// let d = haversine_km(&london, &paris);
/// assert!((d - 343.5).abs() < 5.0);
/// ```
pub fn haversine_km(from: &Coordinate, to: &Coordinate) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlon = to.longitude.to_radians() - from.longitude.to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// True iff `point` lies within `radius_km` of `reference` (boundary inclusive).
pub fn within_radius(reference: &Coordinate, point: &Coordinate, radius_km: f64) -> bool {
    haversine_km(reference, point) <= radius_km
}

/// Point reached by travelling `distance_km` from `origin` along the initial
/// bearing `bearing_deg` (clockwise from north) on the same sphere.
pub fn destination_point(origin: &Coordinate, bearing_deg: f64, distance_km: f64) -> Coordinate {
    let delta = distance_km / EARTH_RADIUS_KM;
    let theta = bearing_deg.to_radians();
    let lat1 = origin.latitude.to_radians();
    let lon1 = origin.longitude.to_radians();

    let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * theta.cos())
        .clamp(-1.0, 1.0)
        .asin();
    let lon2 = lon1
        + (theta.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());

    // Normalize longitude to [-180, 180)
    let lon2 = (lon2.to_degrees() + 540.0).rem_euclid(360.0) - 180.0;

    Coordinate::new(lat2.to_degrees(), lon2)
}
