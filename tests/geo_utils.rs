//! Tests for geo_utils module

use garmin_gpx::geo_utils::*;
use garmin_gpx::Coordinate;

fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}

fn sample_points() -> Vec<Coordinate> {
    vec![
        Coordinate::new(51.5074, -0.1278),
        Coordinate::new(48.8566, 2.3522),
        Coordinate::new(-33.9249, 18.4241),
        Coordinate::new(40.7128, -74.0060),
        Coordinate::new(89.9, 179.9),
        Coordinate::new(-89.9, -179.9),
        Coordinate::new(0.0, 0.0),
    ]
}

#[test]
fn test_haversine_known_value() {
    // London to Paris is approximately 344 km
    let london = Coordinate::new(51.5074, -0.1278);
    let paris = Coordinate::new(48.8566, 2.3522);
    assert!(approx_eq(haversine_km(&london, &paris), 343.5, 5.0));
}

#[test]
fn test_within_radius_is_symmetric() {
    let points = sample_points();
    for a in &points {
        for b in &points {
            for r in [0.0, 1.0, 350.0, 5_000.0, 20_000.0] {
                assert_eq!(within_radius(a, b, r), within_radius(b, a, r));
            }
        }
    }
}

#[test]
fn test_zero_distance_identity() {
    for p in sample_points() {
        assert!(within_radius(&p, &p, 0.0));
        assert!(within_radius(&p, &p, 12.5));
    }
}

#[test]
fn test_boundary_is_inclusive() {
    let reference = Coordinate::new(52.3676, 4.9041);
    let point = destination_point(&reference, 90.0, 10.0);
    let d = haversine_km(&reference, &point);
    assert!(approx_eq(d, 10.0, 1e-6));

    assert!(within_radius(&reference, &point, d));
    assert!(!within_radius(&reference, &point, d - 1e-9));
}

#[test]
fn test_antipodal_points_are_finite() {
    let a = Coordinate::new(0.0, 0.0);
    let b = Coordinate::new(0.0, 180.0);
    let d = haversine_km(&a, &b);
    assert!(d.is_finite());
    assert!(approx_eq(d, EARTH_RADIUS_KM * std::f64::consts::PI, 1e-6));

    assert!(!within_radius(&a, &b, 100.0));
    assert!(within_radius(&a, &b, 20_016.0));

    let pole = Coordinate::new(90.0, 0.0);
    let other_pole = Coordinate::new(-90.0, 45.0);
    assert!(haversine_km(&pole, &other_pole).is_finite());
}

#[test]
fn test_out_of_range_inputs_do_not_panic() {
    let a = Coordinate::new(123.0, 400.0);
    let b = Coordinate::new(-270.0, -900.0);
    let d = haversine_km(&a, &b);
    assert!(d.is_finite());
    assert!(d >= 0.0);
}
