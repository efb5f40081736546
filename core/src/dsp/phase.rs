use num_complex::Complex64;
use std::f64::consts::PI;

/// Wraps a phase into `[-pi, pi)`.
pub fn wrap_phase(phase: f64) -> f64 {
    let wrapped = (phase + PI).rem_euclid(2.0 * PI) - PI;
    // rem_euclid can round up to exactly 2*pi for tiny negative inputs
    if wrapped >= PI {
        wrapped - 2.0 * PI
    } else {
        wrapped
    }
}

/// Per-sample phase of `a` relative to `b`, wrapped into `[-pi, pi)`.
pub fn phase_difference(a: &[Complex64], b: &[Complex64]) -> Vec<f64> {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| wrap_phase(x.arg() - y.arg()))
        .collect()
}

/// Converts a phase difference to an arrival angle in degrees using
/// `asin(calibration * delta)`. Returns `None` when the arcsine is undefined.
pub fn angle_of_arrival(delta: f64, calibration: f64) -> Option<f64> {
    let angle = (calibration * delta).asin();
    if angle.is_nan() {
        None
    } else {
        Some(angle.to_degrees())
    }
}
