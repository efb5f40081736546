use num_complex::Complex64;
use std::f64::consts::PI;

/// Longest replica [`linear_chirp`] will synthesize.
pub const MAX_CHIRP_LEN: usize = 1 << 20;

/// Sample count of a `duration_s` sweep at `sample_rate_hz`, or 0 when the
/// parameters are invalid or the sweep would exceed [`MAX_CHIRP_LEN`].
pub fn chirp_len(duration_s: f64, sample_rate_hz: f64) -> usize {
    if !(duration_s > 0.0 && sample_rate_hz > 0.0) {
        return 0;
    }
    let samples = (duration_s * sample_rate_hz).round();
    if !samples.is_finite() || samples > MAX_CHIRP_LEN as f64 {
        return 0;
    }
    samples as usize
}

/// Synthesizes one sweep of a linear FMCW chirp starting at `base_hz` and
/// rising by `bandwidth_hz` over `duration_s`, sampled at `sample_rate_hz`.
///
/// The replica is [`chirp_len`] samples long; invalid or oversized
/// parameters yield an empty replica.
pub fn linear_chirp(
    duration_s: f64,
    sample_rate_hz: f64,
    bandwidth_hz: f64,
    base_hz: f64,
) -> Vec<Complex64> {
    let samples = chirp_len(duration_s, sample_rate_hz);
    let slope = bandwidth_hz / duration_s;
    (0..samples)
        .map(|n| {
            let t = n as f64 / sample_rate_hz;
            let phase = 2.0 * PI * (base_hz * t + 0.5 * slope * t * t);
            Complex64::from_polar(1.0, phase)
        })
        .collect()
}
