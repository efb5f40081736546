use crate::dsp::fft::FftHelper;
use crate::dsp::stats::StatsHelper;
use crate::prelude::{StageError, StageResult};
use num_complex::Complex64;

/// Matched filter of `signal` against `replica`.
///
/// Both inputs are normalized to unit RMS, then correlated with the
/// time-reversed conjugate replica:
/// `out[i] = sum_j signal[i + j] * conj(replica[M - 1 - j])`.
/// Only the fully overlapping part is returned, `N - M + 1` samples long.
/// The convolution is evaluated in the frequency domain.
pub fn matched_filter(
    fft: &mut FftHelper,
    signal: &[Complex64],
    replica: &[Complex64],
) -> StageResult<Vec<Complex64>> {
    let n = signal.len();
    let m = replica.len();
    if m == 0 || m > n {
        return Err(StageError::InvalidInput(format!(
            "replica of {} samples cannot filter {} samples",
            m, n
        )));
    }

    let signal = StatsHelper::normalize_rms(signal);
    let kernel: Vec<Complex64> = StatsHelper::normalize_rms(replica)
        .iter()
        .map(|v| v.conj())
        .collect();

    let size = n + m - 1;
    let signal_spectrum = fft.forward(&signal, size);
    let kernel_spectrum = fft.forward(&kernel, size);
    let product: Vec<Complex64> = signal_spectrum
        .iter()
        .zip(kernel_spectrum.iter())
        .map(|(a, b)| a * b)
        .collect();
    let full = fft.inverse(&product, size);

    Ok(full[m - 1..n].to_vec())
}

/// Symmetric moving average with `radius` neighbours on each side; the window
/// shrinks at the edges.
pub fn moving_average(data: &[f64], radius: usize) -> Vec<f64> {
    (0..data.len())
        .map(|i| {
            let start = i.saturating_sub(radius);
            let end = (i + radius + 1).min(data.len());
            let window = &data[start..end];
            window.iter().sum::<f64>() / window.len() as f64
        })
        .collect()
}

/// Block-average downsampling to `n` points. Input that is already short
/// enough is returned as is.
pub fn downsample(input: &[f64], n: usize) -> Vec<f64> {
    if input.len() <= n || n == 0 {
        return input.to_vec();
    }
    let factor = input.len() as f64 / n as f64;
    (0..n)
        .map(|i| {
            let start = (i as f64 * factor).floor() as usize;
            let end = (((i + 1) as f64 * factor).floor() as usize).min(input.len());
            let block = &input[start..end.max(start + 1)];
            block.iter().sum::<f64>() / block.len() as f64
        })
        .collect()
}
