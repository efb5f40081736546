/// Indices of local maxima that exceed every neighbour within `window` on
/// both sides and reach at least `floor_ratio` of the global maximum.
pub fn find_peaks(magnitudes: &[f64], window: usize, floor_ratio: f64) -> Vec<usize> {
    let n = magnitudes.len();
    if n <= 2 * window {
        return Vec::new();
    }
    let max = magnitudes.iter().cloned().fold(0.0_f64, f64::max);
    let floor = max * floor_ratio;

    (window..n - window)
        .filter(|&i| {
            let value = magnitudes[i];
            value >= floor
                && (i - window..=i + window)
                    .filter(|&j| j != i)
                    .all(|j| value > magnitudes[j])
        })
        .collect()
}

/// Frequency in Hz of FFT bin `index`.
pub fn bin_to_frequency(index: usize, sample_rate_hz: f64, fft_len: usize) -> f64 {
    if fft_len == 0 {
        return 0.0;
    }
    index as f64 * sample_rate_hz / fft_len as f64
}

/// Index of the largest value, ignoring the first `skip` entries.
pub fn argmax_from(values: &[f64], skip: usize) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .skip(skip)
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(index, _)| index)
}
