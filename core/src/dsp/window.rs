use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Taper applied before the display spectrum FFT.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpectrumWindow {
    #[default]
    Hann,
    BlackmanHarris,
}

impl SpectrumWindow {
    pub fn coefficients(self, n: usize) -> Vec<f64> {
        match self {
            SpectrumWindow::Hann => hann(n),
            SpectrumWindow::BlackmanHarris => blackman_harris(n),
        }
    }
}

/// Hann window coefficients of length `n`.
pub fn hann(n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![1.0; n];
    }
    let denom = (n - 1) as f64;
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / denom).cos())
        .collect()
}

/// Four-term Blackman-Harris window coefficients of length `n`.
pub fn blackman_harris(n: usize) -> Vec<f64> {
    const A: [f64; 4] = [0.35875, 0.48829, 0.14128, 0.01168];
    if n < 2 {
        return vec![1.0; n];
    }
    let denom = (n - 1) as f64;
    (0..n)
        .map(|i| {
            let x = 2.0 * PI * i as f64 / denom;
            A[0] - A[1] * x.cos() + A[2] * (2.0 * x).cos() - A[3] * (3.0 * x).cos()
        })
        .collect()
}

/// Multiplies `samples` by `window`, element-wise.
pub fn apply(samples: &[Complex64], window: &[f64]) -> Vec<Complex64> {
    samples
        .iter()
        .zip(window.iter())
        .map(|(&sample, &w)| sample * w)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hann_is_symmetric_with_zero_edges() {
        let w = hann(9);
        assert!(w[0].abs() < 1e-12 && w[8].abs() < 1e-12);
        assert!((w[4] - 1.0).abs() < 1e-12);
        for i in 0..9 {
            assert!((w[i] - w[8 - i]).abs() < 1e-12);
        }
    }

    #[test]
    fn blackman_harris_peaks_at_centre() {
        let w = blackman_harris(33);
        let centre = w[16];
        assert!((centre - 1.0).abs() < 1e-9);
        assert!(w.iter().all(|&v| v <= centre + 1e-12));
        assert!(w[0] < 1e-4);
    }

    #[test]
    fn spectrum_window_selects_coefficients() {
        assert_eq!(SpectrumWindow::default().coefficients(16), hann(16));
        assert_eq!(
            SpectrumWindow::BlackmanHarris.coefficients(16),
            blackman_harris(16)
        );
    }

    #[test]
    fn degenerate_lengths_are_rectangular() {
        assert!(hann(0).is_empty());
        assert_eq!(blackman_harris(1), vec![1.0]);
    }
}
