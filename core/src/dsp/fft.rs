use num_complex::Complex64;
use rustfft::{num_traits::Zero, FftPlanner};

/// Helper that wraps the `rustfft` planner so plans are reused across digests.
pub struct FftHelper {
    planner: FftPlanner<f64>,
}

impl FftHelper {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
        }
    }

    /// Forward transform of `input`, zero padded (or truncated) to `size`.
    pub fn forward(&mut self, input: &[Complex64], size: usize) -> Vec<Complex64> {
        let mut buffer = padded(input, size);
        if size > 0 {
            self.planner.plan_fft_forward(size).process(&mut buffer);
        }
        buffer
    }

    /// Inverse transform scaled by `1/N`, so `inverse(forward(x)) == x`.
    pub fn inverse(&mut self, input: &[Complex64], size: usize) -> Vec<Complex64> {
        let mut buffer = padded(input, size);
        if size > 0 {
            self.planner.plan_fft_inverse(size).process(&mut buffer);
            let scale = 1.0 / size as f64;
            buffer.iter_mut().for_each(|value| *value *= scale);
        }
        buffer
    }
}

impl Default for FftHelper {
    fn default() -> Self {
        Self::new()
    }
}

fn padded(input: &[Complex64], size: usize) -> Vec<Complex64> {
    let mut buffer: Vec<Complex64> = input.iter().take(size).copied().collect();
    buffer.resize(size, Complex64::zero());
    buffer
}
