use num_complex::Complex64;
use rustfft::num_traits::Zero;

pub struct StatsHelper;

impl StatsHelper {
    /// Root mean square magnitude of a complex sequence.
    pub fn rms(samples: &[Complex64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = samples.iter().map(|v| v.norm_sqr()).sum();
        (sum_sq / samples.len() as f64).sqrt()
    }

    pub fn mean(samples: &[Complex64]) -> Complex64 {
        if samples.is_empty() {
            return Complex64::zero();
        }
        samples.iter().sum::<Complex64>() / samples.len() as f64
    }

    /// Subtracts the sequence mean.
    pub fn remove_dc(samples: &[Complex64]) -> Vec<Complex64> {
        let mean = Self::mean(samples);
        samples.iter().map(|&v| v - mean).collect()
    }

    /// Scales a sequence to unit RMS. All-zero input is returned unchanged.
    pub fn normalize_rms(samples: &[Complex64]) -> Vec<Complex64> {
        let rms = Self::rms(samples);
        if rms == 0.0 {
            return samples.to_vec();
        }
        samples.iter().map(|&v| v / rms).collect()
    }
}
