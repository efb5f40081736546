use crate::dsp::filter::moving_average;

/// Fixed-resolution histogram of arrival angles.
///
/// Covers `[-max - 0.5, max + 0.5]` degrees with `subdegrees` bins per degree,
/// so one bin is centred exactly on 0 degrees. Each bin also accumulates the
/// range of the samples that landed in it.
#[derive(Debug, Clone)]
pub struct AngleHistogram {
    max_angle_deg: f64,
    subdegrees: usize,
    counts: Vec<f64>,
    range_sums: Vec<f64>,
}

impl AngleHistogram {
    pub fn new(max_angle_deg: f64, subdegrees: usize) -> Self {
        let max_angle_deg = max_angle_deg.abs();
        let subdegrees = subdegrees.max(1);
        let bins = ((2.0 * max_angle_deg + 1.0) * subdegrees as f64).round() as usize;
        Self {
            max_angle_deg,
            subdegrees,
            counts: vec![0.0; bins],
            range_sums: vec![0.0; bins],
        }
    }

    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    /// Bin holding `angle_deg`, or `None` outside the valid range.
    pub fn bin_of(&self, angle_deg: f64) -> Option<usize> {
        if !(angle_deg.abs() <= self.max_angle_deg) || self.counts.is_empty() {
            return None;
        }
        let offset = (angle_deg + self.max_angle_deg + 0.5) * self.subdegrees as f64;
        Some((offset.floor() as usize).min(self.counts.len() - 1))
    }

    /// Angle at the centre of `bin`, in degrees.
    pub fn bin_center(&self, bin: usize) -> f64 {
        -(self.max_angle_deg + 0.5) + (bin as f64 + 0.5) / self.subdegrees as f64
    }

    /// Records one sample; returns `false` when the angle is out of range.
    pub fn add(&mut self, angle_deg: f64, range_m: f64) -> bool {
        match self.bin_of(angle_deg) {
            Some(bin) => {
                self.counts[bin] += 1.0;
                self.range_sums[bin] += range_m;
                true
            }
            None => false,
        }
    }

    pub fn counts(&self) -> &[f64] {
        &self.counts
    }

    pub fn total(&self) -> f64 {
        self.counts.iter().sum()
    }

    pub fn smoothed(&self, radius: usize) -> Vec<f64> {
        moving_average(&self.counts, radius)
    }

    /// Mean range of the samples in each bin, zero for empty bins.
    pub fn mean_ranges(&self) -> Vec<f64> {
        self.counts
            .iter()
            .zip(self.range_sums.iter())
            .map(|(&count, &sum)| if count > 0.0 { sum / count } else { 0.0 })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_geometry_has_centre_bin_at_zero() {
        let histogram = AngleHistogram::new(40.0, 3);
        assert_eq!(histogram.bins(), 243);
        assert_eq!(histogram.bin_of(0.0), Some(121));
        assert!(histogram.bin_center(121).abs() < 1e-12);
        assert_eq!(histogram.bin_of(-40.0), Some(1));
        assert_eq!(histogram.bin_of(40.0), Some(241));
    }

    #[test]
    fn rejects_out_of_range_and_nan() {
        let mut histogram = AngleHistogram::new(40.0, 3);
        assert!(!histogram.add(40.5, 1.0));
        assert!(!histogram.add(f64::NAN, 1.0));
        assert_eq!(histogram.total(), 0.0);
    }

    #[test]
    fn bins_are_one_over_subdegrees_wide() {
        let histogram = AngleHistogram::new(10.0, 4);
        let bin = histogram.bin_of(5.0).unwrap();
        assert!((histogram.bin_center(bin) - 5.0).abs() <= 0.125 + 1e-12);
        assert_eq!(histogram.bin_of(5.1), Some(bin));
        assert_eq!(histogram.bin_of(5.3), Some(bin + 1));
    }

    #[test]
    fn mean_ranges_average_per_bin() {
        let mut histogram = AngleHistogram::new(5.0, 1);
        histogram.add(0.0, 10.0);
        histogram.add(0.2, 30.0);
        let ranges = histogram.mean_ranges();
        let bin = histogram.bin_of(0.0).unwrap();
        assert_eq!(ranges[bin], 20.0);
        assert_eq!(ranges.iter().filter(|&&r| r != 0.0).count(), 1);
    }
}
