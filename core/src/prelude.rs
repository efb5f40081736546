use crate::dsp::window::SpectrumWindow;
use serde::{Deserialize, Serialize};

/// Tuning shared by every digest cycle of a radar unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DspConfig {
    /// Number of incoming frames worth of samples kept per channel.
    pub buffer_size: usize,
    /// Samples per channel carried by one incoming frame.
    pub incoming_size: usize,
    /// Output length of every downsampled display sequence.
    pub display_points: usize,
    /// Scalar relating phase difference to `sin(angle)` (antenna spacing over wavelength).
    pub phase_calibration: f64,
    /// Angles beyond +/- this many degrees are discarded.
    pub max_angle_deg: f64,
    /// Histogram bins per degree.
    pub subdegrees: usize,
    /// Half width of the moving average applied to the angle histogram.
    pub smoothing_radius: usize,
    /// Neighbours on each side a spectral peak must exceed.
    pub peak_window: usize,
    /// Taper of the per-channel display spectrum.
    pub spectrum_window: SpectrumWindow,
}

impl DspConfig {
    /// Raw sample window `W` each digest operates on.
    pub fn window(&self) -> usize {
        self.buffer_size * self.incoming_size
    }
}

impl Default for DspConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1,
            incoming_size: 16 * 512,
            display_points: 1024,
            phase_calibration: 0.2257,
            max_angle_deg: 40.0,
            subdegrees: 3,
            smoothing_radius: 10,
            peak_window: 2,
            spectrum_window: SpectrumWindow::Hann,
        }
    }
}

/// Common error type for digest stages.
#[derive(thiserror::Error, Debug)]
pub enum StageError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("insufficient data: have {have} samples, need {need}")]
    InsufficientData { have: usize, need: usize },
    #[error("internal failure: {0}")]
    Internal(String),
}

pub type StageResult<T> = Result<T, StageError>;
