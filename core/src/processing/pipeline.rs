use crate::dsp::chirp::{chirp_len, linear_chirp};
use crate::dsp::fft::FftHelper;
use crate::dsp::filter::{downsample, matched_filter};
use crate::dsp::peaks::{argmax_from, bin_to_frequency, find_peaks};
use crate::dsp::phase::{angle_of_arrival, phase_difference};
use crate::dsp::stats::StatsHelper;
use crate::dsp::window;
use crate::prelude::{DspConfig, StageError, StageResult};
use crate::processing::histogram::AngleHistogram;
use crate::telemetry::log::LogManager;
use crate::wire::{Channel, Metadata};
use num_complex::Complex64;

/// Speed of light in vacuum (m/s).
const C: f64 = 299_792_458.0;
/// Spectral peaks below this fraction of the strongest bin are ignored.
const PEAK_FLOOR: f64 = 0.25;

/// Everything one digest cycle derives from a raw sample window.
#[derive(Debug, Clone)]
pub struct DigestOutput {
    pub channels: Vec<Channel>,
    /// Smoothed angle histogram.
    pub phase: Vec<f64>,
    /// Mean range per histogram bin.
    pub distance: Vec<f64>,
    pub histogram: AngleHistogram,
    /// Raw samples per channel that went into this digest.
    pub samples: usize,
}

/// DC removal, matched filtering, angle estimation and display reduction.
pub struct DigestPipeline {
    config: DspConfig,
    fft: FftHelper,
    logger: LogManager,
}

impl DigestPipeline {
    pub fn new(config: DspConfig) -> Self {
        Self {
            config,
            fft: FftHelper::new(),
            logger: LogManager::new("digest"),
        }
    }

    pub fn with_logger(mut self, logger: LogManager) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &DspConfig {
        &self.config
    }

    /// Sample count of the replica, computed without synthesizing it.
    pub fn replica_len(metadata: &Metadata) -> usize {
        chirp_len(metadata.chirp.sweep_duration_s(), metadata.sample_rate_hz())
    }

    /// Reference waveform described by the unit's chirp settings.
    pub fn replica(metadata: &Metadata) -> Vec<Complex64> {
        linear_chirp(
            metadata.chirp.sweep_duration_s(),
            metadata.sample_rate_hz(),
            metadata.chirp.bandwidth_hz(),
            metadata.base as f64,
        )
    }

    pub fn execute(
        &mut self,
        metadata: &Metadata,
        window: &[Vec<Complex64>; 2],
    ) -> StageResult<DigestOutput> {
        let samples = window[0].len();
        if samples == 0 || window[1].len() != samples {
            return Err(StageError::InvalidInput(format!(
                "channel windows of {} and {} samples",
                samples,
                window[1].len()
            )));
        }

        let dc_free = [
            StatsHelper::remove_dc(&window[0]),
            StatsHelper::remove_dc(&window[1]),
        ];

        let replica_len = Self::replica_len(metadata);
        let replica = if replica_len > 0 && replica_len <= samples {
            Self::replica(metadata)
        } else {
            Vec::new()
        };
        let filtered = if !replica.is_empty() {
            [
                matched_filter(&mut self.fft, &dc_free[0], &replica)?,
                matched_filter(&mut self.fft, &dc_free[1], &replica)?,
            ]
        } else {
            self.logger.record(&format!(
                "replica of {} samples unusable for a {} sample window, filter bypassed",
                replica_len, samples
            ));
            [
                StatsHelper::normalize_rms(&dc_free[0]),
                StatsHelper::normalize_rms(&dc_free[1]),
            ]
        };

        let sweep_len = replica.len();
        let ranges = self.sweep_ranges(&filtered[0], sweep_len, metadata);
        let mut histogram = AngleHistogram::new(self.config.max_angle_deg, self.config.subdegrees);
        let deltas = phase_difference(&filtered[0], &filtered[1]);
        for (index, delta) in deltas.into_iter().enumerate() {
            if filtered[0][index].norm_sqr() == 0.0 || filtered[1][index].norm_sqr() == 0.0 {
                continue;
            }
            if let Some(angle) = angle_of_arrival(delta, self.config.phase_calibration) {
                let range = ranges
                    .get(index / sweep_len.max(1))
                    .copied()
                    .unwrap_or(0.0);
                histogram.add(angle, range);
            }
        }

        self.logger.record(&format!(
            "{} of {} filtered samples inside +/-{} deg",
            histogram.total(),
            filtered[0].len(),
            self.config.max_angle_deg
        ));

        let channels = filtered
            .iter()
            .map(|channel| self.display_channel(channel, metadata))
            .collect();

        Ok(DigestOutput {
            channels,
            phase: histogram.smoothed(self.config.smoothing_radius),
            distance: histogram.mean_ranges(),
            histogram,
            samples,
        })
    }

    /// Range of the dominant beat in every complete sweep of `filtered`.
    fn sweep_ranges(
        &mut self,
        filtered: &[Complex64],
        sweep_len: usize,
        metadata: &Metadata,
    ) -> Vec<f64> {
        let bandwidth = metadata.chirp.bandwidth_hz();
        let sweep_time = metadata.chirp.sweep_duration_s();
        let sample_rate = metadata.sample_rate_hz();
        if sweep_len < 4 || bandwidth <= 0.0 {
            return Vec::new();
        }

        filtered
            .chunks_exact(sweep_len)
            .map(|sweep| {
                let spectrum = self.fft.forward(sweep, sweep_len);
                let magnitudes: Vec<f64> =
                    spectrum[..sweep_len / 2].iter().map(|c| c.norm()).collect();
                let peak = argmax_from(&magnitudes, 1).unwrap_or(0);
                let beat = bin_to_frequency(peak, sample_rate, sweep_len);
                C * sweep_time * beat / (2.0 * bandwidth)
            })
            .collect()
    }

    fn display_channel(&mut self, filtered: &[Complex64], metadata: &Metadata) -> Channel {
        let points = self.config.display_points;
        let signal_i = downsample(&filtered.iter().map(|c| c.re).collect::<Vec<_>>(), points);
        let signal_q = downsample(&filtered.iter().map(|c| c.im).collect::<Vec<_>>(), points);
        let phase = signal_i
            .iter()
            .zip(signal_q.iter())
            .map(|(i, q)| q.atan2(*i))
            .collect();

        let fft_len = filtered.len();
        let taper = self.config.spectrum_window.coefficients(fft_len);
        let windowed = window::apply(filtered, &taper);
        let magnitudes: Vec<f64> = self.fft.forward(&windowed, fft_len)[..fft_len / 2]
            .iter()
            .map(|c| c.norm())
            .collect();
        let peaks = find_peaks(&magnitudes, self.config.peak_window, PEAK_FLOOR);
        let frequencies = peaks
            .iter()
            .map(|&peak| bin_to_frequency(peak, metadata.sample_rate_hz(), fft_len))
            .collect();

        Channel {
            signal_i,
            signal_q,
            phase,
            spectrum: downsample(&magnitudes, points),
            peaks,
            frequencies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{Chirp, Sampling};

    fn metadata() -> Metadata {
        Metadata {
            base: 24_000_000_000,
            sampling: Sampling {
                frequency: 16_000,
                samples: 1024,
                attenuation: 0,
            },
            chirp: Chirp {
                prf: 1000,
                resolution: 4096,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn config(window: usize) -> DspConfig {
        DspConfig {
            incoming_size: window,
            display_points: 64,
            smoothing_radius: 0,
            ..Default::default()
        }
    }

    fn tone(len: usize, step: f64, offset: f64) -> Vec<Complex64> {
        (0..len)
            .map(|i| Complex64::new(2048.0, 2048.0) + Complex64::from_polar(900.0, step * i as f64 + offset))
            .collect()
    }

    #[test]
    fn identical_channels_concentrate_in_zero_bin() {
        let mut pipeline = DigestPipeline::new(config(512));
        let signal = tone(512, 0.31, 0.0);
        let output = pipeline
            .execute(&metadata(), &[signal.clone(), signal])
            .unwrap();

        let zero_bin = output.histogram.bin_of(0.0).unwrap();
        let total = output.histogram.total();
        assert!(total > 0.0);
        assert_eq!(output.histogram.counts()[zero_bin], total);
        assert_eq!(output.phase.len(), 243);
    }

    #[test]
    fn constant_offset_lands_in_expected_bin() {
        let offset = 1.2;
        let mut pipeline = DigestPipeline::new(config(512));
        let output = pipeline
            .execute(
                &metadata(),
                &[tone(512, 0.31, offset), tone(512, 0.31, 0.0)],
            )
            .unwrap();

        let expected = (0.2257_f64 * offset).asin().to_degrees();
        let peak = argmax_from(&output.phase, 0).unwrap();
        assert!((output.histogram.bin_center(peak) - expected).abs() <= 1.0 / 3.0);
    }

    #[test]
    fn display_sequences_are_downsampled() {
        let mut pipeline = DigestPipeline::new(config(512));
        let signal = tone(512, 0.5, 0.0);
        let output = pipeline
            .execute(&metadata(), &[signal.clone(), signal])
            .unwrap();

        assert_eq!(output.samples, 512);
        for channel in &output.channels {
            assert_eq!(channel.signal_i.len(), 64);
            assert_eq!(channel.signal_q.len(), 64);
            assert_eq!(channel.phase.len(), 64);
            assert_eq!(channel.spectrum.len(), 64);
            assert_eq!(channel.peaks.len(), channel.frequencies.len());
        }
    }

    #[test]
    fn spectrum_window_is_configurable() {
        let signal = tone(512, 0.5, 0.0);
        let hann = DigestPipeline::new(config(512))
            .execute(&metadata(), &[signal.clone(), signal.clone()])
            .unwrap();
        let mut tapered = config(512);
        tapered.spectrum_window = window::SpectrumWindow::BlackmanHarris;
        let blackman = DigestPipeline::new(tapered)
            .execute(&metadata(), &[signal.clone(), signal])
            .unwrap();

        assert_eq!(blackman.channels[0].spectrum.len(), 64);
        assert_ne!(hann.channels[0].spectrum, blackman.channels[0].spectrum);
        assert!(!blackman.channels[0].peaks.is_empty());
    }

    #[test]
    fn oversized_replica_bypasses_filter() {
        let mut meta = metadata();
        meta.chirp.prf = 1_000_000;
        let mut pipeline = DigestPipeline::new(config(256));
        let signal = tone(256, 0.2, 0.0);
        let output = pipeline.execute(&meta, &[signal.clone(), signal]).unwrap();
        assert_eq!(output.histogram.total(), 256.0);
        assert!(output.distance.iter().all(|&d| d == 0.0));
    }

    #[test]
    fn huge_chirp_period_bypasses_filter() {
        let mut meta = metadata();
        meta.chirp = Chirp {
            prf: i64::MAX,
            resolution: 2048,
            ..Default::default()
        };
        meta.sampling.frequency = 20_480;
        assert_eq!(DigestPipeline::replica_len(&meta), 0);

        let mut pipeline = DigestPipeline::new(config(64));
        let signal = tone(64, 0.3, 0.0);
        let output = pipeline.execute(&meta, &[signal.clone(), signal]).unwrap();
        assert_eq!(output.samples, 64);
        assert_eq!(output.histogram.total(), 64.0);
    }

    #[test]
    fn mismatched_windows_are_rejected() {
        let mut pipeline = DigestPipeline::new(config(8));
        let result = pipeline.execute(&metadata(), &[tone(8, 0.1, 0.0), tone(4, 0.1, 0.0)]);
        assert!(matches!(result, Err(StageError::InvalidInput(_))));
    }

    #[test]
    fn replica_follows_chirp_settings() {
        assert_eq!(DigestPipeline::replica(&metadata()).len(), 16);
        assert_eq!(DigestPipeline::replica_len(&metadata()), 16);
        assert!(DigestPipeline::replica(&Metadata::default()).is_empty());
    }
}
