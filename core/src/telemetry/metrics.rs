use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Minimum span over which the ingest rate is averaged.
const RATE_WINDOW: Duration = Duration::from_secs(1);

/// Per-unit ingest and publish counters.
pub struct IngestMetrics {
    inner: Mutex<Metrics>,
}

struct Metrics {
    frames: usize,
    skipped: usize,
    digests: usize,
    dropped: usize,
    window_frames: usize,
    window_start: Instant,
    rate: f64,
    adc_duration_us: f64,
}

/// Point-in-time copy of [`IngestMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub frames: usize,
    pub skipped: usize,
    pub digests: usize,
    pub dropped: usize,
    /// Frames per second over the last completed window.
    pub rate: f64,
    /// ADC capture time reported by the most recent frame.
    pub adc_duration_us: f64,
}

impl IngestMetrics {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics {
                frames: 0,
                skipped: 0,
                digests: 0,
                dropped: 0,
                window_frames: 0,
                window_start: Instant::now(),
                rate: 0.0,
                adc_duration_us: 0.0,
            }),
        }
    }

    pub fn record_frame(&self, adc_duration_us: i64) {
        self.record_frame_at(Instant::now(), adc_duration_us);
    }

    fn record_frame_at(&self, now: Instant, adc_duration_us: i64) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.frames += 1;
            metrics.window_frames += 1;
            metrics.adc_duration_us = adc_duration_us as f64;
            let elapsed = now.saturating_duration_since(metrics.window_start);
            if elapsed >= RATE_WINDOW {
                metrics.rate = metrics.window_frames as f64 / elapsed.as_secs_f64();
                metrics.window_frames = 0;
                metrics.window_start = now;
            }
        }
    }

    pub fn record_skipped(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.skipped += 1;
        }
    }

    pub fn record_digest(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.digests += 1;
        }
    }

    pub fn record_dropped(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.dropped += 1;
        }
    }

    /// Restarts the rate window, e.g. after a reconnect.
    pub fn restart_window(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.window_frames = 0;
            metrics.window_start = Instant::now();
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            MetricsSnapshot {
                frames: metrics.frames,
                skipped: metrics.skipped,
                digests: metrics.digests,
                dropped: metrics.dropped,
                rate: metrics.rate,
                adc_duration_us: metrics.adc_duration_us,
            }
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames ({} skipped) at {:.1}/s, {} digests, {} dropped",
            self.frames, self.skipped, self.rate, self.digests, self.dropped
        )
    }
}

impl Default for IngestMetrics {
    fn default() -> Self {
        Self::new()
    }
}
