//! Signal-processing core and wire schema for the radar bridge.
//!
//! The modules cover the sensor-facing wire format, the bounded raw sample
//! window, and the digest pipeline that turns two I/Q channels into an
//! angle-of-arrival histogram and display-ready channel traces.

pub mod dsp;
pub mod prelude;
pub mod processing;
pub mod telemetry;
pub mod wire;

pub use prelude::{DspConfig, StageError, StageResult};
