//! Stateless numeric building blocks used by the digest pipeline.

pub mod chirp;
pub mod fft;
pub mod filter;
pub mod peaks;
pub mod phase;
pub mod stats;
pub mod window;

pub use fft::FftHelper;
pub use stats::StatsHelper;
