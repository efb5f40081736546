pub mod histogram;
pub mod pipeline;
pub mod sample_buffer;

pub use histogram::AngleHistogram;
pub use pipeline::{DigestOutput, DigestPipeline};
pub use sample_buffer::RawSampleBuffer;
