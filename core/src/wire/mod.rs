//! Wire schema shared with sensors and viewers.

pub mod frame;
pub mod metadata;
pub mod unit;

pub use frame::SampleFrame;
pub use metadata::{Chirp, Metadata, Sampling, Telemetry};
pub use unit::{Channel, Unit, SCHEMA_VERSION};

/// Failure to interpret a text message received from a sensor.
#[derive(thiserror::Error, Debug)]
pub enum ProtocolError {
    #[error("malformed handshake reply: {0}")]
    Handshake(#[source] serde_json::Error),
    #[error("handshake reply is not a JSON object")]
    NotAnObject,
    #[error("malformed telemetry: {0}")]
    Telemetry(#[source] serde_json::Error),
}
