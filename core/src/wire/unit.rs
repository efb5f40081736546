use crate::wire::metadata::Metadata;
use serde::{Deserialize, Serialize};

/// Version stamped on every published [`Unit`].
pub const SCHEMA_VERSION: u32 = 2;

/// Derived data for one receive channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Channel {
    pub signal_i: Vec<f64>,
    pub signal_q: Vec<f64>,
    pub phase: Vec<f64>,
    pub spectrum: Vec<f64>,
    pub peaks: Vec<usize>,
    pub frequencies: Vec<f64>,
}

/// Processed frame of one radar unit, as broadcast to viewers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Unit {
    pub version: u32,
    pub rssi: f64,
    pub temperature: f64,
    pub pan: f64,
    pub tilt: f64,
    pub channels: Vec<Channel>,
    pub metadata: Metadata,
    /// Smoothed angle-of-arrival histogram.
    pub phase: Vec<f64>,
    /// Mean range per histogram bin.
    pub distance: Vec<f64>,
    pub duration: f64,
    pub rate: f64,
    pub samples: f64,
}

impl Default for Unit {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION,
            rssi: 0.0,
            temperature: 0.0,
            pan: 0.0,
            tilt: 0.0,
            channels: vec![Channel::default(), Channel::default()],
            metadata: Metadata::default(),
            phase: Vec::new(),
            distance: Vec::new(),
            duration: 0.0,
            rate: 0.0,
            samples: 0.0,
        }
    }
}
