use crate::wire::ProtocolError;
use serde::{Deserialize, Serialize};

/// Chirp generator settings reported by the sensor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Chirp {
    pub prf: i64,
    pub duration: i64,
    pub steps: i64,
    pub padding: i64,
    pub resolution: i64,
}

impl Chirp {
    /// Swept bandwidth in Hz; `resolution` is a 12-bit DAC span over a 2.5 x 80 MHz range.
    pub fn bandwidth_hz(&self) -> f64 {
        (self.resolution as f64 / 4096.0) * 2.5 * 80e6
    }

    /// Duration of one sweep in seconds.
    pub fn sweep_duration_s(&self) -> f64 {
        let mut micros = self.prf as f64;
        if self.padding > 0 && self.steps > 0 {
            micros /= self.steps as f64 / self.padding as f64;
        }
        micros / 1e6
    }
}

/// ADC settings reported by the sensor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sampling {
    pub frequency: i64,
    pub samples: i64,
    pub attenuation: i64,
}

/// Identity and fixed configuration of a radar unit, sent as the handshake reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Metadata {
    pub name: String,
    pub mac: String,
    pub base: i64,
    pub x_fov: i64,
    pub y_fov: i64,
    #[serde(rename = "enable")]
    pub enabled: i64,
    pub audible: i64,
    pub rate: f64,
    pub duration: f64,
    pub gyro: i64,
    pub connected: bool,
    pub sampling: Sampling,
    pub chirp: Chirp,
}

impl Metadata {
    /// Decodes a handshake reply.
    ///
    /// Replies carrying an `adc` object use the schema-1 layout and are
    /// migrated into the current shape.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let value: serde_json::Value =
            serde_json::from_slice(data).map_err(ProtocolError::Handshake)?;
        if !value.is_object() {
            return Err(ProtocolError::NotAnObject);
        }
        if value.get("adc").is_some() {
            let legacy: LegacyMetadata =
                serde_json::from_value(value).map_err(ProtocolError::Handshake)?;
            Ok(legacy.into())
        } else {
            serde_json::from_value(value).map_err(ProtocolError::Handshake)
        }
    }

    /// Sample rate of the I/Q stream in Hz.
    pub fn sample_rate_hz(&self) -> f64 {
        self.sampling.frequency as f64
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LegacyMetadata {
    name: String,
    mac: String,
    base: i64,
    x_fov: i64,
    y_fov: i64,
    adc: LegacyAdc,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacyAdc {
    chirp: Chirp,
    base: f64,
    frequency: f64,
    samples: i64,
    prf: i64,
}

impl From<LegacyMetadata> for Metadata {
    fn from(legacy: LegacyMetadata) -> Self {
        let mut chirp = legacy.adc.chirp;
        if chirp.prf == 0 {
            chirp.prf = legacy.adc.prf;
        }
        let base = if legacy.base != 0 {
            legacy.base
        } else {
            legacy.adc.base as i64
        };
        Metadata {
            name: legacy.name,
            mac: legacy.mac,
            base,
            x_fov: legacy.x_fov,
            y_fov: legacy.y_fov,
            sampling: Sampling {
                frequency: legacy.adc.frequency as i64,
                samples: legacy.adc.samples,
                attenuation: 0,
            },
            chirp,
            ..Default::default()
        }
    }
}

/// Orientation and health report pushed by the sensor as a text frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Telemetry {
    #[serde(rename = "roll", alias = "pan")]
    pub pan: f64,
    #[serde(rename = "pitch", alias = "tilt")]
    pub tilt: f64,
    pub temperature: f64,
    pub rssi: f64,
}

impl Telemetry {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Telemetry)
    }
}
