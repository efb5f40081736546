//! Sensor-facing side of the bridge: one [`RadarUnitLink`] per radar unit,
//! collected in a [`UnitRegistry`].

pub mod backoff;
pub mod registry;
pub mod settings;
pub mod unit;

pub use registry::UnitRegistry;
pub use unit::RadarUnitLink;

use radarcore::wire::ProtocolError;
use radarcore::{DspConfig, StageError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_tungstenite::tungstenite;

/// Timing and handshake settings shared by every unit link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub digest_interval_us: u64,
    pub render_interval_us: u64,
    /// Text frame that asks the sensor for its metadata.
    pub handshake: String,
    pub handshake_timeout_ms: u64,
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
    #[serde(skip)]
    pub dsp: DspConfig,
}

impl LinkConfig {
    pub fn digest_interval(&self) -> Duration {
        Duration::from_micros(self.digest_interval_us.max(1))
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_micros(self.render_interval_us.max(1))
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn reconnect_initial(&self) -> Duration {
        Duration::from_millis(self.reconnect_initial_ms)
    }

    pub fn reconnect_max(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_ms)
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            digest_interval_us: 25_000,
            render_interval_us: 33_333,
            handshake: "Ping!".to_string(),
            handshake_timeout_ms: 5_000,
            reconnect_initial_ms: 250,
            reconnect_max_ms: 10_000,
            dsp: DspConfig::default(),
        }
    }
}

/// Failures of a unit link.
#[derive(thiserror::Error, Debug)]
pub enum LinkError {
    #[error("transport error: {0}")]
    Transport(#[from] tungstenite::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("no handshake reply within {0:?}")]
    HandshakeTimeout(Duration),
    #[error("connection closed before the handshake reply")]
    Closed,
    #[error("outbound timeout, frame dropped after {0:?}")]
    Backpressure(Duration),
    #[error("outbound channel closed")]
    OutboundClosed,
    #[error("failed to encode unit: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Stage(#[from] StageError),
}

#[cfg(test)]
pub(crate) mod testing {
    use super::LinkConfig;
    use futures_util::{SinkExt, StreamExt};
    use radarcore::wire::frame::encode_frame;
    use radarcore::DspConfig;
    use serde_json::json;
    use std::time::Duration;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{accept_async, WebSocketStream};

    pub type SensorSocket = WebSocketStream<TcpStream>;

    /// Loopback sensor that answers the handshake with `reply` and hands every
    /// accepted socket to the test.
    pub struct FakeSensor {
        pub address: String,
        pub accepted: mpsc::UnboundedReceiver<SensorSocket>,
    }

    pub async fn fake_sensor(reply: String) -> FakeSensor {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = format!("ws://{}/ws", listener.local_addr().unwrap());
        let (tx, accepted) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let tx = tx.clone();
                let reply = reply.clone();
                tokio::spawn(async move {
                    let mut socket = accept_async(tcp).await.unwrap();
                    match socket.next().await {
                        Some(Ok(Message::Text(text))) if text == "Ping!" => {}
                        other => panic!("unexpected handshake {:?}", other),
                    }
                    socket.send(Message::Text(reply)).await.unwrap();
                    let _ = tx.send(socket);
                });
            }
        });
        FakeSensor { address, accepted }
    }

    pub fn sensor_metadata(name: &str, mac: &str) -> String {
        json!({
            "name": name,
            "mac": mac,
            "base": 24_000_000_000i64,
            "xFov": 80,
            "yFov": 20,
            "sampling": {"frequency": 16000, "samples": 512, "attenuation": 0},
            "chirp": {"prf": 1000, "duration": 1000, "steps": 0, "padding": 0, "resolution": 4096}
        })
        .to_string()
    }

    /// Link settings with a `frames x frame_len` window and fast timers.
    pub fn test_config(frames: usize, frame_len: usize) -> LinkConfig {
        LinkConfig {
            digest_interval_us: 5_000,
            render_interval_us: 50_000,
            handshake_timeout_ms: 1_000,
            reconnect_initial_ms: 20,
            reconnect_max_ms: 100,
            dsp: DspConfig {
                buffer_size: frames,
                incoming_size: frame_len,
                display_points: 64,
                smoothing_radius: 0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Binary frame with two tones `offset` radians apart.
    pub fn tone_frame(len: usize, start: usize, offset: f64) -> Vec<u8> {
        let quantize = |v: f64| (2048.0 + 900.0 * v).round() as u16;
        let step = 0.31;
        let mut blocks: [Vec<u16>; 4] = Default::default();
        for n in start..start + len {
            let t = step * n as f64;
            blocks[0].push(quantize((t + offset).cos()));
            blocks[1].push(quantize((t + offset).sin()));
            blocks[2].push(quantize(t.sin()));
            blocks[3].push(quantize(t.cos()));
        }
        encode_frame(
            [&blocks[0][..], &blocks[1][..], &blocks[2][..], &blocks[3][..]],
            0,
            12_500,
        )
    }

    /// Polls `condition` until it holds or `limit` passes.
    pub async fn eventually<F>(limit: Duration, mut condition: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = tokio::time::Instant::now() + limit;
        while tokio::time::Instant::now() < deadline {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        condition()
    }
}
