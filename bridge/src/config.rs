use crate::link::LinkConfig;
use anyhow::Context;
use radarcore::DspConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

/// Gateway settings, read from YAML or assembled from command-line flags.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Sensor WebSocket addresses, e.g. `ws://10.0.1.141/ws`.
    pub units: Vec<String>,
    pub bind: SocketAddr,
    pub viewer_path: String,
    pub viewer_queue: usize,
    pub outbound_capacity: usize,
    /// Device HTTP path that settings updates are posted to.
    pub settings_path: String,
    pub link: LinkConfig,
    pub dsp: DspConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            units: Vec::new(),
            bind: SocketAddr::from(([0, 0, 0, 0], 5500)),
            viewer_path: "/".to_string(),
            viewer_queue: 4,
            outbound_capacity: 128,
            settings_path: "/system".to_string(),
            link: LinkConfig::default(),
            dsp: DspConfig::default(),
        }
    }
}

impl GatewayConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading gateway config {}", path_ref.display()))?;
        let config: GatewayConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing gateway config {}", path_ref.display()))?;
        config
            .validate()
            .with_context(|| format!("validating gateway config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(units: Vec<String>, bind: SocketAddr, viewer_path: String) -> Self {
        Self {
            units,
            bind,
            viewer_path,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.dsp.window() > 0, "dsp window must hold at least one sample");
        anyhow::ensure!(self.dsp.subdegrees > 0, "dsp.subdegrees must be positive");
        anyhow::ensure!(self.viewer_queue > 0, "viewer_queue must be positive");
        anyhow::ensure!(self.outbound_capacity > 0, "outbound_capacity must be positive");
        anyhow::ensure!(
            self.viewer_path.starts_with('/'),
            "viewer_path must start with '/'"
        );
        Ok(())
    }

    /// Link settings with the DSP section folded in.
    pub fn to_link_config(&self) -> LinkConfig {
        LinkConfig {
            dsp: self.dsp.clone(),
            ..self.link.clone()
        }
    }
}
