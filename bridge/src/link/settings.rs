use crate::link::UnitRegistry;
use bytes::Bytes;
use log::{info, warn};
use radarcore::wire::{Metadata, ProtocolError};
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("unknown unit {0}")]
    UnknownUnit(String),
    #[error("cannot derive a settings URL from {0}")]
    BadAddress(String),
    #[error("device request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Forwards settings updates from viewers to the device's HTTP endpoint and
/// republishes the metadata it answers with.
pub struct SettingsProxy {
    registry: UnitRegistry,
    client: reqwest::Client,
    settings_path: String,
}

impl SettingsProxy {
    pub fn new(registry: UnitRegistry, settings_path: impl Into<String>) -> Self {
        Self {
            registry,
            client: reqwest::Client::new(),
            settings_path: settings_path.into(),
        }
    }

    /// Maps `ws://host[:port]/...` to `http://host[:port]<settings_path>`.
    pub fn device_url(&self, address: &str) -> Result<Url, SettingsError> {
        let bad = || SettingsError::BadAddress(address.to_string());
        let mut url = Url::parse(address).map_err(|_| bad())?;
        let scheme = match url.scheme() {
            "ws" | "http" => "http",
            "wss" | "https" => "https",
            _ => return Err(bad()),
        };
        url.set_scheme(scheme).map_err(|_| bad())?;
        url.set_path(&self.settings_path);
        url.set_query(None);
        Ok(url)
    }

    pub async fn forward(&self, mac: &str, body: Bytes) -> Result<Metadata, SettingsError> {
        let link = self
            .registry
            .get(mac)
            .ok_or_else(|| SettingsError::UnknownUnit(mac.to_string()))?;
        let url = self.device_url(link.address())?;

        let reply = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let mut metadata = Metadata::decode(&reply)?;
        metadata.connected = true;
        link.replace_metadata(metadata.clone());
        info!("Settings of unit {} updated via {}", mac, url);
        Ok(metadata)
    }
}

/// `POST /update/{mac}` with the settings JSON as body.
pub fn routes(proxy: Arc<SettingsProxy>) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let proxy_filter = warp::any().map(move || proxy.clone());
    warp::path!("update" / String)
        .and(warp::post())
        .and(warp::body::bytes())
        .and(proxy_filter)
        .and_then(|mac: String, body: Bytes, proxy: Arc<SettingsProxy>| async move {
            let status = match proxy.forward(&mac, body).await {
                Ok(_) => StatusCode::OK,
                Err(SettingsError::UnknownUnit(_)) => StatusCode::NOT_FOUND,
                Err(err) => {
                    warn!("Settings update for {} failed: {}", mac, err);
                    StatusCode::BAD_GATEWAY
                }
            };
            let text = if status == StatusCode::OK {
                "OK".to_string()
            } else {
                status.canonical_reason().unwrap_or_default().to_string()
            };
            Ok::<_, Infallible>(warp::reply::with_status(text, status))
        })
}
