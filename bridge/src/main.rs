use anyhow::Context;
use clap::Parser;
use config::GatewayConfig;
use hub::BroadcastHub;
use link::settings::{self, SettingsProxy};
use link::UnitRegistry;
use log::{info, warn};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use tokio::sync::mpsc;
use warp::Filter;

mod config;
mod hub;
mod link;

#[derive(Parser)]
#[command(author, version, about = "Bridges FMCW radar units to WebSocket viewers")]
struct Args {
    /// Load the gateway config from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Sensor WebSocket address; repeat for several units
    #[arg(long = "unit")]
    units: Vec<String>,
    #[arg(long, default_value = "0.0.0.0:5500")]
    bind: SocketAddr,
    #[arg(long, default_value = "/")]
    viewer_path: String,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let gateway_config = if let Some(path) = args.config {
        let mut config = GatewayConfig::load(path)?;
        config.units.extend(args.units);
        config
    } else {
        let config = GatewayConfig::from_args(args.units, args.bind, args.viewer_path);
        config.validate()?;
        config
    };

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating runtime")?;
    runtime.block_on(serve(gateway_config))
}

async fn serve(config: GatewayConfig) -> anyhow::Result<()> {
    if config.units.is_empty() {
        warn!("No radar units configured; serving viewers only");
    }

    let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_capacity);
    let hub = BroadcastHub::new(config.viewer_queue);
    tokio::spawn(hub.clone().pump(outbound_rx));

    let registry = UnitRegistry::new(config.to_link_config(), outbound_tx);
    for address in &config.units {
        info!("Adding unit @ {}", address);
        registry.add_unit(address);
    }

    let proxy = Arc::new(SettingsProxy::new(registry.clone(), config.settings_path.clone()));
    let routes = hub.routes(&config.viewer_path).or(settings::routes(proxy));
    let (addr, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown(config.bind, async {
            if let Err(err) = signal::ctrl_c().await {
                warn!("Awaiting Ctrl+C failed: {}", err);
            }
        })
        .with_context(|| format!("binding viewer endpoint {}", config.bind))?;
    info!("Viewers served on ws://{}{}", addr, config.viewer_path);

    server.await;
    info!("Shutting down {} unit links {:?}", registry.len(), registry.addresses());
    registry.shutdown();
    Ok(())
}
