//! ws-vwap - streaming VWAP over the Coinbase level2 feed.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use vwap_app::{AppConfig, Application, ConfigOverrides};

/// Streaming VWAP calculator for the Coinbase level2 feed
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via VWAP_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Feed WebSocket URL
    #[arg(long)]
    ws_url: Option<String>,

    /// Comma-separated instruments, e.g. BTC-USD,ETH-USD
    #[arg(long, value_delimiter = ',')]
    product_ids: Option<Vec<String>>,

    /// Samples kept per instrument
    #[arg(long)]
    window_size: Option<usize>,

    /// Include changes at sentinel prices
    #[arg(long)]
    keep_dubious: bool,

    /// Log filter (RUST_LOG takes precedence)
    #[arg(long)]
    log_level: Option<String>,
}

impl From<Args> for ConfigOverrides {
    fn from(args: Args) -> Self {
        Self {
            ws_url: args.ws_url,
            product_ids: args.product_ids,
            window_size: args.window_size,
            keep_dubious: args.keep_dubious,
            log_level: args.log_level,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    vwap_ws::init_crypto();

    let mut args = Args::parse();

    let mut config = AppConfig::load(args.config.take().as_deref())?;
    config.apply_overrides(args.into());

    vwap_telemetry::init_logging(&config.telemetry.log_level)?;

    info!("Starting ws-vwap v{}", env!("CARGO_PKG_VERSION"));

    let app = Application::new(config)?;
    let stats = app.run().await?;

    info!(
        payloads = stats.payloads,
        emissions = stats.emissions,
        rejected = stats.rejected(),
        "Exiting"
    );
    Ok(())
}
