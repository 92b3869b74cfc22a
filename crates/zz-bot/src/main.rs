//! zz market maker - entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Automated market maker for the zz exchange
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via ZZ_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // TLS provider must be installed before any websocket connects
    zz_ws::init_crypto();

    let args = Args::parse();

    zz_telemetry::init_logging()?;

    info!("Starting zz-bot v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > ZZ_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("ZZ_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");

    let config = zz_bot::AppConfig::from_file(&config_path)?;
    info!(
        chain_id = config.chain_id,
        ws_url = %config.ws_url,
        pairs = config.pairs.len(),
        "Configuration loaded"
    );

    let app = zz_bot::Application::new(config)?;
    app.run().await?;

    Ok(())
}
