use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use streamvault_gateway::{GatewayConfig, StreamVaultServer};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file with [server], [s3], and [sources] tables.
    #[arg(short, long)]
    config: PathBuf,

    /// Override the configured bind address.
    #[arg(long)]
    bind_address: Option<String>,

    /// Override the configured port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the configured log level.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_content = tokio::fs::read_to_string(&args.config).await?;
    let mut config: GatewayConfig = toml::from_str(&config_content)?;

    if let Some(bind_address) = args.bind_address {
        config.server.bind_address = bind_address;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(log_level) = args.log_level {
        config.server.log_level = log_level;
    }

    let server = StreamVaultServer::new(config);
    server.run().await
}
