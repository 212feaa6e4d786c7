#![forbid(unsafe_code)]
//! HTTP node for CentralChain

use centralchain::api::{run_api_server, Node};
use centralchain::blockchain::Blockchain;
use centralchain::config::{load_config, load_config_from};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "centralchain-server",
    version,
    about = "Serve a proof-of-work ledger over HTTP"
)]
struct Args {
    /// Path to the TOML configuration file [default: config.toml]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Leading zero hex digits required of mined blocks (overrides config)
    #[arg(short, long)]
    difficulty: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(difficulty) = args.difficulty {
        config.chain.difficulty = difficulty;
    }
    config.validate()?;

    info!(difficulty = config.chain.difficulty, "Starting CentralChain node");

    let node = Arc::new(Node::new(Blockchain::new(config.chain.difficulty)));

    if let Err(e) = run_api_server(node, &config.server.host, config.server.port).await {
        error!("API server failed: {}", e);
        return Err(e);
    }

    Ok(())
}
