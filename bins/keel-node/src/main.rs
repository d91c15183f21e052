//! Keel checkpoint node binary.
//!
//! Opens the RocksDB checkpoint store, enforces the sync checkpoint against
//! the persisted block index, and serves the operator JSON-RPC interface.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use keel_core::constants::NetworkType;
use keel_network::LoopbackTransport;
use keel_node_lib::{start_rpc_server, Node, NodeConfig};
use tracing::{error, info, warn};

/// Keel checkpoint node.
#[derive(Parser, Debug)]
#[command(
    name = "keel-node",
    version,
    about = "Keel sync checkpoint node with RocksDB storage and JSON-RPC server"
)]
struct Args {
    /// Data directory for checkpoint storage
    #[arg(long, default_value = None)]
    data_dir: Option<PathBuf>,

    /// RPC server bind address
    #[arg(long, default_value = "127.0.0.1")]
    rpc_bind: String,

    /// RPC server port (defaults to the network's port)
    #[arg(long)]
    rpc_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Blocks below the tip that automatic checkpoints trail by
    #[arg(long, default_value_t = keel_core::constants::DEFAULT_CHECKPOINT_DEPTH)]
    checkpoint_depth: u64,

    /// Hex ed25519 secret of the checkpoint master key. Enables master mode.
    #[arg(long, env = "KEEL_CHECKPOINT_MASTER_KEY", hide_env_values = true)]
    checkpoint_master_key: Option<String>,

    /// Broadcast a checkpoint on every connected block (master mode only)
    #[arg(long)]
    auto_checkpoint: bool,

    /// Use the test network.
    #[arg(long, conflicts_with = "regtest")]
    testnet: bool,

    /// Run in local regression-test mode (regtest).
    #[arg(long, conflicts_with = "testnet")]
    regtest: bool,
}

impl Args {
    /// Convert CLI args into a NodeConfig.
    fn into_config(self) -> (NodeConfig, String) {
        let network_type = if self.regtest {
            NetworkType::Regtest
        } else if self.testnet {
            NetworkType::Testnet
        } else {
            NetworkType::Mainnet
        };

        let defaults = NodeConfig::for_network(network_type);
        let config = NodeConfig {
            data_dir: self.data_dir.unwrap_or(defaults.data_dir.clone()),
            rpc_bind: self.rpc_bind,
            rpc_port: self.rpc_port.unwrap_or(defaults.rpc_port),
            log_level: self.log_level,
            checkpoint_depth: self.checkpoint_depth,
            checkpoint_master_key: self.checkpoint_master_key,
            auto_checkpoint: self.auto_checkpoint,
            ..defaults
        };

        (config, self.log_format)
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let (config, log_format) = args.into_config();

    init_logging(&config.log_level, &log_format);

    info!("Keel checkpoint node v{}", env!("CARGO_PKG_VERSION"));
    info!("network: {:?}", config.network_type);
    info!("data_dir: {:?}", config.data_dir);
    info!("rpc_addr: {}", config.rpc_addr());

    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        error!("failed to create data_dir: {}", e);
        process::exit(1);
    }

    if config.auto_checkpoint && config.checkpoint_master_key.is_none() {
        warn!("--auto-checkpoint has no effect without a checkpoint master key");
    }

    // Peers are attached by the P2P layer; until then relay reaches nobody.
    let transport = Arc::new(LoopbackTransport::new());
    let node = match Node::open(config.clone(), transport) {
        Ok(n) => n,
        Err(e) => {
            error!("failed to start node: {}", e);
            process::exit(1);
        }
    };

    let status = node.checkpoint_status();
    info!(
        checkpoint = %status.hash,
        height = ?status.height,
        master = status.master,
        "sync checkpoint loaded"
    );

    let rpc_handle = match start_rpc_server(&config.rpc_addr(), node.clone()).await {
        Ok(handle) => {
            info!("RPC server listening on {}", config.rpc_addr());
            handle
        }
        Err(e) => {
            error!("failed to start RPC server: {}", e);
            process::exit(1);
        }
    };

    info!("Keel node running (Ctrl+C to stop)");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for Ctrl+C: {}", e);
    }
    info!("shutdown signal received");

    rpc_handle.stop().ok();
    rpc_handle.stopped().await;
    info!("RPC server stopped");
    info!("Keel node shutdown complete");
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Pass `format = "json"` for structured JSON output. Any other value
/// defaults to human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
