//! Node configuration for the keel checkpoint node.
//!
//! Provides [`NodeConfig`] with defaults for data directory, RPC binding,
//! and checkpoint policy. Per-network values (magic bytes, ports, genesis,
//! authority key) come from [`NetworkType`].

use std::path::PathBuf;

use keel_core::constants::{NetworkType, DEFAULT_CHECKPOINT_DEPTH, MIN_CHECKPOINT_DEPTH};
use keel_core::crypto::KeyPair;
use keel_core::error::ConfigError;

/// Configuration for a node instance.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Which network's parameters to use.
    pub network_type: NetworkType,
    /// Root directory for all persistent data.
    pub data_dir: PathBuf,
    /// IP address for the JSON-RPC server to bind to.
    pub rpc_bind: String,
    /// Port for the JSON-RPC server.
    pub rpc_port: u16,
    /// Log level filter string (e.g. "info", "debug", "keel_checkpoint=trace").
    pub log_level: String,
    /// Blocks below the tip that an automatic checkpoint trails by.
    pub checkpoint_depth: u64,
    /// Hex ed25519 secret. Enables checkpoint master mode when set.
    pub checkpoint_master_key: Option<String>,
    /// Broadcast a checkpoint on every connected block (master mode only).
    pub auto_checkpoint: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let network_type = NetworkType::default();
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keel")
            .join(network_type.data_dir_suffix());

        Self {
            network_type,
            data_dir,
            rpc_bind: "127.0.0.1".to_string(),
            rpc_port: network_type.default_rpc_port(),
            log_level: "info".to_string(),
            checkpoint_depth: DEFAULT_CHECKPOINT_DEPTH,
            checkpoint_master_key: None,
            auto_checkpoint: false,
        }
    }
}

impl NodeConfig {
    /// Defaults for `network_type`, including its data directory and RPC port.
    pub fn for_network(network_type: NetworkType) -> Self {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            network_type,
            data_dir: base.join("keel").join(network_type.data_dir_suffix()),
            rpc_port: network_type.default_rpc_port(),
            ..Self::default()
        }
    }

    /// Path to the RocksDB data directory.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("chaindata")
    }

    /// Socket address string for the RPC server.
    pub fn rpc_addr(&self) -> String {
        format!("{}:{}", self.rpc_bind, self.rpc_port)
    }

    /// Reject unsafe checkpoint policy and malformed master keys.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.checkpoint_depth < MIN_CHECKPOINT_DEPTH {
            return Err(ConfigError::UnsafeCheckpointDepth {
                depth: self.checkpoint_depth,
                min: MIN_CHECKPOINT_DEPTH,
            });
        }
        if let Some(key) = &self.checkpoint_master_key {
            KeyPair::from_hex(key).map_err(ConfigError::MasterKey)?;
        }
        Ok(())
    }
}
