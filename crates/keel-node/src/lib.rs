//! # keel-node: checkpoint node with RocksDB, RPC, and orchestration.
//!
//! Composes the checkpoint subsystems into a running node:
//! - [`storage::RocksStore`]: durable checkpoint record and block index backed by RocksDB
//! - [`node::Node`]: wires chain events, peer messages, and relay to the engine
//! - [`rpc`]: JSON-RPC server for operators
//! - [`config::NodeConfig`]: node configuration

pub mod config;
pub mod node;
pub mod rpc;
pub mod storage;

pub use config::NodeConfig;
pub use node::{CheckpointStatus, Node};
pub use rpc::start_rpc_server;
pub use storage::RocksStore;
