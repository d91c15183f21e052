//! JSON-RPC server for checkpoint operators.
//!
//! Uses jsonrpsee 0.24 to expose `getcheckpoint` (status) and
//! `sendcheckpoint` (master-mode manual broadcast).

use std::sync::Arc;

use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use serde::{Deserialize, Serialize};

use keel_checkpoint::AcceptanceOutcome;
use keel_core::error::{CheckpointError, KeelError};
use keel_core::types::Hash256;

use crate::node::{CheckpointStatus, Node};

/// Result of a manual checkpoint broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendCheckpointJson {
    /// Target hash as hex.
    pub hash: String,
    /// `accepted`, `ignored`, `deferred` or `rejected`.
    pub outcome: String,
    /// Rejection detail, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Parse a hex-encoded 32-byte hash.
pub fn parse_hash(hex_str: &str) -> Result<Hash256, ErrorObjectOwned> {
    if hex_str.len() != 64 {
        return Err(rpc_error(-1, "hash must be 64 hex characters"));
    }
    let bytes = hex::decode(hex_str).map_err(|_| rpc_error(-1, "invalid hex in hash"))?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| rpc_error(-1, "hash must be 32 bytes"))?;
    Ok(Hash256(arr))
}

/// Create a JSON-RPC error.
fn rpc_error(code: i32, msg: &str) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(code, msg.to_string(), None::<()>)
}

fn node_error(e: KeelError) -> ErrorObjectOwned {
    match e {
        KeelError::Checkpoint(CheckpointError::MasterKeyUnavailable) => {
            rpc_error(-4, "checkpoint master key not set")
        }
        other => rpc_error(-1, &other.to_string()),
    }
}

/// The keel checkpoint JSON-RPC interface.
#[rpc(server)]
pub trait KeelRpc {
    /// Returns the active sync checkpoint.
    #[method(name = "getcheckpoint")]
    async fn get_checkpoint(&self) -> Result<CheckpointStatus, ErrorObjectOwned>;

    /// Signs and broadcasts a checkpoint for the given block hash.
    #[method(name = "sendcheckpoint")]
    async fn send_checkpoint(&self, hash: String) -> Result<SendCheckpointJson, ErrorObjectOwned>;
}

/// Implementation of the keel JSON-RPC server.
pub struct RpcServerImpl {
    node: Arc<Node>,
}

impl RpcServerImpl {
    pub fn new(node: Arc<Node>) -> Self {
        Self { node }
    }
}

#[async_trait]
impl KeelRpcServer for RpcServerImpl {
    async fn get_checkpoint(&self) -> Result<CheckpointStatus, ErrorObjectOwned> {
        Ok(self.node.checkpoint_status())
    }

    async fn send_checkpoint(&self, hash: String) -> Result<SendCheckpointJson, ErrorObjectOwned> {
        let target = parse_hash(&hash)?;
        let outcome = self
            .node
            .broadcast_new_checkpoint(target)
            .map_err(node_error)?;
        let (outcome, reason) = match outcome {
            AcceptanceOutcome::Accepted => ("accepted", None),
            AcceptanceOutcome::Ignored => ("ignored", None),
            AcceptanceOutcome::Deferred => ("deferred", None),
            AcceptanceOutcome::Rejected(r) => ("rejected", Some(r.to_string())),
        };
        Ok(SendCheckpointJson {
            hash,
            outcome: outcome.to_string(),
            reason,
        })
    }
}

/// Start the JSON-RPC server on the given address.
///
/// Returns a [`ServerHandle`] that can be used to stop the server.
pub async fn start_rpc_server(addr: &str, node: Arc<Node>) -> Result<ServerHandle, KeelError> {
    let server = Server::builder()
        .build(addr)
        .await
        .map_err(|e| KeelError::Storage(format!("RPC server error: {e}")))?;

    let rpc_impl = RpcServerImpl::new(node);
    let handle = server.start(rpc_impl.into_rpc());

    Ok(handle)
}
