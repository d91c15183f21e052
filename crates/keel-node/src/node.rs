//! Node composition: checkpoint engine, storage, and peer relay.
//!
//! [`Node`] is the surface the rest of a full node talks to. Block
//! connection, inbound checkpoint messages, peer lifecycle events and master
//! broadcasts all enter here. Each entry point runs the engine under the
//! chain lock and then relays to peers once the lock is released.

use std::sync::Arc;

use libp2p::PeerId;
use tracing::{debug, info, trace, warn};

use keel_checkpoint::{AcceptanceOutcome, CheckpointAuthority, CheckpointEngine, SignedCheckpoint};
use keel_core::block_index::{BlockIndex, MemoryBlockIndex};
use keel_core::error::{BlockIndexError, CheckpointError, ConfigError, KeelError, KeyError};
use keel_core::store::CheckpointStore;
use keel_core::types::Hash256;
use keel_network::{CheckpointCodec, CheckpointRelay, PeerInfo, PeerTransport};

use crate::config::NodeConfig;
use crate::storage::RocksStore;

/// Snapshot answered to operator status queries.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CheckpointStatus {
    /// Active checkpoint hash (hex).
    pub hash: String,
    /// Height of the active checkpoint, if indexed.
    pub height: Option<u64>,
    /// Pending checkpoint hash (hex), if one is waiting for its block.
    pub pending: Option<String>,
    /// Whether this node holds the master key.
    pub master: bool,
}

/// A checkpoint-enforcing node.
pub struct Node {
    config: NodeConfig,
    engine: CheckpointEngine<MemoryBlockIndex>,
    relay: CheckpointRelay,
    transport: Arc<dyn PeerTransport>,
    /// Block persistence. `None` for nodes built on a non-RocksDB store.
    blocks: Option<Arc<RocksStore>>,
}

impl Node {
    /// Open RocksDB under the configured data directory and start a node.
    pub fn open(config: NodeConfig, transport: Arc<dyn PeerTransport>) -> Result<Arc<Self>, KeelError> {
        config.validate()?;
        let rocks = Arc::new(RocksStore::open(config.db_path())?);
        let index = rocks.load_block_index(config.network_type.genesis_hash())?;
        info!(
            path = %config.db_path().display(),
            blocks = index.len(),
            "opened checkpoint store"
        );
        let store: Arc<dyn CheckpointStore> = rocks.clone();
        Self::assemble(config, index, store, Some(rocks), transport)
    }

    /// Build a node over an arbitrary checkpoint store and a preloaded index.
    pub fn with_store(
        config: NodeConfig,
        index: MemoryBlockIndex,
        store: Arc<dyn CheckpointStore>,
        transport: Arc<dyn PeerTransport>,
    ) -> Result<Arc<Self>, KeelError> {
        config.validate()?;
        Self::assemble(config, index, store, None, transport)
    }

    fn assemble(
        config: NodeConfig,
        index: MemoryBlockIndex,
        store: Arc<dyn CheckpointStore>,
        blocks: Option<Arc<RocksStore>>,
        transport: Arc<dyn PeerTransport>,
    ) -> Result<Arc<Self>, KeelError> {
        let network = config.network_type;
        let authority = CheckpointAuthority::from_hex(network.checkpoint_pubkey())
            .map_err(CheckpointError::from)?;
        let engine = CheckpointEngine::new(index, store, authority, network.genesis_hash())?;
        engine.check_authority_key()?;
        if let Some(key) = &config.checkpoint_master_key {
            engine
                .set_master_private_key(key)
                .map_err(ConfigError::MasterKey)?;
        }
        info!(
            network = ?network,
            checkpoint = %engine.active_checkpoint(),
            master = engine.is_master(),
            "checkpoint node ready"
        );

        Ok(Arc::new(Self {
            relay: CheckpointRelay::new(CheckpointCodec::new(network)),
            config,
            engine,
            transport,
            blocks,
        }))
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn engine(&self) -> &CheckpointEngine<MemoryBlockIndex> {
        &self.engine
    }

    pub fn relay(&self) -> &CheckpointRelay {
        &self.relay
    }

    // ------------------------------------------------------------------
    // Chain events
    // ------------------------------------------------------------------

    /// Gate, index and persist a new block, then run [`on_block_connected`](Self::on_block_connected).
    ///
    /// Blocks that conflict with the sync checkpoint are refused with
    /// [`BlockIndexError::CheckpointConflict`]. The gate and the insert run
    /// under one chain guard, so a checkpoint accepted concurrently is either
    /// seen by the gate or sees the new block.
    pub fn connect_block(
        &self,
        hash: Hash256,
        parent: Hash256,
    ) -> Result<Option<AcceptanceOutcome>, KeelError> {
        let (block, is_tip) = {
            let mut chain = self.engine.lock();
            let parent_block = chain
                .index
                .lookup(&parent)
                .ok_or(BlockIndexError::UnknownParent(parent))?;
            let height = parent_block.height + 1;

            // The new block inherits its ancestry from the parent, which the
            // index already knows, so check both.
            let allowed =
                chain.admits(&hash, height)? && chain.admits(&parent, parent_block.height)?;
            if !allowed {
                warn!(block = %hash, height, "block rejected by sync checkpoint");
                return Err(BlockIndexError::CheckpointConflict { hash, height }.into());
            }

            let block = chain.index.connect(hash, &parent)?;
            let is_tip = chain.index.active_tip().is_some_and(|tip| tip.hash == hash);
            (block, is_tip)
        };
        if let Some(blocks) = &self.blocks {
            blocks.record_block(&block, is_tip)?;
        }
        debug!(block = %hash, height = block.height, is_tip, "connected block");
        self.on_block_connected()
    }

    /// Switch the active chain to end at `tip` (a reorganization).
    ///
    /// A tip that does not descend from the sync checkpoint is refused with
    /// [`BlockIndexError::CheckpointConflict`] and the active chain is left
    /// as it was.
    pub fn set_active_tip(&self, tip: &Hash256) -> Result<Option<AcceptanceOutcome>, KeelError> {
        {
            let mut chain = self.engine.lock();
            let block = chain
                .index
                .lookup(tip)
                .ok_or(BlockIndexError::BlockNotFound(*tip))?;
            if !chain.admits(tip, block.height)? {
                warn!(%tip, height = block.height, "reorganization rejected by sync checkpoint");
                return Err(BlockIndexError::CheckpointConflict {
                    hash: *tip,
                    height: block.height,
                }
                .into());
            }
            chain.index.set_tip(tip)?;
        }
        if let Some(blocks) = &self.blocks {
            blocks.record_tip(tip)?;
        }
        info!(%tip, "active chain reorganized");
        self.on_block_connected()
    }

    /// Promote a pending checkpoint and, in auto mode, issue a new one.
    ///
    /// Returns the outcome of the pending promotion, if one was attempted.
    pub fn on_block_connected(&self) -> Result<Option<AcceptanceOutcome>, KeelError> {
        let promoted = self.engine.promote_pending()?;
        if promoted.is_some_and(|o| o.is_accepted()) {
            self.relay_last_message();
        }

        if self.config.auto_checkpoint && self.engine.is_master() {
            let target = self.engine.auto_select(self.config.checkpoint_depth)?;
            if target != self.engine.active_checkpoint() {
                self.broadcast_new_checkpoint(target)?;
            }
        }
        Ok(promoted)
    }

    // ------------------------------------------------------------------
    // Checkpoint messages
    // ------------------------------------------------------------------

    /// Entry point for a framed checkpoint message from `peer`.
    pub fn on_checkpoint_message_received(
        &self,
        peer: &PeerId,
        bytes: &[u8],
    ) -> Result<AcceptanceOutcome, KeelError> {
        let message = self.relay.codec().decode(bytes).inspect_err(|e| {
            trace!(%peer, error = %e, "undecodable checkpoint message");
        })?;
        let outcome = self.engine.process_message(&message)?;
        // Authenticated: the sender evidently has this checkpoint.
        self.relay.mark_known(peer, message.target);
        if outcome.is_accepted() {
            self.relay_last_message();
        }
        Ok(outcome)
    }

    /// Sign `hash` with the master key, apply it locally, and relay it.
    pub fn broadcast_new_checkpoint(&self, hash: Hash256) -> Result<AcceptanceOutcome, KeelError> {
        if hash.is_zero() {
            debug!("not broadcasting null checkpoint");
            return Ok(AcceptanceOutcome::Ignored);
        }
        let message = self.engine.sign_checkpoint(hash)?;
        let outcome = self.engine.process_message(&message)?;
        match outcome {
            AcceptanceOutcome::Accepted => {
                info!(checkpoint = %hash, "broadcasting sync checkpoint");
                self.relay_last_message();
            }
            other => warn!(checkpoint = %hash, outcome = ?other, "own checkpoint was not accepted"),
        }
        Ok(outcome)
    }

    /// Consensus gate for the block-acceptance pipeline.
    pub fn validate_block_against_checkpoint(
        &self,
        hash: &Hash256,
        height: u64,
    ) -> Result<bool, KeelError> {
        Ok(self.engine.validate_block(hash, height)?)
    }

    pub fn get_active_checkpoint(&self) -> Hash256 {
        self.engine.active_checkpoint()
    }

    pub fn checkpoint_status(&self) -> CheckpointStatus {
        CheckpointStatus {
            hash: self.engine.active_checkpoint().to_string(),
            height: self.engine.active_checkpoint_height(),
            pending: self.engine.pending_checkpoint().map(|h| h.to_string()),
            master: self.engine.is_master(),
        }
    }

    /// Install a master private key at runtime.
    pub fn set_master_private_key(&self, secret_hex: &str) -> Result<(), KeyError> {
        self.engine.set_master_private_key(secret_hex)
    }

    // ------------------------------------------------------------------
    // Peers
    // ------------------------------------------------------------------

    /// Bring a newly connected peer up to date with our last checkpoint.
    pub fn on_peer_connected(&self, peer: &PeerInfo) {
        let Some(message) = self.engine.last_message() else {
            return;
        };
        match self.relay.send_to(self.transport.as_ref(), peer, &message) {
            Ok(Some(())) => debug!(peer = %peer.id, "sent sync checkpoint to new peer"),
            Ok(None) => {}
            Err(e) => debug!(peer = %peer.id, error = %e, "failed to send sync checkpoint"),
        }
    }

    pub fn on_peer_disconnected(&self, peer: &PeerId) {
        self.relay.forget_peer(peer);
    }

    fn relay_last_message(&self) {
        let Some(message) = self.engine.last_message() else {
            return;
        };
        self.relay_message(&message);
    }

    fn relay_message(&self, message: &SignedCheckpoint) {
        if let Err(e) = self.relay.relay(self.transport.as_ref(), message) {
            warn!(checkpoint = %message.target, error = %e, "failed to relay sync checkpoint");
        }
    }
}
