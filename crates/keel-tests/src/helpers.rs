//! Shared test helpers for integration tests.

use std::sync::Arc;

use keel_checkpoint::{
    AcceptanceOutcome, CheckpointAuthority, CheckpointEngine, SignedCheckpoint, UnsignedCheckpoint,
};
use keel_core::block_index::MemoryBlockIndex;
use keel_core::constants::{NetworkType, REGTEST_CHECKPOINT_MASTER_KEY};
use keel_core::crypto::KeyPair;
use keel_core::store::MemoryCheckpointStore;
use keel_core::types::Hash256;

/// Deterministic block hash for `height` on `branch`.
///
/// Branch 0 is the main chain. Distinct `(height, branch)` pairs never
/// collide with each other or with any network genesis.
pub fn h(height: u64, branch: u8) -> Hash256 {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&height.to_le_bytes());
    bytes[8] = branch;
    bytes[31] = 0xCC;
    Hash256(bytes)
}

/// The regtest checkpoint master key.
pub fn master() -> KeyPair {
    KeyPair::from_hex(REGTEST_CHECKPOINT_MASTER_KEY).unwrap()
}

/// A message for `target` signed by the regtest master.
pub fn signed(target: Hash256) -> SignedCheckpoint {
    SignedCheckpoint::sign(UnsignedCheckpoint::new(target), &master())
}

/// Regtest engine over an in-memory index and store.
///
/// The genesis block is indexed and is the active checkpoint.
pub struct Harness {
    pub engine: CheckpointEngine<MemoryBlockIndex>,
    pub store: Arc<MemoryCheckpointStore>,
    pub genesis: Hash256,
}

impl Harness {
    pub fn new() -> Self {
        let genesis = NetworkType::Regtest.genesis_hash();
        let store = Arc::new(MemoryCheckpointStore::new());
        let authority = CheckpointAuthority::from_hex(NetworkType::Regtest.checkpoint_pubkey()).unwrap();
        let engine =
            CheckpointEngine::new(MemoryBlockIndex::new(genesis), store.clone(), authority, genesis)
                .unwrap();
        engine.check_authority_key().unwrap();
        Self {
            engine,
            store,
            genesis,
        }
    }

    /// Hash of the block at `height` on `branch`, with genesis at height 0.
    pub fn at(&self, height: u64, branch: u8) -> Hash256 {
        if height == 0 { self.genesis } else { h(height, branch) }
    }

    /// Connect blocks `from+1..=to` on `branch`, the first one on top of
    /// `(from, parent_branch)`. Longest chain becomes active.
    pub fn extend(&self, from: u64, parent_branch: u8, to: u64, branch: u8) {
        let mut parent = self.at(from, parent_branch);
        self.engine.with_index_mut(|index| {
            for height in from + 1..=to {
                let hash = h(height, branch);
                index.connect(hash, &parent).unwrap();
                parent = hash;
            }
        });
    }

    /// Force the active chain to end at `tip`.
    pub fn reorg_to(&self, tip: Hash256) {
        self.engine.with_index_mut(|index| index.set_tip(&tip).unwrap());
    }

    /// Sign and process a checkpoint for `target`.
    pub fn checkpoint(&self, target: Hash256) -> AcceptanceOutcome {
        self.engine.process_message(&signed(target)).unwrap()
    }

    pub fn active(&self) -> Hash256 {
        self.engine.active_checkpoint()
    }

    pub fn active_height(&self) -> u64 {
        self.engine.active_checkpoint_height().unwrap()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
