//! Error types for the keel checkpoint subsystem.
use thiserror::Error;

use crate::types::Hash256;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("invalid signature bytes")] InvalidSignature,
    #[error("signature verification failed")] VerificationFailed,
}

/// Invalid key material supplied by an operator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("key is not valid hex")] InvalidHex,
    #[error("key length: got {got} bytes, expected {expected}")] InvalidLength { got: usize, expected: usize },
    #[error("key is not a valid ed25519 key")] InvalidKey,
}

/// Outcome of a block-index consistency check that prevents acceptance.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("block index missing entry for {0}")] UnknownBlock(Hash256),
    #[error("block index structure failure: {hash} has no parent above height {height}")] CorruptIndex { hash: Hash256, height: u64 },
    #[error("checkpoint {candidate} conflicts with current checkpoint {active}")] ConflictingCheckpoint { candidate: Hash256, active: Hash256 },
    #[error("checkpoint {candidate} is not a descendant of current checkpoint {active}")] NotDescendant { candidate: Hash256, active: Hash256 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckpointError {
    #[error("checkpoint signature verification failed")] BadSignature,
    #[error("malformed checkpoint message: {0}")] Malformed(String),
    #[error(transparent)] Index(#[from] ValidationError),
    #[error("checkpoint storage: {0}")] Storage(String),
    #[error("checkpoint master key unavailable")] MasterKeyUnavailable,
    #[error(transparent)] Key(#[from] KeyError),
}

impl CheckpointError {
    /// True for errors that mean the block index is no longer a connected tree.
    pub fn is_corrupt_index(&self) -> bool {
        matches!(self, Self::Index(ValidationError::CorruptIndex { .. }))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockIndexError {
    #[error("duplicate block: {0}")] DuplicateBlock(Hash256),
    #[error("unknown parent: {0}")] UnknownParent(Hash256),
    #[error("block not found: {0}")] BlockNotFound(Hash256),
    #[error("block {hash} at height {height} conflicts with the sync checkpoint")] CheckpointConflict { hash: Hash256, height: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("peer disconnected: {0}")] PeerDisconnected(String),
    #[error("message too large: {size}")] MessageTooLarge { size: usize },
    #[error("wrong network magic")] BadMagic,
    #[error("decode: {0}")] Decode(String),
    #[error("encode: {0}")] Encode(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("checkpoint depth {depth} is below the safe minimum {min}")] UnsafeCheckpointDepth { depth: u64, min: u64 },
    #[error("invalid checkpoint master key: {0}")] MasterKey(KeyError),
}

#[derive(Error, Debug)]
pub enum KeelError {
    #[error(transparent)] Crypto(#[from] CryptoError),
    #[error(transparent)] Checkpoint(#[from] CheckpointError),
    #[error(transparent)] BlockIndex(#[from] BlockIndexError),
    #[error(transparent)] Network(#[from] NetworkError),
    #[error(transparent)] Config(#[from] ConfigError),
    #[error("storage: {0}")] Storage(String),
}
