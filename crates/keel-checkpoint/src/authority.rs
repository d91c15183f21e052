//! Checkpoint master key material.
//!
//! Every node carries the authority public key from its network parameters.
//! A node additionally becomes a checkpoint master once an operator supplies
//! the matching private key. At most one node should hold it at any time.

use tracing::{info, warn};

use keel_core::crypto::{KeyPair, PublicKey};
use keel_core::error::{CheckpointError, KeyError};
use keel_core::types::Hash256;

use crate::message::{SignedCheckpoint, UnsignedCheckpoint};

/// Signs checkpoints (master mode) and authenticates them (always).
#[derive(Debug, Clone)]
pub struct CheckpointAuthority {
    public_key: PublicKey,
    master: Option<KeyPair>,
}

impl CheckpointAuthority {
    /// An authority that can only verify.
    pub fn new(public_key: PublicKey) -> Self {
        Self {
            public_key,
            master: None,
        }
    }

    /// Build from a hex-encoded public key, as found in network parameters.
    pub fn from_hex(pubkey_hex: &str) -> Result<Self, KeyError> {
        Ok(Self::new(PublicKey::from_hex(pubkey_hex)?))
    }

    /// The trusted public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Hex form of the trusted key, as persisted by the store.
    pub fn public_key_hex(&self) -> String {
        self.public_key.to_string()
    }

    /// Whether a master private key is loaded.
    pub fn is_master(&self) -> bool {
        self.master.is_some()
    }

    /// Validate and install the master private key.
    ///
    /// Invalid key material is rejected and master mode stays off. A valid
    /// key whose public half does not match the authority is still installed
    /// but will produce checkpoints that every node, including this one,
    /// refuses.
    pub fn set_master_private_key(&mut self, secret_hex: &str) -> Result<(), KeyError> {
        let keypair = KeyPair::from_hex(secret_hex)?;
        if keypair.public_key() != self.public_key {
            warn!(
                master = %keypair.public_key(),
                authority = %self.public_key,
                "checkpoint master key does not match the network authority key"
            );
        } else {
            info!("checkpoint master mode enabled");
        }
        self.master = Some(keypair);
        Ok(())
    }

    /// Sign a checkpoint for `target`.
    pub fn sign(&self, target: Hash256) -> Result<SignedCheckpoint, CheckpointError> {
        let master = self
            .master
            .as_ref()
            .ok_or(CheckpointError::MasterKeyUnavailable)?;
        Ok(SignedCheckpoint::sign(UnsignedCheckpoint::new(target), master))
    }

    /// Authenticate a message against the trusted key.
    pub fn authenticate(&self, message: &SignedCheckpoint) -> Result<SignedCheckpoint, CheckpointError> {
        message.authenticate(&self.public_key)
    }
}
