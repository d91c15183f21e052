//! Checkpoint messages as signed by the checkpoint master.
//!
//! The signature never covers the convenience fields of a
//! [`SignedCheckpoint`]; it covers `payload`, the canonical encoding of an
//! [`UnsignedCheckpoint`]. Authentication therefore re-derives version and
//! target from the payload and returns a fresh message, so a peer cannot
//! pair a valid signature with a different target.

use std::fmt;

use serde::{Deserialize, Serialize};

use keel_core::constants::{CHECKPOINT_PAYLOAD_SIZE, CHECKPOINT_VERSION};
use keel_core::crypto::{KeyPair, PublicKey};
use keel_core::error::CheckpointError;
use keel_core::types::{content_hash, Hash256};

/// The signed claim: "block `target` is canonical".
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnsignedCheckpoint {
    /// Payload format version.
    pub version: u32,
    /// Block hash being pinned. Zero means "no checkpoint".
    pub target: Hash256,
}

impl UnsignedCheckpoint {
    /// A checkpoint for `target` at the current payload version.
    pub fn new(target: Hash256) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            target,
        }
    }

    /// The null checkpoint.
    pub fn null() -> Self {
        Self::new(Hash256::ZERO)
    }

    /// Whether this names no block.
    pub fn is_null(&self) -> bool {
        self.target.is_zero()
    }

    /// Canonical encoding: version (u32 LE) || target (32 bytes).
    ///
    /// This exact byte string is what the master signs.
    pub fn encode(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(CHECKPOINT_PAYLOAD_SIZE);
        data.extend_from_slice(&self.version.to_le_bytes());
        data.extend_from_slice(self.target.as_bytes());
        data
    }

    /// Decode a canonical payload. Anything but exactly 36 bytes is malformed.
    pub fn decode(payload: &[u8]) -> Result<Self, CheckpointError> {
        if payload.len() != CHECKPOINT_PAYLOAD_SIZE {
            return Err(CheckpointError::Malformed(format!(
                "payload is {} bytes, expected {CHECKPOINT_PAYLOAD_SIZE}",
                payload.len()
            )));
        }
        let (version, target) = payload.split_at(4);
        let version = u32::from_le_bytes(
            version
                .try_into()
                .map_err(|_| CheckpointError::Malformed("version field".into()))?,
        );
        let target: [u8; 32] = target
            .try_into()
            .map_err(|_| CheckpointError::Malformed("target field".into()))?;
        Ok(Self {
            version,
            target: Hash256(target),
        })
    }
}

impl fmt::Display for UnsignedCheckpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checkpoint(version={}, target={})", self.version, self.target)
    }
}

/// A checkpoint claim together with its signed payload and signature.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct SignedCheckpoint {
    /// Version, mirrored from the payload.
    pub version: u32,
    /// Target block hash, mirrored from the payload.
    pub target: Hash256,
    /// Canonical [`UnsignedCheckpoint`] encoding; the signature input.
    pub payload: Vec<u8>,
    /// Ed25519 signature over `content_hash(payload)`.
    pub signature: Vec<u8>,
}

impl SignedCheckpoint {
    /// Encode and sign `checkpoint` with the master key.
    pub fn sign(checkpoint: UnsignedCheckpoint, master: &KeyPair) -> Self {
        let payload = checkpoint.encode();
        let signature = master.sign_hash(&content_hash(&payload)).to_vec();
        Self {
            version: checkpoint.version,
            target: checkpoint.target,
            payload,
            signature,
        }
    }

    /// Hash the signature commits to.
    pub fn content_hash(&self) -> Hash256 {
        content_hash(&self.payload)
    }

    /// Whether the (unauthenticated) target is the null sentinel.
    pub fn is_null(&self) -> bool {
        self.target.is_zero()
    }

    /// Check the signature and decode the payload.
    ///
    /// # Errors
    ///
    /// - [`CheckpointError::BadSignature`] if the signature does not verify
    /// - [`CheckpointError::Malformed`] if a correctly signed payload does not decode
    pub fn verify(&self, authority: &PublicKey) -> Result<UnsignedCheckpoint, CheckpointError> {
        authority
            .verify_hash(&self.content_hash(), &self.signature)
            .map_err(|_| CheckpointError::BadSignature)?;
        UnsignedCheckpoint::decode(&self.payload)
    }

    /// Verify and return a copy whose version and target come from the payload.
    pub fn authenticate(&self, authority: &PublicKey) -> Result<SignedCheckpoint, CheckpointError> {
        let unsigned = self.verify(authority)?;
        Ok(Self {
            version: unsigned.version,
            target: unsigned.target,
            payload: self.payload.clone(),
            signature: self.signature.clone(),
        })
    }
}
