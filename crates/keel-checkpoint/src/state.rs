//! Checkpoint state: the active checkpoint, the pending one and the last
//! accepted message.
//!
//! The state is owned by the acceptance engine and lives under the same
//! mutex as the block index. Every transition of `active` goes through
//! [`CheckpointState::write_checkpoint`], which persists before it mutates.

use tracing::{debug, error, info, warn};

use keel_core::error::CheckpointError;
use keel_core::store::CheckpointStore;
use keel_core::types::Hash256;

use crate::message::SignedCheckpoint;

/// A verified checkpoint waiting for its block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingCheckpoint {
    /// Target block hash.
    pub hash: Hash256,
    /// The authenticated message, kept for relay once accepted.
    pub message: SignedCheckpoint,
}

/// In-memory view of the checkpoint subsystem.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckpointState {
    active: Hash256,
    pending: Option<PendingCheckpoint>,
    last_message: Option<SignedCheckpoint>,
}

impl CheckpointState {
    /// Load the persisted active checkpoint. A fresh store yields the null checkpoint.
    pub fn load(store: &dyn CheckpointStore) -> Result<Self, CheckpointError> {
        let active = store.read_checkpoint()?.unwrap_or(Hash256::ZERO);
        debug!(%active, "loaded sync checkpoint");
        Ok(Self {
            active,
            pending: None,
            last_message: None,
        })
    }

    /// The active checkpoint. Zero until one is first set.
    pub fn active(&self) -> Hash256 {
        self.active
    }

    /// Whether no checkpoint has been set yet.
    pub fn is_null(&self) -> bool {
        self.active.is_zero()
    }

    pub fn pending(&self) -> Option<&PendingCheckpoint> {
        self.pending.as_ref()
    }

    pub fn last_message(&self) -> Option<&SignedCheckpoint> {
        self.last_message.as_ref()
    }

    /// Replace the pending checkpoint. Only one may be outstanding.
    pub fn set_pending(&mut self, message: SignedCheckpoint) {
        if let Some(previous) = &self.pending {
            if previous.hash != message.target {
                debug!(replaced = %previous.hash, "pending checkpoint replaced");
            }
        }
        self.pending = Some(PendingCheckpoint {
            hash: message.target,
            message,
        });
    }

    pub fn take_pending(&mut self) -> Option<PendingCheckpoint> {
        self.pending.take()
    }

    pub fn clear_pending(&mut self) {
        self.pending = None;
    }

    pub(crate) fn set_last_message(&mut self, message: SignedCheckpoint) {
        self.last_message = Some(message);
    }

    /// Persist `hash` as the active checkpoint, flush, then adopt it in memory.
    ///
    /// On failure the in-memory state is untouched.
    pub fn write_checkpoint(
        &mut self,
        store: &dyn CheckpointStore,
        hash: Hash256,
    ) -> Result<(), CheckpointError> {
        if let Err(e) = store
            .write_checkpoint(&hash)
            .and_then(|()| store.force_flush())
        {
            error!(%hash, error = %e, "failed to persist sync checkpoint");
            return Err(e);
        }
        self.active = hash;
        Ok(())
    }

    /// Compare the persisted authority key against `configured_hex`.
    ///
    /// On a mismatch (or a fresh store) the active checkpoint is reset to
    /// `genesis`, the new key is persisted and flushed, and `true` is
    /// returned. Pending and last-message state from the old authority are
    /// dropped as soon as the reset is durable, even if recording the new
    /// key then fails. A matching key is a no-op returning `false`.
    pub fn check_authority_key(
        &mut self,
        store: &dyn CheckpointStore,
        configured_hex: &str,
        genesis: Hash256,
    ) -> Result<bool, CheckpointError> {
        let persisted = store.read_authority_key()?;
        if persisted.as_deref() == Some(configured_hex) {
            return Ok(false);
        }

        match &persisted {
            Some(old) => warn!(
                old = %old,
                new = %configured_hex,
                "checkpoint authority key changed, resetting sync checkpoint to genesis"
            ),
            None => info!(key = %configured_hex, "recording checkpoint authority key"),
        }

        self.write_checkpoint(store, genesis)?;
        self.pending = None;
        self.last_message = None;
        // If the key write fails the old key stays persisted, so the next
        // start repeats this reset.
        store.write_authority_key(configured_hex)?;
        store.force_flush()?;
        Ok(true)
    }
}
