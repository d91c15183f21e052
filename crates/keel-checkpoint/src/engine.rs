//! Checkpoint acceptance engine.
//!
//! Drives the checkpoint state machine:
//!
//! ```text
//! NoCheckpoint ──accept──▶ Active(h) ──accept──▶ Active(h')   (h' descends from h)
//!                              │  ▲
//!                        defer │  │ promote
//!                              ▼  │
//!                         Active(h) + Pending(p)
//! ```
//!
//! Signatures are checked before the chain lock is taken. Index walks,
//! state transitions and persistence all happen under the single mutex that
//! also guards the block index, so a reorganization can never interleave with
//! an ancestry walk and readers never see an active checkpoint that is not yet
//! durable. Relaying accepted messages is left to the caller, after the lock
//! has been released.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};
use tracing::{debug, error, info, trace, warn};

use keel_core::block_index::{ancestor_at, BlockIndex};
use keel_core::error::{CheckpointError, KeyError, ValidationError};
use keel_core::store::CheckpointStore;
use keel_core::types::Hash256;

use crate::authority::CheckpointAuthority;
use crate::message::SignedCheckpoint;
use crate::select;
use crate::state::{CheckpointState, PendingCheckpoint};
use crate::validator;

/// Why an authenticated checkpoint was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("checkpoint {candidate} conflicts with active checkpoint {active}")]
    ConflictingCheckpoint { candidate: Hash256, active: Hash256 },
    #[error("checkpoint {candidate} does not descend from active checkpoint {active}")]
    NotDescendant { candidate: Hash256, active: Hash256 },
}

/// Recoverable result of processing a checkpoint message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcceptanceOutcome {
    /// The message became the active checkpoint.
    Accepted,
    /// Older or identical checkpoint consistent with the active one. No change.
    Ignored,
    /// Target block unknown or off the active chain. Held as pending.
    Deferred,
    /// Inconsistent with the active checkpoint. Never applied.
    Rejected(RejectReason),
}

impl AcceptanceOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Block index and checkpoint state behind one lock.
#[derive(Debug)]
pub struct ChainContext<I> {
    pub index: I,
    pub checkpoint: CheckpointState,
}

impl<I: BlockIndex> ChainContext<I> {
    /// Consensus gate against the active checkpoint.
    ///
    /// Genesis and a null checkpoint always pass. Above the checkpoint height
    /// the block must descend from the checkpoint, at the checkpoint height
    /// it must be the checkpoint, and below it the block must already be
    /// known. Blocks not yet indexed are judged from the active tip.
    pub fn admits(&self, hash: &Hash256, height: u64) -> Result<bool, CheckpointError> {
        if height == 0 {
            return Ok(true);
        }
        let active = self.checkpoint.active();
        if active.is_zero() {
            return Ok(true);
        }

        let index = &self.index;
        let Some(checkpoint) = index.lookup(&active) else {
            error!(%active, "sync checkpoint missing from block index");
            return Err(ValidationError::UnknownBlock(active).into());
        };

        if height > checkpoint.height {
            let start = match index.lookup(hash) {
                Some(block) => Some(block),
                None => index.active_tip(),
            };
            let Some(start) = start else {
                return Ok(false);
            };
            let ancestor = ancestor_at(index, start, checkpoint.height).inspect_err(|e| {
                error!(block = %hash, error = %e, "block index failure checking sync checkpoint");
            })?;
            if ancestor.height < checkpoint.height || ancestor.hash != active {
                debug!(block = %hash, height, checkpoint = %active, "block does not descend from sync checkpoint");
                return Ok(false);
            }
            return Ok(true);
        }
        if height == checkpoint.height {
            return Ok(*hash == active);
        }
        Ok(index.contains(hash))
    }
}

/// Owns checkpoint state and applies the acceptance protocol to it.
pub struct CheckpointEngine<I> {
    chain: Arc<Mutex<ChainContext<I>>>,
    store: Arc<dyn CheckpointStore>,
    authority: RwLock<CheckpointAuthority>,
    genesis: Hash256,
}

impl<I: BlockIndex> CheckpointEngine<I> {
    /// Load checkpoint state from `store` and take ownership of `index`.
    pub fn new(
        index: I,
        store: Arc<dyn CheckpointStore>,
        authority: CheckpointAuthority,
        genesis: Hash256,
    ) -> Result<Self, CheckpointError> {
        let checkpoint = CheckpointState::load(store.as_ref())?;
        Ok(Self {
            chain: Arc::new(Mutex::new(ChainContext { index, checkpoint })),
            store,
            authority: RwLock::new(authority),
            genesis,
        })
    }

    /// Shared handle to the chain lock.
    pub fn chain(&self) -> Arc<Mutex<ChainContext<I>>> {
        Arc::clone(&self.chain)
    }

    /// Lock the chain context.
    pub fn lock(&self) -> MutexGuard<'_, ChainContext<I>> {
        self.chain.lock()
    }

    /// Mutate the block index under the chain lock.
    pub fn with_index_mut<R>(&self, f: impl FnOnce(&mut I) -> R) -> R {
        f(&mut self.chain.lock().index)
    }

    pub fn genesis(&self) -> Hash256 {
        self.genesis
    }

    pub fn authority(&self) -> CheckpointAuthority {
        self.authority.read().clone()
    }

    pub fn is_master(&self) -> bool {
        self.authority.read().is_master()
    }

    /// Reconcile the persisted authority key with the configured one.
    ///
    /// Returns `true` when a rotation reset the checkpoint to genesis.
    pub fn check_authority_key(&self) -> Result<bool, CheckpointError> {
        let configured = self.authority.read().public_key_hex();
        let mut chain = self.chain.lock();
        chain
            .checkpoint
            .check_authority_key(self.store.as_ref(), &configured, self.genesis)
    }

    /// Install the master private key, enabling master mode.
    pub fn set_master_private_key(&self, secret_hex: &str) -> Result<(), KeyError> {
        self.authority.write().set_master_private_key(secret_hex)
    }

    /// Sign a checkpoint for `target` with the master key.
    pub fn sign_checkpoint(&self, target: Hash256) -> Result<SignedCheckpoint, CheckpointError> {
        self.authority.read().sign(target)
    }

    /// Authenticate `message` and run it through the acceptance protocol.
    ///
    /// # Errors
    ///
    /// - [`CheckpointError::BadSignature`] / [`CheckpointError::Malformed`]:
    ///   the message is discarded, state untouched
    /// - [`CheckpointError::Index`]: unknown or corrupt block index during validation
    /// - [`CheckpointError::Storage`]: the accepted checkpoint could not be persisted
    pub fn process_message(
        &self,
        message: &SignedCheckpoint,
    ) -> Result<AcceptanceOutcome, CheckpointError> {
        let message = match self.authority.read().authenticate(message) {
            Ok(m) => m,
            Err(e) => {
                trace!(target_hash = %message.target, error = %e, "discarding checkpoint message");
                return Err(e);
            }
        };
        if message.is_null() {
            trace!("ignoring null checkpoint message");
            return Ok(AcceptanceOutcome::Ignored);
        }

        let mut chain = self.chain.lock();
        let ChainContext { index, checkpoint } = &mut *chain;
        let target = message.target;

        if target == checkpoint.active() {
            return Ok(AcceptanceOutcome::Ignored);
        }
        if !index.active_chain_contains(&target) {
            info!(
                checkpoint = %target,
                known = index.contains(&target),
                "sync checkpoint target not on active chain, holding as pending"
            );
            checkpoint.set_pending(message);
            return Ok(AcceptanceOutcome::Deferred);
        }
        self.apply(index, checkpoint, message)
    }

    /// Retry the pending checkpoint once its block is on the active chain.
    ///
    /// Returns `Ok(None)` when nothing is pending or the block is still
    /// missing. Otherwise the pending slot is consumed and the outcome of the
    /// single retry is returned. Internal errors put the pending checkpoint
    /// back.
    pub fn promote_pending(&self) -> Result<Option<AcceptanceOutcome>, CheckpointError> {
        let mut chain = self.chain.lock();
        let ChainContext { index, checkpoint } = &mut *chain;

        let ready = checkpoint
            .pending()
            .is_some_and(|p| index.active_chain_contains(&p.hash));
        if !ready {
            return Ok(None);
        }
        let Some(PendingCheckpoint { hash, message }) = checkpoint.take_pending() else {
            return Ok(None);
        };
        debug!(%hash, "promoting pending sync checkpoint");

        if hash == checkpoint.active() {
            return Ok(Some(AcceptanceOutcome::Ignored));
        }
        match self.apply(index, checkpoint, message.clone()) {
            Ok(outcome) => Ok(Some(outcome)),
            Err(e) => {
                checkpoint.set_pending(message);
                Err(e)
            }
        }
    }

    /// Validate an authenticated message whose target is on the active
    /// chain, and accept it if it supersedes the active checkpoint.
    fn apply(
        &self,
        index: &I,
        checkpoint: &mut CheckpointState,
        message: SignedCheckpoint,
    ) -> Result<AcceptanceOutcome, CheckpointError> {
        let target = message.target;
        let active = checkpoint.active();

        let supersedes = if checkpoint.is_null() {
            true
        } else {
            match validator::validate(index, &target, &active) {
                Ok(supersedes) => supersedes,
                Err(ValidationError::ConflictingCheckpoint { candidate, active }) => {
                    warn!(%candidate, %active, "sync checkpoint conflicts with active checkpoint");
                    return Ok(AcceptanceOutcome::Rejected(
                        RejectReason::ConflictingCheckpoint { candidate, active },
                    ));
                }
                Err(ValidationError::NotDescendant { candidate, active }) => {
                    warn!(%candidate, %active, "sync checkpoint is not a descendant of active checkpoint");
                    return Ok(AcceptanceOutcome::Rejected(RejectReason::NotDescendant {
                        candidate,
                        active,
                    }));
                }
                Err(e) => {
                    error!(checkpoint = %target, %active, error = %e, "block index failure validating sync checkpoint");
                    return Err(e.into());
                }
            }
        };

        if !supersedes {
            debug!(checkpoint = %target, %active, "ignoring older sync checkpoint");
            return Ok(AcceptanceOutcome::Ignored);
        }

        checkpoint.write_checkpoint(self.store.as_ref(), target)?;
        checkpoint.set_last_message(message);
        checkpoint.clear_pending();
        info!(checkpoint = %target, "accepted sync checkpoint");
        Ok(AcceptanceOutcome::Accepted)
    }

    /// Consensus gate: may a block at `height` join the chain?
    ///
    /// See [`ChainContext::admits`]. Callers that go on to mutate the index
    /// should hold [`lock`](Self::lock) and call `admits` directly instead.
    pub fn validate_block(&self, hash: &Hash256, height: u64) -> Result<bool, CheckpointError> {
        self.chain.lock().admits(hash, height)
    }

    /// Pick the block `depth` below the tip.
    pub fn auto_select(&self, depth: u64) -> Result<Hash256, CheckpointError> {
        let chain = self.chain.lock();
        Ok(select::select(&chain.index, depth)?)
    }

    pub fn active_checkpoint(&self) -> Hash256 {
        self.chain.lock().checkpoint.active()
    }

    /// Height of the active checkpoint, if its block is indexed.
    pub fn active_checkpoint_height(&self) -> Option<u64> {
        let chain = self.chain.lock();
        chain
            .index
            .lookup(&chain.checkpoint.active())
            .map(|b| b.height)
    }

    pub fn pending_checkpoint(&self) -> Option<Hash256> {
        self.chain.lock().checkpoint.pending().map(|p| p.hash)
    }

    /// The last accepted message, for relay.
    pub fn last_message(&self) -> Option<SignedCheckpoint> {
        self.chain.lock().checkpoint.last_message().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::block_index::MemoryBlockIndex;
    use keel_core::crypto::KeyPair;
    use keel_core::store::MemoryCheckpointStore;

    use crate::message::UnsignedCheckpoint;

    fn h(n: u64, fork: u8) -> Hash256 {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&n.to_le_bytes());
        bytes[30] = 0xC0;
        bytes[31] = fork;
        Hash256(bytes)
    }

    struct Fixture {
        engine: CheckpointEngine<MemoryBlockIndex>,
        store: Arc<MemoryCheckpointStore>,
        master: KeyPair,
    }

    impl Fixture {
        /// Chain of `len` blocks, authority key recorded, checkpoint at genesis.
        fn new(len: u64) -> Self {
            let mut index = MemoryBlockIndex::new(h(0, 0));
            for n in 1..=len {
                index.connect(h(n, 0), &h(n - 1, 0)).unwrap();
            }
            let master = KeyPair::generate();
            let store = Arc::new(MemoryCheckpointStore::new());
            let engine = CheckpointEngine::new(
                index,
                store.clone(),
                CheckpointAuthority::new(master.public_key()),
                h(0, 0),
            )
            .unwrap();
            engine.check_authority_key().unwrap();
            Self { engine, store, master }
        }

        fn msg(&self, target: Hash256) -> SignedCheckpoint {
            SignedCheckpoint::sign(UnsignedCheckpoint::new(target), &self.master)
        }

        fn process(&self, target: Hash256) -> AcceptanceOutcome {
            self.engine.process_message(&self.msg(target)).unwrap()
        }

        /// Side chain forking after `fork`, `len` blocks long, not active.
        fn side_chain(&self, fork: u64, len: u64, tag: u8) {
            self.engine.with_index_mut(|index| {
                index.insert(h(fork + 1, tag), &h(fork, 0)).unwrap();
                for n in fork + 2..=fork + len {
                    index.insert(h(n, tag), &h(n - 1, tag)).unwrap();
                }
            });
        }
    }

    // ------------------------------------------------------------------
    // Acceptance
    // ------------------------------------------------------------------

    #[test]
    fn starts_at_genesis_after_key_check() {
        let f = Fixture::new(10);
        assert_eq!(f.engine.active_checkpoint(), h(0, 0));
        assert_eq!(f.engine.active_checkpoint_height(), Some(0));
    }

    #[test]
    fn accepts_descendant_and_records_last_message() {
        let f = Fixture::new(200);
        let msg = f.msg(h(100, 0));
        assert_eq!(f.engine.process_message(&msg).unwrap(), AcceptanceOutcome::Accepted);
        assert_eq!(f.engine.active_checkpoint(), h(100, 0));
        assert_eq!(f.engine.last_message(), Some(msg));
        assert_eq!(f.store.read_checkpoint().unwrap(), Some(h(100, 0)));
    }

    #[test]
    fn reprocessing_is_ignored() {
        let f = Fixture::new(200);
        assert_eq!(f.process(h(100, 0)), AcceptanceOutcome::Accepted);
        let writes = f.store.write_count();
        assert_eq!(f.process(h(100, 0)), AcceptanceOutcome::Ignored);
        assert_eq!(f.store.write_count(), writes);
    }

    #[test]
    fn older_checkpoint_is_ignored() {
        let f = Fixture::new(200);
        f.process(h(100, 0));
        assert_eq!(f.process(h(50, 0)), AcceptanceOutcome::Ignored);
        assert_eq!(f.engine.active_checkpoint(), h(100, 0));
    }

    #[test]
    fn bad_signature_is_error_without_state_change() {
        let f = Fixture::new(20);
        let forged = SignedCheckpoint::sign(UnsignedCheckpoint::new(h(10, 0)), &KeyPair::generate());
        assert_eq!(
            f.engine.process_message(&forged).unwrap_err(),
            CheckpointError::BadSignature
        );
        assert_eq!(f.engine.active_checkpoint(), h(0, 0));
        assert!(f.engine.pending_checkpoint().is_none());
    }

    #[test]
    fn null_target_is_ignored() {
        let f = Fixture::new(5);
        assert_eq!(f.process(Hash256::ZERO), AcceptanceOutcome::Ignored);
        assert_eq!(f.engine.active_checkpoint(), h(0, 0));
    }

    #[test]
    fn null_active_accepts_first_checkpoint_on_chain() {
        let master = KeyPair::generate();
        let mut index = MemoryBlockIndex::new(h(0, 0));
        for n in 1..=10 {
            index.connect(h(n, 0), &h(n - 1, 0)).unwrap();
        }
        let engine = CheckpointEngine::new(
            index,
            Arc::new(MemoryCheckpointStore::new()),
            CheckpointAuthority::new(master.public_key()),
            h(0, 0),
        )
        .unwrap();
        assert!(engine.active_checkpoint().is_zero());
        let msg = SignedCheckpoint::sign(UnsignedCheckpoint::new(h(4, 0)), &master);
        assert_eq!(engine.process_message(&msg).unwrap(), AcceptanceOutcome::Accepted);
        assert_eq!(engine.active_checkpoint(), h(4, 0));
    }

    // ------------------------------------------------------------------
    // Rejection
    // ------------------------------------------------------------------

    #[test]
    fn fork_at_same_height_is_rejected() {
        let f = Fixture::new(200);
        f.process(h(100, 0));
        f.side_chain(50, 100, 1);
        // Make the side chain active so the message is evaluated, not deferred.
        f.engine.with_index_mut(|index| index.set_tip(&h(150, 1)).unwrap());

        let outcome = f.process(h(100, 1));
        assert_eq!(
            outcome,
            AcceptanceOutcome::Rejected(RejectReason::ConflictingCheckpoint {
                candidate: h(100, 1),
                active: h(100, 0),
            })
        );
        assert_eq!(f.engine.active_checkpoint(), h(100, 0));
    }

    #[test]
    fn non_descendant_is_rejected() {
        let f = Fixture::new(200);
        f.process(h(100, 0));
        f.side_chain(50, 250, 1);
        f.engine.with_index_mut(|index| index.set_tip(&h(300, 1)).unwrap());

        assert!(matches!(
            f.process(h(150, 1)),
            AcceptanceOutcome::Rejected(RejectReason::NotDescendant { .. })
        ));
        assert_eq!(f.engine.active_checkpoint(), h(100, 0));
    }

    #[test]
    fn storage_failure_propagates_and_keeps_state() {
        let f = Fixture::new(50);
        f.store.set_fail_writes(true);
        let err = f.engine.process_message(&f.msg(h(20, 0))).unwrap_err();
        assert!(matches!(err, CheckpointError::Storage(_)));
        assert_eq!(f.engine.active_checkpoint(), h(0, 0));
        assert!(f.engine.last_message().is_none());
    }

    // ------------------------------------------------------------------
    // Pending
    // ------------------------------------------------------------------

    #[test]
    fn unknown_target_defers_then_promotes() {
        let f = Fixture::new(10);
        assert_eq!(f.process(h(12, 0)), AcceptanceOutcome::Deferred);
        assert_eq!(f.engine.pending_checkpoint(), Some(h(12, 0)));
        assert_eq!(f.engine.active_checkpoint(), h(0, 0));

        f.engine.with_index_mut(|index| index.connect(h(11, 0), &h(10, 0)).unwrap());
        assert_eq!(f.engine.promote_pending().unwrap(), None);
        assert_eq!(f.engine.pending_checkpoint(), Some(h(12, 0)));

        f.engine.with_index_mut(|index| index.connect(h(12, 0), &h(11, 0)).unwrap());
        assert_eq!(f.engine.promote_pending().unwrap(), Some(AcceptanceOutcome::Accepted));
        assert_eq!(f.engine.active_checkpoint(), h(12, 0));
        assert!(f.engine.pending_checkpoint().is_none());
        assert_eq!(f.engine.last_message().unwrap().target, h(12, 0));
    }

    #[test]
    fn known_but_inactive_target_defers() {
        let f = Fixture::new(20);
        f.side_chain(10, 5, 1);
        assert_eq!(f.process(h(13, 1)), AcceptanceOutcome::Deferred);
        assert_eq!(f.engine.pending_checkpoint(), Some(h(13, 1)));
    }

    #[test]
    fn rejected_promotion_clears_pending() {
        let f = Fixture::new(200);
        f.process(h(100, 0));
        f.side_chain(50, 100, 1);
        assert_eq!(f.process(h(120, 1)), AcceptanceOutcome::Deferred);

        f.engine.with_index_mut(|index| index.set_tip(&h(150, 1)).unwrap());
        assert!(matches!(
            f.engine.promote_pending().unwrap(),
            Some(AcceptanceOutcome::Rejected(_))
        ));
        assert!(f.engine.pending_checkpoint().is_none());
        assert_eq!(f.engine.promote_pending().unwrap(), None);
    }

    #[test]
    fn failed_promotion_keeps_pending() {
        let f = Fixture::new(10);
        f.process(h(11, 0));
        f.engine.with_index_mut(|index| index.connect(h(11, 0), &h(10, 0)).unwrap());

        f.store.set_fail_writes(true);
        assert!(f.engine.promote_pending().is_err());
        assert_eq!(f.engine.pending_checkpoint(), Some(h(11, 0)));

        f.store.set_fail_writes(false);
        assert_eq!(f.engine.promote_pending().unwrap(), Some(AcceptanceOutcome::Accepted));
    }

    #[test]
    fn accepted_message_clears_unrelated_pending() {
        let f = Fixture::new(20);
        f.process(h(30, 0));
        assert_eq!(f.process(h(15, 0)), AcceptanceOutcome::Accepted);
        assert!(f.engine.pending_checkpoint().is_none());
    }

    // ------------------------------------------------------------------
    // Consensus gate
    // ------------------------------------------------------------------

    #[test]
    fn genesis_and_null_checkpoint_pass() {
        let master = KeyPair::generate();
        let engine = CheckpointEngine::new(
            MemoryBlockIndex::new(h(0, 0)),
            Arc::new(MemoryCheckpointStore::new()),
            CheckpointAuthority::new(master.public_key()),
            h(0, 0),
        )
        .unwrap();
        assert!(engine.validate_block(&h(99, 9), 99).unwrap());

        let f = Fixture::new(20);
        f.process(h(10, 0));
        assert!(f.engine.validate_block(&h(0, 7), 0).unwrap());
    }

    #[test]
    fn gate_checks_height_relative_to_checkpoint() {
        let f = Fixture::new(200);
        f.process(h(100, 0));
        f.side_chain(50, 100, 1);

        // Above: must descend.
        assert!(f.engine.validate_block(&h(150, 0), 150).unwrap());
        assert!(!f.engine.validate_block(&h(150, 1), 150).unwrap());
        // Equal: must match.
        assert!(f.engine.validate_block(&h(100, 0), 100).unwrap());
        assert!(!f.engine.validate_block(&h(100, 1), 100).unwrap());
        // Below: must be known.
        assert!(f.engine.validate_block(&h(60, 1), 60).unwrap());
        assert!(!f.engine.validate_block(&h(60, 9), 60).unwrap());
    }

    #[test]
    fn gate_unknown_block_above_checkpoint_walks_from_tip() {
        let f = Fixture::new(200);
        f.process(h(100, 0));
        assert!(f.engine.validate_block(&h(201, 0), 201).unwrap());
    }

    #[test]
    fn gate_and_connect_share_one_guard() {
        let f = Fixture::new(20);
        f.side_chain(10, 5, 1);
        f.process(h(12, 0));

        let mut chain = f.engine.lock();
        assert!(!chain.admits(&h(16, 1), 16).unwrap());
        assert!(chain.admits(&h(21, 0), 21).unwrap());
        chain.index.connect(h(21, 0), &h(20, 0)).unwrap();
        assert!(chain.admits(&h(22, 0), 22).unwrap());
        assert_eq!(chain.index.active_tip().unwrap().hash, h(21, 0));
    }

    // ------------------------------------------------------------------
    // Master mode
    // ------------------------------------------------------------------

    #[test]
    fn master_signs_and_accepts_own_checkpoint() {
        let f = Fixture::new(100);
        assert!(!f.engine.is_master());
        assert_eq!(
            f.engine.sign_checkpoint(h(1, 0)).unwrap_err(),
            CheckpointError::MasterKeyUnavailable
        );

        f.engine.set_master_private_key(&f.master.secret_hex()).unwrap();
        let target = f.engine.auto_select(5).unwrap();
        assert_eq!(target, h(95, 0));
        let msg = f.engine.sign_checkpoint(target).unwrap();
        assert_eq!(f.engine.process_message(&msg).unwrap(), AcceptanceOutcome::Accepted);
        assert_eq!(f.engine.active_checkpoint_height(), Some(95));
    }

    #[test]
    fn key_rotation_resets_to_genesis() {
        let f = Fixture::new(50);
        f.process(h(40, 0));
        assert!(!f.engine.check_authority_key().unwrap());
        assert_eq!(f.engine.active_checkpoint(), h(40, 0));

        let rotated = KeyPair::generate();
        let engine = CheckpointEngine::new(
            MemoryBlockIndex::new(h(0, 0)),
            f.store.clone(),
            CheckpointAuthority::new(rotated.public_key()),
            h(0, 0),
        )
        .unwrap();
        assert_eq!(engine.active_checkpoint(), h(40, 0));
        assert!(engine.check_authority_key().unwrap());
        assert_eq!(engine.active_checkpoint(), h(0, 0));
        assert_eq!(
            f.store.read_authority_key().unwrap(),
            Some(rotated.public_key().to_string())
        );
    }
}
