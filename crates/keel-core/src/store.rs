//! Durable checkpoint storage interface and in-memory implementation.
//!
//! The store records two values: the active checkpoint hash and the public
//! key that was trusted when it was accepted. [`MemoryCheckpointStore`] is
//! suitable for testing; the node uses RocksDB (keel-node).

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::error::CheckpointError;
use crate::types::Hash256;

/// Persistent record of the active checkpoint and the authority key.
///
/// Writes are not required to be durable until [`force_flush`](Self::force_flush)
/// returns.
pub trait CheckpointStore: Send + Sync {
    /// The persisted active checkpoint, if one was ever written.
    fn read_checkpoint(&self) -> Result<Option<Hash256>, CheckpointError>;

    /// Record `hash` as the active checkpoint.
    fn write_checkpoint(&self, hash: &Hash256) -> Result<(), CheckpointError>;

    /// The persisted authority public key (hex), if any.
    fn read_authority_key(&self) -> Result<Option<String>, CheckpointError>;

    /// Record the authority public key (hex).
    fn write_authority_key(&self, pubkey_hex: &str) -> Result<(), CheckpointError>;

    /// Flush buffered writes, including chain state, to durable storage.
    fn force_flush(&self) -> Result<(), CheckpointError>;
}

#[derive(Default)]
struct MemoryRecords {
    checkpoint: Option<Hash256>,
    authority_key: Option<String>,
}

/// In-memory checkpoint store for tests.
///
/// [`set_fail_writes`](Self::set_fail_writes) makes every write and flush
/// fail, which is how tests drive the storage-error path.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    records: Mutex<MemoryRecords>,
    fail_writes: AtomicBool,
    flushes: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryCheckpointStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle simulated write failure.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful flushes so far.
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    /// Number of successful writes (checkpoint or key) so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> Result<(), CheckpointError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CheckpointError::Storage("simulated write failure".into()));
        }
        Ok(())
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn read_checkpoint(&self) -> Result<Option<Hash256>, CheckpointError> {
        Ok(self.records.lock().checkpoint)
    }

    fn write_checkpoint(&self, hash: &Hash256) -> Result<(), CheckpointError> {
        self.check_writable()?;
        self.records.lock().checkpoint = Some(*hash);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read_authority_key(&self) -> Result<Option<String>, CheckpointError> {
        Ok(self.records.lock().authority_key.clone())
    }

    fn write_authority_key(&self, pubkey_hex: &str) -> Result<(), CheckpointError> {
        self.check_writable()?;
        self.records.lock().authority_key = Some(pubkey_hex.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn force_flush(&self) -> Result<(), CheckpointError> {
        self.check_writable()?;
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
