//! RocksDB-backed checkpoint and block-index storage.
//!
//! Implements [`CheckpointStore`] on a `checkpoint` column family, and keeps
//! the block tree (hash → parent, height) in `block_index` so the node can
//! rebuild its [`MemoryBlockIndex`] on restart. Block records and the tip
//! pointer are written together in one [`WriteBatch`].

use std::path::Path;

use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};

use keel_core::block_index::{BlockIndex, BlockRef, MemoryBlockIndex};
use keel_core::error::{CheckpointError, KeelError};
use keel_core::store::CheckpointStore;
use keel_core::types::Hash256;

// --- Column family names ---

const CF_CHECKPOINT: &str = "checkpoint";
const CF_BLOCK_INDEX: &str = "block_index";
const CF_METADATA: &str = "metadata";

const ALL_CFS: &[&str] = &[CF_CHECKPOINT, CF_BLOCK_INDEX, CF_METADATA];

// --- Keys ---

const KEY_SYNC_CHECKPOINT: &[u8] = b"sync_checkpoint";
const KEY_CHECKPOINT_PUBKEY: &[u8] = b"checkpoint_pubkey";
const META_TIP_HASH: &[u8] = b"tip_hash";

/// Stored block-index value: parent hash (32) || height (u64 LE).
const BLOCK_RECORD_LEN: usize = 40;

fn storage_err(e: impl std::fmt::Display) -> CheckpointError {
    CheckpointError::Storage(e.to_string())
}

fn hash_from_slice(bytes: &[u8]) -> Option<Hash256> {
    let array: [u8; 32] = bytes.try_into().ok()?;
    Some(Hash256(array))
}

/// RocksDB-backed persistent store.
pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    /// Open or create a database at `path` with all column families.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, KeelError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), cf_descriptors)
            .map_err(|e| KeelError::Storage(e.to_string()))?;
        Ok(Self { db })
    }

    /// Get a column family handle.
    fn cf_handle(&self, name: &str) -> Result<&rocksdb::ColumnFamily, CheckpointError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| CheckpointError::Storage(format!("missing column family: {name}")))
    }

    /// Persist a connected block and, when `is_tip`, move the tip pointer to it.
    pub fn record_block(&self, block: &BlockRef, is_tip: bool) -> Result<(), KeelError> {
        let Some(parent) = block.parent else {
            return Ok(());
        };
        let cf_index = self.cf_handle(CF_BLOCK_INDEX)?;
        let cf_meta = self.cf_handle(CF_METADATA)?;

        let mut value = Vec::with_capacity(BLOCK_RECORD_LEN);
        value.extend_from_slice(parent.as_bytes());
        value.extend_from_slice(&block.height.to_le_bytes());

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_index, block.hash.as_bytes(), &value);
        if is_tip {
            batch.put_cf(&cf_meta, META_TIP_HASH, block.hash.as_bytes());
        }
        self.db
            .write(batch)
            .map_err(|e| KeelError::Storage(e.to_string()))
    }

    /// Move the persisted tip pointer.
    pub fn record_tip(&self, hash: &Hash256) -> Result<(), KeelError> {
        let cf_meta = self.cf_handle(CF_METADATA)?;
        self.db
            .put_cf(&cf_meta, META_TIP_HASH, hash.as_bytes())
            .map_err(|e| KeelError::Storage(e.to_string()))
    }

    /// Persisted tip, if any block beyond genesis was recorded.
    pub fn tip_hash(&self) -> Result<Option<Hash256>, KeelError> {
        let cf_meta = self.cf_handle(CF_METADATA)?;
        match self
            .db
            .get_cf(&cf_meta, META_TIP_HASH)
            .map_err(|e| KeelError::Storage(e.to_string()))?
        {
            Some(bytes) => hash_from_slice(&bytes)
                .map(Some)
                .ok_or_else(|| KeelError::Storage("invalid tip hash length".into())),
            None => Ok(None),
        }
    }

    /// Rebuild the in-memory block index from recorded blocks.
    ///
    /// Records are replayed in height order so every parent is present
    /// before its children.
    pub fn load_block_index(&self, genesis: Hash256) -> Result<MemoryBlockIndex, KeelError> {
        let cf_index = self.cf_handle(CF_BLOCK_INDEX)?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(&cf_index, IteratorMode::Start) {
            let (key, value) = item.map_err(|e| KeelError::Storage(e.to_string()))?;
            let hash = hash_from_slice(&key)
                .ok_or_else(|| KeelError::Storage("invalid block key length".into()))?;
            if value.len() != BLOCK_RECORD_LEN {
                return Err(KeelError::Storage("invalid block record length".into()));
            }
            let parent = hash_from_slice(&value[..32])
                .ok_or_else(|| KeelError::Storage("invalid parent hash".into()))?;
            let mut height = [0u8; 8];
            height.copy_from_slice(&value[32..]);
            records.push((u64::from_le_bytes(height), hash, parent));
        }
        records.sort_by_key(|(height, _, _)| *height);

        let mut index = MemoryBlockIndex::new(genesis);
        for (_, hash, parent) in records {
            if !index.contains(&hash) {
                index.insert(hash, &parent)?;
            }
        }
        if let Some(tip) = self.tip_hash()? {
            index.set_tip(&tip)?;
        }
        Ok(index)
    }
}

impl CheckpointStore for RocksStore {
    fn read_checkpoint(&self) -> Result<Option<Hash256>, CheckpointError> {
        let cf = self.cf_handle(CF_CHECKPOINT)?;
        match self.db.get_cf(&cf, KEY_SYNC_CHECKPOINT).map_err(storage_err)? {
            Some(bytes) => hash_from_slice(&bytes)
                .map(Some)
                .ok_or_else(|| CheckpointError::Storage("invalid sync checkpoint length".into())),
            None => Ok(None),
        }
    }

    fn write_checkpoint(&self, hash: &Hash256) -> Result<(), CheckpointError> {
        let cf = self.cf_handle(CF_CHECKPOINT)?;
        self.db
            .put_cf(&cf, KEY_SYNC_CHECKPOINT, hash.as_bytes())
            .map_err(storage_err)
    }

    fn read_authority_key(&self) -> Result<Option<String>, CheckpointError> {
        let cf = self.cf_handle(CF_CHECKPOINT)?;
        match self.db.get_cf(&cf, KEY_CHECKPOINT_PUBKEY).map_err(storage_err)? {
            Some(bytes) => String::from_utf8(bytes).map(Some).map_err(storage_err),
            None => Ok(None),
        }
    }

    fn write_authority_key(&self, pubkey_hex: &str) -> Result<(), CheckpointError> {
        let cf = self.cf_handle(CF_CHECKPOINT)?;
        self.db
            .put_cf(&cf, KEY_CHECKPOINT_PUBKEY, pubkey_hex.as_bytes())
            .map_err(storage_err)
    }

    fn force_flush(&self) -> Result<(), CheckpointError> {
        for name in ALL_CFS {
            let cf = self.cf_handle(name)?;
            self.db.flush_cf(&cf).map_err(storage_err)?;
        }
        Ok(())
    }
}
