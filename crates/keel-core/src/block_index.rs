//! Block index interface and in-memory arena implementation.
//!
//! The checkpoint subsystem only needs three things from the chain: look up
//! a block's height and parent by hash, ask whether a block is on the active
//! chain, and find the active tip. [`BlockIndex`] captures exactly that.
//!
//! [`MemoryBlockIndex`] stores every known block in an arena and links each
//! record to its parent by arena position rather than by reference, so walks
//! stay valid for as long as the caller holds the lock guarding the index.

use std::collections::HashMap;

use crate::error::{BlockIndexError, ValidationError};
use crate::types::Hash256;

/// Snapshot of one block-index entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockRef {
    /// Block hash.
    pub hash: Hash256,
    /// Height above genesis (genesis is 0).
    pub height: u64,
    /// Parent hash. `None` only for genesis.
    pub parent: Option<Hash256>,
}

impl BlockRef {
    /// Whether this entry is the root of the tree.
    pub fn is_genesis(&self) -> bool {
        self.parent.is_none()
    }
}

/// Read-only view of the node's block index.
///
/// Implementations must be consulted under the same lock that guards
/// checkpoint state, so an ancestry walk never observes a half-applied
/// reorganization.
pub trait BlockIndex: Send + Sync {
    /// Look up a block by hash.
    fn lookup(&self, hash: &Hash256) -> Option<BlockRef>;

    /// Whether the block is part of the currently selected best chain.
    fn active_chain_contains(&self, hash: &Hash256) -> bool;

    /// Tip of the active chain. `None` before genesis is loaded.
    fn active_tip(&self) -> Option<BlockRef>;

    /// Whether the block is known at all.
    ///
    /// Default implementation delegates to [`lookup`](Self::lookup).
    fn contains(&self, hash: &Hash256) -> bool {
        self.lookup(hash).is_some()
    }
}

/// Walk parent links from `from` until reaching `height`.
///
/// Returns `from` itself when it is already at or below `height`. A missing
/// parent, or a parent that is not strictly lower, means the index is not a
/// connected tree and yields [`ValidationError::CorruptIndex`].
pub fn ancestor_at<I: BlockIndex + ?Sized>(
    index: &I,
    from: BlockRef,
    height: u64,
) -> Result<BlockRef, ValidationError> {
    let mut current = from;
    while current.height > height {
        let corrupt = ValidationError::CorruptIndex {
            hash: current.hash,
            height: current.height,
        };
        let parent_hash = current.parent.ok_or_else(|| corrupt.clone())?;
        let parent = index.lookup(&parent_hash).ok_or_else(|| corrupt.clone())?;
        if parent.height >= current.height {
            return Err(corrupt);
        }
        current = parent;
    }
    Ok(current)
}

#[derive(Clone, Debug)]
struct IndexEntry {
    hash: Hash256,
    height: u64,
    parent: Option<usize>,
}

/// In-memory block index backed by an arena.
///
/// Blocks are never removed; a reorganization only changes which arena
/// positions make up the active chain.
#[derive(Clone, Debug)]
pub struct MemoryBlockIndex {
    /// Every known block, in insertion order.
    entries: Vec<IndexEntry>,
    /// Hash → arena position.
    by_hash: HashMap<Hash256, usize>,
    /// Active chain: `active[h]` is the arena position of the block at height `h`.
    active: Vec<usize>,
}

impl MemoryBlockIndex {
    /// Create an index containing only the genesis block, which is also the tip.
    pub fn new(genesis: Hash256) -> Self {
        let mut by_hash = HashMap::new();
        by_hash.insert(genesis, 0);
        Self {
            entries: vec![IndexEntry {
                hash: genesis,
                height: 0,
                parent: None,
            }],
            by_hash,
            active: vec![0],
        }
    }

    /// Number of known blocks across all branches.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: the genesis entry is created with the index.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hash of the active-chain block at `height`.
    pub fn active_hash_at(&self, height: u64) -> Option<Hash256> {
        let pos = *self.active.get(usize::try_from(height).ok()?)?;
        Some(self.entries[pos].hash)
    }

    /// Add a block under an already known parent without touching the active chain.
    ///
    /// # Errors
    ///
    /// - [`BlockIndexError::DuplicateBlock`] if the hash is already indexed
    /// - [`BlockIndexError::UnknownParent`] if the parent is not indexed
    pub fn insert(&mut self, hash: Hash256, parent: &Hash256) -> Result<BlockRef, BlockIndexError> {
        if self.by_hash.contains_key(&hash) {
            return Err(BlockIndexError::DuplicateBlock(hash));
        }
        let parent_pos = *self
            .by_hash
            .get(parent)
            .ok_or(BlockIndexError::UnknownParent(*parent))?;
        let height = self.entries[parent_pos].height + 1;
        let pos = self.entries.len();
        self.entries.push(IndexEntry {
            hash,
            height,
            parent: Some(parent_pos),
        });
        self.by_hash.insert(hash, pos);
        Ok(BlockRef {
            hash,
            height,
            parent: Some(*parent),
        })
    }

    /// Make `hash` the active tip, rebuilding the active chain from its ancestry.
    pub fn set_tip(&mut self, hash: &Hash256) -> Result<(), BlockIndexError> {
        let mut pos = *self
            .by_hash
            .get(hash)
            .ok_or(BlockIndexError::BlockNotFound(*hash))?;
        let mut chain = Vec::with_capacity(self.entries[pos].height as usize + 1);
        loop {
            chain.push(pos);
            match self.entries[pos].parent {
                Some(parent) => pos = parent,
                None => break,
            }
        }
        chain.reverse();
        self.active = chain;
        Ok(())
    }

    /// Insert a block and adopt it as tip when it makes the chain longer.
    ///
    /// Longest chain stands in for most-work here; fork choice proper lives
    /// outside this crate.
    pub fn connect(&mut self, hash: Hash256, parent: &Hash256) -> Result<BlockRef, BlockIndexError> {
        let block = self.insert(hash, parent)?;
        if block.height >= self.active.len() as u64 {
            self.set_tip(&hash)?;
        }
        Ok(block)
    }

    fn block_ref(&self, pos: usize) -> BlockRef {
        let entry = &self.entries[pos];
        BlockRef {
            hash: entry.hash,
            height: entry.height,
            parent: entry.parent.map(|p| self.entries[p].hash),
        }
    }
}

impl BlockIndex for MemoryBlockIndex {
    fn lookup(&self, hash: &Hash256) -> Option<BlockRef> {
        self.by_hash.get(hash).map(|&pos| self.block_ref(pos))
    }

    fn active_chain_contains(&self, hash: &Hash256) -> bool {
        match self.by_hash.get(hash) {
            Some(&pos) => {
                let height = self.entries[pos].height as usize;
                self.active.get(height) == Some(&pos)
            }
            None => false,
        }
    }

    fn active_tip(&self) -> Option<BlockRef> {
        self.active.last().map(|&pos| self.block_ref(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(n: u64) -> Hash256 {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&n.to_le_bytes());
        bytes[31] = 0xA0;
        Hash256(bytes)
    }

    fn b(n: u64) -> Hash256 {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&n.to_le_bytes());
        bytes[31] = 0xB0;
        Hash256(bytes)
    }

    fn chain(len: u64) -> MemoryBlockIndex {
        let mut index = MemoryBlockIndex::new(h(0));
        for n in 1..=len {
            index.connect(h(n), &h(n - 1)).unwrap();
        }
        index
    }

    #[test]
    fn new_index_has_genesis_tip() {
        let index = MemoryBlockIndex::new(h(0));
        let tip = index.active_tip().unwrap();
        assert_eq!(tip.hash, h(0));
        assert_eq!(tip.height, 0);
        assert!(tip.is_genesis());
        assert_eq!(index.len(), 1);
        assert!(!index.is_empty());
    }

    #[test]
    fn connect_extends_tip() {
        let index = chain(10);
        let tip = index.active_tip().unwrap();
        assert_eq!(tip.hash, h(10));
        assert_eq!(tip.height, 10);
        assert_eq!(tip.parent, Some(h(9)));
        assert!(index.active_chain_contains(&h(4)));
        assert_eq!(index.active_hash_at(7), Some(h(7)));
        assert_eq!(index.active_hash_at(11), None);
    }

    #[test]
    fn insert_rejects_duplicate_and_orphan() {
        let mut index = chain(2);
        assert_eq!(
            index.insert(h(2), &h(1)).unwrap_err(),
            BlockIndexError::DuplicateBlock(h(2))
        );
        assert_eq!(
            index.insert(h(50), &h(49)).unwrap_err(),
            BlockIndexError::UnknownParent(h(49))
        );
    }

    #[test]
    fn shorter_fork_is_known_but_inactive() {
        let mut index = chain(5);
        index.connect(b(3), &h(2)).unwrap();
        assert!(index.contains(&b(3)));
        assert!(!index.active_chain_contains(&b(3)));
        assert_eq!(index.active_tip().unwrap().hash, h(5));
    }

    #[test]
    fn set_tip_reorganizes() {
        let mut index = chain(5);
        index.insert(b(3), &h(2)).unwrap();
        index.insert(b(4), &b(3)).unwrap();
        index.insert(b(5), &b(4)).unwrap();
        index.insert(b(6), &b(5)).unwrap();
        index.set_tip(&b(6)).unwrap();

        assert_eq!(index.active_tip().unwrap().hash, b(6));
        assert!(index.active_chain_contains(&h(2)));
        assert!(!index.active_chain_contains(&h(3)));
        assert!(index.active_chain_contains(&b(3)));
        assert_eq!(index.active_hash_at(4), Some(b(4)));
    }

    #[test]
    fn set_tip_unknown_fails() {
        let mut index = chain(1);
        assert_eq!(
            index.set_tip(&h(9)).unwrap_err(),
            BlockIndexError::BlockNotFound(h(9))
        );
    }

    #[test]
    fn ancestor_at_walks_parents() {
        let index = chain(20);
        let tip = index.active_tip().unwrap();
        assert_eq!(ancestor_at(&index, tip, 12).unwrap().hash, h(12));
        assert_eq!(ancestor_at(&index, tip, 0).unwrap().hash, h(0));
        // At or below the target height the start block is returned as-is.
        assert_eq!(ancestor_at(&index, tip, 25).unwrap().hash, h(20));
    }

    /// An index that claims a parent it cannot produce.
    struct Broken;

    impl BlockIndex for Broken {
        fn lookup(&self, hash: &Hash256) -> Option<BlockRef> {
            (*hash == h(5)).then(|| BlockRef {
                hash: h(5),
                height: 5,
                parent: Some(h(4)),
            })
        }
        fn active_chain_contains(&self, _hash: &Hash256) -> bool {
            true
        }
        fn active_tip(&self) -> Option<BlockRef> {
            self.lookup(&h(5))
        }
    }

    #[test]
    fn ancestor_at_reports_corrupt_index() {
        let start = Broken.lookup(&h(5)).unwrap();
        let err = ancestor_at(&Broken, start, 2).unwrap_err();
        assert_eq!(err, ValidationError::CorruptIndex { hash: h(5), height: 5 });
    }

    #[test]
    fn block_index_dyn_compatible() {
        let index = chain(1);
        let dyn_index: &dyn BlockIndex = &index;
        assert!(dyn_index.contains(&h(1)));
    }
}
