//! Depth-based choice of the block a master node checkpoints.

use keel_core::block_index::BlockIndex;
use keel_core::error::ValidationError;
use keel_core::types::Hash256;

/// Pick the block `depth` below the active tip.
///
/// Walks parent links from the live tip while `height + depth > tip.height`,
/// so the result follows actual ancestry even right after a reorganization.
/// A chain shorter than `depth` yields genesis. `depth` is not policed here;
/// callers refuse values below `MIN_CHECKPOINT_DEPTH`.
pub fn select<I: BlockIndex + ?Sized>(index: &I, depth: u64) -> Result<Hash256, ValidationError> {
    let tip = index
        .active_tip()
        .ok_or(ValidationError::UnknownBlock(Hash256::ZERO))?;
    let mut current = tip;
    while current.height.saturating_add(depth) > tip.height {
        let Some(parent_hash) = current.parent else {
            break;
        };
        current = index
            .lookup(&parent_hash)
            .ok_or(ValidationError::CorruptIndex {
                hash: current.hash,
                height: current.height,
            })?;
    }
    Ok(current.hash)
}
