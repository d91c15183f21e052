//! Consistency check of a candidate checkpoint against the active one.
//!
//! Only a descendant of the current checkpoint may replace it. An older
//! candidate is harmless if it lies on the active checkpoint's ancestry and
//! is ignored; anything else is a fork conflict.
//!
//! # Attack vectors
//!
//! - **Compromised master key:** an attacker signing a checkpoint on a
//!   private fork produces a candidate that is either not a descendant of the
//!   active checkpoint or conflicts with it at equal height. Both are reported
//!   and never applied, so the damage stops at "no new checkpoints".
//!
//! - **Operator mistake:** the same path catches a master that checkpoints a
//!   block on a branch it later abandons.
//!
//! Both hashes must already be in the block index. Callers route unknown
//! candidates to the pending path before getting here.

use keel_core::block_index::{ancestor_at, BlockIndex};
use keel_core::error::ValidationError;
use keel_core::types::Hash256;

/// Decide whether `candidate` may become the active checkpoint.
///
/// Returns `Ok(true)` when `candidate` descends from `active` and supersedes
/// it, `Ok(false)` when it is an older checkpoint on `active`'s ancestry.
///
/// # Errors
///
/// - [`ValidationError::UnknownBlock`] if either hash is not indexed
/// - [`ValidationError::CorruptIndex`] if an ancestry walk hits a missing parent
/// - [`ValidationError::ConflictingCheckpoint`] if `candidate` is at or below
///   `active`'s height but not its ancestor
/// - [`ValidationError::NotDescendant`] if `candidate` is above `active` but
///   does not build on it
pub fn validate<I: BlockIndex + ?Sized>(
    index: &I,
    candidate: &Hash256,
    active: &Hash256,
) -> Result<bool, ValidationError> {
    let active_block = index
        .lookup(active)
        .ok_or(ValidationError::UnknownBlock(*active))?;
    let candidate_block = index
        .lookup(candidate)
        .ok_or(ValidationError::UnknownBlock(*candidate))?;

    if candidate_block.height <= active_block.height {
        // Older (or same-height) checkpoint: it must be an ancestor of the
        // active one, otherwise the two sit on different forks.
        let ancestor = ancestor_at(index, active_block, candidate_block.height)?;
        if ancestor.hash != *candidate {
            return Err(ValidationError::ConflictingCheckpoint {
                candidate: *candidate,
                active: *active,
            });
        }
        return Ok(false);
    }

    let ancestor = ancestor_at(index, candidate_block, active_block.height)?;
    if ancestor.hash != *active {
        return Err(ValidationError::NotDescendant {
            candidate: *candidate,
            active: *active,
        });
    }
    Ok(true)
}
