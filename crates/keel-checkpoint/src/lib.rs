//! # keel-checkpoint: Centrally signed sync checkpoints.
//!
//! A checkpoint master periodically signs a block hash. Every node checks
//! the signature against the network's authority key, validates the target
//! against its active checkpoint with ancestry walks, and persists it. From
//! then on blocks that do not build on the checkpoint are refused.
//!
//! Checkpoints naming a block the node has not connected yet are held as
//! pending and retried once the block joins the active chain.

pub mod authority;
pub mod engine;
pub mod message;
pub mod select;
pub mod state;
pub mod validator;

pub use authority::CheckpointAuthority;
pub use engine::{AcceptanceOutcome, ChainContext, CheckpointEngine, RejectReason};
pub use message::{SignedCheckpoint, UnsignedCheckpoint};
pub use state::{CheckpointState, PendingCheckpoint};
