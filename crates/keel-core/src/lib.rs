//! # keel-core
//! Foundation types, errors, and collaborator interfaces for keel's
//! centrally signed checkpoints.

pub mod block_index;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod store;
pub mod types;
