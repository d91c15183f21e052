//! Integration and adversarial test suite for the Keel sync checkpoint.
//!
//! Scenarios drive the engine and node across crate boundaries: forks and
//! reorganizations, forged messages, storage failure, key rotation, and
//! relay to unreliable peers.

pub mod helpers;
