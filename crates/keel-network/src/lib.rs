//! # keel-network: Checkpoint propagation.
//!
//! Frames [`SignedCheckpoint`](keel_checkpoint::SignedCheckpoint) messages
//! for the wire and relays them to peers that support the checkpoint
//! extension, suppressing sends of a hash a peer already holds. Peers are
//! identified by libp2p [`PeerId`](libp2p::PeerId); the transport itself sits
//! behind the [`PeerTransport`] trait.

pub mod loopback;
pub mod protocol;
pub mod relay;

pub use loopback::LoopbackTransport;
pub use protocol::{CheckpointCodec, CHECKPOINT_TOPIC};
pub use relay::{CheckpointRelay, PeerInfo, PeerTransport, RelayReport};
