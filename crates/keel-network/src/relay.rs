//! Checkpoint relay with per-peer duplicate suppression.
//!
//! The relay remembers, for each peer, the last checkpoint hash that peer is
//! known to have: either we sent it, or the peer sent it to us. A message is
//! pushed only to peers that advertise checkpoint support and do not already
//! know its target. Push failures are logged and skipped so one dropped peer
//! cannot stall a broadcast.

use std::collections::HashMap;

use libp2p::PeerId;
use parking_lot::Mutex;
use tracing::debug;

use keel_checkpoint::SignedCheckpoint;
use keel_core::error::NetworkError;
use keel_core::types::Hash256;

use crate::protocol::{CheckpointCodec, CHECKPOINT_TOPIC};

/// A connected peer as seen by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerInfo {
    pub id: PeerId,
    /// Whether the peer negotiated the checkpoint protocol extension.
    pub supports_checkpoints: bool,
}

/// Outbound side of the peer-to-peer layer.
pub trait PeerTransport: Send + Sync {
    /// Snapshot of currently connected peers.
    fn connected_peers(&self) -> Vec<PeerInfo>;

    /// Push `payload` to a single peer under `topic`.
    fn push_message(&self, peer: &PeerId, topic: &str, payload: &[u8]) -> Result<(), NetworkError>;
}

/// Per-broadcast counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub sent: usize,
    /// Peers without checkpoint support or already holding the hash.
    pub skipped: usize,
    pub failed: usize,
}

/// Relays checkpoint messages and tracks what each peer already knows.
pub struct CheckpointRelay {
    codec: CheckpointCodec,
    known: Mutex<HashMap<PeerId, Hash256>>,
}

impl CheckpointRelay {
    pub fn new(codec: CheckpointCodec) -> Self {
        Self {
            codec,
            known: Mutex::new(HashMap::new()),
        }
    }

    pub fn codec(&self) -> &CheckpointCodec {
        &self.codec
    }

    /// Record that `peer` has the checkpoint for `hash`.
    pub fn mark_known(&self, peer: &PeerId, hash: Hash256) {
        self.known.lock().insert(*peer, hash);
    }

    /// Last checkpoint hash `peer` is known to hold.
    pub fn known_hash(&self, peer: &PeerId) -> Option<Hash256> {
        self.known.lock().get(peer).copied()
    }

    /// Drop tracking for a disconnected peer.
    pub fn forget_peer(&self, peer: &PeerId) {
        self.known.lock().remove(peer);
    }

    /// Push `message` to every connected peer that supports checkpoints and
    /// has not seen its target yet.
    pub fn relay(
        &self,
        transport: &dyn PeerTransport,
        message: &SignedCheckpoint,
    ) -> Result<RelayReport, NetworkError> {
        let payload = self.codec.encode(message)?;
        let mut report = RelayReport::default();
        for peer in transport.connected_peers() {
            match self.relay_to(transport, &peer, message.target, &payload) {
                Some(Ok(())) => report.sent += 1,
                Some(Err(e)) => {
                    debug!(peer = %peer.id, error = %e, "checkpoint relay to peer failed");
                    report.failed += 1;
                }
                None => report.skipped += 1,
            }
        }
        debug!(
            checkpoint = %message.target,
            sent = report.sent,
            skipped = report.skipped,
            failed = report.failed,
            "relayed sync checkpoint"
        );
        Ok(report)
    }

    /// Send one message to one peer. Returns `None` if the peer was skipped.
    pub fn send_to(
        &self,
        transport: &dyn PeerTransport,
        peer: &PeerInfo,
        message: &SignedCheckpoint,
    ) -> Result<Option<()>, NetworkError> {
        let payload = self.codec.encode(message)?;
        self.relay_to(transport, peer, message.target, &payload)
            .transpose()
    }

    fn relay_to(
        &self,
        transport: &dyn PeerTransport,
        peer: &PeerInfo,
        hash: Hash256,
        payload: &[u8],
    ) -> Option<Result<(), NetworkError>> {
        if !peer.supports_checkpoints {
            return None;
        }
        {
            let mut known = self.known.lock();
            if known.get(&peer.id) == Some(&hash) {
                return None;
            }
            known.insert(peer.id, hash);
        }
        let result = transport.push_message(&peer.id, CHECKPOINT_TOPIC, payload);
        if result.is_err() {
            // Unmark so a later relay retries this peer.
            let mut known = self.known.lock();
            if known.get(&peer.id) == Some(&hash) {
                known.remove(&peer.id);
            }
        }
        Some(result)
    }
}
