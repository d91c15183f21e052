//! In-process [`PeerTransport`] that records every push.
//!
//! Used by node tests and the integration suite in place of a libp2p swarm.

use std::collections::{HashMap, HashSet};

use libp2p::PeerId;
use parking_lot::Mutex;

use keel_core::error::NetworkError;

use crate::relay::{PeerInfo, PeerTransport};

#[derive(Default)]
struct Inner {
    peers: Vec<PeerInfo>,
    failing: HashSet<PeerId>,
    delivered: HashMap<PeerId, Vec<Vec<u8>>>,
}

/// Fake peer set with per-peer inboxes.
#[derive(Default)]
pub struct LoopbackTransport {
    inner: Mutex<Inner>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connected peer with a fresh random id.
    pub fn connect(&self, supports_checkpoints: bool) -> PeerId {
        let id = PeerId::random();
        self.inner.lock().peers.push(PeerInfo {
            id,
            supports_checkpoints,
        });
        id
    }

    pub fn disconnect(&self, peer: &PeerId) {
        let mut inner = self.inner.lock();
        inner.peers.retain(|p| p.id != *peer);
        inner.failing.remove(peer);
    }

    /// Make every push to `peer` fail as if it dropped mid-broadcast.
    pub fn fail_peer(&self, peer: &PeerId) {
        self.inner.lock().failing.insert(*peer);
    }

    pub fn peer(&self, peer: &PeerId) -> Option<PeerInfo> {
        self.inner.lock().peers.iter().find(|p| p.id == *peer).copied()
    }

    /// Framed payloads pushed to `peer`, oldest first.
    pub fn delivered(&self, peer: &PeerId) -> Vec<Vec<u8>> {
        self.inner
            .lock()
            .delivered
            .get(peer)
            .cloned()
            .unwrap_or_default()
    }
}

impl PeerTransport for LoopbackTransport {
    fn connected_peers(&self) -> Vec<PeerInfo> {
        self.inner.lock().peers.clone()
    }

    fn push_message(&self, peer: &PeerId, _topic: &str, payload: &[u8]) -> Result<(), NetworkError> {
        let mut inner = self.inner.lock();
        if inner.failing.contains(peer) {
            return Err(NetworkError::PeerDisconnected(peer.to_string()));
        }
        if !inner.peers.iter().any(|p| p.id == *peer) {
            return Err(NetworkError::PeerDisconnected(peer.to_string()));
        }
        inner.delivered.entry(*peer).or_default().push(payload.to_vec());
        Ok(())
    }
}
