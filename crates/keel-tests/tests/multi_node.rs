//! Multi-node propagation over in-process transports.
//!
//! Each node gets its own [`LoopbackTransport`]; the mesh below moves framed
//! messages between them the way a P2P layer would.

use std::sync::Arc;

use libp2p::PeerId;

use keel_checkpoint::AcceptanceOutcome;
use keel_core::block_index::MemoryBlockIndex;
use keel_core::constants::{NetworkType, REGTEST_CHECKPOINT_MASTER_KEY};
use keel_core::store::MemoryCheckpointStore;
use keel_core::types::Hash256;
use keel_network::{LoopbackTransport, PeerInfo};
use keel_node_lib::{Node, NodeConfig};
use keel_tests::helpers::h;

// ---------------------------------------------------------------------------
// Mesh
// ---------------------------------------------------------------------------

struct Link {
    from: usize,
    to: usize,
    /// How `to` appears in `from`'s transport.
    outbound: PeerId,
    /// How `from` appears in `to`'s transport.
    inbound: PeerId,
    cursor: usize,
}

#[derive(Default)]
struct Mesh {
    nodes: Vec<Arc<Node>>,
    transports: Vec<Arc<LoopbackTransport>>,
    links: Vec<Link>,
}

impl Mesh {
    fn add(&mut self, config: NodeConfig, blocks: u64) -> usize {
        let transport = Arc::new(LoopbackTransport::new());
        let node = Node::with_store(
            config,
            MemoryBlockIndex::new(genesis()),
            Arc::new(MemoryCheckpointStore::new()),
            transport.clone(),
        )
        .unwrap();
        grow(&node, 0, blocks);
        self.nodes.push(node);
        self.transports.push(transport);
        self.nodes.len() - 1
    }

    fn follower(&mut self, blocks: u64) -> usize {
        self.add(regtest(), blocks)
    }

    fn master(&mut self, blocks: u64) -> usize {
        self.add(
            NodeConfig {
                checkpoint_master_key: Some(REGTEST_CHECKPOINT_MASTER_KEY.to_string()),
                ..regtest()
            },
            blocks,
        )
    }

    /// Connect `a` and `b` in both directions. Returns `b` as seen by `a`.
    fn link(&mut self, a: usize, b: usize) -> PeerId {
        let b_at_a = self.transports[a].connect(true);
        let a_at_b = self.transports[b].connect(true);
        self.links.push(Link {
            from: a,
            to: b,
            outbound: b_at_a,
            inbound: a_at_b,
            cursor: 0,
        });
        self.links.push(Link {
            from: b,
            to: a,
            outbound: a_at_b,
            inbound: b_at_a,
            cursor: 0,
        });
        b_at_a
    }

    /// Deliver queued messages until the mesh is quiet.
    ///
    /// Returns every `(receiver, outcome)` in delivery order.
    fn pump(&mut self) -> Vec<(usize, AcceptanceOutcome)> {
        let mut outcomes = Vec::new();
        loop {
            let mut progressed = false;
            for i in 0..self.links.len() {
                let (from, to, outbound, inbound, cursor) = {
                    let l = &self.links[i];
                    (l.from, l.to, l.outbound, l.inbound, l.cursor)
                };
                let queued = self.transports[from].delivered(&outbound);
                for bytes in &queued[cursor..] {
                    let outcome = self.nodes[to]
                        .on_checkpoint_message_received(&inbound, bytes)
                        .unwrap();
                    outcomes.push((to, outcome));
                    progressed = true;
                }
                self.links[i].cursor = queued.len();
            }
            if !progressed {
                return outcomes;
            }
        }
    }

    fn delivered_count(&self, from: usize, peer: &PeerId) -> usize {
        self.transports[from].delivered(peer).len()
    }
}

fn genesis() -> Hash256 {
    NetworkType::Regtest.genesis_hash()
}

fn regtest() -> NodeConfig {
    NodeConfig::for_network(NetworkType::Regtest)
}

fn grow(node: &Node, from: u64, to: u64) {
    for n in from + 1..=to {
        let parent = if n == 1 { genesis() } else { h(n - 1, 0) };
        node.connect_block(h(n, 0), parent).unwrap();
    }
}

// ---------------------------------------------------------------------------
// Propagation
// ---------------------------------------------------------------------------

#[test]
fn checkpoint_floods_a_line_once_per_hop() {
    let mut mesh = Mesh::default();
    let m = mesh.master(30);
    let a = mesh.follower(30);
    let b = mesh.follower(30);
    let c = mesh.follower(30);
    let a_at_m = mesh.link(m, a);
    let b_at_a = mesh.link(a, b);
    mesh.link(b, c);

    assert_eq!(
        mesh.nodes[m].broadcast_new_checkpoint(h(20, 0)).unwrap(),
        AcceptanceOutcome::Accepted
    );
    let outcomes = mesh.pump();

    assert_eq!(
        outcomes,
        vec![
            (a, AcceptanceOutcome::Accepted),
            (b, AcceptanceOutcome::Accepted),
            (c, AcceptanceOutcome::Accepted),
        ]
    );
    for node in &mesh.nodes {
        assert_eq!(node.get_active_checkpoint(), h(20, 0));
    }
    assert_eq!(mesh.delivered_count(m, &a_at_m), 1);
    assert_eq!(mesh.delivered_count(a, &b_at_a), 1);
}

#[test]
fn lagging_follower_defers_then_promotes_on_catch_up() {
    let mut mesh = Mesh::default();
    let m = mesh.master(30);
    let a = mesh.follower(30);
    let slow = mesh.follower(15);
    mesh.link(m, a);
    mesh.link(a, slow);

    mesh.nodes[m].broadcast_new_checkpoint(h(20, 0)).unwrap();
    let outcomes = mesh.pump();
    assert!(outcomes.contains(&(slow, AcceptanceOutcome::Deferred)));
    assert_eq!(mesh.nodes[slow].get_active_checkpoint(), genesis());
    assert_eq!(
        mesh.nodes[slow].checkpoint_status().pending,
        Some(h(20, 0).to_string())
    );

    grow(&mesh.nodes[slow], 15, 20);
    assert_eq!(mesh.nodes[slow].get_active_checkpoint(), h(20, 0));
    assert!(mesh.nodes[slow].checkpoint_status().pending.is_none());
    // `a` sent the checkpoint, so the promoted node has nobody new to tell.
    assert!(mesh.pump().is_empty());
}

#[test]
fn late_joiner_receives_last_checkpoint_on_connect() {
    let mut mesh = Mesh::default();
    let m = mesh.master(30);
    let a = mesh.follower(30);
    mesh.link(m, a);
    mesh.nodes[m].broadcast_new_checkpoint(h(25, 0)).unwrap();
    mesh.pump();

    let late = mesh.follower(30);
    let late_at_a = mesh.link(a, late);
    let info = mesh.transports[a].peer(&late_at_a).unwrap();
    mesh.nodes[a].on_peer_connected(&info);

    assert_eq!(mesh.pump(), vec![(late, AcceptanceOutcome::Accepted)]);
    assert_eq!(mesh.nodes[late].get_active_checkpoint(), h(25, 0));
}

#[test]
fn legacy_peer_is_never_sent_checkpoints() {
    let mut mesh = Mesh::default();
    let m = mesh.master(10);
    let legacy = mesh.transports[m].connect(false);
    let info = mesh.transports[m].peer(&legacy).unwrap();

    mesh.nodes[m].broadcast_new_checkpoint(h(5, 0)).unwrap();
    mesh.nodes[m].on_peer_connected(&info);
    assert_eq!(mesh.delivered_count(m, &legacy), 0);
}

#[test]
fn dropped_peer_does_not_stop_broadcast() {
    let mut mesh = Mesh::default();
    let m = mesh.master(10);
    let a = mesh.follower(10);
    let b = mesh.follower(10);
    let a_at_m = mesh.link(m, a);
    let b_at_m = mesh.link(m, b);
    mesh.transports[m].fail_peer(&a_at_m);

    mesh.nodes[m].broadcast_new_checkpoint(h(6, 0)).unwrap();
    assert_eq!(mesh.pump(), vec![(b, AcceptanceOutcome::Accepted)]);
    assert_eq!(mesh.nodes[m].relay().known_hash(&b_at_m), Some(h(6, 0)));
    assert_eq!(mesh.nodes[m].relay().known_hash(&a_at_m), None);
    assert_eq!(mesh.nodes[a].get_active_checkpoint(), genesis());
}

#[test]
fn reconnected_peer_is_brought_up_to_date() {
    let mut mesh = Mesh::default();
    let m = mesh.master(10);
    let a = mesh.follower(10);
    let a_at_m = mesh.link(m, a);
    mesh.nodes[m].broadcast_new_checkpoint(h(6, 0)).unwrap();
    mesh.pump();

    mesh.nodes[m].on_peer_disconnected(&a_at_m);
    assert_eq!(mesh.nodes[m].relay().known_hash(&a_at_m), None);

    let info = PeerInfo {
        id: a_at_m,
        supports_checkpoints: true,
    };
    mesh.nodes[m].on_peer_connected(&info);
    // The follower already has it; the repeat is a harmless no-op.
    assert_eq!(mesh.pump(), vec![(a, AcceptanceOutcome::Ignored)]);
}

// ---------------------------------------------------------------------------
// Master mode
// ---------------------------------------------------------------------------

#[test]
fn auto_checkpoint_trails_tip_by_depth() {
    let mut mesh = Mesh::default();
    let a = mesh.follower(12);
    let m = mesh.add(
        NodeConfig {
            checkpoint_master_key: Some(REGTEST_CHECKPOINT_MASTER_KEY.to_string()),
            auto_checkpoint: true,
            ..regtest()
        },
        0,
    );
    mesh.link(m, a);

    grow(&mesh.nodes[m], 0, 12);
    assert_eq!(mesh.nodes[m].get_active_checkpoint(), h(7, 0));

    let outcomes = mesh.pump();
    assert_eq!(outcomes.len(), 7);
    assert!(outcomes.iter().all(|(_, o)| o.is_accepted()));
    assert_eq!(mesh.nodes[a].get_active_checkpoint(), h(7, 0));
}

#[test]
fn follower_cannot_broadcast() {
    let mut mesh = Mesh::default();
    let a = mesh.follower(10);
    assert!(mesh.nodes[a].broadcast_new_checkpoint(h(5, 0)).is_err());
    assert_eq!(
        mesh.nodes[a].broadcast_new_checkpoint(Hash256::ZERO).unwrap(),
        AcceptanceOutcome::Ignored
    );
}

#[test]
fn follower_refuses_blocks_forking_below_checkpoint() {
    let mut mesh = Mesh::default();
    let m = mesh.master(20);
    let a = mesh.follower(20);
    mesh.link(m, a);
    mesh.nodes[m].broadcast_new_checkpoint(h(15, 0)).unwrap();
    mesh.pump();

    let follower = &mesh.nodes[a];
    assert!(follower.connect_block(h(11, 7), h(10, 0)).is_err());
    assert!(follower.connect_block(h(21, 0), h(20, 0)).is_ok());
    assert!(follower.validate_block_against_checkpoint(&h(21, 0), 21).unwrap());
}
