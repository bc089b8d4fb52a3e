#![deny(unused_must_use)]
//! Integration tests of the reliable broadcast protocol.
//!
//! Two properties are tested:
//!
//! - No two deliveries disagree: across all correct nodes, at most one value is delivered.
//!
//! - Eventual delivery: if a correct proposer broadcasts a value, all correct nodes deliver it,
//!   exactly once.

mod net;

use std::sync::Arc;

use log::info;
use rand::{Rng, SeedableRng};

use bkr_acs::broadcast::{Broadcast, Error};
use bkr_acs::ConsensusProtocol;

use net::{
    random_seed, Adversary, CoinOracle, MessageScheduler, NodeId, SilentAdversary, TestNetwork,
    TestNode, TestRng,
};

type Algo = Broadcast<NodeId>;

const PROPOSER: NodeId = NodeId(0);

fn new_broadcast(_id: NodeId, netinfo: bkr_acs::NetworkInfo<NodeId>) -> Algo {
    Broadcast::new(Arc::new(netinfo), PROPOSER)
}

/// Runs the broadcast of `payload` from node 0 and verifies that every good node, and the
/// observer, delivers it exactly once.
fn test_broadcast<A: Adversary<Algo>>(mut network: TestNetwork<A, Algo>, payload: &[u8]) {
    network.input(PROPOSER, payload.to_vec());
    let mut steps = 0;
    while !network.nodes.values().all(TestNode::terminated) {
        assert!(steps < 100_000, "broadcast did not terminate");
        network.step();
        steps += 1;
    }
    for node in network.nodes.values() {
        assert_eq!(node.outputs(), [payload.to_vec()]);
    }
    assert_eq!(network.observer.outputs(), [payload.to_vec()]);
}

/// The four node network exercises both quorums exactly: with one crashed node, the three good
/// nodes are precisely the `(N + f) / 2 + 1` echo quorum and the `2 f + 1` delivery quorum.
#[test]
fn broadcast_4_nodes_1_crashed() {
    let _ = env_logger::try_init();
    let adversary = SilentAdversary::new(MessageScheduler::First);
    let network = TestNetwork::new(3, 1, CoinOracle::Seeded, adversary, 0, new_broadcast);
    test_broadcast(network, b"msg");
}

#[test]
fn broadcast_single_node() {
    let _ = env_logger::try_init();
    let adversary = SilentAdversary::new(MessageScheduler::First);
    let network = TestNetwork::new(1, 0, CoinOracle::Seeded, adversary, 1, new_broadcast);
    test_broadcast(network, b"Node 0 is the greatest!");
}

#[test]
fn broadcast_different_sizes_random_schedule() {
    let _ = env_logger::try_init();
    let mut rng = TestRng::seed_from_u64(random_seed());
    for size in 2..=11 {
        let num_faulty = (size - 1) / 3;
        info!(
            "Test start: {} good nodes, {} crashed",
            size - num_faulty,
            num_faulty
        );
        let adversary = SilentAdversary::new(MessageScheduler::Random);
        let network = TestNetwork::new(
            size - num_faulty,
            num_faulty,
            CoinOracle::Seeded,
            adversary,
            rng.gen(),
            new_broadcast,
        );
        test_broadcast(network, b"Foo");
    }
}

/// Only the proposer may initiate the broadcast, and only once.
#[test]
fn broadcast_rejects_wrong_proposer_and_reuse() {
    let _ = env_logger::try_init();
    let mut rng = TestRng::seed_from_u64(2);
    let ids: std::collections::BTreeSet<NodeId> = (0..4).map(NodeId).collect();

    let netinfo = Arc::new(bkr_acs::NetworkInfo::new(NodeId(1), ids.clone()));
    let mut wrong_proposer = Broadcast::new(netinfo, PROPOSER);
    assert_eq!(
        wrong_proposer
            .handle_input(b"spoof".to_vec(), &mut rng)
            .err(),
        Some(Error::InstanceCannotPropose)
    );

    let netinfo = Arc::new(bkr_acs::NetworkInfo::new(PROPOSER, ids));
    let mut proposer = Broadcast::new(netinfo, PROPOSER);
    let step = proposer
        .handle_input(b"first".to_vec(), &mut rng)
        .expect("first broadcast");
    assert!(!step.messages.is_empty());
    assert_eq!(
        proposer.handle_input(b"second".to_vec(), &mut rng).err(),
        Some(Error::MultipleInputs)
    );
}
