//! An in-memory test network.
//!
//! The network hosts one protocol instance per simulated node and delivers the messages between
//! them, one per step, in an order picked by a scheduler: FIFO for a fully ordered run, or
//! randomized to exercise the asynchrony of the protocols. An adversary controls the scheduling
//! and any faulty nodes.
//!
//! The common coin is simulated by a shared deterministic oracle: whenever an instance emits a
//! coin request, the oracle's reply is queued like any other message for that node, so it can be
//! delayed and interleaved like real oracle traffic.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use log::debug;
use rand::rngs::OsRng;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use serde::{Deserialize, Serialize};

use bkr_acs::binary_agreement::{self, BinaryAgreement};
use bkr_acs::broadcast::Broadcast;
use bkr_acs::subset::{Subset, SubsetOutput};
use bkr_acs::{
    util, CoinSeed, ConsensusProtocol, CpStep, NetworkInfo, Target, TargetedMessage,
};

/// A node identifier. In the tests, nodes are simply numbered.
#[derive(
    Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Clone, Copy, Serialize, Deserialize,
)]
pub struct NodeId(pub usize);

/// The random number generator used by the test networks.
pub type TestRng = XorShiftRng;

/// Returns a seed for a reproducible test run. The seed is logged, so a failing run can be
/// repeated by hardcoding it.
pub fn random_seed() -> u64 {
    let seed = OsRng.gen();
    debug!("test network seed: {}", seed);
    seed
}

/// A protocol that may consult the shared coin oracle.
///
/// The network uses this to recognize coin requests among an algorithm's outputs and to route the
/// oracle's replies back into the instance.
pub trait SharedCoin: ConsensusProtocol + Sized {
    /// Returns the seed if the output is a coin request.
    fn coin_request(output: &Self::Output) -> Option<CoinSeed>;

    /// Feeds an oracle reply into the instance.
    fn handle_coin(&mut self, seed: &CoinSeed, value: bool) -> Result<CpStep<Self>, Self::Error>;
}

impl SharedCoin for BinaryAgreement<NodeId> {
    fn coin_request(output: &Self::Output) -> Option<CoinSeed> {
        match output {
            binary_agreement::Output::CoinRequest(seed) => Some(*seed),
            binary_agreement::Output::Decision(_) => None,
        }
    }

    fn handle_coin(&mut self, seed: &CoinSeed, value: bool) -> Result<CpStep<Self>, Self::Error> {
        BinaryAgreement::handle_coin(self, seed, value)
    }
}

impl SharedCoin for Subset<NodeId> {
    fn coin_request(output: &Self::Output) -> Option<CoinSeed> {
        match output {
            SubsetOutput::CoinRequest(seed) => Some(*seed),
            _ => None,
        }
    }

    fn handle_coin(&mut self, seed: &CoinSeed, value: bool) -> Result<CpStep<Self>, Self::Error> {
        Subset::handle_coin(self, seed, value)
    }
}

impl SharedCoin for Broadcast<NodeId> {
    fn coin_request(_output: &Self::Output) -> Option<CoinSeed> {
        None
    }

    fn handle_coin(&mut self, _seed: &CoinSeed, _value: bool) -> Result<CpStep<Self>, Self::Error> {
        Ok(CpStep::<Self>::default())
    }
}

/// A deterministic stand-in for the common-coin oracle: every node querying the same seed
/// observes the same bit.
pub enum CoinOracle {
    /// The bit is derived from the seed's digest: unpredictable across rounds, but fixed per
    /// seed.
    Seeded,
    /// The bit is taken from the list, indexed by the seed's round number modulo the length.
    /// Useful for scripting exact round-by-round outcomes.
    PerRound(Vec<bool>),
}

impl CoinOracle {
    /// Tosses the coin for the given seed.
    pub fn toss(&self, seed: &CoinSeed) -> bool {
        match self {
            CoinOracle::Seeded => util::digest(seed.as_bytes())[0] & 1 == 1,
            CoinOracle::PerRound(values) => values[seed.round() as usize % values.len()],
        }
    }
}

/// A queued delivery for one node: a protocol message from a peer, or an oracle reply.
#[derive(Debug)]
pub enum Envelope<D: ConsensusProtocol> {
    /// A message sent by the given node.
    Message(NodeId, D::Message),
    /// The oracle's reply to a coin request.
    Coin(CoinSeed, bool),
}

/// A "node" running an instance of the algorithm `D`.
pub struct TestNode<D: ConsensusProtocol> {
    /// This node's own ID.
    id: NodeId,
    /// The instance of the algorithm.
    algo: D,
    /// Incoming deliveries that this node has not yet handled.
    pub queue: VecDeque<Envelope<D>>,
    /// The values this node has output so far, coin requests excluded.
    outputs: Vec<D::Output>,
    /// The faults this node has attributed to its peers so far.
    faults: Vec<(NodeId, D::FaultKind)>,
}

impl<D: SharedCoin<NodeId = NodeId>> TestNode<D> {
    /// Creates a new test node with the given instance.
    fn new(id: NodeId, algo: D) -> Self {
        TestNode {
            id,
            algo,
            queue: VecDeque::new(),
            outputs: Vec::new(),
            faults: Vec::new(),
        }
    }

    /// Returns the list of outputs received by this node.
    pub fn outputs(&self) -> &[D::Output] {
        &self.outputs
    }

    /// Returns the faults this node attributed to peers.
    #[allow(unused)] // Not used in all tests.
    pub fn faults(&self) -> &[(NodeId, D::FaultKind)] {
        &self.faults
    }

    /// Returns whether the algorithm has terminated.
    pub fn terminated(&self) -> bool {
        self.algo.terminated()
    }

    /// Returns the internal algorithm's instance.
    #[allow(unused)] // Not used in all tests.
    pub fn instance(&self) -> &D {
        &self.algo
    }

    /// Handles the first delivery in the node's queue and returns the resulting step.
    fn handle_delivery(&mut self, rng: &mut TestRng) -> CpStep<D> {
        match self.queue.pop_front().expect("delivery not found") {
            Envelope::Message(from_id, msg) => self
                .algo
                .handle_message(&from_id, msg, rng)
                .expect("handling message"),
            Envelope::Coin(seed, value) => self
                .algo
                .handle_coin(&seed, value)
                .expect("handling coin value"),
        }
    }
}

/// A strategy for picking the next good node to handle a delivery.
pub enum MessageScheduler {
    /// Picks the first non-idle node, yielding an ordered, FIFO run.
    First,
    /// Picks a random non-idle node.
    Random,
}

impl MessageScheduler {
    /// Chooses a node to be the next one to handle a delivery.
    pub fn pick_node<D: SharedCoin<NodeId = NodeId>>(
        &self,
        nodes: &BTreeMap<NodeId, TestNode<D>>,
        rng: &mut TestRng,
    ) -> NodeId {
        let busy: Vec<NodeId> = nodes
            .iter()
            .filter(|(_, node)| !node.queue.is_empty())
            .map(|(id, _)| *id)
            .collect();
        assert!(!busy.is_empty(), "no more deliveries in queue");
        match *self {
            MessageScheduler::First => busy[0],
            MessageScheduler::Random => busy[rng.gen_range(0, busy.len())],
        }
    }
}

/// A message sent by a node controlled by the adversary.
pub type MessageWithSender<D> =
    (NodeId, TargetedMessage<<D as ConsensusProtocol>::Message, NodeId>);

/// An adversary that controls a set of nodes and picks the next good node to receive a delivery.
pub trait Adversary<D: SharedCoin<NodeId = NodeId>> {
    /// Chooses a node to be the next one to handle a delivery.
    ///
    /// Starvation is illegal: a node that has pending deliveries must be chosen.
    fn pick_node(&self, nodes: &BTreeMap<NodeId, TestNode<D>>, rng: &mut TestRng) -> NodeId;

    /// Called when a node controlled by the adversary receives a message.
    fn push_message(&mut self, sender_id: NodeId, msg: TargetedMessage<D::Message, NodeId>);

    /// Produces a list of messages to be sent from the adversary's nodes.
    fn step(&mut self, rng: &mut TestRng) -> Vec<MessageWithSender<D>>;
}

/// An adversary whose nodes never send any messages: the faulty nodes have simply crashed.
pub struct SilentAdversary {
    scheduler: MessageScheduler,
}

impl SilentAdversary {
    /// Creates a new silent adversary with the given message scheduler.
    pub fn new(scheduler: MessageScheduler) -> SilentAdversary {
        SilentAdversary { scheduler }
    }
}

impl<D: SharedCoin<NodeId = NodeId>> Adversary<D> for SilentAdversary {
    fn pick_node(&self, nodes: &BTreeMap<NodeId, TestNode<D>>, rng: &mut TestRng) -> NodeId {
        self.scheduler.pick_node(nodes, rng)
    }

    fn push_message(&mut self, _: NodeId, _: TargetedMessage<D::Message, NodeId>) {
        // All messages are ignored.
    }

    fn step(&mut self, _: &mut TestRng) -> Vec<MessageWithSender<D>> {
        Vec::new() // No messages are sent.
    }
}

/// A collection of `TestNode`s representing a network.
///
/// Each network is tied to an adversary and an algorithm. It consists of a set of good nodes, a
/// set of adversarial node IDs, and one observer that is not part of the validator set but
/// follows the protocol. The adversary can decide which node makes progress next and can send
/// arbitrary messages from the nodes it controls.
pub struct TestNetwork<A: Adversary<D>, D: SharedCoin<NodeId = NodeId>> {
    /// The good nodes, by ID.
    pub nodes: BTreeMap<NodeId, TestNode<D>>,
    /// The observer: not a validator, but follows the run and must produce the same outputs.
    pub observer: TestNode<D>,
    /// The IDs of the nodes the adversary controls.
    pub adv_ids: BTreeSet<NodeId>,
    adversary: A,
    oracle: CoinOracle,
    rng: TestRng,
}

impl<A: Adversary<D>, D: SharedCoin<NodeId = NodeId>> TestNetwork<A, D>
where
    D::Message: Clone,
{
    /// Creates a new network with `good_num` good nodes, `adv_num` nodes controlled by
    /// `adversary`, and the given coin oracle. The run is reproducible from the seed.
    pub fn new<F>(
        good_num: usize,
        adv_num: usize,
        oracle: CoinOracle,
        adversary: A,
        seed: u64,
        new_algo: F,
    ) -> TestNetwork<A, D>
    where
        F: Fn(NodeId, NetworkInfo<NodeId>) -> D,
    {
        let member_ids: BTreeSet<NodeId> = (0..good_num + adv_num).map(NodeId).collect();
        let observer_id = NodeId(good_num + adv_num);
        let mut netinfos = NetworkInfo::generate_map(member_ids.iter().cloned());
        let nodes = (0..good_num)
            .map(NodeId)
            .map(|id| {
                let netinfo = netinfos.remove(&id).expect("netinfo missing");
                (id, TestNode::new(id, new_algo(id, netinfo)))
            })
            .collect();
        let observer_netinfo = NetworkInfo::new(observer_id, member_ids);
        let observer = TestNode::new(observer_id, new_algo(observer_id, observer_netinfo));
        TestNetwork {
            nodes,
            observer,
            adv_ids: (good_num..good_num + adv_num).map(NodeId).collect(),
            adversary,
            oracle,
            rng: TestRng::seed_from_u64(seed),
        }
    }

    /// Inputs a value in node `id`.
    pub fn input(&mut self, id: NodeId, value: D::Input) {
        let step = self
            .nodes
            .get_mut(&id)
            .expect("input node not found")
            .algo
            .handle_input(value, &mut self.rng)
            .expect("input");
        self.process_step(id, step);
    }

    /// Inputs a value in the observer, standing in for deliveries the observer receives from
    /// outside the validator set (e.g. its own reliable broadcast instances).
    #[allow(unused)] // Not used in all tests.
    pub fn input_observer(&mut self, value: D::Input) {
        let step = self
            .observer
            .algo
            .handle_input(value, &mut self.rng)
            .expect("observer input");
        self.process_observer_step(step);
        self.drain_observer();
    }

    /// Performs one iteration of the network: gives the adversary a chance to speak, then lets
    /// one node, chosen by the adversary, handle its next delivery.
    ///
    /// Returns the ID of the node that made progress.
    pub fn step(&mut self) -> NodeId {
        let msgs = self.adversary.step(&mut self.rng);
        for (sender_id, msg) in msgs {
            self.dispatch_messages(sender_id, vec![msg]);
        }

        let id = self.adversary.pick_node(&self.nodes, &mut self.rng);
        let step = {
            let node = self.nodes.get_mut(&id).expect("scheduled node not found");
            node.handle_delivery(&mut self.rng)
        };
        self.process_step(id, step);
        id
    }

    /// Returns `true` if any good node still has pending deliveries.
    #[allow(unused)] // Not used in all tests.
    pub fn has_deliveries(&self) -> bool {
        self.nodes.values().any(|node| !node.queue.is_empty())
    }

    /// Records a step's outputs and faults, replies to its coin requests, and dispatches its
    /// messages.
    fn process_step(&mut self, id: NodeId, step: CpStep<D>) {
        {
            let oracle = &self.oracle;
            let node = self.nodes.get_mut(&id).expect("stepped node not found");
            for fault in step.fault_log {
                node.faults.push((fault.node_id, fault.kind));
            }
            for output in step.output {
                match D::coin_request(&output) {
                    Some(seed) => {
                        let value = oracle.toss(&seed);
                        node.queue.push_back(Envelope::Coin(seed, value));
                    }
                    None => node.outputs.push(output),
                }
            }
        }
        self.dispatch_messages(id, step.messages);
    }

    /// Pushes the messages into the queues of the corresponding recipients.
    fn dispatch_messages<Q>(&mut self, sender_id: NodeId, msgs: Q)
    where
        Q: IntoIterator<Item = TargetedMessage<D::Message, NodeId>>,
    {
        for msg in msgs {
            match msg.target {
                Target::All => {
                    for node in self.nodes.values_mut() {
                        if node.id != sender_id {
                            node.queue
                                .push_back(Envelope::Message(sender_id, msg.message.clone()));
                        }
                    }
                    self.observer
                        .queue
                        .push_back(Envelope::Message(sender_id, msg.message.clone()));
                    self.adversary.push_message(sender_id, msg);
                }
                Target::Node(to_id) => {
                    if self.adv_ids.contains(&to_id) {
                        self.adversary.push_message(sender_id, msg);
                    } else if to_id == self.observer.id {
                        self.observer
                            .queue
                            .push_back(Envelope::Message(sender_id, msg.message));
                    } else if let Some(node) = self.nodes.get_mut(&to_id) {
                        node.queue.push_back(Envelope::Message(sender_id, msg.message));
                    }
                }
            }
        }
        self.drain_observer();
    }

    /// The observer handles its deliveries immediately; it cannot affect the good nodes.
    fn drain_observer(&mut self) {
        while !self.observer.queue.is_empty() {
            let step = self.observer.handle_delivery(&mut self.rng);
            self.process_observer_step(step);
        }
    }

    /// Records an observer step, replying to its coin requests.
    fn process_observer_step(&mut self, step: CpStep<D>) {
        assert!(
            step.messages.is_empty(),
            "the observer must not send messages"
        );
        for output in step.output {
            match D::coin_request(&output) {
                Some(seed) => {
                    let value = self.oracle.toss(&seed);
                    self.observer.queue.push_back(Envelope::Coin(seed, value));
                }
                None => self.observer.outputs.push(output),
            }
        }
    }
}
