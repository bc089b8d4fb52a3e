use std::collections::BTreeMap;
use std::sync::Arc;
use std::{fmt, result};

use hex_fmt::HexFmt;
use log::{debug, warn};
use rand::Rng;

use super::{Error, FaultKind, Message, Result};
use crate::fault_log::Fault;
use crate::util::{self, Digest};
use crate::{ConsensusProtocol, NetworkInfo, NodeIdT, Target};

/// A `Broadcast` step, containing at most one output.
pub type Step<N> = crate::CpStep<Broadcast<N>>;

/// Broadcast algorithm instance.
#[derive(Debug)]
pub struct Broadcast<N> {
    /// Shared network data.
    netinfo: Arc<NetworkInfo<N>>,
    /// The ID of the proposing node.
    proposer_id: N,
    /// Whether we have already multicast our `Echo`.
    echo_sent: bool,
    /// Whether we have already multicast `Ready`.
    ready_sent: bool,
    /// Whether we have already delivered a value.
    decided: bool,
    /// The payload digests received via `Echo` messages, by sender ID.
    echos: BTreeMap<N, Digest>,
    /// The payload digests received via `Ready` messages, by sender ID.
    readys: BTreeMap<N, Digest>,
}

impl<N: NodeIdT> ConsensusProtocol for Broadcast<N> {
    type NodeId = N;
    type Input = Vec<u8>;
    type Output = Self::Input;
    type Message = Message;
    type Error = Error;
    type FaultKind = FaultKind;

    fn handle_input<R: Rng>(&mut self, input: Self::Input, _rng: &mut R) -> Result<Step<N>> {
        self.broadcast(input)
    }

    fn handle_message<R: Rng>(
        &mut self,
        sender_id: &Self::NodeId,
        message: Message,
        _rng: &mut R,
    ) -> Result<Step<N>> {
        self.handle_message(sender_id, message)
    }

    fn terminated(&self) -> bool {
        self.decided
    }

    fn our_id(&self) -> &N {
        self.netinfo.our_id()
    }
}

impl<N: NodeIdT> Broadcast<N> {
    /// Creates a new broadcast instance to be used by node `our_id` which expects a value proposal
    /// from node `proposer_id`.
    pub fn new(netinfo: Arc<NetworkInfo<N>>, proposer_id: N) -> Self {
        Broadcast {
            netinfo,
            proposer_id,
            echo_sent: false,
            ready_sent: false,
            decided: false,
            echos: BTreeMap::new(),
            readys: BTreeMap::new(),
        }
    }

    /// Initiates the broadcast. This must only be called in the proposer node.
    pub fn broadcast(&mut self, input: Vec<u8>) -> Result<Step<N>> {
        if *self.our_id() != self.proposer_id {
            return Err(Error::InstanceCannotPropose);
        }
        if self.echo_sent {
            return Err(Error::MultipleInputs);
        }
        debug!("{} proposing {:0.10}", self, HexFmt(&input));
        self.send_echo(input)
    }

    /// Handles a message received from `sender_id`.
    ///
    /// This must be called with every message we receive from another node.
    pub fn handle_message(&mut self, sender_id: &N, message: Message) -> Result<Step<N>> {
        if !self.netinfo.is_node_validator(sender_id) {
            return Err(Error::UnknownSender);
        }
        match message {
            Message::Echo(payload) => self.handle_echo(sender_id, payload),
            Message::Ready(payload) => self.handle_ready(sender_id, payload),
        }
    }

    /// Returns the proposer's node ID.
    pub fn proposer_id(&self) -> &N {
        &self.proposer_id
    }

    /// Handles a received `Echo` message.
    fn handle_echo(&mut self, sender_id: &N, payload: Vec<u8>) -> Result<Step<N>> {
        let hash = util::digest(&payload);

        // If the sender has already sent `Echo`, ignore.
        if let Some(old_hash) = self.echos.get(sender_id) {
            if *old_hash == hash {
                warn!(
                    "Node {:?} received Echo({:0.10}) multiple times from {:?}.",
                    self.our_id(),
                    HexFmt(&payload),
                    sender_id,
                );
                return Ok(Step::default());
            } else {
                return Ok(Fault::new(sender_id.clone(), FaultKind::MultipleEchos).into());
            }
        }
        self.echos.insert(sender_id.clone(), hash);

        let mut step = Step::default();

        // The proposer's `Echo` carries the value itself; echo it onward once.
        if *sender_id == self.proposer_id && !self.echo_sent {
            step.extend(self.send_echo(payload.clone())?);
        }

        // Upon a quorum of `Echo`s that two different values cannot both reach, multicast `Ready`.
        if !self.ready_sent && self.count_echos(&hash) > self.echo_quorum() {
            step.extend(self.send_ready(payload)?);
        }

        Ok(step)
    }

    /// Handles a received `Ready` message.
    fn handle_ready(&mut self, sender_id: &N, payload: Vec<u8>) -> Result<Step<N>> {
        let hash = util::digest(&payload);

        // If the sender has already sent a `Ready` before, ignore.
        if let Some(old_hash) = self.readys.get(sender_id) {
            if *old_hash == hash {
                warn!(
                    "Node {:?} received Ready({:0.10}) multiple times from {:?}.",
                    self.our_id(),
                    HexFmt(&payload),
                    sender_id,
                );
                return Ok(Step::default());
            } else {
                return Ok(Fault::new(sender_id.clone(), FaultKind::MultipleReadys).into());
            }
        }
        self.readys.insert(sender_id.clone(), hash);

        let mut step = Step::default();

        // Upon f + 1 matching `Ready`s, join in: at least one correct node is ready.
        if !self.ready_sent && self.count_readys(&hash) >= self.netinfo.num_faulty() + 1 {
            step.extend(self.send_ready(payload.clone())?);
        }

        // Upon 2 f + 1 matching `Ready`s, deliver the value exactly once.
        if !self.decided && self.count_readys(&hash) >= 2 * self.netinfo.num_faulty() + 1 {
            self.decided = true;
            debug!("{} delivered {:0.10}", self, HexFmt(&payload));
            step.output.push(payload);
        }

        Ok(step)
    }

    /// Multicasts an `Echo` of the payload and handles our own copy. Does nothing if we are only
    /// an observer.
    fn send_echo(&mut self, payload: Vec<u8>) -> Result<Step<N>> {
        self.echo_sent = true;
        if !self.netinfo.is_validator() {
            return Ok(Step::default());
        }
        let step: Step<N> = Target::All.message(Message::Echo(payload.clone())).into();
        let our_id = &self.our_id().clone();
        Ok(step.join(self.handle_echo(our_id, payload)?))
    }

    /// Multicasts a `Ready` for the payload and handles our own copy. Does nothing if we are only
    /// an observer.
    fn send_ready(&mut self, payload: Vec<u8>) -> Result<Step<N>> {
        self.ready_sent = true;
        if !self.netinfo.is_validator() {
            return Ok(Step::default());
        }
        let step: Step<N> = Target::All.message(Message::Ready(payload.clone())).into();
        let our_id = &self.our_id().clone();
        Ok(step.join(self.handle_ready(our_id, payload)?))
    }

    /// The number of `Echo` senders that both of two different payloads could reach at once.
    /// Strictly more rules out a second quorum even with f equivocating senders.
    fn echo_quorum(&self) -> usize {
        (self.netinfo.num_nodes() + self.netinfo.num_faulty()) / 2
    }

    /// Returns the number of nodes that have sent us an `Echo` message with this digest.
    fn count_echos(&self, hash: &Digest) -> usize {
        self.echos.values().filter(|h| *h == hash).count()
    }

    /// Returns the number of nodes that have sent us a `Ready` message with this digest.
    fn count_readys(&self, hash: &Digest) -> usize {
        self.readys.values().filter(|h| *h == hash).count()
    }
}

impl<N: NodeIdT> fmt::Display for Broadcast<N> {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        write!(f, "{:?} Broadcast({:?})", self.our_id(), self.proposer_id)
    }
}
