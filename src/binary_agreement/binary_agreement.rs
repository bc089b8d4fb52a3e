use std::collections::BTreeMap;
use std::sync::Arc;
use std::{fmt, result};

use log::debug;
use rand::Rng;

use super::round::{self, CoinRequest, Round};
use super::termination::Termination;
use super::{Error, FaultKind, Message, Output, Result, Step};
use crate::fault_log::Fault;
use crate::instance_id::{CoinSeed, InstanceId};
use crate::{ConsensusProtocol, NetworkInfo, NodeIdT};

/// The maximum number of rounds ahead of our own for which incoming messages are accepted.
const MAX_FUTURE_ROUNDS: u16 = 1000;

/// Binary Agreement instance.
///
/// Rounds are allocated lazily, on the first message or proposal that references them, and every
/// message carries the number of the round it belongs to. The instance requests one coin toss per
/// round, identified by a seed derived from the instance ID and the round number; the oracle's
/// reply is fed back in through [`BinaryAgreement::handle_coin`].
#[derive(Debug)]
pub struct BinaryAgreement<N> {
    /// Shared network information.
    netinfo: Arc<NetworkInfo<N>>,
    /// The identifier of this instance, distinguishing it from concurrent runs and determining
    /// its coin seeds.
    instance_id: InstanceId,
    /// The per-round state, allocated on first reference.
    rounds: BTreeMap<u16, Round<N>>,
    /// The latest round we have proposed an estimate in.
    round: u16,
    /// The value input to this instance, if any. Latches the proposal.
    estimated: Option<bool>,
    /// Whether a round of ours has already decided. The decision is multicast exactly once, but
    /// rounds keep advancing afterwards to unblock peers.
    has_decided: bool,
    /// The decision echo exchange that commits the final output.
    termination: Termination<N>,
}

impl<N: NodeIdT> ConsensusProtocol for BinaryAgreement<N> {
    type NodeId = N;
    type Input = bool;
    type Output = Output;
    type Message = Message;
    type Error = Error;
    type FaultKind = FaultKind;

    fn handle_input<R: Rng>(&mut self, input: Self::Input, _rng: &mut R) -> Result<Step<N>> {
        self.propose(input)
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
        self.termination.decision().is_some()
    }

    fn our_id(&self) -> &Self::NodeId {
        self.netinfo.our_id()
    }
}

impl<N: NodeIdT> BinaryAgreement<N> {
    /// Creates a new `BinaryAgreement` instance with the given identifier. Instances run
    /// concurrently in the same network must use distinct identifiers.
    pub fn new(netinfo: Arc<NetworkInfo<N>>, instance_id: InstanceId) -> Self {
        let termination = Termination::new(netinfo.clone());
        BinaryAgreement {
            netinfo,
            instance_id,
            rounds: BTreeMap::new(),
            round: 0,
            estimated: None,
            has_decided: false,
            termination,
        }
    }

    /// Returns this instance's identifier.
    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    /// Whether we can still input a value.
    pub fn can_propose(&self) -> bool {
        self.estimated.is_none()
    }

    /// Returns the finalized decision, if the instance has terminated.
    pub fn decision(&self) -> Option<bool> {
        self.termination.decision()
    }

    /// Proposes a boolean value for Binary Agreement, seeding round 0.
    ///
    /// If more than two thirds of validators propose the same value, that will eventually be
    /// output. Otherwise either output is possible.
    pub fn propose(&mut self, input: bool) -> Result<Step<N>> {
        if self.estimated.is_some() {
            return Err(Error::AlreadyProposed);
        }
        self.estimated = Some(input);
        debug!("{} proposing {}", self, input);
        self.send_estimate(input, 0)
    }

    /// Handles a message received from `sender_id`.
    ///
    /// This must be called with every message we receive from another node.
    pub fn handle_message(&mut self, sender_id: &N, msg: Message) -> Result<Step<N>> {
        if !self.netinfo.is_node_validator(sender_id) {
            return Err(Error::UnknownSender);
        }
        if self.terminated() {
            // The decision has been committed; 2 f + 1 echoes are on the wire, which is enough
            // for every correct node to finalize without our help.
            return Ok(Step::default());
        }
        match msg {
            Message::Round(r, content) => {
                if r > self.round.saturating_add(MAX_FUTURE_ROUNDS) {
                    return Ok(Fault::new(sender_id.clone(), FaultKind::RoundTooFarAhead).into());
                }
                let round_step = self.round_mut(r).handle_message(sender_id, &content)?;
                Ok(self.convert_round_step(r, round_step))
            }
            Message::Term(b) => Ok(self.handle_term(sender_id, b)),
        }
    }

    /// Feeds the oracle's reply to a coin request back into the requesting round.
    ///
    /// The seed must be one previously emitted by this instance in an
    /// [`Output::CoinRequest`](super::Output).
    pub fn handle_coin(&mut self, seed: &CoinSeed, value: bool) -> Result<Step<N>> {
        if seed.instance_id() != self.instance_id {
            return Err(Error::CoinInstanceMismatch);
        }
        if self.terminated() {
            return Ok(Step::default());
        }
        let r = seed.round();
        let transition = self
            .rounds
            .get_mut(&r)
            .ok_or(Error::CoinNotRequested)?
            .handle_coin(value)?;

        let mut step = Step::default();
        if transition.decided && !self.has_decided {
            self.has_decided = true;
            debug!("{} decided {} in round {}", self, transition.estimate, r);
            // Our own decision echo doubles as the decision multicast.
            let term_step = self.termination.our_decision(transition.estimate);
            step.extend(self.convert_term_step(term_step));
        }
        // Keep seeding the next round even after deciding, so that peers which have not yet
        // decided are never starved.
        if let Some(next) = r.checked_add(1) {
            step.extend(self.send_estimate(transition.estimate, next)?);
        }
        Ok(step)
    }

    /// Seeds round `r` with the estimate `est`, unless that round has already sent `BVal(est)`
    /// through the amplification step.
    fn send_estimate(&mut self, est: bool, r: u16) -> Result<Step<N>> {
        if r > self.round {
            self.round = r;
        }
        let round = self.round_mut(r);
        if round.has_sent_bval(est) {
            return Ok(Step::default());
        }
        let round_step = round.propose(est)?;
        Ok(self.convert_round_step(r, round_step))
    }

    /// Handles a decision echo, and emits the one-shot decision output on finalization.
    fn handle_term(&mut self, sender_id: &N, b: bool) -> Step<N> {
        let term_step = self.termination.handle_decision(sender_id, b);
        self.convert_term_step(term_step)
    }

    /// Returns the round state for round `r`, creating it if necessary.
    fn round_mut(&mut self, r: u16) -> &mut Round<N> {
        let netinfo = &self.netinfo;
        self.rounds
            .entry(r)
            .or_insert_with(|| Round::new(netinfo.clone()))
    }

    /// Annotates a round step's messages with the round number and turns its coin requests into
    /// instance outputs.
    fn convert_round_step(&self, r: u16, round_step: round::Step<N>) -> Step<N> {
        let mut step = Step::default();
        let requests = step.extend_with(round_step, |fault| fault, |msg| Message::Round(r, msg));
        for CoinRequest in requests {
            step.output
                .push(Output::CoinRequest(CoinSeed::new(self.instance_id, r)));
        }
        step
    }

    /// Converts a termination step: echoes become `Term` messages, finalization becomes the
    /// decision output.
    fn convert_term_step(&self, term_step: super::termination::Step<N>) -> Step<N> {
        let mut step = Step::default();
        let finalized = step.extend_with(term_step, |fault| fault, Message::Term);
        for b in finalized {
            debug!("{} finalized decision {}", self, b);
            step.output.push(Output::Decision(b));
        }
        step
    }
}

impl<N: NodeIdT> fmt::Display for BinaryAgreement<N> {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        write!(
            f,
            "{:?} BA {} round {} ({})",
            self.our_id(),
            self.instance_id,
            self.round,
            if self.netinfo.is_validator() {
                "validator"
            } else {
                "observer"
            }
        )
    }
}
