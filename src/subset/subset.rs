use std::collections::BTreeMap;
use std::sync::Arc;
use std::{fmt, result};

use derivative::Derivative;
use hex_fmt::HexFmt;
use log::debug;
use rand::Rng;
use serde::Serialize;

use super::proposal_state::{ProposalOutput, ProposalState, Step as ProposalStep};
use super::{Error, FaultKind, Message, Result};
use crate::binary_agreement::BinaryAgreement;
use crate::instance_id::{CoinSeed, InstanceId};
use crate::{util, ConsensusProtocol, NetworkInfo, NodeIdT};

/// A `Subset` step, possibly containing several outputs.
pub type Step<N> = crate::Step<Message<N>, SubsetOutput<N>, N, FaultKind>;

/// An output with an accepted value, a coin request, or the end of the set.
#[derive(Derivative, Clone, PartialEq, Eq)]
#[derivative(Debug)]
pub enum SubsetOutput<N> {
    /// A proposer's value was accepted into the set.
    Contribution(
        N,
        #[derivative(Debug(format_with = "util::fmt_hex"))] Vec<u8>,
    ),
    /// One of the slots' agreement instances asks the common-coin oracle for a toss. The reply
    /// must be fed back via `Subset::handle_coin`.
    CoinRequest(CoinSeed),
    /// The set is complete.
    Done,
}

/// Subset algorithm instance.
#[derive(Debug)]
pub struct Subset<N> {
    /// Shared network information.
    netinfo: Arc<NetworkInfo<N>>,
    /// The identifier of this subset run.
    instance_id: InstanceId,
    /// A map that assigns to each proposer the progress of their slot.
    proposal_states: BTreeMap<N, ProposalState<N>>,
    /// The proposer of each slot, by the slot's agreement instance identifier. Used to route coin
    /// replies.
    agreement_ids: BTreeMap<InstanceId, N>,
    /// Whether the rejection of the undecided slots has been triggered. Latched so the rule fires
    /// at most once.
    rejection_sent: bool,
    /// Whether the instance has output `Done`.
    decided: bool,
}

impl<N: NodeIdT + Serialize> ConsensusProtocol for Subset<N> {
    type NodeId = N;
    type Input = (N, Vec<u8>);
    type Output = SubsetOutput<N>;
    type Message = Message<N>;
    type Error = Error;
    type FaultKind = FaultKind;

    fn handle_input<R: Rng>(&mut self, input: Self::Input, _rng: &mut R) -> Result<Step<N>> {
        let (proposer_id, value) = input;
        self.submit(&proposer_id, value)
    }

    fn handle_message<R: Rng>(
        &mut self,
        sender_id: &N,
        message: Message<N>,
        _rng: &mut R,
    ) -> Result<Step<N>> {
        self.handle_message(sender_id, message)
    }

    fn terminated(&self) -> bool {
        self.decided
    }

    fn our_id(&self) -> &Self::NodeId {
        self.netinfo.our_id()
    }
}

impl<N: NodeIdT + Serialize> Subset<N> {
    /// Creates a new `Subset` instance with the given instance identifier.
    ///
    /// If multiple `Subset`s are instantiated within a single network, they must use different
    /// instance identifiers to foil replay attacks.
    pub fn new(netinfo: Arc<NetworkInfo<N>>, instance_id: InstanceId) -> Result<Self> {
        let mut proposal_states = BTreeMap::new();
        let mut agreement_ids = BTreeMap::new();
        for proposer_id in netinfo.all_ids() {
            let material = bincode::serialize(proposer_id)
                .map_err(|err| Error::SerializeProposer(format!("{:?}", err)))?;
            let agreement_id = InstanceId::derive(&instance_id, &material);
            let agreement = BinaryAgreement::new(netinfo.clone(), agreement_id);
            agreement_ids.insert(agreement_id, proposer_id.clone());
            proposal_states.insert(proposer_id.clone(), ProposalState::new(agreement));
        }

        Ok(Subset {
            netinfo,
            instance_id,
            proposal_states,
            agreement_ids,
            rejection_sent: false,
            decided: false,
        })
    }

    /// Submits a proposer's value, delivered by reliable broadcast, and votes to accept it.
    ///
    /// Returns an error if a vote for this slot was already cast.
    pub fn submit(&mut self, proposer_id: &N, value: Vec<u8>) -> Result<Step<N>> {
        debug!("{} got {:0.10} from {:?}", self, HexFmt(&value), proposer_id);
        let prop_step = self
            .proposal_states
            .get_mut(proposer_id)
            .ok_or(Error::UnknownProposer)?
            .submit(value)?;
        let step = Self::convert_step(proposer_id, prop_step);
        Ok(step.join(self.try_output()?))
    }

    /// Handles a message received from `sender_id`.
    ///
    /// This must be called with every message we receive from another node.
    pub fn handle_message(&mut self, sender_id: &N, msg: Message<N>) -> Result<Step<N>> {
        let prop_step = self
            .proposal_states
            .get_mut(&msg.proposer_id)
            .ok_or(Error::UnknownProposer)?
            .handle_message(sender_id, msg.content)?;
        let step = Self::convert_step(&msg.proposer_id, prop_step);
        Ok(step.join(self.try_output()?))
    }

    /// Feeds the oracle's reply to a coin request back into the requesting slot's agreement.
    pub fn handle_coin(&mut self, seed: &CoinSeed, value: bool) -> Result<Step<N>> {
        let proposer_id = self
            .agreement_ids
            .get(&seed.instance_id())
            .ok_or(Error::UnknownInstance)?
            .clone();
        let prop_step = self
            .proposal_states
            .get_mut(&proposer_id)
            .ok_or(Error::UnknownProposer)?
            .handle_coin(seed, value)?;
        let step = Self::convert_step(&proposer_id, prop_step);
        Ok(step.join(self.try_output()?))
    }

    /// Converts a proposal step into a step of the whole subset run.
    fn convert_step(proposer_id: &N, prop_step: ProposalStep<N>) -> Step<N> {
        let mut step = Step::default();
        let from_p_msg = |content| Message::new(proposer_id.clone(), content);
        for output in step.extend_with(prop_step, |fault| fault, from_p_msg) {
            match output {
                ProposalOutput::CoinRequest(seed) => {
                    step.output.push(SubsetOutput::CoinRequest(seed));
                }
                ProposalOutput::Complete(Some(value)) => {
                    step.output
                        .push(SubsetOutput::Contribution(proposer_id.clone(), value));
                }
                ProposalOutput::Complete(None) => {}
            }
        }
        step
    }

    /// Returns the number of slots that were accepted with a value.
    fn count_accepted(&self) -> usize {
        let accepted = |state: &&ProposalState<N>| state.accepted();
        self.proposal_states.values().filter(accepted).count()
    }

    /// Checks the voting and termination conditions: once enough slots have been accepted, votes
    /// "no" for the remaining ones. When all slots have decided, outputs `Done`.
    fn try_output(&mut self) -> Result<Step<N>> {
        if self.decided {
            return Ok(Step::default());
        }
        let mut step = Step::default();
        if !self.rejection_sent && self.count_accepted() >= self.netinfo.num_correct() {
            self.rejection_sent = true;
            debug!("{} rejecting the remaining slots", self);
            for (proposer_id, state) in &mut self.proposal_states {
                if !state.has_proposed() {
                    step.extend(Self::convert_step(proposer_id, state.reject()?));
                }
            }
        }
        if self.proposal_states.values().all(ProposalState::complete) {
            self.decided = true;
            debug!("{} done", self);
            step.output.push(SubsetOutput::Done);
        }
        Ok(step)
    }
}

impl<N: NodeIdT + Serialize> fmt::Display for Subset<N> {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        write!(f, "{:?} Subset({})", self.our_id(), self.instance_id)
    }
}
