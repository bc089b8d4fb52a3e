use std::mem;

use crate::binary_agreement::{self, BinaryAgreement};
use crate::instance_id::CoinSeed;
use crate::NodeIdT;

use super::{Error, FaultKind, Result};

/// A proposal-acceptor step. Messages are the slot's agreement messages; outputs report coin
/// requests and the slot's completion.
pub type Step<N> = crate::Step<binary_agreement::Message, ProposalOutput, N, FaultKind>;

/// Progress of one proposer slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProposalOutput {
    /// The slot's agreement instance asked for a coin toss.
    CoinRequest(CoinSeed),
    /// The slot's agreement finalized: the accepted value, or `None` if the slot stays empty.
    Complete(Option<Vec<u8>>),
}

/// The state of a single proposer's slot: the agreement deciding whether to accept the value,
/// and the value itself once it has been delivered.
#[derive(Debug)]
pub enum ProposalState<N> {
    /// No value delivered yet; the agreement is still running.
    Ongoing(BinaryAgreement<N>),
    /// The value was delivered and `1` was proposed; awaiting the agreement's decision.
    HasValue(Vec<u8>, BinaryAgreement<N>),
    /// The agreement finalized. The flag is `true` iff the slot was accepted with a value.
    Complete(bool),
}

impl<N: NodeIdT> ProposalState<N> {
    /// Creates a new `ProposalState::Ongoing` with the given agreement instance.
    pub fn new(agreement: BinaryAgreement<N>) -> Self {
        ProposalState::Ongoing(agreement)
    }

    /// Returns `true` if this slot was accepted with a value.
    pub fn accepted(&self) -> bool {
        match self {
            ProposalState::Ongoing(_) | ProposalState::HasValue(_, _) => false,
            ProposalState::Complete(accepted) => *accepted,
        }
    }

    /// Returns `true` if this slot's agreement has finalized.
    pub fn complete(&self) -> bool {
        match self {
            ProposalState::Ongoing(_) | ProposalState::HasValue(_, _) => false,
            ProposalState::Complete(_) => true,
        }
    }

    /// Returns `true` if an estimate has been input into this slot's agreement.
    pub fn has_proposed(&self) -> bool {
        match self {
            ProposalState::Ongoing(agreement) => !agreement.can_propose(),
            ProposalState::HasValue(_, _) | ProposalState::Complete(_) => true,
        }
    }

    /// Stores the proposer's delivered value and votes to accept it.
    pub fn submit(&mut self, value: Vec<u8>) -> Result<Step<N>> {
        let state = mem::replace(self, ProposalState::Complete(false));
        *self = match state {
            ProposalState::Ongoing(agreement) => ProposalState::HasValue(value, agreement),
            other => other,
        };
        self.apply(|agreement| agreement.propose(true))
    }

    /// Votes for rejecting the proposal, if no estimate has been input yet.
    pub fn reject(&mut self) -> Result<Step<N>> {
        if self.has_proposed() {
            return Ok(Step::default());
        }
        self.apply(|agreement| agreement.propose(false))
    }

    /// Handles a message received from `sender_id`.
    pub fn handle_message(&mut self, sender_id: &N, msg: binary_agreement::Message) -> Result<Step<N>> {
        self.apply(|agreement| agreement.handle_message(sender_id, msg))
    }

    /// Feeds a coin value into the slot's agreement.
    pub fn handle_coin(&mut self, seed: &CoinSeed, value: bool) -> Result<Step<N>> {
        self.apply(|agreement| agreement.handle_coin(seed, value))
    }

    /// Applies `f` to the agreement instance, and updates the state according to the outcome.
    fn apply<F>(&mut self, f: F) -> Result<Step<N>>
    where
        F: FnOnce(&mut BinaryAgreement<N>) -> binary_agreement::Result<binary_agreement::Step<N>>,
    {
        // Temporary value: We need to take ownership of the state to make it transition.
        let state = mem::replace(self, ProposalState::Complete(false));
        let (value, mut agreement) = match state {
            ProposalState::Ongoing(agreement) => (None, agreement),
            ProposalState::HasValue(value, agreement) => (Some(value), agreement),
            state @ ProposalState::Complete(_) => {
                *self = state;
                return Ok(Step::default());
            }
        };

        let result = f(&mut agreement);
        let mut step = Step::default();
        let mut decision = None;
        match result {
            Ok(agreement_step) => {
                let outputs =
                    step.extend_with(agreement_step, FaultKind::AgreementFault, |msg| msg);
                for output in outputs {
                    match output {
                        binary_agreement::Output::CoinRequest(seed) => {
                            step.output.push(ProposalOutput::CoinRequest(seed));
                        }
                        binary_agreement::Output::Decision(b) => decision = Some(b),
                    }
                }
            }
            Err(err) => {
                *self = Self::reassemble(value, agreement);
                return Err(Error::HandleAgreement(err));
            }
        }

        match decision {
            Some(true) => {
                *self = ProposalState::Complete(value.is_some());
                Ok(step.with_output(ProposalOutput::Complete(value)))
            }
            Some(false) => {
                *self = ProposalState::Complete(false);
                Ok(step.with_output(ProposalOutput::Complete(None)))
            }
            None => {
                *self = Self::reassemble(value, agreement);
                Ok(step)
            }
        }
    }

    fn reassemble(value: Option<Vec<u8>>, agreement: BinaryAgreement<N>) -> Self {
        match value {
            Some(value) => ProposalState::HasValue(value, agreement),
            None => ProposalState::Ongoing(agreement),
        }
    }
}
