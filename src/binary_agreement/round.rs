//! # One round of randomized binary agreement
//!
//! This performs the `BVal` and `Aux` threshold steps for a single round of `BinaryAgreement`,
//! and gates the request for the round's common coin.
//!
//! Validators seed the round with their current estimate as a `BVal`. A value `b` enters the
//! round's _binary values_ once `BVal(b)` has been received from _N - f_ distinct validators.
//! Receiving _f + 1_ `BVal(b)` guarantees at least one correct sender, so the round echoes its own
//! `BVal(b)` even if `b` was not proposed locally. When the binary values gain their first entry
//! `b`, the round broadcasts `Aux(b)` as a witness. Once `Aux` messages from _N - f_ distinct
//! validators have arrived and at least one value is both a binary value and witnessed by an
//! `Aux`, the round asks for the common coin; the coin value then determines the next round's
//! estimate, and whether the instance decides.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::distributions::{Distribution, Standard};
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

use super::bin_values::{self, BinValues};
use super::bool_multimap::BoolMultimap;
use super::{Error, FaultKind, Result};
use crate::fault_log::Fault;
use crate::{NetworkInfo, NodeIdT, Target};

/// A `Round` step. An output signals that the round is ready to consult the common coin.
pub type Step<N> = crate::Step<Message, CoinRequest, N, FaultKind>;

/// A message belonging to one round of binary agreement.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Message {
    /// Contains the sender's estimate for the round.
    BVal(bool),
    /// A witness that the sender has accepted the value into its binary values.
    Aux(bool),
}

// A random generation impl is provided for test cases. Unfortunately `#[cfg(test)]` does not work
// for integration tests.
impl Distribution<Message> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Message {
        let message_type = *["bval", "aux"].choose(rng).unwrap();

        match message_type {
            "bval" => Message::BVal(rng.gen()),
            "aux" => Message::Aux(rng.gen()),
            _ => unreachable!(),
        }
    }
}

/// The one-shot signal that the round has gathered enough `Aux` witnesses to consult the common
/// coin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoinRequest;

/// The result of feeding the coin value into a round: the estimate to carry into the next round,
/// and whether that estimate was decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundTransition {
    /// The next round's estimate.
    pub estimate: bool,
    /// Whether the estimate is the instance's decision value.
    pub decided: bool,
}

/// The state of a single binary agreement round.
#[derive(Debug)]
pub struct Round<N> {
    /// Shared network information.
    netinfo: Arc<NetworkInfo<N>>,
    /// The set of values for which _N - f_ `BVal`s have been received.
    bin_values: BinValues,
    /// The values `b` for which we already sent `BVal(b)`.
    sent_bval: BinValues,
    /// The values that appeared in at least one received `Aux`.
    aux_vals: BinValues,
    /// The nodes that sent us a `BVal(b)`, by `b`.
    received_bval: BoolMultimap<N>,
    /// The nodes that sent us an `Aux`, and the value each one witnessed.
    received_aux: BTreeMap<N, bool>,
    /// Whether this round has already asked for its coin.
    has_requested_coin: bool,
}

impl<N: NodeIdT> Round<N> {
    /// Creates a fresh round with no recorded messages.
    pub fn new(netinfo: Arc<NetworkInfo<N>>) -> Self {
        Round {
            netinfo,
            bin_values: bin_values::NONE,
            sent_bval: bin_values::NONE,
            aux_vals: bin_values::NONE,
            received_bval: BoolMultimap::default(),
            received_aux: BTreeMap::new(),
            has_requested_coin: false,
        }
    }

    /// Seeds the round with our own estimate, multicasting `BVal(est)`.
    ///
    /// Returns an error if we already sent `BVal(est)`, e.g. because the amplification step
    /// triggered first.
    pub fn propose(&mut self, est: bool) -> Result<Step<N>> {
        if self.sent_bval.contains(est) {
            return Err(Error::AlreadyProposed);
        }
        self.send_bval(est)
    }

    /// Returns `true` if we have already sent `BVal(b)` in this round.
    pub fn has_sent_bval(&self, b: bool) -> bool {
        self.sent_bval.contains(b)
    }

    /// Handles a round message received from `sender_id`.
    pub fn handle_message(&mut self, sender_id: &N, msg: &Message) -> Result<Step<N>> {
        match *msg {
            Message::BVal(b) => self.handle_bval(sender_id, b),
            Message::Aux(b) => self.handle_aux(sender_id, b),
        }
    }

    /// Handles a `BVal(b)` message.
    ///
    /// Upon receiving _f + 1_ `BVal(b)`, multicasts `BVal(b)`. Upon receiving _N - f_ `BVal(b)`,
    /// updates the binary values. When the binary values get their first entry, multicasts
    /// `Aux(b)`.
    pub fn handle_bval(&mut self, sender_id: &N, b: bool) -> Result<Step<N>> {
        let count_bval = {
            if !self.received_bval[b].insert(sender_id.clone()) {
                return Ok(Fault::new(sender_id.clone(), FaultKind::DuplicateBVal).into());
            }
            self.received_bval[b].len()
        };

        let mut step = Step::default();

        if count_bval == self.netinfo.num_faulty() + 1 && !self.sent_bval.contains(b) {
            step.extend(self.send_bval(b)?);
        }

        if count_bval == self.netinfo.num_correct() {
            self.bin_values.insert(b);
            if !self.bin_values.is_both() {
                // First entry: witness it with an `Aux(b)`.
                step.extend(self.send(&Message::Aux(b))?);
            }
            step.extend(self.try_request_coin());
        }

        Ok(step)
    }

    /// Handles an `Aux(b)` message. At most one `Aux` per sender is accepted.
    pub fn handle_aux(&mut self, sender_id: &N, b: bool) -> Result<Step<N>> {
        if self.received_aux.contains_key(sender_id) {
            return Ok(Fault::new(sender_id.clone(), FaultKind::DuplicateAux).into());
        }
        self.received_aux.insert(sender_id.clone(), b);
        self.aux_vals.insert(b);
        Ok(self.try_request_coin())
    }

    /// Feeds the value of this round's coin, and computes the round transition.
    ///
    /// Returns an error if the round has not requested its coin.
    pub fn handle_coin(&mut self, coin: bool) -> Result<RoundTransition> {
        if !self.has_requested_coin {
            return Err(Error::CoinNotRequested);
        }
        // If exactly one value is both a binary value and witnessed, it is the next estimate, and
        // the instance decides iff the coin agrees. Otherwise the coin itself is the estimate.
        Ok(match self.candidate_values().definite() {
            Some(b) => RoundTransition {
                estimate: b,
                decided: b == coin,
            },
            None => RoundTransition {
                estimate: coin,
                decided: false,
            },
        })
    }

    /// Multicasts a `BVal(b)` message unless it was already sent, and handles it.
    fn send_bval(&mut self, b: bool) -> Result<Step<N>> {
        if !self.sent_bval.insert(b) {
            return Ok(Step::default());
        }
        self.send(&Message::BVal(b))
    }

    /// Multicasts and handles a message. Does nothing if we are only an observer.
    fn send(&mut self, msg: &Message) -> Result<Step<N>> {
        if !self.netinfo.is_validator() {
            return Ok(Step::default());
        }
        let step: Step<N> = Target::All.message(*msg).into();
        let our_id = &self.netinfo.our_id().clone();
        Ok(step.join(self.handle_message(our_id, msg)?))
    }

    /// Requests the coin if the round just became eligible: `Aux` messages from _N - f_ distinct
    /// senders, and a non-empty candidate set. The request is made at most once.
    fn try_request_coin(&mut self) -> Step<N> {
        if self.has_requested_coin
            || self.received_aux.len() < self.netinfo.num_correct()
            || self.candidate_values().is_empty()
        {
            return Step::default();
        }
        self.has_requested_coin = true;
        Step::default().with_output(CoinRequest)
    }

    /// The set of values that are binary values and have been witnessed by at least one `Aux`.
    fn candidate_values(&self) -> BinValues {
        let mut values = bin_values::NONE;
        for b in self.bin_values {
            if self.aux_vals.contains(b) {
                values.insert(b);
            }
        }
        values
    }
}
