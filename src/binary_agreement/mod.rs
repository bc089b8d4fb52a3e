//! # Binary Agreement
//!
//! The Binary Agreement protocol allows each node to input one binary (`bool`) value, and will
//! output a binary value. The output is guaranteed to have been input by at least one correct
//! node, and all correct nodes will have the same output.
//!
//! ## How it works
//!
//! The algorithm proceeds in numbered _rounds_, in the style of Mostéfaoui, Moumen and Raynal.
//! The number of rounds it takes until it terminates is unbounded in theory but has a finite
//! expected value. Each node keeps track of an _estimate_ value `e`, initialized to the node's
//! own input.
//!
//! * At the beginning of each round, we multicast `BVal(e)`.
//!
//! * Once we receive `BVal(b)` with the same value from _f + 1_ different validators, at least
//!   one of them is correct, so we multicast `BVal(b)` ourselves if we haven't yet. Once we
//!   receive it from _N - f_ validators, `b` enters our set of _binary values_; when that set
//!   gains its first entry we multicast `Aux(b)` as a witness.
//!
//! * Once `Aux` messages from _N - f_ distinct validators have arrived and at least one value is
//!   both a binary value and witnessed, the round consults the common coin: an oracle that
//!   returns the same unpredictable bit to every correct node for the round's seed. If exactly
//!   one value `b` is a candidate, `b` becomes the next estimate, and if the coin agrees with
//!   `b`, we have decided; otherwise the coin value becomes the next estimate, and the next round
//!   begins.
//!
//! A locally decided node keeps seeding subsequent rounds with its estimate, so that nodes which
//! have not yet decided are never starved of `BVal` and `Aux` messages. The decision itself is
//! committed through a separate echo exchange: every decided node multicasts its decision, _f+1_
//! matching decision echoes are amplified, and _2 f + 1_ matching echoes finalize the one-shot
//! output. See the [`round`] and [`termination`] module documentation for the details of each
//! part.

pub mod bin_values;
mod binary_agreement;
mod bool_multimap;
pub mod round;
mod termination;

use rand::distributions::{Distribution, Standard};
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

use crate::instance_id::CoinSeed;

pub use self::binary_agreement::BinaryAgreement;
pub use self::round::Message as RoundMessage;

/// A `BinaryAgreement` error.
#[derive(Clone, Eq, PartialEq, Debug, ThisError)]
pub enum Error {
    /// An estimate was proposed to an instance or round that already sent one.
    #[error("Estimate already proposed")]
    AlreadyProposed,
    /// A message was received from a node that is not a validator.
    #[error("Unknown message sender")]
    UnknownSender,
    /// A coin value was submitted with a seed belonging to a different instance.
    #[error("Coin seed belongs to a different instance")]
    CoinInstanceMismatch,
    /// A coin value was submitted to a round that has not requested its coin.
    #[error("Coin value submitted without a coin request")]
    CoinNotRequested,
}

/// A `BinaryAgreement` result.
pub type Result<T> = std::result::Result<T, Error>;

/// A faulty Binary Agreement message received from a peer.
#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum FaultKind {
    /// `BinaryAgreement` received a duplicate `BVal` message.
    #[error("`BinaryAgreement` received a duplicate `BVal` message.")]
    DuplicateBVal,
    /// `BinaryAgreement` received a duplicate `Aux` message.
    #[error("`BinaryAgreement` received a duplicate `Aux` message.")]
    DuplicateAux,
    /// `BinaryAgreement` received a second decision echo from the same sender.
    #[error("`BinaryAgreement` received a second decision echo from the same sender.")]
    DuplicateDecision,
    /// `BinaryAgreement` received a message with a round too far ahead.
    #[error("`BinaryAgreement` received a message with a round too far ahead.")]
    RoundTooFarAhead,
}

/// A `BinaryAgreement` step, containing at most one decision.
pub type Step<N> = crate::Step<Message, Output, N, FaultKind>;

/// Messages sent between `BinaryAgreement` instances.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Message {
    /// A `BVal` or `Aux` message belonging to the given round.
    Round(u16, RoundMessage),
    /// A decision echo for the termination exchange.
    Term(bool),
}

// A random generation impl is provided for test cases. Unfortunately `#[cfg(test)]` does not work
// for integration tests.
impl Distribution<Message> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Message {
        let message_type = *["round", "term"].choose(rng).unwrap();

        match message_type {
            "round" => Message::Round(rng.gen(), rng.gen()),
            "term" => Message::Term(rng.gen()),
            _ => unreachable!(),
        }
    }
}

/// Progress events emitted by a `BinaryAgreement` instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Output {
    /// The instance asks the common-coin oracle for the toss identified by the seed. The reply
    /// must be fed back via `BinaryAgreement::handle_coin`.
    CoinRequest(CoinSeed),
    /// The finalized decision. Emitted exactly once.
    Decision(bool),
}
