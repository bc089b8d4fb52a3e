//! # BKR Asynchronous Common Subset
//!
//! An implementation of the asynchronous, Byzantine fault tolerant agreement stack of Ben-Or,
//! Kelmer and Rabin: randomized binary agreement in the style of Mostéfaoui, Moumen and Raynal,
//! Bracha's reliable broadcast, and their composition into a common subset. The algorithms are
//! correct in the fully asynchronous model: they make no timing assumptions, and tolerate up to
//! _f_ arbitrarily misbehaving nodes out of _N_, as long as _3 f < N_.
//!
//! ## Protocols
//!
//! * [`broadcast`]: a proposer disseminates an opaque value; all correct nodes deliver the same
//!   value or none at all.
//! * [`binary_agreement`]: every node inputs a `bool`; all correct nodes output the same `bool`,
//!   which was input by at least one correct node. Termination is randomized through a common
//!   coin, an external oracle that returns the same unpredictable bit to all correct nodes per
//!   seed (in production a threshold pseudorandom function; any implementation of the
//!   request/reply contract works).
//! * [`subset`]: one binary agreement per proposer decides which broadcast values enter the
//!   common subset; all correct nodes output the same set of at least _N - f_ values.
//!
//! ## Usage
//!
//! The protocol instances are state machines, driven by the embedding application: it decodes and
//! verifies the sender of every incoming message, hands it to the instance, and sends out, routes
//! and delivers whatever the returned [`Step`] contains. Messages must be delivered eventually
//! between correct nodes, but may be arbitrarily reordered or delayed; the protocols are
//! designed for an asynchronous network. Coin requests appearing in a step's output are answered
//! by calling the instance's `handle_coin` with the oracle's reply, at any later point.
//!
//! This crate does not contain a transport, persistence, or the coin oracle's cryptography: the
//! embedding application provides authenticated point-to-point channels and a coin
//! implementation, and feeds the instances accordingly.

#![warn(missing_docs)]

pub mod binary_agreement;
pub mod broadcast;
pub mod codec;
mod fault_log;
mod instance_id;
mod network_info;
pub mod subset;
mod traits;
pub mod util;

pub use crate::fault_log::{Fault, FaultLog};
pub use crate::instance_id::{CoinSeed, InstanceId};
pub use crate::network_info::NetworkInfo;
pub use crate::traits::{
    ConsensusProtocol, CpStep, FaultT, Message, NodeIdT, Step, Target, TargetedMessage,
};
