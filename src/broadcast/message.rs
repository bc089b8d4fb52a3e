use std::fmt::{self, Debug};

use hex_fmt::HexFmt;
use rand::distributions::{Distribution, Standard};
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

/// The two kinds of message sent during the reliable broadcast. The payload bytes are opaque to
/// the protocol; messages are counted by payload digest.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Message {
    /// A copy of the proposer's value. The proposer's own `Echo` disseminates the value; every
    /// other validator echoes it back once.
    Echo(Vec<u8>),
    /// Indicates that the sender knows that every correct node will eventually deliver this
    /// value.
    Ready(Vec<u8>),
}

// A random generation impl is provided for test cases. Unfortunately `#[cfg(test)]` does not work
// for integration tests.
impl Distribution<Message> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Message {
        let message_type = *["echo", "ready"].choose(rng).unwrap();

        let mut payload = [0; 32];
        rng.fill_bytes(&mut payload);

        match message_type {
            "echo" => Message::Echo(payload.to_vec()),
            "ready" => Message::Ready(payload.to_vec()),
            _ => unreachable!(),
        }
    }
}

impl Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Message::Echo(payload) => write!(f, "Echo({:0.10})", HexFmt(payload)),
            Message::Ready(payload) => write!(f, "Ready({:0.10})", HexFmt(payload)),
        }
    }
}
