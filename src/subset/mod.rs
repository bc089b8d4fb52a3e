//! # Common subset
//!
//! The Subset protocol assumes a network of _N_ nodes that send signed messages to each other,
//! with at most _f_ of them faulty, where _3 f < N_. Handling the networking and signing is the
//! responsibility of the user: only when a message has been verified to be "from node i" can it
//! be handed to the `Subset` instance.
//!
//! Each proposer's value reaches the participants through reliable broadcast; the caller feeds
//! every delivered value into its `Subset` instance. The protocol guarantees that all correct
//! nodes output the same set, consisting of at least _N - f_ of the proposed values. This is the
//! composition step of Ben-Or, Kelmer and Rabin.
//!
//! ## How it works
//!
//! * `Subset` instantiates one Binary Agreement per participating proposer, to decide whether
//!   that proposer's value should be included in the set. The agreement instance identifiers are
//!   derived deterministically from the `Subset` instance ID and the proposer ID, so all
//!   participants agree on them without communication.
//! * Whenever a proposer's value is delivered by broadcast, the caller submits it and `1` (accept)
//!   is input into the corresponding agreement instance.
//! * When _N - f_ agreement instances have decided "yes" for a slot with a delivered value, we
//!   input `0` (reject) into the remaining ones, where we haven't provided input yet. The subset
//!   is already large enough, so the stragglers can be cut off without losing liveness.
//! * Once all agreement instances have decided, `Subset` has output the values of all accepted
//!   slots and finishes with a `Done` marker.

mod error;
mod proposal_state;
mod subset;

use serde::{Deserialize, Serialize};

use crate::binary_agreement;

pub use self::error::{Error, FaultKind, Result};
pub use self::subset::{Step, Subset, SubsetOutput};

/// Message from Subset to remote nodes.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Message<N> {
    /// The proposer whose slot this message is about.
    pub proposer_id: N,
    /// The wrapped agreement message, deciding whether to accept the slot's value.
    pub content: binary_agreement::Message,
}

impl<N> Message<N> {
    /// Returns a `Message` with this content and the specified proposer ID.
    fn new(proposer_id: N, content: binary_agreement::Message) -> Self {
        Message {
            proposer_id,
            content,
        }
    }
}
