//! # Reliable broadcast
//!
//! The Broadcast protocol lets one node, the _proposer_, disseminate an opaque value to the
//! network, such that all correct nodes deliver the same value, or none at all, even if the
//! proposer is faulty.
//!
//! ## How it works
//!
//! This is Bracha's echo protocol, counting messages by the 128-bit digest of their payload:
//!
//! * The proposer multicasts its value as an `Echo`. Every correct node that receives the
//!   proposer's `Echo` multicasts its own `Echo` of the value.
//!
//! * A node that has received `Echo`es with the same digest from more than `(N + f) / 2` distinct
//!   senders, a quorum that two different values cannot both reach, multicasts `Ready` for
//!   that value.
//!
//! * A node that has received _f + 1_ matching `Ready`s knows at least one correct node is ready,
//!   and multicasts `Ready` itself if it has not done so. Upon _2 f + 1_ matching `Ready`s, the
//!   value is delivered, exactly once.
//!
//! The `Ready` amplification guarantees totality: if any correct node delivers, its _2 f + 1_
//! `Ready`s include _f + 1_ correct senders, which every correct node eventually hears, so every
//! correct node eventually reaches the delivery quorum as well.

mod broadcast;
mod error;
mod message;

pub use self::broadcast::{Broadcast, Step};
pub use self::error::{Error, FaultKind, Result};
pub use self::message::Message;
