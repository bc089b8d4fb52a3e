use std::result;

use thiserror::Error as ThisError;

/// A broadcast error.
#[derive(Clone, Eq, PartialEq, Debug, ThisError)]
pub enum Error {
    /// Only the proposer may start the broadcast.
    #[error("Instance cannot propose")]
    InstanceCannotPropose,
    /// A value was input more than once.
    #[error("Multiple inputs received")]
    MultipleInputs,
    /// A message was received from a node that is not a validator.
    #[error("Unknown message sender")]
    UnknownSender,
}

/// A broadcast result.
pub type Result<T> = result::Result<T, Error>;

/// Represents each reason why a broadcast message could be faulty.
#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum FaultKind {
    /// `Broadcast` received multiple different `Echo`s from the same sender.
    #[error("`Broadcast` received multiple different `Echo`s from the same sender.")]
    MultipleEchos,
    /// `Broadcast` received multiple different `Ready`s from the same sender.
    #[error("`Broadcast` received multiple different `Ready`s from the same sender.")]
    MultipleReadys,
}
