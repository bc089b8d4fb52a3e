use std::result;

use thiserror::Error as ThisError;

use crate::binary_agreement;

/// A subset error.
#[derive(Clone, PartialEq, Debug, ThisError)]
pub enum Error {
    /// Error handling a `BinaryAgreement` input or message.
    #[error("Error handling BinaryAgreement input/message: {0}")]
    HandleAgreement(binary_agreement::Error),
    /// Error serializing a proposer ID for instance derivation.
    #[error("Error serializing proposer ID: {0}")]
    SerializeProposer(String),
    /// Unknown proposer.
    #[error("Unknown proposer ID")]
    UnknownProposer,
    /// A coin seed that does not belong to any of this subset's agreement instances.
    #[error("Unknown agreement instance")]
    UnknownInstance,
}

/// A subset result.
pub type Result<T> = result::Result<T, Error>;

/// Faults that can be detected in Subset.
#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum FaultKind {
    /// `Subset` received a faulty Binary Agreement message.
    #[error("`Subset` received a faulty Binary Agreement message.")]
    AgreementFault(binary_agreement::FaultKind),
}
