//! Functionality for logging faulty node behavior encountered by each algorithm.
//!
//! Duplicate or otherwise invalid messages from a peer are tolerated by the protocols, but each
//! occurrence is recorded and propagated upwards through the `Step`s returned by
//! `ConsensusProtocol::handle_input` and `ConsensusProtocol::handle_message`, so that the caller
//! can hold the responsible node accountable.

use crate::traits::FaultT;

/// A structure representing the context of a faulty node. This structure describes which node is
/// faulty (`node_id`) and which faulty behavior that the node exhibited (`kind`).
#[derive(Clone, Debug, PartialEq)]
pub struct Fault<N, F: FaultT> {
    /// The faulty node's ID.
    pub node_id: N,
    /// The kind of fault the node is blamed for.
    pub kind: F,
}

impl<N, F: FaultT> Fault<N, F> {
    /// Creates a new fault, blaming `node_id` for the `kind`.
    pub fn new(node_id: N, kind: F) -> Self {
        Fault { node_id, kind }
    }

    /// Applies `f_fault` to `kind`, leaving `node_id` unchanged.
    pub fn map<F2, FF>(self, f_fault: FF) -> Fault<N, F2>
    where
        F2: FaultT,
        FF: Fn(F) -> F2,
    {
        Fault {
            node_id: self.node_id,
            kind: f_fault(self.kind),
        }
    }
}

/// A structure used to contain reports of faulty node behavior.
#[derive(Clone, Debug, PartialEq)]
pub struct FaultLog<N, F: FaultT>(pub Vec<Fault<N, F>>);

impl<N, F: FaultT> FaultLog<N, F> {
    /// Creates an empty `FaultLog`.
    pub fn new() -> Self {
        FaultLog::default()
    }

    /// Creates a new `FaultLog` initialized with a single fault.
    pub fn init(node_id: N, kind: F) -> Self {
        Fault::new(node_id, kind).into()
    }

    /// Creates a new `Fault` and pushes it onto the fault log.
    pub fn append(&mut self, node_id: N, kind: F) {
        self.0.push(Fault::new(node_id, kind));
    }

    /// Consumes `new_logs`, appending its faults onto the end of `self`.
    pub fn extend(&mut self, new_logs: FaultLog<N, F>) {
        self.0.extend(new_logs.0);
    }

    /// Returns `true` if there are no fault entries in the log.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Applies `f_fault` to each entry in the log, modifying its `kind` only.
    pub fn map<F2, FF>(self, f_fault: FF) -> FaultLog<N, F2>
    where
        F2: FaultT,
        FF: Fn(F) -> F2,
    {
        self.into_iter().map(|f| f.map(&f_fault)).collect()
    }
}

impl<N, F: FaultT> Default for FaultLog<N, F> {
    fn default() -> Self {
        FaultLog(Vec::new())
    }
}

impl<N, F: FaultT> From<Fault<N, F>> for FaultLog<N, F> {
    fn from(fault: Fault<N, F>) -> Self {
        FaultLog(vec![fault])
    }
}

impl<N, F: FaultT> IntoIterator for FaultLog<N, F> {
    type Item = Fault<N, F>;
    type IntoIter = std::vec::IntoIter<Fault<N, F>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<N, F: FaultT> std::iter::FromIterator<Fault<N, F>> for FaultLog<N, F> {
    fn from_iter<I: IntoIterator<Item = Fault<N, F>>>(iter: I) -> Self {
        FaultLog(iter.into_iter().collect())
    }
}
