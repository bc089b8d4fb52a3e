//! # Decision echo amplification
//!
//! A round-level decision is only locally known; this gadget turns it into a globally safe,
//! one-shot output. Every instance that decides multicasts its decision as an echo. Upon
//! receiving _f + 1_ matching echoes, at least one of them from a correct node, an instance
//! that has not yet echoed joins in. Upon _2 f + 1_ matching echoes the value is finalized: any
//! two such quorums intersect in a correct node, so no two correct instances can finalize
//! different values, and once one correct instance decides, every correct instance eventually
//! finalizes.

use std::sync::Arc;

use log::debug;

use super::bool_multimap::BoolMultimap;
use super::FaultKind;
use crate::fault_log::Fault;
use crate::{NetworkInfo, NodeIdT, Target};

/// A `Termination` step. Messages are decision echoes; an output is the finalized value.
pub type Step<N> = crate::Step<bool, bool, N, FaultKind>;

/// The state of the decision echo exchange of one agreement instance.
#[derive(Debug)]
pub struct Termination<N> {
    /// Shared network information.
    netinfo: Arc<NetworkInfo<N>>,
    /// The nodes whose decision echo we have received, by echoed value.
    received: BoolMultimap<N>,
    /// Whether we have already multicast our own echo.
    has_echoed: bool,
    /// The finalized value. Set at most once.
    decision: Option<bool>,
}

impl<N: NodeIdT> Termination<N> {
    /// Creates a new gadget with no recorded echoes.
    pub fn new(netinfo: Arc<NetworkInfo<N>>) -> Self {
        Termination {
            netinfo,
            received: BoolMultimap::default(),
            has_echoed: false,
            decision: None,
        }
    }

    /// Returns the finalized value, if the gadget has finalized.
    pub fn decision(&self) -> Option<bool> {
        self.decision
    }

    /// Registers our own round-level decision, multicasting it as our echo. Does nothing if we
    /// have already echoed.
    pub fn our_decision(&mut self, b: bool) -> Step<N> {
        if self.has_echoed {
            return Step::default();
        }
        self.send_echo(b)
    }

    /// Handles a decision echo received from `sender_id`. At most one echo per sender is
    /// accepted; everything after finalization is ignored.
    pub fn handle_decision(&mut self, sender_id: &N, b: bool) -> Step<N> {
        if self.decision.is_some() {
            return Step::default();
        }
        let count = {
            if self.received.contains(sender_id) {
                return Fault::new(sender_id.clone(), FaultKind::DuplicateDecision).into();
            }
            self.received[b].insert(sender_id.clone());
            self.received[b].len()
        };

        let mut step = Step::default();

        if count == self.netinfo.num_faulty() + 1 && !self.has_echoed {
            step.extend(self.send_echo(b));
        }

        if count == 2 * self.netinfo.num_faulty() + 1 {
            self.decision = Some(b);
            debug!("{:?} termination finalized: {}", self.netinfo.our_id(), b);
            step.output.push(b);
        }

        step
    }

    /// Multicasts our decision echo and handles our own copy. Does nothing if we are only an
    /// observer.
    fn send_echo(&mut self, b: bool) -> Step<N> {
        self.has_echoed = true;
        if !self.netinfo.is_validator() {
            return Step::default();
        }
        let step: Step<N> = Target::All.message(b).into();
        let our_id = &self.netinfo.our_id().clone();
        step.join(self.handle_decision(our_id, b))
    }
}
