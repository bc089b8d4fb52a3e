//! Common data shared between the algorithms: the set of participating nodes and the fault bound.

use std::collections::{BTreeMap, BTreeSet};

use crate::{util, NodeIdT};

/// The network membership as seen by one node: all participant IDs, the derived fault bound _f_,
/// and this node's place in the network.
///
/// All nodes in the network must share the same participant set. A node whose own ID is not part
/// of the set is an _observer_: it follows the protocols and produces the same outputs, but never
/// sends messages of its own.
#[derive(Debug, Clone)]
pub struct NetworkInfo<N> {
    /// This node's ID.
    our_id: N,
    /// The number _N_ of nodes in the network. Equal to the size of `node_indices`.
    num_nodes: usize,
    /// The number _f_ of faulty nodes that can be tolerated. Less than a third of _N_.
    num_faulty: usize,
    /// Whether this node is a validator. This is true if `node_indices` contains our own ID.
    is_validator: bool,
    /// The indices in the list of sorted participant IDs.
    node_indices: BTreeMap<N, usize>,
}

impl<N: NodeIdT> NetworkInfo<N> {
    /// Creates a new `NetworkInfo` with the given own ID and participant set.
    ///
    /// # Panics
    ///
    /// Panics if `all_ids` is empty.
    pub fn new(our_id: N, all_ids: BTreeSet<N>) -> Self {
        let num_nodes = all_ids.len();
        let num_faulty = util::max_faulty(num_nodes);
        let is_validator = all_ids.contains(&our_id);
        let node_indices: BTreeMap<N, usize> = all_ids
            .into_iter()
            .enumerate()
            .map(|(n, id)| (id, n))
            .collect();
        NetworkInfo {
            our_id,
            num_nodes,
            num_faulty,
            is_validator,
            node_indices,
        }
    }

    /// The ID of the node the algorithm runs on.
    #[inline]
    pub fn our_id(&self) -> &N {
        &self.our_id
    }

    /// IDs of all nodes in the network.
    #[inline]
    pub fn all_ids(&self) -> impl Iterator<Item = &N> {
        self.node_indices.keys()
    }

    /// The total number _N_ of nodes.
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// The maximum number _f_ of faulty, Byzantine nodes up to which the protocols are guaranteed
    /// to be correct.
    #[inline]
    pub fn num_faulty(&self) -> usize {
        self.num_faulty
    }

    /// The minimum number _N - f_ of correct nodes with which the protocols are guaranteed to be
    /// correct.
    #[inline]
    pub fn num_correct(&self) -> usize {
        // As asserted in `max_faulty`, `num_faulty` is never greater than `num_nodes`.
        self.num_nodes - self.num_faulty
    }

    /// The index of a node in a canonical numbering of all nodes. This is the index where the
    /// node appears in `all_ids`.
    #[inline]
    pub fn node_index(&self, id: &N) -> Option<usize> {
        self.node_indices.get(id).cloned()
    }

    /// Returns `true` if this node takes part in the consensus itself. If not, it is only an
    /// observer.
    #[inline]
    pub fn is_validator(&self) -> bool {
        self.is_validator
    }

    /// Returns `true` if the given node takes part in the consensus itself. If not, it is only an
    /// observer.
    #[inline]
    pub fn is_node_validator(&self, id: &N) -> bool {
        self.node_indices.contains_key(id)
    }

    /// Generates a map of matching `NetworkInfo`s for testing.
    pub fn generate_map<I>(ids: I) -> BTreeMap<N, NetworkInfo<N>>
    where
        I: IntoIterator<Item = N>,
    {
        let all_ids: BTreeSet<N> = ids.into_iter().collect();
        all_ids
            .iter()
            .map(|id| (id.clone(), NetworkInfo::new(id.clone(), all_ids.clone())))
            .collect()
    }
}
