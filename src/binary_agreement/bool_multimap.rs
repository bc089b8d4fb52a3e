//! A map from `bool` to sets of node IDs, used for counting distinct senders per bit value.

use std::collections::BTreeSet;
use std::ops::{Index, IndexMut};

/// A map from `bool` to `BTreeSet<N>`.
#[derive(Debug, Clone)]
pub struct BoolMultimap<N>([BTreeSet<N>; 2]);

impl<N: Ord> Default for BoolMultimap<N> {
    fn default() -> Self {
        BoolMultimap([BTreeSet::default(), BTreeSet::default()])
    }
}

impl<N: Ord> BoolMultimap<N> {
    /// Returns `true` if the sender is present under either key.
    pub fn contains(&self, id: &N) -> bool {
        self[false].contains(id) || self[true].contains(id)
    }
}

impl<N: Ord> Index<bool> for BoolMultimap<N> {
    type Output = BTreeSet<N>;

    fn index(&self, index: bool) -> &Self::Output {
        &self.0[usize::from(index)]
    }
}

impl<N: Ord> IndexMut<bool> for BoolMultimap<N> {
    fn index_mut(&mut self, index: bool) -> &mut Self::Output {
        &mut self.0[usize::from(index)]
    }
}
