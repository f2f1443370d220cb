//! Depth-first traversal of a trie without recursion.
//!
//! The cursor keeps its own stack of per-level positions, so the trie itself
//! never carries traversal state and any number of cursors can walk one
//! snapshot at the same time.

use std::iter::FusedIterator;
use std::slice;

use arrayvec::ArrayVec;

use super::node::Slot;
use super::{BranchKind, MAX_DEPTH, TrieNode};

/// One frame per node level plus one for a knot at the bottom.
const STACK_CAPACITY: usize = MAX_DEPTH + 1;

/// Position within one node.
struct NodeFrame<'a, K, V> {
    node: &'a TrieNode<K, V>,
    slot_index: usize,
    value_index: usize,
    /// TREE and KNOT branches not visited yet.
    tree_map: u32,
    /// LEAF and KNOT branches not visited yet.
    leaf_map: u32,
}

enum Frame<'a, K, V> {
    Node(NodeFrame<'a, K, V>),
    Knot(slice::Iter<'a, (K, V)>),
}

enum Step<'a, K, V> {
    Yield(&'a K, &'a V),
    Descend(Frame<'a, K, V>),
    Ascend,
}

impl<'a, K, V> NodeFrame<'a, K, V> {
    const fn new(node: &'a TrieNode<K, V>) -> Self {
        Self {
            node,
            slot_index: 0,
            value_index: 0,
            tree_map: node.tree_map(),
            leaf_map: node.leaf_map(),
        }
    }

    /// Consumes the lowest branch not visited yet.
    fn step(&mut self) -> Step<'a, K, V> {
        let remaining = self.tree_map | self.leaf_map;
        if remaining == 0 {
            return Step::Ascend;
        }
        let branch = remaining & remaining.wrapping_neg();
        let kind = BranchKind::classify(self.tree_map, self.leaf_map, branch);
        self.tree_map &= !branch;
        self.leaf_map &= !branch;

        let node = self.node;
        let slot = &node.slots()[self.slot_index];
        self.slot_index += 1;
        match (kind, slot) {
            (BranchKind::Leaf, Slot::Leaf(key)) => {
                let value = &node.values()[self.value_index];
                self.value_index += 1;
                Step::Yield(key, value)
            }
            (BranchKind::Tree, Slot::Tree(child)) => {
                Step::Descend(Frame::Node(NodeFrame::new(child)))
            }
            (BranchKind::Knot, Slot::Knot(knot)) => {
                Step::Descend(Frame::Knot(knot.entries().iter()))
            }
            (kind, _) => panic!(
                "trie node corrupted: cursor reached a {} branch holding another slot kind",
                kind.name()
            ),
        }
    }
}

/// Iterator over the entries of a trie in canonical order.
///
/// Canonical order visits branch 0 before branch 1 at every level and the
/// entries of a knot in insertion order. It is deterministic for a given
/// trie shape but is not sorted by key.
pub(crate) struct Cursor<'a, K, V> {
    stack: ArrayVec<Frame<'a, K, V>, STACK_CAPACITY>,
}

impl<'a, K, V> Cursor<'a, K, V> {
    pub(crate) fn new(root: Option<&'a TrieNode<K, V>>) -> Self {
        let mut stack = ArrayVec::new();
        if let Some(root) = root {
            stack.push(Frame::Node(NodeFrame::new(root)));
        }
        Self { stack }
    }
}

impl<'a, K, V> Iterator for Cursor<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let step = match self.stack.last_mut()? {
                Frame::Node(frame) => frame.step(),
                Frame::Knot(entries) => match entries.next() {
                    Some((key, value)) => Step::Yield(key, value),
                    None => Step::Ascend,
                },
            };
            match step {
                Step::Yield(key, value) => return Some((key, value)),
                Step::Descend(frame) => self.stack.push(frame),
                Step::Ascend => {
                    self.stack.pop();
                }
            }
        }
    }
}

impl<K, V> FusedIterator for Cursor<'_, K, V> {}

impl<K, V> Clone for NodeFrame<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            node: self.node,
            slot_index: self.slot_index,
            value_index: self.value_index,
            tree_map: self.tree_map,
            leaf_map: self.leaf_map,
        }
    }
}

impl<K, V> Clone for Frame<'_, K, V> {
    fn clone(&self) -> Self {
        match self {
            Self::Node(frame) => Self::Node(frame.clone()),
            Self::Knot(entries) => Self::Knot(entries.clone()),
        }
    }
}

impl<K, V> Clone for Cursor<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            stack: self.stack.clone(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
