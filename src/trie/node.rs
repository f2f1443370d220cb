//! Bitmap-indexed trie nodes.
//!
//! A node stores one front slot per occupied branch (in branch order) and one
//! value per LEAF branch (also in branch order). KNOT branches have both
//! bitmap bits set and keep their entries inside the knot, so they take a
//! front slot but no value slot.

use std::borrow::Borrow;
use std::hash::Hash;

use super::{
    BITS_PER_LEVEL, BranchKind, Knot, MAX_SHIFT, ReferenceCounter, block_of, branch_of, index_of,
};
use crate::error::InvariantViolation;
use crate::hash::hash_of;

// =============================================================================
// Slots
// =============================================================================

/// Payload of one front slot.
pub(crate) enum Slot<K, V> {
    /// The key of a LEAF branch; its value lives in the value region.
    Leaf(K),
    /// A sub-node one level deeper.
    Tree(ReferenceCounter<TrieNode<K, V>>),
    /// A collision knot.
    Knot(ReferenceCounter<Knot<K, V>>),
}

impl<K, V> Slot<K, V> {
    const fn kind(&self) -> BranchKind {
        match self {
            Self::Leaf(_) => BranchKind::Leaf,
            Self::Tree(_) => BranchKind::Tree,
            Self::Knot(_) => BranchKind::Knot,
        }
    }
}

impl<K: Clone, V> Clone for Slot<K, V> {
    fn clone(&self) -> Self {
        match self {
            Self::Leaf(key) => Self::Leaf(key.clone()),
            Self::Tree(node) => Self::Tree(ReferenceCounter::clone(node)),
            Self::Knot(knot) => Self::Knot(ReferenceCounter::clone(knot)),
        }
    }
}

/// New contents for one branch, written by [`TrieNode::remap`].
enum Branch<K, V> {
    Void,
    Leaf(K, V),
    Tree(ReferenceCounter<TrieNode<K, V>>),
    Knot(ReferenceCounter<Knot<K, V>>),
}

#[cold]
#[track_caller]
fn corrupted(expected: BranchKind, actual: BranchKind) -> ! {
    panic!(
        "trie node corrupted: branch classified {} holds a {} slot",
        expected.name(),
        actual.name()
    )
}

// =============================================================================
// TrieNode Definition
// =============================================================================

/// One level of the hash trie.
pub(crate) struct TrieNode<K, V> {
    tree_map: u32,
    leaf_map: u32,
    slots: Box<[Slot<K, V>]>,
    values: Box<[V]>,
}

impl<K, V> TrieNode<K, V> {
    /// Creates a node with every branch VOID.
    pub(crate) fn empty() -> Self {
        Self {
            tree_map: 0,
            leaf_map: 0,
            slots: Box::default(),
            values: Box::default(),
        }
    }

    pub(crate) const fn tree_map(&self) -> u32 {
        self.tree_map
    }

    pub(crate) const fn leaf_map(&self) -> u32 {
        self.leaf_map
    }

    pub(crate) fn slots(&self) -> &[Slot<K, V>] {
        &self.slots
    }

    pub(crate) fn values(&self) -> &[V] {
        &self.values
    }

    /// Branches holding anything at all.
    const fn occupied(&self) -> u32 {
        self.tree_map | self.leaf_map
    }

    /// Branches owning a value slot: LEAF only, never KNOT.
    const fn value_map(&self) -> u32 {
        self.leaf_map & !self.tree_map
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.occupied() == 0
    }

    const fn classify(&self, branch: u32) -> BranchKind {
        BranchKind::classify(self.tree_map, self.leaf_map, branch)
    }

    fn slot_at(&self, branch: u32) -> &Slot<K, V> {
        &self.slots[index_of(self.occupied(), branch)]
    }

    fn leaf_at(&self, branch: u32) -> (&K, &V) {
        match self.slot_at(branch) {
            Slot::Leaf(key) => (key, &self.values[index_of(self.value_map(), branch)]),
            slot => corrupted(BranchKind::Leaf, slot.kind()),
        }
    }

    fn tree_at(&self, branch: u32) -> &ReferenceCounter<Self> {
        match self.slot_at(branch) {
            Slot::Tree(node) => node,
            slot => corrupted(BranchKind::Tree, slot.kind()),
        }
    }

    fn knot_at(&self, branch: u32) -> &ReferenceCounter<Knot<K, V>> {
        match self.slot_at(branch) {
            Slot::Knot(knot) => knot,
            slot => corrupted(BranchKind::Knot, slot.kind()),
        }
    }

    /// Counts the entries below this node.
    ///
    /// Walks the whole subtree; nothing is cached.
    pub(crate) fn len(&self) -> usize {
        let leaves = self.value_map().count_ones() as usize;
        self.slots
            .iter()
            .map(|slot| match slot {
                Slot::Leaf(_) => 0,
                Slot::Tree(node) => node.len(),
                Slot::Knot(knot) => knot.len(),
            })
            .sum::<usize>()
            + leaves
    }

    /// The first entry in canonical order.
    pub(crate) fn first(&self) -> Option<(&K, &V)> {
        self.first_from(0)
    }

    /// The first entry stored in a branch at index `block` or above.
    fn first_from(&self, block: u32) -> Option<(&K, &V)> {
        let remaining = self.occupied() & u32::MAX.checked_shl(block).unwrap_or(0);
        if remaining == 0 {
            return None;
        }
        let branch = remaining & remaining.wrapping_neg();
        match self.classify(branch) {
            BranchKind::Void => None,
            BranchKind::Leaf => Some(self.leaf_at(branch)),
            BranchKind::Tree => self.tree_at(branch).first(),
            BranchKind::Knot => self.knot_at(branch).first(),
        }
    }

    /// Returns a lookup result for `key` whose trie hash is `hash`.
    pub(crate) fn get<Q>(&self, key: &Q, hash: u32, shift: u32) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let branch = branch_of(hash, shift);
        match self.classify(branch) {
            BranchKind::Void => None,
            BranchKind::Leaf => {
                let (leaf_key, value) = self.leaf_at(branch);
                (leaf_key.borrow() == key).then_some((leaf_key, value))
            }
            BranchKind::Tree => self
                .tree_at(branch)
                .get(key, hash, shift + BITS_PER_LEVEL),
            BranchKind::Knot => self.knot_at(branch).get(key),
        }
    }

    /// Returns the entry following `key` in canonical order.
    ///
    /// When `key` is not stored, the search resumes after the position its
    /// hash would occupy.
    pub(crate) fn next_after<Q>(&self, key: &Q, hash: u32, shift: u32) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let block = block_of(hash, shift);
        let branch = 1 << block;
        let within = match self.classify(branch) {
            BranchKind::Void | BranchKind::Leaf => None,
            BranchKind::Tree => {
                self.tree_at(branch)
                    .next_after(key, hash, shift + BITS_PER_LEVEL)
            }
            BranchKind::Knot => self.knot_at(branch).next_after(key),
        };
        within.or_else(|| self.first_from(block + 1))
    }
}

impl<K: Clone, V: Clone> TrieNode<K, V> {
    /// Rebuilds this node with `branch` holding `content`.
    ///
    /// Both bitmaps are recomputed and the front and value regions are copied
    /// around the changed branch, so the one routine grows, shrinks and
    /// converts branches between any two kinds.
    fn remap(&self, branch: u32, content: Branch<K, V>) -> Self {
        let (tree_bit, leaf_bit) = match content {
            Branch::Void => (0, 0),
            Branch::Leaf(..) => (0, branch),
            Branch::Tree(_) => (branch, 0),
            Branch::Knot(_) => (branch, branch),
        };
        let tree_map = (self.tree_map & !branch) | tree_bit;
        let leaf_map = (self.leaf_map & !branch) | leaf_bit;

        let slot_index = index_of(self.occupied(), branch);
        let value_index = index_of(self.value_map(), branch);
        let slot_tail = slot_index + usize::from(self.occupied() & branch != 0);
        let value_tail = value_index + usize::from(self.value_map() & branch != 0);

        let mut slots = Vec::with_capacity((tree_map | leaf_map).count_ones() as usize);
        let mut values = Vec::with_capacity((leaf_map & !tree_map).count_ones() as usize);
        slots.extend_from_slice(&self.slots[..slot_index]);
        values.extend_from_slice(&self.values[..value_index]);
        match content {
            Branch::Void => {}
            Branch::Leaf(key, value) => {
                slots.push(Slot::Leaf(key));
                values.push(value);
            }
            Branch::Tree(node) => slots.push(Slot::Tree(node)),
            Branch::Knot(knot) => slots.push(Slot::Knot(knot)),
        }
        slots.extend_from_slice(&self.slots[slot_tail..]);
        values.extend_from_slice(&self.values[value_tail..]);

        Self {
            tree_map,
            leaf_map,
            slots: slots.into_boxed_slice(),
            values: values.into_boxed_slice(),
        }
    }

    /// Turns a node left behind by a removal into the branch its parent keeps.
    ///
    /// Empty nodes vanish, and a node holding a single leaf or knot is lifted
    /// into the parent so depth shrinks with the entry count.
    fn into_branch(self) -> Branch<K, V> {
        let occupied = self.occupied();
        if occupied == 0 {
            return Branch::Void;
        }
        if occupied.is_power_of_two() && self.classify(occupied) != BranchKind::Tree {
            let mut slots = self.slots.into_vec();
            let mut values = self.values.into_vec();
            return match (slots.pop(), values.pop()) {
                (Some(Slot::Leaf(key)), Some(value)) => Branch::Leaf(key, value),
                (Some(Slot::Knot(knot)), None) => Branch::Knot(knot),
                _ => unreachable!("single-branch node disagrees with its bitmaps"),
            };
        }
        Branch::Tree(ReferenceCounter::new(self))
    }

    /// A node with `branch` as its only TREE branch.
    fn with_tree(branch: u32, child: Self) -> Self {
        Self {
            tree_map: branch,
            leaf_map: 0,
            slots: Box::new([Slot::Tree(ReferenceCounter::new(child))]),
            values: Box::default(),
        }
    }

    /// Builds the sub-trie holding two leaves whose hashes differ.
    fn merge_leaves(
        existing: (K, V),
        existing_hash: u32,
        entry: (K, V),
        hash: u32,
        shift: u32,
    ) -> Self {
        debug_assert!(shift <= MAX_SHIFT && existing_hash != hash);
        let existing_branch = branch_of(existing_hash, shift);
        let branch = branch_of(hash, shift);
        if existing_branch == branch {
            let child =
                Self::merge_leaves(existing, existing_hash, entry, hash, shift + BITS_PER_LEVEL);
            return Self::with_tree(branch, child);
        }
        let (low, high) = if existing_branch < branch {
            (existing, entry)
        } else {
            (entry, existing)
        };
        Self {
            tree_map: 0,
            leaf_map: existing_branch | branch,
            slots: Box::new([Slot::Leaf(low.0), Slot::Leaf(high.0)]),
            values: Box::new([low.1, high.1]),
        }
    }

    /// Builds the sub-trie holding a knot and a leaf whose hash differs from
    /// the knot's.
    fn merge_knot(knot: ReferenceCounter<Knot<K, V>>, entry: (K, V), hash: u32, shift: u32) -> Self {
        debug_assert!(shift <= MAX_SHIFT && knot.hash() != hash);
        let knot_branch = branch_of(knot.hash(), shift);
        let branch = branch_of(hash, shift);
        if knot_branch == branch {
            let child = Self::merge_knot(knot, entry, hash, shift + BITS_PER_LEVEL);
            return Self::with_tree(branch, child);
        }
        let (key, value) = entry;
        let slots = if knot_branch < branch {
            [Slot::Knot(knot), Slot::Leaf(key)]
        } else {
            [Slot::Leaf(key), Slot::Knot(knot)]
        };
        Self {
            tree_map: knot_branch,
            leaf_map: knot_branch | branch,
            slots: Box::new(slots),
            values: Box::new([value]),
        }
    }
}

impl<K: Hash + Eq + Clone, V: Clone> TrieNode<K, V> {
    /// Associates `value` with `key` below this node.
    ///
    /// Returns `None` when nothing changes, which happens only when `key` is
    /// already stored and `same` accepts its current value. Callers use that
    /// to hand back the original node and keep sharing it.
    pub(crate) fn updated<F>(&self, key: K, hash: u32, value: V, shift: u32, same: &F) -> Option<Self>
    where
        F: Fn(&V, &V) -> bool,
    {
        let branch = branch_of(hash, shift);
        match self.classify(branch) {
            BranchKind::Void => Some(self.remap(branch, Branch::Leaf(key, value))),
            BranchKind::Leaf => {
                let (leaf_key, leaf_value) = self.leaf_at(branch);
                if *leaf_key == key {
                    if same(leaf_value, &value) {
                        return None;
                    }
                    return Some(self.remap(branch, Branch::Leaf(leaf_key.clone(), value)));
                }
                let leaf_hash = hash_of(leaf_key);
                let existing = (leaf_key.clone(), leaf_value.clone());
                let content = if leaf_hash == hash {
                    Branch::Knot(ReferenceCounter::new(Knot::pair(
                        hash,
                        existing,
                        (key, value),
                    )))
                } else {
                    Branch::Tree(ReferenceCounter::new(Self::merge_leaves(
                        existing,
                        leaf_hash,
                        (key, value),
                        hash,
                        shift + BITS_PER_LEVEL,
                    )))
                };
                Some(self.remap(branch, content))
            }
            BranchKind::Tree => self
                .tree_at(branch)
                .updated(key, hash, value, shift + BITS_PER_LEVEL, same)
                .map(|child| self.remap(branch, Branch::Tree(ReferenceCounter::new(child)))),
            BranchKind::Knot => {
                let knot = self.knot_at(branch);
                if knot.hash() == hash {
                    knot.updated(key, value, same).map(|knot| {
                        self.remap(branch, Branch::Knot(ReferenceCounter::new(knot)))
                    })
                } else {
                    let child = Self::merge_knot(
                        ReferenceCounter::clone(knot),
                        (key, value),
                        hash,
                        shift + BITS_PER_LEVEL,
                    );
                    Some(self.remap(branch, Branch::Tree(ReferenceCounter::new(child))))
                }
            }
        }
    }

    /// Removes `key` below this node; `None` when it is not stored.
    pub(crate) fn removed<Q>(&self, key: &Q, hash: u32, shift: u32) -> Option<Self>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let branch = branch_of(hash, shift);
        match self.classify(branch) {
            BranchKind::Void => None,
            BranchKind::Leaf => {
                let (leaf_key, _) = self.leaf_at(branch);
                (leaf_key.borrow() == key).then(|| self.remap(branch, Branch::Void))
            }
            BranchKind::Tree => {
                let child = self
                    .tree_at(branch)
                    .removed(key, hash, shift + BITS_PER_LEVEL)?;
                Some(self.remap(branch, child.into_branch()))
            }
            BranchKind::Knot => {
                let knot = self.knot_at(branch).removed(key)?;
                let content = match knot.single() {
                    Some((key, value)) => Branch::Leaf(key.clone(), value.clone()),
                    None => Branch::Knot(ReferenceCounter::new(knot)),
                };
                Some(self.remap(branch, content))
            }
        }
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Mask of the hash bits that select a path down to and including the level
/// at `shift`.
const fn path_mask(shift: u32) -> u32 {
    match 1_u32.checked_shl(shift + BITS_PER_LEVEL) {
        Some(bit) => bit - 1,
        None => u32::MAX,
    }
}

impl<K: Hash, V> TrieNode<K, V> {
    /// Checks every structural invariant below this node and returns the
    /// number of entries found.
    ///
    /// `prefix` holds the hash bits of the path leading here.
    pub(crate) fn validate(
        &self,
        shift: u32,
        prefix: u32,
        is_root: bool,
    ) -> Result<usize, InvariantViolation> {
        if shift > MAX_SHIFT {
            return Err(InvariantViolation::DepthExceeded { shift });
        }
        if !is_root && self.is_empty() {
            return Err(InvariantViolation::EmptySubtree { shift });
        }
        let expected_slots = self.occupied().count_ones() as usize;
        if self.slots.len() != expected_slots {
            return Err(InvariantViolation::SlotCount {
                shift,
                expected: expected_slots,
                actual: self.slots.len(),
            });
        }
        let expected_values = self.value_map().count_ones() as usize;
        if self.values.len() != expected_values {
            return Err(InvariantViolation::ValueCount {
                shift,
                expected: expected_values,
                actual: self.values.len(),
            });
        }

        let mask = path_mask(shift);
        let mut count = 0;
        let mut remaining = self.occupied();
        while remaining != 0 {
            let block = remaining.trailing_zeros();
            let branch = 1 << block;
            remaining &= !branch;
            let path = prefix | (block << shift);
            let slot = self.slot_at(branch);
            let kind = self.classify(branch);
            if slot.kind() != kind {
                return Err(InvariantViolation::BranchKind {
                    shift,
                    block,
                    expected: kind.name(),
                    actual: slot.kind().name(),
                });
            }
            match slot {
                Slot::Leaf(key) => {
                    if hash_of(key) & mask != path {
                        return Err(InvariantViolation::MisplacedKey { shift, block });
                    }
                    count += 1;
                }
                Slot::Tree(child) => {
                    let child_occupied = child.occupied();
                    if child_occupied.is_power_of_two()
                        && child.classify(child_occupied) != BranchKind::Tree
                    {
                        return Err(InvariantViolation::UnaryChild { shift, block });
                    }
                    count += child.validate(shift + BITS_PER_LEVEL, path, false)?;
                }
                Slot::Knot(knot) => {
                    if knot.len() < 2 {
                        return Err(InvariantViolation::UndersizedKnot {
                            shift,
                            length: knot.len(),
                        });
                    }
                    if knot.hash() & mask != path {
                        return Err(InvariantViolation::MisplacedKey { shift, block });
                    }
                    for (key, _) in knot.entries() {
                        let actual = hash_of(key);
                        if actual != knot.hash() {
                            return Err(InvariantViolation::KnotHash {
                                shift,
                                expected: knot.hash(),
                                actual,
                            });
                        }
                    }
                    count += knot.len();
                }
            }
        }
        Ok(count)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;
    use std::hash::Hasher;

    /// Keys with a controllable hash: `Colliding` keys all hash alike.
    #[derive(Clone, Debug, PartialEq, Eq)]
    enum Probe {
        Plain(u64),
        Colliding(u32),
    }

    impl Hash for Probe {
        fn hash<H: Hasher>(&self, state: &mut H) {
            match self {
                Self::Plain(number) => number.hash(state),
                Self::Colliding(_) => u64::MAX.hash(state),
            }
        }
    }

    type Node = TrieNode<Probe, u32>;

    fn never(_: &u32, _: &u32) -> bool {
        false
    }

    fn equal(left: &u32, right: &u32) -> bool {
        left == right
    }

    fn insert(node: &Node, key: Probe, value: u32) -> Node {
        let hash = hash_of(&key);
        node.updated(key, hash, value, 0, &never)
            .expect("insertion with `never` always changes the node")
    }

    fn remove(node: &Node, key: &Probe) -> Option<Node> {
        node.removed(key, hash_of(key), 0)
    }

    fn lookup(node: &Node, key: &Probe) -> Option<u32> {
        node.get(key, hash_of(key), 0).map(|(_, value)| *value)
    }

    fn build(keys: &[Probe]) -> Node {
        keys.iter()
            .zip(0..)
            .fold(Node::empty(), |node, (key, value)| insert(&node, key.clone(), value))
    }

    fn colliding_hash() -> u32 {
        hash_of(&Probe::Colliding(0))
    }

    /// Plain keys whose hash agrees with `target` on the low `bits` bits
    /// without equalling it.
    fn plain_keys_matching(target: u32, bits: u32, count: usize) -> Vec<Probe> {
        let mask = path_mask(bits - BITS_PER_LEVEL);
        (0..)
            .map(Probe::Plain)
            .filter(|key| {
                let hash = hash_of(key);
                hash & mask == target & mask && hash != target
            })
            .take(count)
            .collect()
    }

    /// Two plain keys whose hashes agree on the low `bits` bits and differ
    /// above them.
    fn plain_pair_sharing(bits: u32) -> (Probe, Probe) {
        let mask = path_mask(bits - BITS_PER_LEVEL);
        let mut seen: HashMap<u32, (u32, Probe)> = HashMap::new();
        for number in 0.. {
            let key = Probe::Plain(number);
            let hash = hash_of(&key);
            if let Some((other_hash, other)) = seen.get(&(hash & mask)) {
                if *other_hash != hash {
                    return (other.clone(), key);
                }
            } else {
                seen.insert(hash & mask, (hash, key));
            }
        }
        unreachable!()
    }

    fn depth(node: &Node) -> usize {
        1 + node
            .slots()
            .iter()
            .map(|slot| match slot {
                Slot::Tree(child) => depth(child),
                _ => 0,
            })
            .max()
            .unwrap_or(0)
    }

    fn assert_valid(node: &Node, expected_len: usize) {
        assert_eq!(node.validate(0, 0, true), Ok(expected_len));
        assert_eq!(node.len(), expected_len);
    }

    fn canonical_keys(node: &Node) -> Vec<Probe> {
        let mut keys = Vec::new();
        let mut current = node.first();
        while let Some((key, _)) = current {
            keys.push(key.clone());
            current = node.next_after(key, hash_of(key), 0);
        }
        keys
    }

    // =========================================================================
    // Insertion
    // =========================================================================

    #[rstest]
    fn test_insert_into_void_branch() {
        let key = Probe::Plain(1);
        let branch = branch_of(hash_of(&key), 0);
        let node = insert(&Node::empty(), key.clone(), 10);

        assert_eq!(node.leaf_map(), branch);
        assert_eq!(node.tree_map(), 0);
        assert_eq!(node.slots().len(), 1);
        assert_eq!(node.values(), &[10]);
        assert_eq!(lookup(&node, &key), Some(10));
        assert_valid(&node, 1);
    }

    #[rstest]
    fn test_insert_orders_slots_by_branch() {
        let keys: Vec<Probe> = (0..200).map(Probe::Plain).collect();
        let node = build(&keys);
        assert_valid(&node, keys.len());

        let mut blocks: Vec<u32> = Vec::new();
        let mut remaining = node.tree_map() | node.leaf_map();
        while remaining != 0 {
            blocks.push(remaining.trailing_zeros());
            remaining &= remaining - 1;
        }
        assert!(blocks.windows(2).all(|pair| pair[0] < pair[1]));
        for (index, key) in keys.iter().enumerate() {
            assert_eq!(lookup(&node, key), Some(u32::try_from(index).unwrap()));
        }
    }

    #[rstest]
    fn test_same_key_replaces_value_and_keeps_key() {
        let key = Probe::Plain(7);
        let node = insert(&Node::empty(), key.clone(), 1);
        let replaced = insert(&node, key.clone(), 2);

        assert_eq!(lookup(&node, &key), Some(1));
        assert_eq!(lookup(&replaced, &key), Some(2));
        assert_eq!(replaced.leaf_map(), node.leaf_map());
        assert_valid(&replaced, 1);
    }

    #[rstest]
    fn test_same_value_short_circuits() {
        let key = Probe::Plain(7);
        let node = insert(&Node::empty(), key.clone(), 1);
        let hash = hash_of(&key);

        assert!(node.updated(key.clone(), hash, 1, 0, &equal).is_none());
        assert!(node.updated(key, hash, 2, 0, &equal).is_some());
    }

    #[rstest]
    fn test_leaf_collision_on_block_grows_tree() {
        let first = Probe::Plain(0);
        let second = plain_keys_matching(hash_of(&first), BITS_PER_LEVEL, 1).remove(0);
        let branch = branch_of(hash_of(&first), 0);

        let node = build(&[first.clone(), second.clone()]);

        assert_eq!(node.tree_map(), branch);
        assert_eq!(node.leaf_map(), 0);
        assert!(node.values().is_empty());
        assert_eq!(lookup(&node, &first), Some(0));
        assert_eq!(lookup(&node, &second), Some(1));
        assert_valid(&node, 2);
    }

    #[rstest]
    fn test_hashes_sharing_thirty_bits_reach_deepest_level() {
        let (first, second) = plain_pair_sharing(MAX_SHIFT);
        let node = build(&[first.clone(), second.clone()]);

        assert_eq!(depth(&node), 7);
        assert_eq!(lookup(&node, &first), Some(0));
        assert_eq!(lookup(&node, &second), Some(1));
        assert_valid(&node, 2);

        let removed = remove(&node, &first).unwrap();
        assert_eq!(depth(&removed), 1);
        assert_eq!(lookup(&removed, &second), Some(1));
        assert_valid(&removed, 1);
    }

    #[rstest]
    fn test_equal_hashes_form_knot_without_value_slot() {
        let keys: Vec<Probe> = (0..3).map(Probe::Colliding).collect();
        let branch = branch_of(colliding_hash(), 0);
        let node = build(&keys);

        assert_eq!(node.tree_map(), branch);
        assert_eq!(node.leaf_map(), branch);
        assert_eq!(node.slots().len(), 1);
        assert!(node.values().is_empty());
        for (index, key) in keys.iter().enumerate() {
            assert_eq!(lookup(&node, key), Some(u32::try_from(index).unwrap()));
        }
        assert_eq!(lookup(&node, &Probe::Colliding(9)), None);
        assert_valid(&node, 3);
    }

    #[rstest]
    fn test_knot_next_to_leaves_keeps_value_indexes() {
        let mut keys: Vec<Probe> = (0..40).map(Probe::Plain).collect();
        keys.extend((0..2).map(Probe::Colliding));
        let node = build(&keys);

        for (index, key) in keys.iter().enumerate() {
            assert_eq!(lookup(&node, key), Some(u32::try_from(index).unwrap()));
        }
        assert_valid(&node, keys.len());
    }

    #[rstest]
    fn test_different_hash_in_knot_branch_pushes_knot_down() {
        let colliding: Vec<Probe> = (0..2).map(Probe::Colliding).collect();
        let neighbour = plain_keys_matching(colliding_hash(), BITS_PER_LEVEL, 1).remove(0);
        let branch = branch_of(colliding_hash(), 0);

        let mut keys = colliding.clone();
        keys.push(neighbour.clone());
        let node = build(&keys);

        assert_eq!(node.tree_map(), branch);
        assert_eq!(node.leaf_map(), 0);
        assert_eq!(lookup(&node, &neighbour), Some(2));
        assert_eq!(lookup(&node, &colliding[0]), Some(0));
        assert_eq!(lookup(&node, &colliding[1]), Some(1));
        assert_valid(&node, 3);

        let lifted = remove(&node, &neighbour).unwrap();
        assert_eq!(lifted.tree_map(), branch);
        assert_eq!(lifted.leaf_map(), branch);
        assert_valid(&lifted, 2);
    }

    // =========================================================================
    // Removal
    // =========================================================================

    #[rstest]
    fn test_remove_absent_key_is_unchanged() {
        let node = build(&[Probe::Plain(1), Probe::Plain(2)]);
        assert!(remove(&node, &Probe::Plain(3)).is_none());
        assert!(remove(&Node::empty(), &Probe::Plain(1)).is_none());
    }

    #[rstest]
    fn test_remove_last_leaf_empties_node() {
        let node = build(&[Probe::Plain(1)]);
        let removed = remove(&node, &Probe::Plain(1)).unwrap();
        assert!(removed.is_empty());
        assert!(removed.slots().is_empty());
        assert!(removed.values().is_empty());
    }

    #[rstest]
    fn test_remove_collapses_unary_subtree_into_leaf() {
        let first = Probe::Plain(0);
        let second = plain_keys_matching(hash_of(&first), BITS_PER_LEVEL, 1).remove(0);
        let branch = branch_of(hash_of(&first), 0);
        let node = build(&[first.clone(), second.clone()]);

        let collapsed = remove(&node, &second).unwrap();

        assert_eq!(collapsed.tree_map(), 0);
        assert_eq!(collapsed.leaf_map(), branch);
        assert_eq!(collapsed.values(), &[0]);
        assert_valid(&collapsed, 1);
    }

    #[rstest]
    fn test_knot_collapses_to_leaf_when_one_entry_remains() {
        let keys: Vec<Probe> = (0..3).map(Probe::Colliding).collect();
        let branch = branch_of(colliding_hash(), 0);
        let node = build(&keys);

        let two = remove(&node, &keys[1]).unwrap();
        assert_eq!(two.tree_map() & two.leaf_map(), branch);
        assert_valid(&two, 2);

        let one = remove(&two, &keys[0]).unwrap();
        assert_eq!(one.tree_map(), 0);
        assert_eq!(one.leaf_map(), branch);
        assert_eq!(one.values(), &[2]);
        assert_eq!(lookup(&one, &keys[2]), Some(2));
        assert_valid(&one, 1);

        let none = remove(&one, &keys[2]).unwrap();
        assert!(none.is_empty());
    }

    #[rstest]
    fn test_remove_each_key_keeps_the_rest() {
        let mut keys: Vec<Probe> = (0..120).map(Probe::Plain).collect();
        keys.extend((0..4).map(Probe::Colliding));
        let node = build(&keys);

        for (removed_index, removed_key) in keys.iter().enumerate() {
            let removed = remove(&node, removed_key).unwrap();
            assert_valid(&removed, keys.len() - 1);
            assert_eq!(lookup(&removed, removed_key), None);
            for (index, key) in keys.iter().enumerate().filter(|(index, _)| *index != removed_index) {
                assert_eq!(lookup(&removed, key), Some(u32::try_from(index).unwrap()));
            }
            let restored = insert(&removed, removed_key.clone(), 999);
            assert_valid(&restored, keys.len());
            assert_eq!(lookup(&restored, removed_key), Some(999));
        }
        assert_valid(&node, keys.len());
    }

    #[rstest]
    fn test_remove_everything_in_any_order_empties_node() {
        let keys: Vec<Probe> = (0..300).map(Probe::Plain).collect();
        let mut node = build(&keys);
        for key in keys.iter().rev().step_by(2).chain(keys.iter().step_by(2)) {
            node = remove(&node, key).unwrap();
            node.validate(0, 0, true).unwrap();
        }
        assert!(node.is_empty());
    }

    // =========================================================================
    // Canonical Order
    // =========================================================================

    #[rstest]
    fn test_first_of_empty_node() {
        assert!(Node::empty().first().is_none());
    }

    #[rstest]
    fn test_next_after_visits_every_entry_once() {
        let mut keys: Vec<Probe> = (0..250).map(Probe::Plain).collect();
        keys.extend((0..3).map(Probe::Colliding));
        let node = build(&keys);

        let visited = canonical_keys(&node);
        assert_eq!(visited.len(), keys.len());
        for key in &keys {
            assert_eq!(visited.iter().filter(|visited| *visited == key).count(), 1);
        }
    }

    #[rstest]
    fn test_next_after_follows_branch_order_at_root() {
        let keys: Vec<Probe> = (0..8).map(Probe::Plain).collect();
        let node = build(&keys);
        let blocks: Vec<u32> = canonical_keys(&node)
            .iter()
            .map(|key| block_of(hash_of(key), 0))
            .collect();
        assert!(blocks.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[rstest]
    fn test_next_after_absent_key_skips_its_position() {
        let node = build(&[Probe::Plain(1)]);
        let absent = Probe::Plain(2);
        let found = node.next_after(&absent, hash_of(&absent), 0);
        let present_block = block_of(hash_of(&Probe::Plain(1)), 0);
        let absent_block = block_of(hash_of(&absent), 0);
        assert_eq!(found.is_some(), present_block > absent_block);
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[rstest]
    fn test_validate_reports_slot_payload_mismatch() {
        let child = build(&[Probe::Plain(1), Probe::Plain(2)]);
        let node = Node {
            tree_map: 0,
            leaf_map: 1,
            slots: Box::new([Slot::Tree(ReferenceCounter::new(child))]),
            values: Box::new([0]),
        };
        assert_eq!(
            node.validate(0, 0, true),
            Err(InvariantViolation::BranchKind {
                shift: 0,
                block: 0,
                expected: "LEAF",
                actual: "TREE",
            })
        );
    }

    #[rstest]
    fn test_validate_reports_reserved_knot_value_slot() {
        let node = Node {
            tree_map: 1,
            leaf_map: 1,
            slots: Box::new([Slot::Knot(ReferenceCounter::new(Knot::pair(
                0,
                (Probe::Plain(1), 1),
                (Probe::Plain(2), 2),
            )))]),
            values: Box::new([0]),
        };
        assert_eq!(
            node.validate(0, 0, true),
            Err(InvariantViolation::ValueCount {
                shift: 0,
                expected: 0,
                actual: 1,
            })
        );
    }

    #[rstest]
    fn test_validate_reports_misplaced_key() {
        let key = Probe::Plain(5);
        let wrong_block = (block_of(hash_of(&key), 0) + 1) % 32;
        let node = Node {
            tree_map: 0,
            leaf_map: 1 << wrong_block,
            slots: Box::new([Slot::Leaf(key)]),
            values: Box::new([0]),
        };
        assert_eq!(
            node.validate(0, 0, true),
            Err(InvariantViolation::MisplacedKey {
                shift: 0,
                block: wrong_block,
            })
        );
    }

    #[rstest]
    fn test_validate_reports_unary_child() {
        let key = Probe::Plain(5);
        let block = block_of(hash_of(&key), 0);
        let child = build(&[key]);
        let node = Node {
            tree_map: 1 << block,
            leaf_map: 0,
            slots: Box::new([Slot::Tree(ReferenceCounter::new(child))]),
            values: Box::default(),
        };
        assert_eq!(
            node.validate(0, 0, true),
            Err(InvariantViolation::UnaryChild { shift: 0, block })
        );
    }

    #[rstest]
    fn test_validate_reports_empty_subtree() {
        let node = Node {
            tree_map: 1,
            leaf_map: 0,
            slots: Box::new([Slot::Tree(ReferenceCounter::new(Node::empty()))]),
            values: Box::default(),
        };
        assert_eq!(
            node.validate(0, 0, true),
            Err(InvariantViolation::EmptySubtree { shift: 5 })
        );
    }

    #[rstest]
    #[should_panic(expected = "branch classified LEAF holds a TREE slot")]
    fn test_lookup_through_corrupted_branch_panics() {
        let child = build(&[Probe::Plain(1), Probe::Plain(2)]);
        let key = Probe::Plain(3);
        let block = block_of(hash_of(&key), 0);
        let node = Node {
            tree_map: 0,
            leaf_map: 1 << block,
            slots: Box::new([Slot::Tree(ReferenceCounter::new(child))]),
            values: Box::new([0]),
        };
        let _ = lookup(&node, &key);
    }

    #[rstest]
    #[case(0, 0x1F)]
    #[case(5, 0x3FF)]
    #[case(25, 0x3FFF_FFFF)]
    #[case(30, u32::MAX)]
    fn test_path_mask(#[case] shift: u32, #[case] expected: u32) {
        assert_eq!(path_mask(shift), expected);
    }
}
