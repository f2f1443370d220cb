//! Error types reported by trie structure validation.
//!
//! Normal operation has no recoverable errors: absent keys are `None` and
//! removing an absent key returns the receiver unchanged. The only error in
//! the crate describes a broken structural invariant, found by walking a
//! trie with [`HashTrieMap::validate`](crate::HashTrieMap::validate) or
//! [`HashTrieSet::validate`](crate::HashTrieSet::validate).

use std::fmt;

/// A structural invariant of a trie node that does not hold.
///
/// Every variant carries the bit shift of the level where the violation was
/// found; `block` is the 5-bit branch index within that level.
///
/// # Examples
///
/// ```rust
/// use hashtrie::InvariantViolation;
///
/// let error = InvariantViolation::SlotCount {
///     shift: 5,
///     expected: 3,
///     actual: 2,
/// };
/// assert_eq!(
///     format!("{}", error),
///     "node at shift 5: expected 3 branch slots, found 2"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// The number of branch slots differs from `popcount(tree_map | leaf_map)`.
    SlotCount {
        /// Shift of the offending node.
        shift: u32,
        /// Slot count implied by the bitmaps.
        expected: usize,
        /// Slot count actually stored.
        actual: usize,
    },
    /// The number of value slots differs from the number of LEAF branches.
    ValueCount {
        /// Shift of the offending node.
        shift: u32,
        /// Value count implied by the bitmaps.
        expected: usize,
        /// Value count actually stored.
        actual: usize,
    },
    /// A slot's payload does not match the bitmap classification of its branch.
    BranchKind {
        /// Shift of the offending node.
        shift: u32,
        /// Branch index within the node.
        block: u32,
        /// Classification derived from the bitmaps.
        expected: &'static str,
        /// Payload found in the slot.
        actual: &'static str,
    },
    /// A key is stored under a branch path its hash does not lead to.
    MisplacedKey {
        /// Shift of the offending node.
        shift: u32,
        /// Branch index holding the key.
        block: u32,
    },
    /// A node other than the root holds no entries.
    EmptySubtree {
        /// Shift of the empty node.
        shift: u32,
    },
    /// A sub-node holds a single leaf or knot that should have been lifted
    /// into its parent.
    UnaryChild {
        /// Shift of the parent node.
        shift: u32,
        /// Branch index of the child in the parent.
        block: u32,
    },
    /// A collision knot holds fewer than two entries.
    UndersizedKnot {
        /// Shift of the node owning the knot.
        shift: u32,
        /// Number of entries found.
        length: usize,
    },
    /// A knot entry's hash differs from the knot's shared hash.
    KnotHash {
        /// Shift of the node owning the knot.
        shift: u32,
        /// The knot's shared hash.
        expected: u32,
        /// The hash of the offending key.
        actual: u32,
    },
    /// A sub-node sits deeper than the 32-bit hash can address.
    DepthExceeded {
        /// Shift of the offending node.
        shift: u32,
    },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SlotCount {
                shift,
                expected,
                actual,
            } => write!(
                formatter,
                "node at shift {shift}: expected {expected} branch slots, found {actual}"
            ),
            Self::ValueCount {
                shift,
                expected,
                actual,
            } => write!(
                formatter,
                "node at shift {shift}: expected {expected} value slots, found {actual}"
            ),
            Self::BranchKind {
                shift,
                block,
                expected,
                actual,
            } => write!(
                formatter,
                "node at shift {shift}: branch {block} is classified {expected} but holds {actual}"
            ),
            Self::MisplacedKey { shift, block } => write!(
                formatter,
                "node at shift {shift}: branch {block} holds a key hashed to another path"
            ),
            Self::EmptySubtree { shift } => {
                write!(formatter, "node at shift {shift}: sub-node holds no entries")
            }
            Self::UnaryChild { shift, block } => write!(
                formatter,
                "node at shift {shift}: branch {block} points to a single-entry sub-node"
            ),
            Self::UndersizedKnot { shift, length } => write!(
                formatter,
                "node at shift {shift}: knot holds {length} entries, at least 2 required"
            ),
            Self::KnotHash {
                shift,
                expected,
                actual,
            } => write!(
                formatter,
                "node at shift {shift}: knot hash {expected:#010x} holds a key hashed {actual:#010x}"
            ),
            Self::DepthExceeded { shift } => {
                write!(formatter, "node at shift {shift}: hash bits exhausted")
            }
        }
    }
}

impl std::error::Error for InvariantViolation {}
