//! The hash trie engine shared by [`HashTrieMap`](crate::HashTrieMap) and
//! [`HashTrieSet`](crate::HashTrieSet).
//!
//! A [`TrieNode`] has 32 branches, one per 5-bit slice of a key's 32-bit hash.
//! Two bitmaps classify every branch:
//!
//! | `tree_map` bit | `leaf_map` bit | branch                              |
//! |----------------|----------------|-------------------------------------|
//! | 0              | 0              | VOID: nothing stored                |
//! | 0              | 1              | LEAF: one key and its value         |
//! | 1              | 0              | TREE: a sub-node one level deeper   |
//! | 1              | 1              | KNOT: keys sharing one full hash    |
//!
//! Nodes are immutable once built. Every update rebuilds only the nodes on
//! the path from the root to the changed branch and shares everything else.

pub(crate) mod cursor;
pub(crate) mod knot;
pub(crate) mod node;

pub(crate) use cursor::Cursor;
pub(crate) use knot::Knot;
pub(crate) use node::TrieNode;

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer type.
///
/// When the `arc` feature is enabled, this is `std::sync::Arc`,
/// which is thread-safe but has slightly higher overhead.
///
/// When the `arc` feature is disabled (default), this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

// =============================================================================
// Constants
// =============================================================================

/// Hash bits consumed per trie level.
pub(crate) const BITS_PER_LEVEL: u32 = 5;

/// Mask selecting one 5-bit branch index.
pub(crate) const BRANCH_MASK: u32 = (1 << BITS_PER_LEVEL) - 1;

/// Shift of the deepest level; it reads the two top bits of the hash.
pub(crate) const MAX_SHIFT: u32 = 30;

/// Number of node levels a 32-bit hash can address.
pub(crate) const MAX_DEPTH: usize = (MAX_SHIFT / BITS_PER_LEVEL) as usize + 1;

static_assertions::const_assert!(MAX_SHIFT < u32::BITS);
static_assertions::const_assert!(MAX_SHIFT + BITS_PER_LEVEL >= u32::BITS);
static_assertions::const_assert_eq!(MAX_DEPTH, 7);

/// Branch index of `hash` at the level reading bits from `shift`.
#[inline]
pub(crate) const fn block_of(hash: u32, shift: u32) -> u32 {
    (hash >> shift) & BRANCH_MASK
}

/// Single-bit branch mask of `hash` at `shift`.
#[inline]
pub(crate) const fn branch_of(hash: u32, shift: u32) -> u32 {
    1 << block_of(hash, shift)
}

/// Compact index of `branch` within `bitmap`: the number of set bits below it.
#[inline]
pub(crate) const fn index_of(bitmap: u32, branch: u32) -> usize {
    (bitmap & (branch - 1)).count_ones() as usize
}

// =============================================================================
// Branch Classification
// =============================================================================

/// Classification of one branch of a node, derived from the two bitmaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BranchKind {
    Void = 0,
    Leaf = 1,
    Tree = 2,
    Knot = 3,
}

impl BranchKind {
    /// Classifies `branch` as `leaf_bit | (tree_bit << 1)`.
    #[inline]
    pub(crate) const fn classify(tree_map: u32, leaf_map: u32, branch: u32) -> Self {
        let leaf_bit = ((leaf_map & branch) != 0) as u8;
        let tree_bit = ((tree_map & branch) != 0) as u8;
        match leaf_bit | (tree_bit << 1) {
            0 => Self::Void,
            1 => Self::Leaf,
            2 => Self::Tree,
            3 => Self::Knot,
            _ => unreachable!(),
        }
    }

    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::Void => "VOID",
            Self::Leaf => "LEAF",
            Self::Tree => "TREE",
            Self::Knot => "KNOT",
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0b00, 0b00, BranchKind::Void)]
    #[case(0b00, 0b10, BranchKind::Leaf)]
    #[case(0b10, 0b00, BranchKind::Tree)]
    #[case(0b10, 0b10, BranchKind::Knot)]
    #[case(0b01, 0b01, BranchKind::Void)]
    fn test_classify(#[case] tree_map: u32, #[case] leaf_map: u32, #[case] expected: BranchKind) {
        assert_eq!(BranchKind::classify(tree_map, leaf_map, 0b10), expected);
    }

    #[rstest]
    fn test_classification_values_match_bit_encoding() {
        assert_eq!(BranchKind::Void as u8, 0);
        assert_eq!(BranchKind::Leaf as u8, 1);
        assert_eq!(BranchKind::Tree as u8, 2);
        assert_eq!(BranchKind::Knot as u8, 3);
    }

    #[rstest]
    #[case(0x0000_001F, 0, 31)]
    #[case(0x0000_0020, 5, 1)]
    #[case(0xC000_0000, 30, 3)]
    #[case(0x4000_0000, 30, 1)]
    #[case(0x0000_0000, 30, 0)]
    fn test_block_of(#[case] hash: u32, #[case] shift: u32, #[case] expected: u32) {
        assert_eq!(block_of(hash, shift), expected);
        assert_eq!(branch_of(hash, shift), 1_u32 << expected);
    }

    #[rstest]
    #[case(0b1011_0110, 0b0000_0001, 0)]
    #[case(0b1011_0110, 0b0000_0100, 1)]
    #[case(0b1011_0110, 0b0001_0000, 2)]
    #[case(0b1011_0110, 0b1000_0000, 4)]
    #[case(u32::MAX, 1 << 31, 31)]
    fn test_index_of(#[case] bitmap: u32, #[case] branch: u32, #[case] expected: usize) {
        assert_eq!(index_of(bitmap, branch), expected);
    }
}
