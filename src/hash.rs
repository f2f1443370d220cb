//! The 32-bit hash contract shared by every trie level.
//!
//! Keys only need [`Hash`] and [`Eq`]. Each key is hashed with a deterministic
//! [`BuildHasher`] and the 64-bit digest is folded down to the 32 bits the trie
//! consumes, 5 bits per level.
//!
//! The module also holds the Murmur3 mixing steps used to build the
//! order-independent hash codes of whole maps and sets.

use std::hash::{BuildHasher, Hash};

// =============================================================================
// Hash Builder Type Alias
// =============================================================================

/// Deterministic hash builder used for every key.
///
/// When the `fxhash` feature is enabled, this is `rustc_hash::FxBuildHasher`.
/// Otherwise it is the standard library's SipHash with fixed keys, so the
/// same key always lands in the same branch within a process.
#[cfg(feature = "fxhash")]
pub(crate) type HashBuilder = rustc_hash::FxBuildHasher;

#[cfg(not(feature = "fxhash"))]
pub(crate) type HashBuilder =
    std::hash::BuildHasherDefault<std::collections::hash_map::DefaultHasher>;

/// Computes the 32-bit trie hash of a key.
#[inline]
pub(crate) fn hash_of<Q: Hash + ?Sized>(key: &Q) -> u32 {
    fold(HashBuilder::default().hash_one(key))
}

/// Folds a 64-bit digest into 32 bits, keeping entropy from both halves.
#[inline]
#[allow(clippy::cast_possible_truncation)]
pub(crate) const fn fold(digest: u64) -> u32 {
    (digest ^ (digest >> 32)) as u32
}

// =============================================================================
// Murmur3 Mixing
// =============================================================================

/// Mixes `value` into the running hash `code` (one Murmur3 block step).
#[inline]
pub(crate) const fn mix(code: u32, value: u32) -> u32 {
    let value = value.wrapping_mul(0xcc9e_2d51).rotate_left(15).wrapping_mul(0x1b87_3593);
    (code ^ value)
        .rotate_left(13)
        .wrapping_mul(5)
        .wrapping_add(0xe654_6b64)
}

/// Murmur3 finalization avalanche.
#[inline]
pub(crate) const fn mash(code: u32) -> u32 {
    let code = (code ^ (code >> 16)).wrapping_mul(0x85eb_ca6b);
    let code = (code ^ (code >> 13)).wrapping_mul(0xc2b2_ae35);
    code ^ (code >> 16)
}

/// Accumulates entry hashes so that the result does not depend on the order
/// in which entries are visited.
///
/// Two tries holding the same entries in different shapes produce the same
/// code.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UnorderedHash {
    xor: u32,
    sum: u32,
    product: u32,
}

impl UnorderedHash {
    pub(crate) const fn new() -> Self {
        Self {
            xor: 0,
            sum: 0,
            product: 1,
        }
    }

    /// Absorbs one entry hash. Zero factors are skipped by the product.
    pub(crate) const fn absorb(&mut self, entry_hash: u32) {
        self.xor ^= entry_hash;
        self.sum = self.sum.wrapping_add(entry_hash);
        if entry_hash != 0 {
            self.product = self.product.wrapping_mul(entry_hash);
        }
    }

    pub(crate) const fn finish(self, seed: u32) -> u32 {
        mash(mix(mix(mix(seed, self.xor), self.sum), self.product))
    }
}

// =============================================================================
// Tests
// =============================================================================
