//! Collision knots: the entries of keys sharing one full 32-bit hash.
//!
//! Once two distinct keys agree on all 32 hash bits no further level can
//! separate them, so the branch holding them turns into a knot and lookups
//! degrade to a linear scan over the colliding keys only.

use std::borrow::Borrow;

use smallvec::SmallVec;

/// A linear association list of entries whose keys share `hash`.
///
/// Entries keep insertion order. A knot stored in a trie always holds at
/// least two entries; with one left it is turned back into a leaf.
#[derive(Clone)]
pub(crate) struct Knot<K, V> {
    hash: u32,
    entries: SmallVec<[(K, V); 2]>,
}

impl<K, V> Knot<K, V> {
    /// Creates a knot from the two entries whose collision produced it.
    pub(crate) fn pair(hash: u32, first: (K, V), second: (K, V)) -> Self {
        let mut entries = SmallVec::new();
        entries.push(first);
        entries.push(second);
        Self { hash, entries }
    }

    pub(crate) const fn hash(&self) -> u32 {
        self.hash
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn entries(&self) -> &[(K, V)] {
        &self.entries
    }

    pub(crate) fn first(&self) -> Option<(&K, &V)> {
        self.entries.first().map(|(key, value)| (key, value))
    }

    /// Returns the only entry when exactly one is left.
    pub(crate) fn single(&self) -> Option<(&K, &V)> {
        match self.entries.as_slice() {
            [(key, value)] => Some((key, value)),
            _ => None,
        }
    }

    pub(crate) fn get<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.position(key).map(|index| {
            let (entry_key, entry_value) = &self.entries[index];
            (entry_key, entry_value)
        })
    }

    /// Returns the entry stored after `key`.
    ///
    /// `None` when `key` is the last entry or is not stored here.
    pub(crate) fn next_after<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let index = self.position(key)?;
        self.entries
            .get(index + 1)
            .map(|(entry_key, entry_value)| (entry_key, entry_value))
    }

    fn position<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.entries
            .iter()
            .position(|(entry_key, _)| entry_key.borrow() == key)
    }
}

impl<K: Eq + Clone, V: Clone> Knot<K, V> {
    /// Associates `value` with `key`, which must hash to this knot.
    ///
    /// A known key keeps its position; a new key is appended. Returns `None`
    /// when `same` accepts the value already stored for `key`.
    pub(crate) fn updated<F>(&self, key: K, value: V, same: &F) -> Option<Self>
    where
        F: Fn(&V, &V) -> bool,
    {
        let mut entries = self.entries.clone();
        match self.position(&key) {
            Some(index) => {
                if same(&entries[index].1, &value) {
                    return None;
                }
                entries[index].1 = value;
            }
            None => entries.push((key, value)),
        }
        Some(Self {
            hash: self.hash,
            entries,
        })
    }

    /// Removes `key`; `None` when it is not stored here.
    pub(crate) fn removed<Q>(&self, key: &Q) -> Option<Self>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let index = self.position(key)?;
        let mut entries = self.entries.clone();
        entries.remove(index);
        Some(Self {
            hash: self.hash,
            entries,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
