//! Persistent (immutable) hash trie map.
//!
//! This module provides [`HashTrieMap`], an immutable map that shares every
//! unmodified sub-trie between versions.
//!
//! # Overview
//!
//! - O(log32 N) `get`, `updated` and `removed`
//! - O(1) `is_empty`
//! - O(N) `len`: the size is counted by walking the trie, never cached
//!
//! A retained map is a snapshot: it stays valid and unchanged however many
//! versions are derived from it, which is what lets a caller publish new
//! versions with a single compare-and-swap of a shared root while readers
//! keep iterating old ones.
//!
//! # Examples
//!
//! ```rust
//! use hashtrie::HashTrieMap;
//!
//! let routes = HashTrieMap::new()
//!     .updated("warp://node/a".to_string(), 1)
//!     .updated("warp://node/b".to_string(), 2);
//!
//! let pruned = routes.removed("warp://node/a");
//!
//! assert_eq!(routes.get("warp://node/a"), Some(&1)); // Snapshot unchanged
//! assert_eq!(pruned.get("warp://node/a"), None);
//! assert_eq!(pruned.get("warp://node/b"), Some(&2));
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::{FromIterator, FusedIterator};

use crate::error::InvariantViolation;
use crate::hash::{UnorderedHash, hash_of, mix};
use crate::trie::{Cursor, ReferenceCounter, TrieNode};

/// Seed of [`HashTrieMap::hash_code`].
const MAP_SEED: u32 = 0x4854_4d50;

// =============================================================================
// HashTrieMap Definition
// =============================================================================

/// A persistent (immutable) hash map based on a hash trie.
///
/// Every branch of a trie node is VOID, a LEAF entry, a TREE sub-node or a
/// KNOT of entries whose keys share the full 32-bit hash. Updates rebuild only
/// the nodes on one root-to-leaf path.
///
/// # Time Complexity
///
/// | Operation      | Complexity        |
/// |----------------|-------------------|
/// | `empty`        | O(1)              |
/// | `get`          | O(log32 N)        |
/// | `updated`      | O(log32 N)        |
/// | `removed`      | O(log32 N)        |
/// | `contains_key` | O(log32 N)        |
/// | `next`         | O(log32 N)        |
/// | `len`          | O(N)              |
/// | `is_empty`     | O(1)              |
///
/// # Examples
///
/// ```rust
/// use hashtrie::HashTrieMap;
///
/// let map = HashTrieMap::singleton("key".to_string(), 42);
/// assert_eq!(map.get("key"), Some(&42));
/// ```
pub struct HashTrieMap<K, V> {
    /// Root node; `None` for the empty map.
    root: Option<ReferenceCounter<TrieNode<K, V>>>,
}

impl<K, V> HashTrieMap<K, V> {
    /// Returns the empty map.
    ///
    /// The empty map allocates nothing, so every empty map is the same
    /// constant value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieMap;
    ///
    /// const ROUTES: HashTrieMap<String, u32> = HashTrieMap::empty();
    /// assert!(ROUTES.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self { root: None }
    }

    /// Creates a new empty map. Same as [`HashTrieMap::empty`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieMap;
    ///
    /// let map: HashTrieMap<String, i32> = HashTrieMap::new();
    /// assert!(map.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self::empty()
    }

    fn from_root(root: TrieNode<K, V>) -> Self {
        if root.is_empty() {
            Self::empty()
        } else {
            Self {
                root: Some(ReferenceCounter::new(root)),
            }
        }
    }

    /// Returns `true` if the map contains no entries.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieMap;
    ///
    /// let empty: HashTrieMap<String, i32> = HashTrieMap::new();
    /// assert!(empty.is_empty());
    ///
    /// let non_empty = empty.updated("key".to_string(), 42);
    /// assert!(!non_empty.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns the number of entries in the map.
    ///
    /// # Complexity
    ///
    /// O(N): the count is computed by walking the trie.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieMap;
    ///
    /// let map = HashTrieMap::new()
    ///     .updated("a".to_string(), 1)
    ///     .updated("b".to_string(), 2);
    /// assert_eq!(map.len(), 2);
    /// ```
    #[must_use]
    pub fn len(&self) -> usize {
        self.root.as_deref().map_or(0, TrieNode::len)
    }

    /// Returns `true` if both maps share the same root node.
    ///
    /// Pointer-equal maps are always equal; equal maps need not be
    /// pointer-equal.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieMap;
    ///
    /// let map = HashTrieMap::new().updated(1, "one");
    /// assert!(map.ptr_eq(&map.removed(&2)));
    /// assert!(!map.ptr_eq(&map.updated(2, "two")));
    /// ```
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (None, None) => true,
            (Some(left), Some(right)) => ReferenceCounter::ptr_eq(left, right),
            _ => false,
        }
    }

    /// Returns the first entry in canonical order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieMap;
    ///
    /// let map = HashTrieMap::new().updated("only", 1);
    /// assert_eq!(map.head(), Some((&"only", &1)));
    /// assert_eq!(HashTrieMap::<&str, i32>::new().head(), None);
    /// ```
    #[must_use]
    pub fn head(&self) -> Option<(&K, &V)> {
        self.root.as_deref().and_then(TrieNode::first)
    }

    /// Returns the key of the first entry in canonical order.
    #[must_use]
    pub fn head_key(&self) -> Option<&K> {
        self.head().map(|(key, _)| key)
    }

    /// Returns the value of the first entry in canonical order.
    #[must_use]
    pub fn head_value(&self) -> Option<&V> {
        self.head().map(|(_, value)| value)
    }

    /// Returns an iterator over key-value pairs in canonical order.
    ///
    /// Canonical order is deterministic for a given trie shape but is not
    /// sorted by key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieMap;
    ///
    /// let map = HashTrieMap::new()
    ///     .updated("a".to_string(), 1)
    ///     .updated("b".to_string(), 2);
    ///
    /// let mut entries: Vec<_> = map.iter().collect();
    /// entries.sort();
    /// assert_eq!(entries, vec![(&"a".to_string(), &1), (&"b".to_string(), &2)]);
    /// ```
    #[must_use]
    pub fn iter(&self) -> HashTrieMapIterator<'_, K, V> {
        HashTrieMapIterator {
            cursor: Cursor::new(self.root.as_deref()),
        }
    }

    /// Returns an iterator over keys in canonical order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieMap;
    ///
    /// let map = HashTrieMap::new().updated(1, 'a').updated(2, 'b');
    /// let mut keys: Vec<_> = map.keys().copied().collect();
    /// keys.sort_unstable();
    /// assert_eq!(keys, vec![1, 2]);
    /// ```
    #[must_use]
    pub fn keys(&self) -> HashTrieMapKeys<'_, K, V> {
        HashTrieMapKeys { inner: self.iter() }
    }

    /// Returns an iterator over values in canonical order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieMap;
    ///
    /// let map = HashTrieMap::new()
    ///     .updated("a".to_string(), 1)
    ///     .updated("b".to_string(), 2);
    ///
    /// let sum: i32 = map.values().sum();
    /// assert_eq!(sum, 3);
    /// ```
    #[must_use]
    pub fn values(&self) -> HashTrieMapValues<'_, K, V> {
        HashTrieMapValues { inner: self.iter() }
    }
}

impl<K: Hash + Eq, V> HashTrieMap<K, V> {
    /// Returns a reference to the value corresponding to the key.
    ///
    /// The key may be any borrowed form of the map's key type, but `Hash` and
    /// `Eq` on the borrowed form must match those for the key type.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieMap;
    ///
    /// let map = HashTrieMap::new().updated("hello".to_string(), 42);
    ///
    /// // Can use &str to look up String keys
    /// assert_eq!(map.get("hello"), Some(&42));
    /// assert_eq!(map.get("world"), None);
    /// ```
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).map(|(_, value)| value)
    }

    /// Returns the stored key and value matching `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieMap;
    ///
    /// let map = HashTrieMap::new().updated("key".to_string(), 1);
    /// assert_eq!(map.get_key_value("key"), Some((&"key".to_string(), &1)));
    /// ```
    #[must_use]
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.root
            .as_deref()
            .and_then(|root| root.get(key, hash_of(key), 0))
    }

    /// Returns `true` if the map contains a value for the specified key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieMap;
    ///
    /// let map = HashTrieMap::new().updated("key".to_string(), 42);
    ///
    /// assert!(map.contains_key("key"));
    /// assert!(!map.contains_key("other"));
    /// ```
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).is_some()
    }

    /// Returns the entry following `key` in canonical order, or the first
    /// entry when `key` is `None`.
    ///
    /// Chaining `next` from `None` visits exactly the entries [`iter`]
    /// yields, in the same order, without keeping an iterator alive between
    /// calls. When `key` is not stored, the scan resumes after the position
    /// its hash would occupy.
    ///
    /// [`iter`]: HashTrieMap::iter
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieMap;
    ///
    /// let map: HashTrieMap<u32, u32> = (0..10).map(|index| (index, index * 2)).collect();
    ///
    /// let mut visited = Vec::new();
    /// let mut cursor = map.next(None);
    /// while let Some((key, _)) = cursor {
    ///     visited.push(*key);
    ///     cursor = map.next(Some(key));
    /// }
    ///
    /// let iterated: Vec<u32> = map.keys().copied().collect();
    /// assert_eq!(visited, iterated);
    /// ```
    #[must_use]
    pub fn next(&self, key: Option<&K>) -> Option<(&K, &V)> {
        match key {
            None => self.head(),
            Some(key) => self
                .root
                .as_deref()
                .and_then(|root| root.next_after(key, hash_of(key), 0)),
        }
    }

    /// Returns the key following `key` in canonical order.
    #[must_use]
    pub fn next_key(&self, key: Option<&K>) -> Option<&K> {
        self.next(key).map(|(key, _)| key)
    }

    /// Returns the value of the entry following `key` in canonical order.
    #[must_use]
    pub fn next_value(&self, key: Option<&K>) -> Option<&V> {
        self.next(key).map(|(_, value)| value)
    }
}

impl<K: Hash + Eq + Clone, V: Clone> HashTrieMap<K, V> {
    /// Creates a map from key-value pairs; later pairs win on equal keys.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieMap;
    ///
    /// let map = HashTrieMap::of([("a", 1), ("b", 2), ("a", 3)]);
    /// assert_eq!(map.len(), 2);
    /// assert_eq!(map.get("a"), Some(&3));
    /// ```
    #[must_use]
    pub fn of<I: IntoIterator<Item = (K, V)>>(entries: I) -> Self {
        entries.into_iter().collect()
    }

    /// Creates a map containing a single key-value pair.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieMap;
    ///
    /// let map = HashTrieMap::singleton("key".to_string(), 42);
    /// assert_eq!(map.len(), 1);
    /// assert_eq!(map.get("key"), Some(&42));
    /// ```
    #[inline]
    #[must_use]
    pub fn singleton(key: K, value: V) -> Self {
        Self::new().updated(key, value)
    }

    /// Returns a map associating `key` with `value`.
    ///
    /// If the map already contains the key, its value is replaced and the
    /// stored key is kept.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieMap;
    ///
    /// let map1 = HashTrieMap::new().updated("key".to_string(), 1);
    /// let map2 = map1.updated("key".to_string(), 2);
    ///
    /// assert_eq!(map1.get("key"), Some(&1)); // Original unchanged
    /// assert_eq!(map2.get("key"), Some(&2)); // New version
    /// ```
    #[must_use]
    pub fn updated(&self, key: K, value: V) -> Self {
        self.updated_by(key, value, &|_, _| false)
    }

    /// Like [`updated`](HashTrieMap::updated), but returns a map sharing this
    /// map's root when `key` already maps to an equal value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieMap;
    ///
    /// let map = HashTrieMap::new().updated("key", 1);
    ///
    /// assert!(map.updated_if_changed("key", 1).ptr_eq(&map));
    /// assert!(!map.updated("key", 1).ptr_eq(&map));
    /// assert_eq!(map.updated_if_changed("key", 2).get("key"), Some(&2));
    /// ```
    #[must_use]
    pub fn updated_if_changed(&self, key: K, value: V) -> Self
    where
        V: PartialEq,
    {
        self.updated_by(key, value, &|current, new| current == new)
    }

    fn updated_by<F>(&self, key: K, value: V, same: &F) -> Self
    where
        F: Fn(&V, &V) -> bool,
    {
        let hash = hash_of(&key);
        let updated = match self.root.as_deref() {
            Some(root) => root.updated(key, hash, value, 0, same),
            None => TrieNode::empty().updated(key, hash, value, 0, same),
        };
        updated.map_or_else(|| self.clone(), Self::from_root)
    }

    /// Returns a map without `key`.
    ///
    /// If the key is absent, the returned map shares this map's root.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieMap;
    ///
    /// let map = HashTrieMap::new()
    ///     .updated("a".to_string(), 1)
    ///     .updated("b".to_string(), 2);
    /// let removed = map.removed("a");
    ///
    /// assert_eq!(map.len(), 2);     // Original unchanged
    /// assert_eq!(removed.len(), 1); // New version
    /// assert_eq!(removed.get("a"), None);
    /// ```
    #[must_use]
    pub fn removed<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.root
            .as_deref()
            .and_then(|root| root.removed(key, hash_of(key), 0))
            .map_or_else(|| self.clone(), Self::from_root)
    }

    /// Updates or removes a value for a key using an updater function.
    ///
    /// The updater function receives `Some(&V)` if the key exists, or `None` if it doesn't.
    /// If the updater returns `Some(V)`, the value is inserted or updated.
    /// If the updater returns `None`, the key is removed (if it exists).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieMap;
    ///
    /// let map = HashTrieMap::new().updated("count".to_string(), 10);
    ///
    /// // Increment existing value
    /// let incremented = map.update_with("count", |current| current.map(|value| value + 1));
    /// assert_eq!(incremented.get("count"), Some(&11));
    ///
    /// // Insert if not exists
    /// let inserted = map.update_with("new_key", |current| Some(current.copied().unwrap_or(100)));
    /// assert_eq!(inserted.get("new_key"), Some(&100));
    ///
    /// // Remove by returning None
    /// let removed = map.update_with("count", |_| None);
    /// assert_eq!(removed.get("count"), None);
    /// ```
    #[must_use]
    pub fn update_with<Q, F>(&self, key: &Q, updater: F) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        let current = self.get_key_value(key);
        match (current, updater(current.map(|(_, value)| value))) {
            (Some((stored_key, _)), Some(value)) => self.updated(stored_key.clone(), value),
            (Some(_), None) => self.removed(key),
            (None, Some(value)) => self.updated(key.to_owned(), value),
            (None, None) => self.clone(),
        }
    }

    /// Merges two maps, with values from `other` taking precedence on key
    /// conflicts.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieMap;
    ///
    /// let map1 = HashTrieMap::new()
    ///     .updated("a".to_string(), 1)
    ///     .updated("b".to_string(), 2);
    /// let map2 = HashTrieMap::new()
    ///     .updated("b".to_string(), 20)
    ///     .updated("c".to_string(), 3);
    ///
    /// let merged = map1.merged(&map2);
    ///
    /// assert_eq!(merged.get("a"), Some(&1));
    /// assert_eq!(merged.get("b"), Some(&20)); // From map2
    /// assert_eq!(merged.get("c"), Some(&3));
    /// ```
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        if self.is_empty() {
            return other.clone();
        }
        other.iter().fold(self.clone(), |merged, (key, value)| {
            merged.updated(key.clone(), value.clone())
        })
    }
}

impl<K: Hash, V> HashTrieMap<K, V> {
    /// Walks the whole trie and checks its structural invariants.
    ///
    /// A map built only through this crate's API always validates; the check
    /// exists for tests and debugging.
    ///
    /// # Errors
    ///
    /// Returns the first [`InvariantViolation`] found.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieMap;
    ///
    /// let map: HashTrieMap<u32, u32> = (0..1000).map(|index| (index, index)).collect();
    /// assert!(map.validate().is_ok());
    /// ```
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        match self.root.as_deref() {
            Some(root) if root.is_empty() => Err(InvariantViolation::EmptySubtree { shift: 0 }),
            Some(root) => root.validate(0, 0, true).map(|_| ()),
            None => Ok(()),
        }
    }
}

impl<K: Hash, V: Hash> HashTrieMap<K, V> {
    /// Returns the order-independent 32-bit hash code of the map.
    ///
    /// Maps with equal entries have equal hash codes, whatever the order of
    /// the updates that built them.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieMap;
    ///
    /// let forward: HashTrieMap<u32, u32> = (0..100).map(|index| (index, index)).collect();
    /// let backward: HashTrieMap<u32, u32> = (0..100).rev().map(|index| (index, index)).collect();
    /// assert_eq!(forward.hash_code(), backward.hash_code());
    /// ```
    #[must_use]
    pub fn hash_code(&self) -> u32 {
        let mut code = UnorderedHash::new();
        for (key, value) in self {
            code.absorb(mix(hash_of(key), hash_of(value)));
        }
        code.finish(MAP_SEED)
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over key-value pairs of a [`HashTrieMap`].
pub struct HashTrieMapIterator<'a, K, V> {
    cursor: Cursor<'a, K, V>,
}

impl<'a, K, V> Iterator for HashTrieMapIterator<'a, K, V> {
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next()
    }
}

impl<K, V> FusedIterator for HashTrieMapIterator<'_, K, V> {}

impl<K, V> Clone for HashTrieMapIterator<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            cursor: self.cursor.clone(),
        }
    }
}

/// An iterator over the keys of a [`HashTrieMap`].
pub struct HashTrieMapKeys<'a, K, V> {
    inner: HashTrieMapIterator<'a, K, V>,
}

impl<'a, K, V> Iterator for HashTrieMapKeys<'a, K, V> {
    type Item = &'a K;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, _)| key)
    }
}

impl<K, V> FusedIterator for HashTrieMapKeys<'_, K, V> {}

/// An iterator over the values of a [`HashTrieMap`].
pub struct HashTrieMapValues<'a, K, V> {
    inner: HashTrieMapIterator<'a, K, V>,
}

impl<'a, K, V> Iterator for HashTrieMapValues<'a, K, V> {
    type Item = &'a V;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, value)| value)
    }
}

impl<K, V> FusedIterator for HashTrieMapValues<'_, K, V> {}

/// An owning iterator over key-value pairs of a [`HashTrieMap`].
pub struct HashTrieMapIntoIterator<K, V> {
    entries: std::vec::IntoIter<(K, V)>,
}

impl<K, V> Iterator for HashTrieMapIntoIterator<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl<K, V> ExactSizeIterator for HashTrieMapIntoIterator<K, V> {
    fn len(&self) -> usize {
        self.entries.len()
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, V> Clone for HashTrieMap<K, V> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
        }
    }
}

impl<K, V> Default for HashTrieMap<K, V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq + Clone, V: Clone> FromIterator<(K, V)> for HashTrieMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map = map.updated(key, value);
        }
        map
    }
}

impl<K: Clone, V: Clone> IntoIterator for HashTrieMap<K, V> {
    type Item = (K, V);
    type IntoIter = HashTrieMapIntoIterator<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        let entries: Vec<(K, V)> = self
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        HashTrieMapIntoIterator {
            entries: entries.into_iter(),
        }
    }
}

impl<'a, K, V> IntoIterator for &'a HashTrieMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = HashTrieMapIterator<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Hash + Eq, V: PartialEq> PartialEq for HashTrieMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, value)| other.get(key) == Some(value))
    }
}

impl<K: Hash + Eq, V: Eq> Eq for HashTrieMap<K, V> {}

impl<K: Hash, V: Hash> Hash for HashTrieMap<K, V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.hash_code());
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for HashTrieMap<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(feature = "arc")]
static_assertions::assert_impl_all!(HashTrieMap<String, i32>: Send, Sync);

#[cfg(not(feature = "arc"))]
static_assertions::assert_not_impl_any!(HashTrieMap<String, i32>: Send, Sync);

// =============================================================================
// Construction Macro
// =============================================================================

/// Creates a [`HashTrieMap`] containing the given entries.
///
/// # Examples
///
/// ```rust
/// use hashtrie::{HashTrieMap, hash_trie_map};
///
/// let map = hash_trie_map! {
///     "a" => 1,
///     "b" => 2,
/// };
/// assert_eq!(map.len(), 2);
/// assert_eq!(map.get("b"), Some(&2));
///
/// let empty: HashTrieMap<&str, i32> = hash_trie_map! {};
/// assert!(empty.is_empty());
/// ```
#[macro_export]
macro_rules! hash_trie_map {
    () => {
        $crate::HashTrieMap::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        $crate::HashTrieMap::new()$(.updated($key, $value))+
    };
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<K, V> serde::Serialize for HashTrieMap<K, V>
where
    K: serde::Serialize,
    V: serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(feature = "serde")]
struct HashTrieMapVisitor<K, V> {
    key_marker: std::marker::PhantomData<K>,
    value_marker: std::marker::PhantomData<V>,
}

#[cfg(feature = "serde")]
impl<K, V> HashTrieMapVisitor<K, V> {
    const fn new() -> Self {
        Self {
            key_marker: std::marker::PhantomData,
            value_marker: std::marker::PhantomData,
        }
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V> serde::de::Visitor<'de> for HashTrieMapVisitor<K, V>
where
    K: serde::Deserialize<'de> + Hash + Eq + Clone,
    V: serde::Deserialize<'de> + Clone,
{
    type Value = HashTrieMap<K, V>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        let mut map = HashTrieMap::new();
        while let Some((key, value)) = access.next_entry()? {
            map = map.updated(key, value);
        }
        Ok(map)
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V> serde::Deserialize<'de> for HashTrieMap<K, V>
where
    K: serde::Deserialize<'de> + Hash + Eq + Clone,
    V: serde::Deserialize<'de> + Clone,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_map(HashTrieMapVisitor::new())
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
    fn test_new_creates_empty() {
        let map: HashTrieMap<String, i32> = HashTrieMap::new();
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);
        assert!(map.validate().is_ok());
    }

    #[rstest]
    fn test_removing_last_entry_drops_root() {
        let map = HashTrieMap::singleton("key".to_string(), 1).removed("key");
        assert!(map.root.is_none());
        assert!(map.ptr_eq(&HashTrieMap::empty()));
    }

    #[rstest]
    fn test_updated_if_changed_keeps_root() {
        let map = HashTrieMap::new().updated(1, "one").updated(2, "two");
        let same = map.updated_if_changed(2, "two");
        assert!(same.ptr_eq(&map));
    }

    #[rstest]
    fn test_removed_absent_shares_root() {
        let map = HashTrieMap::new().updated(1, "one");
        assert!(map.removed(&5).ptr_eq(&map));
        let empty: HashTrieMap<i32, &str> = HashTrieMap::new();
        assert!(empty.removed(&5).ptr_eq(&empty));
    }

    #[rstest]
    fn test_debug_lists_entries() {
        let map = HashTrieMap::singleton("key", 1);
        assert_eq!(format!("{map:?}"), r#"{"key": 1}"#);
    }

    #[rstest]
    fn test_eq() {
        let map1 = HashTrieMap::new()
            .updated("a".to_string(), 1)
            .updated("b".to_string(), 2);
        let map2 = HashTrieMap::new()
            .updated("b".to_string(), 2)
            .updated("a".to_string(), 1);

        assert_eq!(map1, map2);
        assert_ne!(map1, map2.removed("a"));
        assert_ne!(map1, map2.updated("a".to_string(), 3));
    }
}
