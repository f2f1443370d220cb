//! Persistent (immutable) hash trie set.
//!
//! [`HashTrieSet`] is a hash trie whose entries carry no value. It shares the
//! node layout, the collision knots and the traversal of
//! [`HashTrieMap`](crate::HashTrieMap).
//!
//! # Examples
//!
//! ```rust
//! use hashtrie::HashTrieSet;
//!
//! let set = HashTrieSet::new().added(1).added(2).added(3);
//!
//! assert!(set.contains(&2));
//! assert!(!set.contains(&4));
//! assert_eq!(set.len(), 3);
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::{FromIterator, FusedIterator};

use crate::error::InvariantViolation;
use crate::hash::{UnorderedHash, hash_of};
use crate::trie::{Cursor, ReferenceCounter, TrieNode};

/// Seed of [`HashTrieSet::hash_code`].
const SET_SEED: u32 = 0x4854_5354;

// =============================================================================
// HashTrieSet Definition
// =============================================================================

/// A persistent (immutable) hash set based on a hash trie.
///
/// # Time Complexity
///
/// | Operation      | Complexity        |
/// |----------------|-------------------|
/// | `contains`     | O(log32 N)        |
/// | `added`        | O(log32 N)        |
/// | `removed`      | O(log32 N)        |
/// | `len`          | O(N)              |
/// | `is_empty`     | O(1)              |
/// | `union`        | O(m log32 (n+m))  |
/// | `intersection` | O(n log32 m)      |
/// | `difference`   | O(m log32 n)      |
///
/// # Examples
///
/// ```rust
/// use hashtrie::HashTrieSet;
///
/// let set1: HashTrieSet<i32> = [1, 2, 3].into_iter().collect();
/// let set2: HashTrieSet<i32> = [2, 3, 4].into_iter().collect();
///
/// let intersection = set1.intersection(&set2);
/// assert_eq!(intersection.len(), 2);
/// assert!(intersection.contains(&2));
/// assert!(intersection.contains(&3));
/// ```
pub struct HashTrieSet<T> {
    /// Root node; `None` for the empty set.
    root: Option<ReferenceCounter<TrieNode<T, ()>>>,
}

impl<T> HashTrieSet<T> {
    /// Returns the empty set.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieSet;
    ///
    /// const NONE: HashTrieSet<u8> = HashTrieSet::empty();
    /// assert!(NONE.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self { root: None }
    }

    /// Creates a new empty set. Same as [`HashTrieSet::empty`].
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self::empty()
    }

    fn from_root(root: TrieNode<T, ()>) -> Self {
        if root.is_empty() {
            Self::empty()
        } else {
            Self {
                root: Some(ReferenceCounter::new(root)),
            }
        }
    }

    /// Returns `true` if the set contains no elements.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns the number of elements in the set.
    ///
    /// # Complexity
    ///
    /// O(N): the count is computed by walking the trie.
    #[must_use]
    pub fn len(&self) -> usize {
        self.root.as_deref().map_or(0, TrieNode::len)
    }

    /// Returns `true` if both sets share the same root node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (None, None) => true,
            (Some(left), Some(right)) => ReferenceCounter::ptr_eq(left, right),
            _ => false,
        }
    }

    /// Returns the first element in canonical order.
    #[must_use]
    pub fn head(&self) -> Option<&T> {
        self.root
            .as_deref()
            .and_then(TrieNode::first)
            .map(|(element, ())| element)
    }

    /// Returns an iterator over the elements in canonical order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieSet;
    ///
    /// let set: HashTrieSet<i32> = [3, 1, 2].into_iter().collect();
    /// let mut elements: Vec<i32> = set.iter().copied().collect();
    /// elements.sort_unstable();
    /// assert_eq!(elements, vec![1, 2, 3]);
    /// ```
    #[must_use]
    pub fn iter(&self) -> HashTrieSetIterator<'_, T> {
        HashTrieSetIterator {
            cursor: Cursor::new(self.root.as_deref()),
        }
    }
}

impl<T: Hash + Eq> HashTrieSet<T> {
    /// Returns `true` if the set contains `element`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieSet;
    ///
    /// let set = HashTrieSet::new().added("hello".to_string());
    /// assert!(set.contains("hello"));
    /// assert!(!set.contains("world"));
    /// ```
    #[must_use]
    pub fn contains<Q>(&self, element: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(element).is_some()
    }

    /// Returns the stored element equal to `element`.
    #[must_use]
    pub fn get<Q>(&self, element: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.root
            .as_deref()
            .and_then(|root| root.get(element, hash_of(element), 0))
            .map(|(stored, ())| stored)
    }

    /// Returns the element following `element` in canonical order, or the
    /// first element when `element` is `None`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieSet;
    ///
    /// let set: HashTrieSet<u32> = (0..50).collect();
    ///
    /// let mut count = 0;
    /// let mut cursor = set.next(None);
    /// while let Some(element) = cursor {
    ///     count += 1;
    ///     cursor = set.next(Some(element));
    /// }
    /// assert_eq!(count, 50);
    /// ```
    #[must_use]
    pub fn next(&self, element: Option<&T>) -> Option<&T> {
        match element {
            None => self.head(),
            Some(element) => self
                .root
                .as_deref()
                .and_then(|root| root.next_after(element, hash_of(element), 0))
                .map(|(stored, ())| stored),
        }
    }

    /// Returns `true` if every element of `self` is in `other`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieSet;
    ///
    /// let small: HashTrieSet<i32> = [1, 2].into_iter().collect();
    /// let large: HashTrieSet<i32> = [1, 2, 3].into_iter().collect();
    /// assert!(small.is_subset(&large));
    /// assert!(!large.is_subset(&small));
    /// ```
    #[must_use]
    pub fn is_subset(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.iter().all(|element| other.contains(element))
    }

    /// Returns `true` if every element of `other` is in `self`.
    #[must_use]
    pub fn is_superset(&self, other: &Self) -> bool {
        other.is_subset(self)
    }

    /// Returns `true` if the sets have no element in common.
    #[must_use]
    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.iter().all(|element| !other.contains(element))
    }
}

impl<T: Hash + Eq + Clone> HashTrieSet<T> {
    /// Creates a set from elements.
    #[must_use]
    pub fn of<I: IntoIterator<Item = T>>(elements: I) -> Self {
        elements.into_iter().collect()
    }

    /// Creates a set containing a single element.
    #[inline]
    #[must_use]
    pub fn singleton(element: T) -> Self {
        Self::new().added(element)
    }

    /// Returns a set containing `element`.
    ///
    /// If the element is already present, the returned set shares this set's
    /// root.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieSet;
    ///
    /// let set1 = HashTrieSet::new().added(1);
    /// let set2 = set1.added(2);
    ///
    /// assert!(!set1.contains(&2)); // Original unchanged
    /// assert!(set2.contains(&2));
    /// assert!(set2.added(2).ptr_eq(&set2));
    /// ```
    #[must_use]
    pub fn added(&self, element: T) -> Self {
        let hash = hash_of(&element);
        let keep = |_: &(), _: &()| true;
        let updated = match self.root.as_deref() {
            Some(root) => root.updated(element, hash, (), 0, &keep),
            None => TrieNode::empty().updated(element, hash, (), 0, &keep),
        };
        updated.map_or_else(|| self.clone(), Self::from_root)
    }

    /// Returns a set without `element`.
    ///
    /// If the element is absent, the returned set shares this set's root.
    #[must_use]
    pub fn removed<Q>(&self, element: &Q) -> Self
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.root
            .as_deref()
            .and_then(|root| root.removed(element, hash_of(element), 0))
            .map_or_else(|| self.clone(), Self::from_root)
    }

    /// Returns the union of two sets.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieSet;
    ///
    /// let set1: HashTrieSet<i32> = [1, 2].into_iter().collect();
    /// let set2: HashTrieSet<i32> = [2, 3].into_iter().collect();
    ///
    /// let union = set1.union(&set2);
    /// assert_eq!(union.len(), 3);
    /// ```
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        if self.is_empty() {
            return other.clone();
        }
        other
            .iter()
            .fold(self.clone(), |union, element| union.added(element.clone()))
    }

    /// Returns the elements present in both sets.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        self.iter()
            .filter(|element| !other.contains(*element))
            .fold(self.clone(), |intersection, element| {
                intersection.removed(element)
            })
    }

    /// Returns the elements of `self` that are not in `other`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hashtrie::HashTrieSet;
    ///
    /// let set1: HashTrieSet<i32> = [1, 2, 3].into_iter().collect();
    /// let set2: HashTrieSet<i32> = [2, 3, 4].into_iter().collect();
    ///
    /// let difference = set1.difference(&set2);
    /// assert_eq!(difference.len(), 1);
    /// assert!(difference.contains(&1));
    /// ```
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        other
            .iter()
            .fold(self.clone(), |difference, element| difference.removed(element))
    }
}

impl<T: Hash> HashTrieSet<T> {
    /// Walks the whole trie and checks its structural invariants.
    ///
    /// # Errors
    ///
    /// Returns the first [`InvariantViolation`] found.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        match self.root.as_deref() {
            Some(root) if root.is_empty() => Err(InvariantViolation::EmptySubtree { shift: 0 }),
            Some(root) => root.validate(0, 0, true).map(|_| ()),
            None => Ok(()),
        }
    }

    /// Returns the order-independent 32-bit hash code of the set.
    #[must_use]
    pub fn hash_code(&self) -> u32 {
        let mut code = UnorderedHash::new();
        for element in self {
            code.absorb(hash_of(element));
        }
        code.finish(SET_SEED)
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over the elements of a [`HashTrieSet`].
pub struct HashTrieSetIterator<'a, T> {
    cursor: Cursor<'a, T, ()>,
}

impl<'a, T> Iterator for HashTrieSetIterator<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next().map(|(element, ())| element)
    }
}

impl<T> FusedIterator for HashTrieSetIterator<'_, T> {}

impl<T> Clone for HashTrieSetIterator<'_, T> {
    fn clone(&self) -> Self {
        Self {
            cursor: self.cursor.clone(),
        }
    }
}

/// An owning iterator over the elements of a [`HashTrieSet`].
pub struct HashTrieSetIntoIterator<T> {
    elements: std::vec::IntoIter<T>,
}

impl<T> Iterator for HashTrieSetIntoIterator<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.elements.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.elements.size_hint()
    }
}

impl<T> ExactSizeIterator for HashTrieSetIntoIterator<T> {
    fn len(&self) -> usize {
        self.elements.len()
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<T> Clone for HashTrieSet<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
        }
    }
}

impl<T> Default for HashTrieSet<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Hash + Eq + Clone> FromIterator<T> for HashTrieSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        for element in iter {
            set = set.added(element);
        }
        set
    }
}

impl<T: Clone> IntoIterator for HashTrieSet<T> {
    type Item = T;
    type IntoIter = HashTrieSetIntoIterator<T>;

    fn into_iter(self) -> Self::IntoIter {
        let elements: Vec<T> = self.iter().cloned().collect();
        HashTrieSetIntoIterator {
            elements: elements.into_iter(),
        }
    }
}

impl<'a, T> IntoIterator for &'a HashTrieSet<T> {
    type Item = &'a T;
    type IntoIter = HashTrieSetIterator<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Hash + Eq> PartialEq for HashTrieSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || (self.len() == other.len() && self.is_subset(other))
    }
}

impl<T: Hash + Eq> Eq for HashTrieSet<T> {}

impl<T: Hash> Hash for HashTrieSet<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.hash_code());
    }
}

impl<T: fmt::Debug> fmt::Debug for HashTrieSet<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(feature = "arc")]
static_assertions::assert_impl_all!(HashTrieSet<String>: Send, Sync);

#[cfg(not(feature = "arc"))]
static_assertions::assert_not_impl_any!(HashTrieSet<String>: Send, Sync);

// =============================================================================
// Construction Macro
// =============================================================================

/// Creates a [`HashTrieSet`] containing the given elements.
///
/// # Examples
///
/// ```rust
/// use hashtrie::{HashTrieSet, hash_trie_set};
///
/// let set = hash_trie_set![1, 2, 3, 2];
/// assert_eq!(set.len(), 3);
///
/// let empty: HashTrieSet<i32> = hash_trie_set![];
/// assert!(empty.is_empty());
/// ```
#[macro_export]
macro_rules! hash_trie_set {
    () => {
        $crate::HashTrieSet::new()
    };
    ($($element:expr),+ $(,)?) => {
        $crate::HashTrieSet::new()$(.added($element))+
    };
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<T: serde::Serialize> serde::Serialize for HashTrieSet<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;
        let mut sequence = serializer.serialize_seq(Some(self.len()))?;
        for element in self {
            sequence.serialize_element(element)?;
        }
        sequence.end()
    }
}

#[cfg(feature = "serde")]
struct HashTrieSetVisitor<T> {
    marker: std::marker::PhantomData<T>,
}

#[cfg(feature = "serde")]
impl<T> HashTrieSetVisitor<T> {
    const fn new() -> Self {
        Self {
            marker: std::marker::PhantomData,
        }
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::de::Visitor<'de> for HashTrieSetVisitor<T>
where
    T: serde::Deserialize<'de> + Hash + Eq + Clone,
{
    type Value = HashTrieSet<T>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a sequence")
    }

    fn visit_seq<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::SeqAccess<'de>,
    {
        let mut set = HashTrieSet::new();
        while let Some(element) = access.next_element()? {
            set = set.added(element);
        }
        Ok(set)
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::Deserialize<'de> for HashTrieSet<T>
where
    T: serde::Deserialize<'de> + Hash + Eq + Clone,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_seq(HashTrieSetVisitor::new())
    }
}

// =============================================================================
// Tests
// =============================================================================
