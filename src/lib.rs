//! # hashtrie
//!
//! Persistent hash trie maps and sets with structural sharing.
//!
//! ## Overview
//!
//! Every update returns a new collection and leaves the receiver untouched.
//! The new version rebuilds only the nodes on one root-to-leaf path and shares
//! everything else with the old one, so keeping old versions around is cheap.
//!
//! - [`HashTrieMap`]: an immutable key-value map
//! - [`HashTrieSet`]: an immutable set
//!
//! Keys are hashed to 32 bits and consumed 5 bits per level. Keys whose full
//! hashes collide are kept together in a collision knot and told apart by
//! equality.
//!
//! ## Feature Flags
//!
//! - `arc`: share nodes through `Arc` instead of `Rc`, making the collections
//!   `Send` and `Sync`
//! - `serde`: `Serialize` and `Deserialize` for both collections
//! - `fxhash`: hash keys with `rustc_hash::FxBuildHasher`
//! - `full`: `arc` and `serde`
//!
//! ## Example
//!
//! ```rust
//! use hashtrie::prelude::*;
//!
//! let scores = hash_trie_map! {
//!     "alice".to_string() => 10,
//!     "bob".to_string() => 7,
//! };
//! let updated = scores.updated("bob".to_string(), 9);
//!
//! assert_eq!(scores.get("bob"), Some(&7));
//! assert_eq!(updated.get("bob"), Some(&9));
//!
//! let tags: HashTrieSet<&str> = hash_trie_set!["persistent", "trie"];
//! assert!(tags.contains("trie"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Prelude module for convenient imports.
///
/// # Usage
///
/// ```rust
/// use hashtrie::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::InvariantViolation;
    pub use crate::map::HashTrieMap;
    pub use crate::set::HashTrieSet;
    pub use crate::{hash_trie_map, hash_trie_set};
}

mod error;
mod hash;
pub mod map;
pub mod set;
mod trie;

pub use error::InvariantViolation;
pub use map::{
    HashTrieMap, HashTrieMapIntoIterator, HashTrieMapIterator, HashTrieMapKeys, HashTrieMapValues,
};
pub use set::{HashTrieSet, HashTrieSetIntoIterator, HashTrieSetIterator};
