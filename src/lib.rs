//! # augset: a concurrent, lock-free augmented set
//!
//! A non-blocking set over a dense integer key space, with an optional value
//! per key and O(log n) cardinality queries over any sub-range of the keys.
//!
//! ## Overview
//!
//! The set is carried by a segment tree whose shape is fixed at
//! construction: every leaf owns one key, every internal node owns the
//! union of its children's intervals, and nothing is ever rebalanced. Each
//! node publishes its subtree's current state as an immutable *version*
//! through a single atomic pointer, which gives the structure its
//! properties:
//!
//! - **Lock-free updates**: a mutator installs one new leaf version with a
//!   compare-and-swap, then refreshes the aggregates on the root path.
//!   Contention never blocks; a thread that loses a race hands the
//!   remaining work to the winner.
//! - **Wait-free reads**: lookups descend immutable structure and issue one
//!   atomic load; the set's cardinality is a single load of the root
//!   aggregate.
//! - **Safe reclamation**: superseded versions are retired through
//!   epoch-based reclamation, so readers keep a consistent view for the
//!   duration of their operation.
//!
//! ## Quick Start
//!
//! ```rust
//! use augset::AugmentedSet;
//!
//! // A set over the keys [0, 1000), with a &str attached to each.
//! let set = AugmentedSet::<i64, &str>::with_capacity(1000);
//!
//! assert!(set.insert(7, "seven"));
//! assert!(set.insert(400, "four hundred"));
//! assert_eq!(set.find(7), Some("seven"));
//! assert_eq!(set.len(), 2);
//!
//! // Cardinality over any prefix, suffix, or sub-range of the key space.
//! assert_eq!(set.count_range(..100), 1);
//! assert_eq!(set.count_range(100..), 1);
//!
//! assert!(set.remove(7));
//! assert_eq!(set.find(7), None);
//! ```
//!
//! All operations take `&self` and may be called from any number of threads
//! concurrently; see [`AugmentedSet`] for the consistency guarantees.
//!
//! ## Key Types
//!
//! Keys are primitive integers, abstracted by [`DenseKey`] and widened into
//! the `i64` index space the carrier is built over. Keys outside the
//! configured range are never errors: mutators return `false` and lookups
//! report the key absent.

// Private implementation module
mod node;

// Public API modules
pub mod keys;
pub mod stats;
pub mod tree;

// Re-export main types for convenience
pub use keys::DenseKey;
pub use stats::SetStats;
pub use tree::{AugmentedSet, DEFAULT_RANGE};
