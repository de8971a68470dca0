//! Concurrent augmented set implementation.
//!
//! This module contains the main [`AugmentedSet`] type: the public operation
//! surface, the leaf publish / root-ward propagate update protocol, and
//! teardown.

use std::marker::PhantomData;
use std::ops::{Bound, Range, RangeBounds};
use std::sync::atomic::Ordering;

use crossbeam_epoch::{self as epoch, Guard, Owned};

use crate::keys::DenseKey;
use crate::node::{build, teardown, Node, Version};
use crate::stats::{self, SetStats};

/// Key range covered by [`AugmentedSet::new`].
pub const DEFAULT_RANGE: Range<i64> = 0..100_010;

/// A concurrent, lock-free set over a dense integer key space, with an
/// optional value attached to each present key and a constant-time
/// cardinality query.
///
/// The set is carried by a fixed segment tree over a half-open key interval
/// chosen at construction. Each tree node publishes its subtree's current
/// state as an immutable version reached through a single atomic pointer;
/// mutators install a new leaf version with one compare-and-swap and then
/// walk toward the root refreshing the aggregates. A refresh that loses its
/// CAS twice at the same ancestor abandons the walk: the concurrent updater
/// that won is either still walking upward and will cover every remaining
/// ancestor, or already published an aggregate that reflects this thread's
/// leaf update. No operation ever blocks on another thread.
///
/// Readers run wait-free within an epoch: a lookup is one descent over the
/// immutable carrier plus one atomic load, and [`len`](Self::len) is a
/// single atomic load of the root aggregate. Replaced versions are reclaimed
/// through epoch-based reclamation, so a reader can keep using the version
/// it observed for as long as its operation runs.
///
/// The aggregate sizes at internal nodes are eventually consistent: a
/// concurrent [`len`](Self::len) or [`count_range`](Self::count_range)
/// reflects some recent state, and once all updates quiesce every aggregate
/// is exact.
///
/// ## Examples
///
/// Point operations and cardinality:
///
/// ```rust
/// use augset::AugmentedSet;
///
/// let set = AugmentedSet::<i64, &str>::with_capacity(100);
///
/// assert!(set.insert(3, "three"));
/// assert!(!set.insert(3, "again")); // already present
/// assert_eq!(set.find(3), Some("three"));
/// assert_eq!(set.len(), 1);
///
/// assert!(set.remove(3));
/// assert_eq!(set.find(3), None);
/// assert!(set.is_empty());
/// ```
///
/// Shared across threads without locks:
///
/// ```rust
/// use augset::AugmentedSet;
///
/// let set = AugmentedSet::<i64, u64>::with_capacity(1_000);
/// std::thread::scope(|s| {
///     for t in 0..4i64 {
///         let set = &set;
///         s.spawn(move || {
///             let mut k = t;
///             while k < 1_000 {
///                 set.insert(k, k as u64);
///                 k += 4;
///             }
///         });
///     }
/// });
/// assert_eq!(set.len(), 1_000);
/// ```
///
/// ## Type Parameters
///
/// - `K`: the key type, any primitive integer (see [`DenseKey`])
/// - `V`: the value stored with each present key
///
/// Keys outside the constructed range are rejected as not found; they are
/// never an error. The carrier tree is allocated eagerly, two nodes per unit
/// of range width, so the range should be sized to memory.
pub struct AugmentedSet<K, V>
where
    K: DenseKey,
    V: Send,
{
    root: *mut Node<V>,
    lo: i64,
    hi: i64,
    _phantom: PhantomData<K>,
}

unsafe impl<K: DenseKey, V: Send> Send for AugmentedSet<K, V> {}
unsafe impl<K: DenseKey, V: Send + Sync> Sync for AugmentedSet<K, V> {}

impl<K: DenseKey, V: Send> Default for AugmentedSet<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> AugmentedSet<K, V>
where
    K: DenseKey,
    V: Send,
{
    /// Create a set over [`DEFAULT_RANGE`].
    pub fn new() -> Self {
        Self::with_range(DEFAULT_RANGE.start, DEFAULT_RANGE.end)
    }

    /// Create a set over the key range `[0, capacity)`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_range(0, capacity as i64)
    }

    /// Create a set over the half-open key range `[lo, hi)`.
    ///
    /// # Panics
    ///
    /// Panics if the range is empty.
    pub fn with_range(lo: i64, hi: i64) -> Self {
        assert!(lo < hi, "key range must be non-empty");
        Self {
            root: build(std::ptr::null(), lo, hi),
            lo,
            hi,
            _phantom: PhantomData,
        }
    }

    /// The half-open key range this set covers.
    pub fn key_range(&self) -> Range<i64> {
        self.lo..self.hi
    }

    /// Insert `key` with `value`.
    ///
    /// Returns `true` iff this call transitioned the key from absent to
    /// present. Inserting a key that is already present, racing against a
    /// concurrent update of the same key, or passing a key outside the
    /// set's range all return `false` and leave the set unchanged.
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use augset::AugmentedSet;
    ///
    /// let set = AugmentedSet::<i64, u32>::with_range(0, 10);
    /// assert!(set.insert(4, 400));
    /// assert!(!set.insert(4, 401)); // present, value unchanged
    /// assert!(!set.insert(10, 0));  // out of range
    /// assert_eq!(set.find(4), Some(400));
    /// ```
    pub fn insert(&self, key: K, value: V) -> bool {
        let guard = epoch::pin();
        let Some(leaf) = self.locate(key.to_index()) else {
            return false;
        };

        let old = leaf.version.load(Ordering::Acquire, &guard);
        if unsafe { old.deref() }.size != 0 {
            return false;
        }

        let new = Owned::new(Version::occupied(value));
        match leaf
            .version
            .compare_exchange(old, new, Ordering::Release, Ordering::Relaxed, &guard)
        {
            Ok(_) => {
                unsafe { guard.defer_destroy(old) };
                self.propagate(leaf.parent, &guard);
                true
            }
            // The loser was never published; dropping the error frees it
            // immediately.
            Err(_) => false,
        }
    }

    /// Remove `key`.
    ///
    /// Returns `true` iff this call transitioned the key from present to
    /// absent; the symmetric counterpart of [`insert`](Self::insert).
    pub fn remove(&self, key: K) -> bool {
        let guard = epoch::pin();
        let Some(leaf) = self.locate(key.to_index()) else {
            return false;
        };

        let old = leaf.version.load(Ordering::Acquire, &guard);
        if unsafe { old.deref() }.size == 0 {
            return false;
        }

        let new = Owned::new(Version::empty());
        match leaf
            .version
            .compare_exchange(old, new, Ordering::Release, Ordering::Relaxed, &guard)
        {
            Ok(_) => {
                unsafe { guard.defer_destroy(old) };
                self.propagate(leaf.parent, &guard);
                true
            }
            Err(_) => false,
        }
    }

    /// Look up `key`, returning a copy of its value if present.
    ///
    /// Wait-free: one descent over the immutable carrier plus one atomic
    /// load. The value is cloned while the epoch guard keeps its version
    /// alive.
    pub fn find(&self, key: K) -> Option<V>
    where
        V: Clone,
    {
        let guard = epoch::pin();
        let leaf = self.locate(key.to_index())?;
        let version = unsafe { leaf.version.load(Ordering::Acquire, &guard).deref() };
        if version.size == 1 {
            version.value.clone()
        } else {
            None
        }
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: K) -> bool {
        let guard = epoch::pin();
        let Some(leaf) = self.locate(key.to_index()) else {
            return false;
        };
        unsafe { leaf.version.load(Ordering::Acquire, &guard).deref() }.size == 1
    }

    /// The number of keys present, as of some linearization point.
    ///
    /// A single atomic load of the root aggregate. Under concurrent updates
    /// the value reflects every update whose propagation has completed and
    /// may lag ones still in flight; at quiescence it is exact.
    pub fn len(&self) -> usize {
        let guard = epoch::pin();
        let root = unsafe { &*self.root };
        unsafe { root.version.load(Ordering::Acquire, &guard).deref() }.size
    }

    /// Whether the set is empty, as of some linearization point.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count the keys present in `range`.
    ///
    /// The query interval is decomposed into O(log n) carrier subtrees and
    /// their current aggregates are summed, so a prefix, suffix, or
    /// sub-range cardinality costs the same as a lookup. The bounds are
    /// clamped to the set's key range.
    ///
    /// Each summand is an atomic load of a live aggregate; the total carries
    /// the same eventual consistency as [`len`](Self::len) and is exact at
    /// quiescence.
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use augset::AugmentedSet;
    ///
    /// let set = AugmentedSet::<i64, ()>::with_capacity(100);
    /// for k in (0..100).step_by(2) {
    ///     set.insert(k, ());
    /// }
    /// assert_eq!(set.count_range(..50), 25);
    /// assert_eq!(set.count_range(50..), 25);
    /// assert_eq!(set.count_range(10..=20), 6);
    /// assert_eq!(set.count_range(..), 50);
    /// ```
    pub fn count_range<R>(&self, range: R) -> usize
    where
        R: RangeBounds<K>,
    {
        let lo = match range.start_bound() {
            Bound::Unbounded => self.lo,
            Bound::Included(&k) => k.to_index(),
            Bound::Excluded(&k) => k.to_index().saturating_add(1),
        };
        let hi = match range.end_bound() {
            Bound::Unbounded => self.hi,
            Bound::Included(&k) => k.to_index().saturating_add(1),
            Bound::Excluded(&k) => k.to_index(),
        };
        let lo = lo.max(self.lo);
        let hi = hi.min(self.hi);
        if lo >= hi {
            return 0;
        }
        let guard = epoch::pin();
        Self::count_covered(unsafe { &*self.root }, lo, hi, &guard)
    }

    /// Structural statistics and aggregate-consistency check.
    ///
    /// Walks the whole carrier, so it is intended for quiescent inspection;
    /// the `consistent` flag is only meaningful with no updates in flight.
    pub fn stats(&self) -> SetStats {
        let guard = epoch::pin();
        stats::collect(unsafe { &*self.root }, &guard)
    }

    /// Descend to the unique leaf whose unit interval contains `key`.
    ///
    /// Touches only immutable carrier structure: no synchronization, no
    /// contention.
    fn locate(&self, key: i64) -> Option<&Node<V>> {
        let mut node = unsafe { &*self.root };
        if !node.in_range(key) {
            return None;
        }
        while !node.is_leaf {
            let left = unsafe { &*node.left };
            node = if left.in_range(key) {
                left
            } else {
                unsafe { &*node.right }
            };
        }
        Some(node)
    }

    /// Lift a leaf change toward the root, refreshing each ancestor's
    /// aggregate.
    ///
    /// Each ancestor gets at most two refresh attempts. Two consecutive
    /// failures mean a concurrent updater published a newer aggregate here
    /// after our leaf CAS; that updater's walk covers every remaining
    /// ancestor, so we stop.
    fn propagate(&self, start: *const Node<V>, guard: &Guard) {
        let mut cur = unsafe { start.as_ref() };
        if let Some(node) = cur {
            if node.is_leaf {
                cur = unsafe { node.parent.as_ref() };
            }
        }
        while let Some(node) = cur {
            if !self.refresh(node, guard) && !self.refresh(node, guard) {
                return;
            }
            cur = unsafe { node.parent.as_ref() };
        }
    }

    /// One attempt to recompute an internal node's aggregate from its
    /// children's current versions.
    fn refresh(&self, node: &Node<V>, guard: &Guard) -> bool {
        let old = node.version.load(Ordering::Acquire, guard);

        let left = unsafe { &*node.left };
        let right = unsafe { &*node.right };
        let lv = left.version.load(Ordering::Acquire, guard);
        let rv = right.version.load(Ordering::Acquire, guard);
        let size = unsafe { lv.deref().size + rv.deref().size };

        let new = Owned::new(Version::aggregate(size, lv.as_raw(), rv.as_raw()));
        match node
            .version
            .compare_exchange(old, new, Ordering::Release, Ordering::Relaxed, guard)
        {
            Ok(_) => {
                unsafe { guard.defer_destroy(old) };
                true
            }
            Err(_) => false,
        }
    }

    fn count_covered(node: &Node<V>, lo: i64, hi: i64, guard: &Guard) -> usize {
        if lo <= node.lo && node.hi <= hi {
            return unsafe { node.version.load(Ordering::Acquire, guard).deref() }.size;
        }
        // A partially covered node is internal: a unit interval that
        // intersects the query is always fully covered.
        debug_assert!(!node.is_leaf);
        let left = unsafe { &*node.left };
        let right = unsafe { &*node.right };
        let mut count = 0;
        if lo < left.hi {
            count += Self::count_covered(left, lo, hi, guard);
        }
        if hi > right.lo {
            count += Self::count_covered(right, lo, hi, guard);
        }
        count
    }
}

impl<K, V> Drop for AugmentedSet<K, V>
where
    K: DenseKey,
    V: Send,
{
    fn drop(&mut self) {
        teardown(unsafe { Box::from_raw(self.root) });
    }
}
