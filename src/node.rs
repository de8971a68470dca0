//! Carrier tree and version nodes.
//!
//! The carrier is a fixed-shape segment tree over a half-open integer
//! interval, built once at construction and never restructured. All mutable
//! state lives in each node's `version` cell: an atomic pointer to an
//! immutable [`Version`] describing the subtree's current aggregate.

use std::ptr;
use std::sync::atomic::Ordering;

use crossbeam_epoch::Atomic;

/// Sibling subtrees narrower than this are torn down sequentially.
const PARALLEL_TEARDOWN_SPAN: i64 = 1 << 12;

/// Immutable descriptor of a subtree's aggregate state.
///
/// A version is fully populated before its address is published through a
/// carrier node's `version` cell and is frozen from then on. The captured
/// child pointers record which child versions the aggregate was computed
/// from; they are kept for identity comparisons only and must never be
/// dereferenced after publication, because the children may since have been
/// superseded and reclaimed.
pub(crate) struct Version<V> {
    pub(crate) size: usize,
    left: *const Version<V>,
    right: *const Version<V>,
    pub(crate) value: Option<V>,
}

impl<V> Version<V> {
    /// An unoccupied leaf.
    pub(crate) fn empty() -> Self {
        Version {
            size: 0,
            left: ptr::null(),
            right: ptr::null(),
            value: None,
        }
    }

    /// An occupied leaf holding `value`.
    pub(crate) fn occupied(value: V) -> Self {
        Version {
            size: 1,
            left: ptr::null(),
            right: ptr::null(),
            value: Some(value),
        }
    }

    /// An internal aggregate computed from the two captured child versions.
    pub(crate) fn aggregate(size: usize, left: *const Version<V>, right: *const Version<V>) -> Self {
        Version {
            size,
            left,
            right,
            value: None,
        }
    }

    /// The child versions this aggregate was computed from, for identity
    /// comparison only.
    pub(crate) fn captured(&self) -> (*const Version<V>, *const Version<V>) {
        (self.left, self.right)
    }
}

/// A carrier node. The interval, children, and parent back-reference are
/// written once during construction; only `version` changes afterwards.
pub(crate) struct Node<V> {
    pub(crate) is_leaf: bool,
    pub(crate) lo: i64,
    pub(crate) hi: i64,
    pub(crate) parent: *const Node<V>,
    pub(crate) left: *mut Node<V>,
    pub(crate) right: *mut Node<V>,
    pub(crate) version: Atomic<Version<V>>,
}

// The child/parent pointers are confined to the owning set, which frees them
// exactly once in its teardown; versions move between threads only behind an
// epoch guard.
unsafe impl<V: Send> Send for Node<V> {}
unsafe impl<V: Send + Sync> Sync for Node<V> {}

impl<V> Node<V> {
    #[inline]
    pub(crate) fn in_range(&self, key: i64) -> bool {
        self.lo <= key && key < self.hi
    }
}

/// Build the carrier subtree covering `[lo, hi)` by midpoint bisection.
///
/// Every node is published with an initial version before its address can
/// escape: leaves get an empty version, internal nodes an aggregate of size
/// zero capturing both children's initial versions.
pub(crate) fn build<V>(parent: *const Node<V>, lo: i64, hi: i64) -> *mut Node<V> {
    debug_assert!(lo < hi);
    let node = Box::into_raw(Box::new(Node {
        is_leaf: hi - lo == 1,
        lo,
        hi,
        parent,
        left: ptr::null_mut(),
        right: ptr::null_mut(),
        version: Atomic::null(),
    }));
    unsafe {
        if (*node).is_leaf {
            (*node).version = Atomic::new(Version::empty());
            return node;
        }
        let mid = lo + (hi - lo) / 2;
        (*node).left = build(node, lo, mid);
        (*node).right = build(node, mid, hi);

        let guard = crossbeam_epoch::unprotected();
        let lv = (*(*node).left).version.load(Ordering::Relaxed, guard);
        let rv = (*(*node).right).version.load(Ordering::Relaxed, guard);
        (*node).version = Atomic::new(Version::aggregate(0, lv.as_raw(), rv.as_raw()));
    }
    node
}

/// Free a carrier subtree and every node's current version.
///
/// Caller contract: exclusive access, no operation in flight anywhere in the
/// tree. Sibling subtrees above [`PARALLEL_TEARDOWN_SPAN`] are freed in
/// parallel.
pub(crate) fn teardown<V: Send>(node: Box<Node<V>>) {
    unsafe {
        let guard = crossbeam_epoch::unprotected();
        let version = node.version.load(Ordering::Relaxed, guard);
        if !version.is_null() {
            drop(version.into_owned());
        }
    }
    if node.is_leaf {
        return;
    }
    let left = unsafe { Box::from_raw(node.left) };
    let right = unsafe { Box::from_raw(node.right) };
    if node.hi - node.lo >= PARALLEL_TEARDOWN_SPAN {
        rayon::join(|| teardown(left), || teardown(right));
    } else {
        teardown(left);
        teardown(right);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_well_formed(node: &Node<()>, expected_parent: *const Node<()>) {
        assert!(node.lo < node.hi);
        assert_eq!(node.parent, expected_parent);
        assert_eq!(node.is_leaf, node.hi - node.lo == 1);
        if node.is_leaf {
            assert!(node.left.is_null());
            assert!(node.right.is_null());
            return;
        }
        let (left, right) = unsafe { (&*node.left, &*node.right) };
        // Children partition the parent's interval exactly.
        assert_eq!(left.lo, node.lo);
        assert_eq!(left.hi, right.lo);
        assert_eq!(right.hi, node.hi);
        assert_well_formed(left, node as *const _);
        assert_well_formed(right, node as *const _);
    }

    fn count_leaves(node: &Node<()>) -> usize {
        if node.is_leaf {
            return 1;
        }
        unsafe { count_leaves(&*node.left) + count_leaves(&*node.right) }
    }

    #[test]
    fn build_covers_interval_with_unit_leaves() {
        for span in [1i64, 2, 3, 8, 13, 100] {
            let root = build::<()>(ptr::null(), 0, span);
            let root_ref = unsafe { &*root };
            assert_well_formed(root_ref, ptr::null());
            assert_eq!(count_leaves(root_ref), span as usize);
            teardown(unsafe { Box::from_raw(root) });
        }
    }

    #[test]
    fn initial_versions_are_empty_aggregates() {
        let root = build::<()>(ptr::null(), -4, 4);
        unsafe {
            let guard = crossbeam_epoch::unprotected();
            let root_ref = &*root;
            let version = root_ref.version.load(Ordering::Relaxed, guard);
            assert_eq!(version.deref().size, 0);

            // The root aggregate captured exactly its children's versions.
            let lv = (*root_ref.left).version.load(Ordering::Relaxed, guard);
            let rv = (*root_ref.right).version.load(Ordering::Relaxed, guard);
            assert_eq!(version.deref().captured(), (lv.as_raw(), rv.as_raw()));

            teardown(Box::from_raw(root));
        }
    }

    #[test]
    fn negative_ranges_bisect_correctly() {
        let root = build::<()>(ptr::null(), -7, 5);
        let root_ref = unsafe { &*root };
        assert_well_formed(root_ref, ptr::null());
        assert_eq!(count_leaves(root_ref), 12);
        assert!(root_ref.in_range(-7));
        assert!(root_ref.in_range(4));
        assert!(!root_ref.in_range(5));
        assert!(!root_ref.in_range(-8));
        teardown(unsafe { Box::from_raw(root) });
    }
}
