//! Statistics and introspection for the augmented set.
//!
//! Gathered by a full carrier walk, so collection is meant for quiescent
//! inspection in tests and debugging rather than for hot paths.

use std::sync::atomic::Ordering;

use crossbeam_epoch::Guard;

use crate::node::Node;

/// Structural statistics for one set, as observed by a single walk.
#[derive(Debug, Clone, Default)]
pub struct SetStats {
    /// Depth of the deepest leaf; 0 for a single-leaf carrier.
    pub height: usize,
    /// Number of internal carrier nodes.
    pub num_internal: usize,
    /// Number of leaves, equal to the key range width.
    pub num_leaves: usize,
    /// Number of occupied leaves.
    pub num_occupied: usize,
    /// The root's published aggregate size.
    pub root_size: usize,
    /// Whether every aggregate matched its children and every leaf held at
    /// most one element. Only meaningful with no updates in flight: a
    /// concurrent walk can observe an aggregate mid-repair.
    pub consistent: bool,
}

pub(crate) fn collect<V>(root: &Node<V>, guard: &Guard) -> SetStats {
    let mut stats = SetStats {
        consistent: true,
        ..SetStats::default()
    };
    stats.root_size = unsafe { root.version.load(Ordering::Acquire, guard).deref() }.size;
    walk(root, 0, &mut stats, guard);
    stats
}

fn walk<V>(node: &Node<V>, depth: usize, stats: &mut SetStats, guard: &Guard) {
    stats.height = stats.height.max(depth);
    let version = unsafe { node.version.load(Ordering::Acquire, guard).deref() };

    if node.is_leaf {
        stats.num_leaves += 1;
        match version.size {
            0 => {}
            1 => {
                stats.num_occupied += 1;
                if version.value.is_none() {
                    stats.consistent = false;
                }
            }
            _ => stats.consistent = false,
        }
        return;
    }

    stats.num_internal += 1;
    let left = unsafe { &*node.left };
    let right = unsafe { &*node.right };
    let lv = left.version.load(Ordering::Acquire, guard);
    let rv = right.version.load(Ordering::Acquire, guard);

    // At quiescence the last refresh here read the children after their last
    // update, so the aggregate must have captured exactly the children's
    // current versions and their sizes must sum.
    let size_sum = unsafe { lv.deref().size + rv.deref().size };
    if version.size != size_sum || version.captured() != (lv.as_raw(), rv.as_raw()) {
        stats.consistent = false;
    }

    walk(left, depth + 1, stats, guard);
    walk(right, depth + 1, stats, guard);
}

#[cfg(test)]
mod tests {
    use crate::AugmentedSet;

    #[test]
    fn counts_for_fresh_set() {
        let set = AugmentedSet::<i64, ()>::with_range(0, 16);
        let stats = set.stats();
        assert_eq!(stats.num_leaves, 16);
        assert_eq!(stats.num_internal, 15);
        assert_eq!(stats.height, 4);
        assert_eq!(stats.num_occupied, 0);
        assert_eq!(stats.root_size, 0);
        assert!(stats.consistent);
    }

    #[test]
    fn occupancy_follows_mutations() {
        let set = AugmentedSet::<i64, u8>::with_range(0, 16);
        for k in [0, 3, 9, 15] {
            set.insert(k, k as u8);
        }
        set.remove(9);

        let stats = set.stats();
        assert_eq!(stats.num_occupied, 3);
        assert_eq!(stats.root_size, 3);
        assert!(stats.consistent);
    }

    #[test]
    fn single_leaf_carrier() {
        let set = AugmentedSet::<i64, ()>::with_range(0, 1);
        set.insert(0, ());
        let stats = set.stats();
        assert_eq!(stats.height, 0);
        assert_eq!(stats.num_leaves, 1);
        assert_eq!(stats.num_internal, 0);
        assert_eq!(stats.num_occupied, 1);
        assert!(stats.consistent);
    }

    #[test]
    fn uneven_range_shape() {
        let set = AugmentedSet::<i64, ()>::with_range(0, 13);
        let stats = set.stats();
        assert_eq!(stats.num_leaves, 13);
        assert_eq!(stats.num_internal, 12);
        assert!(stats.consistent);
    }
}
