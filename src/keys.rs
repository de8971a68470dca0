//! Key abstraction for the dense integer domain.

use num_traits::PrimInt;

/// A key the set can address: any primitive integer, widened into the `i64`
/// index space the carrier tree is built over.
///
/// Widening saturates, so a key that does not fit in `i64` lands outside
/// every configurable range and is reported as not found instead of wrapping
/// onto another key's slot.
pub trait DenseKey: Copy {
    /// Widen the key into the tree's index space.
    fn to_index(self) -> i64;
}

impl<K: PrimInt> DenseKey for K {
    #[inline]
    fn to_index(self) -> i64 {
        self.to_i64().unwrap_or_else(|| {
            if self < K::zero() {
                i64::MIN
            } else {
                i64::MAX
            }
        })
    }
}
