//! Highest observed head tracking.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Latest block height reported by each node of a pool.
///
/// Every node owns one slot holding its most recent head, so the pool-wide highest is the
/// maximum of what nodes report now. A node that once reported a bogus height stops skewing
/// the reference as soon as its next probe lands. Lock-free: readers and monitors never wait
/// on each other.
///
/// # Example
///
/// ```
/// use multinode_core::chain::ChainHead;
///
/// let head = ChainHead::new(2);
/// head.observe(0, 100);
/// head.observe(1, 90);
/// assert_eq!(head.highest(), 100);
/// assert_eq!(head.lag_of(95), 5);
///
/// head.observe(0, 92);
/// assert_eq!(head.highest(), 92);
/// ```
#[derive(Debug)]
pub struct ChainHead {
    slots: Box<[AtomicU64]>,
}

impl ChainHead {
    #[must_use]
    pub fn new(nodes: usize) -> Self {
        Self { slots: (0..nodes).map(|_| AtomicU64::new(0)).collect() }
    }

    /// Records the head node `index` just reported. Unknown indices are ignored.
    pub fn observe(&self, index: usize, height: u64) {
        if let Some(slot) = self.slots.get(index) {
            let previous = slot.swap(height, Ordering::AcqRel);
            if previous != height {
                trace!(index, previous, height, "node head moved");
            }
        }
    }

    /// Drops node `index` from the pool-wide view.
    pub fn forget(&self, index: usize) {
        if let Some(slot) = self.slots.get(index) {
            slot.store(0, Ordering::Release);
        }
    }

    #[must_use]
    pub fn highest(&self) -> u64 {
        self.slots.iter().map(|slot| slot.load(Ordering::Acquire)).max().unwrap_or(0)
    }

    /// Number of blocks `height` trails the highest current head, zero if it is at or above it.
    #[inline]
    #[must_use]
    pub fn lag_of(&self, height: u64) -> u64 {
        self.highest().saturating_sub(height)
    }
}
