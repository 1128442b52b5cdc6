//! Size-class buffer pool.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Number of size classes (capacities 1 through 2^31 bytes).
const SIZE_CLASSES: usize = 32;

/// Maximum buffers retained per size class; extra frees are dropped.
const MAX_POOLED_PER_CLASS: usize = 256;

/// Counters describing pool activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Buffers freshly allocated from the system allocator.
    pub allocations: usize,
    /// Buffers handed out from a bucket instead of allocating.
    pub reuses: usize,
    /// Buffers returned to a bucket.
    pub frees: usize,
    /// Buffers currently resting in buckets.
    pub pooled: usize,
}

/// A pool of byte buffers bucketed by power-of-two capacity.
///
/// The pool is an explicit arena: create one at startup and hand clones of the
/// handle to every stream, codec, and transport that needs scratch space.
/// Clones share the same buckets. The pool is `!Send`; every handle lives on
/// the thread that created it.
///
/// Every buffer obtained from [`alloc`](Self::alloc) is returned either with
/// [`free`](Self::free) or by being dropped. Because `free` takes the buffer
/// by value, a buffer can never be freed twice or used after it was freed.
#[derive(Clone, Default)]
pub struct BufferPool {
    inner: Rc<RefCell<PoolInner>>,
}

#[derive(Default)]
struct PoolInner {
    buckets: Vec<Vec<Vec<u8>>>,
    stats: PoolStats,
}

impl BufferPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an empty buffer with capacity for at least `size` bytes.
    ///
    /// The capacity is the smallest power of two that is `>= size`.
    #[must_use]
    pub fn alloc(&self, size: usize) -> Vec<u8> {
        let capacity = size_class(size);
        let class = capacity.trailing_zeros() as usize;
        let mut inner = self.inner.borrow_mut();
        let reused = inner.buckets.get_mut(class).and_then(Vec::pop);
        if let Some(buf) = reused {
            inner.stats.reuses += 1;
            inner.stats.pooled -= 1;
            return buf;
        }
        inner.stats.allocations += 1;
        Vec::with_capacity(capacity)
    }

    /// Returns a buffer to the bucket matching its capacity.
    ///
    /// Buffers whose capacity is not a power of two (i.e. not produced by
    /// this pool) are simply dropped.
    pub fn free(&self, mut buf: Vec<u8>) {
        let capacity = buf.capacity();
        if capacity == 0 || !capacity.is_power_of_two() {
            return;
        }
        let class = capacity.trailing_zeros() as usize;
        if class >= SIZE_CLASSES {
            return;
        }
        buf.clear();
        let mut inner = self.inner.borrow_mut();
        if inner.buckets.len() <= class {
            inner.buckets.resize_with(class + 1, Vec::new);
        }
        if inner.buckets[class].len() >= MAX_POOLED_PER_CLASS {
            return;
        }
        inner.buckets[class].push(buf);
        inner.stats.frees += 1;
        inner.stats.pooled += 1;
    }

    /// Returns a snapshot of the pool counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.inner.borrow().stats
    }

    /// Returns `true` if both handles share the same buckets.
    #[must_use]
    pub fn same_pool(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Returns the pooled capacity used for a request of `size` bytes.
#[must_use]
pub fn size_class(size: usize) -> usize {
    size.max(1).next_power_of_two()
}
