//! Lock-free pool of reusable objects.
//!
//! Lock descriptors and wait nodes are recycled through a [`FreeList`] instead of
//! being allocated on the managed heap, so taking a lock never has to synchronize
//! with the garbage collector. Pooled objects are never freed while the pool is alive;
//! the pools used by the monitor are `static` and therefore live for the whole process.
use std::{
    marker::PhantomData,
    ptr::NonNull,
    sync::atomic::AtomicUsize,
};

use crossbeam_queue::SegQueue;

use crate::atomics::{AtomicCounter, AtomicOps};

pub struct FreeList<T> {
    queue: SegQueue<NonNull<T>>,
    allocated: AtomicUsize,
    make: fn() -> T,
    marker: PhantomData<Box<T>>,
}

// SAFETY: entries are handed out as shared references and pushed back by the
// thread that last used them; `T` itself must be shareable.
unsafe impl<T: Send + Sync> Send for FreeList<T> {}
unsafe impl<T: Send + Sync> Sync for FreeList<T> {}

impl<T> FreeList<T> {
    /// Create an empty pool. New entries are constructed with `make` when the pool
    /// runs dry.
    pub const fn new(make: fn() -> T) -> Self {
        Self {
            queue: SegQueue::new(),
            allocated: AtomicUsize::new(0),
            make,
            marker: PhantomData,
        }
    }

    /// Pop a pooled entry, or construct a new one if none is available. Never blocks.
    ///
    /// Constructing a new entry aborts the process if the allocator fails.
    pub fn allocate(&self) -> &T {
        if let Some(entry) = self.queue.pop() {
            // SAFETY: every pointer in the queue came from `Box::into_raw` below and
            // stays valid until `self` is dropped.
            return unsafe { entry.as_ref() };
        }

        let total = self.allocated.increment();
        log::debug!(
            "free list of {} grew to {} entries",
            std::any::type_name::<T>(),
            total
        );
        let entry = Box::new((self.make)());
        // SAFETY: see above; the box is only reclaimed in `Drop`.
        unsafe { &*Box::into_raw(entry) }
    }

    /// Return an entry to the pool. The entry is not reset or dropped.
    ///
    /// # Safety
    ///
    /// `entry` must have been obtained from [`allocate`](Self::allocate) on this very
    /// pool, must not already be pooled, and the caller must not use it afterwards
    /// unless it is handed out again by `allocate`.
    pub unsafe fn release(&self, entry: &T) {
        self.queue.push(NonNull::from(entry));
    }

    /// Number of entries ever constructed by this pool.
    pub fn allocated(&self) -> usize {
        self.allocated.load_relaxed()
    }

    /// Number of entries currently sitting in the pool.
    pub fn pooled(&self) -> usize {
        self.queue.len()
    }
}

impl<T> Drop for FreeList<T> {
    fn drop(&mut self) {
        while let Some(entry) = self.queue.pop() {
            // SAFETY: pooled entries are owned by the pool and were created by `Box::new`.
            drop(unsafe { Box::from_raw(entry.as_ptr()) });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    static DROPS: AtomicU32 = AtomicU32::new(0);

    struct Tracked(u32);

    impl Drop for Tracked {
        fn drop(&mut self) {
            DROPS.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn recycles_released_entries() {
        let list = FreeList::new(|| AtomicU32::new(0));
        let first = list.allocate();
        first.store(42, Ordering::Relaxed);
        let first_ptr = first as *const AtomicU32;
        unsafe { list.release(first) };
        assert_eq!(list.pooled(), 1);

        let again = list.allocate();
        assert_eq!(again as *const AtomicU32, first_ptr);
        // entries are not reset on reuse
        assert_eq!(again.load(Ordering::Relaxed), 42);
        assert_eq!(list.allocated(), 1);

        let other = list.allocate();
        assert_ne!(other as *const AtomicU32, first_ptr);
        assert_eq!(list.allocated(), 2);
        unsafe {
            list.release(again);
            list.release(other);
        }
    }

    #[test]
    fn drop_frees_pooled_entries_once() {
        DROPS.store(0, Ordering::Relaxed);
        {
            let list = FreeList::new(|| Tracked(1));
            let a = list.allocate();
            let b = list.allocate();
            assert_eq!(a.0 + b.0, 2);
            unsafe {
                list.release(a);
                list.release(b);
            }
        }
        assert_eq!(DROPS.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn concurrent_allocate_release() {
        let list = Arc::new(FreeList::new(|| AtomicU32::new(0)));
        let handles = (0..4)
            .map(|_| {
                let list = list.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let entry = list.allocate();
                        // an entry is exclusively ours until released
                        assert_eq!(entry.fetch_add(1, Ordering::SeqCst) % 2, 0);
                        entry.fetch_add(1, Ordering::SeqCst);
                        unsafe { list.release(entry) };
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(list.pooled(), list.allocated());
    }
}
