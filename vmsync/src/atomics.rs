//! Atomic operations with the memory orderings the synchronization core relies on.
//!
//! Every lock-state transition in this crate goes through [`AtomicOps`] so that the
//! ordering policy is stated once:
//!
//! - `load_acquire` is used when a thread inspects a lock word it may act upon. Writes
//!   published by the previous owner become visible.
//! - `store_release` publishes a lock word after the critical section's writes.
//! - `cas`, `exchange`, `store_fenced` and `load_fenced` are sequentially consistent.
//!   They are used at cross-thread handoff points where two threads each write one word
//!   and then read the other's (the "clear owner, then look for waiters" versus
//!   "register as waiter, then try to take ownership" pair). Only a total order
//!   guarantees that at least one side observes the other.
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU32, AtomicU64, AtomicUsize, Ordering};

use atomic::Atomic;
use bytemuck::NoUninit;

pub trait AtomicOps {
    type Value: Copy;

    fn load_relaxed(&self) -> Self::Value;
    fn load_acquire(&self) -> Self::Value;
    fn load_fenced(&self) -> Self::Value;
    fn store_relaxed(&self, value: Self::Value);
    fn store_release(&self, value: Self::Value);
    fn store_fenced(&self, value: Self::Value);
    fn exchange(&self, value: Self::Value) -> Self::Value;
    /// Replace `current` with `new`. Returns the previous value, `Ok` if the swap happened.
    fn cas(&self, current: Self::Value, new: Self::Value) -> Result<Self::Value, Self::Value>;
}

/// Counters shared between threads, e.g. the number of threads parked on a ready queue.
pub trait AtomicCounter: AtomicOps {
    /// Adds `n` and returns the new value.
    fn add(&self, n: Self::Value) -> Self::Value;
    /// Subtracts `n` and returns the new value.
    fn sub(&self, n: Self::Value) -> Self::Value;

    fn increment(&self) -> Self::Value;
    fn decrement(&self) -> Self::Value;
}

macro_rules! impl_atomic_ops {
    ($($atomic: ty => $value: ty),*) => {
        $(
            impl AtomicOps for $atomic {
                type Value = $value;

                #[inline(always)]
                fn load_relaxed(&self) -> $value {
                    self.load(Ordering::Relaxed)
                }

                #[inline(always)]
                fn load_acquire(&self) -> $value {
                    self.load(Ordering::Acquire)
                }

                #[inline(always)]
                fn load_fenced(&self) -> $value {
                    self.load(Ordering::SeqCst)
                }

                #[inline(always)]
                fn store_relaxed(&self, value: $value) {
                    self.store(value, Ordering::Relaxed)
                }

                #[inline(always)]
                fn store_release(&self, value: $value) {
                    self.store(value, Ordering::Release)
                }

                #[inline(always)]
                fn store_fenced(&self, value: $value) {
                    self.store(value, Ordering::SeqCst)
                }

                #[inline(always)]
                fn exchange(&self, value: $value) -> $value {
                    self.swap(value, Ordering::SeqCst)
                }

                #[inline(always)]
                fn cas(&self, current: $value, new: $value) -> Result<$value, $value> {
                    self.compare_exchange(current, new, Ordering::SeqCst, Ordering::SeqCst)
                }
            }
        )*
    };
}

macro_rules! impl_atomic_counter {
    ($($atomic: ty => $value: ty),*) => {
        $(
            impl AtomicCounter for $atomic {
                #[inline(always)]
                fn add(&self, n: $value) -> $value {
                    self.fetch_add(n, Ordering::SeqCst).wrapping_add(n)
                }

                #[inline(always)]
                fn sub(&self, n: $value) -> $value {
                    let previous = self.fetch_sub(n, Ordering::SeqCst);
                    debug_assert!(previous >= n, "atomic counter underflow");
                    previous.wrapping_sub(n)
                }

                #[inline(always)]
                fn increment(&self) -> $value {
                    self.add(1)
                }

                #[inline(always)]
                fn decrement(&self) -> $value {
                    self.sub(1)
                }
            }
        )*
    };
}

impl_atomic_ops!(
    AtomicBool => bool,
    AtomicU32 => u32,
    AtomicU64 => u64,
    AtomicUsize => usize
);

impl_atomic_counter!(
    AtomicU32 => u32,
    AtomicU64 => u64,
    AtomicUsize => usize
);

impl<T> AtomicOps for AtomicPtr<T> {
    type Value = *mut T;

    #[inline(always)]
    fn load_relaxed(&self) -> *mut T {
        self.load(Ordering::Relaxed)
    }

    #[inline(always)]
    fn load_acquire(&self) -> *mut T {
        self.load(Ordering::Acquire)
    }

    #[inline(always)]
    fn load_fenced(&self) -> *mut T {
        self.load(Ordering::SeqCst)
    }

    #[inline(always)]
    fn store_relaxed(&self, value: *mut T) {
        self.store(value, Ordering::Relaxed)
    }

    #[inline(always)]
    fn store_release(&self, value: *mut T) {
        self.store(value, Ordering::Release)
    }

    #[inline(always)]
    fn store_fenced(&self, value: *mut T) {
        self.store(value, Ordering::SeqCst)
    }

    #[inline(always)]
    fn exchange(&self, value: *mut T) -> *mut T {
        self.swap(value, Ordering::SeqCst)
    }

    #[inline(always)]
    fn cas(&self, current: *mut T, new: *mut T) -> Result<*mut T, *mut T> {
        self.compare_exchange(current, new, Ordering::SeqCst, Ordering::SeqCst)
    }
}

/// Plain-old-data enums (states of wait nodes and the like) stored in an `Atomic<T>`.
impl<T: NoUninit> AtomicOps for Atomic<T> {
    type Value = T;

    #[inline(always)]
    fn load_relaxed(&self) -> T {
        self.load(Ordering::Relaxed)
    }

    #[inline(always)]
    fn load_acquire(&self) -> T {
        self.load(Ordering::Acquire)
    }

    #[inline(always)]
    fn load_fenced(&self) -> T {
        self.load(Ordering::SeqCst)
    }

    #[inline(always)]
    fn store_relaxed(&self, value: T) {
        self.store(value, Ordering::Relaxed)
    }

    #[inline(always)]
    fn store_release(&self, value: T) {
        self.store(value, Ordering::Release)
    }

    #[inline(always)]
    fn store_fenced(&self, value: T) {
        self.store(value, Ordering::SeqCst)
    }

    #[inline(always)]
    fn exchange(&self, value: T) -> T {
        self.swap(value, Ordering::SeqCst)
    }

    #[inline(always)]
    fn cas(&self, current: T, new: T) -> Result<T, T> {
        self.compare_exchange(current, new, Ordering::SeqCst, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(u8)]
    enum Light {
        Red,
        Green,
    }

    unsafe impl NoUninit for Light {}

    #[test]
    fn counter_returns_new_value() {
        let counter = AtomicUsize::new(0);
        assert_eq!(counter.increment(), 1);
        assert_eq!(counter.add(4), 5);
        assert_eq!(counter.decrement(), 4);
        assert_eq!(counter.sub(4), 0);
    }

    #[test]
    fn cas_reports_observed_value() {
        let word = AtomicU64::new(7);
        assert_eq!(word.cas(1, 2), Err(7));
        assert_eq!(word.cas(7, 2), Ok(7));
        assert_eq!(word.load_acquire(), 2);
        assert_eq!(word.exchange(9), 2);
    }

    #[test]
    fn enum_cells() {
        let light = Atomic::new(Light::Red);
        assert_eq!(light.cas(Light::Red, Light::Green), Ok(Light::Red));
        assert_eq!(light.load_fenced(), Light::Green);
        light.store_release(Light::Red);
        assert_eq!(light.load_relaxed(), Light::Red);
    }
}
