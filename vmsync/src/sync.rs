//! Synchronization primitives for managed runtimes.
//!
//! [`Monitor`] implements per-object locks with recursive ownership and `wait`/`pulse`
//! signaling, inflating lock state onto an object only while it is in use. The
//! primitives it is built from are available on their own: [`WaitPrimitive`] is the
//! interruptible wait engine behind the [`Mutex`], [`ManualResetEvent`],
//! [`AutoResetEvent`] and [`Semaphore`] handles, and [`FreeList`] is the lock-free pool
//! descriptors are recycled through.
//!
//! All blocking calls take an `Option<Duration>` timeout, `None` meaning forever.
pub mod free_list;
pub mod monitor;
pub mod semaphore;
pub mod wait;

pub use free_list::FreeList;
pub use monitor::*;
pub use semaphore::{AutoResetEvent, ManualResetEvent, Mutex, Semaphore};
pub use wait::{WaitKind, WaitPrimitive, WaitStatus};
