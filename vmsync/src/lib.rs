//! Object monitors and interruptible wait primitives for managed runtimes.
//!
//! The crate provides the synchronization core a language runtime builds its `lock`
//! statement and `wait`/`notify` APIs on:
//!
//! - [`sync::Monitor`]: per-object locks, inflated on first use and recycled through a
//!   lock-free pool so they never involve the garbage collector.
//! - [`sync::WaitPrimitive`] and its wrappers: mutexes, events and semaphores whose waits
//!   can be interrupted by other threads.
//! - [`threading::Thread`]: per-thread records with a queue of asynchronous procedure
//!   calls, the cooperative cancellation mechanism interruptible waits check.
//!
//! Objects take part by embedding a [`MonitorSlot`](object_model::MonitorSlot) and
//! implementing [`Synchronized`](object_model::Synchronized).
pub mod atomics;
pub mod error;
pub mod object_model;
pub mod options;
pub mod sync;
pub mod threading;

pub use error::{Result, SyncError};

pub mod prelude {
    pub use super::error::{Result, SyncError};
    pub use super::object_model::{MonitorSlot, SyncObject, Synchronized};
    pub use super::sync::{
        AutoResetEvent, ManualResetEvent, Monitor, MonitorGuard, Mutex, Semaphore, WaitStatus,
    };
    pub use super::threading::Thread;
}
