//! Mutex, event and semaphore objects built on [`WaitPrimitive`].
//!
//! These are the runtime-visible wait handles. Each one owns its primitive; dropping a
//! handle goes through the process-wide wait-object deletion lock so that an APC being
//! routed to a thread blocked on it cannot touch freed memory.
use std::time::Duration;

use crate::error::Result;

use super::wait::{WaitPrimitive, WaitStatus};

/// A binary, non-recursive lock that any thread may release.
pub struct Mutex {
    primitive: WaitPrimitive,
}

impl Mutex {
    pub const fn new(initially_owned: bool) -> Self {
        Self {
            primitive: WaitPrimitive::mutex(initially_owned),
        }
    }

    pub fn lock(&self, timeout: Option<Duration>, interruptible: bool) -> Result<WaitStatus> {
        self.primitive.wait(timeout, interruptible)
    }

    pub fn try_lock(&self) -> bool {
        self.primitive.wait_uninterruptible(Some(Duration::ZERO)).is_success()
    }

    pub fn unlock(&self) {
        self.primitive.post_saturating(1);
    }

    pub fn is_locked(&self) -> bool {
        !self.primitive.is_signaled()
    }

    pub fn primitive(&self) -> &WaitPrimitive {
        &self.primitive
    }
}

macro_rules! define_event {
    ($(#[$meta: meta])* $name: ident, $ctor: ident) => {
        $(#[$meta])*
        pub struct $name {
            primitive: WaitPrimitive,
        }

        impl $name {
            pub const fn new(initially_signaled: bool) -> Self {
                Self {
                    primitive: WaitPrimitive::$ctor(initially_signaled),
                }
            }

            pub fn set(&self) {
                self.primitive.post_saturating(1);
            }

            pub fn reset(&self) {
                self.primitive.reset();
            }

            pub fn is_set(&self) -> bool {
                self.primitive.is_signaled()
            }

            pub fn wait(
                &self,
                timeout: Option<Duration>,
                interruptible: bool,
            ) -> Result<WaitStatus> {
                self.primitive.wait(timeout, interruptible)
            }

            pub fn primitive(&self) -> &WaitPrimitive {
                &self.primitive
            }
        }
    };
}

define_event!(
    /// Event that stays set, releasing every waiter, until [`reset`](Self::reset).
    ManualResetEvent,
    manual_reset_event
);

define_event!(
    /// Event that releases exactly one waiter per [`set`](Self::set).
    AutoResetEvent,
    auto_reset_event
);

/// A counting semaphore with a fixed maximum count.
pub struct Semaphore {
    primitive: WaitPrimitive,
}

impl Semaphore {
    pub fn new(initial_count: u32, max_count: u32) -> Result<Self> {
        Ok(Self {
            primitive: WaitPrimitive::semaphore(initial_count, max_count)?,
        })
    }

    pub fn wait(&self, timeout: Option<Duration>, interruptible: bool) -> Result<WaitStatus> {
        self.primitive.wait(timeout, interruptible)
    }

    /// Increment the count by `count`, returning the previous count. Fails with
    /// [`SemaphoreFull`](crate::error::SyncError::SemaphoreFull) if the maximum would be
    /// exceeded.
    pub fn release(&self, count: u32) -> Result<u32> {
        self.primitive.post(count)
    }

    pub fn count(&self) -> u32 {
        self.primitive.release_count()
    }

    pub fn primitive(&self) -> &WaitPrimitive {
        &self.primitive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::SyncError, threading::Thread};
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    #[test]
    fn mutex_excludes() {
        let mutex = Arc::new(Mutex::new(false));
        let inside = Arc::new(AtomicU32::new(0));
        let handles = (0..4)
            .map(|_| {
                let mutex = mutex.clone();
                let inside = inside.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        assert!(mutex.lock(None, false).unwrap().is_success());
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        inside.fetch_sub(1, Ordering::SeqCst);
                        mutex.unlock();
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(!mutex.is_locked());
    }

    #[test]
    fn try_lock_on_owned_mutex_fails() {
        let mutex = Mutex::new(true);
        assert!(!mutex.try_lock());
        mutex.unlock();
        assert!(mutex.try_lock());
        assert!(mutex.is_locked());
    }

    #[test]
    fn auto_reset_event_releases_one() {
        let event = Arc::new(AutoResetEvent::new(false));
        let released = Arc::new(AtomicU32::new(0));
        let waiters = (0..2)
            .map(|_| {
                let event = event.clone();
                let released = released.clone();
                std::thread::spawn(move || {
                    if event
                        .wait(Some(Duration::from_millis(200)), false)
                        .unwrap()
                        .is_success()
                    {
                        released.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect::<Vec<_>>();
        while event.primitive().waiting_count() < 2 {
            std::thread::yield_now();
        }
        event.set();
        for waiter in waiters {
            waiter.join().unwrap();
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert!(!event.is_set());
    }

    #[test]
    fn manual_reset_event_releases_all() {
        let event = Arc::new(ManualResetEvent::new(false));
        let waiters = (0..3)
            .map(|_| {
                let event = event.clone();
                std::thread::spawn(move || event.wait(None, false).unwrap())
            })
            .collect::<Vec<_>>();
        while event.primitive().waiting_count() < 3 {
            std::thread::yield_now();
        }
        event.set();
        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), WaitStatus::Success);
        }
        assert!(event.is_set());
    }

    #[test]
    fn semaphore_release_returns_previous() {
        let sema = Semaphore::new(0, 3).unwrap();
        assert_eq!(sema.release(2).unwrap(), 0);
        assert_eq!(sema.release(1).unwrap(), 2);
        assert!(matches!(
            sema.release(1),
            Err(SyncError::SemaphoreFull { max: 3 })
        ));
        assert!(sema.wait(Some(Duration::ZERO), false).unwrap().is_success());
        assert_eq!(sema.count(), 2);
    }

    #[test]
    fn interrupt_wakes_blocked_waiter() {
        let event = Arc::new(ManualResetEvent::new(false));
        let thread = Thread::new(None);
        let handle = {
            let event = event.clone();
            thread.start(move || event.wait(None, true)).unwrap()
        };
        while !thread.is_in_interruptible_wait() {
            std::thread::yield_now();
        }
        thread.interrupt("shutdown");
        let result = handle.join().unwrap().unwrap();
        assert!(
            matches!(result, Err(SyncError::Interrupted { ref reason }) if reason == "shutdown")
        );
        assert_eq!(event.primitive().waiting_count(), 0);
        assert!(!thread.is_in_interruptible_wait());
    }

    #[test]
    fn non_failing_apc_resumes_wait() {
        let event = Arc::new(ManualResetEvent::new(false));
        let ran = Arc::new(AtomicU32::new(0));
        let thread = Thread::new(None);
        let handle = {
            let event = event.clone();
            thread
                .start(move || event.wait(Some(Duration::from_secs(10)), true))
                .unwrap()
        };
        while !thread.is_in_interruptible_wait() {
            std::thread::yield_now();
        }
        {
            let ran = ran.clone();
            thread.queue_user_apc(move || {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        while ran.load(Ordering::SeqCst) == 0 {
            std::thread::yield_now();
        }
        // still waiting after the callback ran
        assert!(!thread.is_terminated());
        event.set();
        assert_eq!(handle.join().unwrap().unwrap().unwrap(), WaitStatus::Success);
    }
}
