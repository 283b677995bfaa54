//! The wait engine shared by mutexes, events and semaphores.
//!
//! A [`WaitPrimitive`] is a release count guarded by a `parking_lot` mutex and condition
//! variable. What "signaled" means and what a successful wait consumes depends on its
//! [`WaitKind`]. Waits can be made *interruptible*: the waiting thread registers the
//! primitive as its current wait object, so [`Thread::queue_user_apc`] can kick it out of
//! the condition variable and have it run the queued callbacks before going back to sleep.
use std::{
    ptr,
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::{
    error::{Result, SyncError},
    threading::{wait_object_deletion_guard, Thread},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitKind {
    /// Binary lock: a successful wait takes the single release count.
    Mutex,
    /// Stays signaled, releasing every waiter, until explicitly reset.
    ManualResetEvent,
    /// Releases a single waiter and resets itself.
    AutoResetEvent,
    /// Counting semaphore bounded by a maximum count.
    Semaphore,
}

/// Outcome of a wait. Timing out is a normal outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    Success,
    Timeout,
    /// The primitive was closed before or while the thread was waiting on it.
    Failed,
}

impl WaitStatus {
    pub fn is_success(self) -> bool {
        self == WaitStatus::Success
    }
}

struct WaitState {
    release_count: u32,
    waiting_count: u32,
    closed: bool,
}

pub struct WaitPrimitive {
    kind: WaitKind,
    max_count: u32,
    state: Mutex<WaitState>,
    cvar: Condvar,
}

impl WaitPrimitive {
    /// Create a primitive of the given kind. For every kind other than
    /// [`WaitKind::Semaphore`] the maximum count is 1.
    pub fn new(kind: WaitKind, initial_count: u32, max_count: u32) -> Result<Self> {
        if max_count == 0 {
            return Err(SyncError::InvalidArgument("maximum count must be positive"));
        }
        if initial_count > max_count {
            return Err(SyncError::InvalidArgument(
                "initial count must not exceed the maximum count",
            ));
        }
        if kind != WaitKind::Semaphore && max_count != 1 {
            return Err(SyncError::InvalidArgument(
                "only semaphores may have a maximum count above 1",
            ));
        }
        Ok(Self::from_parts(kind, initial_count, max_count))
    }

    pub(crate) const fn from_parts(kind: WaitKind, initial_count: u32, max_count: u32) -> Self {
        Self {
            kind,
            max_count,
            state: Mutex::new(WaitState {
                release_count: initial_count,
                waiting_count: 0,
                closed: false,
            }),
            cvar: Condvar::new(),
        }
    }

    /// A mutex that is available unless `initially_owned`.
    pub const fn mutex(initially_owned: bool) -> Self {
        Self::from_parts(WaitKind::Mutex, if initially_owned { 0 } else { 1 }, 1)
    }

    pub const fn manual_reset_event(initially_signaled: bool) -> Self {
        Self::from_parts(WaitKind::ManualResetEvent, initially_signaled as u32, 1)
    }

    pub const fn auto_reset_event(initially_signaled: bool) -> Self {
        Self::from_parts(WaitKind::AutoResetEvent, initially_signaled as u32, 1)
    }

    pub fn semaphore(initial_count: u32, max_count: u32) -> Result<Self> {
        Self::new(WaitKind::Semaphore, initial_count, max_count)
    }

    pub fn kind(&self) -> WaitKind {
        self.kind
    }

    pub fn max_count(&self) -> u32 {
        self.max_count
    }

    pub fn is_signaled(&self) -> bool {
        self.state.lock().release_count > 0
    }

    pub fn release_count(&self) -> u32 {
        self.state.lock().release_count
    }

    /// Number of threads currently blocked in [`wait`](Self::wait).
    pub fn waiting_count(&self) -> u32 {
        self.state.lock().waiting_count
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Wait until the primitive is signaled, `timeout` elapses (`None` waits forever), or
    /// the primitive is closed.
    ///
    /// If `interruptible`, APCs queued for the calling thread run before blocking and
    /// every time the thread is woken. An error returned by a callback aborts the wait and
    /// is propagated once the thread has unregistered itself from this primitive.
    pub fn wait(&self, timeout: Option<Duration>, interruptible: bool) -> Result<WaitStatus> {
        if !interruptible {
            return Ok(self.wait_uninterruptible(timeout));
        }

        let thread = Thread::current();
        thread.check_for_user_apc_and_handle()?;
        self.wait_with(timeout, Some(&thread))
    }

    /// Wait without draining APCs. Used by the monitor's ready queue, which must not
    /// fail.
    pub(crate) fn wait_uninterruptible(&self, timeout: Option<Duration>) -> WaitStatus {
        match self.wait_with(timeout, None) {
            Ok(status) => status,
            // only APC callbacks can fail and none run without a thread
            Err(_) => unreachable!("uninterruptible wait returned an error"),
        }
    }

    fn wait_with(&self, timeout: Option<Duration>, thread: Option<&Thread>) -> Result<WaitStatus> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(WaitStatus::Failed);
        }
        if state.release_count > 0 {
            self.claim(&mut state);
            return Ok(WaitStatus::Success);
        }
        if timeout == Some(Duration::ZERO) {
            return Ok(WaitStatus::Timeout);
        }

        // an unrepresentable deadline is as good as waiting forever
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));

        state.waiting_count += 1;
        if let Some(thread) = thread {
            thread.set_current_wait_object(self);
        }

        let result = self.block(&mut state, deadline, thread);

        state.waiting_count -= 1;
        match result {
            Ok(WaitStatus::Success) => self.claim(&mut state),
            // a wakeup meant for us must not be lost for the others
            _ if state.release_count > 0 && state.waiting_count > 0 => {
                self.cvar.notify_one();
            }
            _ => {}
        }
        drop(state);

        if let Some(thread) = thread {
            thread.clear_current_wait_object();
        }
        result
    }

    fn block(
        &self,
        state: &mut MutexGuard<'_, WaitState>,
        deadline: Option<Instant>,
        thread: Option<&Thread>,
    ) -> Result<WaitStatus> {
        loop {
            if state.closed {
                return Ok(WaitStatus::Failed);
            }
            if state.release_count > 0 {
                return Ok(WaitStatus::Success);
            }

            // covers APCs queued between the first drain and registering as waiter
            if let Some(thread) = thread {
                if thread.has_pending_apcs() {
                    MutexGuard::unlocked(state, || thread.check_for_user_apc_and_handle())?;
                    // a callback may have waited on something else in the meantime
                    thread.set_current_wait_object(self);
                    continue;
                }
            }

            match deadline {
                None => self.cvar.wait(state),
                Some(deadline) => {
                    // the remaining time is derived from the deadline on every
                    // iteration, spurious wakeups just loop
                    if self.cvar.wait_until(state, deadline).timed_out() {
                        if state.closed {
                            return Ok(WaitStatus::Failed);
                        }
                        if state.release_count > 0 {
                            return Ok(WaitStatus::Success);
                        }
                        return Ok(WaitStatus::Timeout);
                    }
                }
            }
        }
    }

    /// Consume the signal according to the primitive's kind.
    fn claim(&self, state: &mut WaitState) {
        match self.kind {
            WaitKind::ManualResetEvent => {}
            WaitKind::AutoResetEvent | WaitKind::Mutex => state.release_count = 0,
            WaitKind::Semaphore => {
                state.release_count -= 1;
                // a bulk post must not be swallowed by a single woken thread
                if state.release_count > 0 && state.waiting_count > 0 {
                    self.cvar.notify_one();
                }
            }
        }
    }

    /// Signal the primitive: set events, unlock a mutex, or post a semaphore once.
    pub fn signal(&self) -> Result<()> {
        self.post(1).map(|_| ())
    }

    /// Add `count` to the release count and wake waiters. Returns the previous count.
    ///
    /// For semaphores, a post that would exceed the maximum count fails with
    /// [`SyncError::SemaphoreFull`] and changes nothing. Events and mutexes saturate at 1.
    pub fn post(&self, count: u32) -> Result<u32> {
        if count == 0 {
            return Err(SyncError::InvalidArgument("release count must be positive"));
        }
        let mut state = self.state.lock();
        let previous = state.release_count;
        match self.kind {
            WaitKind::Semaphore => {
                let Some(next) = previous
                    .checked_add(count)
                    .filter(|next| *next <= self.max_count)
                else {
                    return Err(SyncError::SemaphoreFull {
                        max: self.max_count,
                    });
                };
                state.release_count = next;
                self.wake(&state, count);
            }
            WaitKind::ManualResetEvent | WaitKind::AutoResetEvent | WaitKind::Mutex => {
                state.release_count = 1;
                self.wake(&state, 1);
            }
        }
        Ok(previous)
    }

    /// Post up to `count` without failing; the release count is clamped at the maximum.
    pub(crate) fn post_saturating(&self, count: u32) {
        let mut state = self.state.lock();
        let next = state
            .release_count
            .saturating_add(count)
            .min(self.max_count);
        let added = next - state.release_count;
        state.release_count = next;
        if added > 0 {
            self.wake(&state, added);
        }
    }

    fn wake(&self, state: &WaitState, count: u32) {
        match self.kind {
            WaitKind::ManualResetEvent => {
                self.cvar.notify_all();
            }
            WaitKind::AutoResetEvent | WaitKind::Mutex => {
                self.cvar.notify_one();
            }
            WaitKind::Semaphore if count >= state.waiting_count => {
                self.cvar.notify_all();
            }
            WaitKind::Semaphore => {
                for _ in 0..count {
                    self.cvar.notify_one();
                }
            }
        }
    }

    /// Clear the release count.
    pub fn reset(&self) {
        self.state.lock().release_count = 0;
    }

    /// Wake every waiter without changing the release count so that interruptible
    /// waiters re-check their APC queues.
    pub fn interrupt_wait(&self) {
        let _state = self.state.lock();
        self.cvar.notify_all();
    }

    /// Close the primitive. Threads blocked on it, and any later waits, return
    /// [`WaitStatus::Failed`].
    pub fn close(&self) {
        let _guard = wait_object_deletion_guard();
        let mut state = self.state.lock();
        state.closed = true;
        self.cvar.notify_all();
    }

    pub(crate) fn as_ptr(&self) -> *mut Self {
        ptr::from_ref(self).cast_mut()
    }
}

impl Drop for WaitPrimitive {
    fn drop(&mut self) {
        // a thread routing an APC may still hold a raw pointer to us
        let _guard = wait_object_deletion_guard();
    }
}

impl std::fmt::Debug for WaitPrimitive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("WaitPrimitive")
            .field("kind", &self.kind)
            .field("release_count", &state.release_count)
            .field("max_count", &self.max_count)
            .field("waiting_count", &state.waiting_count)
            .field("closed", &state.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    #[test]
    fn rejects_bad_counts() {
        assert!(WaitPrimitive::semaphore(2, 1).is_err());
        assert!(WaitPrimitive::semaphore(0, 0).is_err());
        assert!(WaitPrimitive::new(WaitKind::Mutex, 1, 2).is_err());
        let sema = WaitPrimitive::semaphore(0, 5).unwrap();
        assert_eq!(sema.kind(), WaitKind::Semaphore);
        assert_eq!(sema.max_count(), 5);
        assert_eq!(WaitPrimitive::mutex(false).max_count(), 1);
    }

    #[test]
    fn zero_timeout_does_not_block() {
        let event = WaitPrimitive::auto_reset_event(false);
        assert_eq!(
            event.wait(Some(Duration::ZERO), false).unwrap(),
            WaitStatus::Timeout
        );
        event.signal().unwrap();
        assert_eq!(
            event.wait(Some(Duration::ZERO), false).unwrap(),
            WaitStatus::Success
        );
        // auto-reset consumed the signal
        assert!(!event.is_signaled());
    }

    #[test]
    fn manual_reset_stays_signaled() {
        let event = WaitPrimitive::manual_reset_event(true);
        for _ in 0..3 {
            assert_eq!(event.wait(None, false).unwrap(), WaitStatus::Success);
        }
        event.reset();
        assert_eq!(
            event.wait(Some(Duration::from_millis(5)), false).unwrap(),
            WaitStatus::Timeout
        );
    }

    #[test]
    fn timeout_elapses() {
        let mutex = WaitPrimitive::mutex(true);
        let start = Instant::now();
        let status = mutex.wait(Some(Duration::from_millis(30)), true).unwrap();
        assert_eq!(status, WaitStatus::Timeout);
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert_eq!(mutex.waiting_count(), 0);
    }

    #[test]
    fn semaphore_post_over_max_is_rejected() {
        let sema = WaitPrimitive::semaphore(1, 2).unwrap();
        assert_eq!(sema.post(1).unwrap(), 1);
        assert!(matches!(
            sema.post(1),
            Err(SyncError::SemaphoreFull { max: 2 })
        ));
        assert_eq!(sema.release_count(), 2);
    }

    #[test]
    fn bulk_post_wakes_every_waiter() {
        let sema = Arc::new(WaitPrimitive::semaphore(0, 16).unwrap());
        let woken = Arc::new(AtomicU32::new(0));
        let waiters = (0..4)
            .map(|_| {
                let sema = sema.clone();
                let woken = woken.clone();
                std::thread::spawn(move || {
                    let status = sema.wait(Some(Duration::from_secs(10)), false).unwrap();
                    assert_eq!(status, WaitStatus::Success);
                    woken.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect::<Vec<_>>();

        while sema.waiting_count() < 4 {
            std::thread::yield_now();
        }
        sema.post(4).unwrap();
        for waiter in waiters {
            waiter.join().unwrap();
        }
        assert_eq!(woken.load(Ordering::SeqCst), 4);
        assert_eq!(sema.release_count(), 0);
    }

    #[test]
    fn close_fails_waiters() {
        let event = Arc::new(WaitPrimitive::manual_reset_event(false));
        let waiter = {
            let event = event.clone();
            std::thread::spawn(move || event.wait(None, false).unwrap())
        };
        while event.waiting_count() == 0 {
            std::thread::yield_now();
        }
        assert!(!event.is_closed());
        event.close();
        assert!(event.is_closed());
        assert_eq!(waiter.join().unwrap(), WaitStatus::Failed);
        assert_eq!(event.wait(None, false).unwrap(), WaitStatus::Failed);
    }

    #[test]
    fn saturating_post_clamps() {
        let sema = WaitPrimitive::semaphore(0, 3).unwrap();
        sema.post_saturating(10);
        assert_eq!(sema.release_count(), 3);
    }
}
