//! Thread records and asynchronous procedure calls (APCs).
//!
//! Every OS thread that touches a monitor or an interruptible wait gets a [`Thread`]
//! record, created lazily on first use or up front by [`Thread::start`]. The record holds
//! the thread's id (used as the monitor owner word), its queue of pending APCs and a
//! back-pointer to the wait primitive it is currently blocked on.
//!
//! APCs are the runtime's cooperative cancellation mechanism. Another thread queues a
//! callback with [`Thread::queue_user_apc`]; the target runs it at its next interruption
//! point, which is the start of an interruptible wait or any wakeup inside one. A
//! callback may fail (typically with [`SyncError::Interrupted`]), and that error then
//! propagates out of the wait.
use std::{
    cell::OnceCell,
    collections::VecDeque,
    panic::AssertUnwindSafe,
    ptr,
    sync::{
        atomic::{AtomicBool, AtomicPtr, AtomicU64},
        Arc,
    },
    thread::JoinHandle,
    time::Duration,
};

use parking_lot::{Mutex, MutexGuard};

use crate::{
    atomics::{AtomicCounter, AtomicOps},
    error::{Result, SyncError},
    sync::wait::{WaitPrimitive, WaitStatus},
};

/// Thread id that never names a thread. Monitors use it as their "unowned" owner word.
pub const NO_THREAD: u64 = 0;

static ID: AtomicU64 = AtomicU64::new(NO_THREAD + 1);

/// Serializes the destruction of wait primitives against APC delivery.
///
/// [`Thread::queue_user_apc`] reads the target's current wait object and pokes it
/// while holding this lock, and every wait primitive takes it when dropped, so a
/// primitive can never be freed between those two steps.
static WAIT_OBJECT_DELETION_LOCK: Mutex<()> = Mutex::new(());

pub fn wait_object_deletion_guard() -> MutexGuard<'static, ()> {
    WAIT_OBJECT_DELETION_LOCK.lock()
}

pub type UserApc = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

pub struct Thread {
    thread_id: u64,
    name: Option<String>,
    /// Set only by the thread itself, for the duration of an interruptible wait.
    current_wait_object: AtomicPtr<WaitPrimitive>,
    pending_apcs: Mutex<VecDeque<UserApc>>,
    /// Manual-reset event set once the thread's closure has returned.
    exit_signal: WaitPrimitive,
    started: AtomicBool,
}

impl Thread {
    /// Create a record for a thread that is yet to be started with [`start`](Self::start).
    pub fn new(name: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            thread_id: ID.increment() - 1,
            name,
            current_wait_object: AtomicPtr::new(ptr::null_mut()),
            pending_apcs: Mutex::new(VecDeque::new()),
            exit_signal: WaitPrimitive::manual_reset_event(false),
            started: AtomicBool::new(false),
        })
    }

    /// The record of the calling thread. Threads not started through
    /// [`start`](Self::start) are attached on first use.
    pub fn current() -> Arc<Thread> {
        CURRENT_THREAD.with(|current| current.get_or_init(Self::attach).clone())
    }

    fn attach() -> Arc<Thread> {
        let thread = Self::new(std::thread::current().name().map(String::from));
        thread.started.store_relaxed(true);
        log::trace!("attached {:?}", thread);
        thread
    }

    /// Start execution of `f` on a new native thread bound to this record.
    ///
    /// The join handle yields `None` if `f` panicked. Either way the thread's exit
    /// signal is set once `f` is done, see [`join`](Self::join).
    pub fn start<F, R>(self: &Arc<Self>, f: F) -> Result<JoinHandle<Option<R>>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.started.exchange(true) {
            return Err(SyncError::InvalidArgument("thread was already started"));
        }
        let mut builder = std::thread::Builder::new();
        if let Some(name) = &self.name {
            builder = builder.name(name.clone());
        }
        let this = self.clone();
        Ok(builder.spawn(move || this.startoff(f))?)
    }

    /// Create a record and immediately start `f` on it.
    pub fn spawn<F, R>(name: Option<String>, f: F) -> Result<(Arc<Thread>, JoinHandle<Option<R>>)>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let thread = Self::new(name);
        let handle = thread.start(f)?;
        Ok((thread, handle))
    }

    fn startoff<F, R>(self: &Arc<Self>, f: F) -> Option<R>
    where
        F: FnOnce() -> R,
    {
        init_current_thread(self.clone());
        log::trace!("started {:?}", self);
        let result = std::panic::catch_unwind(AssertUnwindSafe(f));
        if result.is_err() {
            log::debug!("{:?} terminated by a panic", self);
        }
        self.terminate();
        result.ok()
    }

    fn terminate(&self) {
        self.exit_signal.post_saturating(1);
    }

    pub fn id(&self) -> u64 {
        self.thread_id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Has the thread's closure returned?
    pub fn is_terminated(&self) -> bool {
        self.exit_signal.is_signaled()
    }

    /// Wait for the thread to terminate.
    pub fn join(&self, timeout: Option<Duration>, interruptible: bool) -> Result<WaitStatus> {
        self.exit_signal.wait(timeout, interruptible)
    }

    /// Queue `callback` to run on this thread at its next interruption point, waking it
    /// if it is blocked in an interruptible wait.
    pub fn queue_user_apc<F>(&self, callback: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.pending_apcs.lock().push_back(Box::new(callback));

        let _guard = wait_object_deletion_guard();
        let wait_object = self.current_wait_object.load_fenced();
        // SAFETY: the waiter clears the pointer before its wait returns, and the
        // primitive cannot be dropped while we hold the deletion lock.
        if let Some(wait_object) = unsafe { wait_object.as_ref() } {
            log::debug!("interrupting {:?} blocked on {:?}", self, wait_object.kind());
            wait_object.interrupt_wait();
        }
    }

    /// Queue an APC that raises [`SyncError::Interrupted`] in this thread.
    pub fn interrupt(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.queue_user_apc(move || Err(SyncError::interrupted(reason)));
    }

    pub fn has_pending_apcs(&self) -> bool {
        !self.pending_apcs.lock().is_empty()
    }

    /// Run the calling thread's pending APCs in order. Returns whether any ran.
    ///
    /// The queue lock is not held while a callback runs, so callbacks may queue further
    /// APCs or block on other primitives. The first failing callback stops the drain;
    /// callbacks queued behind it stay pending.
    pub fn check_for_user_apc_and_handle(&self) -> Result<bool> {
        debug_assert_eq!(
            self.thread_id,
            current_thread_id(),
            "APCs must be drained by their own thread"
        );
        let mut ran = false;
        loop {
            let Some(apc) = self.pending_apcs.lock().pop_front() else {
                break;
            };
            ran = true;
            apc()?;
        }
        Ok(ran)
    }

    pub(crate) fn set_current_wait_object(&self, wait_object: &WaitPrimitive) {
        debug_assert_eq!(self.thread_id, current_thread_id());
        self.current_wait_object.store_fenced(wait_object.as_ptr());
    }

    pub(crate) fn clear_current_wait_object(&self) {
        self.current_wait_object.store_fenced(ptr::null_mut());
    }

    /// Is the thread blocked in an interruptible wait right now?
    pub fn is_in_interruptible_wait(&self) -> bool {
        !self.current_wait_object.load_acquire().is_null()
    }
}

impl std::fmt::Debug for Thread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "Thread({} {:?})", self.thread_id, name),
            None => write!(f, "Thread({})", self.thread_id),
        }
    }
}

thread_local! {
    static CURRENT_THREAD: OnceCell<Arc<Thread>> = const { OnceCell::new() };
    static CURRENT_THREAD_ID: OnceCell<u64> = const { OnceCell::new() };
}

/// Id of the calling thread's record; cheaper than [`Thread::current`].
pub fn current_thread_id() -> u64 {
    CURRENT_THREAD_ID.with(|id| *id.get_or_init(|| Thread::current().id()))
}

fn init_current_thread(thread: Arc<Thread>) {
    CURRENT_THREAD.with(|current| {
        if current.set(thread).is_err() {
            panic!("native thread is already bound to a thread record");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn ids_are_stable_and_distinct() {
        let me = current_thread_id();
        assert_ne!(me, NO_THREAD);
        assert_eq!(me, Thread::current().id());
        let other = std::thread::spawn(current_thread_id).join().unwrap();
        assert_ne!(me, other);
    }

    #[test]
    fn apcs_run_in_order_on_own_thread() {
        let thread = Thread::current();
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let log = log.clone();
            thread.queue_user_apc(move || {
                log.lock().push(i);
                Ok(())
            });
        }
        assert!(thread.check_for_user_apc_and_handle().unwrap());
        assert_eq!(*log.lock(), vec![0, 1, 2]);
        assert!(!thread.check_for_user_apc_and_handle().unwrap());
    }

    #[test]
    fn apc_may_queue_another_apc() {
        let thread = Thread::current();
        let counter = Arc::new(AtomicU32::new(0));
        let inner = counter.clone();
        let target = thread.clone();
        thread.queue_user_apc(move || {
            inner.fetch_add(1, Ordering::SeqCst);
            let inner = inner.clone();
            target.queue_user_apc(move || {
                inner.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            Ok(())
        });
        thread.check_for_user_apc_and_handle().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failing_apc_leaves_rest_queued() {
        let thread = Thread::current();
        thread.interrupt("stop");
        thread.queue_user_apc(|| Ok(()));
        let err = thread.check_for_user_apc_and_handle().unwrap_err();
        assert!(err.is_interrupted());
        assert_eq!(err.to_string(), "thread interrupted: stop");
        assert!(thread.has_pending_apcs());
        assert!(thread.check_for_user_apc_and_handle().unwrap());
    }

    #[test]
    fn start_and_join() {
        let thread = Thread::new(Some("worker".to_string()));
        let record = thread.clone();
        let handle = thread
            .start(move || {
                assert_eq!(current_thread_id(), record.id());
                std::thread::current().name().map(String::from)
            })
            .unwrap();
        assert_eq!(
            thread.join(Some(Duration::from_secs(10)), false).unwrap(),
            WaitStatus::Success
        );
        assert!(thread.is_terminated());
        assert_eq!(handle.join().unwrap(), Some(Some("worker".to_string())));
        assert!(thread.start(|| ()).is_err());
    }

    #[test]
    fn spawn_binds_record() {
        let (thread, handle) = Thread::spawn(None, current_thread_id).unwrap();
        assert_eq!(handle.join().unwrap(), Some(thread.id()));
        assert!(thread.is_terminated());
    }

    #[test]
    fn panicking_thread_still_signals_exit() {
        let thread = Thread::new(None);
        let handle = thread.start(|| panic!("boom")).unwrap();
        assert_eq!(thread.join(None, false).unwrap(), WaitStatus::Success);
        assert_eq!(handle.join().unwrap(), None::<()>);
    }
}
