//! Per-object monitors.
//!
//! Every object can be used as a lock with `wait`/`pulse` semantics, but only the few
//! objects that are actually locked carry any lock state. An object starts *free*, with a
//! null [`MonitorSlot`]. The first `enter` takes a [`MonitorDescriptor`] from a global
//! free list, marks itself as owner and installs it with a single CAS ("inflation").
//! When the last interested thread leaves, the owner detaches the descriptor again
//! ("deflation") and returns it to the free list, so descriptors are recycled rather than
//! bound to one object for life:
//!
//! ```text
//! Free --enter--> Owned(thread, n) <--enter/exit--> Owned(thread, n±1)
//!                   |  ^
//!              exit |  | enter          (waiters or pulse waiters present)
//!                   v  |
//!               Inflated/Unowned
//!
//! Owned(thread, 1) --exit, nobody interested--> Deflating --all stragglers gone--> Free
//! ```
//!
//! Ownership only ever changes hands through a CAS on the descriptor's `owner` word. The
//! descriptor's ready queue (a semaphore) merely wakes candidates, which must still win
//! that CAS, so extra or spurious wakeups are harmless.
//!
//! Threads in [`Monitor::wait`] are tracked separately, on a lock-free list of
//! [`PulseWaitNode`]s hanging off the descriptor. Nodes are prepended by waiters and
//! unlinked only by the thread holding the monitor.
use std::{
    marker::PhantomData,
    ptr,
    sync::atomic::{AtomicPtr, AtomicU64, AtomicUsize},
    time::{Duration, Instant},
};

use atomic::Atomic;
use bytemuck::NoUninit;

use crate::{
    atomics::{AtomicCounter, AtomicOps},
    error::{Result, SyncError},
    object_model::{MonitorSlot, Synchronized},
    options::options,
    threading::{current_thread_id, wait_object_deletion_guard, NO_THREAD},
};

use super::{
    free_list::FreeList,
    wait::{WaitKind, WaitPrimitive, WaitStatus},
};

/// Owner word of an inflated descriptor nobody holds.
const UNOWNED: u64 = NO_THREAD;
/// Owner word of a descriptor sitting in the free list.
const ON_FREE_LIST: u64 = u64::MAX;

static DESCRIPTORS: FreeList<MonitorDescriptor> = FreeList::new(MonitorDescriptor::new);
static PULSE_NODES: FreeList<PulseWaitNode> = FreeList::new(PulseWaitNode::new);

/// Thread-local pause points used by tests to force interleavings of the contention and
/// deflation paths.
#[cfg(test)]
pub(crate) mod hooks {
    use std::cell::RefCell;

    use super::MonitorDescriptor;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum Point {
        /// Contender is about to register on the ready queue.
        BeforeRegister,
        /// Contender has bumped `waiting_count` and not yet re-checked the slot.
        AfterRegister,
        /// Owner decided nobody is interested and is about to detach.
        BeforeDeflate,
        /// Owner is about to wait for straggler acknowledgements.
        DeflateRound,
        /// Descriptor is about to go back to the pool.
        Recycle,
    }

    type Hook = Box<dyn FnMut(Point, &MonitorDescriptor)>;

    thread_local! {
        static HOOK: RefCell<Option<Hook>> = const { RefCell::new(None) };
    }

    pub(crate) fn install(hook: impl FnMut(Point, &MonitorDescriptor) + 'static) {
        HOOK.with(|slot| *slot.borrow_mut() = Some(Box::new(hook)));
    }

    pub(crate) fn reach(point: Point, descriptor: &MonitorDescriptor) {
        HOOK.with(|slot| {
            if let Some(hook) = slot.borrow_mut().as_mut() {
                hook(point, descriptor);
            }
        });
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "monitor_stats")] {
        struct DescriptorStats {
            inflations: AtomicUsize,
            contentions: AtomicUsize,
            handoffs: AtomicUsize,
        }

        impl DescriptorStats {
            const fn new() -> Self {
                Self {
                    inflations: AtomicUsize::new(0),
                    contentions: AtomicUsize::new(0),
                    handoffs: AtomicUsize::new(0),
                }
            }

            fn record_inflation(&self) {
                self.inflations.increment();
            }

            fn record_contention(&self) {
                self.contentions.increment();
            }

            fn record_handoff(&self) {
                self.handoffs.increment();
            }

            fn report(&self, descriptor: &MonitorDescriptor) {
                log::debug!(
                    "recycling monitor {:p}: {} inflations, {} contended enters, {} handoffs",
                    descriptor,
                    self.inflations.load_relaxed(),
                    self.contentions.load_relaxed(),
                    self.handoffs.load_relaxed()
                );
            }
        }
    } else {
        struct DescriptorStats;

        impl DescriptorStats {
            const fn new() -> Self {
                Self
            }

            #[inline(always)]
            fn record_inflation(&self) {}

            #[inline(always)]
            fn record_contention(&self) {}

            #[inline(always)]
            fn record_handoff(&self) {}

            #[inline(always)]
            fn report(&self, _descriptor: &MonitorDescriptor) {}
        }
    }
}

/// Lock state of an inflated object. Not permanently bound to any object.
pub struct MonitorDescriptor {
    /// Thread id of the owner, [`UNOWNED`] or [`ON_FREE_LIST`].
    owner: AtomicU64,
    /// Only touched by the owner.
    recursion_count: AtomicUsize,
    /// Semaphore contending threads park on.
    ready_queue: WaitPrimitive,
    /// Threads that registered on `ready_queue` and have not left yet.
    waiting_count: AtomicUsize,
    /// Signaled by contenders that discover the descriptor was detached under them.
    deflate_ack: WaitPrimitive,
    pulse_list: PulseList,
    stats: DescriptorStats,
}

enum Acquire {
    Acquired,
    Busy,
    /// The descriptor is no longer attached to the object; start over.
    Detached,
    TimedOut,
}

impl MonitorDescriptor {
    fn new() -> Self {
        Self {
            owner: AtomicU64::new(ON_FREE_LIST),
            recursion_count: AtomicUsize::new(0),
            ready_queue: WaitPrimitive::from_parts(WaitKind::Semaphore, 0, u32::MAX),
            waiting_count: AtomicUsize::new(0),
            deflate_ack: WaitPrimitive::auto_reset_event(false),
            pulse_list: PulseList::new(),
            stats: DescriptorStats::new(),
        }
    }

    fn allocate(owner: u64) -> &'static Self {
        let descriptor = DESCRIPTORS.allocate();
        debug_assert_eq!(descriptor.owner.load_relaxed(), ON_FREE_LIST);
        descriptor.recursion_count.store_relaxed(1);
        descriptor.owner.store_release(owner);
        descriptor
    }

    /// Owning thread, if any.
    pub fn owner(&self) -> Option<u64> {
        match self.owner.load_acquire() {
            UNOWNED | ON_FREE_LIST => None,
            owner => Some(owner),
        }
    }

    pub fn recursion_count(&self) -> usize {
        self.recursion_count.load_relaxed()
    }

    /// Threads currently contending for ownership.
    pub fn waiting_count(&self) -> usize {
        self.waiting_count.load_acquire()
    }

    fn try_acquire(&self, slot: &MonitorSlot, me: u64) -> Acquire {
        if self.owner.cas(UNOWNED, me).is_err() {
            return Acquire::Busy;
        }
        if slot.points_to(self) {
            self.recursion_count.store_relaxed(1);
            return Acquire::Acquired;
        }
        // recycled and attached to another object between our slot read and the CAS
        self.release_ownership();
        Acquire::Detached
    }

    /// Slow path: register on the ready queue and park until ownership is won, the
    /// deadline passes, or the descriptor turns out to have been detached.
    fn contend(&self, slot: &MonitorSlot, me: u64, deadline: Deadline) -> Acquire {
        #[cfg(test)]
        hooks::reach(hooks::Point::BeforeRegister, self);
        self.stats.record_contention();
        self.waiting_count.increment();
        #[cfg(test)]
        hooks::reach(hooks::Point::AfterRegister, self);
        if !slot.points_to(self) {
            self.leave_ready_queue(slot);
            return Acquire::Detached;
        }

        let mut spins = options().monitor_spin_count;
        loop {
            match self.try_acquire_queued(slot, me) {
                Acquire::Busy => {}
                outcome => return outcome,
            }
            // a deflating owner keeps `owner` until everybody queued has left
            if !slot.points_to(self) {
                self.leave_ready_queue(slot);
                return Acquire::Detached;
            }
            if spins > 0 {
                spins -= 1;
                std::hint::spin_loop();
                continue;
            }

            if self.ready_queue.wait_uninterruptible(deadline.remaining()) == WaitStatus::Success {
                continue;
            }

            // last chance: the lock may have been released right as we timed out
            return match self.try_acquire_queued(slot, me) {
                Acquire::Busy => {
                    self.leave_ready_queue(slot);
                    Acquire::TimedOut
                }
                outcome => outcome,
            };
        }
    }

    fn try_acquire_queued(&self, slot: &MonitorSlot, me: u64) -> Acquire {
        if self.owner.cas(UNOWNED, me).is_err() {
            return Acquire::Busy;
        }
        self.waiting_count.decrement();
        if slot.points_to(self) {
            self.recursion_count.store_relaxed(1);
            return Acquire::Acquired;
        }
        self.release_ownership();
        Acquire::Detached
    }

    fn leave_ready_queue(&self, slot: &MonitorSlot) {
        self.waiting_count.decrement();
        if !slot.points_to(self) {
            // the deflating owner may be waiting for us
            self.deflate_ack.post_saturating(1);
        }
    }

    fn release_ownership(&self) {
        self.owner.store_fenced(UNOWNED);
        if self.waiting_count.load_fenced() > 0 {
            self.ready_queue.post_saturating(1);
        }
    }

    /// Called by the owner; undoes one level of recursion and gives the lock up once the
    /// count drops to zero.
    fn exit(&'static self, slot: &MonitorSlot) {
        let recursion = self.recursion_count.load_relaxed() - 1;
        self.recursion_count.store_relaxed(recursion);
        if recursion > 0 {
            return;
        }

        if self.waiting_count.load_fenced() > 0 {
            self.stats.record_handoff();
            self.owner.store_fenced(UNOWNED);
            self.ready_queue.post_saturating(1);
            return;
        }

        if !self.pulse_list.is_empty() {
            // cannot deflate while `wait` callers still reference this descriptor.
            // A contender may have registered after the check above, hence the second
            // look once ownership is released.
            self.release_ownership();
            return;
        }

        self.deflate(slot);
    }

    fn deflate(&'static self, slot: &MonitorSlot) {
        #[cfg(test)]
        hooks::reach(hooks::Point::BeforeDeflate, self);
        if !slot.deflate(self) {
            panic!(
                "monitor slot {:p} changed while its owner was releasing it",
                slot
            );
        }
        log::trace!("deflated {:p} from {:p}", self, slot);

        let options = options();
        let mut rounds = 0u32;
        loop {
            let waiting = self.waiting_count.load_fenced();
            if waiting == 0 {
                break;
            }
            // contenders that registered just before the detach must see it and leave
            self.ready_queue
                .post_saturating(u32::try_from(waiting).unwrap_or(u32::MAX));
            #[cfg(test)]
            hooks::reach(hooks::Point::DeflateRound, self);
            self.deflate_ack
                .wait_uninterruptible(Some(options.deflate_ack_timeout()));
            rounds += 1;
            if rounds == options.deflate_warn_rounds {
                log::warn!(
                    "monitor {:p} still has {} stragglers after {} deflate rounds",
                    self,
                    waiting,
                    rounds
                );
            }
        }

        self.recycle();
    }

    fn recycle(&'static self) {
        #[cfg(test)]
        hooks::reach(hooks::Point::Recycle, self);
        self.stats.report(self);
        self.recursion_count.store_relaxed(0);
        self.ready_queue.reset();
        self.deflate_ack.reset();
        self.owner.store_fenced(ON_FREE_LIST);
        let _guard = wait_object_deletion_guard();
        // SAFETY: allocated from `DESCRIPTORS`, detached, and nobody is queued on it.
        unsafe { DESCRIPTORS.release(self) };
    }

    /// Give back a descriptor that lost the inflation race and was never visible.
    fn discard(&'static self) {
        self.recursion_count.store_relaxed(0);
        self.owner.store_fenced(ON_FREE_LIST);
        // SAFETY: allocated from `DESCRIPTORS` and never published.
        unsafe { DESCRIPTORS.release(self) };
    }
}

impl std::fmt::Debug for MonitorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorDescriptor")
            .field("owner", &self.owner())
            .field("recursion_count", &self.recursion_count())
            .field("waiting_count", &self.waiting_count())
            .field("pulse_waiters", &!self.pulse_list.is_empty())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PulseWaitState {
    Unused,
    /// Linked into a descriptor's pulse list.
    Waiting,
}

unsafe impl NoUninit for PulseWaitState {}

/// One in-flight [`Monitor::wait`].
pub struct PulseWaitNode {
    next: AtomicPtr<PulseWaitNode>,
    signal: WaitPrimitive,
    state: Atomic<PulseWaitState>,
}

impl PulseWaitNode {
    fn new() -> Self {
        Self {
            next: AtomicPtr::new(ptr::null_mut()),
            signal: WaitPrimitive::auto_reset_event(false),
            state: Atomic::new(PulseWaitState::Unused),
        }
    }

    fn allocate() -> &'static Self {
        let node = PULSE_NODES.allocate();
        // a pulse that arrived after the previous waiter timed out
        node.signal.reset();
        node.next.store_relaxed(ptr::null_mut());
        node
    }

    fn recycle(&'static self) {
        debug_assert_eq!(self.state.load_relaxed(), PulseWaitState::Unused);
        let _guard = wait_object_deletion_guard();
        // SAFETY: allocated from `PULSE_NODES` and unlinked.
        unsafe { PULSE_NODES.release(self) };
    }

    fn unlink(&self) {
        self.next.store_relaxed(ptr::null_mut());
        self.state.store_release(PulseWaitState::Unused);
    }

    fn wake(&self) {
        self.signal.post_saturating(1);
    }
}

/// # Safety
///
/// `node` must be null or point into `PULSE_NODES`, which never frees its entries.
unsafe fn node_ref(node: *mut PulseWaitNode) -> Option<&'static PulseWaitNode> {
    unsafe { node.as_ref() }
}

/// Prepend-only list of pulse waiters. Any thread may push; popping and unlinking is
/// reserved to the monitor owner, so removals only race with pushes, which only ever
/// touch `head`.
struct PulseList {
    head: AtomicPtr<PulseWaitNode>,
}

impl PulseList {
    const fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }

    fn is_empty(&self) -> bool {
        self.head.load_fenced().is_null()
    }

    fn push(&self, node: &'static PulseWaitNode) {
        node.state.store_relaxed(PulseWaitState::Waiting);
        let node_ptr = ptr::from_ref(node).cast_mut();
        let mut head = self.head.load_acquire();
        loop {
            node.next.store_relaxed(head);
            match self.head.cas(head, node_ptr) {
                Ok(_) => break,
                Err(current) => head = current,
            }
        }
    }

    /// Unlink the longest-waiting node.
    fn pop_oldest(&self) -> Option<&'static PulseWaitNode> {
        loop {
            let head = self.head.load_acquire();
            let mut node = unsafe { node_ref(head) }?;
            let mut previous = None;
            while let Some(next) = unsafe { node_ref(node.next.load_acquire()) } {
                previous = Some(node);
                node = next;
            }

            match previous {
                Some(previous) => previous.next.store_release(ptr::null_mut()),
                None => {
                    if self.head.cas(head, ptr::null_mut()).is_err() {
                        // a waiter was prepended meanwhile
                        continue;
                    }
                }
            }
            node.unlink();
            return Some(node);
        }
    }

    /// Unlink every node, oldest first.
    fn take_all(&self) -> Vec<&'static PulseWaitNode> {
        let mut nodes = Vec::new();
        let mut cursor = self.head.exchange(ptr::null_mut());
        while let Some(node) = unsafe { node_ref(cursor) } {
            cursor = node.next.load_acquire();
            node.unlink();
            nodes.push(node);
        }
        nodes.reverse();
        nodes
    }

    fn remove(&self, target: &'static PulseWaitNode) -> bool {
        loop {
            let head = self.head.load_acquire();
            if ptr::eq(head, target) {
                let next = target.next.load_acquire();
                if self.head.cas(head, next).is_err() {
                    continue;
                }
                target.unlink();
                return true;
            }

            let mut cursor = unsafe { node_ref(head) };
            while let Some(node) = cursor {
                let next = node.next.load_acquire();
                if ptr::eq(next, target) {
                    node.next.store_release(target.next.load_acquire());
                    target.unlink();
                    return true;
                }
                cursor = unsafe { node_ref(next) };
            }
            return false;
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Deadline {
    Immediate,
    At(Instant),
    Never,
}

impl Deadline {
    fn after(timeout: Option<Duration>) -> Self {
        match timeout {
            None => Deadline::Never,
            Some(timeout) if timeout.is_zero() => Deadline::Immediate,
            Some(timeout) => Instant::now()
                .checked_add(timeout)
                .map_or(Deadline::Never, Deadline::At),
        }
    }

    /// Time left to wait; `None` waits forever.
    fn remaining(self) -> Option<Duration> {
        match self {
            Deadline::Immediate => Some(Duration::ZERO),
            Deadline::At(at) => Some(at.saturating_duration_since(Instant::now())),
            Deadline::Never => None,
        }
    }
}

/// Counters of the global descriptor and wait node pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorPoolStats {
    pub descriptors_allocated: usize,
    pub descriptors_pooled: usize,
    pub wait_nodes_allocated: usize,
    pub wait_nodes_pooled: usize,
}

/// Monitor operations on any [`Synchronized`] object.
///
/// Timeouts are `Option<Duration>`: `None` waits forever and `Some(Duration::ZERO)`
/// never blocks.
pub struct Monitor;

impl Monitor {
    /// Acquire the object's monitor, blocking as long as necessary.
    pub fn enter<O: Synchronized + ?Sized>(object: &O) {
        let acquired = Self::try_enter(object, None);
        debug_assert!(acquired);
    }

    /// Acquire the object's monitor, giving up after `timeout`. Recursive acquisition by
    /// the owner always succeeds.
    pub fn try_enter<O: Synchronized + ?Sized>(object: &O, timeout: Option<Duration>) -> bool {
        let slot = object.monitor_slot();
        let me = current_thread_id();
        let deadline = Deadline::after(timeout);

        loop {
            let Some(descriptor) = slot.load() else {
                let descriptor = MonitorDescriptor::allocate(me);
                if slot.inflate(descriptor) {
                    descriptor.stats.record_inflation();
                    log::trace!("inflated {:p} with {:p}", slot, descriptor);
                    return true;
                }
                descriptor.discard();
                continue;
            };

            if descriptor.owner.load_acquire() == me {
                descriptor
                    .recursion_count
                    .store_relaxed(descriptor.recursion_count.load_relaxed() + 1);
                return true;
            }

            match descriptor.try_acquire(slot, me) {
                Acquire::Acquired => return true,
                Acquire::Detached => continue,
                _ => {}
            }

            if matches!(deadline, Deadline::Immediate) {
                return false;
            }

            match descriptor.contend(slot, me, deadline) {
                Acquire::Acquired => return true,
                Acquire::TimedOut => return false,
                _ => continue,
            }
        }
    }

    /// Release one level of ownership.
    pub fn exit<O: Synchronized + ?Sized>(object: &O) -> Result<()> {
        let slot = object.monitor_slot();
        let descriptor = Self::owned_descriptor(slot)?;
        descriptor.exit(slot);
        Ok(())
    }

    /// Release the monitor completely, wait for a pulse or `timeout`, and reacquire it
    /// with the original recursion count.
    ///
    /// Returns whether the wait ended because of a pulse. The monitor is held again
    /// when this returns, on every path, including when an APC interrupted the wait:
    /// the APC's error is returned only after the lock has been reacquired.
    pub fn wait<O: Synchronized + ?Sized>(object: &O, timeout: Option<Duration>) -> Result<bool> {
        let slot = object.monitor_slot();
        let descriptor = Self::owned_descriptor(slot)?;
        let recursion = descriptor.recursion_count.load_relaxed();
        descriptor.recursion_count.store_relaxed(1);

        let node = match timeout {
            Some(timeout) if timeout.is_zero() => None,
            _ => {
                let node = PulseWaitNode::allocate();
                descriptor.pulse_list.push(node);
                Some(node)
            }
        };

        descriptor.exit(slot);
        let interrupted = node.and_then(|node| node.signal.wait(timeout, true).err());
        Self::enter(object);

        let Some(reacquired) = slot.load() else {
            unreachable!("monitor {:p} is not inflated after enter", slot);
        };
        reacquired.recursion_count.store_relaxed(recursion);

        let pulsed = match node {
            None => false,
            Some(node) => {
                let pulsed = node.state.load_acquire() == PulseWaitState::Unused;
                if !pulsed {
                    // still linked, so the descriptor could not have been deflated
                    debug_assert!(ptr::eq(descriptor, reacquired));
                    let removed = descriptor.pulse_list.remove(node);
                    debug_assert!(removed, "pulse wait node missing from its list");
                }
                node.recycle();
                pulsed
            }
        };

        match interrupted {
            Some(err) => Err(err),
            None => Ok(pulsed),
        }
    }

    /// Wake the longest-waiting thread blocked in [`wait`](Self::wait), if any.
    pub fn pulse<O: Synchronized + ?Sized>(object: &O) -> Result<()> {
        let descriptor = Self::owned_descriptor(object.monitor_slot())?;
        if let Some(node) = descriptor.pulse_list.pop_oldest() {
            node.wake();
        }
        Ok(())
    }

    /// Wake every thread blocked in [`wait`](Self::wait).
    pub fn pulse_all<O: Synchronized + ?Sized>(object: &O) -> Result<()> {
        let descriptor = Self::owned_descriptor(object.monitor_slot())?;
        for node in descriptor.pulse_list.take_all() {
            node.wake();
        }
        Ok(())
    }

    /// Is the object's monitor held by any thread?
    pub fn is_acquired<O: Synchronized + ?Sized>(object: &O) -> bool {
        Self::holder(object).is_some()
    }

    /// Is the object's monitor held by the calling thread?
    pub fn is_entered<O: Synchronized + ?Sized>(object: &O) -> bool {
        Self::owned_descriptor(object.monitor_slot()).is_ok()
    }

    /// Id of the thread holding the object's monitor.
    pub fn holder<O: Synchronized + ?Sized>(object: &O) -> Option<u64> {
        object
            .monitor_slot()
            .load()
            .and_then(|descriptor| descriptor.owner())
    }

    /// Number of threads currently queued to acquire the object's monitor.
    pub fn waiting_count<O: Synchronized + ?Sized>(object: &O) -> usize {
        object
            .monitor_slot()
            .load()
            .map_or(0, MonitorDescriptor::waiting_count)
    }

    /// Enter the monitor and return a guard that exits it when dropped.
    pub fn lock<O: Synchronized + ?Sized>(object: &O) -> MonitorGuard<'_, O> {
        Self::enter(object);
        MonitorGuard {
            object,
            marker: PhantomData,
        }
    }

    pub fn pool_stats() -> MonitorPoolStats {
        MonitorPoolStats {
            descriptors_allocated: DESCRIPTORS.allocated(),
            descriptors_pooled: DESCRIPTORS.pooled(),
            wait_nodes_allocated: PULSE_NODES.allocated(),
            wait_nodes_pooled: PULSE_NODES.pooled(),
        }
    }

    fn owned_descriptor(slot: &MonitorSlot) -> Result<&'static MonitorDescriptor> {
        let me = current_thread_id();
        slot.load()
            .filter(|descriptor| descriptor.owner.load_acquire() == me)
            .ok_or(SyncError::LockNotHeld)
    }
}

/// Holds an object's monitor until dropped. Must be dropped on the thread that created it.
pub struct MonitorGuard<'a, O: Synchronized + ?Sized> {
    object: &'a O,
    marker: PhantomData<*const ()>,
}

impl<O: Synchronized + ?Sized> MonitorGuard<'_, O> {
    pub fn wait(&self, timeout: Option<Duration>) -> Result<bool> {
        Monitor::wait(self.object, timeout)
    }

    pub fn pulse(&self) {
        let result = Monitor::pulse(self.object);
        debug_assert!(result.is_ok());
    }

    pub fn pulse_all(&self) {
        let result = Monitor::pulse_all(self.object);
        debug_assert!(result.is_ok());
    }
}

impl<O: Synchronized + ?Sized> Drop for MonitorGuard<'_, O> {
    fn drop(&mut self) {
        let result = Monitor::exit(self.object);
        debug_assert!(result.is_ok(), "monitor guard dropped without owning the monitor");
    }
}
