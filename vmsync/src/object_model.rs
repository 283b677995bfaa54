//! The boundary with the surrounding object model.
//!
//! The synchronization core needs exactly one thing from an object: a pointer-sized
//! word it can read and compare-and-swap, initially null, that stays valid for as long
//! as any thread may still lock the object. The object model embeds a [`MonitorSlot`]
//! in its object header and exposes it through [`Synchronized`].
use std::{ptr, sync::atomic::AtomicPtr, sync::Arc};

use crate::{atomics::AtomicOps, sync::monitor::MonitorDescriptor};

#[repr(transparent)]
pub struct MonitorSlot(AtomicPtr<MonitorDescriptor>);

impl MonitorSlot {
    pub const fn new() -> Self {
        Self(AtomicPtr::new(ptr::null_mut()))
    }

    /// Does a monitor descriptor currently sit on this object?
    pub fn is_inflated(&self) -> bool {
        !self.0.load_acquire().is_null()
    }

    pub(crate) fn load(&self) -> Option<&'static MonitorDescriptor> {
        // SAFETY: descriptors come from a static pool and are never freed.
        unsafe { self.0.load_fenced().as_ref() }
    }

    pub(crate) fn points_to(&self, descriptor: &MonitorDescriptor) -> bool {
        ptr::eq(self.0.load_fenced(), descriptor)
    }

    /// Attach `descriptor` if no descriptor is installed yet.
    pub(crate) fn inflate(&self, descriptor: &'static MonitorDescriptor) -> bool {
        self.0
            .cas(ptr::null_mut(), ptr::from_ref(descriptor).cast_mut())
            .is_ok()
    }

    /// Detach `descriptor`. Fails if some other descriptor is installed.
    pub(crate) fn deflate(&self, descriptor: &'static MonitorDescriptor) -> bool {
        self.0
            .cas(ptr::from_ref(descriptor).cast_mut(), ptr::null_mut())
            .is_ok()
    }
}

impl Default for MonitorSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MonitorSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("MonitorSlot")
            .field(&self.0.load_relaxed())
            .finish()
    }
}

/// Implemented by every object type that can be locked with [`Monitor`](crate::sync::Monitor).
pub trait Synchronized {
    fn monitor_slot(&self) -> &MonitorSlot;
}

impl Synchronized for MonitorSlot {
    fn monitor_slot(&self) -> &MonitorSlot {
        self
    }
}

impl<T: Synchronized + ?Sized> Synchronized for &T {
    fn monitor_slot(&self) -> &MonitorSlot {
        (**self).monitor_slot()
    }
}

impl<T: Synchronized + ?Sized> Synchronized for Box<T> {
    fn monitor_slot(&self) -> &MonitorSlot {
        (**self).monitor_slot()
    }
}

impl<T: Synchronized + ?Sized> Synchronized for Arc<T> {
    fn monitor_slot(&self) -> &MonitorSlot {
        (**self).monitor_slot()
    }
}

/// A value paired with its own monitor slot, for objects that live outside a managed
/// heap (and for tests).
#[derive(Debug, Default)]
pub struct SyncObject<T> {
    slot: MonitorSlot,
    value: T,
}

impl<T> SyncObject<T> {
    pub const fn new(value: T) -> Self {
        Self {
            slot: MonitorSlot::new(),
            value,
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }
}

impl<T> Synchronized for SyncObject<T> {
    fn monitor_slot(&self) -> &MonitorSlot {
        &self.slot
    }
}
