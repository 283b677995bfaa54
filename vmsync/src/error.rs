use thiserror::Error;

/// Errors raised by monitors, wait primitives and the thread APC machinery.
///
/// A timed-out wait is not an error: wait primitives report it through
/// [`WaitStatus::Timeout`](crate::sync::wait::WaitStatus::Timeout) and monitor
/// operations through a `false` return value.
#[derive(Debug, Error)]
pub enum SyncError {
    /// `exit`, `wait`, `pulse` or `pulse_all` was called by a thread that does not
    /// own the object's monitor. No monitor state has been modified.
    #[error("object synchronization method was called from an unsynchronized block of code")]
    LockNotHeld,

    /// Raised by an APC callback delivered to a thread blocked in an interruptible
    /// wait. The wait has already unregistered itself (and for monitor waits,
    /// reacquired the lock) when this reaches the caller.
    #[error("thread interrupted: {reason}")]
    Interrupted { reason: String },

    /// Releasing the semaphore would push its count past the maximum. The count
    /// is left unchanged.
    #[error("semaphore count would exceed its maximum of {max}")]
    SemaphoreFull { max: u32 },

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("failed to spawn thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// Convenience constructor used by APC callbacks.
    pub fn interrupted(reason: impl Into<String>) -> Self {
        Self::Interrupted {
            reason: reason.into(),
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }
}
