//! Named mutual exclusion with a bounded wait.
//!
//! Locks are advisory and keyed by string. A [`LockGuard`] releases its key
//! when dropped, including while unwinding from a panic.

pub mod file;
pub mod memory;

use std::time::Duration;

use anyhow::Result;
use tracing::{debug, warn};

pub use file::FileLocks;
pub use memory::InProcessLocks;

/// A service that grants exclusive ownership of string keys.
pub trait NamedLock: Send + Sync {
    /// Try to take `key`, waiting at most `timeout`.
    ///
    /// `Ok(false)` means the key is still held elsewhere after the wait. An
    /// `Err` is a fault in the lock service itself.
    fn try_acquire(&self, key: &str, timeout: Duration) -> Result<bool>;

    /// Give up `key`. Releasing a key that isn't held is a no-op.
    fn release(&self, key: &str) -> Result<()>;
}

/// Holds a key until dropped.
pub struct LockGuard<'a> {
    locks: &'a dyn NamedLock,
    key: String,
}

impl<'a> LockGuard<'a> {
    /// `Ok(None)` when the wait timed out.
    pub fn acquire(
        locks: &'a dyn NamedLock,
        key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Option<Self>> {
        let key = key.into();
        if locks.try_acquire(&key, timeout)? {
            debug!(lock.key = %key, "lock acquired");
            Ok(Some(Self { locks, key }))
        } else {
            Ok(None)
        }
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        match self.locks.release(&self.key) {
            Ok(()) => debug!(lock.key = %self.key, "lock released"),
            Err(e) => warn!(lock.key = %self.key, error = %e, "failed to release lock"),
        }
    }
}
