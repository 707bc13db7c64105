//! Locks shared by threads of one process.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use super::NamedLock;

#[derive(Debug, Default)]
pub struct InProcessLocks {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl InProcessLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.held().map(|held| held.contains(key)).unwrap_or(false)
    }

    fn held(&self) -> Result<MutexGuard<'_, HashSet<String>>> {
        self.held
            .lock()
            .map_err(|e| anyhow!("lock table poisoned: {}", e))
    }
}

impl NamedLock for InProcessLocks {
    fn try_acquire(&self, key: &str, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        let mut held = self.held()?;

        loop {
            if held.insert(key.to_string()) {
                return Ok(true);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }

            // Wakeups are shared across keys, so re-check after every one.
            let (guard, _) = self
                .released
                .wait_timeout(held, deadline - now)
                .map_err(|e| anyhow!("lock table poisoned: {}", e))?;
            held = guard;
        }
    }

    fn release(&self, key: &str) -> Result<()> {
        let removed = self.held()?.remove(key);
        if removed {
            self.released.notify_all();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_exclusive_per_key() -> Result<()> {
        let locks = InProcessLocks::new();
        assert!(locks.try_acquire("a", Duration::ZERO)?);
        assert!(!locks.try_acquire("a", Duration::ZERO)?);
        assert!(locks.try_acquire("b", Duration::ZERO)?);

        locks.release("a")?;
        assert!(locks.try_acquire("a", Duration::ZERO)?);
        Ok(())
    }

    #[test]
    fn test_timeout_is_bounded() -> Result<()> {
        let locks = InProcessLocks::new();
        assert!(locks.try_acquire("a", Duration::ZERO)?);

        let start = Instant::now();
        assert!(!locks.try_acquire("a", Duration::from_millis(50))?);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(50));
        assert!(waited < Duration::from_secs(5));
        Ok(())
    }

    #[test]
    fn test_waiter_wakes_on_release() -> Result<()> {
        let locks = Arc::new(InProcessLocks::new());
        assert!(locks.try_acquire("a", Duration::ZERO)?);

        let waiter = {
            let locks = locks.clone();
            thread::spawn(move || locks.try_acquire("a", Duration::from_secs(10)).unwrap())
        };
        thread::sleep(Duration::from_millis(20));
        locks.release("a")?;

        assert!(waiter.join().unwrap());
        Ok(())
    }

    #[test]
    fn test_release_unheld_is_noop() -> Result<()> {
        let locks = InProcessLocks::new();
        locks.release("never")?;
        assert!(!locks.is_held("never"));
        Ok(())
    }

    #[test]
    fn test_mutual_exclusion_under_contention() {
        let locks = Arc::new(InProcessLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                let max_inside = max_inside.clone();
                thread::spawn(move || {
                    for _ in 0..20 {
                        assert!(locks.try_acquire("k", Duration::from_secs(10)).unwrap());
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        inside.fetch_sub(1, Ordering::SeqCst);
                        locks.release("k").unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }
}
