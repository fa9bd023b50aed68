use std::sync::{Mutex, MutexGuard, TryLockError};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A mutex whose every acquisition is a bounded wait.
///
/// `acquire` gives up after the lock's configured wait and returns `None`;
/// callers skip the guarded work for this cycle instead of blocking.
#[derive(Debug)]
pub struct TimedMutex<T> {
    name: &'static str,
    wait: Duration,
    inner: Mutex<T>,
}

impl<T> TimedMutex<T> {
    pub fn new(name: &'static str, value: T, wait: Duration) -> Self {
        Self {
            name,
            wait,
            inner: Mutex::new(value),
        }
    }

    /// Tries to take the lock within the configured wait.
    pub fn acquire(&self) -> Option<MutexGuard<'_, T>> {
        self.try_lock_for(self.wait)
    }

    /// Tries to take the lock within `wait`.
    ///
    /// A poisoned lock is recovered: the holder panicked, but every guarded
    /// value in the station is replaced wholesale, never left half written.
    ///
    /// A wait too long to express as a deadline gets a single attempt.
    pub fn try_lock_for(&self, wait: Duration) -> Option<MutexGuard<'_, T>> {
        let deadline = Instant::now().checked_add(wait);

        loop {
            match self.inner.try_lock() {
                Ok(guard) => return Some(guard),
                Err(TryLockError::Poisoned(poisoned)) => {
                    log::warn!("{} lock was poisoned, recovering", self.name);
                    return Some(poisoned.into_inner());
                }
                Err(TryLockError::WouldBlock) => {}
            }

            let now = Instant::now();
            match deadline {
                Some(deadline) if now < deadline => {
                    std::thread::sleep(POLL_INTERVAL.min(deadline - now));
                }
                _ => {
                    log::trace!("{} lock timed out after {:?}", self.name, wait);
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_free_lock_is_acquired() {
        let lock = TimedMutex::new("test", 5u32, Duration::from_millis(10));
        assert_eq!(*lock.acquire().unwrap(), 5);
    }

    #[test]
    fn test_held_lock_times_out_without_blocking_forever() {
        let lock = TimedMutex::new("test", (), Duration::from_millis(20));
        let _held = lock.acquire().unwrap();

        let started = Instant::now();
        assert!(lock.acquire().is_none());
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(20));
        assert!(waited < Duration::from_secs(2));
    }

    #[test]
    fn test_unrepresentable_wait_tries_once() {
        let lock = TimedMutex::new("test", (), Duration::MAX);
        let _held = lock.try_lock_for(Duration::ZERO).unwrap();

        let started = Instant::now();
        assert!(lock.acquire().is_none());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_lock_released_by_other_thread_is_acquired() {
        let lock = Arc::new(TimedMutex::new("test", 0u32, Duration::from_millis(500)));
        let guard_lock = lock.clone();
        let (held_tx, held_rx) = std::sync::mpsc::channel();

        let holder = std::thread::spawn(move || {
            let mut guard = guard_lock.acquire().unwrap();
            held_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(30));
            *guard = 7;
        });

        held_rx.recv().unwrap();
        assert_eq!(*lock.acquire().unwrap(), 7);
        holder.join().unwrap();
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let lock = Arc::new(TimedMutex::new("test", 1u32, Duration::from_millis(10)));
        let poisoner = lock.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.acquire().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert_eq!(*lock.acquire().unwrap(), 1);
    }
}
