use crossbeam::utils::Backoff;
use tracing::trace;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use super::LockType;
use crate::warnings::MatrixWarning;

const NO_WRITER: usize = usize::MAX;

/// Reader/writer lock guarding one destination region.
///
/// Shared epochs are readers, exclusive epochs are writers. A pending writer
/// blocks new readers from entering, the writer then waits for the readers
/// already inside to drain.
#[derive(Debug)]
pub(crate) struct EpochLock {
    readers: AtomicUsize,
    writer: AtomicUsize,
}

impl EpochLock {
    pub(crate) fn new() -> EpochLock {
        EpochLock {
            readers: AtomicUsize::new(0),
            writer: AtomicUsize::new(NO_WRITER),
        }
    }

    fn try_reader_lock(&self) -> bool {
        if self.writer.load(Ordering::SeqCst) != NO_WRITER {
            return false;
        }
        self.readers.fetch_add(1, Ordering::SeqCst);
        if self.writer.load(Ordering::SeqCst) == NO_WRITER {
            true
        } else {
            self.readers.fetch_sub(1, Ordering::SeqCst);
            false
        }
    }

    fn try_writer_lock(&self, origin: usize) -> bool {
        if self
            .writer
            .compare_exchange(NO_WRITER, origin, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        if self.readers.load(Ordering::SeqCst) == 0 {
            true
        } else {
            self.writer.store(NO_WRITER, Ordering::SeqCst);
            false
        }
    }

    pub(crate) fn try_lock(&self, origin: usize, lock_type: LockType) -> bool {
        match lock_type {
            LockType::Shared => self.try_reader_lock(),
            LockType::Exclusive => self.try_writer_lock(origin),
        }
    }

    /// `pe` is the owner of the guarded region, used for reporting only
    pub(crate) fn lock(&self, origin: usize, pe: usize, lock_type: LockType) {
        let backoff = Backoff::new();
        let start = Instant::now();
        let mut warned = false;
        let mut check_timeout = |backoff: &Backoff| {
            backoff.snooze();
            if !warned && backoff.is_completed() {
                let elapsed = start.elapsed().as_secs_f64();
                if elapsed > crate::config().deadlock_timeout {
                    warned = true;
                    MatrixWarning::EpochWait(pe, elapsed).print();
                }
            }
        };
        match lock_type {
            LockType::Shared => {
                while !self.try_reader_lock() {
                    check_timeout(&backoff);
                }
            }
            LockType::Exclusive => {
                while self
                    .writer
                    .compare_exchange(NO_WRITER, origin, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
                {
                    check_timeout(&backoff);
                }
                while self.readers.load(Ordering::SeqCst) != 0 {
                    check_timeout(&backoff);
                }
            }
        }
        trace!("pe {origin} locked epoch on pe {pe} ({lock_type:?})");
    }

    pub(crate) fn unlock(&self, origin: usize, lock_type: LockType) {
        match lock_type {
            LockType::Shared => {
                self.readers.fetch_sub(1, Ordering::SeqCst);
            }
            LockType::Exclusive => {
                if let Err(val) = self.writer.compare_exchange(
                    origin,
                    NO_WRITER,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                ) {
                    panic!(
                        "should not be trying to unlock another pes epoch {:?} {:?}",
                        origin, val
                    );
                }
            }
        }
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.writer.load(Ordering::SeqCst) != NO_WRITER || self.readers.load(Ordering::SeqCst) > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn shared_epochs_coexist() {
        let lock = EpochLock::new();
        assert!(lock.try_lock(0, LockType::Shared));
        assert!(lock.try_lock(1, LockType::Shared));
        assert!(!lock.try_lock(2, LockType::Exclusive));
        lock.unlock(0, LockType::Shared);
        lock.unlock(1, LockType::Shared);
        assert!(!lock.is_locked());
    }

    #[test]
    fn exclusive_excludes() {
        let lock = EpochLock::new();
        assert!(lock.try_lock(3, LockType::Exclusive));
        assert!(!lock.try_lock(1, LockType::Shared));
        assert!(!lock.try_lock(1, LockType::Exclusive));
        lock.unlock(3, LockType::Exclusive);
        assert!(lock.try_lock(1, LockType::Exclusive));
        lock.unlock(1, LockType::Exclusive);
        assert!(!lock.is_locked());
    }

    #[test]
    #[should_panic]
    fn foreign_unlock_panics() {
        let lock = EpochLock::new();
        assert!(lock.try_lock(0, LockType::Exclusive));
        lock.unlock(1, LockType::Exclusive);
    }

    #[test]
    fn blocked_writer_acquires_after_release() {
        let lock = Arc::new(EpochLock::new());
        lock.lock(0, 0, LockType::Exclusive);
        let waiter = {
            let lock = lock.clone();
            std::thread::spawn(move || {
                lock.lock(1, 0, LockType::Exclusive);
                lock.unlock(1, LockType::Exclusive);
            })
        };
        std::thread::sleep(std::time::Duration::from_millis(20));
        lock.unlock(0, LockType::Exclusive);
        waiter.join().unwrap();
        assert!(!lock.is_locked());
    }
}
