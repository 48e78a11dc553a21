//! Counting latch: `add` before handing work out, `done` when it is finished,
//! `wait` blocks until the count is back at zero.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
pub(crate) struct WaitGroup {
    count: Mutex<usize>,
    zero: Condvar,
}

impl WaitGroup {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn add(&self, n: usize) {
        *self.lock() += n;
    }

    pub(crate) fn done(&self) {
        let mut count = self.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.zero.notify_all();
        }
    }

    pub(crate) fn count(&self) -> usize {
        *self.lock()
    }

    pub(crate) fn wait(&self) {
        let mut count = self.lock();
        while *count > 0 {
            count = self
                .zero
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Calls `done` on the wait group when dropped, including during unwinding.
pub(crate) struct DoneGuard<'a>(pub(crate) &'a WaitGroup);

impl Drop for DoneGuard<'_> {
    fn drop(&mut self) {
        self.0.done();
    }
}
