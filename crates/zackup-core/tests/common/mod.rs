//! Test helpers: polling and a gate that holds runner calls until released.

#![allow(dead_code)]

use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Poll `cond` until it holds or `timeout` elapses. Returns the last result.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

#[derive(Default)]
struct GateState {
    started: usize,
    permits: usize,
}

/// Runners call `enter`, which counts the call and blocks until the test
/// hands out a permit with `release`.
#[derive(Clone, Default)]
pub struct Gate {
    inner: Arc<(Mutex<GateState>, Condvar)>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) {
        let (lock, cvar) = &*self.inner;
        let mut state = lock.lock().unwrap();
        state.started += 1;
        cvar.notify_all();
        while state.permits == 0 {
            state = cvar.wait(state).unwrap();
        }
        state.permits -= 1;
    }

    pub fn release(&self, n: usize) {
        let (lock, cvar) = &*self.inner;
        lock.lock().unwrap().permits += n;
        cvar.notify_all();
    }

    pub fn started(&self) -> usize {
        self.inner.0.lock().unwrap().started
    }

    /// Block until at least `n` calls have entered the gate.
    pub fn await_started(&self, n: usize, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap();
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |s| s.started < n)
            .unwrap();
        guard.started >= n
    }
}
