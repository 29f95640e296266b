//! Cancellation token shared between component owners and their worker
//! threads.
//!
//! Every threaded component (subscriber worker, sensor acquisition loop,
//! health check loop) holds a clone of its owner's token and is expected to
//! return promptly once the token is cancelled. The host process wires OS
//! signals to one token exactly once; nothing in the core touches signal
//! handlers.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

struct Inner {
    cancelled: Mutex<bool>,
    condvar: Condvar,
}

/// A clonable one-shot cancellation flag with blocking waits.
///
/// Cancellation is terminal: there is no reset. Components that restart
/// create a fresh token per run.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: Mutex::new(false),
                condvar: Condvar::new(),
            }),
        }
    }

    /// Cancel the token, waking every blocked waiter.
    pub fn cancel(&self) {
        let mut cancelled = self.inner.cancelled.lock();
        if !*cancelled {
            *cancelled = true;
            self.inner.condvar.notify_all();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock()
    }

    /// Block until the token is cancelled.
    pub fn wait(&self) {
        let mut cancelled = self.inner.cancelled.lock();
        while !*cancelled {
            self.inner.condvar.wait(&mut cancelled);
        }
    }

    /// Block until the token is cancelled or `timeout` elapses.
    ///
    /// Returns `true` if the token was cancelled, `false` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut cancelled = self.inner.cancelled.lock();
        while !*cancelled {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.inner.condvar.wait_for(&mut cancelled, deadline - now);
        }
        true
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
