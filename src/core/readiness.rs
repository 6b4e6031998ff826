//! # Readiness gate: one-shot broadcast barrier with a bounded wait.
//!
//! The logger opens the gate once its drain loop runs; every worker using the
//! default `init` hook waits on it before doing anything observable.
//!
//! ```text
//!            open()
//! Pending ───────────► Ready      wait() → Ok(())
//!    │
//!    └── fail() ─────► Failed     wait() → Err(ReadinessFailed)
//!
//! Pending after timeout           wait() → Err(ReadinessTimeout)
//! ```
//!
//! ## Rules
//! - Transitions out of `Pending` happen at most once; later `open`/`fail` calls are ignored.
//! - All waiters are woken on the transition (broadcast).

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::InitError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GateState {
    Pending,
    Ready,
    Failed,
}

struct Inner {
    state: Mutex<GateState>,
    cv: Condvar,
}

/// Cloneable handle to a shared readiness barrier.
#[derive(Clone)]
pub struct ReadinessGate {
    inner: Arc<Inner>,
    timeout: Duration,
}

impl ReadinessGate {
    /// Creates a pending gate whose [`wait`](Self::wait) gives up after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(GateState::Pending),
                cv: Condvar::new(),
            }),
            timeout,
        }
    }

    /// Default wait bound of this gate.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Marks the gate ready and wakes every waiter.
    pub fn open(&self) {
        self.settle(GateState::Ready);
    }

    /// Marks the gate failed and wakes every waiter.
    pub fn fail(&self) {
        self.settle(GateState::Failed);
    }

    /// `true` once the gate has been opened.
    pub fn is_ready(&self) -> bool {
        *self.inner.state.lock() == GateState::Ready
    }

    /// Blocks until the gate settles, bounded by the gate's own timeout.
    pub fn wait(&self) -> Result<(), InitError> {
        self.wait_for(self.timeout)
    }

    /// Blocks until the gate settles or `timeout` elapses.
    pub fn wait_for(&self, timeout: Duration) -> Result<(), InitError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        loop {
            match *state {
                GateState::Ready => return Ok(()),
                GateState::Failed => return Err(InitError::ReadinessFailed),
                GateState::Pending => {
                    if self.inner.cv.wait_until(&mut state, deadline).timed_out()
                        && *state == GateState::Pending
                    {
                        return Err(InitError::ReadinessTimeout { waited: timeout });
                    }
                }
            }
        }
    }

    fn settle(&self, to: GateState) {
        let mut state = self.inner.state.lock();
        if *state == GateState::Pending {
            *state = to;
            self.inner.cv.notify_all();
        }
    }
}

impl std::fmt::Debug for ReadinessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessGate")
            .field("state", &*self.inner.state.lock())
            .field("timeout", &self.timeout)
            .finish()
    }
}
