//! # OS thread handle with a timed wait.
//!
//! `std::thread::JoinHandle` only offers an unbounded `join`. [`ThreadHandle`]
//! pairs it with an exit latch that the thread sets when its closure returns
//! or unwinds, so waits can be bounded by a deadline.
//!
//! ```text
//! ThreadHandle::spawn(label, f)
//!   └─► std::thread::Builder::new().name(label).spawn(|| { let _g = ExitGuard; f() })
//!                                                         └─ drop ─► latch.set() ─► notify_all
//! wait_until(deadline) ─► Condvar::wait_until on the latch
//! join()               ─► JoinHandle::join (panic → WaitError::Panicked)
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::WaitError;

struct ExitLatch {
    done: Mutex<bool>,
    cv: Condvar,
}

impl ExitLatch {
    fn set(&self) {
        let mut done = self.done.lock();
        *done = true;
        self.cv.notify_all();
    }
}

/// Sets the latch when dropped, including during unwinding.
struct ExitGuard(Arc<ExitLatch>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.0.set();
    }
}

/// Handle to one OS thread.
pub struct ThreadHandle {
    label: Arc<str>,
    join: Mutex<Option<JoinHandle<()>>>,
    latch: Arc<ExitLatch>,
    panicked: AtomicBool,
}

impl ThreadHandle {
    /// Spawns a named OS thread running `f`.
    pub fn spawn<F>(label: &str, f: F) -> std::io::Result<Arc<Self>>
    where
        F: FnOnce() + Send + 'static,
    {
        let latch = Arc::new(ExitLatch {
            done: Mutex::new(false),
            cv: Condvar::new(),
        });
        let guard = ExitGuard(Arc::clone(&latch));
        let join = std::thread::Builder::new()
            .name(label.to_string())
            .spawn(move || {
                let _guard = guard;
                f();
            })?;

        Ok(Arc::new(Self {
            label: label.into(),
            join: Mutex::new(Some(join)),
            latch,
            panicked: AtomicBool::new(false),
        }))
    }

    /// Label the thread was spawned with.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// `true` once the thread's closure returned or unwound.
    pub fn is_finished(&self) -> bool {
        *self.latch.done.lock()
    }

    /// Waits until the thread finishes or `deadline` passes (`None` = unbounded).
    ///
    /// Returns `true` if the thread finished.
    pub fn wait_until(&self, deadline: Option<Instant>) -> bool {
        let mut done = self.latch.done.lock();
        while !*done {
            match deadline {
                Some(d) => {
                    if self.latch.cv.wait_until(&mut done, d).timed_out() {
                        return *done;
                    }
                }
                None => self.latch.cv.wait(&mut done),
            }
        }
        true
    }

    /// Joins the OS thread, blocking until it finishes.
    ///
    /// Safe to call more than once: later calls report the first outcome.
    pub fn join(&self) -> Result<(), WaitError> {
        let join = self.join.lock().take();
        if let Some(join) = join {
            if join.join().is_err() {
                self.panicked.store(true, Ordering::Release);
            }
        }
        if self.panicked.load(Ordering::Acquire) {
            Err(WaitError::Panicked {
                labels: vec![self.label.to_string()],
            })
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for ThreadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadHandle")
            .field("label", &self.label)
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Waits for every handle, bounded by `timeout` (`None` = unbounded).
///
/// Finished threads are joined so panics surface as [`WaitError::Panicked`].
/// A timeout reports the labels still running and joins nothing that is
/// still alive.
pub fn wait_all(handles: &[Arc<ThreadHandle>], timeout: Option<Duration>) -> Result<(), WaitError> {
    let deadline = timeout.map(|t| Instant::now() + t);

    let pending: Vec<String> = handles
        .iter()
        .filter(|h| !h.wait_until(deadline))
        .map(|h| h.label().to_string())
        .collect();
    if let Some(timeout) = timeout.filter(|_| !pending.is_empty()) {
        return Err(WaitError::Timeout { timeout, pending });
    }

    let panicked: Vec<String> = handles
        .iter()
        .filter(|h| h.join().is_err())
        .map(|h| h.label().to_string())
        .collect();
    if panicked.is_empty() {
        Ok(())
    } else {
        Err(WaitError::Panicked { labels: panicked })
    }
}
