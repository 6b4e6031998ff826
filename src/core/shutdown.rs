//! # Shutdown: OS signals and shutdown-aware sleeping.
//!
//! Provides [`wait_for_shutdown_signal`], an async helper that completes when the
//! process receives a termination signal, [`ShutdownHandle`], the once-only
//! shutdown switch, and [`Sleeper`], the sleep primitive
//! used by retry loops so that a shutdown request is observed at every sleep
//! boundary.
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGINT` (Ctrl-C in terminal)
//! - `SIGTERM` (default kill signal, used by systemd/Kubernetes)
//! - `SIGQUIT` (quit signal)
//!
//! **Other platforms:**
//! - `Ctrl-C` via [`tokio::signal::ctrl_c`]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event, EventKind};

/// Waits for a termination signal.
///
/// Returns `Ok(())` when any signal is received, or `Err` if signal registration fails.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Waits for a termination signal.
///
/// Returns `Ok(())` when any signal is received, or `Err` if signal registration fails.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Process-wide shutdown switch shared by the runtime and the command interface.
///
/// The first [`request`](Self::request) publishes `ShutdownRequested`; every
/// call cancels the token.
#[derive(Clone, Debug)]
pub struct ShutdownHandle {
    token: CancellationToken,
    requested: Arc<AtomicBool>,
    bus: Bus,
}

impl ShutdownHandle {
    /// Wraps the process token; events go to `bus`.
    pub fn new(token: CancellationToken, bus: Bus) -> Self {
        Self {
            token,
            requested: Arc::new(AtomicBool::new(false)),
            bus,
        }
    }

    /// The process shutdown token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// `true` once any caller requested shutdown.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Requests shutdown. Returns `true` for the caller that got there first.
    pub fn request(&self, reason: &str) -> bool {
        let first = !self.requested.swap(true, Ordering::AcqRel);
        if first {
            self.bus
                .publish(Event::new(EventKind::ShutdownRequested).with_reason(reason));
        }
        self.token.cancel();
        first
    }
}

/// Sleeps that end early when the token is cancelled.
pub trait Sleeper: Send + Sync {
    /// Sleeps for `duration`.
    ///
    /// Returns `true` if the full duration elapsed, `false` if `token` was
    /// cancelled first.
    fn sleep(&self, duration: Duration, token: &CancellationToken) -> bool;
}

/// Real sleeper: sleeps in short slices and re-checks the token between them.
#[derive(Clone, Copy, Debug)]
pub struct PollingSleeper {
    slice: Duration,
}

impl PollingSleeper {
    /// Default poll slice.
    pub const DEFAULT_SLICE: Duration = Duration::from_millis(50);

    /// Creates a sleeper polling every `slice` (min 1ms).
    pub fn new(slice: Duration) -> Self {
        Self {
            slice: slice.max(Duration::from_millis(1)),
        }
    }
}

impl Default for PollingSleeper {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SLICE)
    }
}

impl Sleeper for PollingSleeper {
    fn sleep(&self, duration: Duration, token: &CancellationToken) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if token.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(self.slice.min(deadline - now));
        }
    }
}
