//! # Runtime events emitted by workers, the orchestrator and connection supervisors.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Thread lifecycle**: creation, suppression, init, exit
//! - **Connection**: dial attempts, sessions, health checks, state changes
//! - **Logger**: readiness
//! - **Shutdown**: requested, completed within grace, grace exceeded
//!
//! The [`Event`] struct carries additional metadata such as the thread label,
//! attempt counters, delays and reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use threadvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::DialFailed)
//!     .with_thread("CLIENT")
//!     .with_reason("connection refused")
//!     .with_attempt(3)
//!     .with_delay(Duration::from_secs(4));
//!
//! assert_eq!(ev.kind, EventKind::DialFailed);
//! assert_eq!(ev.thread.as_deref(), Some("CLIENT"));
//! assert_eq!(ev.delay_ms, Some(4000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::Duration;

use tracing::Level;

use crate::connection::ConnectionState;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Thread lifecycle ===
    /// Thread created, registered and marked running.
    ///
    /// Sets: `thread`
    ThreadCreated,

    /// Thread creation failed (OS error or duplicate registration).
    ///
    /// Sets: `thread`, `reason`
    ThreadCreateFailed,

    /// Thread skipped because its label is in the suppression list.
    ///
    /// Sets: `thread`
    ThreadSuppressed,

    /// Worker passed its `init` hook and is about to run.
    ///
    /// Sets: `thread`
    ThreadInitialised,

    /// Worker's `init` hook failed; the worker exits without running.
    ///
    /// Sets: `thread`, `reason`
    ThreadInitFailed,

    /// Worker finished its main function and `exit` hook.
    ///
    /// Sets: `thread`
    ThreadExited,

    // === Logger ===
    /// Logger drain loop is running; readiness gate opened.
    ///
    /// Sets: `thread`
    LoggerReady,

    // === Connection ===
    /// Connection supervisor moved to a new state.
    ///
    /// Sets: `thread`, `state`
    ConnectionStateChanged,

    /// Dial attempt started.
    ///
    /// Sets: `thread`, `attempt`, `reason` (target)
    DialAttempt,

    /// Socket setup or connect failed; a backoff sleep follows.
    ///
    /// Sets: `thread`, `attempt`, `delay_ms`, `reason`
    DialFailed,

    /// Dial loop gave up because shutdown was signaled.
    ///
    /// Sets: `thread`
    DialAborted,

    /// Socket ready (TCP connected / UDP set up / inbound accepted).
    ///
    /// Sets: `thread`, `reason` (target)
    Connected,

    /// Comms group could not be started; the socket was closed.
    ///
    /// Sets: `thread`, `reason`
    SessionSpawnFailed,

    /// Comms group running; monitoring begins.
    ///
    /// Sets: `thread`
    SessionStarted,

    /// First failed health check of a streak.
    ///
    /// Sets: `thread`, `attempt` (failed checks so far)
    HealthDegraded,

    /// Activity observed again after failed health checks.
    ///
    /// Sets: `thread`
    HealthRecovered,

    /// Failed health checks reached the retry limit; session forcibly ended.
    ///
    /// Sets: `thread`, `attempt` (limit)
    HealthExhausted,

    /// Waiting on the comms group failed for a reason other than a timeout.
    ///
    /// Sets: `thread`, `reason`
    SessionWaitFailed,

    /// Session torn down.
    ///
    /// Sets: `thread`, `reason`
    SessionEnded,

    // === Shutdown ===
    /// Shutdown requested (OS signal or command).
    ShutdownRequested,

    /// All threads stopped within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some threads did not stop in time.
    ///
    /// Sets: `reason` (stuck labels)
    GraceExceeded,

    /// Command received by the command interface.
    ///
    /// Sets: `thread`, `reason` (command line)
    CommandReceived,
}

impl EventKind {
    /// Log level used when the logger renders this event.
    ///
    /// - `DEBUG`: routine dial attempts and state changes
    /// - `WARN`: degraded health, dial failures, suppressed threads
    /// - `ERROR`: forced reconnects, creation/init failures, broken waits
    /// - `INFO`: everything else
    pub fn level(&self) -> Level {
        match self {
            EventKind::DialAttempt | EventKind::ConnectionStateChanged => Level::DEBUG,
            EventKind::DialFailed
            | EventKind::HealthDegraded
            | EventKind::ThreadSuppressed
            | EventKind::GraceExceeded => Level::WARN,
            EventKind::HealthExhausted
            | EventKind::ThreadCreateFailed
            | EventKind::ThreadInitFailed
            | EventKind::SessionSpawnFailed
            | EventKind::SessionWaitFailed => Level::ERROR,
            _ => Level::INFO,
        }
    }

    /// Short stable label (kebab-case) for log lines.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::ThreadCreated => "thread-created",
            EventKind::ThreadCreateFailed => "thread-create-failed",
            EventKind::ThreadSuppressed => "thread-suppressed",
            EventKind::ThreadInitialised => "thread-initialised",
            EventKind::ThreadInitFailed => "thread-init-failed",
            EventKind::ThreadExited => "thread-exited",
            EventKind::LoggerReady => "logger-ready",
            EventKind::ConnectionStateChanged => "state",
            EventKind::DialAttempt => "dial",
            EventKind::DialFailed => "dial-failed",
            EventKind::DialAborted => "dial-aborted",
            EventKind::Connected => "connected",
            EventKind::SessionSpawnFailed => "session-spawn-failed",
            EventKind::SessionStarted => "session-started",
            EventKind::HealthDegraded => "health-degraded",
            EventKind::HealthRecovered => "health-recovered",
            EventKind::HealthExhausted => "health-exhausted",
            EventKind::SessionWaitFailed => "session-wait-failed",
            EventKind::SessionEnded => "session-ended",
            EventKind::ShutdownRequested => "shutdown-requested",
            EventKind::AllStoppedWithin => "all-stopped-within-grace",
            EventKind::GraceExceeded => "grace-exceeded",
            EventKind::CommandReceived => "command",
        }
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Event classification.
    pub kind: EventKind,
    /// Label of the thread the event is about.
    pub thread: Option<Arc<str>>,
    /// Human-readable reason (errors, targets, commands).
    pub reason: Option<Arc<str>>,
    /// Attempt or counter value (starting from 1).
    pub attempt: Option<u32>,
    /// Delay before the next attempt in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Connection state (for `ConnectionStateChanged`).
    pub state: Option<ConnectionState>,
}

impl Event {
    /// Creates a new event of the given kind with the next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            kind,
            thread: None,
            reason: None,
            attempt: None,
            delay_ms: None,
            state: None,
        }
    }

    /// Attaches a thread label.
    #[inline]
    pub fn with_thread(mut self, label: impl Into<Arc<str>>) -> Self {
        self.thread = Some(label.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a connection state.
    #[inline]
    pub fn with_state(mut self, state: ConnectionState) -> Self {
        self.state = Some(state);
        self
    }

    /// Log level of this event.
    #[inline]
    pub fn level(&self) -> Level {
        self.kind.level()
    }
}
