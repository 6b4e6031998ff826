//! # ConnectionSupervisor: keeps one link (client or server role) alive.
//!
//! Runs inside the CLIENT/SERVER worker thread. It dials with exponential
//! backoff, starts a comms group per session, monitors the session's health
//! and reconnects after a fixed delay, until shutdown.
//!
//! ## States
//! ```text
//! DISCONNECTED ─► CONNECTING ─ok─► CONNECTED ─spawn ok─► MONITORING
//!      ▲             │  ▲              │                    │
//!      │        fail │  │ backoff      │ spawn failed       │ completed / closed /
//!      │             └──┘              │ (no delay)         │ health exhausted / wait failed
//!      ├───────────────────────────────┘                    │
//!      └──────────────── reconnect delay ◄──────────────────┘
//!
//! shutdown: CONNECTING / MONITORING / DISCONNECTED ─► TERMINAL
//! ```
//!
//! ## Dial loop
//! ```text
//! failures = 0
//! loop {
//!   shutdown?            → DialAborted, no session
//!   DialAttempt{failures + 1}  (not repeated while idle)
//!   setup()              ─┐
//!   connect(timeout)      ├─ Err → close socket
//!   (stream only)        ─┘        awaits_peer(err)? → retry at once, idle
//!                                  else failures += 1,
//!                                  DialFailed{delay = backoff.next(failures - 1)}, sleep(delay)
//!   Ok → socket
//! }
//! ```
//! Backoff starts over on every dial loop. A listening server whose accept
//! window passed without a peer is idle, not failing: it neither backs off
//! nor counts the attempt.
//!
//! ## Health check
//! ```text
//! loop {
//!   shutdown? / group closed?         → end
//!   group.wait(thread_wait_timeout)
//!     Ok                              → end (completed)
//!     Err(timeout):
//!       activity since last check     → failed = 0          (HealthRecovered if failed > 0)
//!       none                          → failed += 1         (HealthDegraded on the first)
//!                                       failed >= limit     → end (HealthExhausted)
//!     Err(other)                      → end (SessionWaitFailed)
//! }
//! ```

use std::time::Duration;

use thiserror::Error;

use crate::config::{LinkSettings, RuntimeSettings};
use crate::connection::comms::{CommsFactory, CommsGroup};
use crate::connection::dialer::Dialer;
use crate::connection::state::ConnectionState;
use crate::core::{Sleeper, WorkerContext};
use crate::events::EventKind;
use crate::policies::BackoffPolicy;
use crate::threads::Worker;

/// Tunables of one supervisor.
#[derive(Clone, Debug, PartialEq)]
pub struct SupervisorParams {
    /// Delay law between failed dial attempts.
    pub backoff: BackoffPolicy,
    /// Per-attempt connect timeout.
    pub connect_timeout: Duration,
    /// Monitoring loop wait granularity.
    pub wait_timeout: Duration,
    /// Consecutive failed health checks before a forced reconnect (`None` = unlimited).
    pub retry_limit: Option<u32>,
    /// Fixed delay between the end of a session and the next dial.
    pub reconnect_delay: Duration,
}

impl SupervisorParams {
    /// Builds parameters from a link table and the runtime table.
    pub fn from_settings(link: &LinkSettings, runtime: &RuntimeSettings) -> Self {
        Self {
            backoff: BackoffPolicy::doubling(link.backoff_max()),
            connect_timeout: link.connection_timeout(),
            wait_timeout: link.thread_wait_timeout(),
            retry_limit: link.retry_limit(),
            reconnect_delay: runtime.reconnect_delay(),
        }
    }
}

#[derive(Error, Debug)]
enum DialError {
    #[error("socket setup failed: {0}")]
    Setup(std::io::Error),
    #[error("connect failed: {0}")]
    Connect(std::io::Error),
}

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    /// Every comms worker finished.
    Completed,
    /// The comms group reported the connection closed.
    Closed,
    /// Failed health checks reached the retry limit.
    HealthExhausted,
    /// Waiting on the group failed for a reason other than a timeout.
    WaitFailed,
    /// Shutdown was signaled.
    Shutdown,
}

impl SessionEnd {
    /// Reason attached to `SessionEnded` events.
    pub fn as_str(self) -> &'static str {
        match self {
            SessionEnd::Completed => "comms group completed",
            SessionEnd::Closed => "connection closed",
            SessionEnd::HealthExhausted => "health checks exhausted",
            SessionEnd::WaitFailed => "group wait failed",
            SessionEnd::Shutdown => "shutdown",
        }
    }
}

/// Connection state machine for one role.
pub struct ConnectionSupervisor<D, F, S> {
    dialer: D,
    comms: F,
    sleeper: S,
    params: SupervisorParams,
}

impl<D, F, S> ConnectionSupervisor<D, F, S>
where
    D: Dialer,
    F: CommsFactory<D::Socket>,
    S: Sleeper,
{
    /// Creates a supervisor.
    pub fn new(dialer: D, comms: F, sleeper: S, params: SupervisorParams) -> Self {
        Self {
            dialer,
            comms,
            sleeper,
            params,
        }
    }

    /// Parameters in use.
    pub fn params(&self) -> &SupervisorParams {
        &self.params
    }

    /// The dialer.
    pub fn dialer(&self) -> &D {
        &self.dialer
    }

    /// Runs until shutdown; returns once TERMINAL is reached.
    pub fn run(&self, ctx: &WorkerContext) {
        let mut state = ConnectionState::Disconnected;

        loop {
            self.enter(ctx, &mut state, ConnectionState::Connecting);
            let Some(socket) = self.dial(ctx) else {
                break;
            };

            self.enter(ctx, &mut state, ConnectionState::Connected);
            ctx.publish(
                ctx.event(EventKind::Connected)
                    .with_reason(self.dialer.target()),
            );

            let group = match self.comms.spawn(ctx, socket) {
                Ok(group) => group,
                Err(e) => {
                    ctx.publish(
                        ctx.event(EventKind::SessionSpawnFailed)
                            .with_reason(e.to_string()),
                    );
                    self.enter(ctx, &mut state, ConnectionState::Disconnected);
                    if ctx.is_shutdown() {
                        break;
                    }
                    continue;
                }
            };

            self.enter(ctx, &mut state, ConnectionState::Monitoring);
            ctx.publish(ctx.event(EventKind::SessionStarted));
            let end = self.monitor(ctx, &group);
            self.teardown(&group);
            ctx.publish(ctx.event(EventKind::SessionEnded).with_reason(end.as_str()));

            if end == SessionEnd::Shutdown || ctx.is_shutdown() {
                break;
            }
            self.enter(ctx, &mut state, ConnectionState::Disconnected);
            if !self.sleeper.sleep(self.params.reconnect_delay, ctx.token()) {
                break;
            }
        }

        self.enter(ctx, &mut state, ConnectionState::Terminal);
    }

    fn enter(&self, ctx: &WorkerContext, state: &mut ConnectionState, next: ConnectionState) {
        if *state != next {
            *state = next;
            ctx.publish(ctx.event(EventKind::ConnectionStateChanged).with_state(next));
        }
    }

    /// Dial loop. `None` means shutdown was signaled before a socket was obtained.
    fn dial(&self, ctx: &WorkerContext) -> Option<D::Socket> {
        let target = self.dialer.target();
        let mut failures: u32 = 0;
        let mut idle = false;

        loop {
            if ctx.is_shutdown() {
                ctx.publish(ctx.event(EventKind::DialAborted));
                return None;
            }

            let attempt = failures.saturating_add(1);
            if !idle {
                ctx.publish(
                    ctx.event(EventKind::DialAttempt)
                        .with_attempt(attempt)
                        .with_reason(target.as_str()),
                );
            }

            let err = match self.attempt() {
                Ok(socket) => return Some(socket),
                Err(e) => e,
            };

            if let DialError::Connect(e) = &err {
                if self.dialer.awaits_peer(e) {
                    tracing::trace!(target = %target, "no peer yet; accepting again");
                    idle = true;
                    continue;
                }
            }
            idle = false;
            failures = attempt;
            let delay = self.params.backoff.next(failures - 1);
            ctx.publish(
                ctx.event(EventKind::DialFailed)
                    .with_attempt(attempt)
                    .with_delay(delay)
                    .with_reason(err.to_string()),
            );
            // a cancelled sleep is caught at the top of the loop
            self.sleeper.sleep(delay, ctx.token());
        }
    }

    fn attempt(&self) -> Result<D::Socket, DialError> {
        let mut socket = self.dialer.setup().map_err(DialError::Setup)?;
        if self.dialer.is_stream() {
            if let Err(e) = self.dialer.connect(&mut socket, self.params.connect_timeout) {
                self.dialer.close(socket);
                return Err(DialError::Connect(e));
            }
        }
        Ok(socket)
    }

    fn monitor(&self, ctx: &WorkerContext, group: &F::Group) -> SessionEnd {
        let mut failed: u32 = 0;

        loop {
            if ctx.is_shutdown() {
                return SessionEnd::Shutdown;
            }
            if group.is_closed() {
                return SessionEnd::Closed;
            }

            match group.wait(self.params.wait_timeout) {
                Ok(()) => {
                    return if ctx.is_shutdown() {
                        SessionEnd::Shutdown
                    } else {
                        SessionEnd::Completed
                    };
                }
                Err(e) if e.is_timeout() => {
                    if group.has_recent_activity() {
                        if failed > 0 {
                            ctx.publish(ctx.event(EventKind::HealthRecovered));
                        }
                        failed = 0;
                        continue;
                    }

                    failed = failed.saturating_add(1);
                    if failed == 1 {
                        ctx.publish(ctx.event(EventKind::HealthDegraded).with_attempt(failed));
                    }
                    if let Some(limit) = self.params.retry_limit {
                        if failed >= limit {
                            ctx.publish(
                                ctx.event(EventKind::HealthExhausted)
                                    .with_attempt(limit)
                                    .with_reason("forcing reconnection"),
                            );
                            return SessionEnd::HealthExhausted;
                        }
                    }
                }
                Err(e) => {
                    ctx.publish(
                        ctx.event(EventKind::SessionWaitFailed)
                            .with_reason(e.to_string()),
                    );
                    return SessionEnd::WaitFailed;
                }
            }
        }
    }

    fn teardown(&self, group: &F::Group) {
        if let Err(e) = group.close(self.params.wait_timeout) {
            tracing::warn!(error = %e, "comms group did not stop cleanly");
        }
        group.cleanup();
    }
}

impl<D, F, S> Worker for ConnectionSupervisor<D, F, S>
where
    D: Dialer + 'static,
    F: CommsFactory<D::Socket> + 'static,
    S: Sleeper + 'static,
{
    fn run(&self, ctx: &WorkerContext) {
        ConnectionSupervisor::run(self, ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use parking_lot::Mutex;
    use tokio::sync::broadcast;
    use tokio_util::sync::CancellationToken;
    use tracing::Level;

    use crate::core::ReadinessGate;
    use crate::error::{SessionError, WaitError};
    use crate::events::{Bus, Event};

    struct FakeDialer {
        stream: bool,
        setup_failures: u32,
        idle_accepts: u32,
        connect_failures: u32,
        setups: AtomicU32,
        connects: AtomicU32,
        closed: AtomicU32,
    }

    impl FakeDialer {
        fn new(stream: bool) -> Self {
            Self {
                stream,
                setup_failures: 0,
                idle_accepts: 0,
                connect_failures: 0,
                setups: AtomicU32::new(0),
                connects: AtomicU32::new(0),
                closed: AtomicU32::new(0),
            }
        }
    }

    impl Dialer for FakeDialer {
        type Socket = u32;

        fn target(&self) -> String {
            "tcp://peer:1".into()
        }

        fn is_stream(&self) -> bool {
            self.stream
        }

        fn setup(&self) -> io::Result<u32> {
            let n = self.setups.fetch_add(1, Ordering::SeqCst);
            if n < self.setup_failures {
                Err(io::Error::other("no sockets left"))
            } else {
                Ok(n)
            }
        }

        fn connect(&self, _socket: &mut u32, _timeout: Duration) -> io::Result<()> {
            let n = self.connects.fetch_add(1, Ordering::SeqCst);
            if n < self.idle_accepts {
                Err(io::Error::from(io::ErrorKind::TimedOut))
            } else if n < self.idle_accepts + self.connect_failures {
                Err(io::Error::from(io::ErrorKind::ConnectionRefused))
            } else {
                Ok(())
            }
        }

        fn awaits_peer(&self, err: &io::Error) -> bool {
            err.kind() == io::ErrorKind::TimedOut
        }

        fn close(&self, _socket: u32) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct Script {
        waits: VecDeque<Result<(), WaitError>>,
        activity: VecDeque<bool>,
        /// The peer hangs up after this many waits.
        hangup_after: Option<usize>,
    }

    struct FakeGroup {
        script: Mutex<Script>,
        closed: AtomicBool,
        closes: Arc<AtomicU32>,
        end_on_drain: Option<CancellationToken>,
    }

    impl CommsGroup for FakeGroup {
        fn wait(&self, _timeout: Duration) -> Result<(), WaitError> {
            let mut script = self.script.lock();
            if let Some(left) = script.hangup_after.as_mut() {
                *left = left.saturating_sub(1);
                if *left == 0 {
                    self.closed.store(true, Ordering::SeqCst);
                }
            }
            match script.waits.pop_front() {
                Some(res) => res,
                None => {
                    if let Some(token) = &self.end_on_drain {
                        token.cancel();
                    }
                    Ok(())
                }
            }
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }

        fn has_recent_activity(&self) -> bool {
            self.script.lock().activity.pop_front().unwrap_or(false)
        }

        fn close(&self, _timeout: Duration) -> Result<(), WaitError> {
            self.closed.store(true, Ordering::SeqCst);
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn cleanup(&self) {}
    }

    /// Builds one group per spawn from `scripts`; fails the first `spawn_failures` spawns.
    struct FakeComms {
        spawn_failures: u32,
        spawns: AtomicU32,
        scripts: Mutex<VecDeque<Script>>,
        closes: Arc<AtomicU32>,
        cancel_when_done: bool,
    }

    impl FakeComms {
        fn new(scripts: Vec<Script>) -> Self {
            Self {
                spawn_failures: 0,
                spawns: AtomicU32::new(0),
                scripts: Mutex::new(scripts.into()),
                closes: Arc::new(AtomicU32::new(0)),
                cancel_when_done: true,
            }
        }
    }

    impl CommsFactory<u32> for FakeComms {
        type Group = FakeGroup;

        fn spawn(&self, ctx: &WorkerContext, _socket: u32) -> Result<FakeGroup, SessionError> {
            let n = self.spawns.fetch_add(1, Ordering::SeqCst);
            if n < self.spawn_failures {
                return Err(SessionError::GroupInit {
                    reason: "no threads".into(),
                });
            }
            let script = self.scripts.lock().pop_front().unwrap_or_default();
            Ok(FakeGroup {
                script: Mutex::new(script),
                closed: AtomicBool::new(false),
                closes: Arc::clone(&self.closes),
                end_on_drain: self.cancel_when_done.then(|| ctx.token().clone()),
            })
        }
    }

    /// Records requested sleeps; cancels the token on the `cancel_on`th sleep (1-based).
    #[derive(Default)]
    struct RecordingSleeper {
        slept: Mutex<Vec<Duration>>,
        cancel_on: Option<usize>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration, token: &CancellationToken) -> bool {
            let mut slept = self.slept.lock();
            slept.push(duration);
            if self.cancel_on == Some(slept.len()) {
                token.cancel();
            }
            !token.is_cancelled()
        }
    }

    fn params(retry_limit: Option<u32>) -> SupervisorParams {
        SupervisorParams {
            backoff: BackoffPolicy::doubling(Duration::from_secs(32)),
            connect_timeout: Duration::from_secs(5),
            wait_timeout: Duration::from_millis(5000),
            retry_limit,
            reconnect_delay: Duration::from_millis(1000),
        }
    }

    fn context() -> (WorkerContext, broadcast::Receiver<Event>) {
        let bus = Bus::new(1024);
        let rx = bus.subscribe();
        let gate = ReadinessGate::new(Duration::from_secs(1));
        (
            WorkerContext::new("CLIENT", CancellationToken::new(), gate, bus),
            rx,
        )
    }

    fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    fn states(events: &[Event]) -> Vec<ConnectionState> {
        events.iter().filter_map(|e| e.state).collect()
    }

    fn count(events: &[Event], kind: EventKind) -> usize {
        events.iter().filter(|e| e.kind == kind).count()
    }

    fn timeout() -> Result<(), WaitError> {
        Err(WaitError::Timeout {
            timeout: Duration::from_millis(5000),
            pending: vec!["CLIENT.RECEIVE".into()],
        })
    }

    #[test]
    fn test_datagram_setup_connects_without_sleeping() {
        let (ctx, mut rx) = context();
        let dialer = FakeDialer::new(false);
        let sup = ConnectionSupervisor::new(
            dialer,
            FakeComms::new(vec![Script::default()]),
            RecordingSleeper::default(),
            params(Some(10)),
        );

        sup.run(&ctx);

        assert!(sup.sleeper.slept.lock().is_empty());
        assert_eq!(sup.dialer.connects.load(Ordering::SeqCst), 0);
        let events = drain(&mut rx);
        assert_eq!(
            states(&events),
            vec![
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Monitoring,
                ConnectionState::Terminal,
            ]
        );
        assert_eq!(count(&events, EventKind::DialFailed), 0);
    }

    #[test]
    fn test_stream_failures_back_off_exponentially() {
        let (ctx, mut rx) = context();
        let dialer = FakeDialer {
            connect_failures: 3,
            ..FakeDialer::new(true)
        };
        let sup = ConnectionSupervisor::new(
            dialer,
            FakeComms::new(vec![Script::default()]),
            RecordingSleeper::default(),
            params(Some(10)),
        );

        sup.run(&ctx);

        assert_eq!(
            *sup.sleeper.slept.lock(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
        assert_eq!(sup.dialer.closed.load(Ordering::SeqCst), 3);
        let events = drain(&mut rx);
        assert_eq!(count(&events, EventKind::Connected), 1);
        assert!(
            events
                .iter()
                .filter(|e| e.kind == EventKind::DialFailed)
                .all(|e| e.level() == Level::WARN)
        );
    }

    #[test]
    fn test_backoff_is_capped() {
        let (ctx, _rx) = context();
        let dialer = FakeDialer {
            setup_failures: 8,
            ..FakeDialer::new(true)
        };
        let mut p = params(Some(10));
        p.backoff = BackoffPolicy::doubling(Duration::from_secs(8));
        let sup = ConnectionSupervisor::new(
            dialer,
            FakeComms::new(vec![Script::default()]),
            RecordingSleeper::default(),
            p,
        );

        sup.run(&ctx);

        let slept = sup.sleeper.slept.lock();
        assert_eq!(slept.len(), 8);
        assert!(slept.iter().all(|d| *d <= Duration::from_secs(8)));
        assert_eq!(slept[7], Duration::from_secs(8));
    }

    #[test]
    fn test_shutdown_while_connecting_aborts_without_session() {
        let (ctx, mut rx) = context();
        let dialer = FakeDialer {
            setup_failures: u32::MAX,
            ..FakeDialer::new(true)
        };
        let comms = FakeComms::new(vec![]);
        let sleeper = RecordingSleeper {
            cancel_on: Some(2),
            ..RecordingSleeper::default()
        };
        let sup = ConnectionSupervisor::new(dialer, comms, sleeper, params(Some(10)));

        sup.run(&ctx);

        assert_eq!(sup.comms.spawns.load(Ordering::SeqCst), 0);
        let events = drain(&mut rx);
        assert_eq!(count(&events, EventKind::DialAborted), 1);
        assert_eq!(
            states(&events),
            vec![ConnectionState::Connecting, ConnectionState::Terminal]
        );
    }

    #[test]
    fn test_health_exhaustion_forces_one_reconnect() {
        let (ctx, mut rx) = context();
        let silent = Script {
            waits: vec![timeout(), timeout(), timeout(), timeout()].into(),
            ..Script::default()
        };
        let mut comms = FakeComms::new(vec![silent]);
        comms.cancel_when_done = false;
        // the reconnect delay after the forced teardown ends the run
        let sleeper = RecordingSleeper {
            cancel_on: Some(1),
            ..RecordingSleeper::default()
        };
        let sup = ConnectionSupervisor::new(FakeDialer::new(true), comms, sleeper, params(Some(3)));

        sup.run(&ctx);

        let events = drain(&mut rx);
        let errors: Vec<_> = events.iter().filter(|e| e.level() == Level::ERROR).collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, EventKind::HealthExhausted);
        assert_eq!(errors[0].attempt, Some(3));
        assert_eq!(count(&events, EventKind::HealthDegraded), 1);
        assert_eq!(sup.comms.closes.load(Ordering::SeqCst), 1);
        assert_eq!(
            states(&events),
            vec![
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Monitoring,
                ConnectionState::Disconnected,
                ConnectionState::Terminal,
            ]
        );
        assert_eq!(*sup.sleeper.slept.lock(), vec![Duration::from_millis(1000)]);
    }

    #[test]
    fn test_closed_connection_reconnects_after_delay() {
        let (ctx, mut rx) = context();
        let hangup = Script {
            waits: vec![timeout()].into(),
            activity: vec![true].into(),
            hangup_after: Some(1),
        };
        let mut comms = FakeComms::new(vec![hangup, Script::default()]);
        comms.cancel_when_done = false;
        // the reconnect delay after the second session ends the run
        let sleeper = RecordingSleeper {
            cancel_on: Some(2),
            ..RecordingSleeper::default()
        };
        let sup = ConnectionSupervisor::new(FakeDialer::new(true), comms, sleeper, params(Some(3)));

        sup.run(&ctx);

        let events = drain(&mut rx);
        let ended = events
            .iter()
            .position(|e| e.kind == EventKind::SessionEnded)
            .expect("first session ended");
        assert_eq!(events[ended].reason.as_deref(), Some("connection closed"));
        assert_eq!(
            events[ended + 1].state,
            Some(ConnectionState::Disconnected),
            "DISCONNECTED follows the session end"
        );
        assert_eq!(
            states(&events),
            vec![
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Monitoring,
                ConnectionState::Disconnected,
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Monitoring,
                ConnectionState::Disconnected,
                ConnectionState::Terminal,
            ]
        );
        assert_eq!(
            *sup.sleeper.slept.lock(),
            vec![Duration::from_millis(1000), Duration::from_millis(1000)]
        );
        assert_eq!(count(&events, EventKind::HealthDegraded), 0);
        assert_eq!(sup.comms.closes.load(Ordering::SeqCst), 2);
        assert_eq!(sup.dialer.setups.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_idle_accept_retries_without_backoff() {
        let (ctx, mut rx) = context();
        let dialer = FakeDialer {
            idle_accepts: 4,
            connect_failures: 1,
            ..FakeDialer::new(true)
        };
        let sup = ConnectionSupervisor::new(
            dialer,
            FakeComms::new(vec![Script::default()]),
            RecordingSleeper::default(),
            params(Some(10)),
        );

        sup.run(&ctx);

        // only the refused connect backs off
        assert_eq!(*sup.sleeper.slept.lock(), vec![Duration::from_secs(1)]);
        assert_eq!(sup.dialer.connects.load(Ordering::SeqCst), 6);
        assert_eq!(sup.dialer.closed.load(Ordering::SeqCst), 5);
        let events = drain(&mut rx);
        assert_eq!(count(&events, EventKind::DialFailed), 1);
        let attempts: Vec<_> = events
            .iter()
            .filter(|e| e.kind == EventKind::DialAttempt)
            .map(|e| e.attempt)
            .collect();
        assert_eq!(attempts, vec![Some(1), Some(2)]);
        assert_eq!(count(&events, EventKind::SessionStarted), 1);
    }

    #[test]
    fn test_activity_resets_health_counter() {
        let (ctx, mut rx) = context();
        let flaky = Script {
            waits: vec![timeout(), timeout(), timeout(), timeout(), timeout()].into(),
            activity: vec![false, false, true, false, false].into(),
            ..Script::default()
        };
        let sup = ConnectionSupervisor::new(
            FakeDialer::new(true),
            FakeComms::new(vec![flaky]),
            RecordingSleeper::default(),
            params(Some(3)),
        );

        sup.run(&ctx);

        let events = drain(&mut rx);
        assert_eq!(count(&events, EventKind::HealthExhausted), 0);
        assert_eq!(count(&events, EventKind::HealthDegraded), 2);
        assert_eq!(count(&events, EventKind::HealthRecovered), 1);
    }

    #[test]
    fn test_unlimited_retries_never_exhaust() {
        let (ctx, mut rx) = context();
        let silent = Script {
            waits: std::iter::repeat_with(timeout).take(50).collect(),
            ..Script::default()
        };
        let sup = ConnectionSupervisor::new(
            FakeDialer::new(true),
            FakeComms::new(vec![silent]),
            RecordingSleeper::default(),
            params(None),
        );

        sup.run(&ctx);

        assert_eq!(count(&drain(&mut rx), EventKind::HealthExhausted), 0);
    }

    #[test]
    fn test_spawn_failure_redials_without_delay() {
        let (ctx, mut rx) = context();
        let mut comms = FakeComms::new(vec![Script::default()]);
        comms.spawn_failures = 1;
        let sup = ConnectionSupervisor::new(
            FakeDialer::new(true),
            comms,
            RecordingSleeper::default(),
            params(Some(10)),
        );

        sup.run(&ctx);

        assert!(sup.sleeper.slept.lock().is_empty());
        assert_eq!(sup.dialer.setups.load(Ordering::SeqCst), 2);
        let events = drain(&mut rx);
        assert_eq!(count(&events, EventKind::SessionSpawnFailed), 1);
        assert_eq!(count(&events, EventKind::SessionStarted), 1);
    }

    #[test]
    fn test_wait_failure_ends_session() {
        let (ctx, mut rx) = context();
        let broken = Script {
            waits: vec![Err(WaitError::Panicked {
                labels: vec!["CLIENT.SEND".into()],
            })]
            .into(),
            ..Script::default()
        };
        let mut comms = FakeComms::new(vec![broken]);
        comms.cancel_when_done = false;
        let sleeper = RecordingSleeper {
            cancel_on: Some(1),
            ..RecordingSleeper::default()
        };
        let sup = ConnectionSupervisor::new(FakeDialer::new(true), comms, sleeper, params(Some(10)));

        sup.run(&ctx);

        let events = drain(&mut rx);
        assert_eq!(count(&events, EventKind::SessionWaitFailed), 1);
        assert_eq!(sup.comms.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_params_follow_settings() {
        let link = LinkSettings {
            backoff_max_seconds: 16,
            retry_limit: 0,
            ..LinkSettings::default()
        };
        let p = SupervisorParams::from_settings(&link, &RuntimeSettings::default());
        assert_eq!(p.backoff.max, Duration::from_secs(16));
        assert_eq!(p.retry_limit, None);
        assert_eq!(p.reconnect_delay, Duration::from_millis(1000));
        assert_eq!(p.wait_timeout, Duration::from_millis(5000));
    }
}
