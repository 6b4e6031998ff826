//! # LOGGER: the single consumer of the event bus.
//!
//! Drains the [`Bus`](crate::Bus) receiver that the runtime subscribed before
//! any thread started and renders each [`Event`] through `tracing` at
//! [`Event::level`].
//!
//! ```text
//! LoggerHooks::init   → record the uptime epoch (no readiness barrier)
//! run:
//!   drain backlog ─► gate.open() ─► LoggerReady
//!   while !shutdown   { drain; sleep(poll) }
//!   until close && every other thread stopped { drain; sleep(poll) }
//!   final drain ─► "logger stopped"
//! ```
//!
//! ## Rules
//! - The LOGGER is the thread that opens the readiness gate, so its own `init`
//!   must not wait on it.
//! - After shutdown it keeps draining until the runtime closes it and every
//!   other registered thread has stopped, so their last events are rendered.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio_util::sync::CancellationToken;
use tracing::Level;

use crate::core::WorkerContext;
use crate::error::InitError;
use crate::events::{Event, EventKind};
use crate::threads::{Lifecycle, ThreadRegistry, Worker};

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Time since the LOGGER initialised (zero before).
pub fn uptime() -> Duration {
    EPOCH.get().map(Instant::elapsed).unwrap_or_default()
}

/// Hooks of the LOGGER: skip the readiness barrier, record the epoch once.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggerHooks;

impl Lifecycle for LoggerHooks {
    fn init(&self, _ctx: &WorkerContext) -> Result<(), InitError> {
        EPOCH.get_or_init(Instant::now);
        Ok(())
    }
}

/// Bus-draining logger worker.
pub struct LoggerWorker {
    rx: Mutex<Option<broadcast::Receiver<Event>>>,
    registry: Arc<ThreadRegistry>,
    close: CancellationToken,
    poll: Duration,
}

impl LoggerWorker {
    /// Creates a logger draining `rx`.
    ///
    /// `close` is cancelled by the runtime once it no longer publishes.
    pub fn new(
        rx: broadcast::Receiver<Event>,
        registry: Arc<ThreadRegistry>,
        close: CancellationToken,
        poll: Duration,
    ) -> Self {
        Self {
            rx: Mutex::new(Some(rx)),
            registry,
            close,
            poll: poll.max(Duration::from_millis(1)),
        }
    }

    fn others_stopped(&self, own: &str) -> bool {
        self.registry
            .snapshot_active_except(own)
            .map(|live| live.is_empty())
            .unwrap_or(true)
    }
}

impl Worker for LoggerWorker {
    fn run(&self, ctx: &WorkerContext) {
        let Some(mut rx) = self.rx.lock().take() else {
            tracing::error!("logger started twice; receiver already consumed");
            ctx.ready().fail();
            return;
        };

        drain(&mut rx);
        ctx.ready().open();
        ctx.publish(ctx.event(EventKind::LoggerReady));

        while !ctx.is_shutdown() {
            drain(&mut rx);
            std::thread::sleep(self.poll);
        }

        loop {
            drain(&mut rx);
            if self.close.is_cancelled() && self.others_stopped(ctx.label()) {
                break;
            }
            std::thread::sleep(self.poll);
        }
        drain(&mut rx);
        tracing::info!(uptime = ?uptime(), "logger stopped");
    }
}

/// Renders every queued event. Returns how many were rendered.
pub fn drain(rx: &mut broadcast::Receiver<Event>) -> usize {
    let mut n = 0;
    loop {
        match rx.try_recv() {
            Ok(ev) => {
                render(&ev);
                n += 1;
            }
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "logger lagged; events dropped");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => return n,
        }
    }
}

macro_rules! emit {
    ($lvl:expr, $ev:ident) => {
        tracing::event!(
            $lvl,
            seq = $ev.seq,
            thread = $ev.thread.as_deref().unwrap_or("-"),
            attempt = ?$ev.attempt,
            delay_ms = ?$ev.delay_ms,
            state = $ev.state.map(|s| s.as_str()).unwrap_or("-"),
            reason = $ev.reason.as_deref().unwrap_or(""),
            "[{}]",
            $ev.kind.as_label()
        )
    };
}

/// Renders one event at its level.
pub fn render(ev: &Event) {
    let level = ev.level();
    if level == Level::ERROR {
        emit!(Level::ERROR, ev);
    } else if level == Level::WARN {
        emit!(Level::WARN, ev);
    } else if level == Level::INFO {
        emit!(Level::INFO, ev);
    } else if level == Level::DEBUG {
        emit!(Level::DEBUG, ev);
    } else {
        emit!(Level::TRACE, ev);
    }
}
