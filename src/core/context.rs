//! # Worker context.
//!
//! Every worker receives a [`WorkerContext`] at its entry point instead of
//! reading thread-local or global state. It carries:
//! - the worker's label (also used as the OS thread name);
//! - the cancellation token it must poll (process shutdown, or its group's token);
//! - the logger readiness gate;
//! - the event bus.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::readiness::ReadinessGate;
use crate::events::{Bus, Event, EventKind};

/// Explicit per-worker context.
#[derive(Clone, Debug)]
pub struct WorkerContext {
    label: Arc<str>,
    token: CancellationToken,
    ready: ReadinessGate,
    bus: Bus,
}

impl WorkerContext {
    /// Creates a context.
    pub fn new(
        label: impl Into<Arc<str>>,
        token: CancellationToken,
        ready: ReadinessGate,
        bus: Bus,
    ) -> Self {
        Self {
            label: label.into(),
            token,
            ready,
            bus,
        }
    }

    /// Derives the context of another worker sharing gate and bus.
    pub fn for_worker(&self, label: impl Into<Arc<str>>, token: CancellationToken) -> Self {
        Self {
            label: label.into(),
            token,
            ready: self.ready.clone(),
            bus: self.bus.clone(),
        }
    }

    /// The worker's label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Cancellation token polled by this worker.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// `true` once shutdown (or group termination) has been requested.
    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Logger readiness gate.
    pub fn ready(&self) -> &ReadinessGate {
        &self.ready
    }

    /// Event bus.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// New event of `kind` tagged with this worker's label.
    #[inline]
    pub fn event(&self, kind: EventKind) -> Event {
        Event::new(kind).with_thread(Arc::clone(&self.label))
    }

    /// Publishes an event.
    #[inline]
    pub fn publish(&self, ev: Event) {
        self.bus.publish(ev);
    }
}
