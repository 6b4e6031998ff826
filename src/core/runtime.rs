//! # Runtime: materializes the well-known threads and drives graceful shutdown.
//!
//! The [`Runtime`] owns the global [`ThreadRegistry`], the process shutdown
//! token, the logger readiness gate and the event [`Bus`]. It creates worker
//! threads from [`ThreadDescriptor`]s, honoring the suppression list, and later
//! stops them within a grace period.
//!
//! ## Startup
//! ```text
//! Runtime::new(settings)
//!   └─ bus.subscribe() → logger receiver (held until the LOGGER is built)
//!
//! start([LOGGER, CLIENT, SERVER, COMMAND_INTERFACE])
//!   for each descriptor, in order:
//!     suppressed?           ─► ThreadSuppressed, skip
//!     live duplicate?       ─► ThreadCreateFailed, continue
//!     fill_default_hooks()
//!     spawn_worker()        ─► Err → ThreadCreateFailed, continue
//!     registry.register()   ─► Err → cancel the thread, ThreadCreateFailed, continue
//!     update_state(RUNNING) ─► ThreadCreated
//! ```
//!
//! ## Shutdown
//! ```text
//! shutdown_with_grace()
//!   request_shutdown()                     → ShutdownRequested, token.cancel()
//!   registry.wait_all_except(LOGGER, grace)
//!     ├─ Ok            → AllStoppedWithin
//!     └─ Timeout       → GraceExceeded{stuck}  → Err(RuntimeError::GraceExceeded)
//!   logger_close.cancel() → LOGGER drains the tail and exits
//! ```
//!
//! ## Rules
//! - Creation failures never abort sibling creations.
//! - An uninitialized registry is the only fatal startup error.
//! - Descriptors are processed in the given order; the LOGGER comes first so the
//!   readiness gate opens as early as possible. Suppressing the LOGGER is allowed:
//!   every worker using the default `init` hook then times out and never runs.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::core::context::WorkerContext;
use crate::core::envelope::spawn_worker;
use crate::core::readiness::ReadinessGate;
use crate::core::shutdown::ShutdownHandle;
use crate::error::{RegistryError, RuntimeError, SpawnError, WaitError};
use crate::events::{Bus, Event, EventKind};
use crate::threads::{ThreadDescriptor, ThreadRegistry, ThreadState};
use crate::workers::{self, ClientWorker, CommandInterface, LoggerHooks, LoggerWorker, ServerWorker};

/// How long the runtime waits for the LOGGER to drain after the other threads stopped.
const LOGGER_DRAIN_WAIT: Duration = Duration::from_secs(1);

/// Outcome of [`Runtime::start`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StartReport {
    /// Labels of threads created and marked running.
    pub started: Vec<String>,
    /// Labels skipped because of the suppression list.
    pub suppressed: Vec<String>,
    /// Labels that failed to start, with the reason.
    pub failed: Vec<(String, String)>,
}

/// Process-level orchestrator.
pub struct Runtime {
    settings: Settings,
    registry: Arc<ThreadRegistry>,
    token: CancellationToken,
    shutdown: ShutdownHandle,
    logger_close: CancellationToken,
    ready: ReadinessGate,
    bus: Bus,
    logger_rx: Mutex<Option<broadcast::Receiver<Event>>>,
}

impl Runtime {
    /// Creates a runtime with a fresh global registry.
    pub fn new(settings: Settings) -> Self {
        Self::with_registry(settings, Arc::new(ThreadRegistry::new()))
    }

    /// Creates a runtime around an existing registry.
    pub fn with_registry(settings: Settings, registry: Arc<ThreadRegistry>) -> Self {
        let bus = Bus::new(settings.runtime.bus_capacity_clamped());
        let logger_rx = bus.subscribe();
        let ready = ReadinessGate::new(settings.runtime.ready_timeout());
        let token = CancellationToken::new();
        let shutdown = ShutdownHandle::new(token.clone(), bus.clone());
        Self {
            settings,
            registry,
            token,
            shutdown,
            logger_close: CancellationToken::new(),
            ready,
            bus,
            logger_rx: Mutex::new(Some(logger_rx)),
        }
    }

    /// Effective settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Global thread registry.
    pub fn registry(&self) -> &Arc<ThreadRegistry> {
        &self.registry
    }

    /// Process shutdown token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Shutdown switch shared with the command interface.
    pub fn shutdown_handle(&self) -> &ShutdownHandle {
        &self.shutdown
    }

    /// Logger readiness gate.
    pub fn ready(&self) -> &ReadinessGate {
        &self.ready
    }

    /// Event bus.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Takes the bus receiver subscribed at construction.
    ///
    /// Only the first call returns it; it holds every event published since
    /// the runtime was created.
    pub fn take_logger_receiver(&self) -> Option<broadcast::Receiver<Event>> {
        self.logger_rx.lock().take()
    }

    /// Context for a top-level worker: its own child of the shutdown token.
    pub fn context(&self, label: &str) -> WorkerContext {
        WorkerContext::new(
            label,
            self.token.child_token(),
            self.ready.clone(),
            self.bus.clone(),
        )
    }

    /// Descriptors of LOGGER, CLIENT, SERVER and COMMAND_INTERFACE, in that order.
    pub fn well_known_threads(&self) -> Vec<ThreadDescriptor> {
        let rx = self
            .take_logger_receiver()
            .unwrap_or_else(|| self.bus.subscribe());
        let logger = LoggerWorker::new(
            rx,
            Arc::clone(&self.registry),
            self.logger_close.clone(),
            self.settings.runtime.logger_poll(),
        );

        vec![
            ThreadDescriptor::new(workers::LOGGER, Arc::new(logger))
                .with_hooks(Arc::new(LoggerHooks)),
            ThreadDescriptor::new(workers::CLIENT, Arc::new(ClientWorker::new(&self.settings))),
            ThreadDescriptor::new(workers::SERVER, Arc::new(ServerWorker::new(&self.settings))),
            ThreadDescriptor::new(
                workers::COMMAND_INTERFACE,
                Arc::new(CommandInterface::stdin(
                    Arc::clone(&self.registry),
                    self.shutdown.clone(),
                )),
            ),
        ]
    }

    /// Creates every non-suppressed descriptor.
    ///
    /// Fails only when the registry is not initialized; individual creation
    /// failures are reported in the [`StartReport`].
    pub fn start(&self, descriptors: Vec<ThreadDescriptor>) -> Result<StartReport, RuntimeError> {
        if !self.registry.is_initialized() {
            return Err(RegistryError::NotInitialized.into());
        }

        let suppression = self.settings.debug.suppression();
        let mut report = StartReport::default();

        for mut desc in descriptors {
            let label = desc.label().to_string();
            if suppression.contains(&label) {
                desc.set_suppressed(true);
                self.bus
                    .publish(Event::new(EventKind::ThreadSuppressed).with_thread(label.as_str()));
                report.suppressed.push(label);
                continue;
            }

            match self.create(&mut desc) {
                Ok(()) => {
                    self.bus
                        .publish(Event::new(EventKind::ThreadCreated).with_thread(label.as_str()));
                    report.started.push(label);
                }
                Err(e) => {
                    self.bus.publish(
                        Event::new(EventKind::ThreadCreateFailed)
                            .with_thread(label.as_str())
                            .with_reason(e.to_string()),
                    );
                    report.failed.push((label, e.to_string()));
                }
            }
        }
        Ok(report)
    }

    fn create(&self, desc: &mut ThreadDescriptor) -> Result<(), SpawnError> {
        if self.registry.is_registered(desc.label()) {
            return Err(RegistryError::AlreadyRegistered {
                label: desc.label().to_string(),
            }
            .into());
        }

        desc.fill_default_hooks();
        let ctx = self.context(desc.label());
        let thread_token = ctx.token().clone();
        let handle = spawn_worker(desc, ctx)?;

        if let Err(e) = self.registry.register(desc, handle) {
            // lost a registration race: the thread must not run unsupervised
            thread_token.cancel();
            return Err(e.into());
        }
        self.registry.update_state(desc.label(), ThreadState::Running)?;
        Ok(())
    }

    /// Cancels the shutdown token, publishing `ShutdownRequested` once
    /// across every holder of the [`ShutdownHandle`].
    pub fn request_shutdown(&self, reason: &str) {
        self.shutdown.request(reason);
    }

    /// Requests shutdown and waits up to `runtime.shutdown_grace_ms` for every
    /// thread except the LOGGER, then lets the LOGGER drain and exit.
    pub fn shutdown_with_grace(&self) -> Result<(), RuntimeError> {
        self.request_shutdown("shutdown");
        let Some(grace) = self.settings.runtime.shutdown_grace() else {
            self.logger_close.cancel();
            return Ok(());
        };

        let res = match self.registry.wait_all_except(workers::LOGGER, Some(grace)) {
            Ok(()) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(WaitError::Timeout { pending, .. }) => {
                self.bus.publish(
                    Event::new(EventKind::GraceExceeded).with_reason(pending.join(", ")),
                );
                Err(RuntimeError::GraceExceeded {
                    grace,
                    stuck: pending,
                })
            }
            Err(WaitError::Panicked { labels }) => Err(RuntimeError::Panicked { labels }),
            Err(WaitError::Registry(e)) => Err(RuntimeError::Registry(e)),
        };

        self.logger_close.cancel();
        if res.is_ok() {
            if let Err(e) = self.registry.wait_all(Some(LOGGER_DRAIN_WAIT.min(grace))) {
                tracing::warn!(error = %e, "logger did not finish draining");
            }
        }
        res
    }

    /// Waits for every registered thread (`None` = unbounded).
    pub fn wait_all(&self, timeout: Option<Duration>) -> Result<(), WaitError> {
        self.registry.wait_all(timeout)
    }

    /// Releases the global registry. Threads must have been waited for first.
    pub fn cleanup(&self) {
        self.logger_close.cancel();
        self.registry.cleanup();
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("registry", &self.registry)
            .field("shutdown", &self.token.is_cancelled())
            .field("ready", &self.ready)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::threads::WorkerFn;

    fn settings(suppress: &str, grace_ms: u64) -> Settings {
        let mut s = Settings::default();
        s.debug.suppress_threads = suppress.to_string();
        s.runtime.shutdown_grace_ms = grace_ms;
        s
    }

    fn polite(label: &'static str) -> ThreadDescriptor {
        ThreadDescriptor::new(
            label,
            WorkerFn::arc(|ctx| {
                while !ctx.is_shutdown() {
                    std::thread::sleep(Duration::from_millis(1));
                }
            }),
        )
    }

    fn kinds(rt: &Runtime) -> Vec<EventKind> {
        let mut rx = rt.take_logger_receiver().expect("receiver");
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev.kind);
        }
        out
    }

    #[test]
    fn test_suppressed_label_is_not_created() {
        let rt = Runtime::new(settings(" client ", 5000));
        rt.ready().open();

        let report = rt
            .start(vec![polite("LOGGER"), polite("CLIENT"), polite("SERVER")])
            .expect("start");

        assert_eq!(report.started, vec!["LOGGER", "SERVER"]);
        assert_eq!(report.suppressed, vec!["CLIENT"]);
        assert!(!rt.registry().is_registered("CLIENT"));
        assert_eq!(rt.registry().state_of("SERVER"), ThreadState::Running);

        rt.shutdown_with_grace().expect("stopped");
        assert!(kinds(&rt).contains(&EventKind::ThreadSuppressed));
    }

    #[test]
    fn test_duplicate_does_not_abort_siblings() {
        let rt = Runtime::new(settings("", 5000));
        rt.ready().open();

        let report = rt
            .start(vec![polite("A"), polite("A"), polite("B")])
            .expect("start");

        assert_eq!(report.started, vec!["A", "B"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "A");
        assert_eq!(rt.registry().active_count(), Ok(2));

        rt.shutdown_with_grace().expect("stopped");
        let kinds = kinds(&rt);
        assert!(kinds.contains(&EventKind::ThreadCreateFailed));
        assert!(kinds.contains(&EventKind::AllStoppedWithin));
    }

    #[test]
    fn test_uninitialized_registry_is_fatal() {
        let rt = Runtime::with_registry(
            settings("", 5000),
            Arc::new(ThreadRegistry::uninitialized()),
        );
        let err = rt.start(vec![polite("A")]).expect_err("fatal");
        assert!(matches!(
            err,
            RuntimeError::Registry(RegistryError::NotInitialized)
        ));
    }

    #[test]
    fn test_grace_exceeded_lists_stuck_threads() {
        let rt = Runtime::new(settings("", 50));
        rt.ready().open();
        let release = Arc::new(AtomicBool::new(false));
        let r = Arc::clone(&release);
        let stubborn = ThreadDescriptor::new(
            "STUCK",
            WorkerFn::arc(move |_| {
                while !r.load(Ordering::Acquire) {
                    std::thread::sleep(Duration::from_millis(1));
                }
            }),
        );

        rt.start(vec![polite("OK"), stubborn]).expect("start");
        let err = rt.shutdown_with_grace().expect_err("grace exceeded");
        match err {
            RuntimeError::GraceExceeded { stuck, .. } => assert_eq!(stuck, vec!["STUCK"]),
            other => panic!("unexpected {other:?}"),
        }
        assert!(kinds(&rt).contains(&EventKind::GraceExceeded));

        release.store(true, Ordering::Release);
        rt.wait_all(Some(Duration::from_secs(5))).expect("released");
        rt.cleanup();
        assert!(!rt.registry().is_initialized());
    }

    #[test]
    fn test_request_shutdown_is_idempotent() {
        let rt = Runtime::new(settings("", 5000));
        rt.request_shutdown("first");
        rt.request_shutdown("second");
        let requested = kinds(&rt)
            .into_iter()
            .filter(|k| *k == EventKind::ShutdownRequested)
            .count();
        assert_eq!(requested, 1);
    }

    #[test]
    fn test_racing_shutdown_requests_publish_once() {
        let rt = Arc::new(Runtime::new(settings("", 5000)));
        let callers: Vec<_> = (0..8)
            .map(|i| {
                let rt = Arc::clone(&rt);
                std::thread::spawn(move || rt.request_shutdown(if i % 2 == 0 { "signal" } else { "quit" }))
            })
            .collect();
        let quit = rt.shutdown_handle().clone();
        quit.request("quit");
        for c in callers {
            c.join().expect("caller");
        }

        assert!(rt.token().is_cancelled());
        let requested = kinds(&rt)
            .into_iter()
            .filter(|k| *k == EventKind::ShutdownRequested)
            .count();
        assert_eq!(requested, 1);
    }

    #[test]
    fn test_well_known_threads_order() {
        let rt = Runtime::new(settings("", 5000));
        let labels: Vec<_> = rt
            .well_known_threads()
            .iter()
            .map(|d| d.label().to_string())
            .collect();
        assert_eq!(
            labels,
            vec!["LOGGER", "CLIENT", "SERVER", "COMMAND_INTERFACE"]
        );
    }
}
