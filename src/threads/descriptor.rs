//! # Thread descriptors, workers and lifecycle hooks.
//!
//! A [`ThreadDescriptor`] identifies one logical worker:
//! - a label, unique among live threads of a registry;
//! - the [`Worker`] to run (its data is whatever the worker captures);
//! - the [`Lifecycle`] hooks wrapped around it;
//! - a suppressed flag and, once created, the OS [`ThreadHandle`].
//!
//! ## Hooks
//! ```text
//! pre_create ──► [OS thread created] ──► post_create         (creating thread)
//!                        │
//!                        ▼
//!                init ──Ok──► Worker::run ──► exit            (new thread)
//!                  │
//!                  └─Err──► return (no run, no exit)
//! ```
//! Every hook has a default: `pre_create`, `post_create` and `exit` do nothing,
//! `init` is the logger readiness barrier.

use std::borrow::Cow;
use std::sync::Arc;

use crate::core::WorkerContext;
use crate::error::InitError;
use crate::threads::handle::ThreadHandle;

/// The main function of a worker thread.
///
/// Implementations should poll [`WorkerContext::is_shutdown`] and return
/// promptly once it is set.
pub trait Worker: Send + Sync + 'static {
    /// Runs the worker until completion or shutdown.
    fn run(&self, ctx: &WorkerContext);
}

/// Shared handle to a worker.
pub type WorkerRef = Arc<dyn Worker>;

/// Closure-backed worker.
///
/// ## Example
/// ```rust
/// use threadvisor::{WorkerContext, WorkerFn, WorkerRef};
///
/// let w: WorkerRef = WorkerFn::arc(|ctx: &WorkerContext| {
///     while !ctx.is_shutdown() {
///         std::thread::sleep(std::time::Duration::from_millis(10));
///     }
/// });
/// # let _ = w;
/// ```
pub struct WorkerFn<F> {
    f: F,
}

impl<F> WorkerFn<F>
where
    F: Fn(&WorkerContext) + Send + Sync + 'static,
{
    /// Wraps a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Wraps a closure and returns it as a [`WorkerRef`].
    pub fn arc(f: F) -> WorkerRef {
        Arc::new(Self::new(f))
    }
}

impl<F> Worker for WorkerFn<F>
where
    F: Fn(&WorkerContext) + Send + Sync + 'static,
{
    fn run(&self, ctx: &WorkerContext) {
        (self.f)(ctx)
    }
}

/// Lifecycle hooks around a worker.
pub trait Lifecycle: Send + Sync + 'static {
    /// Runs on the creating thread before the OS thread exists.
    fn pre_create(&self, _label: &str) {}

    /// Runs on the creating thread after the OS thread exists.
    fn post_create(&self, _label: &str) {}

    /// Runs first on the new thread. An error ends the thread without running
    /// the worker or the `exit` hook.
    ///
    /// Default: wait for the logger readiness gate.
    fn init(&self, ctx: &WorkerContext) -> Result<(), InitError> {
        ctx.ready().wait()
    }

    /// Runs on the new thread after the worker returns.
    fn exit(&self, _ctx: &WorkerContext) {}
}

/// All-default hooks: readiness barrier on init, no-ops elsewhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultHooks;

impl Lifecycle for DefaultHooks {}

/// Descriptor of one logical worker thread.
pub struct ThreadDescriptor {
    label: Cow<'static, str>,
    worker: WorkerRef,
    hooks: Option<Arc<dyn Lifecycle>>,
    suppressed: bool,
    handle: Option<Arc<ThreadHandle>>,
}

impl ThreadDescriptor {
    /// Creates a descriptor with unset hooks.
    pub fn new(label: impl Into<Cow<'static, str>>, worker: WorkerRef) -> Self {
        Self {
            label: label.into(),
            worker,
            hooks: None,
            suppressed: false,
            handle: None,
        }
    }

    /// Sets the lifecycle hooks.
    pub fn with_hooks(mut self, hooks: Arc<dyn Lifecycle>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// The label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The worker.
    pub fn worker(&self) -> &WorkerRef {
        &self.worker
    }

    /// `true` if hooks were set explicitly or filled with defaults.
    pub fn has_hooks(&self) -> bool {
        self.hooks.is_some()
    }

    /// The hooks, [`DefaultHooks`] when unset.
    pub fn hooks(&self) -> Arc<dyn Lifecycle> {
        match &self.hooks {
            Some(h) => Arc::clone(h),
            None => Arc::new(DefaultHooks),
        }
    }

    /// Fills unset hooks with [`DefaultHooks`].
    pub fn fill_default_hooks(&mut self) {
        if self.hooks.is_none() {
            self.hooks = Some(Arc::new(DefaultHooks));
        }
    }

    /// Whether the orchestrator skipped this thread.
    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    pub(crate) fn set_suppressed(&mut self, suppressed: bool) {
        self.suppressed = suppressed;
    }

    /// OS handle, once created.
    pub fn handle(&self) -> Option<&Arc<ThreadHandle>> {
        self.handle.as_ref()
    }

    pub(crate) fn set_handle(&mut self, handle: Arc<ThreadHandle>) {
        self.handle = Some(handle);
    }
}

impl std::fmt::Debug for ThreadDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadDescriptor")
            .field("label", &self.label)
            .field("suppressed", &self.suppressed)
            .field("handle", &self.handle)
            .finish()
    }
}
