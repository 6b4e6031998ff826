//! # Worker envelope: the identical entry point of every worker thread.
//!
//! Spawns the OS thread for a [`ThreadDescriptor`] and wraps its worker in the
//! lifecycle hooks, publishing lifecycle events to the [`Bus`](crate::Bus).
//!
//! ## Flow
//! ```text
//! spawn_worker(desc, ctx)                       (creating thread)
//!   hooks.pre_create(label)
//!   ThreadHandle::spawn(label, run_envelope) ──► Err → SpawnError::Os
//!   desc.set_handle(h)
//!   hooks.post_create(label)
//!
//! run_envelope(worker, hooks, ctx)              (new thread)
//!   enter span "worker{label}"
//!   hooks.init(ctx) ──Err──► publish ThreadInitFailed ──► return
//!        │ Ok
//!        ▼
//!   publish ThreadInitialised
//!   worker.run(ctx)
//!   hooks.exit(ctx)
//!   publish ThreadExited
//! ```
//!
//! ## Rules
//! - A failed `init` is the only path where a thread ends without running its worker.
//! - `exit` runs whenever `run` returned, whatever the worker did internally.
//! - Registration is the caller's job: the envelope never touches a registry.

use std::sync::Arc;

use crate::core::context::WorkerContext;
use crate::error::SpawnError;
use crate::events::EventKind;
use crate::threads::{Lifecycle, ThreadDescriptor, ThreadHandle, WorkerRef};

/// Creates the OS thread of `descriptor`, running its worker inside the envelope.
///
/// On success the handle is stored in the descriptor and returned.
pub fn spawn_worker(
    descriptor: &mut ThreadDescriptor,
    ctx: WorkerContext,
) -> Result<Arc<ThreadHandle>, SpawnError> {
    let hooks = descriptor.hooks();
    let worker = Arc::clone(descriptor.worker());
    let label = descriptor.label().to_string();

    hooks.pre_create(&label);
    let envelope_hooks = Arc::clone(&hooks);
    let handle = ThreadHandle::spawn(&label, move || run_envelope(&worker, &*envelope_hooks, &ctx))
        .map_err(|source| SpawnError::Os {
            label: label.clone(),
            source,
        })?;
    descriptor.set_handle(Arc::clone(&handle));
    hooks.post_create(&label);

    Ok(handle)
}

/// Runs one worker inside its lifecycle hooks on the current thread.
pub fn run_envelope(worker: &WorkerRef, hooks: &dyn Lifecycle, ctx: &WorkerContext) {
    let span = tracing::info_span!("worker", label = %ctx.label());
    let _entered = span.enter();

    if let Err(e) = hooks.init(ctx) {
        tracing::debug!(error = %e, "init hook failed; worker not started");
        ctx.publish(
            ctx.event(EventKind::ThreadInitFailed)
                .with_reason(e.to_string()),
        );
        return;
    }
    ctx.publish(ctx.event(EventKind::ThreadInitialised));

    worker.run(ctx);
    hooks.exit(ctx);

    ctx.publish(ctx.event(EventKind::ThreadExited));
}
