//! Runtime core: worker envelope, orchestration and shutdown.
//!
//! - [`context`]: explicit per-worker context (label, token, gate, bus);
//! - [`readiness`]: one-shot readiness gate with a bounded wait;
//! - [`envelope`]: spawns a worker thread and runs it inside its lifecycle hooks;
//! - [`runtime`]: creates the well-known threads and drives graceful shutdown;
//! - [`shutdown`]: OS signal handling and cancellable sleeps.

pub mod context;
pub mod envelope;
pub mod readiness;
pub mod runtime;
pub mod shutdown;

pub use context::WorkerContext;
pub use envelope::{run_envelope, spawn_worker};
pub use readiness::ReadinessGate;
pub use runtime::{Runtime, StartReport};
pub use shutdown::{PollingSleeper, ShutdownHandle, Sleeper, wait_for_shutdown_signal};
