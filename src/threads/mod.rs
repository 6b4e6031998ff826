//! # Worker threads: descriptors, OS handles, registries and groups.
//!
//! - [`ThreadDescriptor`] names a worker and its lifecycle hooks.
//! - [`ThreadHandle`] is the OS thread with a bounded wait.
//! - [`ThreadRegistry`] catalogues live threads under one mutex.
//! - [`ThreadGroup`] is a registry plus a stop token for one session.

mod descriptor;
mod group;
mod handle;
mod registry;

pub use descriptor::{DefaultHooks, Lifecycle, ThreadDescriptor, Worker, WorkerFn, WorkerRef};
pub use group::{MAX_GROUP_NAME, ThreadGroup};
pub use handle::ThreadHandle;
pub use registry::{EntryInfo, ThreadRegistry, ThreadState};
