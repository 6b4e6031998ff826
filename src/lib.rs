//! # threadvisor
//!
//! **Threadvisor** supervises the OS threads of a small networking runtime: a
//! logger, an outbound client link, an inbound server link and an operator
//! command interface.
//!
//! It provides a concurrency-safe thread registry, a uniform lifecycle envelope
//! with a logger readiness barrier, a startup orchestrator honoring a
//! suppression list, and a connection supervisor that dials with exponential
//! backoff and health-checks every session.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   Settings (TOML)              ThreadDescriptor × N
//!        │                               │
//!        ▼                               ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Runtime (startup orchestrator)                                   │
//! │  - ThreadRegistry (label → handle + state, one mutex)             │
//! │  - CancellationToken (process shutdown)                           │
//! │  - ReadinessGate (opened by the LOGGER)                           │
//! │  - Bus (broadcast events)                                         │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               ▼
//!   ┌──────────┐     ┌─────────────┐    ┌─────────────┐  ┌───────────────────┐
//!   │  LOGGER  │     │   CLIENT    │    │   SERVER    │  │ COMMAND_INTERFACE │
//!   │  drains  │     │ Connection- │    │ Connection- │  │  help / status /  │
//!   │   Bus    │     │ Supervisor  │    │ Supervisor  │  │  quit             │
//!   └────┬─────┘     └──────┬──────┘    └──────┬──────┘  └───────────────────┘
//!        │                  ▼                  ▼
//!        │           ThreadGroup         ThreadGroup
//!        │         CLIENT.SEND/.RECEIVE  SERVER.SEND/.RECEIVE
//!        ▼
//!     tracing
//! ```
//!
//! ### Worker lifecycle
//! ```text
//! pre_create ─► OS thread ─► post_create ─► register (CREATED) ─► RUNNING
//!                  │
//!                  └─► init (readiness barrier) ──Err──► exit thread
//!                           │ Ok
//!                           ▼
//!                      Worker::run ─► exit hook ─► TERMINATED
//! ```
//!
//! ## Features
//! | Area              | Description                                             | Key types / traits                          |
//! |-------------------|---------------------------------------------------------|---------------------------------------------|
//! | **Threads**       | Registry, groups, descriptors, handles with timed waits | [`ThreadRegistry`], [`ThreadGroup`]         |
//! | **Lifecycle**     | Hooks and the readiness barrier                         | [`Lifecycle`], [`ReadinessGate`]            |
//! | **Orchestration** | Suppression-aware startup and graceful shutdown         | [`Runtime`]                                 |
//! | **Connections**   | Dial/backoff/health-check state machine                 | [`ConnectionSupervisor`], [`Dialer`]        |
//! | **Events**        | Typed runtime events rendered by the logger             | [`Event`], [`EventKind`], [`Bus`]           |
//! | **Errors**        | One typed error per concern                             | [`RegistryError`], [`WaitError`], ...       |
//! | **Configuration** | TOML settings with documented defaults                  | [`Settings`]                                |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use threadvisor::{Runtime, Settings, ThreadDescriptor, WorkerContext, WorkerFn};
//!
//! let mut settings = Settings::default();
//! settings.runtime.shutdown_grace_ms = 2000;
//! let runtime = Runtime::new(settings);
//! runtime.ready().open();
//!
//! let ticker = ThreadDescriptor::new(
//!     "TICKER",
//!     WorkerFn::arc(|ctx: &WorkerContext| {
//!         while !ctx.is_shutdown() {
//!             std::thread::sleep(Duration::from_millis(5));
//!         }
//!     }),
//! );
//!
//! let report = runtime.start(vec![ticker]).expect("registry initialized");
//! assert_eq!(report.started, vec!["TICKER"]);
//!
//! runtime.shutdown_with_grace().expect("ticker stops on shutdown");
//! runtime.cleanup();
//! ```
mod config;
mod connection;
mod core;
mod error;
mod events;
mod policies;
mod threads;
mod workers;

// ---- Public re-exports ----

pub use config::{
    DebugSettings, Endpoint, LinkSettings, NetworkSettings, RuntimeSettings, Settings,
    SuppressionList,
};
pub use connection::{
    CommsFactory, CommsGroup, ConnectionState, ConnectionSupervisor, Dialer, NetDialer, NetSocket,
    Role, SessionEnd, SessionLink, StreamComms, StreamSession, SupervisorParams,
};
pub use core::{
    PollingSleeper, ReadinessGate, Runtime, ShutdownHandle, Sleeper, StartReport, WorkerContext,
    run_envelope, spawn_worker, wait_for_shutdown_signal,
};
pub use error::{
    ConfigError, InitError, RegistryError, RuntimeError, SessionError, SpawnError, WaitError,
};
pub use events::{Bus, Event, EventKind};
pub use policies::BackoffPolicy;
pub use threads::{
    DefaultHooks, EntryInfo, Lifecycle, MAX_GROUP_NAME, ThreadDescriptor, ThreadGroup,
    ThreadHandle, ThreadRegistry, ThreadState, Worker, WorkerFn, WorkerRef,
};
pub use workers::{
    COMMAND_INTERFACE, CLIENT, ClientWorker, Command, CommandInterface, LOGGER, LinkSupervisor,
    LoggerHooks, LoggerWorker, SERVER, ServerWorker,
};
