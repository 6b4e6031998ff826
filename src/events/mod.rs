//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: the orchestrator (`core::runtime`), the lifecycle envelope,
//!   connection supervisors, comms workers, the command interface.
//! - **Consumer**: the LOGGER worker, which renders every event through `tracing`
//!   at [`EventKind::level`].

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
