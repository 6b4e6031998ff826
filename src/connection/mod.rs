//! # Connection supervision.
//!
//! - [`ConnectionSupervisor`]: dial / session / health-check state machine;
//! - [`Dialer`] and [`NetDialer`]: socket setup and time-bounded connect;
//! - [`CommsFactory`], [`CommsGroup`] and [`StreamComms`]: the per-session workers;
//! - [`ConnectionState`] and [`Role`].

mod comms;
mod dialer;
mod state;
mod supervisor;

pub use comms::{CommsFactory, CommsGroup, SessionLink, StreamComms, StreamSession};
pub use dialer::{Dialer, NetDialer, NetSocket};
pub use state::{ConnectionState, Role};
pub use supervisor::{ConnectionSupervisor, SessionEnd, SupervisorParams};
