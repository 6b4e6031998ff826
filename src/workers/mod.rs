//! # Well-known workers.
//!
//! | label               | worker               | hooks          |
//! |---------------------|----------------------|----------------|
//! | `LOGGER`            | [`LoggerWorker`]     | [`LoggerHooks`]|
//! | `CLIENT`            | [`ClientWorker`]     | default        |
//! | `SERVER`            | [`ServerWorker`]     | default        |
//! | `COMMAND_INTERFACE` | [`CommandInterface`] | default        |

mod client;
mod command;
mod logger;
mod server;

pub use client::{ClientWorker, LinkSupervisor};
pub use command::{Command, CommandInterface};
pub use logger::{LoggerHooks, LoggerWorker};
pub use server::ServerWorker;

/// Label of the logger thread.
pub const LOGGER: &str = "LOGGER";
/// Label of the outbound link thread.
pub const CLIENT: &str = "CLIENT";
/// Label of the inbound link thread.
pub const SERVER: &str = "SERVER";
/// Label of the operator command thread.
pub const COMMAND_INTERFACE: &str = "COMMAND_INTERFACE";
