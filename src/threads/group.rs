//! # Thread group: a named set of threads sharing one registry and one stop token.
//!
//! A connection session runs its send/receive workers as a [`ThreadGroup`]. The
//! group owns its own [`ThreadRegistry`] and a child [`CancellationToken`] of the
//! process token, so the session can be stopped on its own while a process
//! shutdown still reaches it.
//!
//! ```text
//! process token ──child──► group token ──► every member's WorkerContext
//!
//! add(desc)            ─► registry.register(desc, desc.handle)
//! wait_all(t)          ─► Ok | Err(Timeout{pending}) | Err(Panicked|Registry)
//! terminate_all(t)     ─► group token.cancel() ─► wait_all(t)
//! cleanup()            ─► registry.cleanup()   (no join)
//! ```
//!
//! ## Rules
//! - Termination is cooperative: members must poll their token. There is no forced kill.
//! - `cleanup` does not join; call `wait_all` first when join semantics are needed.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{RegistryError, WaitError};
use crate::threads::descriptor::ThreadDescriptor;
use crate::threads::registry::{EntryInfo, ThreadRegistry};

/// Maximum group name length in bytes.
pub const MAX_GROUP_NAME: usize = 63;

/// Named set of threads with a shared stop token.
#[derive(Debug)]
pub struct ThreadGroup {
    name: String,
    registry: ThreadRegistry,
    token: CancellationToken,
}

impl ThreadGroup {
    /// Creates an empty group whose token is a child of `parent`.
    ///
    /// Names longer than [`MAX_GROUP_NAME`] bytes are truncated on a char boundary.
    pub fn new(name: &str, parent: &CancellationToken) -> Self {
        Self {
            name: truncate_name(name),
            registry: ThreadRegistry::new(),
            token: parent.child_token(),
        }
    }

    /// Group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop token handed to every member.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Registers an already spawned descriptor.
    pub fn add(&self, descriptor: &ThreadDescriptor) -> Result<(), RegistryError> {
        let handle = descriptor
            .handle()
            .cloned()
            .ok_or_else(|| RegistryError::MissingHandle {
                label: descriptor.label().to_string(),
            })?;
        self.registry.register(descriptor, handle)
    }

    /// `true` when no member is live.
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Number of live members (0 after cleanup).
    pub fn active_count(&self) -> usize {
        self.registry.active_count().unwrap_or(0)
    }

    /// Label and state of every member.
    pub fn members(&self) -> Result<Vec<EntryInfo>, RegistryError> {
        self.registry.entries()
    }

    /// Waits for every live member.
    ///
    /// A [`WaitError::Timeout`] means members are still running; any other
    /// error means the wait itself failed.
    pub fn wait_all(&self, timeout: Duration) -> Result<(), WaitError> {
        self.registry.wait_all(Some(timeout))
    }

    /// Cancels the group token and waits up to `timeout` for members to stop.
    pub fn terminate_all(&self, timeout: Duration) -> Result<(), WaitError> {
        self.token.cancel();
        self.wait_all(timeout)
    }

    /// Releases the group's registry.
    pub fn cleanup(&self) {
        self.registry.cleanup();
    }
}

fn truncate_name(name: &str) -> String {
    if name.len() <= MAX_GROUP_NAME {
        return name.to_string();
    }
    let mut end = MAX_GROUP_NAME;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}
