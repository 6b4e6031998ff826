//! # Thread registry - concurrency-safe catalogue of worker threads.
//!
//! Maps a thread label to its OS handle and lifecycle state so the process can
//! wait for, count or list its threads without races or leaked handles.
//!
//! ## Architecture
//! ```text
//! Mutex<Option<Entries>>
//!   └─ Entries { map: HashMap<label, RegistryEntry{seq, state, handle}>, next_seq }
//!
//! register(desc, handle) ─► live duplicate? ─► AlreadyRegistered
//!                          └─► insert {state: Created, seq: next_seq++}
//! snapshot_active()      ─► reap finished ─► collect non-terminated handles (seq order)
//! wait_all(timeout)      ─► snapshot_active() ─► wait outside the lock ─► mark terminated
//! ```
//!
//! ## Rules
//! - Every read and write happens under the one mutex; no lock-free paths.
//! - At most one live (non-terminated) entry per label; a terminated entry is replaced.
//! - States only move forward: `Created → Running → Terminated`.
//! - A snapshot is a point-in-time copy: threads registered afterwards are not in it.
//! - `None` inside the mutex means "not initialized"; operations then fail with
//!   [`RegistryError::NotInitialized`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{RegistryError, WaitError};
use crate::threads::descriptor::ThreadDescriptor;
use crate::threads::handle::{self, ThreadHandle};

/// Lifecycle state of a registered thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ThreadState {
    /// Registered right after OS-level creation.
    Created,
    /// Marked running by its creator.
    Running,
    /// The OS thread finished.
    Terminated,
    /// Status could not be determined (no such entry, registry not initialized).
    Unknown,
}

impl ThreadState {
    fn rank(self) -> Option<u8> {
        match self {
            ThreadState::Created => Some(0),
            ThreadState::Running => Some(1),
            ThreadState::Terminated => Some(2),
            ThreadState::Unknown => None,
        }
    }

    /// `true` if moving from `self` to `next` is a forward transition.
    pub fn can_advance_to(self, next: ThreadState) -> bool {
        match (self.rank(), next.rank()) {
            (Some(a), Some(b)) => b > a,
            _ => false,
        }
    }

    /// `true` for `Created` and `Running`.
    pub fn is_live(self) -> bool {
        matches!(self, ThreadState::Created | ThreadState::Running)
    }

    /// Upper-case name used in listings.
    pub fn as_str(self) -> &'static str {
        match self {
            ThreadState::Created => "CREATED",
            ThreadState::Running => "RUNNING",
            ThreadState::Terminated => "TERMINATED",
            ThreadState::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for ThreadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label and state of one entry, as listed by [`ThreadRegistry::entries`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryInfo {
    /// Thread label.
    pub label: String,
    /// State at listing time.
    pub state: ThreadState,
}

struct RegistryEntry {
    seq: u64,
    state: ThreadState,
    handle: Arc<ThreadHandle>,
}

#[derive(Default)]
struct Entries {
    map: HashMap<String, RegistryEntry>,
    next_seq: u64,
}

impl Entries {
    /// Marks entries whose OS thread already finished as terminated.
    fn reap(&mut self) {
        for entry in self.map.values_mut() {
            if entry.state.is_live() && entry.handle.is_finished() {
                entry.state = ThreadState::Terminated;
            }
        }
    }

    fn live_sorted(&self, except: Option<&str>) -> Vec<(&String, &RegistryEntry)> {
        let mut live: Vec<_> = self
            .map
            .iter()
            .filter(|(label, e)| e.state.is_live() && Some(label.as_str()) != except)
            .collect();
        live.sort_unstable_by_key(|(_, e)| e.seq);
        live
    }
}

/// Concurrency-safe registry of worker threads.
pub struct ThreadRegistry {
    inner: Mutex<Option<Entries>>,
}

impl Default for ThreadRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadRegistry {
    /// Creates an initialized, empty registry.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Some(Entries::default())),
        }
    }

    /// Creates a registry that must be [`init`](Self::init)ialized before use.
    pub fn uninitialized() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Initializes the registry.
    ///
    /// Fails with [`RegistryError::AlreadyInitialized`] if it is already
    /// initialized; state is left untouched in that case.
    pub fn init(&self) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        if inner.is_some() {
            return Err(RegistryError::AlreadyInitialized);
        }
        *inner = Some(Entries::default());
        Ok(())
    }

    /// `true` between `init` (or `new`) and `cleanup`.
    pub fn is_initialized(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// Registers `descriptor` with `handle` in state [`ThreadState::Created`].
    pub fn register(
        &self,
        descriptor: &ThreadDescriptor,
        handle: Arc<ThreadHandle>,
    ) -> Result<(), RegistryError> {
        self.insert(descriptor.label(), handle)
    }

    pub(crate) fn insert(&self, label: &str, handle: Arc<ThreadHandle>) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        let entries = inner.as_mut().ok_or(RegistryError::NotInitialized)?;
        entries.reap();

        if entries.map.get(label).is_some_and(|e| e.state.is_live()) {
            return Err(RegistryError::AlreadyRegistered {
                label: label.to_string(),
            });
        }

        let seq = entries.next_seq;
        entries.next_seq += 1;
        entries.map.insert(
            label.to_string(),
            RegistryEntry {
                seq,
                state: ThreadState::Created,
                handle,
            },
        );
        Ok(())
    }

    /// Moves the entry for `label` to `state`.
    ///
    /// Returns `Ok(true)` if the state advanced, `Ok(false)` if the entry is
    /// missing (warning logged) or the transition would not move forward.
    pub fn update_state(&self, label: &str, state: ThreadState) -> Result<bool, RegistryError> {
        let mut inner = self.inner.lock();
        let entries = inner.as_mut().ok_or(RegistryError::NotInitialized)?;
        entries.reap();

        let Some(entry) = entries.map.get_mut(label) else {
            tracing::warn!(thread = label, to = %state, "state update for unregistered thread");
            return Ok(false);
        };
        if !entry.state.can_advance_to(state) {
            tracing::debug!(thread = label, from = %entry.state, to = %state, "state update ignored");
            return Ok(false);
        }
        entry.state = state;
        Ok(true)
    }

    /// `true` iff a live entry with that label exists.
    pub fn is_registered(&self, label: &str) -> bool {
        self.state_of(label).is_live()
    }

    /// Current state of `label`, [`ThreadState::Unknown`] when absent.
    pub fn state_of(&self, label: &str) -> ThreadState {
        let mut inner = self.inner.lock();
        let Some(entries) = inner.as_mut() else {
            return ThreadState::Unknown;
        };
        entries.reap();
        entries
            .map
            .get(label)
            .map(|e| e.state)
            .unwrap_or(ThreadState::Unknown)
    }

    /// Handles of every live entry, in registration order.
    pub fn snapshot_active(&self) -> Result<Vec<Arc<ThreadHandle>>, RegistryError> {
        self.snapshot(None)
    }

    /// Like [`snapshot_active`](Self::snapshot_active), leaving out `label`.
    pub fn snapshot_active_except(
        &self,
        label: &str,
    ) -> Result<Vec<Arc<ThreadHandle>>, RegistryError> {
        self.snapshot(Some(label))
    }

    fn snapshot(&self, except: Option<&str>) -> Result<Vec<Arc<ThreadHandle>>, RegistryError> {
        let mut inner = self.inner.lock();
        let entries = inner.as_mut().ok_or(RegistryError::NotInitialized)?;
        entries.reap();

        let live = entries.live_sorted(except);
        let mut out = Vec::new();
        out.try_reserve_exact(live.len())
            .map_err(|_| RegistryError::OutOfMemory {
                requested: live.len(),
            })?;
        out.extend(live.into_iter().map(|(_, e)| Arc::clone(&e.handle)));
        Ok(out)
    }

    /// Label and state of every entry, in registration order.
    pub fn entries(&self) -> Result<Vec<EntryInfo>, RegistryError> {
        let mut inner = self.inner.lock();
        let entries = inner.as_mut().ok_or(RegistryError::NotInitialized)?;
        entries.reap();

        let mut all: Vec<_> = entries.map.iter().collect();
        all.sort_unstable_by_key(|(_, e)| e.seq);
        Ok(all
            .into_iter()
            .map(|(label, e)| EntryInfo {
                label: label.clone(),
                state: e.state,
            })
            .collect())
    }

    /// Number of live entries.
    pub fn active_count(&self) -> Result<usize, RegistryError> {
        let mut inner = self.inner.lock();
        let entries = inner.as_mut().ok_or(RegistryError::NotInitialized)?;
        entries.reap();
        Ok(entries.map.values().filter(|e| e.state.is_live()).count())
    }

    /// `true` if no live entry remains. An uninitialized registry is empty.
    pub fn is_empty(&self) -> bool {
        self.active_count().map_or(true, |n| n == 0)
    }

    /// Waits for every thread live at call time (`None` = unbounded).
    pub fn wait_all(&self, timeout: Option<Duration>) -> Result<(), WaitError> {
        let handles = self.snapshot_active()?;
        self.wait_handles(&handles, timeout)
    }

    /// Waits for every thread live at call time except `label`.
    pub fn wait_all_except(&self, label: &str, timeout: Option<Duration>) -> Result<(), WaitError> {
        let handles = self.snapshot_active_except(label)?;
        self.wait_handles(&handles, timeout)
    }

    fn wait_handles(
        &self,
        handles: &[Arc<ThreadHandle>],
        timeout: Option<Duration>,
    ) -> Result<(), WaitError> {
        let res = handle::wait_all(handles, timeout);
        if !matches!(res, Err(WaitError::Timeout { .. })) {
            for h in handles {
                let _ = self.update_state(h.label(), ThreadState::Terminated);
            }
        }
        res
    }

    /// Releases every entry and returns to the uninitialized state.
    ///
    /// No-op on an uninitialized registry. Does not join threads: callers must
    /// wait first if they need join semantics, and must not race it with other
    /// registry operations.
    pub fn cleanup(&self) {
        let mut inner = self.inner.lock();
        if let Some(entries) = inner.take() {
            let live = entries.map.values().filter(|e| e.state.is_live()).count();
            if live > 0 {
                tracing::debug!(live, "registry cleaned up with live threads");
            }
        }
    }
}

impl std::fmt::Debug for ThreadRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        match inner.as_ref() {
            Some(e) => f
                .debug_struct("ThreadRegistry")
                .field("entries", &e.map.len())
                .finish(),
            None => f.write_str("ThreadRegistry(uninitialized)"),
        }
    }
}
