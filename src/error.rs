//! Error types used by the threadvisor runtime.
//!
//! One enum per concern:
//!
//! - [`RegistryError`]: thread registry bookkeeping (init, duplicates, snapshots).
//! - [`WaitError`]: bulk waits over registered threads.
//! - [`SpawnError`]: OS thread creation and registration.
//! - [`InitError`]: a worker's `init` hook refused to start the worker.
//! - [`SessionError`]: spawning the comms group of a connection session.
//! - [`ConfigError`]: loading the settings file.
//! - [`RuntimeError`]: process-level orchestration (startup, graceful shutdown).
//!
//! Every enum provides `as_label()`, a short stable snake_case label for logs.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// # Errors produced by a [`ThreadRegistry`](crate::ThreadRegistry).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Operation attempted on a registry that was never initialized or already cleaned up.
    #[error("thread registry is not initialized")]
    NotInitialized,

    /// `init()` called on a registry that is already initialized.
    #[error("thread registry is already initialized")]
    AlreadyInitialized,

    /// A live (non-terminated) entry with the same label exists.
    #[error("thread '{label}' is already registered")]
    AlreadyRegistered {
        /// Label of the rejected thread.
        label: String,
    },

    /// The descriptor was never spawned, so there is no OS handle to register.
    #[error("thread '{label}' has no OS handle")]
    MissingHandle {
        /// Label of the descriptor.
        label: String,
    },

    /// Could not allocate room for a handle snapshot.
    #[error("out of memory while snapshotting {requested} thread handles")]
    OutOfMemory {
        /// Number of handles the snapshot needed.
        requested: usize,
    },
}

impl RegistryError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use threadvisor::RegistryError;
    ///
    /// let err = RegistryError::AlreadyRegistered { label: "CLIENT".into() };
    /// assert_eq!(err.as_label(), "registry_already_registered");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::NotInitialized => "registry_not_initialized",
            RegistryError::AlreadyInitialized => "registry_already_initialized",
            RegistryError::AlreadyRegistered { .. } => "registry_already_registered",
            RegistryError::MissingHandle { .. } => "registry_missing_handle",
            RegistryError::OutOfMemory { .. } => "registry_out_of_memory",
        }
    }
}

/// # Errors produced by bulk waits (`wait_all`, `terminate_all`).
///
/// A timeout is an expected, retryable outcome; every other variant means the
/// wait itself could not be carried out and callers should treat it as an
/// infrastructure failure.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    /// Some threads were still running when the timeout elapsed.
    #[error("timed out after {timeout:?}; still running: {pending:?}")]
    Timeout {
        /// The timeout that elapsed.
        timeout: Duration,
        /// Labels of the threads that had not finished.
        pending: Vec<String>,
    },

    /// One or more threads ended by panicking.
    #[error("threads panicked: {labels:?}")]
    Panicked {
        /// Labels of the panicked threads.
        labels: Vec<String>,
    },

    /// The registry could not produce a snapshot to wait on.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl WaitError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            WaitError::Timeout { .. } => "wait_timeout",
            WaitError::Panicked { .. } => "wait_panicked",
            WaitError::Registry(e) => e.as_label(),
        }
    }

    /// `true` for [`WaitError::Timeout`]; `false` for failures of the wait itself.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use threadvisor::WaitError;
    ///
    /// let err = WaitError::Timeout { timeout: Duration::from_millis(5), pending: vec![] };
    /// assert!(err.is_timeout());
    /// ```
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }
}

/// # Errors produced while creating a worker thread.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SpawnError {
    /// The OS refused to create the thread.
    #[error("failed to create thread '{label}': {source}")]
    Os {
        /// Label of the thread.
        label: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The thread could not be registered (duplicate label, registry not initialized).
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl SpawnError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SpawnError::Os { .. } => "spawn_os_error",
            SpawnError::Registry(e) => e.as_label(),
        }
    }
}

/// # Reasons a worker's `init` hook refused to start it.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    /// The logger did not become ready within the timeout.
    #[error("logger not ready after {waited:?}")]
    ReadinessTimeout {
        /// How long the barrier waited.
        waited: Duration,
    },

    /// The readiness gate was failed by its owner; the logger will never be ready.
    #[error("readiness gate failed")]
    ReadinessFailed,

    /// A custom hook rejected the start.
    #[error("init hook failed: {reason}")]
    Hook {
        /// Free-form reason.
        reason: String,
    },
}

impl InitError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            InitError::ReadinessTimeout { .. } => "init_readiness_timeout",
            InitError::ReadinessFailed => "init_readiness_failed",
            InitError::Hook { .. } => "init_hook_failed",
        }
    }

    /// `true` when the failure points at a broken subsystem rather than an
    /// expected timeout.
    pub fn is_malfunction(&self) -> bool {
        !matches!(self, InitError::ReadinessTimeout { .. })
    }
}

/// # Errors produced while starting the comms group of a session.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SessionError {
    /// The group could not be prepared (socket clone, bad role, ...).
    #[error("comms group init failed: {reason}")]
    GroupInit {
        /// Free-form reason.
        reason: String,
    },

    /// A comms worker thread could not be created.
    #[error(transparent)]
    Spawn(#[from] SpawnError),

    /// Socket-level failure while preparing the session.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SessionError::GroupInit { .. } => "session_group_init",
            SessionError::Spawn(e) => e.as_label(),
            SessionError::Io(_) => "session_io",
        }
    }
}

/// # Errors produced while loading [`Settings`](crate::Settings).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config {path:?}: {source}")]
    Read {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or does not match the settings schema.
    #[error("cannot parse config {path:?}: {source}")]
    Parse {
        /// Path of the file.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "config_read",
            ConfigError::Parse { .. } => "config_parse",
        }
    }
}

/// # Errors produced by the process-level runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The global registry is unusable; no thread can be started.
    #[error("cannot start threads: {0}")]
    Registry(#[from] RegistryError),

    /// Shutdown grace period was exceeded; some threads remained running.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Labels of the threads that did not stop in time.
        stuck: Vec<String>,
    },

    /// A thread ended by panicking during shutdown.
    #[error("threads panicked during shutdown: {labels:?}")]
    Panicked {
        /// Labels of the panicked threads.
        labels: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use threadvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Registry(_) => "runtime_registry",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Panicked { .. } => "runtime_panicked",
        }
    }
}
