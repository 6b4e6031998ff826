//! Connection supervisor states and link roles.

/// State of a [`ConnectionSupervisor`](crate::ConnectionSupervisor).
///
/// ```text
/// DISCONNECTED ──► CONNECTING ──► CONNECTED ──► MONITORING
///      ▲               │              │              │
///      └───────────────┼──────────────┴──────────────┘
///                      ▼
///                  TERMINAL (no way out)
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No socket; waiting to dial.
    Disconnected,
    /// Dial loop running (setup, connect, backoff).
    Connecting,
    /// Socket ready; comms group not started yet.
    Connected,
    /// Comms group running; health checks active.
    Monitoring,
    /// Supervisor finished; the worker returns.
    Terminal,
}

impl ConnectionState {
    /// Upper-case name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Connected => "CONNECTED",
            ConnectionState::Monitoring => "MONITORING",
            ConnectionState::Terminal => "TERMINAL",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of a link a supervisor runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Dials out to a remote server.
    Client,
    /// Accepts one inbound peer at a time.
    Server,
}

impl Role {
    /// Thread label of the role's worker; comms workers append `.SEND` / `.RECEIVE`.
    pub fn label(self) -> &'static str {
        match self {
            Role::Client => "CLIENT",
            Role::Server => "SERVER",
        }
    }
}
