//! # Runtime settings.
//!
//! [`Settings`] is deserialized from a TOML file whose tables mirror the
//! section/key model of the configuration surface:
//!
//! ```toml
//! [network.client]
//! server_hostname = "127.0.0.2"
//! port = 4200
//! backoff_max_seconds = 32
//! retry_limit = 10
//! thread_wait_timeout_ms = 5000
//! connection_timeout_seconds = 5
//!
//! [network.server]
//! port = 4150
//!
//! [debug]
//! suppress_threads = "server, command_interface"
//! suppress_client_send_data = true
//!
//! [runtime]
//! ready_timeout_ms = 5000
//! reconnect_delay_ms = 1000
//! shutdown_grace_ms = 10000
//! ```
//!
//! Every key is optional; a missing file section falls back to the defaults below.
//!
//! ## Sentinel values
//! - `retry_limit <= 0` → no health-check limit (`retry_limit()` returns `None`)
//! - `shutdown_grace_ms = 0` → do not wait for threads on shutdown
//! - `backoff_max_seconds = 0` → treated as 1 (the first backoff step)

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_CLIENT_HOST: &str = "127.0.0.2";
const DEFAULT_CLIENT_PORT: u16 = 4200;
const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
const DEFAULT_SERVER_PORT: u16 = 4150;

/// Top-level settings.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// `[network.*]` tables.
    pub network: NetworkSettings,
    /// `[debug]` table.
    pub debug: DebugSettings,
    /// `[runtime]` table.
    pub runtime: RuntimeSettings,
}

impl Settings {
    /// Loads settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// `[network.client]` and `[network.server]`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Outbound (client role) link.
    pub client: LinkSettings,
    /// Inbound (server role) link.
    pub server: LinkSettings,
}

impl NetworkSettings {
    /// Remote endpoint the client dials.
    pub fn client_endpoint(&self) -> Endpoint {
        self.client.endpoint(DEFAULT_CLIENT_HOST, DEFAULT_CLIENT_PORT)
    }

    /// Local endpoint the server listens on.
    pub fn server_endpoint(&self) -> Endpoint {
        self.server.endpoint(DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT)
    }
}

/// Host, port and transport of one side of a link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    /// Hostname or IP literal.
    pub host: String,
    /// Port number.
    pub port: u16,
    /// `true` for TCP, `false` for UDP.
    pub is_tcp: bool,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let proto = if self.is_tcp { "tcp" } else { "udp" };
        write!(f, "{proto}://{}:{}", self.host, self.port)
    }
}

/// Settings of one link (client or server role).
///
/// ## Field semantics
/// - `backoff_max_seconds`: ceiling of the dial backoff
/// - `retry_limit`: failed health checks tolerated before a forced reconnect (`<= 0` = unlimited)
/// - `thread_wait_timeout_ms`: granularity of the monitoring loop
/// - `connection_timeout_seconds`: per-attempt connect timeout
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    /// Remote host (client) or bind address (server). Role default when absent.
    pub server_hostname: Option<String>,
    /// Remote port (client) or listening port (server). Role default when absent.
    pub port: Option<u16>,
    /// TCP when `true`, UDP otherwise.
    pub is_tcp: bool,
    /// Interval between test-data sends.
    pub send_interval_ms: u64,
    /// Whether the send worker transmits test data.
    pub send_test_data: bool,
    /// Dial backoff ceiling in seconds.
    pub backoff_max_seconds: u64,
    /// Health-check failures tolerated before forcing a reconnect.
    pub retry_limit: i64,
    /// Monitoring loop wait granularity in milliseconds.
    pub thread_wait_timeout_ms: u64,
    /// Per-attempt connect timeout in seconds.
    pub connection_timeout_seconds: u64,
}

impl Default for LinkSettings {
    /// Defaults:
    /// - `is_tcp = true`
    /// - `send_interval_ms = 2000`, `send_test_data = false`
    /// - `backoff_max_seconds = 32`
    /// - `retry_limit = 10`
    /// - `thread_wait_timeout_ms = 5000`
    /// - `connection_timeout_seconds = 5`
    fn default() -> Self {
        Self {
            server_hostname: None,
            port: None,
            is_tcp: true,
            send_interval_ms: 2000,
            send_test_data: false,
            backoff_max_seconds: 32,
            retry_limit: 10,
            thread_wait_timeout_ms: 5000,
            connection_timeout_seconds: 5,
        }
    }
}

impl LinkSettings {
    fn endpoint(&self, default_host: &str, default_port: u16) -> Endpoint {
        Endpoint {
            host: self
                .server_hostname
                .clone()
                .unwrap_or_else(|| default_host.to_string()),
            port: self.port.unwrap_or(default_port),
            is_tcp: self.is_tcp,
        }
    }

    /// Dial backoff ceiling, at least one second.
    #[inline]
    pub fn backoff_max(&self) -> Duration {
        Duration::from_secs(self.backoff_max_seconds.max(1))
    }

    /// Health-check retry limit as an `Option`.
    ///
    /// - `None` → unlimited (`retry_limit <= 0`)
    /// - `Some(n)` → force a reconnect after `n` consecutive failed checks
    #[inline]
    pub fn retry_limit(&self) -> Option<u32> {
        if self.retry_limit <= 0 {
            None
        } else {
            Some(u32::try_from(self.retry_limit).unwrap_or(u32::MAX))
        }
    }

    /// Monitoring loop wait granularity.
    #[inline]
    pub fn thread_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.thread_wait_timeout_ms)
    }

    /// Per-attempt connect timeout.
    #[inline]
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_seconds)
    }

    /// Interval between test-data sends.
    #[inline]
    pub fn send_interval(&self) -> Duration {
        Duration::from_millis(self.send_interval_ms)
    }
}

/// `[debug]`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DebugSettings {
    /// Comma-separated labels of threads that must never be created.
    pub suppress_threads: String,
    /// Keeps the client send worker quiet even when `send_test_data` is set.
    pub suppress_client_send_data: bool,
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            suppress_threads: String::new(),
            suppress_client_send_data: true,
        }
    }
}

impl DebugSettings {
    /// Parsed suppression list.
    pub fn suppression(&self) -> SuppressionList {
        SuppressionList::parse(&self.suppress_threads)
    }
}

/// `[runtime]`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// How long the readiness barrier waits for the logger.
    pub ready_timeout_ms: u64,
    /// Fixed delay between the end of a session and the next dial.
    pub reconnect_delay_ms: u64,
    /// How long a graceful shutdown waits for threads (`0` = do not wait).
    pub shutdown_grace_ms: u64,
    /// Event bus capacity (min 1).
    pub bus_capacity: usize,
    /// Logger sleep between queue drains.
    pub logger_poll_ms: u64,
}

impl Default for RuntimeSettings {
    /// Defaults:
    /// - `ready_timeout_ms = 5000`
    /// - `reconnect_delay_ms = 1000`
    /// - `shutdown_grace_ms = 10000`
    /// - `bus_capacity = 1024`
    /// - `logger_poll_ms = 1`
    fn default() -> Self {
        Self {
            ready_timeout_ms: 5000,
            reconnect_delay_ms: 1000,
            shutdown_grace_ms: 10_000,
            bus_capacity: 1024,
            logger_poll_ms: 1,
        }
    }
}

impl RuntimeSettings {
    /// Readiness barrier timeout.
    #[inline]
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    /// Delay between sessions.
    #[inline]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Shutdown grace as an `Option` (`None` = do not wait).
    #[inline]
    pub fn shutdown_grace(&self) -> Option<Duration> {
        if self.shutdown_grace_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.shutdown_grace_ms))
        }
    }

    /// Bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Logger poll interval.
    #[inline]
    pub fn logger_poll(&self) -> Duration {
        Duration::from_millis(self.logger_poll_ms)
    }
}

/// Case-insensitive set of thread labels that must not be created.
///
/// Parsed from a comma-separated list; tokens are whitespace-trimmed and
/// empty tokens are ignored.
///
/// # Example
/// ```
/// use threadvisor::SuppressionList;
///
/// let list = SuppressionList::parse(" client ,Server,,");
/// assert!(list.contains("CLIENT"));
/// assert!(list.contains("server"));
/// assert!(!list.contains("LOGGER"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SuppressionList {
    labels: Vec<String>,
}

impl SuppressionList {
    /// Parses a comma-separated list.
    pub fn parse(list: &str) -> Self {
        let labels = list
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        Self { labels }
    }

    /// `true` if `label` is suppressed (case-insensitive).
    pub fn contains(&self, label: &str) -> bool {
        let label = label.trim();
        self.labels.iter().any(|l| l.eq_ignore_ascii_case(label))
    }

    /// `true` if nothing is suppressed.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_documented_values() {
        let s = Settings::default();
        let client = &s.network.client;
        assert_eq!(client.backoff_max(), Duration::from_secs(32));
        assert_eq!(client.retry_limit(), Some(10));
        assert_eq!(client.thread_wait_timeout(), Duration::from_millis(5000));
        assert_eq!(client.connection_timeout(), Duration::from_secs(5));
        assert_eq!(s.runtime.ready_timeout(), Duration::from_millis(5000));
        assert_eq!(s.runtime.reconnect_delay(), Duration::from_millis(1000));
        assert!(s.debug.suppress_client_send_data);
        assert!(s.debug.suppression().is_empty());
    }

    #[test]
    fn test_role_endpoints_default_independently() {
        let s: Settings = toml::from_str(
            r#"
            [network.server]
            is_tcp = false
            "#,
        )
        .expect("valid toml");
        let client = s.network.client_endpoint();
        let server = s.network.server_endpoint();
        assert_eq!(client.host, "127.0.0.2");
        assert_eq!(client.port, 4200);
        assert!(client.is_tcp);
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 4150);
        assert!(!server.is_tcp);
    }

    #[test]
    fn test_retry_limit_zero_or_negative_disables() {
        for raw in [0, -1, -100] {
            let link = LinkSettings {
                retry_limit: raw,
                ..LinkSettings::default()
            };
            assert_eq!(link.retry_limit(), None, "retry_limit={raw}");
        }
    }

    #[test]
    fn test_zero_backoff_ceiling_keeps_first_step() {
        let link = LinkSettings {
            backoff_max_seconds: 0,
            ..LinkSettings::default()
        };
        assert_eq!(link.backoff_max(), Duration::from_secs(1));
    }

    #[test]
    fn test_suppression_trims_and_ignores_case() {
        let list = SuppressionList::parse(" client , command_interface ");
        assert!(list.contains("CLIENT"));
        assert!(list.contains("Client"));
        assert!(list.contains("COMMAND_INTERFACE"));
        assert!(!list.contains("CLIENT.SEND"));
        assert!(!list.contains("SERVER"));
    }

    #[test]
    fn test_suppression_empty_tokens() {
        let list = SuppressionList::parse(" , ,");
        assert!(list.is_empty());
        assert!(!list.contains(""));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            file,
            r#"
            [network.client]
            server_hostname = "10.0.0.7"
            port = 9000
            backoff_max_seconds = 8
            retry_limit = 3

            [debug]
            suppress_threads = "server"
            "#
        )
        .expect("write");

        let s = Settings::load(file.path()).expect("load");
        let ep = s.network.client_endpoint();
        assert_eq!(ep.host, "10.0.0.7");
        assert_eq!(ep.port, 9000);
        assert_eq!(s.network.client.backoff_max(), Duration::from_secs(8));
        assert_eq!(s.network.client.retry_limit(), Some(3));
        assert!(s.debug.suppression().contains("SERVER"));
        // untouched keys keep defaults
        assert_eq!(s.network.client.connection_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_load_reports_parse_and_read_errors() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "[network.client]\nport = \"not a number\"").expect("write");
        let err = Settings::load(file.path()).expect_err("must fail");
        assert_eq!(err.as_label(), "config_parse");

        let err = Settings::load("/definitely/not/here.toml").expect_err("must fail");
        assert_eq!(err.as_label(), "config_read");
    }
}
