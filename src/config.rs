//! Client configuration.
//!
//! All configs deserialize with every field optional, so a host application can embed
//! them in its own config file and only spell out what differs from the defaults.
//! Durations are written in milliseconds (`connect_timeout_ms`, `delay_ms`, ...).
//!
//! ```rust
//! use aerofly_reader::ClientConfig;
//! use std::time::Duration;
//!
//! let config = ClientConfig::default()
//!     .with_host("192.168.1.20")
//!     .with_timeout(Duration::from_secs(2))
//!     .without_reconnect();
//!
//! assert_eq!(config.address(), "192.168.1.20:12345");
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::decoder::DEFAULT_MAX_FRAME_LEN;
use crate::reconnect::ReconnectConfig;
use crate::{Result, TelemetryError};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_TCP_PORT: u16 = 12345;
pub const DEFAULT_COMMAND_PORT: u16 = 12346;
pub const DEFAULT_MAPPING_NAME: &str = "AeroflyReaderData";

pub const ENV_HOST: &str = "AEROFLY_READER_HOST";
pub const ENV_TCP_PORT: &str = "AEROFLY_READER_TCP_PORT";
pub const ENV_TIMEOUT_MS: &str = "AEROFLY_READER_TIMEOUT_MS";
pub const ENV_RECONNECT_DELAY_MS: &str = "AEROFLY_READER_RECONNECT_DELAY_MS";
pub const ENV_MAX_RECONNECTS: &str = "AEROFLY_READER_MAX_RECONNECTS";

/// Settings for [`TelemetryClient`](crate::TelemetryClient) and
/// [`AsyncTelemetryClient`](crate::AsyncTelemetryClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    #[serde(rename = "connect_timeout_ms", with = "duration_ms")]
    pub connect_timeout: Duration,
    /// How long a single `read()` waits for bytes before returning a timeout.
    #[serde(rename = "read_timeout_ms", with = "duration_ms")]
    pub read_timeout: Duration,
    pub reconnect: ReconnectConfig,
    pub max_frame_len: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_TCP_PORT,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
            reconnect: ReconnectConfig::default(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port, ..Self::default() }
    }

    /// Defaults with `AEROFLY_READER_*` environment overrides applied.
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup, using the environment variable names.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_HOST) {
            let host = host.trim();
            if host.is_empty() {
                return Err(TelemetryError::config_error(ENV_HOST, "host must not be empty"));
            }
            self.host = host.to_string();
        }
        if let Some(port) = parse_var(&lookup, ENV_TCP_PORT)? {
            self.port = port;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, ENV_TIMEOUT_MS)? {
            self.connect_timeout = Duration::from_millis(ms);
            self.read_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&lookup, ENV_RECONNECT_DELAY_MS)? {
            self.reconnect.delay = Duration::from_millis(ms);
        }
        if let Some(max) = parse_var(&lookup, ENV_MAX_RECONNECTS)? {
            self.reconnect.max_attempts = max;
        }

        debug!(host = %self.host, port = self.port, "Resolved client config");
        Ok(self)
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Connect timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn without_reconnect(mut self) -> Self {
        self.reconnect.enabled = false;
        self
    }

    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// `host:port`, ready for address resolution.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Settings for [`CommandSender`](crate::CommandSender).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub host: String,
    pub port: u16,
    #[serde(rename = "timeout_ms", with = "duration_ms")]
    pub timeout: Duration,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self { host: DEFAULT_HOST.to_string(), port: DEFAULT_COMMAND_PORT, timeout: Duration::from_secs(2) }
    }
}

impl CommandConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port, ..Self::default() }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Settings for [`SharedMemoryReader`](crate::SharedMemoryReader) and the polling feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedMemoryConfig {
    pub mapping_name: String,
    /// Poll spacing used by the shared memory feed.
    #[serde(rename = "poll_interval_ms", with = "duration_ms")]
    pub poll_interval: Duration,
}

impl Default for SharedMemoryConfig {
    fn default() -> Self {
        Self { mapping_name: DEFAULT_MAPPING_NAME.to_string(), poll_interval: Duration::from_millis(20) }
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| TelemetryError::config_error(key, format!("{raw:?}: {e}"))),
    }
}

/// Serde adapter storing a [`Duration`] as whole milliseconds.
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
