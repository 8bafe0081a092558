//! Error types for telemetry access.
//!
//! Every fallible operation in this crate returns [`TelemetryError`]. The variants map
//! one-to-one onto the failure classes a consumer has to tell apart:
//!
//! - **Connection**: the initial TCP connection could not be established
//! - **Disconnected**: an established connection was lost and the reconnect policy gave up
//! - **Timeout**: no bytes arrived within the configured window (the connection stays open)
//! - **Data**: one frame could not be decoded (never fatal to the connection)
//! - **SharedMemory**: the memory mapping could not be opened or read consistently
//! - **NotConnected**: an operation was attempted before `connect()`
//! - **Config**: a configuration value could not be parsed
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use aerofly_reader::TelemetryError;
//!
//! let error = TelemetryError::connection_failed("connection refused at localhost:12345");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```
//!
//! Consuming applications are expected to catch [`TelemetryError::Disconnected`] and
//! [`TelemetryError::SharedMemory`] at the top level and present a "reconnecting" or
//! "unavailable" state instead of exiting.

use std::time::Duration;
use thiserror::Error;

#[cfg(windows)]
use windows_core as core;

/// Result type alias for telemetry operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Main error type for telemetry operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("Failed to connect to AeroflyReader: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Connection lost after {attempts} reconnect attempt(s): {reason}")]
    Disconnected { reason: String, attempts: u32 },

    #[error("No data received within {duration:?}")]
    Timeout { duration: Duration },

    #[error("Invalid telemetry data in {context}: {details}")]
    Data { context: String, details: String },

    #[error("Shared memory error: {reason}")]
    SharedMemory {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Not connected: call connect() before {operation}()")]
    NotConnected { operation: &'static str },

    #[error("Invalid configuration value for {key}: {details}")]
    Config { key: String, details: String },
}

impl TelemetryError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TelemetryError::Connection { .. } => true,
            TelemetryError::Timeout { .. } => true,
            TelemetryError::Data { .. } => true,
            TelemetryError::SharedMemory { .. } => true,
            TelemetryError::Disconnected { .. } => false,
            TelemetryError::NotConnected { .. } => false,
            TelemetryError::Config { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TelemetryError::Connection { .. } => vec![
                "Ensure Aerofly FS 4 is running",
                "Check that AeroflyReader.dll is installed and loaded",
                "Verify the host and port match the DLL configuration",
            ],
            TelemetryError::Disconnected { .. } => vec![
                "Check whether the simulator was closed or crashed",
                "Call connect() again once the simulator is back",
                "Increase max_attempts or the reconnect delay",
            ],
            TelemetryError::Timeout { .. } => vec![
                "Call read() again, the connection is still open",
                "Increase the read timeout",
                "Check that a flight is loaded and not paused",
            ],
            TelemetryError::Data { .. } => vec![
                "Skip the frame and read the next one",
                "Verify the DLL and client schema versions match",
            ],
            TelemetryError::SharedMemory { .. } => vec![
                "Ensure Aerofly FS 4 is running with AeroflyReader.dll loaded",
                "Shared memory is only available on Windows, use the TCP client elsewhere",
                "Retry the read, the writer may have been mid-update",
            ],
            TelemetryError::NotConnected { .. } => vec![
                "Call connect() before reading",
                "Use read_one() for a one-shot read",
            ],
            TelemetryError::Config { .. } => vec![
                "Check the environment variable or config file value",
                "Remove the override to fall back to the default",
            ],
        }
    }

    /// True for [`TelemetryError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, TelemetryError::Timeout { .. })
    }

    /// True for [`TelemetryError::Data`].
    pub fn is_data(&self) -> bool {
        matches!(self, TelemetryError::Data { .. })
    }

    /// True for [`TelemetryError::Disconnected`].
    pub fn is_disconnected(&self) -> bool {
        matches!(self, TelemetryError::Disconnected { .. })
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        TelemetryError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        TelemetryError::Connection { reason: reason.into(), source: Some(Box::new(source)) }
    }

    /// Helper constructor for a lost connection.
    pub fn disconnected(reason: impl Into<String>, attempts: u32) -> Self {
        TelemetryError::Disconnected { reason: reason.into(), attempts }
    }

    /// Helper constructor for frame-level decode errors.
    pub fn data_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        TelemetryError::Data { context: context.into(), details: details.into() }
    }

    /// Helper constructor for shared memory errors.
    pub fn shared_memory(reason: impl Into<String>) -> Self {
        TelemetryError::SharedMemory { reason: reason.into(), source: None }
    }

    /// Helper constructor for Windows API failures while opening the mapping.
    #[cfg(windows)]
    pub fn shared_memory_api_error(operation: impl Into<String>, source: core::Error) -> Self {
        TelemetryError::SharedMemory {
            reason: format!("{} failed", operation.into()),
            source: Some(Box::new(source)),
        }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(key: impl Into<String>, details: impl Into<String>) -> Self {
        TelemetryError::Config { key: key.into(), details: details.into() }
    }
}

impl From<serde_json::Error> for TelemetryError {
    fn from(err: serde_json::Error) -> Self {
        TelemetryError::Data { context: "JSON frame".to_string(), details: err.to_string() }
    }
}
