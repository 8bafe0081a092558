//! Fire-and-forget commands to the bridge's command port.
//!
//! Each command is one connection carrying one JSON object and a newline. The bridge
//! never answers, so a successful send only means the bytes were written.

use serde::Serialize;
use std::io::Write;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::config::CommandConfig;
use crate::{Result, TelemetryError};

#[derive(Debug, Serialize)]
struct CommandMessage<'a> {
    variable: &'a str,
    value: f64,
}

/// Sends `{"variable": ..., "value": ...}` to the command port.
#[derive(Debug, Clone, Default)]
pub struct CommandSender {
    config: CommandConfig,
}

impl CommandSender {
    pub fn new(config: CommandConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CommandConfig {
        &self.config
    }

    /// Connect, write one command, close.
    pub fn send(&self, variable: &str, value: f64) -> Result<()> {
        let line = encode(variable, value)?;
        let address = self.config.address();

        let mut stream = connect(&address, &self.config)?;
        stream
            .write_all(&line)
            .and_then(|()| stream.flush())
            .map_err(|e| TelemetryError::connection_failed_with_source(format!("write to {address}"), e))?;
        let _ = stream.shutdown(Shutdown::Both);

        debug!(variable, value, %address, "Command sent");
        Ok(())
    }

    /// Tokio version of [`send`](Self::send).
    pub async fn send_async(&self, variable: &str, value: f64) -> Result<()> {
        let line = encode(variable, value)?;
        let address = self.config.address();

        let connect = tokio::net::TcpStream::connect(address.as_str());
        let mut stream = match tokio::time::timeout(self.config.timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                warn!(%address, error = %e, "Command connect failed");
                return Err(TelemetryError::connection_failed_with_source(
                    format!("cannot connect to {address}"),
                    e,
                ));
            }
            Err(_) => {
                return Err(TelemetryError::connection_failed(format!(
                    "connect to {address} timed out after {:?}",
                    self.config.timeout
                )));
            }
        };

        let write = async {
            stream.write_all(&line).await?;
            stream.shutdown().await
        };
        match tokio::time::timeout(self.config.timeout, write).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(TelemetryError::connection_failed_with_source(format!("write to {address}"), e));
            }
            Err(_) => {
                return Err(TelemetryError::connection_failed(format!("write to {address} timed out")));
            }
        }

        debug!(variable, value, %address, "Command sent");
        Ok(())
    }
}

fn encode(variable: &str, value: f64) -> Result<Vec<u8>> {
    if !value.is_finite() {
        return Err(TelemetryError::data_error(
            "command value",
            format!("{variable} = {value} is not a finite number"),
        ));
    }

    let mut line = serde_json::to_vec(&CommandMessage { variable, value })?;
    line.push(b'\n');
    Ok(line)
}

fn connect(address: &str, config: &CommandConfig) -> Result<TcpStream> {
    let candidates = address.to_socket_addrs().map_err(|e| {
        TelemetryError::connection_failed_with_source(format!("cannot resolve {address}"), e)
    })?;

    let mut last_error = None;
    for candidate in candidates {
        match TcpStream::connect_timeout(&candidate, config.timeout) {
            Ok(stream) => {
                let _ = stream.set_write_timeout(Some(config.timeout));
                return Ok(stream);
            }
            Err(e) => last_error = Some(e),
        }
    }

    warn!(%address, "Command connect failed");
    Err(match last_error {
        Some(e) => TelemetryError::connection_failed_with_source(format!("cannot connect to {address}"), e),
        None => TelemetryError::connection_failed(format!("{address} resolved to no addresses")),
    })
}
