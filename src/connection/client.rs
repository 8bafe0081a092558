//! Blocking TCP client.

use std::io::{ErrorKind, Read};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use tracing::{debug, error, info, warn};

use super::{ErrorAction, ReadFailure, StreamControl, StreamOptions, read_timeout};
use crate::config::ClientConfig;
use crate::decoder::FrameDecoder;
use crate::reconnect::{ReconnectDecision, ReconnectPolicy};
use crate::types::{ConnectionState, FlightSnapshot};
use crate::{Result, TelemetryError};

const READ_CHUNK: usize = 8192;

/// Synchronous client for the telemetry stream.
///
/// Owns one socket and one decode buffer. Every I/O method takes `&mut self`; share a
/// client between threads by moving it, not by reference.
///
/// ```rust,no_run
/// use aerofly_reader::{ClientConfig, TelemetryClient};
///
/// # fn main() -> aerofly_reader::Result<()> {
/// let mut client = TelemetryClient::new(ClientConfig::default());
/// for snapshot in client.stream().max_frames(100) {
///     let snapshot = snapshot?;
///     println!("{:.0} ft, {:.0} kts", snapshot.altitude_ft(), snapshot.indicated_airspeed_kts());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TelemetryClient {
    config: ClientConfig,
    stream: Option<TcpStream>,
    decoder: FrameDecoder,
    policy: ReconnectPolicy,
    state: ConnectionState,
    read_buf: Vec<u8>,
}

impl TelemetryClient {
    pub fn new(config: ClientConfig) -> Self {
        let decoder = FrameDecoder::with_max_frame_len(config.max_frame_len);
        let policy = ReconnectPolicy::new(config.reconnect.clone());
        Self {
            config,
            stream: None,
            decoder,
            policy,
            state: ConnectionState::Disconnected,
            read_buf: vec![0; READ_CHUNK],
        }
    }

    /// Open the connection. A no-op when already connected.
    ///
    /// Never retries on its own: a refused or timed out connect returns
    /// [`TelemetryError::Connection`] and leaves the client disconnected.
    pub fn connect(&mut self) -> Result<()> {
        if self.state == ConnectionState::Connected {
            return Ok(());
        }

        self.close_socket();
        self.state = ConnectionState::Connecting;
        info!(host = %self.config.host, port = self.config.port, "Connecting to AeroflyReader");

        match open_stream(&self.config) {
            Ok(stream) => {
                self.stream = Some(stream);
                self.state = ConnectionState::Connected;
                self.policy.on_success();
                info!(host = %self.config.host, port = self.config.port, "Connected");
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                warn!(error = %e, "Connect failed");
                Err(e)
            }
        }
    }

    /// Read the next snapshot.
    ///
    /// Reconnects transparently according to the reconnect policy when the
    /// connection drops. Once the policy gives up the client is `Failed` and every
    /// further call returns [`TelemetryError::Disconnected`] until `connect()`.
    pub fn read(&mut self) -> Result<FlightSnapshot> {
        match self.state {
            ConnectionState::Connected | ConnectionState::Reconnecting => {}
            ConnectionState::Failed => {
                return Err(TelemetryError::disconnected(
                    "reconnect attempts exhausted",
                    self.policy.attempt_count(),
                ));
            }
            ConnectionState::Disconnected | ConnectionState::Connecting => {
                return Err(TelemetryError::NotConnected { operation: "read" });
            }
        }

        loop {
            if let Some(result) = self.decoder.next_frame() {
                let snapshot = result.and_then(|frame| frame.to_snapshot())?;
                self.policy.on_success();
                debug!(update_counter = snapshot.update_counter, "Snapshot received");
                return Ok(snapshot);
            }

            match self.fill() {
                Ok(()) => {}
                Err(ReadFailure::Timeout) => {
                    return Err(TelemetryError::Timeout { duration: self.config.read_timeout });
                }
                Err(ReadFailure::Lost(reason)) => self.recover(reason)?,
            }
        }
    }

    /// Connect if needed, read one snapshot, and restore the previous connection state.
    pub fn read_one(&mut self) -> Result<FlightSnapshot> {
        let was_connected = self.state == ConnectionState::Connected;
        if !was_connected {
            self.connect()?;
        }

        let result = self.read();

        if !was_connected {
            self.disconnect();
        }
        result
    }

    /// Iterate snapshots, connecting on the first pull.
    pub fn stream(&mut self) -> Snapshots<'_> {
        Snapshots { client: self, options: StreamOptions::new() }
    }

    /// Close the socket and drop buffered bytes. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        if self.stream.is_some() {
            info!(host = %self.config.host, port = self.config.port, "Disconnecting");
        }
        self.close_socket();
        self.state = ConnectionState::Disconnected;
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Consecutive failed reconnect attempts since the last good frame.
    pub fn reconnect_attempts(&self) -> u32 {
        self.policy.attempt_count()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn fill(&mut self) -> std::result::Result<(), ReadFailure> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(ReadFailure::Lost("socket missing".to_string()));
        };

        loop {
            match stream.read(&mut self.read_buf) {
                Ok(0) => return Err(ReadFailure::Lost("connection closed by peer".to_string())),
                Ok(n) => {
                    self.decoder.extend(&self.read_buf[..n]);
                    return Ok(());
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(ReadFailure::Timeout);
                }
                Err(e) => return Err(ReadFailure::Lost(e.to_string())),
            }
        }
    }

    /// Drive the reconnect policy until a new socket is open or the policy gives up.
    fn recover(&mut self, mut reason: String) -> Result<()> {
        self.close_socket();
        self.state = ConnectionState::Reconnecting;
        warn!(reason = %reason, "Connection lost");

        loop {
            match self.policy.on_failure() {
                ReconnectDecision::GiveUp { attempts } => {
                    self.state = ConnectionState::Failed;
                    error!(attempts, reason = %reason, "Giving up on AeroflyReader connection");
                    return Err(TelemetryError::disconnected(reason, attempts));
                }
                ReconnectDecision::Retry { after, attempt } => {
                    info!(attempt, delay = ?after, "Reconnecting");
                    std::thread::sleep(after);

                    match open_stream(&self.config) {
                        Ok(stream) => {
                            self.stream = Some(stream);
                            self.state = ConnectionState::Connected;
                            info!(attempt, "Reconnected");
                            return Ok(());
                        }
                        Err(e) => {
                            warn!(attempt, error = %e, "Reconnect attempt failed");
                            reason = e.to_string();
                        }
                    }
                }
            }
        }
    }

    fn close_socket(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.decoder.clear();
    }
}

impl Drop for TelemetryClient {
    fn drop(&mut self) {
        self.close_socket();
    }
}

/// Resolve the configured address and try each candidate in turn.
fn open_stream(config: &ClientConfig) -> Result<TcpStream> {
    let address = config.address();
    let candidates = address.to_socket_addrs().map_err(|e| {
        TelemetryError::connection_failed_with_source(format!("cannot resolve {address}"), e)
    })?;

    let mut last_error = None;
    for candidate in candidates {
        match TcpStream::connect_timeout(&candidate, config.connect_timeout) {
            Ok(stream) => {
                stream
                    .set_read_timeout(Some(read_timeout(config)))
                    .map_err(|e| TelemetryError::connection_failed_with_source("set_read_timeout", e))?;
                let _ = stream.set_nodelay(true);
                return Ok(stream);
            }
            Err(e) => {
                debug!(%candidate, error = %e, "Connect candidate failed");
                last_error = Some(e);
            }
        }
    }

    Err(match last_error {
        Some(e) => TelemetryError::connection_failed_with_source(format!("cannot connect to {address}"), e),
        None => TelemetryError::connection_failed(format!("{address} resolved to no addresses")),
    })
}

/// Blocking snapshot iterator returned by [`TelemetryClient::stream`].
///
/// Without an error handler, a lost connection or timeout is yielded once and ends
/// the iteration, while undecodable frames are skipped with a warning.
pub struct Snapshots<'a> {
    client: &'a mut TelemetryClient,
    options: StreamOptions<Box<dyn FnMut(&TelemetryError) -> StreamControl + 'a>>,
}

impl<'a> Snapshots<'a> {
    /// Stop after `n` snapshots.
    pub fn max_frames(mut self, n: usize) -> Self {
        self.options.set_max_frames(n);
        self
    }

    /// Decide per error whether to continue (skip or reconnect) or stop.
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&TelemetryError) -> StreamControl + 'a,
    {
        self.options.set_handler(Box::new(handler));
        self
    }
}

impl Iterator for Snapshots<'_> {
    type Item = Result<FlightSnapshot>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.options.is_finished() {
                return None;
            }

            if !self.client.state().is_active() {
                if let Err(e) = self.client.connect() {
                    return Some(Err(self.options.finish(e)));
                }
            }

            let error = match self.client.read() {
                Ok(snapshot) => {
                    self.options.record_frame();
                    return Some(Ok(snapshot));
                }
                Err(e) => e,
            };

            match self.options.decide(error) {
                ErrorAction::Skip => {}
                ErrorAction::Reconnect => {
                    if let Err(e) = self.client.connect() {
                        return Some(Err(self.options.finish(e)));
                    }
                }
                ErrorAction::End(e) => return Some(Err(e)),
            }
        }
    }
}
