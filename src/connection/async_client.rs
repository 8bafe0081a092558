//! Tokio TCP client.
//!
//! Same contract as [`TelemetryClient`](crate::TelemetryClient) with `.await` at every
//! I/O point. While a `connect`/`read` future is in flight the client holds its socket
//! and buffer on the future's stack; dropping the future closes the socket and leaves
//! the client `Disconnected` with an empty buffer. Nothing is spawned, so no reconnect
//! loop outlives a cancelled call.

use futures::stream::{BoxStream, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tracing::{debug, error, info, warn};

use super::{ErrorAction, ReadFailure, StreamControl, StreamOptions, read_timeout};
use crate::config::ClientConfig;
use crate::decoder::FrameDecoder;
use crate::reconnect::{ReconnectDecision, ReconnectPolicy};
use crate::types::{ConnectionState, FlightSnapshot};
use crate::{Result, TelemetryError};

const READ_CHUNK: usize = 8192;

/// Asynchronous client for the telemetry stream.
///
/// ```rust,no_run
/// use aerofly_reader::{AsyncTelemetryClient, ClientConfig};
/// use futures::StreamExt;
///
/// # async fn run() -> aerofly_reader::Result<()> {
/// let mut client = AsyncTelemetryClient::new(ClientConfig::default());
/// let mut snapshots = client.stream().max_frames(10);
/// while let Some(snapshot) = snapshots.next().await {
///     println!("{}", snapshot?.aircraft_name());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct AsyncTelemetryClient {
    config: ClientConfig,
    stream: Option<TcpStream>,
    decoder: FrameDecoder,
    policy: ReconnectPolicy,
    state: ConnectionState,
    read_buf: Vec<u8>,
}

impl AsyncTelemetryClient {
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
    pub async fn connect(&mut self) -> Result<()> {
        if self.state == ConnectionState::Connected {
            return Ok(());
        }

        self.stream = None;
        self.decoder.clear();
        // stays Disconnected if this future is dropped mid-connect
        self.state = ConnectionState::Disconnected;
        info!(host = %self.config.host, port = self.config.port, "Connecting to AeroflyReader");

        let stream = open_stream(&self.config).await.inspect_err(|e| {
            warn!(error = %e, "Connect failed");
        })?;

        self.stream = Some(stream);
        self.state = ConnectionState::Connected;
        self.policy.on_success();
        info!(host = %self.config.host, port = self.config.port, "Connected");
        Ok(())
    }

    /// Read the next snapshot, reconnecting per the policy when the connection drops.
    pub async fn read(&mut self) -> Result<FlightSnapshot> {
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

        let Some(mut stream) = self.stream.take() else {
            self.state = ConnectionState::Disconnected;
            return Err(TelemetryError::NotConnected { operation: "read" });
        };
        let fresh = FrameDecoder::with_max_frame_len(self.config.max_frame_len);
        let mut decoder = std::mem::replace(&mut self.decoder, fresh);
        // socket and buffer live in this future until it completes
        self.state = ConnectionState::Disconnected;

        loop {
            if let Some(result) = decoder.next_frame() {
                self.restore(stream, decoder);
                let snapshot = result.and_then(|frame| frame.to_snapshot())?;
                self.policy.on_success();
                debug!(update_counter = snapshot.update_counter, "Snapshot received");
                return Ok(snapshot);
            }

            match fill(&mut stream, &mut decoder, &mut self.read_buf, &self.config).await {
                Ok(()) => {}
                Err(ReadFailure::Timeout) => {
                    self.restore(stream, decoder);
                    return Err(TelemetryError::Timeout { duration: self.config.read_timeout });
                }
                Err(ReadFailure::Lost(reason)) => {
                    drop(stream);
                    decoder.clear();
                    stream = self.recover(reason).await?;
                }
            }
        }
    }

    /// Connect if needed, read one snapshot, and restore the previous connection state.
    pub async fn read_one(&mut self) -> Result<FlightSnapshot> {
        let was_connected = self.state == ConnectionState::Connected;
        if !was_connected {
            self.connect().await?;
        }

        let result = self.read().await;

        if !was_connected {
            self.disconnect().await;
        }
        result
    }

    /// Snapshot stream, connecting on the first poll.
    ///
    /// Not rewindable: each call builds a fresh stream over the same connection.
    pub fn stream(&mut self) -> AsyncSnapshots<'_> {
        AsyncSnapshots { pending: Some((self, StreamOptions::new())), inner: None }
    }

    /// Close the socket and drop buffered bytes. Safe to call repeatedly.
    pub async fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            info!(host = %self.config.host, port = self.config.port, "Disconnecting");
            drop(stream);
        }
        self.decoder.clear();
        self.state = ConnectionState::Disconnected;
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.policy.attempt_count()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn restore(&mut self, stream: TcpStream, decoder: FrameDecoder) {
        self.stream = Some(stream);
        self.decoder = decoder;
        self.state = ConnectionState::Connected;
    }

    async fn recover(&mut self, mut reason: String) -> Result<TcpStream> {
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
                    tokio::time::sleep(after).await;

                    match open_stream(&self.config).await {
                        Ok(stream) => {
                            info!(attempt, "Reconnected");
                            return Ok(stream);
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
}

async fn fill(
    stream: &mut TcpStream,
    decoder: &mut FrameDecoder,
    buf: &mut [u8],
    config: &ClientConfig,
) -> std::result::Result<(), ReadFailure> {
    loop {
        match tokio::time::timeout(read_timeout(config), stream.read(buf)).await {
            Err(_) => return Err(ReadFailure::Timeout),
            Ok(Ok(0)) => return Err(ReadFailure::Lost("connection closed by peer".to_string())),
            Ok(Ok(n)) => {
                decoder.extend(&buf[..n]);
                return Ok(());
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Ok(Err(e)) => return Err(ReadFailure::Lost(e.to_string())),
        }
    }
}

async fn open_stream(config: &ClientConfig) -> Result<TcpStream> {
    let address = config.address();
    let candidates = tokio::net::lookup_host(&address).await.map_err(|e| {
        TelemetryError::connection_failed_with_source(format!("cannot resolve {address}"), e)
    })?;

    let mut last_error = None;
    for candidate in candidates {
        match tokio::time::timeout(config.connect_timeout, TcpStream::connect(candidate)).await {
            Ok(Ok(stream)) => {
                let _ = stream.set_nodelay(true);
                return Ok(stream);
            }
            Ok(Err(e)) => {
                debug!(%candidate, error = %e, "Connect candidate failed");
                last_error = Some(TelemetryError::connection_failed_with_source(
                    format!("cannot connect to {address}"),
                    e,
                ));
            }
            Err(_) => {
                debug!(%candidate, "Connect candidate timed out");
                last_error = Some(TelemetryError::connection_failed(format!(
                    "connect to {address} timed out after {:?}",
                    config.connect_timeout
                )));
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        TelemetryError::connection_failed(format!("{address} resolved to no addresses"))
    }))
}

type ErrorHandler<'a> = Box<dyn FnMut(&TelemetryError) -> StreamControl + Send + 'a>;

struct Pull<'a> {
    client: &'a mut AsyncTelemetryClient,
    options: StreamOptions<ErrorHandler<'a>>,
}

impl Pull<'_> {
    async fn next(&mut self) -> Option<Result<FlightSnapshot>> {
        loop {
            if self.options.is_finished() {
                return None;
            }

            if !self.client.state().is_active() {
                if let Err(e) = self.client.connect().await {
                    return Some(Err(self.options.finish(e)));
                }
            }

            let error = match self.client.read().await {
                Ok(snapshot) => {
                    self.options.record_frame();
                    return Some(Ok(snapshot));
                }
                Err(e) => e,
            };

            match self.options.decide(error) {
                ErrorAction::Skip => {}
                ErrorAction::Reconnect => {
                    if let Err(e) = self.client.connect().await {
                        return Some(Err(self.options.finish(e)));
                    }
                }
                ErrorAction::End(e) => return Some(Err(e)),
            }
        }
    }
}

/// Snapshot stream returned by [`AsyncTelemetryClient::stream`].
///
/// Configure with [`max_frames`](Self::max_frames) and [`on_error`](Self::on_error)
/// before the first poll.
pub struct AsyncSnapshots<'a> {
    pending: Option<(&'a mut AsyncTelemetryClient, StreamOptions<ErrorHandler<'a>>)>,
    inner: Option<BoxStream<'a, Result<FlightSnapshot>>>,
}

impl<'a> AsyncSnapshots<'a> {
    /// Stop after `n` snapshots.
    pub fn max_frames(mut self, n: usize) -> Self {
        if let Some((_, options)) = self.pending.as_mut() {
            options.set_max_frames(n);
        }
        self
    }

    /// Decide per error whether to continue (skip or reconnect) or stop.
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&TelemetryError) -> StreamControl + Send + 'a,
    {
        if let Some((_, options)) = self.pending.as_mut() {
            options.set_handler(Box::new(handler));
        }
        self
    }
}

impl Stream for AsyncSnapshots<'_> {
    type Item = Result<FlightSnapshot>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.inner.is_none() {
            if let Some((client, options)) = this.pending.take() {
                let pull = Pull { client, options };
                let stream = futures::stream::unfold(pull, |mut pull| async move {
                    let item = pull.next().await?;
                    Some((item, pull))
                });
                this.inner = Some(stream.boxed());
            }
        }

        match this.inner.as_mut() {
            Some(inner) => inner.poll_next_unpin(cx),
            None => Poll::Ready(None),
        }
    }
}
