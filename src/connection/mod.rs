//! TCP telemetry clients and the background feed.
//!
//! - [`client::TelemetryClient`]: blocking sockets, one thread per client
//! - [`async_client::AsyncTelemetryClient`]: tokio sockets, cancel-safe reads
//! - [`feed::TelemetryFeed`]: any snapshot source driven by a background task
//!
//! Both clients share the decoder, the reconnect policy and the error handling rules
//! of `stream()`, so a consumer can switch between them without behavior changes.

pub mod async_client;
pub mod client;
pub mod feed;

#[cfg(test)]
mod tests;

use std::time::Duration;
use tracing::warn;

use crate::TelemetryError;
use crate::config::ClientConfig;

// std rejects a zero read timeout
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Per-read socket timeout, never zero so both clients wait at least a moment.
pub(crate) fn read_timeout(config: &ClientConfig) -> Duration {
    config.read_timeout.max(MIN_READ_TIMEOUT)
}

/// Answer from a `stream()` error handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamControl {
    /// Skip a bad frame, or reconnect after a lost connection or timeout.
    Continue,
    /// Yield the error and end the stream.
    Stop,
}

/// Why a socket read produced no bytes.
#[derive(Debug)]
pub(crate) enum ReadFailure {
    /// Nothing arrived within the read timeout; the socket is still open.
    Timeout,
    /// Peer closed or the socket failed.
    Lost(String),
}

/// What a snapshot stream does with an error from `read()`.
#[derive(Debug)]
pub(crate) enum ErrorAction {
    Skip,
    Reconnect,
    End(TelemetryError),
}

/// Frame limit and error handler state shared by both snapshot streams.
pub(crate) struct StreamOptions<H> {
    max_frames: Option<usize>,
    yielded: usize,
    handler: Option<H>,
    done: bool,
}

impl<H> StreamOptions<H>
where
    H: FnMut(&TelemetryError) -> StreamControl,
{
    pub(crate) fn new() -> Self {
        Self { max_frames: None, yielded: 0, handler: None, done: false }
    }

    pub(crate) fn set_max_frames(&mut self, max_frames: usize) {
        self.max_frames = Some(max_frames);
    }

    pub(crate) fn set_handler(&mut self, handler: H) {
        self.handler = Some(handler);
    }

    /// True once the stream must not pull again.
    pub(crate) fn is_finished(&mut self) -> bool {
        if matches!(self.max_frames, Some(max) if self.yielded >= max) {
            self.done = true;
        }
        self.done
    }

    pub(crate) fn record_frame(&mut self) {
        self.yielded += 1;
    }

    /// The stream yields this error and ends.
    pub(crate) fn finish(&mut self, error: TelemetryError) -> TelemetryError {
        self.done = true;
        error
    }

    pub(crate) fn decide(&mut self, error: TelemetryError) -> ErrorAction {
        let control = self.handler.as_mut().map(|handler| handler(&error));

        match (&error, control) {
            (TelemetryError::Data { .. }, None) => {
                warn!(error = %error, "Skipping undecodable frame");
                ErrorAction::Skip
            }
            (TelemetryError::Data { .. }, Some(StreamControl::Continue)) => ErrorAction::Skip,
            (
                TelemetryError::Disconnected { .. } | TelemetryError::Timeout { .. },
                Some(StreamControl::Continue),
            ) => ErrorAction::Reconnect,
            _ => ErrorAction::End(self.finish(error)),
        }
    }
}
