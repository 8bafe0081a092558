//! Newline-delimited JSON frame decoding.
//!
//! The TCP stream carries one JSON object per line. [`FrameDecoder`] buffers raw bytes
//! and only decodes UTF-8 once a full line is available, so chunk boundaries (including
//! ones that split a multi-byte character) never change the frames produced.
//!
//! ```rust
//! use aerofly_reader::FrameDecoder;
//!
//! let mut decoder = FrameDecoder::new();
//! assert!(decoder.feed(b"{\"a\":1}\n{\"b\"").len() == 1);
//! let frames = decoder.feed(b":2}\n");
//! assert_eq!(frames[0].as_ref().unwrap().get("b"), Some(&serde_json::json!(2)));
//! ```

use bytes::{Buf, BytesMut};
use serde_json::{Map, Value};
use tracing::{trace, warn};

use crate::{Result, TelemetryError};

/// Longest line accepted before the pending bytes are dropped.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// One decoded JSON object from the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    // always a Value::Object
    value: Value,
}

impl Frame {
    fn parse(segment: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(segment)
            .map_err(|e| TelemetryError::data_error("frame encoding", e.to_string()))?;

        match serde_json::from_str::<Value>(text.trim())? {
            value @ Value::Object(_) => Ok(Self { value }),
            other => Err(TelemetryError::data_error(
                "JSON frame",
                format!("expected an object, got {}", json_kind(&other)),
            )),
        }
    }

    /// Look up a top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.value.get(key)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.value.as_object().into_iter().flat_map(Map::iter)
    }

    pub fn len(&self) -> usize {
        self.value.as_object().map_or(0, Map::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Splits a byte stream into [`Frame`]s.
///
/// The only state is the buffer of bytes after the last newline. A bad line yields
/// an error for that line and leaves the buffer intact for the next one.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    max_frame_len: usize,
    // bytes already searched for a newline
    scanned: usize,
    // dropping the tail of an oversized line
    discarding: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self { buffer: BytesMut::new(), max_frame_len, scanned: 0, discarding: false }
    }

    /// Append a chunk and return every frame it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<Frame>> {
        self.extend(chunk);
        std::iter::from_fn(|| self.next_frame()).collect()
    }

    /// Append a chunk without decoding anything.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Decode the next complete line, if there is one.
    ///
    /// Blank lines are skipped. Returns `None` once only a partial line remains.
    pub fn next_frame(&mut self) -> Option<Result<Frame>> {
        loop {
            let newline = self.buffer[self.scanned..]
                .iter()
                .position(|&b| b == b'\n')
                .map(|i| self.scanned + i);

            let Some(end) = newline else {
                if self.discarding {
                    self.buffer.clear();
                    self.scanned = 0;
                } else if self.buffer.len() > self.max_frame_len {
                    return Some(Err(self.overflow()));
                } else {
                    self.scanned = self.buffer.len();
                }
                return None;
            };

            let line = self.buffer.split_to(end + 1);
            self.scanned = 0;

            if self.discarding {
                self.discarding = false;
                continue;
            }

            let segment = &line[..end];
            if segment.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            if segment.len() > self.max_frame_len {
                warn!(len = segment.len(), max = self.max_frame_len, "Dropping oversized frame");
                return Some(Err(TelemetryError::data_error(
                    "frame length",
                    format!("{} bytes exceeds limit of {}", segment.len(), self.max_frame_len),
                )));
            }

            trace!(len = segment.len(), "Decoding frame");
            return Some(Frame::parse(segment));
        }
    }

    fn overflow(&mut self) -> TelemetryError {
        let pending = self.buffer.len();
        warn!(pending, max = self.max_frame_len, "No newline within frame limit, dropping");
        self.buffer.advance(pending);
        self.scanned = 0;
        self.discarding = true;
        TelemetryError::data_error(
            "frame length",
            format!("{} bytes without a newline exceeds limit of {}", pending, self.max_frame_len),
        )
    }

    /// Drop any buffered bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
        self.discarding = false;
    }

    /// Number of buffered bytes not yet returned as a frame.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }
}
