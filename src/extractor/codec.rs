//! Delimiter-framed JSON codec
//!
//! The producer writes each document as serialized JSON followed by a fixed
//! delimiter sequence. There is no length prefix, so the decoder accumulates
//! incoming chunks in a buffer and slices a frame off the front whenever the
//! delimiter is found. This is the memory-efficient way to move an unbounded
//! document stream across the process boundary:
//!
//! ```text
//! {...json1...}\n---\n{...json2...}\n---\n{...json3...}\n---\n
//! ```
//!
//! Chunk boundaries are arbitrary: a frame, or the delimiter itself, may be
//! split across any number of chunks. Whitespace-only frames (produced by
//! consecutive delimiters, e.g. a terminating flush) are skipped silently.
//! Anything else that fails to parse as JSON is protocol corruption and
//! aborts the run; a corrupted frame stream cannot be resynchronized.
//!
//! Decoded documents are handed to a sink one at a time, so every document
//! that precedes a corrupt frame reaches the sink before the error
//! propagates, regardless of how the bytes were chunked.

use crate::domain::{Result, StrataError};
use serde_json::Value;

/// Default frame delimiter, improbable inside serialized JSON.
///
/// Communicated to the producer through the `JSON_STREAM_DELIMITER`
/// environment variable, so the two sides agree without sharing a compiled
/// constant.
pub const DEFAULT_DELIMITER: &str = "\n---\n";

/// Encode one document as a frame: serialized JSON plus the delimiter.
pub fn encode_frame(document: &Value, delimiter: &[u8]) -> Result<Vec<u8>> {
    let mut frame = serde_json::to_vec(document)?;
    frame.extend_from_slice(delimiter);
    Ok(frame)
}

/// Incremental decoder for a delimiter-framed JSON stream
///
/// The decoder exclusively owns its buffer for the duration of one run.
/// Feed it chunks with [`decode_chunk`](JsonDecoder::decode_chunk) as they
/// arrive and call [`finalize`](JsonDecoder::finalize) exactly once at
/// end-of-stream to flush a possibly unterminated last frame.
pub struct JsonDecoder {
    delimiter: Vec<u8>,
    buffer: Vec<u8>,
    // Position from which the next delimiter search starts. Avoids
    // rescanning the whole buffer when a frame spans many chunks.
    scan_from: usize,
}

impl JsonDecoder {
    pub fn new(delimiter: impl Into<Vec<u8>>) -> Self {
        let delimiter = delimiter.into();
        assert!(!delimiter.is_empty(), "frame delimiter cannot be empty");
        Self {
            delimiter,
            buffer: Vec::new(),
            scan_from: 0,
        }
    }

    /// Append a chunk and hand every complete frame it makes available to
    /// `sink`, in stream order. The residual bytes of an incomplete
    /// trailing frame stay buffered for the next chunk.
    ///
    /// # Errors
    ///
    /// Returns a decode error when a non-blank frame is not valid JSON, or
    /// the sink's own error. Documents decoded ahead of the failure have
    /// already been delivered to the sink at that point.
    pub fn decode_chunk<F>(&mut self, chunk: &[u8], sink: &mut F) -> Result<()>
    where
        F: FnMut(Value) -> Result<()>,
    {
        self.buffer.extend_from_slice(chunk);

        while let Some(at) = self.find_delimiter() {
            let frame: Vec<u8> = self.buffer.drain(..at + self.delimiter.len()).collect();
            let frame = &frame[..at];
            self.scan_from = 0;

            if let Some(document) = Self::parse_frame(frame)? {
                sink(document)?;
            }
        }

        // A delimiter prefix may be sitting at the end of the buffer.
        self.scan_from = self
            .buffer
            .len()
            .saturating_sub(self.delimiter.len() - 1)
            .max(self.scan_from);

        Ok(())
    }

    /// Flush the decoder at end-of-stream.
    ///
    /// Equivalent to receiving one trailing delimiter: a last frame that the
    /// producer did not terminate (or terminated bytes short of a full
    /// delimiter) is still decoded. Consumes the decoder so it cannot be
    /// flushed twice.
    ///
    /// # Errors
    ///
    /// Returns a decode error when the residual content is not valid JSON.
    pub fn finalize<F>(mut self, sink: &mut F) -> Result<()>
    where
        F: FnMut(Value) -> Result<()>,
    {
        let delimiter = self.delimiter.clone();
        self.decode_chunk(&delimiter, sink)
    }

    /// Number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn find_delimiter(&self) -> Option<usize> {
        let d = &self.delimiter;
        if self.buffer.len() < d.len() {
            return None;
        }
        self.buffer[self.scan_from..]
            .windows(d.len())
            .position(|w| w == d.as_slice())
            .map(|p| p + self.scan_from)
    }

    fn parse_frame(frame: &[u8]) -> Result<Option<Value>> {
        if frame.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(None);
        }
        serde_json::from_slice(frame).map(Some).map_err(|e| {
            StrataError::Decode(format!(
                "Invalid JSON document on the data channel: {e} (frame: {})",
                String::from_utf8_lossy(&frame[..frame.len().min(256)])
            ))
        })
    }
}
