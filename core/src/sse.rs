//! Server-Sent Events decoding.
//!
//! # Design
//! Decoding is split into two single-owner pieces that live for exactly one
//! streaming call:
//!
//! - `LineBuffer` turns arbitrarily chunked bytes into complete lines. It
//!   treats `\r\n`, `\r` and `\n` as the same terminator and carries the
//!   unterminated tail over to the next chunk. A `\r` that ends a chunk is
//!   remembered so a `\n` opening the next chunk is not read as a blank line.
//! - `EventDecoder` turns lines into events. Field lines accumulate into a
//!   pending event; a blank line flushes it.
//!
//! `EventStream` wires both to a blocking `Read` and only pulls the next
//! chunk once every line of the previous one has been handed out, so a slow
//! consumer throttles the network read.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use serde_json::Value;
use tracing::trace;

use crate::error::ApiError;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// One fully received event.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    /// The joined `data:` lines parsed as JSON.
    pub data: Value,
    /// The `event:` name, if one was given and non-empty.
    pub event: Option<String>,
    pub id: Option<String>,
    /// Reconnection delay from `retry:`, in milliseconds.
    pub retry: Option<u64>,
}

#[derive(Debug, Default)]
struct PendingEvent {
    event: String,
    data: Vec<String>,
    id: Option<String>,
    retry: Option<u64>,
}

/// Line-at-a-time SSE state machine.
#[derive(Debug, Default)]
pub struct EventDecoder {
    pending: PendingEvent,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line without its terminator. Returns an event when `line` is
    /// blank and at least one `data:` line was seen since the last flush.
    ///
    /// A flush whose joined data is not valid JSON fails; the pending state
    /// is reset either way.
    pub fn decode(&mut self, line: &str) -> Result<Option<DecodedEvent>, ApiError> {
        if line.is_empty() {
            return self.flush();
        }
        if line.starts_with(':') {
            return Ok(None);
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.trim_start()),
            None => (line, ""),
        };
        match field {
            "event" => self.pending.event = value.to_string(),
            "data" => self.pending.data.push(value.to_string()),
            "id" => self.pending.id = Some(value.to_string()),
            // Non-numeric retry values are ignored.
            "retry" => {
                if let Ok(millis) = value.parse() {
                    self.pending.retry = Some(millis);
                }
            }
            _ => {}
        }
        Ok(None)
    }

    /// True when no field has been accumulated since the last flush.
    pub fn is_idle(&self) -> bool {
        let p = &self.pending;
        p.event.is_empty() && p.data.is_empty() && p.id.is_none() && p.retry.is_none()
    }

    fn flush(&mut self) -> Result<Option<DecodedEvent>, ApiError> {
        let pending = std::mem::take(&mut self.pending);
        if pending.data.is_empty() {
            return Ok(None);
        }

        let joined = pending.data.join("\n");
        let data = serde_json::from_str(&joined)
            .map_err(|e| ApiError::server(format!("invalid event data {joined:?}: {e}")))?;
        Ok(Some(DecodedEvent {
            data,
            event: Some(pending.event).filter(|name| !name.is_empty()),
            id: pending.id,
            retry: pending.retry,
        }))
    }
}

/// Reassembles complete lines from chunked bytes.
#[derive(Debug)]
pub struct LineBuffer {
    partial: Vec<u8>,
    after_cr: bool,
    first_line: bool,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self {
            partial: Vec::new(),
            after_cr: false,
            first_line: true,
        }
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if std::mem::take(&mut self.after_cr) && byte == b'\n' {
                continue;
            }
            match byte {
                b'\n' => lines.push(self.take_line()),
                b'\r' => {
                    lines.push(self.take_line());
                    self.after_cr = true;
                }
                _ => self.partial.push(byte),
            }
        }
        lines
    }

    /// Bytes of the unterminated line carried over to the next chunk.
    pub fn remainder(&self) -> &[u8] {
        &self.partial
    }

    /// End of input. An unterminated last line is discarded.
    pub fn finish(self) {
        if !self.partial.is_empty() {
            trace!(bytes = self.partial.len(), "discarding unterminated trailing line");
        }
    }

    fn take_line(&mut self) -> String {
        let raw = std::mem::take(&mut self.partial);
        let line = String::from_utf8_lossy(&raw).into_owned();
        if std::mem::take(&mut self.first_line) {
            if let Some(rest) = line.strip_prefix('\u{feff}') {
                return rest.to_string();
            }
        }
        line
    }
}

/// Blocking iterator of events read from an `text/event-stream` body.
///
/// Stops after the first error.
pub struct EventStream<R> {
    reader: R,
    lines: Option<LineBuffer>,
    decoder: EventDecoder,
    ready: VecDeque<String>,
    chunk: Box<[u8]>,
}

impl<R: Read> EventStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            lines: Some(LineBuffer::new()),
            decoder: EventDecoder::new(),
            ready: VecDeque::new(),
            chunk: vec![0; READ_CHUNK_SIZE].into_boxed_slice(),
        }
    }

    fn stop(&mut self) {
        self.ready.clear();
        if let Some(lines) = self.lines.take() {
            lines.finish();
        }
    }
}

impl<R: Read> Iterator for EventStream<R> {
    type Item = Result<DecodedEvent, ApiError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            while let Some(line) = self.ready.pop_front() {
                match self.decoder.decode(&line) {
                    Ok(Some(event)) => return Some(Ok(event)),
                    Ok(None) => {}
                    Err(err) => {
                        self.stop();
                        return Some(Err(err));
                    }
                }
            }

            let lines = self.lines.as_mut()?;
            match self.reader.read(&mut self.chunk) {
                Ok(0) => {
                    self.stop();
                    return None;
                }
                Ok(n) => self.ready.extend(lines.push(&self.chunk[..n])),
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => {
                    self.stop();
                    return Some(Err(ApiError::server(format!("event stream read failed: {err}"))));
                }
            }
        }
    }
}

/// Read `reader` to the end, handing each event to `on_event` before the
/// next chunk is read.
pub fn drive<R: Read>(reader: R, on_event: &mut dyn FnMut(DecodedEvent)) -> Result<(), ApiError> {
    for event in EventStream::new(reader) {
        on_event(event?);
    }
    Ok(())
}
