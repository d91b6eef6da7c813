//! Incremental parser for `text/event-stream` bodies.
//!
//! Bytes arrive in arbitrary chunks; the parser buffers partial lines and
//! emits an [`SseEvent`] for every blank-line-terminated block that carried
//! data.
//!
//! # Parsing Flow
//!
//! 1. **Split lines** on LF, CRLF or CR, even when the CR and LF land in
//!    different chunks
//! 2. **Apply fields**: `event`, `data` (appended with `\n`), `id`, `retry`;
//!    lines starting with `:` are comments
//! 3. **Dispatch** on a blank line, dropping blocks without data
//!
//! Invalid UTF-8 is replaced rather than rejected, as browsers do.
//!
//! # Examples
//!
//! ```
//! use sse_trigger::client::EventStreamParser;
//!
//! let mut parser = EventStreamParser::new();
//! assert!(parser.feed(b"event: update\ndata: <p>").is_empty());
//!
//! let events = parser.feed(b"hi</p>\n\n");
//! assert_eq!(events.len(), 1);
//! assert_eq!(events[0].event, "update");
//! assert_eq!(events[0].data, "<p>hi</p>");
//! ```

use crate::protocol::constants::DEFAULT_EVENT_NAME;
use crate::types::SseEvent;
use bytes::{Buf, BytesMut};
use std::time::Duration;

/// Streaming parser state.
#[derive(Debug)]
pub struct EventStreamParser {
    /// Bytes not yet terminated by a line break
    buffer: BytesMut,
    /// Previous chunk ended with CR; a leading LF belongs to it
    skip_lf: bool,
    /// Event name of the block being built
    event: Option<String>,
    /// Data of the block being built
    data: String,
    /// Sticky last event id
    last_event_id: Option<String>,
    /// Last reconnection time sent by the server
    retry: Option<Duration>,
}

impl EventStreamParser {
    /// Create a new parser
    pub fn new() -> Self {
        EventStreamParser {
            buffer: BytesMut::with_capacity(8192),
            skip_lf: false,
            event: None,
            data: String::new(),
            last_event_id: None,
            retry: None,
        }
    }

    /// Feed bytes and collect every event they complete.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        loop {
            if self.skip_lf && !self.buffer.is_empty() {
                if self.buffer[0] == b'\n' {
                    self.buffer.advance(1);
                }
                self.skip_lf = false;
            }

            let Some(pos) = self.buffer.iter().position(|b| *b == b'\n' || *b == b'\r') else {
                break;
            };
            let line = self.buffer.split_to(pos);
            if self.buffer[0] == b'\r' {
                self.skip_lf = true;
            }
            self.buffer.advance(1);

            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        events
    }

    /// Apply one line; returns an event when the line completes one.
    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.find(':') {
            Some(pos) => {
                let value = &line[pos + 1..];
                (&line[..pos], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "id" if !value.contains('\0') => {
                self.last_event_id = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry = Some(Duration::from_millis(ms));
                }
            }
            _ => {}
        }
        None
    }

    /// Finish the current block.
    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }

        let mut data = std::mem::take(&mut self.data);
        data.pop();

        Some(SseEvent {
            event: event
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT_NAME.to_string()),
            data,
            id: self.last_event_id.clone(),
            retry: self.retry,
        })
    }

    /// Last event id seen on the stream
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Reconnection time last requested by the server
    pub fn retry(&self) -> Option<Duration> {
        self.retry
    }
}

impl Default for EventStreamParser {
    fn default() -> Self {
        Self::new()
    }
}
