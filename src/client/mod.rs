//! Default transport primitive over HTTP.
//!
//! This module provides the stream primitive engines use unless the
//! process-wide factory in [`crate::transport`] is overridden:
//!
//! - **Opens one event stream per source**, with any verb and a form payload
//! - **Never starts on its own**; the owner calls `stream()`
//! - **Decodes `text/event-stream`** incrementally
//! - **Reports** open, message, error and end of stream on a channel
//!
//! # Module Organization
//!
//! ```text
//! client/
//! ├── event_source - HttpTransport and HttpEventSource
//! ├── parser       - Incremental text/event-stream parser
//! ├── subscription - Receiving side of the event channel
//! ├── config       - Transport configuration
//! └── utils        - Form encoding, request building, backoff
//! ```
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`HttpTransport`] | Factory sharing one HTTP client |
//! | [`HttpEventSource`] | One streaming request |
//! | [`EventStreamParser`] | Streaming event parser |
//! | [`TransportEvents`] | Event receiver, also a `Stream` |
//! | [`ClientConfig`] | Transport configuration options |
//!
//! # Examples
//!
//! ## Creating a Transport
//!
//! ```
//! use sse_trigger::client::{ClientConfig, HttpTransport};
//!
//! // Default configuration
//! let transport = HttpTransport::new();
//!
//! // Custom configuration
//! let config = ClientConfig {
//!     with_credentials: false,
//!     connect_timeout_ms: 2000,
//!     ..Default::default()
//! };
//! let transport = HttpTransport::with_config(config);
//! ```
//!
//! ## Utility Functions
//!
//! ```
//! use sse_trigger::client::{backoff_delay, is_retryable_status};
//! use std::time::Duration;
//!
//! assert!(is_retryable_status(503));
//! assert!(!is_retryable_status(404));
//!
//! // Backoff for the third retry with a fixed random draw
//! let delay = backoff_delay(2, 500, 0.5);
//! assert_eq!(delay, Duration::from_millis(1000));
//! ```

mod config;
mod event_source;
mod parser;
mod subscription;
mod utils;

pub use config::ClientConfig;
pub use event_source::{HttpEventSource, HttpTransport};
pub use parser::EventStreamParser;
pub use subscription::TransportEvents;
pub use utils::*;
