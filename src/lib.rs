#![warn(missing_docs)]

//! # sse-trigger: server-sent events for declarative document patching
//!
//! This crate implements the live-update side of an htmx-style page: elements
//! declare a stream source, the engine keeps one event stream per element, and
//! every subscribed message patches the document through the host framework.
//!
//! ## Overview
//!
//! An element opts in with one of the `hx-sse-<verb>` declarations:
//!
//! ```html
//! <form hx-sse-post="/chat/stream" hx-sse-events="message, typing">
//!   <ul sse-swap="message" hx-swap="beforeend"></ul>
//! </form>
//! ```
//!
//! 1. **Activation** - the host's `htmx:trigger` opens a stream with the
//!    element's current input values as the request payload
//! 2. **Subscription** - only the names listed in `hx-sse-events` are routed
//! 3. **Routing** - every routed payload is scanned for out-of-band nodes,
//!    swapped into each `sse-swap` target listing the event, and announced
//!    with `htmx:sseMessage`
//! 4. **Reconnects** - a failed stream is retried with randomized exponential
//!    backoff until it opens again or its element leaves the document
//!
//! ## Key Features
//!
//! - **At most one connection per element**, re-triggering reuses it
//! - **Any verb** (`GET`, `POST`, `PUT`, `DELETE`, `PATCH`) with form payloads
//! - **Out-of-band placement** of `hx-swap-oob` nodes
//! - **Two-phase settle** with a settling class and before/after notifications
//! - **Pluggable transport** through a process-wide factory
//!
//! ## Usage
//!
//! ```ignore
//! use sse_trigger::{EngineConfig, Host, SseEngine};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let document = Arc::new(MyDocument::load("index.html")?);
//!     let engine = SseEngine::new(Arc::clone(&document), EngineConfig::default());
//!
//!     // the host forwards its lifecycle events
//!     document.on_lifecycle(move |name, element| engine.on_event(name, element));
//!     Ok(())
//! }
//! ```
//!
//! ## Module Structure
//!
//! - **[engine]** - Registry, connection state machine, retries, routing, swaps
//! - **[client]** - Default HTTP transport and event-stream parser
//! - **[transport]** - Transport primitive traits and the factory override point
//! - **[host]** - Interface to the document framework
//! - **[protocol]** - Declaration names, event names and their resolution
//! - **[types]** - Shared value types
//! - **[error]** - Error types and result handling

pub mod client;
pub mod engine;
pub mod error;
pub mod host;
pub mod protocol;
pub mod transport;
pub mod types;

pub use engine::{EngineConfig, SseEngine};
pub use error::{Result, SseError};
pub use host::{Host, HostEvent};
pub use transport::{set_transport_factory, transport_factory, EventSource, TransportFactory};
pub use types::{
    ConnectionId, ConnectionStatus, ElementId, FormValue, SettleInfo, SseEvent, SseMessage,
    StreamRequest, SwapSpec, SwapStyle,
};

#[cfg(test)]
mod tests;
