//! The stream transport primitive and its process-wide factory.
//!
//! A transport primitive opens exactly one event stream. It is created idle
//! by a [`TransportFactory`], started with [`EventSource::stream`] and
//! reports everything that happens through the [`TransportEvent`] channel it
//! was created with. Events for one source are delivered in arrival order.
//!
//! The factory used by engines built with [`SseEngine::new`] is read from a
//! single override point:
//!
//! ```
//! use sse_trigger::transport::{reset_transport_factory, set_transport_factory, transport_factory};
//! use sse_trigger::client::{ClientConfig, HttpTransport};
//! use std::sync::Arc;
//!
//! let config = ClientConfig { with_credentials: false, ..Default::default() };
//! set_transport_factory(Arc::new(HttpTransport::with_config(config)));
//! let _factory = transport_factory();
//! reset_transport_factory();
//! ```
//!
//! [`SseEngine::new`]: crate::engine::SseEngine::new

use crate::client::HttpTransport;
use crate::error::{Result, SseError};
use crate::types::{ConnectionStatus, SseEvent, StreamRequest};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;

/// What a transport primitive reports.
#[derive(Debug)]
pub enum TransportEvent {
    /// The response was accepted and the stream is flowing.
    Open,
    /// One decoded event.
    Message(SseEvent),
    /// The stream failed. The primitive's status tells whether it is terminal.
    Error(SseError),
    /// The stream ended cleanly.
    Closed,
}

/// One stream connection as seen by the engine.
pub trait EventSource: Send + Sync {
    /// Start streaming. Sources never start on their own.
    fn stream(&self) -> Result<()>;

    /// Stop streaming and release the underlying request.
    fn close(&self);

    /// Current status.
    fn status(&self) -> ConnectionStatus;
}

/// Creates transport primitives.
pub trait TransportFactory: Send + Sync {
    /// Create an idle source for `request` that reports into `events`.
    fn create(
        &self,
        request: StreamRequest,
        events: mpsc::Sender<TransportEvent>,
    ) -> Box<dyn EventSource>;

    /// Capacity of the event channel handed to [`TransportFactory::create`].
    fn event_buffer(&self) -> usize {
        100
    }
}

static FACTORY: RwLock<Option<Arc<dyn TransportFactory>>> = parking_lot::const_rwlock(None);

/// The factory new engines pick up.
///
/// Defaults to [`HttpTransport`] with credentials included.
pub fn transport_factory() -> Arc<dyn TransportFactory> {
    if let Some(factory) = FACTORY.read().as_ref() {
        return Arc::clone(factory);
    }
    let mut slot = FACTORY.write();
    Arc::clone(slot.get_or_insert_with(|| Arc::new(HttpTransport::new())))
}

/// Replace the process-wide factory.
pub fn set_transport_factory(factory: Arc<dyn TransportFactory>) {
    *FACTORY.write() = Some(factory);
}

/// Go back to the default factory.
pub fn reset_transport_factory() {
    *FACTORY.write() = None;
}
