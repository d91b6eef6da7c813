//! One stream connection bound to one element.
//!
//! A [`Connection`] wraps a transport primitive and owns the retry state of
//! its owner. Raw [`TransportEvent`]s are fed through [`Connection::handle`],
//! which advances the state machine and says what the event means for the
//! owner:
//!
//! ```text
//! Connecting ──Open──▶ Open            (retry count reset to 0)
//! Connecting ─Error──▶ Closed          (terminal when the primitive is closed)
//! stream() refused ──▶ Closed          (error queued, terminal)
//! Open ───────Error──▶ Closed
//! any ────────close()▶ Closed          (teardown, never retried)
//! ```

use crate::client::TransportEvents;
use crate::error::SseError;
use crate::transport::{EventSource, TransportEvent, TransportFactory};
use crate::types::{
    ConnectionId, ConnectionStatus, ElementId, SseMessage, StreamRequest, Subscription,
};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// What a transport event means for the connection's owner.
#[derive(Debug)]
pub enum Lifecycle {
    /// The stream opened; emit the opened notification.
    Opened,
    /// A subscribed message arrived.
    Message(SseMessage),
    /// The transport failed. `terminal` when the primitive is closed and a
    /// retry is due.
    Errored {
        /// The transport error
        error: SseError,
        /// Whether the primitive reported itself closed
        terminal: bool,
    },
    /// The stream ended cleanly.
    Ended,
    /// Nothing to do (unsubscribed name, or the connection was closed).
    Ignored,
}

/// A live stream owned by one element.
pub struct Connection {
    id: ConnectionId,
    owner: ElementId,
    request: StreamRequest,
    retry_count: AtomicU32,
    status: Mutex<ConnectionStatus>,
    closed_by_owner: AtomicBool,
    subscription: RwLock<Subscription>,
    source: Box<dyn EventSource>,
}

impl Connection {
    /// Create the primitive idle, then start it.
    ///
    /// Returns the connection together with the receiving side of its
    /// transport events. A primitive that refuses to start leaves the
    /// connection Closed with the failure queued as a terminal error event.
    pub fn open(
        owner: ElementId,
        request: StreamRequest,
        retry_count: u32,
        factory: &dyn TransportFactory,
    ) -> (Arc<Connection>, TransportEvents) {
        let (tx, events) = TransportEvents::channel(factory.event_buffer());
        let source = factory.create(request.clone(), tx.clone());

        let connection = Arc::new(Connection {
            id: ConnectionId::new(),
            owner,
            request,
            retry_count: AtomicU32::new(retry_count),
            status: Mutex::new(ConnectionStatus::Connecting),
            closed_by_owner: AtomicBool::new(false),
            subscription: RwLock::new(Subscription::default()),
            source,
        });

        match connection.source.stream() {
            Ok(()) => tracing::debug!(
                connection = %connection.id,
                owner = %owner,
                method = %connection.request.method,
                url = %connection.request.url,
                retry_count,
                "stream connection started"
            ),
            Err(e) => {
                connection.source.close();
                *connection.status.lock() = ConnectionStatus::Closed;
                if let Err(e) = tx.try_send(TransportEvent::Error(e)) {
                    tracing::warn!(connection = %connection.id, "start failure not queued: {}", e);
                }
            }
        }
        (connection, events)
    }

    /// Advance the state machine with one transport event.
    pub fn handle(&self, event: TransportEvent) -> Lifecycle {
        if self.closed_by_owner.load(Ordering::Acquire) {
            return Lifecycle::Ignored;
        }

        match event {
            TransportEvent::Open => {
                *self.status.lock() = ConnectionStatus::Open;
                self.retry_count.store(0, Ordering::Release);
                Lifecycle::Opened
            }
            TransportEvent::Message(event) => {
                if *self.status.lock() == ConnectionStatus::Closed {
                    return Lifecycle::Ignored;
                }
                if !self.subscription.read().contains(&event.event) {
                    tracing::trace!(connection = %self.id, event = %event.event, "no listener for event");
                    return Lifecycle::Ignored;
                }
                Lifecycle::Message(SseMessage::from_event(event, self.id))
            }
            TransportEvent::Error(error) => {
                let mut status = self.status.lock();
                let terminal = *status == ConnectionStatus::Closed
                    || self.source.status() == ConnectionStatus::Closed;
                if terminal {
                    *status = ConnectionStatus::Closed;
                }
                Lifecycle::Errored { error, terminal }
            }
            TransportEvent::Closed => {
                *self.status.lock() = ConnectionStatus::Closed;
                Lifecycle::Ended
            }
        }
    }

    /// Close on behalf of the owner. No retry follows.
    pub fn close(&self) {
        self.closed_by_owner.store(true, Ordering::Release);
        self.source.close();
        *self.status.lock() = ConnectionStatus::Closed;
    }

    /// Replace the listened-for event names.
    pub fn set_subscription(&self, subscription: Subscription) {
        *self.subscription.write() = subscription;
    }

    /// Currently listened-for event names.
    pub fn subscription(&self) -> Subscription {
        self.subscription.read().clone()
    }

    /// Connection id
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Owning element
    pub fn owner(&self) -> ElementId {
        self.owner
    }

    /// Request the stream was opened with
    pub fn request(&self) -> &StreamRequest {
        &self.request
    }

    /// Consecutive failures before this attempt; 0 once opened
    pub fn retry_count(&self) -> u32 {
        self.retry_count.load(Ordering::Acquire)
    }

    /// Current status
    pub fn status(&self) -> ConnectionStatus {
        *self.status.lock()
    }

    /// Whether the owner closed this connection.
    pub fn is_closed_by_owner(&self) -> bool {
        self.closed_by_owner.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("url", &self.request.url)
            .field("retry_count", &self.retry_count())
            .field("status", &self.status())
            .finish()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.source.close();
    }
}
