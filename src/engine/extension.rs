//! The engine façade wired into the host's event hooks.
//!
//! # Control Flow
//!
//! ```text
//! htmx:trigger ──▶ activate ──▶ registry.ensure ──▶ router.attach ──▶ pump task
//!                                                                     │
//!             transport events ◀──────────────────────────────────────┘
//!               Open    ─▶ htmx:sseOpen
//!               Message ─▶ router.route (oob, named swaps, htmx:sseMessage)
//!               Error   ─▶ htmx:sseError, then a backoff retry if terminal
//!               Closed  ─▶ done
//!
//! htmx:beforeCleanupElement ──▶ registry.teardown (closes, cancels retry)
//! ```
//!
//! A primitive that refuses to start reports through the same channel, so
//! a failed start is handled like any other terminal error.
//!
//! Every connection gets one pump task that drains its events in arrival
//! order. Before handling an event the pump checks that its connection is
//! still the owner's current one and that the owner is still in the
//! document; anything else is a stale callback and ends the pump.

use super::config::EngineConfig;
use super::connection::{Connection, Lifecycle};
use super::registry::{ConnectionRegistry, Ensured};
use super::retry::{RetryId, RetryScheduler, ScheduledRetry};
use super::router::EventRouter;
use crate::client::{build_stream_request, TransportEvents};
use crate::error::Result;
use crate::host::{Host, HostEvent};
use crate::protocol::{constants::events, resolve_source, source_owners, StreamSource};
use crate::transport::{transport_factory, TransportFactory};
use crate::types::{ConnectionId, ConnectionStatus, ElementId};
use std::sync::Arc;

/// Live-update engine for one host document.
///
/// Cloning yields another handle to the same engine.
///
/// # Examples
///
/// ```ignore
/// use sse_trigger::{EngineConfig, SseEngine};
/// use std::sync::Arc;
///
/// let engine = SseEngine::new(Arc::new(MyDocument::new()), EngineConfig::default());
///
/// // from the host's event dispatch
/// engine.on_event("htmx:trigger", form)?;
/// // ...
/// engine.on_event("htmx:beforeCleanupElement", form)?;
/// ```
pub struct SseEngine<H: Host> {
    inner: Arc<EngineInner<H>>,
}

struct EngineInner<H: Host> {
    host: Arc<H>,
    config: EngineConfig,
    factory: Arc<dyn TransportFactory>,
    registry: ConnectionRegistry,
    retry: RetryScheduler,
    router: EventRouter<H>,
}

impl<H: Host> SseEngine<H> {
    /// Engine using the process-wide transport factory.
    pub fn new(host: Arc<H>, config: EngineConfig) -> Self {
        Self::with_transport(host, config, transport_factory())
    }

    /// Engine using an explicit transport factory.
    pub fn with_transport(
        host: Arc<H>,
        config: EngineConfig,
        factory: Arc<dyn TransportFactory>,
    ) -> Self {
        let inner = EngineInner {
            retry: RetryScheduler::new(config.base_retry_delay_ms, config.max_retry_count),
            router: EventRouter::new(Arc::clone(&host), config.settling_class.as_str()),
            registry: ConnectionRegistry::new(),
            host,
            config,
            factory,
        };
        SseEngine {
            inner: Arc::new(inner),
        }
    }

    /// Entry point for host lifecycle hooks.
    ///
    /// `htmx:trigger` activates the element, `htmx:beforeCleanupElement`
    /// tears it down; other events are ignored.
    pub fn on_event(&self, name: &str, element: ElementId) -> Result<()> {
        tracing::trace!(event = name, element = %element, "host event");
        match name {
            events::TRIGGER => self.activate(element).map(|_| ()),
            events::BEFORE_CLEANUP_ELEMENT => {
                self.remove(element);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Make sure `element` and each declaring descendant has a connection,
    /// and (re)attach their subscriptions.
    ///
    /// Returns the ids of the connections now serving the declarations.
    /// A declaration whose URL does not resolve is logged and skipped; the
    /// error is returned only when no declaration could be served.
    pub fn activate(&self, element: ElementId) -> Result<Vec<ConnectionId>> {
        let host = &*self.inner.host;
        let swept = self.inner.registry.retain(|el| host.is_live(el));
        if swept > 0 {
            tracing::debug!(released = swept, "released connections of detached elements");
        }

        let mut ids = Vec::new();
        let mut first_error = None;
        for owner in source_owners(host, element) {
            match resolve_source(host, owner) {
                Some(Ok(source)) => ids.push(self.inner.ensure(&source)),
                Some(Err(e)) => {
                    tracing::warn!(element = %owner, "invalid stream source: {}", e);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                None => {}
            }
        }

        match first_error {
            Some(e) if ids.is_empty() => Err(e),
            _ => Ok(ids),
        }
    }

    /// Close the element's connection and cancel its pending retry.
    ///
    /// Safe to call for elements that never had a connection.
    pub fn remove(&self, element: ElementId) -> bool {
        let released = self.inner.registry.teardown(element);
        if released {
            tracing::debug!(element = %element, "stream connection torn down");
        }
        released
    }

    /// Status of the element's connection.
    pub fn connection_status(&self, element: ElementId) -> Option<ConnectionStatus> {
        self.inner.registry.status(element)
    }

    /// Retry count of the element's connection.
    pub fn retry_count(&self, element: ElementId) -> Option<u32> {
        self.inner.registry.get(element).map(|c| c.retry_count())
    }

    /// The element's connection.
    pub fn connection(&self, element: ElementId) -> Option<Arc<Connection>> {
        self.inner.registry.get(element)
    }

    /// The element's scheduled reconnect.
    pub fn pending_retry(&self, element: ElementId) -> Option<ScheduledRetry> {
        self.inner.registry.pending_retry(element)
    }

    /// Number of connections that are not closed.
    pub fn live_connections(&self) -> usize {
        self.inner.registry.live_count()
    }

    /// Close every connection and cancel every pending retry.
    pub fn shutdown(&self) {
        self.inner.registry.clear();
    }

    /// The host this engine patches.
    pub fn host(&self) -> &Arc<H> {
        &self.inner.host
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }
}

impl<H: Host> Clone for SseEngine<H> {
    fn clone(&self) -> Self {
        SseEngine {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: Host> EngineInner<H> {
    fn open(&self, source: &StreamSource, retry_count: u32) -> (Arc<Connection>, TransportEvents) {
        let values = self.host.input_values(source.element);
        let request = build_stream_request(source, &values, true);
        Connection::open(source.element, request, retry_count, &*self.factory)
    }

    fn ensure(self: &Arc<Self>, source: &StreamSource) -> ConnectionId {
        match self.registry.ensure(source.element, || self.open(source, 0)) {
            Ensured::Existing(connection) => {
                self.router.attach(source.element, &connection);
                connection.id()
            }
            Ensured::Created(connection, events) => {
                self.router.attach(source.element, &connection);
                let id = connection.id();
                self.spawn_pump(connection, events);
                id
            }
        }
    }

    fn spawn_pump(self: &Arc<Self>, connection: Arc<Connection>, events: TransportEvents) {
        tokio::spawn(Arc::clone(self).pump(connection, events));
    }

    async fn pump(self: Arc<Self>, connection: Arc<Connection>, mut events: TransportEvents) {
        let owner = connection.owner();

        while let Some(event) = events.next().await {
            if !self.registry.is_current(owner, connection.id()) {
                tracing::trace!(connection = %connection.id(), "discarding stale callback");
                break;
            }
            if !self.host.is_live(owner) {
                tracing::debug!(element = %owner, "owner left the document");
                self.registry.teardown(owner);
                break;
            }

            match connection.handle(event) {
                Lifecycle::Opened => {
                    tracing::debug!(connection = %connection.id(), element = %owner, "stream opened");
                    self.host
                        .trigger_event(owner, &HostEvent::SseOpen { connection: connection.id() });
                }
                Lifecycle::Message(message) => {
                    self.router.route(owner, &message);
                }
                Lifecycle::Errored { error, terminal } => {
                    if self.config.enable_logging {
                        if error.is_retryable() {
                            tracing::warn!(connection = %connection.id(), terminal, "stream error: {}", error);
                        } else {
                            tracing::error!(connection = %connection.id(), terminal, "stream error: {}", error);
                        }
                    }
                    self.host.trigger_event(
                        owner,
                        &HostEvent::SseError {
                            connection: connection.id(),
                            error: error.to_string(),
                        },
                    );
                    if terminal {
                        self.schedule_retry(&connection);
                        break;
                    }
                }
                Lifecycle::Ended => {
                    tracing::debug!(connection = %connection.id(), "stream ended");
                    if !self.host.is_live(owner) {
                        self.registry.teardown(owner);
                    }
                    break;
                }
                Lifecycle::Ignored => {}
            }
        }
    }

    fn schedule_retry(self: &Arc<Self>, connection: &Connection) {
        let owner = connection.owner();
        let weak = Arc::downgrade(self);

        let scheduled = self.registry.park_retry(owner, connection.id(), || {
            self.retry.schedule(owner, connection.retry_count(), move |retry| {
                if let Some(inner) = weak.upgrade() {
                    inner.fire_retry(owner, retry);
                }
            })
        });

        match scheduled {
            Some(retry) => tracing::debug!(
                element = %owner,
                delay_ms = retry.delay.as_millis() as u64,
                retry_count = retry.retry_count,
                "reconnect scheduled"
            ),
            None => tracing::trace!(element = %owner, "connection replaced before retry"),
        }
    }

    fn fire_retry(self: &Arc<Self>, owner: ElementId, retry: RetryId) {
        if !self.host.is_live(owner) {
            self.registry.drop_retry(owner, retry);
            tracing::debug!(element = %owner, "owner gone, reconnect dropped");
            return;
        }

        let source = match resolve_source(&*self.host, owner) {
            Some(Ok(source)) => source,
            Some(Err(e)) => {
                tracing::warn!(element = %owner, "stream source no longer valid: {}", e);
                self.registry.drop_retry(owner, retry);
                return;
            }
            None => {
                tracing::debug!(element = %owner, "stream declaration removed, reconnect dropped");
                self.registry.drop_retry(owner, retry);
                return;
            }
        };

        match self.registry.resume(owner, retry, |count| self.open(&source, count)) {
            Some((connection, events)) => {
                self.router.attach(owner, &connection);
                self.spawn_pump(connection, events);
            }
            None => tracing::trace!(element = %owner, "reconnect superseded"),
        }
    }
}
