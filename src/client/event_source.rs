//! Default transport primitive on `reqwest` streaming responses.
//!
//! # Examples
//!
//! ```ignore
//! use sse_trigger::client::{HttpTransport, TransportEvents};
//! use sse_trigger::transport::TransportFactory;
//! use sse_trigger::StreamRequest;
//!
//! let transport = HttpTransport::new();
//! let (tx, mut events) = TransportEvents::channel(transport.event_buffer());
//! let source = transport.create(StreamRequest::new("http://localhost:3000/feed"), tx);
//!
//! // nothing is sent until the source is started
//! source.stream()?;
//! while let Some(event) = events.next().await {
//!     println!("{:?}", event);
//! }
//! ```

use crate::client::{config::ClientConfig, EventStreamParser};
use crate::error::{Result, SseError};
use crate::protocol::constants::headers;
use crate::transport::{EventSource, TransportEvent, TransportFactory};
use crate::types::{ConnectionStatus, StreamRequest};
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Factory for [`HttpEventSource`]s sharing one connection pool.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    anonymous: reqwest::Client,
    config: Arc<ClientConfig>,
}

impl HttpTransport {
    /// Create a transport with default configuration (credentials included)
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Create a transport with custom configuration
    pub fn with_config(config: ClientConfig) -> Self {
        let client = build_client(&config, config.with_credentials);
        let anonymous = build_client(&config, false);

        HttpTransport {
            client,
            anonymous,
            config: Arc::new(config),
        }
    }

    /// Get the transport configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

fn build_client(config: &ClientConfig, cookies: bool) -> reqwest::Client {
    let mut builder = reqwest::Client::builder()
        .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(config.max_idle_per_host)
        .cookie_store(cookies);

    if !config.proxy_url.is_empty() {
        match reqwest::Proxy::all(&config.proxy_url) {
            Ok(proxy) => builder = builder.proxy(proxy),
            Err(e) => tracing::warn!("ignoring invalid proxy {}: {}", config.proxy_url, e),
        }
    }

    builder.build().unwrap_or_else(|e| {
        tracing::warn!("client configuration rejected, using defaults: {}", e);
        reqwest::Client::new()
    })
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportFactory for HttpTransport {
    fn create(
        &self,
        request: StreamRequest,
        events: mpsc::Sender<TransportEvent>,
    ) -> Box<dyn EventSource> {
        let client = if request.with_credentials {
            self.client.clone()
        } else {
            self.anonymous.clone()
        };
        Box::new(HttpEventSource::new(client, request, events))
    }

    fn event_buffer(&self) -> usize {
        self.config.event_buffer
    }
}

/// One event stream over HTTP.
///
/// Starts in [`ConnectionStatus::Connecting`] and does nothing until
/// [`EventSource::stream`] is called. The stream runs on its own task,
/// which [`EventSource::close`] aborts.
pub struct HttpEventSource {
    client: reqwest::Client,
    request: StreamRequest,
    sender: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    status: Arc<Mutex<ConnectionStatus>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HttpEventSource {
    /// Create an idle source.
    pub fn new(
        client: reqwest::Client,
        request: StreamRequest,
        events: mpsc::Sender<TransportEvent>,
    ) -> Self {
        HttpEventSource {
            client,
            request,
            sender: Mutex::new(Some(events)),
            status: Arc::new(Mutex::new(ConnectionStatus::Connecting)),
            task: Mutex::new(None),
        }
    }

    /// The request this source sends.
    pub fn request(&self) -> &StreamRequest {
        &self.request
    }
}

impl EventSource for HttpEventSource {
    fn stream(&self) -> Result<()> {
        let Some(events) = self.sender.lock().take() else {
            // already started or closed
            return Ok(());
        };

        let handle = tokio::spawn(run_stream(
            self.client.clone(),
            self.request.clone(),
            events,
            Arc::clone(&self.status),
        ));
        *self.task.lock() = Some(handle);
        Ok(())
    }

    fn close(&self) {
        self.sender.lock().take();
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
        *self.status.lock() = ConnectionStatus::Closed;
    }

    fn status(&self) -> ConnectionStatus {
        *self.status.lock()
    }
}

impl Drop for HttpEventSource {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

async fn run_stream(
    client: reqwest::Client,
    request: StreamRequest,
    events: mpsc::Sender<TransportEvent>,
    status: Arc<Mutex<ConnectionStatus>>,
) {
    let response = match send_request(&client, &request).await {
        Ok(response) => response,
        Err(e) => {
            fail(&status, &events, e).await;
            return;
        }
    };

    *status.lock() = ConnectionStatus::Open;
    if events.send(TransportEvent::Open).await.is_err() {
        return; // Receiver dropped
    }

    let mut parser = EventStreamParser::new();
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => {
                for event in parser.feed(&bytes) {
                    if events.send(TransportEvent::Message(event)).await.is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                fail(&status, &events, SseError::from(e)).await;
                return;
            }
        }
    }

    tracing::debug!(url = %request.url, "event stream ended");
    *status.lock() = ConnectionStatus::Closed;
    let _ = events.send(TransportEvent::Closed).await;
}

async fn fail(
    status: &Mutex<ConnectionStatus>,
    events: &mpsc::Sender<TransportEvent>,
    error: SseError,
) {
    // status first: the consumer reads it when the error arrives
    *status.lock() = ConnectionStatus::Closed;
    let _ = events.send(TransportEvent::Error(error)).await;
}

async fn send_request(client: &reqwest::Client, request: &StreamRequest) -> Result<reqwest::Response> {
    let mut req_builder = client
        .request(request.method.clone(), &request.url)
        .header(http::header::ACCEPT, headers::EVENT_STREAM)
        .header(http::header::CACHE_CONTROL, "no-cache");

    for (k, v) in &request.headers {
        req_builder = req_builder.header(k, v);
    }

    if let Some(payload) = &request.payload {
        req_builder = req_builder.body(payload.clone());
    }

    let response = req_builder.send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(SseError::Status(status.as_u16()));
    }

    let content_type = response
        .headers()
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !content_type.starts_with(headers::EVENT_STREAM) {
        return Err(SseError::ContentType(content_type.to_string()));
    }

    Ok(response)
}
