//! Core types shared by the engine, the host interface and the transport.
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ElementId`] | Stable identity of a host document element |
//! | [`ConnectionId`] | Identity of one Connection, used to detect stale callbacks |
//! | [`ConnectionStatus`] | `Connecting`, `Open` or `Closed` |
//! | [`SseEvent`] | One decoded `text/event-stream` event |
//! | [`SseMessage`] | An event as routed by the engine |
//! | [`Subscription`] | Event names an element listens for |
//! | [`SwapTarget`] | A descendant that swaps on some event names |
//! | [`SwapSpec`] | Resolved swap style and settle delay |
//! | [`SettleInfo`] | Elements touched by a swap plus deferred tasks |
//! | [`StreamRequest`] | Everything a transport needs to open a stream |

use crate::error::{Result, SseError};
use crate::protocol::constants::DEFAULT_SETTLE_DELAY_MS;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Stable identity of an element in the host document.
///
/// The engine never owns elements; it only keys its bookkeeping by this id
/// and asks the host whether the element is still live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a single Connection instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Allocate a fresh id.
    pub fn new() -> Self {
        ConnectionId(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Status of a stream connection.
///
/// ```text
/// Connecting ──open──▶ Open
///     │                  │
///     └──error/close──▶ Closed ◀──error/close──┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// Request sent, no response yet
    Connecting,
    /// Response accepted, events are flowing
    Open,
    /// Terminated by error, end of stream or explicit close
    Closed,
}

impl ConnectionStatus {
    /// Whether the connection may still deliver events.
    pub fn is_live(self) -> bool {
        !matches!(self, ConnectionStatus::Closed)
    }
}

/// One event decoded from a `text/event-stream` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name (`message` when the stream gave none)
    pub event: String,
    /// Data lines joined with `\n`
    pub data: String,
    /// Last event id seen on the stream, if any
    pub id: Option<String>,
    /// Reconnection time requested by the server
    pub retry: Option<Duration>,
}

impl SseEvent {
    /// Event with the given name and data and no id.
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        SseEvent {
            event: event.into(),
            data: data.into(),
            id: None,
            retry: None,
        }
    }
}

/// A message routed by the engine. Not retained after dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseMessage {
    /// Event name the message arrived under
    pub event_name: String,
    /// Raw payload
    pub payload: String,
    /// Last event id, when the stream carries ids
    pub last_event_id: Option<String>,
    /// Connection the message arrived on
    pub source: ConnectionId,
}

impl SseMessage {
    /// Wrap a decoded stream event as a routed message.
    pub fn from_event(event: SseEvent, source: ConnectionId) -> Self {
        SseMessage {
            event_name: event.event,
            payload: event.data,
            last_event_id: event.id,
            source,
        }
    }
}

/// Event names an element subscribes to.
///
/// Resolved once per activation and then fixed for the Connection; a new
/// activation resolves a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subscription {
    events: Vec<String>,
}

impl Subscription {
    /// Build from already split names. Duplicates are dropped.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut events: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !events.contains(&name) {
                events.push(name);
            }
        }
        Subscription { events }
    }

    /// Whether `event_name` is subscribed.
    pub fn contains(&self, event_name: &str) -> bool {
        self.events.iter().any(|name| name == event_name)
    }

    /// Subscribed names in declaration order.
    pub fn events(&self) -> &[String] {
        &self.events
    }

    /// Whether nothing is subscribed.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// A node that swaps the raw payload of some events into itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapTarget {
    /// The declaring element
    pub element: ElementId,
    /// Event names listed in its swap declaration
    pub events: Vec<String>,
}

impl SwapTarget {
    /// Whether the target swaps on `event_name`.
    pub fn swaps_on(&self, event_name: &str) -> bool {
        self.events.iter().any(|name| name == event_name)
    }
}

/// How content is placed relative to the target node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SwapStyle {
    /// Replace the children of the target
    #[default]
    InnerHtml,
    /// Replace the target itself
    OuterHtml,
    /// Insert before the target
    BeforeBegin,
    /// Insert before the first child
    AfterBegin,
    /// Insert after the last child
    BeforeEnd,
    /// Insert after the target
    AfterEnd,
    /// Remove the target
    Delete,
    /// Leave the document untouched
    None,
}

impl SwapStyle {
    /// Attribute spelling of the style.
    pub fn as_str(self) -> &'static str {
        match self {
            SwapStyle::InnerHtml => "innerHTML",
            SwapStyle::OuterHtml => "outerHTML",
            SwapStyle::BeforeBegin => "beforebegin",
            SwapStyle::AfterBegin => "afterbegin",
            SwapStyle::BeforeEnd => "beforeend",
            SwapStyle::AfterEnd => "afterend",
            SwapStyle::Delete => "delete",
            SwapStyle::None => "none",
        }
    }
}

impl fmt::Display for SwapStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwapStyle {
    type Err = SseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "innerHTML" => Ok(SwapStyle::InnerHtml),
            "outerHTML" => Ok(SwapStyle::OuterHtml),
            "beforebegin" => Ok(SwapStyle::BeforeBegin),
            "afterbegin" => Ok(SwapStyle::AfterBegin),
            "beforeend" => Ok(SwapStyle::BeforeEnd),
            "afterend" => Ok(SwapStyle::AfterEnd),
            "delete" => Ok(SwapStyle::Delete),
            "none" => Ok(SwapStyle::None),
            other => Err(SseError::InvalidSwapStyle(other.to_string())),
        }
    }
}

/// Resolved swap declaration of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapSpec {
    /// Placement style
    pub style: SwapStyle,
    /// Delay between insertion and the after-settle phase
    pub settle_delay: Duration,
}

impl SwapSpec {
    /// Spec with the given style and the default settle delay.
    pub fn new(style: SwapStyle) -> Self {
        SwapSpec {
            style,
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
        }
    }

    /// Override the settle delay.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Parse a swap declaration such as `outerHTML settle:100ms`.
    ///
    /// The first token may be a style; `settle:` modifiers accept `ms` and
    /// `s` suffixes (bare numbers are milliseconds). Unknown modifiers are
    /// ignored so hosts can keep their own.
    pub fn parse(value: &str) -> Result<Self> {
        let mut spec = SwapSpec::default();
        for (index, token) in value.split_whitespace().enumerate() {
            if let Some(delay) = token.strip_prefix("settle:") {
                spec.settle_delay = parse_interval(delay)?;
            } else if index == 0 && !token.contains(':') {
                spec.style = token.parse()?;
            }
        }
        Ok(spec)
    }
}

impl Default for SwapSpec {
    fn default() -> Self {
        SwapSpec::new(SwapStyle::default())
    }
}

fn parse_interval(value: &str) -> Result<Duration> {
    let invalid = || SseError::Parse(format!("invalid interval: {}", value));
    if let Some(ms) = value.strip_suffix("ms") {
        ms.parse::<u64>().map(Duration::from_millis).map_err(|_| invalid())
    } else if let Some(secs) = value.strip_suffix('s') {
        secs.parse::<f64>()
            .ok()
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64)
            .ok_or_else(invalid)
    } else {
        value.parse::<u64>().map(Duration::from_millis).map_err(|_| invalid())
    }
}

/// Deferred work run at the end of the settle phase.
pub type SettleTask = Box<dyn FnOnce() + Send + 'static>;

/// Elements touched by one swap plus tasks to run once they settle.
///
/// Each swap owns its own record; records are never shared between swaps.
#[derive(Default)]
pub struct SettleInfo {
    /// Elements inserted or replaced by the swap
    pub elements: Vec<ElementId>,
    /// Tasks run before the settling state is cleared
    pub tasks: Vec<SettleTask>,
}

impl SettleInfo {
    /// Empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an element touched by the swap.
    pub fn push_element(&mut self, element: ElementId) {
        if !self.elements.contains(&element) {
            self.elements.push(element);
        }
    }

    /// Queue a task for the end of the settle phase.
    pub fn push_task(&mut self, task: impl FnOnce() + Send + 'static) {
        self.tasks.push(Box::new(task));
    }

    /// Whether the record has nothing to settle.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.tasks.is_empty()
    }
}

impl fmt::Debug for SettleInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettleInfo")
            .field("elements", &self.elements)
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

/// Value of a form input; multi-valued inputs repeat their key when encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    /// Single value
    Single(String),
    /// Several values under one name
    Multiple(Vec<String>),
}

impl From<&str> for FormValue {
    fn from(value: &str) -> Self {
        FormValue::Single(value.to_string())
    }
}

impl From<String> for FormValue {
    fn from(value: String) -> Self {
        FormValue::Single(value)
    }
}

impl From<Vec<String>> for FormValue {
    fn from(values: Vec<String>) -> Self {
        FormValue::Multiple(values)
    }
}

/// Everything a transport primitive needs to open one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    /// Absolute stream URL, query included
    pub url: String,
    /// HTTP method
    pub method: http::Method,
    /// Extra request headers
    pub headers: BTreeMap<String, String>,
    /// Request body, if the method carries one
    pub payload: Option<String>,
    /// Send cookies and credentials along
    pub with_credentials: bool,
}

impl StreamRequest {
    /// GET request for `url` with credentials and no payload.
    pub fn new(url: impl Into<String>) -> Self {
        StreamRequest {
            url: url.into(),
            method: http::Method::GET,
            headers: BTreeMap::new(),
            payload: None,
            with_credentials: true,
        }
    }

    /// Set the method.
    pub fn with_method(mut self, method: http::Method) -> Self {
        self.method = method;
        self
    }

    /// Add a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set the body.
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }
}
