//! Interface to the host document-patching framework.
//!
//! The engine never touches the document directly. Everything it needs from
//! the page (attribute lookup, input values, fragment parsing, swap
//! resolution, placement and lifecycle events) goes through [`Host`].
//!
//! Implementations are shared between connection tasks, so they must be
//! `Send + Sync` and are expected to serialize their own document mutation.

use crate::error::Result;
use crate::protocol::constants::events;
use crate::types::{ConnectionId, ElementId, FormValue, SettleInfo, SwapSpec, SwapStyle};
use serde_json::{json, Value};
use url::Url;

/// Collaborator owning the document.
pub trait Host: Send + Sync + 'static {
    /// Top-level node of a parsed payload fragment.
    type FragmentNode: Send;

    /// Whether the element is still attached to the document.
    fn is_live(&self, element: ElementId) -> bool;

    /// Base URL relative stream sources are resolved against.
    fn base_url(&self) -> Option<Url> {
        None
    }

    /// Raw attribute value, exactly as spelled.
    fn raw_attribute(&self, element: ElementId, name: &str) -> Option<String>;

    /// Descendants of `root` (not `root` itself) carrying `name` under any
    /// of the given spellings, in document order.
    fn query_descendants(&self, root: ElementId, names: &[&str]) -> Vec<ElementId>;

    /// Current resolved input values for a request issued by `element`.
    fn input_values(&self, element: ElementId) -> Vec<(String, FormValue)>;

    /// Parse a payload into its top-level nodes.
    fn parse_fragment(&self, html: &str) -> Result<Vec<Self::FragmentNode>>;

    /// Attribute of a parsed fragment node.
    fn fragment_attribute(&self, node: &Self::FragmentNode, name: &str) -> Option<String>;

    /// Place `node` according to its out-of-band directive.
    fn oob_swap(
        &self,
        directive: &str,
        node: Self::FragmentNode,
        settle: &mut SettleInfo,
    ) -> Result<()>;

    /// Run registered content transformers over a payload before insertion.
    fn transform_content(&self, _element: ElementId, content: String) -> String {
        content
    }

    /// Swap style and settle delay declared for `element`.
    fn swap_spec(&self, element: ElementId) -> SwapSpec;

    /// Node the swap of `element` actually lands on.
    fn swap_target(&self, element: ElementId) -> Option<ElementId>;

    /// Insert `content` at `target`, recording touched elements in `settle`.
    fn swap(
        &self,
        style: SwapStyle,
        target: ElementId,
        source: ElementId,
        content: &str,
        settle: &mut SettleInfo,
    ) -> Result<()>;

    /// Add a class to an element. Non-element nodes ignore it.
    fn add_class(&self, element: ElementId, class: &str);

    /// Remove a class from an element. Non-element nodes ignore it.
    fn remove_class(&self, element: ElementId, class: &str);

    /// Dispatch a lifecycle notification on `element`.
    fn trigger_event(&self, element: ElementId, event: &HostEvent);
}

/// Notifications emitted by the engine for host and application code.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// A connection's stream was accepted.
    SseOpen {
        /// Connection that opened
        connection: ConnectionId,
    },
    /// A connection reported a transport failure.
    SseError {
        /// Connection that failed
        connection: ConnectionId,
        /// Rendered error
        error: String,
    },
    /// A subscribed message was routed.
    SseMessage {
        /// Event name
        name: String,
        /// Raw payload
        data: String,
        /// Last event id, if the stream carries ids
        last_event_id: Option<String>,
    },
    /// Element entered the settling state.
    BeforeSettle,
    /// Element left the settling state.
    AfterSettle,
}

impl HostEvent {
    /// Host-facing event name.
    pub fn name(&self) -> &'static str {
        match self {
            HostEvent::SseOpen { .. } => events::SSE_OPEN,
            HostEvent::SseError { .. } => events::SSE_ERROR,
            HostEvent::SseMessage { .. } => events::SSE_MESSAGE,
            HostEvent::BeforeSettle => events::BEFORE_SETTLE,
            HostEvent::AfterSettle => events::AFTER_SETTLE,
        }
    }

    /// Whether the host should treat this as an error event.
    pub fn is_error(&self) -> bool {
        matches!(self, HostEvent::SseError { .. })
    }

    /// Event detail as handed to application listeners.
    pub fn detail(&self) -> Value {
        match self {
            HostEvent::SseOpen { connection } => json!({ "source": connection.to_string() }),
            HostEvent::SseError { connection, error } => json!({
                "error": error,
                "source": connection.to_string(),
            }),
            HostEvent::SseMessage {
                name,
                data,
                last_event_id,
            } => {
                let mut detail = json!({ "name": name, "data": data });
                if let Some(id) = last_event_id {
                    detail["lastEventId"] = Value::String(id.clone());
                }
                detail
            }
            HostEvent::BeforeSettle | HostEvent::AfterSettle => Value::Null,
        }
    }
}
