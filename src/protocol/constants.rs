//! Declaration names, notification names and protocol defaults.

/// Element declarations consumed by the engine.
///
/// Each can also be spelled with a `data-` prefix.
pub mod attributes {
    /// Prefix of the alternate spelling
    pub const DATA_PREFIX: &str = "data-";

    /// Stream sources, one per verb
    pub const SSE_GET: &str = "hx-sse-get";
    /// POST stream source
    pub const SSE_POST: &str = "hx-sse-post";
    /// PUT stream source
    pub const SSE_PUT: &str = "hx-sse-put";
    /// DELETE stream source
    pub const SSE_DELETE: &str = "hx-sse-delete";
    /// PATCH stream source
    pub const SSE_PATCH: &str = "hx-sse-patch";

    /// Comma-separated event names the stream owner subscribes to
    pub const SSE_EVENTS: &str = "hx-sse-events";
    /// Comma-separated event names a descendant swaps on
    pub const SSE_SWAP: &str = "sse-swap";
    /// Out-of-band placement directive on payload nodes
    pub const SWAP_OOB: &str = "hx-swap-oob";
}

/// Notifications emitted to, and hooks received from, the host.
pub mod events {
    /// Stream accepted
    pub const SSE_OPEN: &str = "htmx:sseOpen";
    /// Transport failure
    pub const SSE_ERROR: &str = "htmx:sseError";
    /// Subscribed message routed
    pub const SSE_MESSAGE: &str = "htmx:sseMessage";
    /// Element entered the settling state
    pub const BEFORE_SETTLE: &str = "htmx:beforeSettle";
    /// Element left the settling state
    pub const AFTER_SETTLE: &str = "htmx:afterSettle";

    /// Host hook: element was triggered
    pub const TRIGGER: &str = "htmx:trigger";
    /// Host hook: element is about to be removed
    pub const BEFORE_CLEANUP_ELEMENT: &str = "htmx:beforeCleanupElement";
    /// Host hook: element was processed
    pub const AFTER_PROCESS_NODE: &str = "htmx:afterProcessNode";
}

/// Request header names and values used when opening a stream.
pub mod headers {
    /// Form body content type
    pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
    /// Event stream media type
    pub const EVENT_STREAM: &str = "text/event-stream";
}

/// Ceiling of a connection's retry count.
pub const MAX_RETRY_COUNT: u32 = 7;

/// Backoff unit in milliseconds.
pub const BASE_RETRY_DELAY_MS: u64 = 500;

/// Settle delay applied when a swap declaration gives none.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 20;

/// Class applied to elements during the settle phase.
pub const DEFAULT_SETTLING_CLASS: &str = "htmx-settling";

/// Event name used when a stream event carries none.
pub const DEFAULT_EVENT_NAME: &str = "message";
