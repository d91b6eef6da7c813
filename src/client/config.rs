//! Configuration of the default HTTP transport.

use serde::Deserialize;

/// Settings for [`HttpTransport`](super::HttpTransport).
///
/// # Examples
///
/// ```
/// use sse_trigger::client::ClientConfig;
///
/// let config: ClientConfig = serde_json::from_str(r#"{ "connect_timeout_ms": 2500 }"#).unwrap();
/// assert_eq!(config.connect_timeout_ms, 2500);
/// assert!(config.with_credentials);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Keep a cookie store and send credentials with stream requests
    pub with_credentials: bool,
    /// Connection establishment timeout; streams themselves never time out
    pub connect_timeout_ms: u64,
    /// Idle connections kept per host
    pub max_idle_per_host: usize,
    /// Proxy for all requests, empty for none
    pub proxy_url: String,
    /// Capacity of each source's event channel
    pub event_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            with_credentials: true,
            connect_timeout_ms: 10_000,
            max_idle_per_host: 8,
            proxy_url: String::new(),
            event_buffer: 100,
        }
    }
}
