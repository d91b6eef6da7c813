//! Engine configuration.

use crate::protocol::constants::{BASE_RETRY_DELAY_MS, DEFAULT_SETTLING_CLASS, MAX_RETRY_COUNT};
use serde::Deserialize;

/// Settings for [`SseEngine`](super::SseEngine).
///
/// # Examples
///
/// ```
/// use sse_trigger::engine::EngineConfig;
///
/// let config = EngineConfig {
///     base_retry_delay_ms: 250,
///     ..Default::default()
/// };
/// assert_eq!(config.max_retry_count, 7);
/// assert_eq!(config.settling_class, "htmx-settling");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Class applied to elements while they settle
    pub settling_class: String,
    /// Backoff unit; retry `n` waits up to `2^n` units
    pub base_retry_delay_ms: u64,
    /// Ceiling of the retry count
    pub max_retry_count: u32,
    /// Log recoverable failures (transport errors, failed placements)
    pub enable_logging: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            settling_class: DEFAULT_SETTLING_CLASS.to_string(),
            base_retry_delay_ms: BASE_RETRY_DELAY_MS,
            max_retry_count: MAX_RETRY_COUNT,
            enable_logging: true,
        }
    }
}
