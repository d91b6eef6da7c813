//! Utility functions for stream requests and reconnects.
//!
//! This module provides helper functions for:
//! - Form-encoding the input values sent with a stream request
//! - Building the [`StreamRequest`] for a declared source
//! - Backoff delay calculation
//! - Status code classification

use crate::protocol::constants::headers;
use crate::protocol::StreamSource;
use crate::types::{FormValue, StreamRequest};
use http::Method;
use std::time::Duration;
use url::form_urlencoded;

/// Form-encode input values. Multi-valued inputs repeat their key.
///
/// # Examples
///
/// ```
/// use sse_trigger::client::encode_form;
/// use sse_trigger::FormValue;
///
/// let values = vec![
///     ("q".to_string(), FormValue::from("a b")),
///     ("tag".to_string(), FormValue::from(vec!["x".to_string(), "y".to_string()])),
/// ];
/// assert_eq!(encode_form(&values), "q=a+b&tag=x&tag=y");
/// ```
pub fn encode_form(values: &[(String, FormValue)]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (name, value) in values {
        match value {
            FormValue::Single(v) => {
                serializer.append_pair(name, v);
            }
            FormValue::Multiple(vs) => {
                for v in vs {
                    serializer.append_pair(name, v);
                }
            }
        }
    }
    serializer.finish()
}

/// Whether the method sends its payload as a request body.
pub fn method_has_body(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::DELETE)
}

/// Build the request for a declared source.
///
/// Body-carrying verbs send the form payload as
/// `application/x-www-form-urlencoded`; the others append it to the query.
pub fn build_stream_request(
    source: &StreamSource,
    values: &[(String, FormValue)],
    with_credentials: bool,
) -> StreamRequest {
    let payload = encode_form(values);
    let mut url = source.url.clone();

    let mut request = if method_has_body(&source.method) {
        StreamRequest::new(url.as_str())
            .with_header(http::header::CONTENT_TYPE.as_str(), headers::FORM_CONTENT_TYPE)
            .with_payload(payload)
    } else {
        if !payload.is_empty() {
            let query = match url.query() {
                Some(existing) if !existing.is_empty() => format!("{}&{}", existing, payload),
                _ => payload,
            };
            url.set_query(Some(&query));
        }
        StreamRequest::new(url.as_str())
    };

    request.method = source.method.clone();
    request.with_credentials = with_credentials;
    request
}

/// Check if status code indicates a transient failure
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 425 | 429 | 500 | 502 | 503 | 504)
}

/// Backoff before reconnect attempt `retry_count`.
///
/// `random` is drawn from `[0.0, 1.0)`; the delay is
/// `random * 2^retry_count * base_ms`, so it always stays below the
/// undithered ceiling.
pub fn backoff_delay(retry_count: u32, base_ms: u64, random: f64) -> Duration {
    let ceiling = base_ms.saturating_mul(1u64 << retry_count.min(31));
    let random = random.clamp(0.0, 1.0);
    Duration::from_secs_f64(ceiling as f64 * random / 1000.0)
}

/// Retry count of the attempt after `retry_count`, capped at `max`.
pub fn next_retry_count(retry_count: u32, max: u32) -> u32 {
    retry_count.saturating_add(1).min(max)
}
