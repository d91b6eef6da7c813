//! Resolution of element declarations into typed values.
//!
//! Declarations are plain attributes on host elements. They are read at
//! well-defined points only:
//!
//! | Declaration | Resolved into | When |
//! |-------------|---------------|------|
//! | `hx-sse-<verb>` | [`StreamSource`] | activation, reconnect |
//! | `hx-sse-events` | [`Subscription`] | activation (attach) |
//! | `sse-swap` | [`SwapTarget`] | every routed message |
//! | `hx-swap-oob` | directive string | every parsed payload node |
//!
//! Every name may also be spelled with a `data-` prefix.
//!
//! # Examples
//!
//! ```
//! use sse_trigger::protocol::parse_name_list;
//!
//! assert_eq!(parse_name_list(" update, tick ,,"), vec!["update", "tick"]);
//! assert!(parse_name_list("").is_empty());
//! ```

use super::constants::attributes;
use crate::error::Result;
use crate::host::Host;
use crate::types::{ElementId, Subscription, SwapTarget};
use http::Method;
use url::Url;

/// Stream source verbs in lookup order.
pub const SOURCE_VERBS: [(&str, Method); 5] = [
    (attributes::SSE_GET, Method::GET),
    (attributes::SSE_POST, Method::POST),
    (attributes::SSE_PUT, Method::PUT),
    (attributes::SSE_DELETE, Method::DELETE),
    (attributes::SSE_PATCH, Method::PATCH),
];

/// A resolved stream source declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSource {
    /// Element carrying the declaration; owner of the Connection
    pub element: ElementId,
    /// Verb of the declaration
    pub method: Method,
    /// Absolute stream URL
    pub url: Url,
}

/// Split a comma-separated name list, trimming entries and dropping empty ones.
pub fn parse_name_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Attribute value under its plain or `data-` spelling.
///
/// Empty values fall through to the alternate spelling.
pub fn attribute_value<H: Host + ?Sized>(host: &H, element: ElementId, name: &str) -> Option<String> {
    let plain = host.raw_attribute(element, name).filter(|v| !v.is_empty());
    plain.or_else(|| {
        host.raw_attribute(element, &data_name(name))
            .filter(|v| !v.is_empty())
    })
}

/// Whether the element declares `name` under either spelling.
pub fn has_attribute<H: Host + ?Sized>(host: &H, element: ElementId, name: &str) -> bool {
    host.raw_attribute(element, name).is_some()
        || host.raw_attribute(element, &data_name(name)).is_some()
}

/// `element` itself (first, when it declares `name`) followed by its
/// declaring descendants.
pub fn query_this_or_children<H: Host + ?Sized>(
    host: &H,
    element: ElementId,
    name: &str,
) -> Vec<ElementId> {
    let mut found = Vec::new();
    if has_attribute(host, element, name) {
        found.push(element);
    }
    let alternate = data_name(name);
    for node in host.query_descendants(element, &[name, alternate.as_str()]) {
        if !found.contains(&node) {
            found.push(node);
        }
    }
    found
}

/// `element` and its descendants that carry a stream source declaration.
pub fn source_owners<H: Host + ?Sized>(host: &H, element: ElementId) -> Vec<ElementId> {
    let mut owners: Vec<ElementId> = Vec::new();
    for (name, _) in SOURCE_VERBS.iter() {
        for owner in query_this_or_children(host, element, name) {
            if !owners.contains(&owner) {
                owners.push(owner);
            }
        }
    }
    owners
}

/// The stream source `element` itself declares.
///
/// An element declaring several verbs keeps the first in [`SOURCE_VERBS`]
/// order. The URL is resolved against the host's base URL; `None` when
/// the element declares no non-empty source.
pub fn resolve_source<H: Host + ?Sized>(host: &H, element: ElementId) -> Option<Result<StreamSource>> {
    let (method, raw) = SOURCE_VERBS.iter().find_map(|(name, method)| {
        attribute_value(host, element, name).map(|raw| (method.clone(), raw))
    })?;
    let source = resolve_url(host.base_url().as_ref(), &raw).map(|url| StreamSource {
        element,
        method,
        url,
    });
    Some(source)
}

/// Subscription declared by a stream owner.
pub fn resolve_subscription<H: Host + ?Sized>(host: &H, element: ElementId) -> Subscription {
    attribute_value(host, element, attributes::SSE_EVENTS)
        .map(|value| Subscription::new(parse_name_list(&value)))
        .unwrap_or_default()
}

/// Swap targets under `root` (including `root`) that swap on `event_name`.
///
/// Queried fresh for every message so document changes between messages
/// are respected.
pub fn resolve_swap_targets<H: Host + ?Sized>(
    host: &H,
    root: ElementId,
    event_name: &str,
) -> Vec<SwapTarget> {
    query_this_or_children(host, root, attributes::SSE_SWAP)
        .into_iter()
        .filter_map(|element| {
            let value = attribute_value(host, element, attributes::SSE_SWAP)?;
            Some(SwapTarget {
                element,
                events: parse_name_list(&value),
            })
        })
        .filter(|target| target.swaps_on(event_name))
        .collect()
}

/// Out-of-band directive of a parsed payload node, if it has one.
pub fn oob_directive<H: Host + ?Sized>(host: &H, node: &H::FragmentNode) -> Option<String> {
    host.fragment_attribute(node, attributes::SWAP_OOB)
        .filter(|v| !v.is_empty())
        .or_else(|| {
            host.fragment_attribute(node, &data_name(attributes::SWAP_OOB))
                .filter(|v| !v.is_empty())
        })
}

/// Resolve a declared URL against an optional base.
pub fn resolve_url(base: Option<&Url>, raw: &str) -> Result<Url> {
    let raw = raw.trim();
    let url = match base {
        Some(base) => base.join(raw)?,
        None => Url::parse(raw)?,
    };
    Ok(url)
}

fn data_name(name: &str) -> String {
    format!("{}{}", attributes::DATA_PREFIX, name)
}
