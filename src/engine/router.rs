//! Routing of subscribed messages.
//!
//! For every message delivered on a connection the router:
//!
//! 1. parses the payload and lets the [`OutOfBandResolver`] place any
//!    directive-carrying top-level nodes
//! 2. swaps the raw payload into every swap target under the owner whose
//!    declaration lists the event name (targets are queried per message)
//! 3. emits `htmx:sseMessage` on the owner, whether or not anything swapped
//!
//! Failures in one step never stop the next.

use super::connection::Connection;
use super::oob::{OobReport, OutOfBandResolver};
use super::swap::{Settlement, SwapExecutor};
use crate::error::SseError;
use crate::host::{Host, HostEvent};
use crate::protocol::{resolve_subscription, resolve_swap_targets};
use crate::types::{ElementId, SettleInfo, SseMessage, Subscription};
use std::sync::Arc;

/// Summary of one routed message.
#[derive(Debug, Default)]
pub struct RouteReport {
    /// Out-of-band outcome; empty when the payload did not parse
    pub oob: OobReport,
    /// The payload could not be parsed as a fragment
    pub parse_error: Option<SseError>,
    /// Named swaps performed
    pub swapped: usize,
    /// Named swaps that failed
    pub swap_failures: Vec<SseError>,
}

/// Dispatches messages to out-of-band placement and named swaps.
pub struct EventRouter<H: Host> {
    host: Arc<H>,
    oob: OutOfBandResolver<H>,
    swap: SwapExecutor<H>,
}

impl<H: Host> EventRouter<H> {
    /// Router over `host`, marking settling elements with `settling_class`.
    pub fn new(host: Arc<H>, settling_class: impl Into<Arc<str>>) -> Self {
        EventRouter {
            oob: OutOfBandResolver::new(Arc::clone(&host)),
            swap: SwapExecutor::new(Arc::clone(&host), settling_class),
            host,
        }
    }

    /// Resolve the owner's subscription and install it on `connection`.
    pub fn attach(&self, element: ElementId, connection: &Connection) -> Subscription {
        let subscription = resolve_subscription(&*self.host, element);
        if subscription.is_empty() {
            tracing::warn!(element = %element, "stream source declares no event names");
        }
        connection.set_subscription(subscription.clone());
        subscription
    }

    /// Route one message received by `owner`.
    pub fn route(&self, owner: ElementId, message: &SseMessage) -> RouteReport {
        let mut report = RouteReport::default();

        match self.host.parse_fragment(&message.payload) {
            Ok(nodes) => {
                let mut settle = SettleInfo::new();
                report.oob = self.oob.resolve(nodes, &mut settle);
                if !settle.is_empty() {
                    let delay = self.host.swap_spec(owner).settle_delay;
                    self.swap.settle(settle, delay);
                }
            }
            Err(e) => {
                tracing::warn!(event = %message.event_name, "payload is not a valid fragment: {}", e);
                report.parse_error = Some(e);
            }
        }

        for target in resolve_swap_targets(&*self.host, owner, &message.event_name) {
            match self.swap.apply(target.element, &message.payload) {
                Ok(Settlement::NoTarget) => {}
                Ok(_) => report.swapped += 1,
                Err(e) => {
                    tracing::warn!(target = %target.element, "swap failed: {}", e);
                    report.swap_failures.push(e);
                }
            }
        }

        self.host.trigger_event(
            owner,
            &HostEvent::SseMessage {
                name: message.event_name.clone(),
                data: message.payload.clone(),
                last_event_id: message.last_event_id.clone(),
            },
        );

        tracing::trace!(
            owner = %owner,
            event = %message.event_name,
            oob = report.oob.placed,
            swapped = report.swapped,
            "message routed"
        );
        report
    }
}
