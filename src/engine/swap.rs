//! Named swaps and the two-phase settle protocol.
//!
//! A swap target receives the raw message payload:
//!
//! 1. content transformers run over the payload
//! 2. the host resolves swap style and the node the swap lands on
//! 3. the host performs the swap, filling a fresh [`SettleInfo`]
//! 4. every touched element gets the settling class and `htmx:beforeSettle`
//! 5. after the settle delay (immediately when zero) the deferred tasks run,
//!    then every element loses the class and gets `htmx:afterSettle`
//!
//! Each swap owns its settle record, so concurrent swaps never share state.

use crate::error::{Result, SseError};
use crate::host::{Host, HostEvent};
use crate::types::{ElementId, SettleInfo};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// How a swap's settle phase completed.
#[derive(Debug)]
pub enum Settlement {
    /// Settled synchronously
    Settled,
    /// Settle phase runs after a delay on this task
    Deferred(JoinHandle<()>),
    /// The declaration resolved to no target; nothing happened
    NoTarget,
}

impl Settlement {
    /// Wait for a deferred settle phase to finish.
    pub async fn wait(self) {
        if let Settlement::Deferred(handle) = self {
            let _ = handle.await;
        }
    }
}

/// Applies payloads to swap targets.
pub struct SwapExecutor<H: Host> {
    host: Arc<H>,
    settling_class: Arc<str>,
}

impl<H: Host> SwapExecutor<H> {
    /// Executor swapping through `host` and marking settling elements with
    /// `settling_class`.
    pub fn new(host: Arc<H>, settling_class: impl Into<Arc<str>>) -> Self {
        SwapExecutor {
            host,
            settling_class: settling_class.into(),
        }
    }

    /// Swap `raw_content` into the target declared by `element`.
    pub fn apply(&self, element: ElementId, raw_content: &str) -> Result<Settlement> {
        if !self.host.is_live(element) {
            return Err(SseError::Detached(element));
        }

        let content = self.host.transform_content(element, raw_content.to_string());
        let spec = self.host.swap_spec(element);
        let Some(target) = self.host.swap_target(element) else {
            tracing::trace!(element = %element, "swap declaration resolved to no target");
            return Ok(Settlement::NoTarget);
        };

        let mut settle = SettleInfo::new();
        self.host
            .swap(spec.style, target, element, &content, &mut settle)?;

        Ok(self.settle(settle, spec.settle_delay))
    }

    /// Run the settle protocol over `info`.
    pub fn settle(&self, info: SettleInfo, delay: Duration) -> Settlement {
        for element in &info.elements {
            self.host.add_class(*element, &self.settling_class);
            self.host.trigger_event(*element, &HostEvent::BeforeSettle);
        }

        if delay.is_zero() || info.is_empty() {
            finish_settle(&*self.host, &self.settling_class, info);
            return Settlement::Settled;
        }

        let host = Arc::clone(&self.host);
        let class = Arc::clone(&self.settling_class);
        Settlement::Deferred(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            finish_settle(&*host, &class, info);
        }))
    }
}

fn finish_settle<H: Host>(host: &H, class: &str, info: SettleInfo) {
    for task in info.tasks {
        task();
    }
    for element in info.elements {
        host.remove_class(element, class);
        host.trigger_event(element, &HostEvent::AfterSettle);
    }
}
