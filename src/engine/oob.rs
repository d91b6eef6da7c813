//! Out-of-band placement of payload nodes.
//!
//! Every top-level node of a message payload that carries an `hx-swap-oob`
//! directive is handed to the host for placement, independently of the
//! element that received the message. Nodes are processed one by one; a
//! failing node is recorded and the rest still go through.

use crate::error::SseError;
use crate::host::Host;
use crate::protocol::oob_directive;
use crate::types::SettleInfo;
use std::sync::Arc;

/// What happened to the nodes of one payload.
#[derive(Debug, Default)]
pub struct OobReport {
    /// Nodes placed by the host
    pub placed: usize,
    /// Nodes without a directive
    pub ignored: usize,
    /// Nodes the host failed to place
    pub failures: Vec<SseError>,
}

/// Hands directive-carrying payload nodes to the host.
pub struct OutOfBandResolver<H: Host> {
    host: Arc<H>,
}

impl<H: Host> OutOfBandResolver<H> {
    /// Resolver placing through `host`.
    pub fn new(host: Arc<H>) -> Self {
        OutOfBandResolver { host }
    }

    /// Place each node carrying a directive. Placements share `settle`.
    pub fn resolve(&self, nodes: Vec<H::FragmentNode>, settle: &mut SettleInfo) -> OobReport {
        let mut report = OobReport::default();

        for node in nodes {
            let Some(directive) = oob_directive(&*self.host, &node) else {
                report.ignored += 1;
                continue;
            };

            match self.host.oob_swap(&directive, node, settle) {
                Ok(()) => report.placed += 1,
                Err(e) => {
                    tracing::warn!(directive = %directive, "out-of-band placement failed: {}", e);
                    report.failures.push(e);
                }
            }
        }

        report
    }
}
