//! Connection lifecycle, reconnects and message routing.
//!
//! # Module Organization
//!
//! ```text
//! engine/
//! ├── extension  - SseEngine, the façade hooked into the host
//! ├── registry   - Element → connection / pending reconnect
//! ├── connection - Per-element connection state machine
//! ├── retry      - Randomized exponential backoff
//! ├── router     - Out-of-band placement, named swaps, notifications
//! ├── oob        - Out-of-band resolver
//! ├── swap       - Swap executor and the two-phase settle
//! └── config     - Engine configuration
//! ```
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SseEngine`] | Entry point; reacts to host lifecycle events |
//! | [`ConnectionRegistry`] | At most one connection per element |
//! | [`Connection`] | One stream and its retry count |
//! | [`RetryScheduler`] | Backoff and reconnect timers |
//! | [`EventRouter`] | Per-message dispatch |
//! | [`SwapExecutor`] | Swaps plus settle protocol |
//!
//! Components are usable on their own; [`SseEngine`] is the only place that
//! wires them together.

mod config;
mod connection;
mod extension;
mod oob;
mod registry;
mod retry;
mod router;
mod swap;

pub use config::EngineConfig;
pub use connection::{Connection, Lifecycle};
pub use extension::SseEngine;
pub use oob::{OobReport, OutOfBandResolver};
pub use registry::{ConnectionRegistry, Ensured};
pub use retry::{PendingRetry, RetryId, RetryScheduler, ScheduledRetry};
pub use router::{EventRouter, RouteReport};
pub use swap::{Settlement, SwapExecutor};
