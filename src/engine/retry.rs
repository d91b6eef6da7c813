//! Reconnect scheduling with randomized exponential backoff.
//!
//! After a terminal transport error on a connection with retry count `n`,
//! the owner waits `random() * 2^n * base` and reconnects with retry count
//! `min(max, n + 1)`. Retries never give up; once the ceiling is reached
//! they continue at the capped backoff.
//!
//! Each scheduled reconnect is a [`PendingRetry`] holding the abort handle
//! of its timer task, so it can be cancelled until the moment it fires.

use crate::client::{backoff_delay, next_retry_count};
use crate::types::ElementId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// Identity of one scheduled reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RetryId(u64);

/// Public view of a scheduled reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledRetry {
    /// Element that will be reconnected
    pub owner: ElementId,
    /// Retry count the new connection will carry
    pub retry_count: u32,
    /// When the timer was armed
    pub scheduled_at: Instant,
    /// Wait before reconnecting
    pub delay: Duration,
}

impl ScheduledRetry {
    /// When the reconnect fires.
    pub fn deadline(&self) -> Instant {
        self.scheduled_at + self.delay
    }
}

/// A reconnect waiting on its timer.
#[derive(Debug)]
pub struct PendingRetry {
    id: RetryId,
    info: ScheduledRetry,
    handle: AbortHandle,
}

impl PendingRetry {
    /// Retry id
    pub fn id(&self) -> RetryId {
        self.id
    }

    /// Snapshot of the schedule
    pub fn info(&self) -> ScheduledRetry {
        self.info
    }

    /// Stop the timer. The reconnect will not happen.
    pub fn cancel(&self) {
        self.handle.abort();
    }
}

/// Computes backoff and arms reconnect timers.
#[derive(Debug)]
pub struct RetryScheduler {
    base_delay_ms: u64,
    max_retry_count: u32,
    next_id: AtomicU64,
}

impl RetryScheduler {
    /// Scheduler with the given backoff unit and retry ceiling.
    pub fn new(base_delay_ms: u64, max_retry_count: u32) -> Self {
        RetryScheduler {
            base_delay_ms,
            max_retry_count,
            next_id: AtomicU64::new(1),
        }
    }

    /// Randomized backoff after a failure at `retry_count`.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        backoff_delay(retry_count, self.base_delay_ms, rand::random::<f64>())
    }

    /// Retry count of the next attempt.
    pub fn next_retry_count(&self, retry_count: u32) -> u32 {
        next_retry_count(retry_count, self.max_retry_count)
    }

    /// Arm a reconnect for `owner` after a failure at `retry_count`.
    ///
    /// `fire` runs on a timer task with the id of this retry, unless the
    /// returned [`PendingRetry`] is cancelled first. Must be called from
    /// within a Tokio runtime.
    pub fn schedule<F>(&self, owner: ElementId, retry_count: u32, fire: F) -> PendingRetry
    where
        F: FnOnce(RetryId) + Send + 'static,
    {
        let id = RetryId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let delay = self.delay_for(retry_count);
        let info = ScheduledRetry {
            owner,
            retry_count: self.next_retry_count(retry_count),
            scheduled_at: Instant::now(),
            delay,
        };

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire(id);
        })
        .abort_handle();

        PendingRetry { id, info, handle }
    }
}

impl Default for RetryScheduler {
    fn default() -> Self {
        use crate::protocol::constants::{BASE_RETRY_DELAY_MS, MAX_RETRY_COUNT};
        Self::new(BASE_RETRY_DELAY_MS, MAX_RETRY_COUNT)
    }
}
