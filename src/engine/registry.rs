//! Element → connection bookkeeping.
//!
//! Every element owns at most one slot. A slot holds either a connection or
//! a pending reconnect, never both, so an element can never have two live
//! connections nor a live connection and a scheduled retry at once.
//!
//! The registry is the only place that mutates the mapping; everything
//! else goes through the lookups below. All operations take the internal
//! lock once, so check-and-replace sequences are atomic with respect to
//! each other.

use super::connection::Connection;
use super::retry::{PendingRetry, RetryId, ScheduledRetry};
use crate::client::TransportEvents;
use crate::types::{ConnectionId, ConnectionStatus, ElementId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

enum Slot {
    Live(Arc<Connection>),
    Retrying(PendingRetry),
}

impl Slot {
    fn release(self) {
        match self {
            Slot::Live(connection) => connection.close(),
            Slot::Retrying(pending) => pending.cancel(),
        }
    }
}

/// Outcome of [`ConnectionRegistry::ensure`].
pub enum Ensured {
    /// The element already had a usable connection.
    Existing(Arc<Connection>),
    /// A new connection was created; its events still need a consumer.
    Created(Arc<Connection>, TransportEvents),
}

impl Ensured {
    /// The connection, new or reused.
    pub fn connection(&self) -> &Arc<Connection> {
        match self {
            Ensured::Existing(connection) | Ensured::Created(connection, _) => connection,
        }
    }
}

/// Maps each element to at most one connection or pending reconnect.
#[derive(Default)]
pub struct ConnectionRegistry {
    slots: Mutex<HashMap<ElementId, Slot>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Lifecycle ==========

    /// Reuse the element's connection if it is not closed, otherwise create
    /// one with `create`.
    ///
    /// A closed connection or pending reconnect in the slot is released
    /// first.
    pub fn ensure<F>(&self, element: ElementId, create: F) -> Ensured
    where
        F: FnOnce() -> (Arc<Connection>, TransportEvents),
    {
        let mut slots = self.slots.lock();

        if let Some(Slot::Live(connection)) = slots.get(&element) {
            if connection.status().is_live() {
                return Ensured::Existing(Arc::clone(connection));
            }
        }

        if let Some(old) = slots.remove(&element) {
            old.release();
        }

        let (connection, events) = create();
        slots.insert(element, Slot::Live(Arc::clone(&connection)));
        Ensured::Created(connection, events)
    }

    /// Close and forget whatever the element owns. Idempotent.
    ///
    /// Returns whether there was anything to release.
    pub fn teardown(&self, element: ElementId) -> bool {
        let slot = self.slots.lock().remove(&element);
        match slot {
            Some(slot) => {
                slot.release();
                true
            }
            None => false,
        }
    }

    /// Release the slots of elements for which `keep` returns false.
    ///
    /// Returns the number of slots released.
    pub fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(ElementId) -> bool,
    {
        let released: Vec<Slot> = {
            let mut slots = self.slots.lock();
            let gone: Vec<ElementId> = slots.keys().copied().filter(|el| !keep(*el)).collect();
            gone.iter().filter_map(|el| slots.remove(el)).collect()
        };
        let count = released.len();
        for slot in released {
            slot.release();
        }
        count
    }

    /// Release every slot.
    pub fn clear(&self) {
        let drained: Vec<Slot> = self.slots.lock().drain().map(|(_, slot)| slot).collect();
        for slot in drained {
            slot.release();
        }
    }

    // ========== Retries ==========

    /// Swap the element's failed connection for a pending reconnect.
    ///
    /// `schedule` only runs while `connection` is still the element's
    /// current connection; otherwise the failure is stale and `None` is
    /// returned.
    pub fn park_retry<F>(
        &self,
        element: ElementId,
        connection: ConnectionId,
        schedule: F,
    ) -> Option<ScheduledRetry>
    where
        F: FnOnce() -> PendingRetry,
    {
        let mut slots = self.slots.lock();
        match slots.get(&element) {
            Some(Slot::Live(current)) if current.id() == connection => {}
            _ => return None,
        }

        let pending = schedule();
        let info = pending.info();
        slots.insert(element, Slot::Retrying(pending));
        Some(info)
    }

    /// Replace the pending reconnect `retry` with a connection from `create`,
    /// which receives the retry count for the new attempt.
    ///
    /// Returns `None` when the reconnect is no longer pending (cancelled,
    /// superseded by a fresh activation, or torn down).
    pub fn resume<F>(
        &self,
        element: ElementId,
        retry: RetryId,
        create: F,
    ) -> Option<(Arc<Connection>, TransportEvents)>
    where
        F: FnOnce(u32) -> (Arc<Connection>, TransportEvents),
    {
        let mut slots = self.slots.lock();
        let retry_count = match slots.get(&element) {
            Some(Slot::Retrying(pending)) if pending.id() == retry => pending.info().retry_count,
            _ => return None,
        };

        let (connection, events) = create(retry_count);
        slots.insert(element, Slot::Live(Arc::clone(&connection)));
        Some((connection, events))
    }

    /// Drop the pending reconnect `retry` without reconnecting.
    pub fn drop_retry(&self, element: ElementId, retry: RetryId) -> bool {
        let mut slots = self.slots.lock();
        match slots.get(&element) {
            Some(Slot::Retrying(pending)) if pending.id() == retry => {}
            _ => return false,
        }
        if let Some(slot) = slots.remove(&element) {
            slot.release();
        }
        true
    }

    // ========== Lookups ==========

    /// The element's connection, if it has one.
    pub fn get(&self, element: ElementId) -> Option<Arc<Connection>> {
        match self.slots.lock().get(&element) {
            Some(Slot::Live(connection)) => Some(Arc::clone(connection)),
            _ => None,
        }
    }

    /// Whether `connection` is the element's current connection.
    pub fn is_current(&self, element: ElementId, connection: ConnectionId) -> bool {
        matches!(
            self.slots.lock().get(&element),
            Some(Slot::Live(current)) if current.id() == connection
        )
    }

    /// Status of the element's connection.
    pub fn status(&self, element: ElementId) -> Option<ConnectionStatus> {
        self.get(element).map(|connection| connection.status())
    }

    /// The element's pending reconnect.
    pub fn pending_retry(&self, element: ElementId) -> Option<ScheduledRetry> {
        match self.slots.lock().get(&element) {
            Some(Slot::Retrying(pending)) => Some(pending.info()),
            _ => None,
        }
    }

    /// Number of connections that are not closed.
    pub fn live_count(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Live(c) if c.status().is_live()))
            .count()
    }

    /// Elements that own a connection or pending reconnect.
    pub fn elements(&self) -> Vec<ElementId> {
        self.slots.lock().keys().copied().collect()
    }
}
