//! Ordered delivery of notifications outside the state lock.
//!
//! Writers take a ticket while they still hold the exclusive state lock, so
//! ticket order is commit order. After releasing the lock each writer waits
//! for its turn, delivers, and hands the turn to the next ticket. Readers and
//! other writers keep using the state while a delivery is in flight.

use super::manager::Delivery;
use crate::types::SubscriptionId;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};

/// Position in the delivery queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ticket(u64);

pub(crate) struct DispatchQueue {
    next: AtomicU64,
    serving: Mutex<u64>,
    turn: Condvar,
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
            serving: Mutex::new(0),
            turn: Condvar::new(),
        }
    }

    /// Reserve the next delivery slot. Call with the state lock held exclusively,
    /// and always pass the ticket to [`DispatchQueue::deliver`].
    pub fn ticket(&self) -> Ticket {
        Ticket(self.next.fetch_add(1, Ordering::SeqCst))
    }

    /// Wait for this ticket's turn, then deliver. Returns the subscriptions whose
    /// receivers are gone.
    pub fn deliver(&self, ticket: Ticket, deliveries: Vec<Delivery>) -> Vec<SubscriptionId> {
        let mut serving = self.serving.lock();
        while *serving != ticket.0 {
            self.turn.wait(&mut serving);
        }
        drop(serving);

        let _turn = Turn { queue: self };
        deliver_all(deliveries)
    }
}

/// Hands the turn to the next ticket when dropped.
struct Turn<'a> {
    queue: &'a DispatchQueue,
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        let mut serving = self.queue.serving.lock();
        *serving += 1;
        self.queue.turn.notify_all();
    }
}

/// Send each delivery in order, blocking on full bounded channels.
pub(crate) fn deliver_all(deliveries: Vec<Delivery>) -> Vec<SubscriptionId> {
    let mut disconnected = Vec::new();
    for delivery in deliveries {
        let id = delivery.id;
        tracing::trace!(key = %delivery.notification.key(), subscription = id.0, "delivering");
        if !delivery.send() {
            disconnected.push(id);
        }
    }
    disconnected
}
