//! Subscriber-side handles.

use crate::store::StoreInner;
use crate::types::{Notification, SubscriptionId};
use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::sync::Weak;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Receiving end of a subscription created by [`crate::StateStore::watch`].
///
/// Dropping the watcher removes the subscription from the store.
pub struct Watcher {
    id: SubscriptionId,
    key: String,
    receiver: Receiver<Notification>,
    store: Weak<StoreInner>,
}

impl Watcher {
    pub(crate) fn new(
        id: SubscriptionId,
        key: String,
        receiver: Receiver<Notification>,
        store: Weak<StoreInner>,
    ) -> Self {
        Self {
            id,
            key,
            receiver,
            store,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Receive the next notification (blocking).
    pub fn recv(&self) -> Result<Notification, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a notification (non-blocking).
    pub fn try_recv(&self) -> Result<Notification, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Notification, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything currently buffered, without blocking.
    pub fn drain(&self) -> Vec<Notification> {
        self.receiver.try_iter().collect()
    }

    /// The underlying channel, for use with `crossbeam_channel::select!`.
    pub fn receiver(&self) -> &Receiver<Notification> {
        &self.receiver
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            inner.unsubscribe(self.id);
        }
    }
}

/// Handle to a subscription started with [`crate::start_subscription`].
///
/// Dropping the handle detaches it, like [`std::thread::JoinHandle`]: the
/// subscription keeps delivering until the store goes away. Call
/// [`SubscriptionHandle::cancel`] to remove it and stop the handler thread.
pub struct SubscriptionHandle {
    id: SubscriptionId,
    key: String,
    store: Weak<StoreInner>,
    thread: JoinHandle<()>,
}

impl SubscriptionHandle {
    pub(crate) fn new(
        id: SubscriptionId,
        key: String,
        store: Weak<StoreInner>,
        thread: JoinHandle<()>,
    ) -> Self {
        Self {
            id,
            key,
            store,
            thread,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// True once the handler thread has exited, which happens after the
    /// subscription is removed or the store is dropped.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Remove the subscription and wait for the handler thread to finish
    /// the notifications already buffered.
    ///
    /// When called from the handler itself the thread is not joined.
    pub fn cancel(self) {
        if let Some(inner) = self.store.upgrade() {
            inner.unsubscribe(self.id);
        }
        if self.thread.thread().id() == thread::current().id() {
            return;
        }
        if self.thread.join().is_err() {
            tracing::warn!(
                key = %self.key,
                subscription = self.id.0,
                "subscription handler panicked"
            );
        }
    }
}
