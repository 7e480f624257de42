//! The shared state store: values, expiration timers and subscriber lists
//! behind one reader/writer lock.

use crate::error::{Result, StoreError};
use crate::expiry::{ExpiryScheduler, TimerRecord};
use crate::subscriptions::{deliver_all, Delivery, DispatchQueue, SubscriptionManager, Watcher};
use crate::types::{Notification, SubscriptionId, Value};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::{RwLock, RwLockWriteGuard};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How notifications reach subscriber channels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Notifications are computed under the exclusive lock and sent after it is
    /// released, in commit order. A stalled subscriber holds up the writer that
    /// is delivering to it (and writers queued behind it), never readers.
    #[default]
    Deferred,

    /// Notifications are sent while the exclusive lock is held. A subscriber
    /// channel that cannot accept a message stalls every store operation until
    /// it drains.
    Locked,
}

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// When deliveries happen relative to the state lock.
    pub delivery: DeliveryMode,

    /// Capacity of the private channels created by `watch` and
    /// `start_subscription` (None = unbounded). With a bound, a handler that
    /// writes back to the store can wait on its own full channel.
    pub subscription_buffer: Option<usize>,

    /// Prefix for the names of the expiry worker and subscriber threads.
    pub thread_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            delivery: DeliveryMode::Deferred,
            subscription_buffer: None,
            thread_name: "shared-state".to_string(),
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delivery(mut self, delivery: DeliveryMode) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn with_subscription_buffer(mut self, capacity: usize) -> Self {
        self.subscription_buffer = Some(capacity);
        self
    }

    pub fn with_thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name = prefix.into();
        self
    }

    /// Channel for a subscription the store creates on the caller's behalf.
    pub(crate) fn subscription_channel(&self) -> (Sender<Notification>, Receiver<Notification>) {
        match self.subscription_buffer {
            Some(capacity) => bounded(capacity),
            None => unbounded(),
        }
    }
}

/// Everything guarded by the store lock.
#[derive(Default)]
struct StoreState {
    values: HashMap<String, Value>,
    timers: HashMap<String, TimerRecord>,
    subscriptions: SubscriptionManager,
}

pub(crate) struct StoreInner {
    config: StoreConfig,
    state: RwLock<StoreState>,
    dispatch: DispatchQueue,
    expiry: ExpiryScheduler,
    next_subscription: AtomicU64,
}

impl StoreInner {
    pub(crate) fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Deliver notifications for a write and release the lock.
    fn commit(&self, mut state: RwLockWriteGuard<'_, StoreState>, deliveries: Vec<Delivery>) {
        if deliveries.is_empty() {
            return;
        }

        match self.config.delivery {
            DeliveryMode::Locked => {
                let disconnected = deliver_all(deliveries);
                prune(&mut state, &disconnected);
            }
            DeliveryMode::Deferred => {
                let ticket = self.dispatch.ticket();
                drop(state);
                let disconnected = self.dispatch.deliver(ticket, deliveries);
                if !disconnected.is_empty() {
                    prune(&mut self.state.write(), &disconnected);
                }
            }
        }
    }

    /// Called by the expiry worker. Only the timer currently installed for
    /// `key` may expire it.
    pub(crate) fn expire(&self, key: &str, generation: u64) {
        let mut state = self.state.write();
        match state.timers.get(key) {
            Some(timer) if timer.generation() == generation => {}
            _ => {
                tracing::trace!(key = %key, generation, "ignoring superseded timer");
                return;
            }
        }

        state.timers.remove(key);
        state.values.remove(key);
        let deliveries = state.subscriptions.plan_expired(key);
        tracing::debug!(key = %key, subscribers = deliveries.len(), "key expired");

        self.commit(state, deliveries);
    }

    pub(crate) fn subscribe(
        &self,
        key: &str,
        sender: Sender<Notification>,
        conditional: bool,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst));
        self.state.write().subscriptions.register(id, key, sender, conditional);
        tracing::debug!(key = %key, subscription = id.0, conditional, "subscribed");
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.state.write().subscriptions.remove(id);
        if removed {
            tracing::debug!(subscription = id.0, "unsubscribed");
        }
        removed
    }
}

/// Drop subscriptions whose receivers have gone away.
fn prune(state: &mut StoreState, disconnected: &[SubscriptionId]) {
    for id in disconnected {
        if state.subscriptions.remove(*id) {
            tracing::warn!(subscription = id.0, "dropping subscriber with closed channel");
        }
    }
}

/// Thread-safe in-memory key-value store with per-key expiration and change
/// notifications.
///
/// Cloning the store yields another handle to the same state. Separately
/// constructed stores share nothing.
///
/// # Notifications
///
/// - `set` notifies every subscriber of the key, except conditional
///   subscribers when the key already held an equal value.
/// - `set_with_timeout` notifies every subscriber, always.
/// - `delete` and timer expiry send [`Notification::Expired`] to every
///   subscriber, even if the key was absent.
///
/// A plain `set` leaves any armed timer in place: the key still expires at the
/// original deadline, taking the new value with it.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<StoreInner>,
}

impl StateStore {
    /// Create an empty store with default configuration.
    ///
    /// # Panics
    ///
    /// Panics if the expiry worker thread cannot be spawned. Use
    /// [`StateStore::try_with_config`] to handle that case.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create an empty store with custom configuration.
    ///
    /// # Panics
    ///
    /// Panics if the expiry worker thread cannot be spawned.
    pub fn with_config(config: StoreConfig) -> Self {
        match Self::try_with_config(config) {
            Ok(store) => store,
            Err(e) => panic!("failed to start the expiry worker: {}", e),
        }
    }

    /// Create an empty store and its expiry worker thread.
    ///
    /// The worker is named `{thread_name}-expiry` and exits once the last
    /// handle to the store is dropped.
    pub fn try_with_config(config: StoreConfig) -> Result<Self> {
        let (expiry, worker) = ExpiryScheduler::channel();
        let thread_name = format!("{}-expiry", config.thread_name);
        let inner = Arc::new(StoreInner {
            config,
            state: RwLock::new(StoreState::default()),
            dispatch: DispatchQueue::new(),
            expiry,
            next_subscription: AtomicU64::new(1),
        });

        let store = Arc::downgrade(&inner);
        worker
            .spawn(thread_name, move |key, generation| match store.upgrade() {
                Some(inner) => {
                    inner.expire(key, generation);
                    true
                }
                None => false,
            })
            .map_err(|e| {
                tracing::error!(error = %e, "failed to start expiry worker");
                StoreError::Io(e)
            })?;

        Ok(Self { inner })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    // --- Writes ---

    /// Store a value, notifying subscribers of the key.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();

        let mut state = self.inner.state.write();
        let previous = state.values.insert(key.clone(), value.clone());
        let deliveries = state.subscriptions.plan_change(&key, previous.as_ref(), &value);
        tracing::debug!(
            key = %key,
            existed = previous.is_some(),
            subscribers = deliveries.len(),
            "set"
        );

        self.inner.commit(state, deliveries);
    }

    /// Store a value that expires after `duration`, replacing any timer the key
    /// already had. Every subscriber is notified, even if the value is unchanged.
    ///
    /// A zero duration expires the key as soon as possible. A duration too
    /// large to represent as a deadline never expires.
    pub fn set_with_timeout(
        &self,
        key: impl Into<String>,
        value: impl Into<Value>,
        duration: Duration,
    ) {
        let key = key.into();
        let value = value.into();

        // Arming under the lock keeps worker commands in commit order; the
        // worker cannot expire the key until the lock is released.
        let mut state = self.inner.state.write();
        let timer = self.inner.expiry.arm(&key, duration);

        state.values.insert(key.clone(), value.clone());
        let deliveries = state.subscriptions.plan_change(&key, None, &value);
        let replaced = state.timers.insert(key.clone(), timer).is_some();
        tracing::debug!(
            key = %key,
            ?duration,
            replaced_timer = replaced,
            subscribers = deliveries.len(),
            "set with timeout"
        );

        self.inner.commit(state, deliveries);
    }

    /// Remove a key and cancel its timer. Subscribers always receive an
    /// expiration notification, whether or not the key was present.
    pub fn delete(&self, key: &str) {
        let mut state = self.inner.state.write();
        let existed = state.values.remove(key).is_some();
        let timer = state.timers.remove(key);
        if let Some(timer) = &timer {
            self.inner.expiry.cancel(key, timer);
        }
        let deliveries = state.subscriptions.plan_expired(key);
        tracing::debug!(
            key = %key,
            existed,
            cancelled_timer = timer.is_some(),
            subscribers = deliveries.len(),
            "delete"
        );

        self.inner.commit(state, deliveries);
    }

    // --- Reads ---

    /// Current value for a key.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.state.read().values.get(key).cloned()
    }

    /// Current value for a key if it holds a string. A non-string value reads
    /// as absent; use [`StateStore::try_get_string`] to tell the two apart.
    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.inner.state.read().values.get(key) {
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        }
    }

    /// Like [`StateStore::get_string`], but a non-string value is an error.
    pub fn try_get_string(&self, key: &str) -> Result<Option<String>> {
        match self.inner.state.read().values.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(StoreError::WrongType {
                key: key.to_string(),
                expected: "string",
                found: other.type_name(),
            }),
        }
    }

    /// Current value for a key, any type. Same as [`StateStore::get`].
    pub fn get_struct(&self, key: &str) -> Option<Value> {
        self.get(key)
    }

    /// Decode the value for a key into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            Some(value) => value.decode().map(Some),
            None => Ok(None),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.state.read().values.contains_key(key)
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.inner.state.read().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.read().values.is_empty()
    }

    /// Snapshot of the stored keys, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.state.read().values.keys().cloned().collect()
    }

    /// Time left before the key's timer fires, if one is armed.
    pub fn expires_in(&self, key: &str) -> Option<Duration> {
        self.inner.state.read().timers.get(key).map(TimerRecord::remaining)
    }

    // --- Subscriptions ---

    /// Register a channel for notifications on `key`.
    ///
    /// The caller owns the channel. The same sender may be registered more than
    /// once and then receives each notification once per registration. With
    /// [`DeliveryMode::Locked`], a bounded channel that nobody drains blocks the
    /// whole store.
    pub fn subscribe(
        &self,
        key: impl Into<String>,
        sender: Sender<Notification>,
        conditional: bool,
    ) -> SubscriptionId {
        self.inner.subscribe(&key.into(), sender, conditional)
    }

    /// Remove a subscription. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.unsubscribe(id)
    }

    /// Subscribe through a private channel. Dropping the watcher unsubscribes.
    pub fn watch(&self, key: impl Into<String>, conditional: bool) -> Watcher {
        let key = key.into();
        let (sender, receiver) = self.inner.config.subscription_channel();
        let id = self.inner.subscribe(&key, sender, conditional);
        Watcher::new(id, key, receiver, Arc::downgrade(&self.inner))
    }

    /// Number of subscriptions on a key.
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.inner.state.read().subscriptions.count(key)
    }

    /// Number of subscriptions across all keys.
    pub fn subscription_count(&self) -> usize {
        self.inner.state.read().subscriptions.total()
    }

    pub(crate) fn inner(&self) -> &Arc<StoreInner> {
        &self.inner
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}
