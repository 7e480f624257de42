//! Per-key subscriber lists and the notification dispatch rule.

use crate::types::{Notification, SubscriptionId, Value};
use crossbeam_channel::Sender;
use std::collections::HashMap;

/// Decide whether a change notification reaches a subscriber.
///
/// A conditional subscriber is skipped only when the key already existed and
/// the previous value equals the new one.
pub fn should_deliver(conditional: bool, previous: Option<&Value>, new: &Value) -> bool {
    match previous {
        Some(old) => !conditional || old != new,
        None => true,
    }
}

/// Internal subscription record.
struct Subscriber {
    id: SubscriptionId,
    sender: Sender<Notification>,
    conditional: bool,
}

/// A notification bound for one subscriber's channel.
pub(crate) struct Delivery {
    pub id: SubscriptionId,
    pub sender: Sender<Notification>,
    pub notification: Notification,
}

impl Delivery {
    /// Blocking send. Returns false if the receiver is gone.
    pub fn send(self) -> bool {
        self.sender.send(self.notification).is_ok()
    }
}

/// Subscriber lists keyed by state key, in registration order.
#[derive(Default)]
pub(crate) struct SubscriptionManager {
    by_key: HashMap<String, Vec<Subscriber>>,
    /// Reverse index for removal by ID.
    keys: HashMap<SubscriptionId, String>,
}

impl SubscriptionManager {
    /// Append a subscription. No deduplication: the same channel may be added repeatedly.
    pub fn register(
        &mut self,
        id: SubscriptionId,
        key: &str,
        sender: Sender<Notification>,
        conditional: bool,
    ) {
        self.by_key.entry(key.to_string()).or_default().push(Subscriber {
            id,
            sender,
            conditional,
        });
        self.keys.insert(id, key.to_string());
    }

    /// Remove one subscription. Returns false if it was not registered.
    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        let Some(key) = self.keys.remove(&id) else {
            return false;
        };

        if let Some(subs) = self.by_key.get_mut(&key) {
            subs.retain(|s| s.id != id);
            if subs.is_empty() {
                self.by_key.remove(&key);
            }
        }
        true
    }

    /// Number of subscriptions on a key.
    pub fn count(&self, key: &str) -> usize {
        self.by_key.get(key).map_or(0, Vec::len)
    }

    /// Total number of subscriptions across all keys.
    pub fn total(&self) -> usize {
        self.keys.len()
    }

    /// Deliveries for a value change, filtered by each subscriber's conditional flag.
    ///
    /// `previous` is the value before the write, or `None` if the key was absent
    /// (timed writes always pass `None`).
    pub fn plan_change(&self, key: &str, previous: Option<&Value>, new: &Value) -> Vec<Delivery> {
        let Some(subs) = self.by_key.get(key) else {
            return Vec::new();
        };

        subs.iter()
            .filter(|sub| {
                let deliver = should_deliver(sub.conditional, previous, new);
                if !deliver {
                    tracing::trace!(
                        key = %key,
                        subscription = sub.id.0,
                        "suppressed unchanged value"
                    );
                }
                deliver
            })
            .map(|sub| Delivery {
                id: sub.id,
                sender: sub.sender.clone(),
                notification: Notification::Changed {
                    key: key.to_string(),
                    value: new.clone(),
                },
            })
            .collect()
    }

    /// Deliveries for an expiration. Never suppressed.
    pub fn plan_expired(&self, key: &str) -> Vec<Delivery> {
        let Some(subs) = self.by_key.get(key) else {
            return Vec::new();
        };

        subs.iter()
            .map(|sub| Delivery {
                id: sub.id,
                sender: sub.sender.clone(),
                notification: Notification::Expired {
                    key: key.to_string(),
                },
            })
            .collect()
    }
}
