//! Handler-driven subscriptions.

use super::types::SubscriptionHandle;
use crate::error::Result;
use crate::store::StateStore;
use crate::types::Notification;
use std::sync::Arc;
use std::thread;

/// Subscribe `handler` to `key` on a dedicated thread.
///
/// Creates a private channel, registers it, and runs `handler` for every
/// notification in arrival order until the subscription is cancelled or the
/// store is dropped. The returned handle may be discarded; the subscription
/// keeps running.
///
/// # Errors
///
/// Returns `StoreError::Io` if the handler thread cannot be spawned; nothing is
/// registered in that case.
pub fn start_subscription<F>(
    store: &StateStore,
    key: impl Into<String>,
    mut handler: F,
    conditional: bool,
) -> Result<SubscriptionHandle>
where
    F: FnMut(Notification) + Send + 'static,
{
    let key = key.into();
    let inner = store.inner();
    let (sender, receiver) = inner.config().subscription_channel();

    let thread_key = key.clone();
    let thread = thread::Builder::new()
        .name(format!("{}-subscriber", inner.config().thread_name))
        .spawn(move || {
            for notification in receiver.iter() {
                handler(notification);
            }
            tracing::debug!(key = %thread_key, "subscription channel closed");
        })?;

    let id = inner.subscribe(&key, sender, conditional);
    Ok(SubscriptionHandle::new(id, key, Arc::downgrade(inner), thread))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;
    use crossbeam_channel::unbounded;
    use std::time::Duration;

    #[test]
    fn test_handler_sees_notifications_in_order() {
        let store = StateStore::new();
        let (tx, rx) = unbounded();
        let handle = start_subscription(&store, "k", move |n| tx.send(n).unwrap(), false).unwrap();

        store.set("k", 1i64);
        store.set("k", 2i64);
        store.delete("k");

        let received: Vec<Notification> = (0..3)
            .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        assert_eq!(received[0].value(), Some(&Value::Int(1)));
        assert_eq!(received[1].value(), Some(&Value::Int(2)));
        assert!(received[2].is_expiration());

        handle.cancel();
    }

    #[test]
    fn test_cancel_removes_subscription_and_joins() {
        let store = StateStore::new();
        let handle = start_subscription(&store, "k", |_| {}, true).unwrap();
        assert_eq!(store.subscriber_count("k"), 1);
        assert_eq!(handle.key(), "k");

        handle.cancel();
        assert_eq!(store.subscriber_count("k"), 0);
    }

    #[test]
    fn test_dropped_handle_keeps_subscription() {
        let store = StateStore::new();
        let handle = start_subscription(&store, "k", |_| {}, false).unwrap();
        let id = handle.id();
        drop(handle);

        assert_eq!(store.subscriber_count("k"), 1);
        assert!(store.unsubscribe(id));
    }

    #[test]
    fn test_handler_thread_finishes_when_store_drops() {
        let store = StateStore::new();
        let handle = start_subscription(&store, "k", |_| {}, false).unwrap();
        assert!(!handle.is_finished());

        drop(store);
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while !handle.is_finished() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(handle.is_finished());
        // Nothing left to unsubscribe from
        handle.cancel();
    }
}
