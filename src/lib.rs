//! # Shared State
//!
//! An in-process key-value store for coordinating concurrent workers.
//!
//! ## Core Concepts
//!
//! - **Values**: One [`Value`] per string key, read and written under a single
//!   reader/writer lock
//! - **Expiration**: Timed writes arm a per-key timer on the store's expiry
//!   worker; re-arming replaces the previous one, and an expired key is
//!   removed and announced
//! - **Subscriptions**: Channels registered per key receive a [`Notification`]
//!   for every change and every removal, optionally skipping unchanged writes
//!
//! Nothing is persisted and nothing crosses the process boundary.
//!
//! ## Example
//!
//! ```no_run
//! use shared_state::{Notification, StateStore};
//! use std::time::Duration;
//!
//! let store = StateStore::new();
//! let watcher = store.watch("leader", true);
//!
//! store.set_with_timeout("leader", "worker-3", Duration::from_secs(5));
//! assert_eq!(store.get_string("leader").as_deref(), Some("worker-3"));
//!
//! // Five seconds later the lease is gone
//! while let Ok(n) = watcher.recv() {
//!     if let Notification::Expired { key } = n {
//!         println!("{} expired", key);
//!         break;
//!     }
//! }
//! ```

pub mod error;
mod expiry;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use error::{Result, StoreError};
pub use store::{DeliveryMode, StateStore, StoreConfig};
pub use subscriptions::{should_deliver, start_subscription, SubscriptionHandle, Watcher};
pub use types::{Notification, SubscriptionId, Value};
