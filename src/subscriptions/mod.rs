//! Change subscriptions.
//!
//! Each key keeps its subscribers in registration order. A subscriber is a
//! channel plus a conditional flag:
//! - change notifications skip conditional subscribers when the key already
//!   held an equal value
//! - expiration notifications (delete or timer) reach every subscriber
//!
//! Subscribers either own their channel ([`crate::StateStore::subscribe`]),
//! read a private one ([`crate::StateStore::watch`]), or hand a callback to a
//! dedicated thread ([`start_subscription`]). A handler subscription outlives
//! its handle unless the handle is cancelled.
//!
//! # Example
//!
//! ```no_run
//! use shared_state::{start_subscription, Notification, StateStore};
//!
//! let store = StateStore::new();
//! let handle = start_subscription(&store, "job:42", |n| match n {
//!     Notification::Changed { value, .. } => println!("now {}", value),
//!     Notification::Expired { key } => println!("{} is gone", key),
//! }, true)?;
//!
//! store.set("job:42", "running");
//! store.set("job:42", "running"); // suppressed for conditional subscribers
//! store.delete("job:42");
//!
//! handle.cancel();
//! # Ok::<(), shared_state::StoreError>(())
//! ```

mod dispatch;
mod drain;
mod manager;
mod types;

pub(crate) use dispatch::{deliver_all, DispatchQueue};
pub use drain::start_subscription;
pub(crate) use manager::{Delivery, SubscriptionManager};
pub use manager::should_deliver;
pub use types::{SubscriptionHandle, Watcher};
