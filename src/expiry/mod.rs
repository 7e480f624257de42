//! Key expiration.
//!
//! Each store owns one expiry worker thread. Timed writes send it an arm
//! command carrying the key, a generation number and the deadline; the worker
//! keeps pending deadlines in order and sleeps until the earliest one.
//!
//! Re-arming or deleting a key can race a deadline the worker is already
//! firing, so the store ignores any firing whose generation no longer matches
//! the key's installed timer.

mod schedule;
mod worker;

pub(crate) use worker::{ExpiryScheduler, TimerRecord};
