//! Pending deadlines, earliest first, at most one per key.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

#[derive(Default)]
pub(crate) struct Schedule {
    /// Generations are unique per store, so `(deadline, generation)` never collides.
    by_deadline: BTreeMap<(Instant, u64), String>,
    by_key: HashMap<String, (Instant, u64)>,
}

impl Schedule {
    /// Install the timer for `key`, replacing any pending one. A `None`
    /// deadline never fires, so only the replacement happens.
    pub fn arm(&mut self, key: String, generation: u64, deadline: Option<Instant>) {
        self.remove_key(&key);
        if let Some(deadline) = deadline {
            self.by_deadline.insert((deadline, generation), key.clone());
            self.by_key.insert(key, (deadline, generation));
        }
    }

    /// Drop the pending timer for `key` if it is still `generation`.
    pub fn cancel(&mut self, key: &str, generation: u64) {
        if matches!(self.by_key.get(key), Some(&(_, pending)) if pending == generation) {
            self.remove_key(key);
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.by_deadline.keys().next().map(|&(deadline, _)| deadline)
    }

    /// Remove and return every timer due at `now`, earliest first.
    pub fn pop_due(&mut self, now: Instant) -> Vec<(String, u64)> {
        let mut due = Vec::new();
        while let Some(entry) = self.by_deadline.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let ((_, generation), key) = entry.remove_entry();
            self.by_key.remove(&key);
            due.push((key, generation));
        }
        due
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    fn remove_key(&mut self, key: &str) {
        if let Some(slot) = self.by_key.remove(key) {
            self.by_deadline.remove(&slot);
        }
    }
}
