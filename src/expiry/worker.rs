//! The expiry worker thread and the store-side handle that feeds it.

use super::schedule::Schedule;
use crossbeam_channel::{at, never, select, unbounded, Receiver, Sender};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

enum TimerCommand {
    Arm {
        key: String,
        generation: u64,
        deadline: Option<Instant>,
    },
    Cancel {
        key: String,
        generation: u64,
    },
}

/// The store's record of an armed timer.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TimerRecord {
    generation: u64,
    /// `None` when the deadline is beyond what `Instant` can represent.
    deadline: Option<Instant>,
}

impl TimerRecord {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Time left before the timer fires (zero once the deadline has passed).
    pub fn remaining(&self) -> Duration {
        match self.deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => Duration::MAX,
        }
    }
}

/// Sending half of the expiry worker. Dropping it stops the worker.
pub(crate) struct ExpiryScheduler {
    commands: Sender<TimerCommand>,
    next_generation: AtomicU64,
}

/// Receiving half, consumed by [`ExpiryWorker::spawn`].
pub(crate) struct ExpiryWorker {
    commands: Receiver<TimerCommand>,
}

impl ExpiryScheduler {
    pub fn channel() -> (Self, ExpiryWorker) {
        let (commands, receiver) = unbounded();
        let scheduler = Self {
            commands,
            next_generation: AtomicU64::new(1),
        };
        (scheduler, ExpiryWorker { commands: receiver })
    }

    /// Schedule `key` to expire after `duration`, replacing its pending timer.
    pub fn arm(&self, key: &str, duration: Duration) -> TimerRecord {
        let record = TimerRecord {
            generation: self.next_generation.fetch_add(1, Ordering::SeqCst),
            deadline: Instant::now().checked_add(duration),
        };
        self.send(TimerCommand::Arm {
            key: key.to_string(),
            generation: record.generation,
            deadline: record.deadline,
        });
        record
    }

    pub fn cancel(&self, key: &str, timer: &TimerRecord) {
        self.send(TimerCommand::Cancel {
            key: key.to_string(),
            generation: timer.generation,
        });
    }

    fn send(&self, command: TimerCommand) {
        if self.commands.send(command).is_err() {
            tracing::warn!("expiry worker has stopped; timer not scheduled");
        }
    }
}

impl ExpiryWorker {
    /// Start the worker thread. `on_expire(key, generation)` runs on it for
    /// every due timer; returning false stops the worker.
    ///
    /// The thread exits once every [`ExpiryScheduler`] sender is dropped.
    pub fn spawn<F>(self, thread_name: String, on_expire: F) -> io::Result<JoinHandle<()>>
    where
        F: FnMut(&str, u64) -> bool + Send + 'static,
    {
        thread::Builder::new()
            .name(thread_name)
            .spawn(move || run(self.commands, on_expire))
    }
}

fn run<F>(commands: Receiver<TimerCommand>, mut on_expire: F)
where
    F: FnMut(&str, u64) -> bool,
{
    let mut schedule = Schedule::default();

    loop {
        let wake = schedule.next_deadline().map(at).unwrap_or_else(never);

        select! {
            recv(commands) -> command => match command {
                Ok(TimerCommand::Arm { key, generation, deadline }) => {
                    schedule.arm(key, generation, deadline);
                }
                Ok(TimerCommand::Cancel { key, generation }) => {
                    schedule.cancel(&key, generation);
                }
                Err(_) => break,
            },
            recv(wake) -> _ => {
                for (key, generation) in schedule.pop_due(Instant::now()) {
                    if !on_expire(&key, generation) {
                        tracing::debug!("expiry target gone");
                        return;
                    }
                }
            }
        }
    }

    tracing::debug!(pending = schedule.len(), "expiry worker stopped");
}
