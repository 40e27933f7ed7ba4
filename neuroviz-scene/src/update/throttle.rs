//! Trailing-edge throttle driven by explicit instants.

use std::time::{Duration, Instant};

/// Keeps the newest submitted sample and releases it once per interval.
///
/// The first submission after an idle period arms a deadline one interval
/// out; later submissions only replace the pending sample. There is no
/// leading-edge release, and the last sample is always released eventually.
#[derive(Debug, Clone)]
pub struct Throttle<T> {
    interval: Duration,
    pending: Option<T>,
    deadline: Option<Instant>,
}

impl<T> Throttle<T> {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            pending: None,
            deadline: None,
        }
    }

    pub fn submit(&mut self, sample: T, now: Instant) {
        self.pending = Some(sample);
        if self.deadline.is_none() {
            self.deadline = Some(now + self.interval);
        }
    }

    /// Release the pending sample if its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.pending.take()
            }
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        self.pending = None;
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
