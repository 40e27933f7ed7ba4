//! Update cadence
//!
//! Full updates run synchronously through the visualizer. Partial updates
//! (live input recoloring) are collapsed by a trailing throttle here.

pub mod throttle;

pub use throttle::Throttle;

use neuroviz_data::PixelGrid;
use std::time::{Duration, Instant};
use tracing::trace;

/// Default minimum interval between partial recolors.
pub const DEFAULT_PARTIAL_INTERVAL: Duration = Duration::from_millis(50);

/// Schedules partial updates between full ones.
#[derive(Debug, Clone)]
pub struct UpdateScheduler {
    partial: Throttle<PixelGrid>,
}

impl Default for UpdateScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_PARTIAL_INTERVAL)
    }
}

impl UpdateScheduler {
    pub fn new(partial_interval: Duration) -> Self {
        Self {
            partial: Throttle::new(partial_interval),
        }
    }

    pub fn submit_partial(&mut self, grid: PixelGrid, now: Instant) {
        trace!("Partial sample queued");
        self.partial.submit(grid, now);
    }

    /// The partial sample due at `now`, if any.
    pub fn due_partial(&mut self, now: Instant) -> Option<PixelGrid> {
        self.partial.poll(now)
    }

    /// A full update supersedes any pending partial sample.
    pub fn begin_full(&mut self) {
        self.partial.cancel();
    }

    /// When the next partial sample will become due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.partial.deadline()
    }
}
