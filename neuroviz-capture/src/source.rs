//! Common capture source types and traits.

use neuroviz_data::PixelGrid;
use std::collections::VecDeque;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("No frames found in {0}")]
    NoFrames(PathBuf),

    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Something that can hand out input snapshots on demand.
pub trait PixelSource {
    /// The next snapshot, or `None` once the source is exhausted.
    fn next_grid(&mut self) -> Result<Option<PixelGrid>, CaptureError>;

    /// Snapshot size as (height, width).
    fn resolution(&self) -> (usize, usize);

    /// Whether more snapshots may follow.
    fn is_active(&self) -> bool;
}

/// In-memory queue of snapshots.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    frames: VecDeque<PixelGrid>,
    resolution: (usize, usize),
}

impl MemorySource {
    pub fn new(frames: impl IntoIterator<Item = PixelGrid>) -> Self {
        let frames: VecDeque<PixelGrid> = frames.into_iter().collect();
        let resolution = frames
            .front()
            .map_or((0, 0), |g| (g.height(), g.width()));
        Self { frames, resolution }
    }

    pub fn push(&mut self, grid: PixelGrid) {
        if self.frames.is_empty() && self.resolution == (0, 0) {
            self.resolution = (grid.height(), grid.width());
        }
        self.frames.push_back(grid);
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl PixelSource for MemorySource {
    fn next_grid(&mut self) -> Result<Option<PixelGrid>, CaptureError> {
        Ok(self.frames.pop_front())
    }

    fn resolution(&self) -> (usize, usize) {
        self.resolution
    }

    fn is_active(&self) -> bool {
        !self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_drains_in_order() {
        let mut first = PixelGrid::blank(2, 2);
        first.set(0, 0, 1.0);
        let second = PixelGrid::blank(2, 2);
        let mut source = MemorySource::new([first.clone(), second.clone()]);

        assert_eq!(source.resolution(), (2, 2));
        assert!(source.is_active());
        assert_eq!(source.next_grid().unwrap(), Some(first));
        assert_eq!(source.next_grid().unwrap(), Some(second));
        assert_eq!(source.next_grid().unwrap(), None);
        assert!(!source.is_active());
    }

    #[test]
    fn test_push_sets_resolution_once() {
        let mut source = MemorySource::default();
        source.push(PixelGrid::blank(3, 4));
        source.push(PixelGrid::blank(5, 5));
        assert_eq!(source.resolution(), (3, 4));
        assert_eq!(source.remaining(), 2);
    }
}
