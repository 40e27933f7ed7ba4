//! Neuroviz Capture - input snapshots for live drawing
//!
//! - [`ImageSequenceSource`]: PNG/JPEG frames from disk
//! - [`MemorySource`]: an in-memory queue

mod image_source;
mod source;

pub use image_source::{DEFAULT_INPUT_SIZE, ImageSequenceSource, grid_from_luma, load_grid};
pub use source::{CaptureError, MemorySource, PixelSource};
