//! Image files as input snapshots.
//!
//! Frames are converted to luma, resized to the network's input size and
//! scaled to `[0, 1]`. Photos of dark ink on paper are inverted so strokes
//! read as high values, matching what the network was trained on.

use crate::source::{CaptureError, PixelSource};
use image::GrayImage;
use image::imageops::FilterType;
use neuroviz_data::PixelGrid;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Input side length of the MNIST-style networks this drives.
pub const DEFAULT_INPUT_SIZE: u32 = 28;

const EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Convert a luma image to a `size × size` grid in `[0, 1]`.
///
/// Images brighter than mid-gray on average are inverted.
pub fn grid_from_luma(image: &GrayImage, size: u32) -> PixelGrid {
    let resized = if image.dimensions() == (size, size) {
        image.clone()
    } else {
        image::imageops::resize(image, size, size, FilterType::Triangle)
    };

    let mut pixels: Vec<f32> = resized.pixels().map(|p| f32::from(p.0[0]) / 255.0).collect();
    let mean = pixels.iter().sum::<f32>() / pixels.len().max(1) as f32;
    if mean > 0.5 {
        pixels.iter_mut().for_each(|v| *v = 1.0 - *v);
    }
    PixelGrid::new(size as usize, size as usize, pixels)
}

/// Load one image file as a grid.
pub fn load_grid(path: &Path, size: u32) -> Result<PixelGrid, CaptureError> {
    let image = image::open(path).map_err(|source| CaptureError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(grid_from_luma(&image.to_luma8(), size))
}

/// Plays back a sorted list of image files, one snapshot per call.
#[derive(Debug, Clone)]
pub struct ImageSequenceSource {
    frames: Vec<PathBuf>,
    next: usize,
}

impl ImageSequenceSource {
    pub fn new(frames: Vec<PathBuf>) -> Self {
        Self {
            frames,
            next: 0,
        }
    }

    /// Every PNG/JPEG in `dir`, in file name order.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let dir = dir.as_ref();
        let mut frames = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
            if is_image {
                frames.push(path);
            }
        }
        if frames.is_empty() {
            return Err(CaptureError::NoFrames(dir.to_path_buf()));
        }
        frames.sort();
        info!("Found {} frames in {}", frames.len(), dir.display());
        Ok(Self::new(frames))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Start again from the first frame.
    pub fn rewind(&mut self) {
        self.next = 0;
    }
}

impl PixelSource for ImageSequenceSource {
    fn next_grid(&mut self) -> Result<Option<PixelGrid>, CaptureError> {
        let Some(path) = self.frames.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        debug!("Loading frame {}", path.display());
        load_grid(path, DEFAULT_INPUT_SIZE).map(Some)
    }

    fn resolution(&self) -> (usize, usize) {
        (DEFAULT_INPUT_SIZE as usize, DEFAULT_INPUT_SIZE as usize)
    }

    fn is_active(&self) -> bool {
        self.next < self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    #[test]
    fn test_dark_background_is_kept() {
        let image: GrayImage =
            ImageBuffer::from_fn(28, 28, |x, _| Luma([if x == 14 { 255 } else { 0 }]));
        let grid = grid_from_luma(&image, 28);
        assert_eq!((grid.height(), grid.width()), (28, 28));
        assert_eq!(grid.get(3, 14), Some(1.0));
        assert_eq!(grid.get(3, 0), Some(0.0));
    }

    #[test]
    fn test_light_background_is_inverted() {
        let image: GrayImage =
            ImageBuffer::from_fn(28, 28, |x, _| Luma([if x == 14 { 0 } else { 255 }]));
        let grid = grid_from_luma(&image, 28);
        assert_eq!(grid.get(3, 14), Some(1.0));
        assert_eq!(grid.get(3, 0), Some(0.0));
    }

    #[test]
    fn test_resizes_to_input_size() {
        let image: GrayImage = ImageBuffer::from_pixel(280, 140, Luma([0]));
        let grid = grid_from_luma(&image, DEFAULT_INPUT_SIZE);
        assert_eq!(grid.len(), 784);
        assert!(!grid.has_ink(0.05));
    }

    #[test]
    fn test_sequence_from_dir() {
        let dir = std::env::temp_dir().join(format!("neuroviz-frames-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for (i, column) in [4u32, 20].iter().enumerate() {
            let image: GrayImage =
                ImageBuffer::from_fn(28, 28, |x, _| Luma([if x == *column { 255 } else { 0 }]));
            image.save(dir.join(format!("frame_{i:02}.png"))).unwrap();
        }
        std::fs::write(dir.join("notes.txt"), "skip me").unwrap();

        let mut source = ImageSequenceSource::from_dir(&dir).unwrap();
        assert_eq!(source.len(), 2);
        let first = source.next_grid().unwrap().unwrap();
        assert_eq!(first.get(0, 4), Some(1.0));
        let second = source.next_grid().unwrap().unwrap();
        assert_eq!(second.get(0, 20), Some(1.0));
        assert!(source.next_grid().unwrap().is_none());
        assert!(!source.is_active());

        source.rewind();
        assert!(source.is_active());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_empty_dir_is_an_error() {
        let dir = std::env::temp_dir().join(format!("neuroviz-empty-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        assert!(matches!(
            ImageSequenceSource::from_dir(&dir),
            Err(CaptureError::NoFrames(_))
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
