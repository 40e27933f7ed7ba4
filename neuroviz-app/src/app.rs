//! Configuration loading and the top-level run function.

use crate::delegate::{NetworkDelegate, NetworkInitData};
use crate::error::AppError;
use neuroviz_capture::ImageSequenceSource;
use neuroviz_data::InferenceResponse;
use neuroviz_gpu::DEFAULT_NEURON_SIZE;
use neuroviz_scene::VisualizerConfig;
use neuroviz_window::{WindowConfig, init_logging, run_with_delegate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Everything configurable from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub visualizer: VisualizerConfig,
    pub neuron_size: f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            visualizer: VisualizerConfig::default(),
            neuron_size: DEFAULT_NEURON_SIZE,
        }
    }
}

impl AppConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
}

/// Options gathered from the command line.
#[derive(Debug, Default)]
pub struct RunOptions {
    pub responses: Vec<PathBuf>,
    pub frames: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl RunOptions {
    /// Resolve the config file and apply command line overrides.
    pub fn config(&self) -> Result<AppConfig, AppError> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_path(path)?,
            None => AppConfig::default(),
        };
        if let Some(width) = self.width {
            config.window.width = width;
        }
        if let Some(height) = self.height {
            config.window.height = height;
        }
        Ok(config)
    }
}

pub fn run(options: RunOptions) -> Result<(), AppError> {
    init_logging();

    let config = options.config()?;
    let responses = options
        .responses
        .iter()
        .map(|path| {
            info!("Loading response {}", path.display());
            InferenceResponse::from_path(path)
        })
        .collect::<Result<Vec<_>, _>>()?;
    let frames = options
        .frames
        .as_ref()
        .map(ImageSequenceSource::from_dir)
        .transpose()?;

    let init_data = NetworkInitData {
        visualizer: config.visualizer,
        neuron_size: config.neuron_size,
        responses,
        frames,
    };

    run_with_delegate::<NetworkDelegate>(config.window, init_data)
        .map_err(|e| AppError::Viewer(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{"window": {"width": 800}, "visualizer": {"ink_threshold": 0.2}}"#,
        )
        .unwrap();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.visualizer.ink_threshold, 0.2);
        assert_eq!(config.visualizer.partial_interval_ms, 50);
        assert_eq!(config.neuron_size, DEFAULT_NEURON_SIZE);
    }

    #[test]
    fn test_cli_overrides_size() {
        let options = RunOptions {
            width: Some(640),
            height: Some(480),
            ..RunOptions::default()
        };
        let config = options.config().unwrap();
        assert_eq!((config.window.width, config.window.height), (640, 480));
    }

    #[test]
    fn test_missing_config_is_io_error() {
        let options = RunOptions {
            config: Some(PathBuf::from("/nonexistent/neuroviz.json")),
            ..RunOptions::default()
        };
        assert!(matches!(options.config(), Err(AppError::Io(_))));
    }
}
