//! Visualizer configuration.

use crate::connections::ConnectionConfig;
use crate::update::DEFAULT_PARTIAL_INTERVAL;
use neuroviz_data::{ExtractionPlan, LayoutConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    /// A full update needs at least one input pixel above this.
    pub ink_threshold: f32,
    /// Minimum spacing of partial recolors, in milliseconds.
    pub partial_interval_ms: u64,
    pub layout: LayoutConfig,
    pub connections: ConnectionConfig,
    pub extraction: ExtractionPlan,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            ink_threshold: 0.05,
            partial_interval_ms: DEFAULT_PARTIAL_INTERVAL.as_millis() as u64,
            layout: LayoutConfig::default(),
            connections: ConnectionConfig::default(),
            extraction: ExtractionPlan::default(),
        }
    }
}

impl VisualizerConfig {
    pub fn partial_interval(&self) -> Duration {
        Duration::from_millis(self.partial_interval_ms)
    }
}
