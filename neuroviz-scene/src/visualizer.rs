//! The embeddable visualizer: one owned value per host, no global state.

use crate::config::VisualizerConfig;
use crate::connections::ConnectionSelector;
use crate::error::VisualizeError;
use crate::scene::{Scene, SceneBuilder};
use crate::update::UpdateScheduler;
use neuroviz_data::{InferenceResponse, LayerExtractor, PixelGrid};
use std::time::Instant;
use tracing::{debug, info, trace};

/// Result of a full update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualizeOutcome {
    /// The response carried no activation data. The scene is untouched.
    NothingToDraw,
    Applied {
        /// Whether this update built the neuron batches.
        built: bool,
        layers: usize,
        connections: usize,
    },
}

pub struct Visualizer {
    config: VisualizerConfig,
    extractor: LayerExtractor,
    builder: SceneBuilder,
    scheduler: UpdateScheduler,
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new(VisualizerConfig::default())
    }
}

impl Visualizer {
    pub fn new(config: VisualizerConfig) -> Self {
        let extractor = LayerExtractor::new(config.extraction.clone());
        let builder = SceneBuilder::new(config.layout, ConnectionSelector::new(config.connections));
        let scheduler = UpdateScheduler::new(config.partial_interval());
        Self {
            config,
            extractor,
            builder,
            scheduler,
        }
    }

    pub fn config(&self) -> &VisualizerConfig {
        &self.config
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.builder.scene()
    }

    /// Full update: extract, build if empty, reselect connections, recolor.
    ///
    /// Rejects a response whose input has no ink before touching the scene.
    pub fn visualize(
        &mut self,
        response: &InferenceResponse,
    ) -> Result<VisualizeOutcome, VisualizeError> {
        let has_ink = response
            .input_grid()
            .is_some_and(|grid| grid.has_ink(self.config.ink_threshold));
        if !has_ink {
            return Err(VisualizeError::EmptyInput);
        }

        self.scheduler.begin_full();

        let layers = self.extractor.extract(response);
        if layers.is_empty() {
            debug!("Nothing to draw");
            return Ok(VisualizeOutcome::NothingToDraw);
        }

        let built = self.builder.build_neurons(&layers);
        let connections = self.builder.replace_connections(&layers);
        self.builder.apply_colors(&layers);

        info!(
            "Visualized {} layers, {} connections{}",
            layers.len(),
            connections,
            if built { " (new scene)" } else { "" }
        );
        Ok(VisualizeOutcome::Applied {
            built,
            layers: layers.len(),
            connections,
        })
    }

    /// Queue a live input snapshot for throttled recoloring.
    pub fn submit_partial(&mut self, grid: PixelGrid, now: Instant) {
        self.scheduler.submit_partial(grid, now);
    }

    /// Apply the pending partial sample if it is due. Returns whether the
    /// scene changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(grid) = self.scheduler.due_partial(now) else {
            return false;
        };
        let applied = self.builder.recolor_input(&grid);
        trace!("Partial update applied: {}", applied);
        applied
    }

    /// When the next partial sample becomes due, for hosts that sleep.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// Neutral colors and hidden connections, geometry kept. Drops any
    /// pending partial sample.
    pub fn reset_to_empty_colors(&mut self) {
        self.scheduler.begin_full();
        self.builder.reset_to_empty_colors();
    }

    /// Release the scene. A later `visualize` builds a fresh one.
    pub fn dispose(&mut self) {
        self.scheduler.begin_full();
        self.builder.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neuroviz_data::{LayerPayload, empty_color};
    use std::time::Duration;

    fn response(scale: f32) -> InferenceResponse {
        let mut input = PixelGrid::blank(6, 6);
        for i in 0..6 {
            input.set(i, i, 1.0);
        }
        let conv: Vec<Vec<Vec<f32>>> = (0..2)
            .map(|c| {
                (0..4)
                    .map(|r| (0..4).map(|k| scale * (c + r + k) as f32 * 0.1).collect())
                    .collect()
            })
            .collect();
        InferenceResponse::new()
            .with_input_grid(&input)
            .with_layer("conv1", LayerPayload::grids([4, 4, 2], conv))
            .with_layer("flatten", LayerPayload::flatten(false))
            .with_layer(
                "dense1",
                LayerPayload::flat((0..12).map(|i| scale * (i % 4) as f32).collect()),
            )
            .with_layer(
                "output",
                LayerPayload::flat((0..10).map(|i| if i == 3 { scale } else { 0.0 }).collect()),
            )
    }

    fn blank_response() -> InferenceResponse {
        InferenceResponse::new()
            .with_input_grid(&PixelGrid::blank(6, 6))
            .with_layer("dense1", LayerPayload::flat(vec![0.0; 12]))
    }

    #[test]
    fn test_second_visualize_keeps_neuron_batches() {
        let mut viz = Visualizer::default();
        let first = viz.visualize(&response(1.0)).expect("visualize");
        assert!(matches!(first, VisualizeOutcome::Applied { built: true, layers: 5, .. }));

        let scene = viz.scene().expect("scene");
        let neuron_ids: Vec<_> = scene.neurons().iter().map(|b| (b.id(), b.instance_count())).collect();
        let edge_ids: Vec<_> = scene.connections().iter().map(|b| b.id()).collect();
        let dense_before = scene.neuron_batch("dense1").unwrap().colors().to_vec();
        assert!(!edge_ids.is_empty());

        let second = viz.visualize(&response(0.5)).expect("visualize");
        assert!(matches!(second, VisualizeOutcome::Applied { built: false, .. }));

        let scene = viz.scene().expect("scene");
        let after: Vec<_> = scene.neurons().iter().map(|b| (b.id(), b.instance_count())).collect();
        assert_eq!(neuron_ids, after);
        assert!(scene.connections().iter().all(|b| !edge_ids.contains(&b.id())));
        // Colors are normalized per layer, so only the revision proves the rewrite.
        let dense = scene.neuron_batch("dense1").unwrap();
        assert_eq!(dense.colors(), dense_before.as_slice());
        assert_eq!(dense.revision(), 2);
    }

    #[test]
    fn test_empty_stage_does_not_block_later_layers() {
        let mut viz = Visualizer::default();
        let mut grid = PixelGrid::blank(4, 4);
        grid.set(1, 1, 1.0);
        let response = InferenceResponse::new()
            .with_input_grid(&grid)
            .with_layer("dense1", LayerPayload::flat(Vec::new()))
            .with_layer("output", LayerPayload::flat(vec![0.2, 0.9]));
        viz.visualize(&response).expect("visualize");

        let scene = viz.scene().expect("scene");
        let batches: Vec<(&str, usize)> = scene
            .neurons()
            .iter()
            .map(|b| (b.name(), b.instance_count()))
            .collect();
        assert_eq!(batches, vec![("input", 16), ("output", 2)]);
        assert_eq!(scene.connections().len(), 1);
        assert!(scene.connection_count() > 0);
    }

    #[test]
    fn test_empty_input_is_rejected_before_mutation() {
        let mut viz = Visualizer::default();
        assert_eq!(viz.visualize(&blank_response()), Err(VisualizeError::EmptyInput));
        assert!(viz.scene().is_none());

        let no_input = InferenceResponse::new().with_layer("dense1", LayerPayload::flat(vec![1.0]));
        assert_eq!(viz.visualize(&no_input), Err(VisualizeError::EmptyInput));
        assert!(viz.scene().is_none());
    }

    #[test]
    fn test_no_activation_data_is_nothing_to_draw() {
        let mut viz = Visualizer::default();
        let mut grid = PixelGrid::blank(6, 6);
        grid.set(1, 1, 1.0);
        let response = InferenceResponse::new().with_input_grid(&grid);
        assert_eq!(viz.visualize(&response), Ok(VisualizeOutcome::NothingToDraw));
        assert!(viz.scene().is_none());
    }

    #[test]
    fn test_reset_then_zero_response_matches_fresh_scene() {
        let mut viz = Visualizer::default();
        viz.visualize(&response(1.0)).expect("visualize");
        viz.reset_to_empty_colors();

        let result = viz.visualize(&blank_response());
        assert_eq!(result, Err(VisualizeError::EmptyInput));

        let scene = viz.scene().expect("scene");
        for batch in scene.neurons() {
            assert!(batch.colors().iter().all(|c| *c == empty_color()));
        }
        assert_eq!(scene.connection_count(), 0);
    }

    #[test]
    fn test_partial_updates_are_throttled() {
        let mut viz = Visualizer::default();
        viz.visualize(&response(1.0)).expect("visualize");
        let input_revision = viz.scene().unwrap().neurons()[0].revision();

        let start = Instant::now();
        let mut applied = 0;
        for i in 0..=20u64 {
            let now = start + Duration::from_millis(i * 10);
            if viz.tick(now) {
                applied += 1;
            }
            if i < 20 {
                let mut grid = PixelGrid::blank(6, 6);
                grid.set(0, i as usize % 6, 1.0);
                viz.submit_partial(grid, now);
            }
        }

        assert_eq!(applied, 4);
        let scene = viz.scene().unwrap();
        assert_eq!(scene.neurons()[0].revision(), input_revision + 4);
        assert_eq!(scene.neurons()[1].revision(), 1);
    }

    #[test]
    fn test_full_update_cancels_pending_partial() {
        let mut viz = Visualizer::default();
        viz.visualize(&response(1.0)).expect("visualize");
        let start = Instant::now();
        viz.submit_partial(PixelGrid::blank(6, 6), start);
        assert!(viz.next_deadline().is_some());

        viz.visualize(&response(1.0)).expect("visualize");
        assert!(viz.next_deadline().is_none());
        assert!(!viz.tick(start + Duration::from_secs(1)));
    }

    #[test]
    fn test_dispose_then_rebuild() {
        let mut viz = Visualizer::default();
        viz.visualize(&response(1.0)).expect("visualize");
        viz.dispose();
        viz.dispose();
        assert!(viz.scene().is_none());
        let outcome = viz.visualize(&response(1.0)).expect("visualize");
        assert!(matches!(outcome, VisualizeOutcome::Applied { built: true, .. }));
    }
}
