//! Scene construction and in-place mutation.
//!
//! Neuron geometry is laid out exactly once, on the first build. Every later
//! update only rewrites colors and replaces connection batches.

use super::batches::{ConnectionBatch, ConnectionSegment, Label, NeuronBatch};
use crate::connections::ConnectionSelector;
use glam::Vec3;
use neuroviz_data::{ActivationColorMapper, Layer, LayerKind, LayoutConfig, PixelGrid, empty_color};
use tracing::{debug, info, trace, warn};

/// Height of a label above the top of its layer.
const LABEL_LIFT: f32 = 1.0;

/// The live set of batches.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    neurons: Vec<NeuronBatch>,
    connections: Vec<ConnectionBatch>,
}

impl Scene {
    /// Neuron batches are expected in layer-index order.
    pub fn new(neurons: Vec<NeuronBatch>, connections: Vec<ConnectionBatch>) -> Self {
        Self {
            neurons,
            connections,
        }
    }

    pub fn neurons(&self) -> &[NeuronBatch] {
        &self.neurons
    }

    pub fn connections(&self) -> &[ConnectionBatch] {
        &self.connections
    }

    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.neurons.iter().map(NeuronBatch::label)
    }

    pub fn neuron_batch(&self, name: &str) -> Option<&NeuronBatch> {
        self.neurons.iter().find(|b| b.name() == name)
    }

    pub fn neuron_count(&self) -> usize {
        self.neurons.iter().map(NeuronBatch::instance_count).sum()
    }

    /// Number of edges across visible connection batches.
    pub fn connection_count(&self) -> usize {
        self.connections
            .iter()
            .filter(|b| b.visible())
            .map(ConnectionBatch::len)
            .sum()
    }
}

/// Lifecycle of the scene.
#[derive(Debug, Clone, Default)]
pub enum SceneState {
    #[default]
    Empty,
    Built(Scene),
}

/// Owns the scene and applies layout, selection and coloring to it.
#[derive(Debug, Clone, Default)]
pub struct SceneBuilder {
    layout: LayoutConfig,
    mapper: ActivationColorMapper,
    selector: ConnectionSelector,
    state: SceneState,
}

impl SceneBuilder {
    pub fn new(layout: LayoutConfig, selector: ConnectionSelector) -> Self {
        Self {
            layout,
            mapper: ActivationColorMapper::default(),
            selector,
            state: SceneState::Empty,
        }
    }

    pub fn state(&self) -> &SceneState {
        &self.state
    }

    pub fn is_built(&self) -> bool {
        matches!(self.state, SceneState::Built(_))
    }

    pub fn scene(&self) -> Option<&Scene> {
        match &self.state {
            SceneState::Built(scene) => Some(scene),
            SceneState::Empty => None,
        }
    }

    /// Allocate one neuron batch per non-empty layer with neutral colors.
    ///
    /// Does nothing once the scene is built. Returns whether a build happened.
    pub fn build_neurons(&mut self, layers: &[Layer]) -> bool {
        if self.is_built() {
            return false;
        }

        let neurons: Vec<NeuronBatch> = layers
            .iter()
            .filter(|layer| {
                let keep = layer.neuron_count() > 0;
                if !keep {
                    debug!("Layer '{}' has no neurons, no batch built", layer.name());
                }
                keep
            })
            .enumerate()
            .map(|(index, layer)| {
                let positions =
                    self.layout
                        .positions(index, layer.neuron_count(), layer.kind(), &layer.meta());
                let top = positions.iter().map(|p| p.y).fold(0.0f32, f32::max);
                let label = Label {
                    layer_index: index,
                    text: layer.label(),
                    anchor: Vec3::new(self.layout.layer_x(index), top + LABEL_LIFT, 0.0),
                };
                NeuronBatch::new(
                    index,
                    layer.name().to_string(),
                    layer.kind(),
                    positions,
                    empty_color(),
                    label,
                )
            })
            .collect();

        let scene = Scene::new(neurons, Vec::new());
        info!(
            "Built scene: {} layers, {} neurons",
            scene.neurons.len(),
            scene.neuron_count()
        );
        self.state = SceneState::Built(scene);
        true
    }

    /// Recolor every neuron batch from the layer with the same name.
    ///
    /// Batches with no matching layer fall back to the empty color.
    pub fn apply_colors(&mut self, layers: &[Layer]) {
        let SceneState::Built(scene) = &mut self.state else {
            return;
        };

        for batch in &mut scene.neurons {
            match layers.iter().find(|l| l.name() == batch.name()) {
                Some(layer) => {
                    let colors = self.mapper.layer_colors(layer.activations());
                    if colors.len() != batch.instance_count() {
                        warn!(
                            "Layer '{}' has {} neurons but its batch has {}, recoloring prefix",
                            layer.name(),
                            colors.len(),
                            batch.instance_count()
                        );
                    }
                    batch.write_colors(&colors);
                }
                None => {
                    debug!("Layer '{}' absent from update, resetting colors", batch.name());
                    batch.fill(empty_color());
                }
            }
        }
    }

    /// Drop all connection batches and select fresh ones for each pair of
    /// adjacent neuron batches. A pair is skipped when either side is absent
    /// from `layers`. Returns the number of edges created.
    pub fn replace_connections(&mut self, layers: &[Layer]) -> usize {
        let SceneState::Built(scene) = &mut self.state else {
            return 0;
        };
        scene.connections.clear();

        for pair in scene.neurons.windows(2) {
            let (source_batch, target_batch) = (&pair[0], &pair[1]);
            let (Some(source), Some(target)) = (
                layers.iter().find(|l| l.name() == source_batch.name()),
                layers.iter().find(|l| l.name() == target_batch.name()),
            ) else {
                debug!(
                    "No connections {} -> {}: layer absent from update",
                    source_batch.name(),
                    target_batch.name()
                );
                continue;
            };

            let candidates = self.selector.select_between(source, target);
            if candidates.is_empty() {
                continue;
            }
            let peak = candidates
                .iter()
                .fold(0.0f32, |acc, c| acc.max(c.strength.abs()));

            let segments: Vec<ConnectionSegment> = candidates
                .iter()
                .filter_map(|c| {
                    Some(ConnectionSegment {
                        start: *source_batch.positions().get(c.source)?,
                        end: *target_batch.positions().get(c.target)?,
                        color: self.mapper.connection_color(c.strength, peak),
                    })
                })
                .collect();

            let batch = ConnectionBatch::new(
                source_batch.layer_index(),
                target_batch.layer_index(),
                segments,
            );
            scene.connections.push(batch);
        }

        let total = scene.connection_count();
        debug!(
            "Replaced connections: {} batches, {} edges",
            scene.connections.len(),
            total
        );
        total
    }

    /// Recolor only the input batch from a pixel snapshot.
    /// Returns false when there is no built input batch.
    pub fn recolor_input(&mut self, grid: &PixelGrid) -> bool {
        let SceneState::Built(scene) = &mut self.state else {
            return false;
        };
        let Some(batch) = scene
            .neurons
            .iter_mut()
            .find(|b| b.kind() == LayerKind::Input)
        else {
            return false;
        };

        let colors = self.mapper.layer_colors(grid.pixels());
        if colors.len() != batch.instance_count() {
            warn!(
                "Input snapshot has {} pixels but the input batch has {}",
                colors.len(),
                batch.instance_count()
            );
        }
        let written = batch.write_colors(&colors);
        trace!("Recolored {} input neurons", written);
        true
    }

    /// Neutral colors everywhere and hidden connections. Geometry stays.
    pub fn reset_to_empty_colors(&mut self) {
        let SceneState::Built(scene) = &mut self.state else {
            return;
        };
        for batch in &mut scene.neurons {
            batch.fill(empty_color());
        }
        for batch in &mut scene.connections {
            batch.hide();
        }
        debug!("Scene reset to empty colors");
    }

    /// Release the scene. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if let SceneState::Built(_) = std::mem::take(&mut self.state) {
            info!("Scene disposed");
        }
    }
}
