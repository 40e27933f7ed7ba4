//! Instanced batches that make up a scene.

use glam::{Vec3, Vec4};
use neuroviz_data::LayerKind;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_BATCH_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a batch. GPU mirrors key their buffers on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchId(u64);

impl BatchId {
    pub fn next() -> Self {
        Self(NEXT_BATCH_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Text describing a layer, anchored above it in world space.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub layer_index: usize,
    pub text: String,
    pub anchor: Vec3,
}

/// One layer's neurons: fixed geometry, mutable colors.
#[derive(Debug, Clone)]
pub struct NeuronBatch {
    id: BatchId,
    layer_index: usize,
    name: String,
    kind: LayerKind,
    positions: Vec<Vec3>,
    colors: Vec<Vec4>,
    revision: u64,
    label: Label,
}

impl NeuronBatch {
    /// A batch with every neuron painted `fill`, at revision 0.
    pub fn new(
        layer_index: usize,
        name: String,
        kind: LayerKind,
        positions: Vec<Vec3>,
        fill: Vec4,
        label: Label,
    ) -> Self {
        let colors = vec![fill; positions.len()];
        Self {
            id: BatchId::next(),
            layer_index,
            name,
            kind,
            positions,
            colors,
            revision: 0,
            label,
        }
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn layer_index(&self) -> usize {
        self.layer_index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn instance_count(&self) -> usize {
        self.positions.len()
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn colors(&self) -> &[Vec4] {
        &self.colors
    }

    /// Bumped every time colors change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn label(&self) -> &Label {
        &self.label
    }

    /// Overwrite the overlapping prefix of the color buffer. Returns how many
    /// instances were written.
    pub(crate) fn write_colors(&mut self, colors: &[Vec4]) -> usize {
        let n = colors.len().min(self.colors.len());
        self.colors[..n].copy_from_slice(&colors[..n]);
        self.revision += 1;
        n
    }

    pub(crate) fn fill(&mut self, color: Vec4) {
        self.colors.fill(color);
        self.revision += 1;
    }
}

/// A single line segment between two neuron centres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionSegment {
    pub start: Vec3,
    pub end: Vec3,
    pub color: Vec4,
}

/// Edges between one adjacent layer pair. Rebuilt on every full update.
#[derive(Debug, Clone)]
pub struct ConnectionBatch {
    id: BatchId,
    source_layer: usize,
    target_layer: usize,
    segments: Vec<ConnectionSegment>,
    visible: bool,
}

impl ConnectionBatch {
    pub(crate) fn new(source_layer: usize, target_layer: usize, segments: Vec<ConnectionSegment>) -> Self {
        Self {
            id: BatchId::next(),
            source_layer,
            target_layer,
            segments,
            visible: true,
        }
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn source_layer(&self) -> usize {
        self.source_layer
    }

    pub fn target_layer(&self) -> usize {
        self.target_layer
    }

    pub fn segments(&self) -> &[ConnectionSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub(crate) fn hide(&mut self) {
        self.visible = false;
    }
}
