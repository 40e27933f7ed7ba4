//! Scene representation
//!
//! Instanced neuron batches per layer, connection batches per adjacent layer
//! pair, and the labels attached to each layer.

pub mod batches;
pub mod builder;

pub use batches::{BatchId, ConnectionBatch, ConnectionSegment, Label, NeuronBatch};
pub use builder::{Scene, SceneBuilder, SceneState};
