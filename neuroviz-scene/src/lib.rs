//! Neuroviz Scene Crate
//!
//! Owns the live visualization scene and the rules for mutating it:
//! building neuron batches once, selecting synthetic connections, recoloring
//! on full updates and throttling partial input updates.
//!
//! ## Modules
//!
//! - [`connections`]: Capped connection selection between adjacent layers
//! - [`scene`]: Neuron, connection and label batches, and the builder that mutates them
//! - [`update`]: Trailing throttle for partial updates
//! - [`visualizer`]: The host-facing entry point

pub mod config;
pub mod connections;
pub mod error;
pub mod scene;
pub mod update;
pub mod visualizer;

pub use config::VisualizerConfig;
pub use connections::{
    ConnectionCandidate, ConnectionConfig, ConnectionSelector, max_connections, select_connections,
};
pub use error::VisualizeError;
pub use scene::{
    BatchId, ConnectionBatch, ConnectionSegment, Label, NeuronBatch, Scene, SceneBuilder, SceneState,
};
pub use update::{Throttle, UpdateScheduler};
pub use visualizer::{VisualizeOutcome, Visualizer};
