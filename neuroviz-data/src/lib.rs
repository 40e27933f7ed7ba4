//! Neuroviz Data Crate
//!
//! Parsing, extraction, layout and coloring of network activations.
//! This crate is GPU-agnostic and focuses on turning raw inference responses
//! into typed layers with deterministic neuron positions and colors.

pub mod color;
pub mod extract;
pub mod layer;
pub mod layout;
pub mod response;

pub use color::{ActivationColorMapper, empty_color, normalize};
pub use extract::{ExtractionPlan, FlattenPlan, LayerExtractor};
pub use layer::{
    ChannelGrid, Layer, LayerKind, LayerMeta, LayerShape, MAX_LAYER_NEURONS, PixelGrid, max_abs,
    stack_neurons,
};
pub use layout::{LayoutConfig, compute_layer_positions};
pub use response::{InferenceResponse, LayerPayload, ResponseError};
