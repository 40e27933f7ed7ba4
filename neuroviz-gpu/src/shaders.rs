//! Shader source code embedded at compile time.

/// Neuron shader: camera-facing circular billboards, one instance per neuron.
pub const NEURON: &str = include_str!("../shaders/neuron.wgsl");

/// Connection shader: one line segment per instance, alpha blended.
pub const CONNECTION: &str = include_str!("../shaders/connection.wgsl");
