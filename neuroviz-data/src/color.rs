//! Activation → color mapping.
//!
//! Neurons use a two-segment gradient (blue → cyan → orange-red) over the
//! activation magnitude normalized against the layer's largest magnitude.
//! Edges use a signed scheme: gray near zero, green for positive, red for
//! negative.

use crate::layer::max_abs;
use glam::{Vec3, Vec4};

/// Low anchor. Also the color of empty and reset scenes.
pub const LOW_COLOR: Vec3 = Vec3::new(0.05, 0.15, 0.9);
/// Gradient midpoint.
pub const MID_COLOR: Vec3 = Vec3::new(0.0, 0.9, 0.9);
/// High anchor.
pub const HIGH_COLOR: Vec3 = Vec3::new(1.0, 0.35, 0.0);

pub const EDGE_NEUTRAL: Vec3 = Vec3::new(0.55, 0.55, 0.55);
pub const EDGE_POSITIVE: Vec3 = Vec3::new(0.1, 1.0, 0.35);
pub const EDGE_NEGATIVE: Vec3 = Vec3::new(1.0, 0.15, 0.1);

/// Normalized magnitudes below this render edges as neutral gray.
pub const EDGE_NEUTRAL_BAND: f32 = 0.05;
pub const EDGE_MIN_ALPHA: f32 = 0.15;
pub const EDGE_MAX_ALPHA: f32 = 0.75;

/// Opaque color used for neurons that carry no activation.
pub fn empty_color() -> Vec4 {
    LOW_COLOR.extend(1.0)
}

/// Scale `value` by `layer_max_abs` into `[0, 1]`.
///
/// Returns 0 when `layer_max_abs` is 0 or not finite.
pub fn normalize(value: f32, layer_max_abs: f32) -> f32 {
    if !(layer_max_abs > 0.0) || !layer_max_abs.is_finite() {
        return 0.0;
    }
    (value.abs() / layer_max_abs).clamp(0.0, 1.0)
}

/// Maps activations and edge strengths to RGBA colors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivationColorMapper {
    low: Vec3,
    mid: Vec3,
    high: Vec3,
}

impl Default for ActivationColorMapper {
    fn default() -> Self {
        Self {
            low: LOW_COLOR,
            mid: MID_COLOR,
            high: HIGH_COLOR,
        }
    }
}

impl ActivationColorMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gradient color for an already-normalized magnitude in `[0, 1]`.
    pub fn gradient(&self, t: f32) -> Vec4 {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let rgb = if t <= 0.5 {
            self.low.lerp(self.mid, t * 2.0)
        } else {
            self.mid.lerp(self.high, (t - 0.5) * 2.0)
        };
        rgb.extend(1.0)
    }

    pub fn neuron_color(&self, value: f32, layer_max_abs: f32) -> Vec4 {
        self.gradient(normalize(value, layer_max_abs))
    }

    /// Colors for a whole layer, normalized against its own largest magnitude.
    pub fn layer_colors(&self, activations: &[f32]) -> Vec<Vec4> {
        let peak = max_abs(activations);
        activations
            .iter()
            .map(|v| self.neuron_color(*v, peak))
            .collect()
    }

    /// Signed edge color for `strength` against the strongest edge in its batch.
    pub fn connection_color(&self, strength: f32, batch_max_abs: f32) -> Vec4 {
        let n = normalize(strength, batch_max_abs);
        let alpha = EDGE_MIN_ALPHA + (EDGE_MAX_ALPHA - EDGE_MIN_ALPHA) * n;
        let rgb = if n < EDGE_NEUTRAL_BAND {
            EDGE_NEUTRAL
        } else if strength > 0.0 {
            EDGE_NEUTRAL.lerp(EDGE_POSITIVE, n)
        } else {
            EDGE_NEUTRAL.lerp(EDGE_NEGATIVE, n)
        };
        rgb.extend(alpha)
    }
}
