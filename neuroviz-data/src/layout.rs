//! Deterministic neuron placement.
//!
//! Layers march along +X. Inside a layer, grid rows run down Y (row 0 on top)
//! and grid columns run along Z. Flatten stacks tile their sub-grids along Z.
//! Placement is a pure function of `(layer_index, neuron_count, kind, meta)`,
//! so repeated calls are bit-identical and only colors ever change between
//! updates.

use crate::layer::{LayerKind, LayerMeta, stack_neurons};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Layers with at most this many neurons are drawn as a vertical column.
pub const COLUMN_THRESHOLD: usize = 10;

/// Spacing constants for layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Distance between consecutive layers along X.
    pub layer_spacing: f32,
    /// Cell pitch shared by input, convolution and flatten sub-grids.
    pub grid_spacing: f32,
    /// Cell pitch of near-square dense grids.
    pub dense_spacing: f32,
    /// Vertical pitch of small column layers.
    pub column_spacing: f32,
    /// Distance between stacked flatten sub-grids along Z.
    pub stack_pitch: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            layer_spacing: 12.0,
            grid_spacing: 0.3,
            dense_spacing: 0.35,
            column_spacing: 0.8,
            stack_pitch: 0.45,
        }
    }
}

impl LayoutConfig {
    /// X coordinate of a layer's plane.
    pub fn layer_x(&self, layer_index: usize) -> f32 {
        layer_index as f32 * self.layer_spacing
    }

    /// Positions for every neuron of a layer, in activation order.
    pub fn positions(
        &self,
        layer_index: usize,
        neuron_count: usize,
        kind: LayerKind,
        meta: &LayerMeta,
    ) -> Vec<Vec3> {
        let x = self.layer_x(layer_index);
        if neuron_count == 0 {
            return Vec::new();
        }

        match kind {
            LayerKind::Input | LayerKind::Convolutional => {
                let grid = match (meta.height, meta.width) {
                    (Some(h), Some(w)) if h.checked_mul(w) == Some(neuron_count) => {
                        GridArrangement::new(h, w, self.grid_spacing)
                    }
                    _ => GridArrangement::auto(neuron_count, self.grid_spacing),
                };
                grid.plane(x, neuron_count)
            }
            LayerKind::FlattenStack => match (meta.grid_size, meta.num_layers) {
                (Some(g), Some(n)) if stack_neurons(g, n) == Some(neuron_count) => {
                    self.stack(x, g, n)
                }
                _ => GridArrangement::auto(neuron_count, self.dense_spacing).plane(x, neuron_count),
            },
            LayerKind::Dense | LayerKind::Output => {
                if neuron_count <= COLUMN_THRESHOLD {
                    self.column(x, neuron_count)
                } else {
                    GridArrangement::auto(neuron_count, self.dense_spacing).plane(x, neuron_count)
                }
            }
        }
    }

    fn column(&self, x: f32, count: usize) -> Vec<Vec3> {
        (0..count)
            .map(|i| Vec3::new(x, centered(count - 1 - i, count) * self.column_spacing, 0.0))
            .collect()
    }

    fn stack(&self, x: f32, grid_size: usize, num_layers: usize) -> Vec<Vec3> {
        let mut positions = Vec::with_capacity(stack_neurons(grid_size, num_layers).unwrap_or(0));
        for tile in 0..num_layers {
            let z = centered(tile, num_layers) * self.stack_pitch;
            for row in 0..grid_size {
                let y = centered(grid_size - 1 - row, grid_size) * self.grid_spacing;
                for col in 0..grid_size {
                    let dx = centered(col, grid_size) * self.grid_spacing;
                    positions.push(Vec3::new(x + dx, y, z));
                }
            }
        }
        positions
    }
}

/// Positions for one layer using the default spacing.
pub fn compute_layer_positions(
    layer_index: usize,
    neuron_count: usize,
    kind: LayerKind,
    meta: &LayerMeta,
) -> Vec<Vec3> {
    LayoutConfig::default().positions(layer_index, neuron_count, kind, meta)
}

/// Offset of slot `i` of `n` from the centre, in units of one pitch.
fn centered(i: usize, n: usize) -> f32 {
    i as f32 - (n.saturating_sub(1)) as f32 / 2.0
}

/// Rectangular row-major arrangement of cells on the Y/Z plane.
#[derive(Debug, Clone, Copy, PartialEq)]
struct GridArrangement {
    rows: usize,
    cols: usize,
    spacing: f32,
}

impl GridArrangement {
    fn new(rows: usize, cols: usize, spacing: f32) -> Self {
        Self {
            rows,
            cols,
            spacing,
        }
    }

    /// Near-square packing: `cols = ceil(sqrt(n))`, `rows = ceil(n / cols)`.
    fn auto(count: usize, spacing: f32) -> Self {
        let cols = ((count as f64).sqrt().ceil() as usize).max(1);
        let rows = count.div_ceil(cols);
        Self::new(rows, cols, spacing)
    }

    /// First `count` cells, row-major. A partial last row keeps the centering
    /// of the full rectangle.
    fn plane(&self, x: f32, count: usize) -> Vec<Vec3> {
        (0..count)
            .map(|i| {
                let row = i / self.cols;
                let col = i % self.cols;
                Vec3::new(
                    x,
                    centered(self.rows - 1 - row, self.rows) * self.spacing,
                    centered(col, self.cols) * self.spacing,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_meta(h: usize, w: usize) -> LayerMeta {
        LayerMeta {
            height: Some(h),
            width: Some(w),
            ..LayerMeta::default()
        }
    }

    #[test]
    fn test_position_count_matches_neurons() {
        let cases = [
            (LayerKind::Input, 784, grid_meta(28, 28)),
            (LayerKind::Convolutional, 676, grid_meta(26, 26)),
            (LayerKind::Dense, 128, LayerMeta::default()),
            (LayerKind::Dense, 7, LayerMeta::default()),
            (LayerKind::Output, 10, LayerMeta::default()),
            (LayerKind::Convolutional, 13, grid_meta(4, 4)),
        ];
        for (kind, n, meta) in cases {
            assert_eq!(compute_layer_positions(2, n, kind, &meta).len(), n, "{kind} {n}");
        }
        assert!(compute_layer_positions(0, 0, LayerKind::Dense, &LayerMeta::default()).is_empty());
    }

    #[test]
    fn test_layout_is_deterministic() {
        let meta = grid_meta(26, 26);
        let a = compute_layer_positions(1, 676, LayerKind::Convolutional, &meta);
        let b = compute_layer_positions(1, 676, LayerKind::Convolutional, &meta);
        assert_eq!(a, b);
    }

    #[test]
    fn test_primary_axis_spacing() {
        let positions = compute_layer_positions(3, 5, LayerKind::Output, &LayerMeta::default());
        assert!(positions.iter().all(|p| p.x == 36.0));
    }

    #[test]
    fn test_square_grid_is_centered_with_row_zero_on_top() {
        let positions = compute_layer_positions(0, 9, LayerKind::Input, &grid_meta(3, 3));
        assert!((positions[0].y - 0.3).abs() < 1e-6);
        assert!((positions[0].z + 0.3).abs() < 1e-6);
        assert!((positions[8].y + 0.3).abs() < 1e-6);
        assert!((positions[8].z - 0.3).abs() < 1e-6);
        let centroid: Vec3 = positions.iter().copied().sum::<Vec3>() / 9.0;
        assert!(centroid.y.abs() < 1e-6 && centroid.z.abs() < 1e-6);
    }

    #[test]
    fn test_small_layer_is_a_vertical_column() {
        let positions = compute_layer_positions(4, 10, LayerKind::Output, &LayerMeta::default());
        assert!(positions.iter().all(|p| p.z == 0.0));
        for pair in positions.windows(2) {
            assert!((pair[0].y - pair[1].y - 0.8).abs() < 1e-5);
        }
        assert!((positions[0].y + positions[9].y).abs() < 1e-5);
    }

    #[test]
    fn test_dense_near_square_grid() {
        let positions = compute_layer_positions(1, 128, LayerKind::Dense, &LayerMeta::default());
        // ceil(sqrt(128)) = 12 columns, ceil(128 / 12) = 11 rows.
        let mut zs: Vec<i32> = positions.iter().map(|p| (p.z * 1000.0).round() as i32).collect();
        zs.sort_unstable();
        zs.dedup();
        assert_eq!(zs.len(), 12);
        let mut ys: Vec<i32> = positions.iter().map(|p| (p.y * 1000.0).round() as i32).collect();
        ys.sort_unstable();
        ys.dedup();
        assert_eq!(ys.len(), 11);
    }

    #[test]
    fn test_flatten_stack_groups_sub_grids_along_z() {
        let meta = LayerMeta {
            grid_size: Some(3),
            num_layers: Some(64),
            ..LayerMeta::default()
        };
        let positions = compute_layer_positions(2, 576, LayerKind::FlattenStack, &meta);
        assert_eq!(positions.len(), 576);

        let tiles: Vec<f32> = positions.chunks(9).map(|tile| tile[0].z).collect();
        assert_eq!(tiles.len(), 64);
        for tile in positions.chunks(9) {
            assert!(tile.iter().all(|p| p.z == tile[0].z));
        }
        for pair in tiles.windows(2) {
            assert!((pair[1] - pair[0] - 0.45).abs() < 1e-5);
        }
        assert!((tiles[0] + tiles[63]).abs() < 1e-4);
    }

    #[test]
    fn test_degenerate_grid_counts_do_not_panic() {
        // 13 cells against 4x4 metadata: falls back to 4 columns, 4 rows.
        let positions = compute_layer_positions(0, 13, LayerKind::Convolutional, &grid_meta(4, 4));
        assert_eq!(positions.len(), 13);
        assert!((positions[12].y + 0.45).abs() < 1e-5);
        assert!((positions[12].z + 0.45).abs() < 1e-5);

        let positions = compute_layer_positions(0, 2, LayerKind::Input, &LayerMeta::default());
        assert_eq!(positions.len(), 2);

        // Flatten whose metadata does not multiply out.
        let meta = LayerMeta {
            grid_size: Some(3),
            num_layers: Some(2),
            ..LayerMeta::default()
        };
        let positions = compute_layer_positions(0, 17, LayerKind::FlattenStack, &meta);
        assert_eq!(positions.len(), 17);
    }

    #[test]
    fn test_overflowing_metadata_falls_back_to_auto_grid() {
        let positions = compute_layer_positions(
            0,
            4,
            LayerKind::Convolutional,
            &grid_meta(usize::MAX, 2),
        );
        assert_eq!(positions.len(), 4);

        let meta = LayerMeta {
            grid_size: Some(usize::MAX),
            num_layers: Some(usize::MAX),
            ..LayerMeta::default()
        };
        let positions = compute_layer_positions(0, 6, LayerKind::FlattenStack, &meta);
        assert_eq!(positions.len(), 6);
    }
}
