//! Typed layer records.
//!
//! These are the validated, kind-tagged layers produced by extraction and
//! consumed by layout, labeling and coloring. They are GPU-agnostic.

use std::fmt;

/// Upper bound on neurons in a single layer. Shapes that declare more are
/// treated as malformed.
pub const MAX_LAYER_NEURONS: usize = 1 << 20;

/// The kind of a network layer. Determines layout and coloring rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// Raw pixel input.
    Input,
    /// Convolutional feature map, averaged across channels.
    Convolutional,
    /// Bridge from the last convolution to the dense stages.
    FlattenStack,
    /// Fully connected hidden layer.
    Dense,
    /// Classifier output.
    Output,
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerKind::Input => write!(f, "Input"),
            LayerKind::Convolutional => write!(f, "Conv"),
            LayerKind::FlattenStack => write!(f, "Flatten"),
            LayerKind::Dense => write!(f, "Dense"),
            LayerKind::Output => write!(f, "Output"),
        }
    }
}

/// A dense, row-major grid of pixel intensities.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PixelGrid {
    height: usize,
    width: usize,
    pixels: Vec<f32>,
}

impl PixelGrid {
    /// Create a grid from row-major pixels.
    ///
    /// `pixels` is resized to `height * width`; missing pixels read as 0.
    pub fn new(height: usize, width: usize, mut pixels: Vec<f32>) -> Self {
        pixels.resize(height * width, 0.0);
        Self {
            height,
            width,
            pixels,
        }
    }

    /// Create a grid from possibly ragged rows. Width is the widest row.
    pub fn from_rows(rows: &[Vec<f32>]) -> Self {
        let height = rows.len();
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut pixels = vec![0.0; height * width];
        for (r, row) in rows.iter().enumerate() {
            pixels[r * width..r * width + row.len()].copy_from_slice(row);
        }
        Self {
            height,
            width,
            pixels,
        }
    }

    /// A blank grid.
    pub fn blank(height: usize, width: usize) -> Self {
        Self::new(height, width, Vec::new())
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Bounds-checked read.
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.pixels.get(row * self.width + col).copied()
    }

    /// Bounds-checked write. Out-of-range writes are ignored.
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        if row < self.height && col < self.width {
            self.pixels[row * self.width + col] = value;
        }
    }

    /// Row-major pixel values.
    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    /// Whether any pixel rises above `threshold`.
    pub fn has_ink(&self, threshold: f32) -> bool {
        self.pixels.iter().any(|p| *p > threshold)
    }
}

/// One channel of a convolutional feature map.
///
/// Rows may be ragged and cells may be unreported (`None`); readers treat
/// both as "no contribution".
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelGrid {
    rows: Vec<Vec<Option<f32>>>,
}

impl ChannelGrid {
    pub fn new(rows: Vec<Vec<Option<f32>>>) -> Self {
        Self { rows }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Width of the widest row.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Bounds-checked read of a reported cell.
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        self.rows.get(row)?.get(col).copied().flatten()
    }
}

/// Optional shape metadata consumed by layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct LayerMeta {
    pub height: Option<usize>,
    pub width: Option<usize>,
    pub channels: Option<usize>,
    pub grid_size: Option<usize>,
    pub num_layers: Option<usize>,
}

/// Kind-tagged shape of a layer. Each variant carries only what its kind needs.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerShape {
    Input {
        height: usize,
        width: usize,
    },
    Convolutional {
        height: usize,
        width: usize,
        channels: usize,
        /// Retained per-channel readings, used for averaging and previews.
        channel_grids: Vec<ChannelGrid>,
    },
    FlattenStack {
        grid_size: usize,
        num_layers: usize,
    },
    Dense {
        units: usize,
    },
    Output {
        classes: usize,
    },
}

impl LayerShape {
    pub fn kind(&self) -> LayerKind {
        match self {
            LayerShape::Input { .. } => LayerKind::Input,
            LayerShape::Convolutional { .. } => LayerKind::Convolutional,
            LayerShape::FlattenStack { .. } => LayerKind::FlattenStack,
            LayerShape::Dense { .. } => LayerKind::Dense,
            LayerShape::Output { .. } => LayerKind::Output,
        }
    }

    pub fn meta(&self) -> LayerMeta {
        match *self {
            LayerShape::Input { height, width } => LayerMeta {
                height: Some(height),
                width: Some(width),
                ..LayerMeta::default()
            },
            LayerShape::Convolutional {
                height,
                width,
                channels,
                ..
            } => LayerMeta {
                height: Some(height),
                width: Some(width),
                channels: Some(channels),
                ..LayerMeta::default()
            },
            LayerShape::FlattenStack {
                grid_size,
                num_layers,
            } => LayerMeta {
                grid_size: Some(grid_size),
                num_layers: Some(num_layers),
                ..LayerMeta::default()
            },
            LayerShape::Dense { .. } | LayerShape::Output { .. } => LayerMeta::default(),
        }
    }

    /// Number of neurons a layer of this shape holds, or `None` when the
    /// product overflows or exceeds [`MAX_LAYER_NEURONS`].
    pub fn checked_neurons(&self) -> Option<usize> {
        let count = match *self {
            LayerShape::Input { height, width } => height.checked_mul(width),
            LayerShape::Convolutional { height, width, .. } => height.checked_mul(width),
            LayerShape::FlattenStack {
                grid_size,
                num_layers,
            } => stack_neurons(grid_size, num_layers),
            LayerShape::Dense { units } => Some(units),
            LayerShape::Output { classes } => Some(classes),
        }?;
        (count <= MAX_LAYER_NEURONS).then_some(count)
    }

    /// Number of neurons a layer of this shape holds, clamped to
    /// [`MAX_LAYER_NEURONS`].
    pub fn expected_neurons(&self) -> usize {
        self.checked_neurons().unwrap_or(MAX_LAYER_NEURONS)
    }

    /// Human-readable shape, e.g. `26×26×32`.
    pub fn describe(&self) -> String {
        match *self {
            LayerShape::Input { height, width } => format!("{height}×{width}"),
            LayerShape::Convolutional {
                height,
                width,
                channels,
                ..
            } => format!("{height}×{width}×{channels}"),
            LayerShape::FlattenStack {
                grid_size,
                num_layers,
            } => format!(
                "{grid_size}×{grid_size}×{num_layers} ({})",
                self.expected_neurons()
            ),
            LayerShape::Dense { units } => format!("{units}"),
            LayerShape::Output { classes } => format!("{classes}"),
        }
    }
}

/// A typed layer with index-aligned activations.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    name: String,
    shape: LayerShape,
    activations: Vec<f32>,
}

impl Layer {
    /// Create a layer. Activations are resized to the shape's neuron count
    /// so that `neuron_count() == activations().len()` always holds. Shapes
    /// past [`MAX_LAYER_NEURONS`] are clamped; extraction never builds them.
    pub fn new(name: impl Into<String>, shape: LayerShape, mut activations: Vec<f32>) -> Self {
        activations.resize(shape.expected_neurons(), 0.0);
        Self {
            name: name.into(),
            shape,
            activations,
        }
    }

    /// Input layer straight from a pixel grid.
    pub fn input(name: impl Into<String>, grid: &PixelGrid) -> Self {
        Self::new(
            name,
            LayerShape::Input {
                height: grid.height(),
                width: grid.width(),
            },
            grid.pixels().to_vec(),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &LayerShape {
        &self.shape
    }

    pub fn kind(&self) -> LayerKind {
        self.shape.kind()
    }

    pub fn meta(&self) -> LayerMeta {
        self.shape.meta()
    }

    pub fn activations(&self) -> &[f32] {
        &self.activations
    }

    pub fn neuron_count(&self) -> usize {
        self.activations.len()
    }

    /// Largest absolute activation, 0 for an empty or all-zero layer.
    pub fn max_abs(&self) -> f32 {
        max_abs(&self.activations)
    }

    /// Label text describing kind and shape.
    pub fn label(&self) -> String {
        let kind = self.kind();
        match kind {
            LayerKind::Input | LayerKind::FlattenStack | LayerKind::Output => {
                format!("{kind} · {}", self.shape.describe())
            }
            LayerKind::Convolutional | LayerKind::Dense => {
                format!("{kind} {} · {}", self.name, self.shape.describe())
            }
        }
    }
}

/// `grid_size² × num_layers` without overflow.
pub fn stack_neurons(grid_size: usize, num_layers: usize) -> Option<usize> {
    grid_size.checked_mul(grid_size)?.checked_mul(num_layers)
}

/// Largest absolute value in a slice, 0 when empty.
pub fn max_abs(values: &[f32]) -> f32 {
    values.iter().fold(0.0f32, |acc, v| acc.max(v.abs()))
}
