//! Normalizes a raw [`InferenceResponse`] into an ordered list of typed layers.
//!
//! Canonical order is: input, each convolutional stage in plan order, the
//! flatten bridge, each dense stage, the output stage. Stages absent from the
//! response, or present with no values, are omitted; malformed grids are read
//! with bounds checks and never fail extraction.

use crate::layer::{ChannelGrid, Layer, LayerShape, MAX_LAYER_NEURONS, stack_neurons};
use crate::response::{InferenceResponse, LayerPayload};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Names and dimensions of the flatten bridge stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlattenPlan {
    pub name: String,
    /// Side of each sub-grid. Defaults to the last convolution's height.
    pub grid_size: Option<usize>,
    /// Number of stacked sub-grids. Defaults to the last convolution's channels.
    pub num_layers: Option<usize>,
}

impl Default for FlattenPlan {
    fn default() -> Self {
        Self {
            name: "flatten".to_string(),
            grid_size: None,
            num_layers: None,
        }
    }
}

/// Which stage names the extractor recognizes, in definition order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionPlan {
    pub input: String,
    pub conv_stages: Vec<String>,
    pub flatten: FlattenPlan,
    pub dense_stages: Vec<String>,
    pub output: String,
}

impl Default for ExtractionPlan {
    fn default() -> Self {
        Self {
            input: "input".to_string(),
            conv_stages: vec!["conv1".to_string(), "conv2".to_string()],
            flatten: FlattenPlan::default(),
            dense_stages: vec!["dense1".to_string()],
            output: "output".to_string(),
        }
    }
}

impl ExtractionPlan {
    fn recognizes(&self, name: &str) -> bool {
        self.conv_stages.iter().any(|s| s == name)
            || self.dense_stages.iter().any(|s| s == name)
            || self.flatten.name == name
            || self.output == name
    }
}

/// A convolution's grids kept around so the flatten bridge can read them.
struct ConvSource<'a> {
    height: usize,
    channels: usize,
    grids: &'a [ChannelGrid],
}

impl ConvSource<'_> {
    /// Flatten dimensions read off the grids themselves.
    fn grid_dims(&self) -> (usize, usize) {
        (max_grid_height(self.grids), self.grids.len())
    }
}

/// A neuron count a layer can actually hold.
fn usable_count(count: Option<usize>) -> Option<usize> {
    count.filter(|n| (1..=MAX_LAYER_NEURONS).contains(n))
}

/// Turns raw responses into typed layers.
#[derive(Debug, Clone, Default)]
pub struct LayerExtractor {
    plan: ExtractionPlan,
}

impl LayerExtractor {
    pub fn new(plan: ExtractionPlan) -> Self {
        Self { plan }
    }

    pub fn plan(&self) -> &ExtractionPlan {
        &self.plan
    }

    /// Whether the response carries any activation payload this extractor
    /// recognizes. The input pixel grid alone does not count.
    pub fn has_activation_data(&self, response: &InferenceResponse) -> bool {
        self.plan
            .conv_stages
            .iter()
            .chain(self.plan.dense_stages.iter())
            .chain(std::iter::once(&self.plan.output))
            .any(|name| response.payload(name).is_some())
    }

    /// Extract layers in canonical order. Returns an empty list when the
    /// response has no activation data.
    pub fn extract(&self, response: &InferenceResponse) -> Vec<Layer> {
        if !self.has_activation_data(response) {
            debug!("Response carries no activation data - nothing to draw");
            return Vec::new();
        }

        for name in response.layers.keys() {
            if !self.plan.recognizes(name) {
                debug!("Ignoring unrecognized stage '{}'", name);
            }
        }

        let mut layers = Vec::new();

        if let Some(grid) = response.input_grid() {
            if !grid.is_empty() {
                layers.push(Layer::input(&self.plan.input, &grid));
            }
        }

        let mut last_conv = None;
        for name in &self.plan.conv_stages {
            match response.payload(name) {
                Some(LayerPayload::Grids { shape, channels }) => {
                    if let Some(layer) = convolutional_layer(name, shape, channels) {
                        layers.push(layer);
                        last_conv = Some(layers.len() - 1);
                    }
                }
                Some(_) => warn!("Stage '{}' expected channel grids, skipping", name),
                None => debug!("Stage '{}' missing from response", name),
            }
        }

        let conv_source = last_conv.and_then(|idx| match layers[idx].shape() {
            LayerShape::Convolutional {
                height,
                channels,
                channel_grids,
                ..
            } => Some(ConvSource {
                height: *height,
                channels: *channels,
                grids: channel_grids.as_slice(),
            }),
            _ => None,
        });
        let flatten = self.flatten_layer(response, conv_source);
        layers.extend(flatten);

        for name in &self.plan.dense_stages {
            match response.payload(name) {
                Some(LayerPayload::Flat { values }) if values.is_empty() => {
                    warn!("Stage '{}' has no values, skipping", name)
                }
                Some(LayerPayload::Flat { values }) => layers.push(Layer::new(
                    name.as_str(),
                    LayerShape::Dense {
                        units: values.len(),
                    },
                    values.clone(),
                )),
                Some(_) => warn!("Stage '{}' expected flat values, skipping", name),
                None => debug!("Stage '{}' missing from response", name),
            }
        }

        match response.payload(&self.plan.output) {
            Some(LayerPayload::Flat { values }) if values.is_empty() => {
                warn!("Output stage has no values, skipping")
            }
            Some(LayerPayload::Flat { values }) => layers.push(Layer::new(
                self.plan.output.as_str(),
                LayerShape::Output {
                    classes: values.len(),
                },
                values.clone(),
            )),
            Some(_) => warn!("Output stage expected flat values, skipping"),
            None => debug!("Output stage missing from response"),
        }

        debug!("Extracted {} layers", layers.len());
        layers
    }

    fn flatten_layer(
        &self,
        response: &InferenceResponse,
        conv: Option<ConvSource<'_>>,
    ) -> Option<Layer> {
        let plan = &self.plan.flatten;
        let payload = response.payload(&plan.name)?;

        let grid_size = plan.grid_size.or(conv.as_ref().map(|c| c.height));
        let num_layers = plan.num_layers.or(conv.as_ref().map(|c| c.channels));
        let (Some(grid_size), Some(num_layers)) = (grid_size, num_layers) else {
            debug!("Flatten stage has no known dimensions, skipping");
            return None;
        };
        let (grid_size, num_layers, expected) =
            match usable_count(stack_neurons(grid_size, num_layers)) {
                Some(expected) => (grid_size, num_layers, expected),
                None => {
                    warn!(
                        "Flatten stage declares {}×{}×{}, using grid dimensions",
                        grid_size, grid_size, num_layers
                    );
                    let (grid_size, num_layers) = conv.as_ref()?.grid_dims();
                    let Some(expected) = usable_count(stack_neurons(grid_size, num_layers)) else {
                        warn!("Flatten stage has no readable cells, skipping");
                        return None;
                    };
                    (grid_size, num_layers, expected)
                }
            };
        let shape = LayerShape::FlattenStack {
            grid_size,
            num_layers,
        };

        let values = match payload {
            LayerPayload::Flatten { empty: true } => vec![0.0; expected],
            LayerPayload::Flatten { empty: false } => match conv {
                Some(conv) => flatten_channels(conv.grids, grid_size, num_layers),
                None => vec![0.0; expected],
            },
            // Explicit values are zero-padded or truncated by `Layer::new`.
            LayerPayload::Flat { values } => values.clone(),
            LayerPayload::Grids { .. } => {
                warn!("Flatten stage does not accept channel grids, skipping");
                return None;
            }
        };

        Some(Layer::new(plan.name.as_str(), shape, values))
    }
}

/// Build a convolutional layer whose activations are the per-cell mean over
/// the channels that report each cell.
///
/// A declared shape that is non-positive, overflows or exceeds
/// [`MAX_LAYER_NEURONS`] gives way to the grids' own dimensions. Returns
/// `None` when neither yields any cells.
fn convolutional_layer(
    name: &str,
    shape: &[usize],
    channels: &[Vec<Vec<Option<f32>>>],
) -> Option<Layer> {
    let channel_grids: Vec<ChannelGrid> = channels.iter().cloned().map(ChannelGrid::new).collect();

    let declared = match shape {
        [h, w, ..] if usable_count(h.checked_mul(*w)).is_some() => Some((*h, *w)),
        _ => None,
    };
    let (height, width) = declared.unwrap_or_else(|| {
        warn!(
            "Stage '{}' has malformed shape {:?}, using grid dimensions",
            name, shape
        );
        (
            max_grid_height(&channel_grids),
            channel_grids.iter().map(ChannelGrid::width).max().unwrap_or(0),
        )
    });
    let Some(cells) = usable_count(height.checked_mul(width)) else {
        warn!("Stage '{}' has no readable cells, skipping", name);
        return None;
    };
    let channel_count = match shape.get(2) {
        Some(&c) if c > 0 => c,
        _ => channel_grids.len(),
    };

    let mut mean = Vec::with_capacity(cells);
    for row in 0..height {
        for col in 0..width {
            let (sum, count) = channel_grids
                .iter()
                .filter_map(|grid| grid.get(row, col))
                .fold((0.0f32, 0usize), |(sum, count), v| (sum + v, count + 1));
            mean.push(if count > 0 { sum / count as f32 } else { 0.0 });
        }
    }

    Some(Layer::new(
        name,
        LayerShape::Convolutional {
            height,
            width,
            channels: channel_count,
            channel_grids,
        },
        mean,
    ))
}

fn max_grid_height(grids: &[ChannelGrid]) -> usize {
    grids.iter().map(ChannelGrid::height).max().unwrap_or(0)
}

/// Positional (channel, row, col) flattening. Slots whose channel or cell is
/// not reported stay zero.
fn flatten_channels(grids: &[ChannelGrid], grid_size: usize, num_layers: usize) -> Vec<f32> {
    let mut values = vec![0.0; grid_size * grid_size * num_layers];
    for (channel, grid) in grids.iter().take(num_layers).enumerate() {
        for row in 0..grid_size {
            for col in 0..grid_size {
                if let Some(v) = grid.get(row, col) {
                    values[channel * grid_size * grid_size + row * grid_size + col] = v;
                }
            }
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::LayerKind;

    fn full_response() -> InferenceResponse {
        InferenceResponse::new()
            .with_input(vec![vec![0.0, 1.0], vec![1.0, 0.0]])
            .with_layer(
                "conv1",
                LayerPayload::grids(
                    [2, 2, 2],
                    vec![
                        vec![vec![1.0, 2.0], vec![3.0, 4.0]],
                        vec![vec![3.0, 4.0], vec![5.0, 6.0]],
                    ],
                ),
            )
            .with_layer("flatten", LayerPayload::flatten(false))
            .with_layer("dense1", LayerPayload::flat(vec![0.5; 12]))
            .with_layer("output", LayerPayload::flat(vec![0.1; 10]))
    }

    #[test]
    fn test_canonical_order() {
        let layers = LayerExtractor::default().extract(&full_response());
        let kinds: Vec<LayerKind> = layers.iter().map(Layer::kind).collect();
        assert_eq!(
            kinds,
            vec![
                LayerKind::Input,
                LayerKind::Convolutional,
                LayerKind::FlattenStack,
                LayerKind::Dense,
                LayerKind::Output,
            ]
        );
    }

    #[test]
    fn test_missing_stage_is_omitted() {
        let mut response = full_response();
        response.layers.remove("dense1");
        let layers = LayerExtractor::default().extract(&response);
        assert_eq!(layers.len(), 4);
        assert!(layers.iter().all(|l| l.kind() != LayerKind::Dense));
    }

    #[test]
    fn test_no_activation_data_yields_empty_list() {
        let response = InferenceResponse::new().with_input(vec![vec![1.0]]);
        assert!(LayerExtractor::default().extract(&response).is_empty());
        assert!(LayerExtractor::default().extract(&InferenceResponse::new()).is_empty());
    }

    #[test]
    fn test_conv_mean_across_channels() {
        let layers = LayerExtractor::default().extract(&full_response());
        assert_eq!(layers[1].activations(), &[2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_conv_mean_ignores_absent_channels() {
        let response = InferenceResponse::new().with_layer(
            "conv1",
            LayerPayload::Grids {
                shape: vec![1, 2, 3],
                channels: vec![
                    vec![vec![Some(2.0), Some(1.0)]],
                    vec![vec![Some(4.0)]],
                    vec![vec![None, None]],
                ],
            },
        );
        let layers = LayerExtractor::default().extract(&response);
        // Cell 0 averages two readings; cell 1 has only one reporter.
        assert_eq!(layers[0].activations(), &[3.0, 1.0]);
    }

    #[test]
    fn test_malformed_shape_falls_back_to_grid_dimensions() {
        let response = InferenceResponse::new().with_layer(
            "conv1",
            LayerPayload::Grids {
                shape: vec![0],
                channels: vec![vec![vec![Some(1.0), Some(2.0), Some(3.0)]]],
            },
        );
        let layers = LayerExtractor::default().extract(&response);
        assert_eq!(layers[0].neuron_count(), 3);
        assert_eq!(layers[0].meta().height, Some(1));
        assert_eq!(layers[0].meta().width, Some(3));
    }

    #[test]
    fn test_short_grids_read_as_no_contribution() {
        let response = InferenceResponse::new().with_layer(
            "conv1",
            LayerPayload::grids([3, 3, 1], vec![vec![vec![1.0]]]),
        );
        let layers = LayerExtractor::default().extract(&response);
        assert_eq!(layers[0].neuron_count(), 9);
        assert_eq!(layers[0].activations()[0], 1.0);
        assert!(layers[0].activations()[1..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_flatten_channel_row_col_order() {
        let layers = LayerExtractor::default().extract(&full_response());
        let flatten = &layers[2];
        assert_eq!(flatten.meta().grid_size, Some(2));
        assert_eq!(flatten.meta().num_layers, Some(2));
        assert_eq!(
            flatten.activations(),
            &[1.0, 2.0, 3.0, 4.0, 3.0, 4.0, 5.0, 6.0]
        );
    }

    #[test]
    fn test_flatten_marked_empty_is_zero() {
        let mut response = full_response();
        response
            .layers
            .insert("flatten".to_string(), LayerPayload::flatten(true));
        let layers = LayerExtractor::default().extract(&response);
        assert_eq!(layers[2].neuron_count(), 8);
        assert!(layers[2].activations().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_flatten_zero_pads_missing_channels() {
        let plan = ExtractionPlan {
            flatten: FlattenPlan {
                grid_size: Some(2),
                num_layers: Some(4),
                ..FlattenPlan::default()
            },
            ..ExtractionPlan::default()
        };
        let layers = LayerExtractor::new(plan).extract(&full_response());
        let flatten = &layers[2];
        assert_eq!(flatten.neuron_count(), 16);
        assert_eq!(&flatten.activations()[..8], &[1.0, 2.0, 3.0, 4.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(flatten.activations()[8..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_absurd_declared_shape_uses_grid_dimensions() {
        let response = InferenceResponse::new()
            .with_input(vec![vec![1.0]])
            .with_layer(
                "conv1",
                LayerPayload::grids([8_589_934_592, 8_589_934_592, 1], vec![vec![vec![0.5]]]),
            )
            .with_layer(
                "conv2",
                LayerPayload::grids([100_000, 100_000, 1], vec![vec![vec![0.25, 0.75]]]),
            );
        let layers = LayerExtractor::default().extract(&response);
        assert_eq!(layers.len(), 3);
        assert_eq!(layers[1].activations(), &[0.5]);
        assert_eq!(layers[2].meta().height, Some(1));
        assert_eq!(layers[2].meta().width, Some(2));
        assert_eq!(layers[2].activations(), &[0.25, 0.75]);
    }

    #[test]
    fn test_absurd_flatten_plan_uses_grid_dimensions() {
        let plan = ExtractionPlan {
            flatten: FlattenPlan {
                grid_size: Some(usize::MAX),
                num_layers: Some(3),
                ..FlattenPlan::default()
            },
            ..ExtractionPlan::default()
        };
        let layers = LayerExtractor::new(plan).extract(&full_response());
        let flatten = &layers[2];
        assert_eq!(flatten.kind(), LayerKind::FlattenStack);
        assert_eq!(flatten.meta().grid_size, Some(2));
        assert_eq!(flatten.meta().num_layers, Some(2));
        assert_eq!(flatten.neuron_count(), 8);
    }

    #[test]
    fn test_stages_without_values_are_omitted() {
        let response = InferenceResponse::new()
            .with_input(vec![vec![1.0; 4]; 4])
            .with_layer(
                "conv1",
                LayerPayload::Grids {
                    shape: vec![0, 0, 0],
                    channels: Vec::new(),
                },
            )
            .with_layer("dense1", LayerPayload::flat(Vec::new()))
            .with_layer("output", LayerPayload::flat(vec![0.2, 0.9]));
        let layers = LayerExtractor::default().extract(&response);
        let names: Vec<&str> = layers.iter().map(Layer::name).collect();
        assert_eq!(names, vec!["input", "output"]);
        assert!(layers.iter().all(|l| l.neuron_count() > 0));
    }

    #[test]
    fn test_flatten_is_deterministic() {
        let extractor = LayerExtractor::default();
        let a = extractor.extract(&full_response());
        let b = extractor.extract(&full_response());
        assert_eq!(a, b);
    }
}
