//! Wire model of a raw inference response.
//!
//! Payloads are loosely shaped on the wire: a named stage is either a set of
//! per-channel grids with a declared shape, a flat activation sequence, or a
//! flatten marker. Validation into typed layers happens once, in
//! [`crate::extract`].

use crate::layer::PixelGrid;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Errors raised while reading a response.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("Malformed response JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Activation payload for one named stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayerPayload {
    /// Per-channel 2D grids. `shape` is `[height, width, channels]`.
    /// `null` cells are unreported.
    Grids {
        #[serde(default)]
        shape: Vec<usize>,
        channels: Vec<Vec<Vec<Option<f32>>>>,
    },
    /// Flat activation sequence.
    Flat { values: Vec<f32> },
    /// Flatten bridge marker. Values are derived from the last convolution.
    Flatten {
        #[serde(default)]
        empty: bool,
    },
}

impl LayerPayload {
    pub fn flat(values: Vec<f32>) -> Self {
        LayerPayload::Flat { values }
    }

    /// Fully reported channel grids with a declared shape.
    pub fn grids(shape: [usize; 3], channels: Vec<Vec<Vec<f32>>>) -> Self {
        LayerPayload::Grids {
            shape: shape.to_vec(),
            channels: channels
                .into_iter()
                .map(|grid| {
                    grid.into_iter()
                        .map(|row| row.into_iter().map(Some).collect())
                        .collect()
                })
                .collect(),
        }
    }

    pub fn flatten(empty: bool) -> Self {
        LayerPayload::Flatten { empty }
    }
}

/// A raw inference response as delivered by the inference collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceResponse {
    /// Raw pixel grid of the live input.
    #[serde(default)]
    pub input: Option<Vec<Vec<f32>>>,
    /// Named stage payloads.
    #[serde(default)]
    pub layers: BTreeMap<String, LayerPayload>,
}

impl InferenceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, ResponseError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, ResponseError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ResponseError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Set the input pixel rows.
    pub fn with_input(mut self, rows: Vec<Vec<f32>>) -> Self {
        self.input = Some(rows);
        self
    }

    /// Set the input from a pixel grid.
    pub fn with_input_grid(mut self, grid: &PixelGrid) -> Self {
        let rows = grid
            .pixels()
            .chunks(grid.width().max(1))
            .map(<[f32]>::to_vec)
            .collect();
        self.input = Some(rows);
        self
    }

    /// Add a named stage payload.
    pub fn with_layer(mut self, name: impl Into<String>, payload: LayerPayload) -> Self {
        self.layers.insert(name.into(), payload);
        self
    }

    /// The input as a dense pixel grid, if present.
    pub fn input_grid(&self) -> Option<PixelGrid> {
        self.input.as_deref().map(PixelGrid::from_rows)
    }

    pub fn payload(&self, name: &str) -> Option<&LayerPayload> {
        self.layers.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_payloads() {
        let json = r#"{
            "input": [[0.0, 1.0], [0.5]],
            "layers": {
                "conv1": { "shape": [2, 2, 1], "channels": [[[0.1, null], [0.3, 0.4]]] },
                "flatten": { "empty": true },
                "dense1": { "values": [1.0, 2.0] },
                "mystery": {}
            }
        }"#;
        let response = InferenceResponse::from_json(json).expect("parse");

        match response.payload("conv1") {
            Some(LayerPayload::Grids { shape, channels }) => {
                assert_eq!(shape, &vec![2, 2, 1]);
                assert_eq!(channels[0][0][1], None);
            }
            other => panic!("Expected grids, got {other:?}"),
        }
        assert_eq!(
            response.payload("flatten"),
            Some(&LayerPayload::Flatten { empty: true })
        );
        assert_eq!(
            response.payload("dense1"),
            Some(&LayerPayload::Flat {
                values: vec![1.0, 2.0]
            })
        );

        let grid = response.input_grid().expect("input");
        assert_eq!((grid.height(), grid.width()), (2, 2));
        assert_eq!(grid.get(1, 1), Some(0.0));
    }

    #[test]
    fn test_parse_empty_object() {
        let response = InferenceResponse::from_json("{}").expect("parse");
        assert!(response.input.is_none());
        assert!(response.layers.is_empty());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let result = InferenceResponse::from_json("{ \"layers\": [1, 2");
        assert!(matches!(result, Err(ResponseError::Json(_))));
    }

    #[test]
    fn test_input_grid_round_trip() {
        let mut grid = PixelGrid::blank(3, 2);
        grid.set(2, 1, 0.7);
        let response = InferenceResponse::new().with_input_grid(&grid);
        assert_eq!(response.input_grid(), Some(grid));
    }
}
