//! Synthetic connection selection between adjacent layers.
//!
//! No trained weights are available to the visualizer, so edge strength is
//! the product of the endpoint activations. It is an illustrative proxy only.
//! The number of edges kept per pair is capped by a step function of the
//! pair count so the largest pairs stay within a fixed primitive budget.

use neuroviz_data::Layer;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// A candidate edge between two neurons of adjacent layers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionCandidate {
    pub source: usize,
    pub target: usize,
    pub strength: f32,
}

/// Selection tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Targets below this are skipped; edges at or below it are discarded.
    pub min_strength_threshold: f32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            min_strength_threshold: 0.01,
        }
    }
}

/// Edge budget for a pair with `pair_count = source_count * target_count`.
///
/// Never decreases as the pair count shrinks.
pub fn max_connections(pair_count: usize) -> usize {
    match pair_count {
        p if p > 500_000 => 5_000,
        p if p > 100_000 => 10_000,
        p if p > 10_000 => 20_000,
        _ => 50_000,
    }
}

/// Strongest first; ties by (target, source) ascending.
fn strongest_first(a: &ConnectionCandidate, b: &ConnectionCandidate) -> Ordering {
    OrderedFloat(b.strength)
        .cmp(&OrderedFloat(a.strength))
        .then(a.target.cmp(&b.target))
        .then(a.source.cmp(&b.source))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionSelector {
    config: ConnectionConfig,
}

impl ConnectionSelector {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Select edges between two layers' activations.
    pub fn select(&self, source: &[f32], target: &[f32]) -> Vec<ConnectionCandidate> {
        let threshold = self.config.min_strength_threshold;
        let mut candidates = Vec::new();

        for (t, &target_value) in target.iter().enumerate() {
            if target_value < threshold {
                continue;
            }
            for (s, &source_value) in source.iter().enumerate() {
                let strength = source_value * target_value;
                if strength > threshold {
                    candidates.push(ConnectionCandidate {
                        source: s,
                        target: t,
                        strength,
                    });
                }
            }
        }

        let cap = max_connections(source.len().saturating_mul(target.len()));
        let surviving = candidates.len();
        if candidates.len() > cap {
            if cap > 0 {
                candidates.select_nth_unstable_by(cap - 1, strongest_first);
            }
            candidates.truncate(cap);
        }
        candidates.sort_unstable_by(strongest_first);

        debug!(
            "Selected {} of {} candidate edges (cap {})",
            candidates.len(),
            surviving,
            cap
        );
        candidates
    }

    pub fn select_between(&self, source: &Layer, target: &Layer) -> Vec<ConnectionCandidate> {
        self.select(source.activations(), target.activations())
    }
}

/// Select edges between two layers with the default threshold.
pub fn select_connections(source: &Layer, target: &Layer) -> Vec<ConnectionCandidate> {
    ConnectionSelector::default().select_between(source, target)
}
