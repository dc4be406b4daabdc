use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::CommID;

/// Minimal improvement a move must bring to count as a move.
pub(crate) const MIN_GAIN: f64 = 1e-10;

pub(crate) const DEFAULT_MAX_PASSES: usize = 1000;

pub(crate) const DEFAULT_MAX_LEVELS: usize = 64;

/// Leiden refinement randomness (beta), the value the benchmark harness runs with.
pub(crate) const DEFAULT_RANDOMNESS: f64 = 0.01;

pub(crate) const DEFAULT_LEIDEN_ITERATIONS: usize = 2;

/// Tuning knobs shared by both engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionOptions {
    pub max_passes: usize, // Local-move passes allowed per level.
    pub max_levels: usize, // Aggregation levels allowed per run.
    pub randomize_order: bool, // Shuffle the visiting order with the caller's generator.
    pub randomness: f64, // Beta of the Leiden refinement merge distribution.
    pub leiden_iterations: Option<usize>, // None means iterate until the partition is stable.
    pub vertex_weights: Option<Vec<f64>>, // Leiden node sizes, strengths when absent.
    pub initial_partition: Option<Vec<CommID>>, // Starting partition of level 0.
    pub time_budget_ms: Option<u64>, // Wall-clock budget, checked between passes.
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
            max_levels: DEFAULT_MAX_LEVELS,
            randomize_order: true,
            randomness: DEFAULT_RANDOMNESS,
            leiden_iterations: Some(DEFAULT_LEIDEN_ITERATIONS),
            vertex_weights: None,
            initial_partition: None,
            time_budget_ms: None,
        }
    }
}

impl DetectionOptions {
    /// Parse options from a YAML document; missing keys take their defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("Failed to parse detection options")
    }

    /// Load options from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read options file {}", path.display()))?;
        Self::from_yaml_str(&text)
    }

    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }

    pub fn with_max_levels(mut self, max_levels: usize) -> Self {
        self.max_levels = max_levels;
        self
    }

    /// Visit vertices in ascending id order instead of a shuffled one.
    pub fn with_fixed_order(mut self) -> Self {
        self.randomize_order = false;
        self
    }

    pub fn with_randomness(mut self, randomness: f64) -> Self {
        self.randomness = randomness;
        self
    }

    pub fn with_leiden_iterations(mut self, iterations: Option<usize>) -> Self {
        self.leiden_iterations = iterations;
        self
    }

    pub fn with_vertex_weights(mut self, vertex_weights: Vec<f64>) -> Self {
        self.vertex_weights = Some(vertex_weights);
        self
    }

    pub fn with_initial_partition(mut self, partition: Vec<CommID>) -> Self {
        self.initial_partition = Some(partition);
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget_ms = Some(budget.as_millis() as u64);
        self
    }

    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_ms.map(Duration::from_millis)
    }
}
