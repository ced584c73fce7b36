//! Inference Engine - tree ensemble evaluation
//!
//! The ensemble is loaded once per process and shared read-only.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::artifact::{read_artifact, Link, ModelArtifact, ModelType, Node, Tree};
use crate::error::{ArtifactLoadError, InferenceError};
use crate::logic::layout::{layout_hash, FEATURE_COUNT};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Prediction output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// 0 = no disease, 1 = disease
    pub predicted_class: u8,
    /// [p0, p1]
    pub probabilities: [f64; 2],
    /// Ensemble output before the link function
    pub raw_output: f64,
}

impl PredictionResult {
    fn from_raw(raw_output: f64, link: Link) -> Result<Self, InferenceError> {
        let p1 = link.apply(raw_output);
        if !p1.is_finite() {
            return Err(InferenceError::NonFinite(p1));
        }
        let p1 = p1.clamp(0.0, 1.0);
        let probabilities = [1.0 - p1, p1];

        // argmax, ties resolve to the first class
        let predicted_class = if probabilities[1] > probabilities[0] { 1 } else { 0 };

        Ok(Self { predicted_class, probabilities, raw_output })
    }

    pub fn positive_probability(&self) -> f64 {
        self.probabilities[1]
    }
}

/// Model info for API / logs
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub version: String,
    pub model_type: ModelType,
    pub fingerprint: String,
    pub tree_count: usize,
    pub feature_names: Vec<String>,
    pub layout_hash: String,
    pub loaded_at: DateTime<Utc>,
    pub inference_count: u64,
    pub avg_latency_us: f64,
}

/// Loaded classifier
#[derive(Debug)]
pub struct TreeEnsemble {
    artifact: ModelArtifact,
    fingerprint: String,
    loaded_at: DateTime<Utc>,
    latency_sum_us: AtomicU64,
    inference_count: AtomicU64,
}

// ============================================================================
// LOADING
// ============================================================================

/// Load a model artifact from disk (once, at startup)
pub fn load_model(path: &Path) -> Result<TreeEnsemble, ArtifactLoadError> {
    let (artifact, fingerprint) = read_artifact(path)?;
    let model = TreeEnsemble::new(artifact, fingerprint);

    tracing::info!(
        "Model '{}' loaded: {:?}, {} trees, sha256 {}",
        model.artifact.name,
        model.model_type(),
        model.artifact.trees.len(),
        model.fingerprint
    );

    Ok(model)
}

impl TreeEnsemble {
    /// Wrap an already validated artifact
    pub fn new(artifact: ModelArtifact, fingerprint: String) -> Self {
        Self {
            artifact,
            fingerprint,
            loaded_at: Utc::now(),
            latency_sum_us: AtomicU64::new(0),
            inference_count: AtomicU64::new(0),
        }
    }

    pub fn model_type(&self) -> ModelType {
        self.artifact.model_type
    }

    pub fn link(&self) -> Link {
        self.model_type().link()
    }

    pub fn trees(&self) -> &[Tree] {
        &self.artifact.trees
    }

    pub fn base_score(&self) -> f64 {
        self.artifact.base_score
    }

    /// Weight applied to each tree's output when combining
    pub fn tree_weight(&self) -> f64 {
        match self.artifact.model_type {
            ModelType::RandomForest => 1.0 / self.artifact.trees.len() as f64,
            ModelType::GradientBoosting => 1.0,
        }
    }

    /// Additive output in link space
    pub fn raw_output(&self, features: &[f64]) -> f64 {
        let weight = self.tree_weight();
        let sum: f64 = self.artifact.trees.iter().map(|t| t.evaluate(features)).sum();
        self.artifact.base_score + weight * sum
    }

    // ========================================================================
    // PREDICTION
    // ========================================================================

    /// Class + probability pair for one vector
    pub fn predict(&self, features: &[f64]) -> Result<PredictionResult, InferenceError> {
        if features.len() != FEATURE_COUNT {
            return Err(InferenceError::WrongWidth {
                expected: FEATURE_COUNT,
                actual: features.len(),
            });
        }

        let start_time = std::time::Instant::now();
        let result = PredictionResult::from_raw(self.raw_output(features), self.link());

        self.latency_sum_us.fetch_add(start_time.elapsed().as_micros() as u64, Ordering::Relaxed);
        self.inference_count.fetch_add(1, Ordering::Relaxed);

        result
    }

    pub fn info(&self) -> ModelInfo {
        let sum = self.latency_sum_us.load(Ordering::Relaxed);
        let count = self.inference_count.load(Ordering::Relaxed);
        let avg = if count > 0 { sum as f64 / count as f64 } else { 0.0 };

        ModelInfo {
            name: self.artifact.name.clone(),
            version: self.artifact.version.clone(),
            model_type: self.artifact.model_type,
            fingerprint: self.fingerprint.clone(),
            tree_count: self.artifact.trees.len(),
            feature_names: self.artifact.feature_names.clone(),
            layout_hash: format!("{:08x}", layout_hash()),
            loaded_at: self.loaded_at,
            inference_count: count,
            avg_latency_us: avg,
        }
    }
}

// ============================================================================
// TREE EVALUATION
// ============================================================================

impl Tree {
    /// Leaf value reached by `features`
    pub fn evaluate(&self, features: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match self.nodes[index] {
                Node::Leaf { value, .. } => return value,
                Node::Split { feature, threshold, left, right, .. } => {
                    index = if features[feature] <= threshold { left } else { right };
                }
            }
        }
    }

    /// Cover-weighted mean leaf value: the tree's output with no features known
    pub fn expected_value(&self) -> f64 {
        self.expected_value_at(0)
    }

    fn expected_value_at(&self, index: usize) -> f64 {
        match self.nodes[index] {
            Node::Leaf { value, .. } => value,
            Node::Split { left, right, .. } => {
                let left_cover = self.nodes[left].cover();
                let right_cover = self.nodes[right].cover();
                (left_cover * self.expected_value_at(left) + right_cover * self.expected_value_at(right))
                    / (left_cover + right_cover)
            }
        }
    }
}
