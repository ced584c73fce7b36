//! Model Artifact - JSON tree ensemble
//!
//! The trained classifier is exported offline to JSON: one node array per
//! tree, scikit-learn ordering (children always after their parent), splits
//! going left when `x[feature] <= threshold`. Each node carries its training
//! cover (weighted sample count), which TreeSHAP needs.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ArtifactLoadError;
use crate::logic::layout::{validate_feature_names, FEATURE_COUNT};

/// Relative slack when checking parent cover == sum of children covers
const COVER_TOLERANCE: f64 = 1e-6;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// How trees are combined and how raw output maps to a probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Leaves hold positive-class fractions, trees averaged
    RandomForest,
    /// Leaves hold log-odds increments, trees summed
    GradientBoosting,
}

impl ModelType {
    pub fn link(self) -> Link {
        match self {
            ModelType::RandomForest => Link::Identity,
            ModelType::GradientBoosting => Link::Logistic,
        }
    }
}

/// Maps the raw additive output to the positive-class probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Link {
    Identity,
    Logistic,
}

impl Link {
    pub fn apply(self, raw: f64) -> f64 {
        match self {
            Link::Identity => raw,
            Link::Logistic => 1.0 / (1.0 + (-raw).exp()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        cover: f64,
    },
    Leaf {
        value: f64,
        cover: f64,
    },
}

impl Node {
    pub fn cover(&self) -> f64 {
        match *self {
            Node::Split { cover, .. } | Node::Leaf { cover, .. } => cover,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

/// On-disk artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub model_type: ModelType,
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub base_score: f64,
    pub trees: Vec<Tree>,
}

// ============================================================================
// LOADING
// ============================================================================

/// Read, fingerprint, parse and validate an artifact
pub fn read_artifact(path: &Path) -> Result<(ModelArtifact, String), ArtifactLoadError> {
    tracing::info!("Loading model artifact from: {}", path.display());

    let bytes = std::fs::read(path).map_err(|source| ArtifactLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let fingerprint = fingerprint(&bytes);
    let artifact = parse_artifact(&bytes)?;

    Ok((artifact, fingerprint))
}

/// Parse + validate from raw JSON bytes
pub fn parse_artifact(bytes: &[u8]) -> Result<ModelArtifact, ArtifactLoadError> {
    let artifact: ModelArtifact = serde_json::from_slice(bytes)?;
    artifact.validate()?;
    Ok(artifact)
}

/// SHA-256 of the artifact bytes, hex encoded
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

// ============================================================================
// VALIDATION
// ============================================================================

impl ModelArtifact {
    pub fn validate(&self) -> Result<(), ArtifactLoadError> {
        validate_feature_names(&self.feature_names)?;

        if !self.base_score.is_finite() {
            return Err(invalid("base_score is not finite"));
        }
        if self.trees.is_empty() {
            return Err(invalid("artifact has no trees"));
        }

        for (t, tree) in self.trees.iter().enumerate() {
            tree.validate(self.model_type)
                .map_err(|msg| invalid(format!("tree {}: {}", t, msg)))?;
        }

        Ok(())
    }
}

impl Tree {
    fn validate(&self, model_type: ModelType) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("no nodes".to_string());
        }

        let mut parents = vec![0u32; self.nodes.len()];

        for (i, node) in self.nodes.iter().enumerate() {
            let cover = node.cover();
            if !(cover.is_finite() && cover > 0.0) {
                return Err(format!("node {} has non-positive cover", i));
            }

            match *node {
                Node::Split { feature, threshold, left, right, .. } => {
                    if feature >= FEATURE_COUNT {
                        return Err(format!("node {} splits on unknown feature {}", i, feature));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {} has a non-finite threshold", i));
                    }
                    for child in [left, right] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(format!("node {} has invalid child {}", i, child));
                        }
                        parents[child] += 1;
                    }
                    if left == right {
                        return Err(format!("node {} has identical children", i));
                    }

                    let children = self.nodes[left].cover() + self.nodes[right].cover();
                    if (children - cover).abs() > COVER_TOLERANCE * cover.max(1.0) {
                        return Err(format!(
                            "node {} cover {} differs from children cover {}",
                            i, cover, children
                        ));
                    }
                }
                Node::Leaf { value, .. } => {
                    if !value.is_finite() {
                        return Err(format!("leaf {} has a non-finite value", i));
                    }
                    if model_type == ModelType::RandomForest && !(0.0..=1.0).contains(&value) {
                        return Err(format!("leaf {} value {} is not a probability", i, value));
                    }
                }
            }
        }

        if let Some(orphan) = parents.iter().skip(1).position(|&count| count != 1) {
            return Err(format!("node {} is not referenced by exactly one parent", orphan + 1));
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> ArtifactLoadError {
    ArtifactLoadError::Invalid(msg.into())
}
