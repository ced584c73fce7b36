//! Model Module - tree ensemble loading + inference
//!
//! Artifact parsing/validation lives in `artifact`, evaluation in `inference`.

pub mod artifact;
pub mod inference;

// Re-export common types
pub use artifact::{Link, Node, Tree};
pub use inference::{load_model, ModelInfo, PredictionResult, TreeEnsemble};
