//! Feature Layout - Centralized Feature Definition
//!
//! **This file controls the feature schema the model was trained on.**
//!
//! ## Rules:
//! 1. Add feature → increment FEATURE_VERSION
//! 2. Change order → increment FEATURE_VERSION
//! 3. Remove feature → increment FEATURE_VERSION
//!
//! The model artifact records its own feature names; loading rejects any
//! artifact whose names differ from `FEATURE_LAYOUT` in content or order.

use crc32fast::Hasher;
use serde::Serialize;

// ============================================================================
// FEATURE VERSION
// ============================================================================

/// Current feature layout version
pub const FEATURE_VERSION: u8 = 1;

// ============================================================================
// FEATURE LAYOUT (Authoritative source)
// ============================================================================

/// Bounds of the numeric inputs
pub const CONTINUOUS_MIN: f64 = -10.0;
pub const CONTINUOUS_MAX: f64 = 10.0;

/// How a feature is collected on the form
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureKind {
    /// Numeric input bounded to [min, max]
    Continuous { min: f64, max: f64, default: f64 },
    /// Yes/No select stored as 0/1
    Binary { default: u8 },
}

/// One slot of the layout
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FeatureSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FeatureKind,
}

const fn continuous(name: &'static str, label: &'static str) -> FeatureSpec {
    FeatureSpec {
        name,
        label,
        kind: FeatureKind::Continuous { min: CONTINUOUS_MIN, max: CONTINUOUS_MAX, default: 0.0 },
    }
}

const fn binary(name: &'static str, label: &'static str) -> FeatureSpec {
    FeatureSpec { name, label, kind: FeatureKind::Binary { default: 0 } }
}

/// Features in the exact order the model consumes them
pub const FEATURE_SPECS: [FeatureSpec; FEATURE_COUNT] = [
    continuous("X1", "X1"),             // 0
    continuous("X10", "X10"),           // 1
    continuous("X11", "WBC"),           // 2
    binary("X18", "X18"),               // 3
    binary("X29", "Fever"),             // 4
    binary("X31", "Nasal congestion"),  // 5
    binary("X33", "Abortion"),          // 6
];

/// Feature names in exact order they appear in the vector
pub const FEATURE_LAYOUT: [&str; FEATURE_COUNT] = ["X1", "X10", "X11", "X18", "X29", "X31", "X33"];

/// Total number of features
pub const FEATURE_COUNT: usize = 7;

// ============================================================================
// LAYOUT HASH
// ============================================================================

/// CRC32 of version + ordered names, used to tag model info and logs
pub fn layout_hash() -> u32 {
    hash_names(FEATURE_VERSION, FEATURE_LAYOUT.iter().copied())
}

fn hash_names<'a>(version: u8, names: impl Iterator<Item = &'a str>) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&[version]);
    for name in names {
        hasher.update(name.as_bytes());
        hasher.update(&[0]);
    }
    hasher.finalize()
}

// ============================================================================
// LAYOUT VALIDATION
// ============================================================================

/// Feature names of an artifact don't match the layout
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("feature layout mismatch: expected {expected:?} (hash {expected_hash:08x}), got {actual:?} (hash {actual_hash:08x})")]
pub struct LayoutMismatchError {
    pub expected: Vec<String>,
    pub actual: Vec<String>,
    pub expected_hash: u32,
    pub actual_hash: u32,
}

/// Validate that the names a model was trained with match the layout, order included
pub fn validate_feature_names(names: &[String]) -> Result<(), LayoutMismatchError> {
    let matches = names.len() == FEATURE_COUNT
        && names.iter().zip(FEATURE_LAYOUT.iter()).all(|(a, b)| a == b);

    if matches {
        return Ok(());
    }

    Err(LayoutMismatchError {
        expected: FEATURE_LAYOUT.iter().map(|s| s.to_string()).collect(),
        actual: names.to_vec(),
        expected_hash: layout_hash(),
        actual_hash: hash_names(FEATURE_VERSION, names.iter().map(String::as_str)),
    })
}
