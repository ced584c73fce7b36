//! Feature vector + form input

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::logic::layout::{FEATURE_COUNT, FEATURE_LAYOUT, FEATURE_SPECS, FeatureKind};

/// Ordered model input. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    /// Vector holding every widget default
    pub fn defaults() -> Self {
        let mut values = [0.0; FEATURE_COUNT];
        for (slot, spec) in values.iter_mut().zip(FEATURE_SPECS.iter()) {
            *slot = match spec.kind {
                FeatureKind::Continuous { default, .. } => default,
                FeatureKind::Binary { default } => default as f64,
            };
        }
        Self { values }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// (name, value) pairs in layout order
    pub fn named_values(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_LAYOUT.iter().copied().zip(self.values.iter().copied())
    }
}

/// Submitted form / JSON body
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FeatureForm {
    #[serde(rename = "X1")]
    #[validate(range(min = -10.0, max = 10.0))]
    pub x1: f64,

    #[serde(rename = "X10")]
    #[validate(range(min = -10.0, max = 10.0))]
    pub x10: f64,

    #[serde(rename = "X11")]
    #[validate(range(min = -10.0, max = 10.0))]
    pub x11: f64,

    #[serde(rename = "X18")]
    #[validate(range(max = 1))]
    pub x18: u8,

    #[serde(rename = "X29")]
    #[validate(range(max = 1))]
    pub x29: u8,

    #[serde(rename = "X31")]
    #[validate(range(max = 1))]
    pub x31: u8,

    #[serde(rename = "X33")]
    #[validate(range(max = 1))]
    pub x33: u8,
}

impl FeatureForm {
    /// Validate and lay out in model order
    pub fn into_vector(self) -> Result<FeatureVector, String> {
        self.validate().map_err(|e| e.to_string())?;

        let continuous = [self.x1, self.x10, self.x11];
        if continuous.iter().any(|v| !v.is_finite()) {
            return Err("numeric inputs must be finite".to_string());
        }

        Ok(FeatureVector::from_values([
            self.x1,
            self.x10,
            self.x11,
            self.x18 as f64,
            self.x29 as f64,
            self.x31 as f64,
            self.x33 as f64,
        ]))
    }
}
