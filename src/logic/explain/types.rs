use serde::{Deserialize, Serialize};

use crate::logic::model::Link;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub name: String,
    pub value: f64,
    pub shap_value: f64, // raw (link) space, positive = toward disease
}

/// Additive explanation of the positive class for one prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// Expected raw output over the training cover
    pub base_value: f64,
    /// base_value + sum of shap values
    pub output_value: f64,
    pub link: Link,
    /// link(output_value)
    pub probability: f64,
    /// One entry per feature, layout order
    pub contributions: Vec<FeatureContribution>,
}

impl Explanation {
    /// Contributions sorted by |shap value|, largest first
    pub fn ranked(&self) -> Vec<&FeatureContribution> {
        let mut ranked: Vec<_> = self.contributions.iter().collect();
        ranked.sort_by(|a, b| {
            b.shap_value.abs().partial_cmp(&a.shap_value.abs()).unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    }
}
