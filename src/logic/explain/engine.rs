use super::tree_shap;
use super::types::{Explanation, FeatureContribution};
use crate::error::ExplanationError;
use crate::logic::layout::FEATURE_COUNT;
use crate::logic::model::{PredictionResult, TreeEnsemble};
use crate::models::FeatureVector;

/// SHAP values for the positive class (index 1, the same index
/// `PredictionResult::positive_probability` reads).
pub fn explain(model: &TreeEnsemble, features: &FeatureVector) -> Result<Explanation, ExplanationError> {
    let x = features.as_slice();
    let weight = model.tree_weight();

    let mut phi = vec![0.0; FEATURE_COUNT];
    let mut expected = 0.0;
    for tree in model.trees() {
        tree_shap::accumulate(tree, x, &mut phi, weight);
        expected += weight * tree.expected_value();
    }

    let base_value = model.base_score() + expected;
    let output_value = base_value + phi.iter().sum::<f64>();

    if !output_value.is_finite() || phi.iter().any(|v| !v.is_finite()) {
        return Err(ExplanationError::NonFinite);
    }

    let contributions = features
        .named_values()
        .zip(phi)
        .map(|((name, value), shap_value)| FeatureContribution {
            name: name.to_string(),
            value,
            shap_value,
        })
        .collect();

    Ok(Explanation {
        base_value,
        output_value,
        link: model.link(),
        probability: model.link().apply(output_value),
        contributions,
    })
}

/// link(base + Σ phi) must reproduce the predicted positive-class probability
pub fn verify_consistency(
    explanation: &Explanation,
    prediction: &PredictionResult,
    tolerance: f64,
) -> Result<(), ExplanationError> {
    let reconstructed = explanation.probability;
    let predicted = prediction.positive_probability();

    if (reconstructed - predicted).abs() > tolerance {
        return Err(ExplanationError::Inconsistent { reconstructed, predicted, tolerance });
    }

    Ok(())
}

/// Explain and check against the prediction in one step
pub fn explain_checked(
    model: &TreeEnsemble,
    features: &FeatureVector,
    prediction: &PredictionResult,
    tolerance: f64,
) -> Result<Explanation, ExplanationError> {
    let explanation = explain(model, features)?;

    if let Err(err) = verify_consistency(&explanation, prediction, tolerance) {
        tracing::error!("SHAP/predict_proba divergence: {}", err);
        return Err(err);
    }

    Ok(explanation)
}
