//! JSON API handlers (stateless)

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Serialize;

use crate::logic::explain::{explain_checked, Explanation};
use crate::logic::model::{ModelInfo, PredictionResult};
use crate::logic::reference::ReferenceSummary;
use crate::models::{class_label, Advice, FeatureForm, FeatureVector};
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub features: FeatureVector,
    pub prediction: PredictionResult,
    pub class_label: &'static str,
    pub advice: Advice,
    pub explanation: Option<Explanation>,
    pub explanation_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ModelInfoResponse {
    #[serde(flatten)]
    pub model: ModelInfo,
    pub explanation_mode: String,
    pub reference: Option<ReferenceSummary>,
}

/// Predict + explain one vector without touching any session
pub async fn predict(
    State(state): State<AppState>,
    body: Result<Json<FeatureForm>, JsonRejection>,
) -> AppResult<Json<PredictResponse>> {
    let Json(form) = body?;
    let features = form.into_vector().map_err(AppError::ValidationError)?;

    let prediction = state.model.predict(features.as_slice())?;

    let (explanation, explanation_error) =
        match explain_checked(&state.model, &features, &prediction, state.config.consistency_tolerance) {
            Ok(e) => (Some(e), None),
            Err(err) => (None, Some(err.to_string())),
        };

    Ok(Json(PredictResponse {
        features,
        class_label: class_label(prediction.predicted_class),
        advice: Advice::for_prediction(&prediction),
        prediction,
        explanation,
        explanation_error,
    }))
}

/// Loaded model + reference data summary
pub async fn model_info(State(state): State<AppState>) -> Json<ModelInfoResponse> {
    Json(ModelInfoResponse {
        model: state.model.info(),
        explanation_mode: format!("{:?}", state.config.explanation_mode).to_lowercase(),
        reference: state.reference.as_ref().map(|r| r.summary()),
    })
}
