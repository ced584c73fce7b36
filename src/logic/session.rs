//! Session state machine
//!
//! `EMPTY → PREDICTED` on submit, `PREDICTED → PREDICTED` on submit with new
//! input, `* → EMPTY` on reset. The result slots live inside the `Predicted`
//! variant so they are populated and cleared together.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ExplanationMode;
use crate::error::InferenceError;
use crate::logic::explain::{explain_checked, force_plot_svg, Explanation};
use crate::logic::model::{PredictionResult, TreeEnsemble};
use crate::models::{class_label, Advice, FeatureVector};

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub enum SessionState {
    #[default]
    Empty,
    Predicted(Box<PredictedState>),
}

#[derive(Debug, Clone)]
pub struct PredictedState {
    pub features: FeatureVector,
    pub prediction: PredictionResult,
    pub advice: Advice,
    pub explanation: ExplanationSlot,
    pub predicted_at: DateTime<Utc>,
}

/// Explanation for the current prediction. Anything but `Pending` counts as
/// generated and is never recomputed for the same prediction.
#[derive(Debug, Clone)]
pub enum ExplanationSlot {
    Pending,
    Ready { explanation: Explanation, svg: String },
    Failed(String),
}

impl ExplanationSlot {
    pub fn is_generated(&self) -> bool {
        !matches!(self, ExplanationSlot::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Empty,
    Predicted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Phase,
    pub to: Phase,
}

impl SessionState {
    pub fn phase(&self) -> Phase {
        match self {
            SessionState::Empty => Phase::Empty,
            SessionState::Predicted(_) => Phase::Predicted,
        }
    }

    pub fn predicted(&self) -> Option<&PredictedState> {
        match self {
            SessionState::Predicted(p) => Some(p),
            SessionState::Empty => None,
        }
    }

    pub fn explanation_generated(&self) -> bool {
        self.predicted().map(|p| p.explanation.is_generated()).unwrap_or(false)
    }

    pub fn svg(&self) -> Option<&str> {
        match self.predicted().map(|p| &p.explanation) {
            Some(ExplanationSlot::Ready { svg, .. }) => Some(svg.as_str()),
            _ => None,
        }
    }
}

// ============================================================================
// TRANSITIONS
// ============================================================================

/// Form submission. Inference runs first; on failure the state is untouched.
/// On success the whole state is replaced, never merged, and the
/// explanation slot starts over as `Pending`.
pub fn on_submit(
    state: &mut SessionState,
    model: &TreeEnsemble,
    features: FeatureVector,
) -> Result<Transition, InferenceError> {
    let prediction = model.predict(features.as_slice())?;
    let from = state.phase();

    *state = SessionState::Predicted(Box::new(PredictedState {
        features,
        advice: Advice::for_prediction(&prediction),
        prediction,
        explanation: ExplanationSlot::Pending,
        predicted_at: Utc::now(),
    }));

    Ok(Transition { from, to: Phase::Predicted })
}

/// Reset action: every slot cleared at once
pub fn on_reset(state: &mut SessionState) -> Transition {
    let from = state.phase();
    *state = SessionState::Empty;
    Transition { from, to: Phase::Empty }
}

/// Generate the explanation if the current prediction has none yet.
/// Returns true when work was done.
pub fn ensure_explanation(state: &mut SessionState, model: &TreeEnsemble, tolerance: f64) -> bool {
    let predicted = match state {
        SessionState::Predicted(p) if !p.explanation.is_generated() => p,
        _ => return false,
    };

    predicted.explanation =
        match explain_checked(model, &predicted.features, &predicted.prediction, tolerance) {
            Ok(explanation) => {
                let svg = force_plot_svg(&explanation);
                ExplanationSlot::Ready { explanation, svg }
            }
            Err(err) => ExplanationSlot::Failed(err.to_string()),
        };

    true
}

// ============================================================================
// VIEW
// ============================================================================

/// Read-only projection of the state for the page
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    /// Values to pre-fill in the form
    pub form_values: FeatureVector,
    /// None shows the "press Predict" prompt
    pub result: Option<ResultView>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultView {
    pub class_label: &'static str,
    pub positive_percent: f64,
    pub advice: String,
    pub explanation: ExplanationView,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExplanationView {
    Inline(String),
    /// `version` changes with every prediction so the image URL does too
    Image { version: i64 },
    Unavailable(String),
}

pub fn render(state: &SessionState, mode: ExplanationMode) -> View {
    let predicted = match state.predicted() {
        Some(p) => p,
        None => return View { form_values: FeatureVector::defaults(), result: None },
    };

    let explanation = match (&predicted.explanation, mode) {
        (ExplanationSlot::Ready { svg, .. }, ExplanationMode::Inline) => ExplanationView::Inline(svg.clone()),
        (ExplanationSlot::Ready { .. }, ExplanationMode::Image) => {
            ExplanationView::Image { version: predicted.predicted_at.timestamp_micros() }
        }
        (ExplanationSlot::Failed(msg), _) => ExplanationView::Unavailable(msg.clone()),
        (ExplanationSlot::Pending, _) => {
            ExplanationView::Unavailable("Explanation has not been generated yet".to_string())
        }
    };

    View {
        form_values: predicted.features,
        result: Some(ResultView {
            class_label: class_label(predicted.prediction.predicted_class),
            positive_percent: predicted.prediction.positive_probability() * 100.0,
            advice: predicted.advice.as_str().to_string(),
            explanation,
        }),
    }
}
