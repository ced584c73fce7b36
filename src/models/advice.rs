//! Advice text + result labels

use serde::Serialize;

use crate::logic::model::PredictionResult;

/// Canned recommendation selected by predicted class
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Advice(String);

impl Advice {
    pub fn for_prediction(prediction: &PredictionResult) -> Self {
        let probability = prediction.positive_probability() * 100.0;

        let text = if prediction.predicted_class == 1 {
            format!(
                "According to our model, the patient is at high risk of CRKP infection. \
                 The model predicts a probability of disease of {:.1}%. \
                 Please consult a healthcare provider immediately for further evaluation and possible intervention.",
                probability
            )
        } else {
            format!(
                "According to our model, the patient is at low risk of CRKP infection. \
                 The model predicts a probability of disease of {:.1}%. \
                 Continue to monitor the patient closely and seek medical attention if anything changes.",
                probability
            )
        };

        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub fn class_label(predicted_class: u8) -> &'static str {
    if predicted_class == 1 {
        "Disease (1)"
    } else {
        "No disease (0)"
    }
}
