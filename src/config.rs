//! Configuration module

use std::env;
use std::path::PathBuf;

/// How the force plot reaches the page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplanationMode {
    /// SVG markup embedded in the page
    Inline,
    /// `<img>` pointing at `/explanation.svg`
    Image,
}

impl ExplanationMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inline" => Some(Self::Inline),
            "image" => Some(Self::Image),
            _ => None,
        }
    }
}

/// Longest accepted idle timeout (one year)
pub const MAX_SESSION_IDLE_MINUTES: i64 = 525_600;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Tree ensemble artifact (JSON)
    pub model_path: PathBuf,

    /// Held-out test set, optional
    pub reference_data_path: PathBuf,

    pub explanation_mode: ExplanationMode,

    /// Allowed gap between link(base + Σ shap) and predicted p1
    pub consistency_tolerance: f64,

    /// Idle sessions older than this are dropped
    pub session_idle_minutes: i64,

    /// Page title
    pub app_title: String,

    /// Environment (development, production)
    pub environment: String,

    /// Emit JSON log lines
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            model_path: PathBuf::from("assets/crkp_model.json"),
            reference_data_path: PathBuf::from("assets/X_test.csv"),
            explanation_mode: ExplanationMode::Inline,
            consistency_tolerance: 1e-6,
            session_idle_minutes: 60,
            app_title: "CRKP Predictor".to_string(),
            environment: "development".to_string(),
            log_json: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),

            model_path: lookup("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),

            reference_data_path: lookup("REFERENCE_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.reference_data_path),

            explanation_mode: lookup("EXPLANATION_MODE")
                .and_then(|m| ExplanationMode::parse(&m))
                .unwrap_or(defaults.explanation_mode),

            consistency_tolerance: lookup("CONSISTENCY_TOLERANCE")
                .and_then(|t| t.parse::<f64>().ok())
                .filter(|t| t.is_finite() && *t > 0.0)
                .unwrap_or(defaults.consistency_tolerance),

            session_idle_minutes: lookup("SESSION_IDLE_MINUTES")
                .and_then(|m| m.parse().ok())
                .filter(|m| (1..=MAX_SESSION_IDLE_MINUTES).contains(m))
                .unwrap_or(defaults.session_idle_minutes),

            app_title: lookup("APP_TITLE").unwrap_or(defaults.app_title),

            environment: lookup("ENVIRONMENT").unwrap_or(defaults.environment),

            log_json: lookup("LOG_FORMAT")
                .map(|f| f.eq_ignore_ascii_case("json"))
                .unwrap_or(defaults.log_json),
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
