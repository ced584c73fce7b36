//! CRKP Predictor
//!
//! Single-page clinical risk form: seven lab features in, a tree-ensemble
//! prediction, canned advice, and a SHAP force plot out.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      CRKP PREDICTOR                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌───────────┐  ┌─────────────────────────┐ │
//! │  │  Page /   │  │  Session  │  │  Explain                │ │
//! │  │  JSON API │  │  Store    │  │  (TreeSHAP + SVG)       │ │
//! │  │  (Axum)   │  │ (cookie)  │  │                         │ │
//! │  └─────┬─────┘  └─────┬─────┘  └────────────┬────────────┘ │
//! │        └──────────────┼──────────────────────┘              │
//! │                       ▼                                     │
//! │                ┌─────────────┐                             │
//! │                │ Tree model  │  (loaded once, read-only)   │
//! │                └─────────────┘                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod error;
mod handlers;
mod logic;
mod middleware;
mod models;
mod store;
mod views;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
    middleware as axum_middleware,
};
use tower_http::{
    trace::TraceLayer,
    compression::CompressionLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use error::{AppError, AppResult};

use logic::model::TreeEnsemble;
use logic::reference::ReferenceDataset;
use store::SessionStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "crkp_predictor=debug,tower_http=debug".into());
    if config.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("CRKP Predictor starting...");
    tracing::info!(
        "Explanation mode: {:?}, consistency tolerance: {:e}",
        config.explanation_mode,
        config.consistency_tolerance
    );

    // Load model + reference data once per process
    let model = logic::model::load_model(&config.model_path)
        .with_context(|| format!("failed to load model from {}", config.model_path.display()))?;

    let reference = logic::reference::load_reference(&config.reference_data_path)
        .context("failed to load reference dataset")?;

    // Build application state
    let state = AppState {
        config: config.clone(),
        model: Arc::new(model),
        reference: reference.map(Arc::new),
        sessions: SessionStore::new(),
    };

    spawn_session_sweeper(state.sessions.clone(), config.session_idle_minutes);

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: config::Config,
    pub model: Arc<TreeEnsemble>,
    pub reference: Option<Arc<ReferenceDataset>>,
    pub sessions: SessionStore,
}

/// Drop idle sessions once a minute
fn spawn_session_sweeper(sessions: SessionStore, idle_minutes: i64) {
    let Some(max_idle) = chrono::Duration::try_minutes(idle_minutes) else {
        tracing::error!("Session idle timeout of {} minutes is out of range, sweeper disabled", idle_minutes);
        return;
    };

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            let purged = sessions.purge_idle(max_idle);
            if purged > 0 {
                tracing::debug!("Purged {} idle sessions, {} active", purged, sessions.len());
            }
        }
    });
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    // Page routes (session cookie)
    let page_routes = Router::new()
        .route("/", get(handlers::page::index))
        .route("/predict", post(handlers::page::submit))
        .route("/reset", post(handlers::page::reset))
        .route("/explanation.svg", get(handlers::page::explanation_svg))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::session::with_session,
        ));

    // Stateless routes
    let api_routes = Router::new()
        .route("/health", get(handlers::health::check))
        .route("/api/v1/predict", post(handlers::api::predict))
        .route("/api/v1/model", get(handlers::api::model_info));

    // Combine all routes
    Router::new()
        .merge(page_routes)
        .merge(api_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::logic::session::{ExplanationSlot, Phase};
    use crate::middleware::session::SESSION_COOKIE;
    use crate::models::FeatureVector;

    const MODEL_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/crkp_model.json");
    const REFERENCE_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/X_test.csv");

    const ZEROS: &str = "X1=0&X10=0&X11=0&X18=0&X29=0&X31=0&X33=0";
    const OTHER: &str = "X1=6&X10=-4&X11=3&X18=1&X29=1&X31=0&X33=1";

    fn state(mode: config::ExplanationMode) -> AppState {
        let model = logic::model::load_model(std::path::Path::new(MODEL_PATH)).unwrap();
        let reference = logic::reference::load_reference(std::path::Path::new(REFERENCE_PATH)).unwrap();
        AppState {
            config: config::Config { explanation_mode: mode, ..Default::default() },
            model: Arc::new(model),
            reference: reference.map(Arc::new),
            sessions: SessionStore::new(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, String) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, String::from_utf8(body.to_vec()).unwrap())
    }

    fn post_form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(c) = cookie {
            builder = builder.header(header::COOKIE, c);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(c) = cookie {
            builder = builder.header(header::COOKIE, c);
        }
        builder.body(Body::empty()).unwrap()
    }

    /// "predictor_session=<uuid>" from a Set-Cookie header
    fn session_cookie(headers: &axum::http::HeaderMap) -> (String, Uuid) {
        let raw = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        let pair = raw.split(';').next().unwrap().to_string();
        let id = pair.strip_prefix(&format!("{}=", SESSION_COOKIE)).unwrap().parse().unwrap();
        (pair, id)
    }

    /// `src` of the force plot `<img>` on a rendered page
    fn image_src(body: &str) -> String {
        let start = body.find(r#"<img src=""#).unwrap() + r#"<img src=""#.len();
        let len = body[start..].find('"').unwrap();
        body[start..start + len].to_string()
    }

    #[tokio::test]
    async fn test_empty_session_shows_prompt() {
        let app = create_router(state(config::ExplanationMode::Inline));
        let (status, headers, body) = send(&app, get("/", None)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(headers.get(header::SET_COOKIE).is_some());
        assert!(body.contains("Please click <strong>Predict</strong>"));
    }

    #[tokio::test]
    async fn test_scenario_submit_zeros() {
        let state = state(config::ExplanationMode::Inline);
        let app = create_router(state.clone());

        let (status, headers, _) = send(&app, post_form("/predict", ZEROS, None)).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(headers.get(header::LOCATION).unwrap(), "/?notice=predicted");
        let (cookie, id) = session_cookie(&headers);

        // submit stored everything, explanation not generated yet
        let expected = state.model.predict(FeatureVector::defaults().as_slice()).unwrap();
        {
            let handle = state.sessions.state(id);
            let current = handle.lock();
            let p = current.predicted().unwrap();
            assert_eq!(p.prediction, expected);
            assert_eq!(p.features, FeatureVector::defaults());
            assert!(!current.explanation_generated());
        }

        let (status, _, body) = send(&app, get("/?notice=predicted", Some(&cookie))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Prediction complete!"));
        assert!(body.contains(&format!("{:.1}%", expected.probabilities[1] * 100.0)));
        assert!(body.contains(&format!("{:.2}%", expected.probabilities[1] * 100.0)));
        assert!(body.contains("<svg"));
        assert!(state.sessions.state(id).lock().explanation_generated());

        // reproducible across runs
        assert_eq!(state.model.predict(FeatureVector::defaults().as_slice()).unwrap(), expected);
    }

    #[tokio::test]
    async fn test_rerender_does_not_recompute() {
        let state = state(config::ExplanationMode::Inline);
        let app = create_router(state.clone());

        let (_, headers, _) = send(&app, post_form("/predict", OTHER, None)).await;
        let (cookie, id) = session_cookie(&headers);

        let (_, _, first) = send(&app, get("/", Some(&cookie))).await;
        let svg_before = state.sessions.state(id).lock().svg().unwrap().to_string();
        let count_before = state.model.info().inference_count;

        let (_, _, second) = send(&app, get("/", Some(&cookie))).await;
        assert_eq!(first, second);
        assert_eq!(state.sessions.state(id).lock().svg().unwrap(), svg_before);
        assert_eq!(state.model.info().inference_count, count_before);
    }

    #[tokio::test]
    async fn test_scenario_submit_then_reset() {
        let state = state(config::ExplanationMode::Inline);
        let app = create_router(state.clone());

        let (_, headers, _) = send(&app, post_form("/predict", ZEROS, None)).await;
        let (cookie, id) = session_cookie(&headers);
        send(&app, get("/", Some(&cookie))).await;

        let (status, headers, _) = send(&app, post_form("/reset", "", Some(&cookie))).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(headers.get(header::LOCATION).unwrap(), "/");

        {
            let handle = state.sessions.state(id);
            let current = handle.lock();
            assert_eq!(current.phase(), Phase::Empty);
            assert!(current.predicted().is_none());
            assert!(!current.explanation_generated());
        }

        let (_, _, body) = send(&app, get("/", Some(&cookie))).await;
        assert!(body.contains("Please click <strong>Predict</strong>"));
        assert!(!body.contains("Prediction result"));

        let (status, _, _) = send(&app, get("/explanation.svg", Some(&cookie))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_scenario_second_submit_overwrites() {
        let state = state(config::ExplanationMode::Inline);
        let app = create_router(state.clone());

        let (_, headers, _) = send(&app, post_form("/predict", ZEROS, None)).await;
        let (cookie, id) = session_cookie(&headers);
        send(&app, get("/", Some(&cookie))).await;
        assert!(state.sessions.state(id).lock().explanation_generated());

        send(&app, post_form("/predict", OTHER, Some(&cookie))).await;

        let handle = state.sessions.state(id);
        let current = handle.lock();
        let p = current.predicted().unwrap();
        assert_eq!(p.features.as_slice(), &[6.0, -4.0, 3.0, 1.0, 1.0, 0.0, 1.0]);
        assert_eq!(p.prediction, state.model.predict(p.features.as_slice()).unwrap());
        assert!(matches!(p.explanation, ExplanationSlot::Pending));
        assert!(!current.explanation_generated());
    }

    #[tokio::test]
    async fn test_sessions_do_not_leak() {
        let state = state(config::ExplanationMode::Inline);
        let app = create_router(state.clone());

        let (_, headers, _) = send(&app, post_form("/predict", ZEROS, None)).await;
        let (cookie, _) = session_cookie(&headers);

        let (_, _, other_user) = send(&app, get("/", None)).await;
        assert!(other_user.contains("Please click"));

        let (_, _, same_user) = send(&app, get("/", Some(&cookie))).await;
        assert!(same_user.contains("Prediction result"));
    }

    #[tokio::test]
    async fn test_image_mode_serves_svg() {
        let app = create_router(state(config::ExplanationMode::Image));

        let (_, headers, _) = send(&app, post_form("/predict", OTHER, None)).await;
        let (cookie, _) = session_cookie(&headers);

        let (_, _, body) = send(&app, get("/", Some(&cookie))).await;
        let first_src = image_src(&body);
        assert!(first_src.starts_with("/explanation.svg?v="));

        let (status, headers, svg) = send(&app, get(&first_src, Some(&cookie))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "image/svg+xml");
        assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-store");
        assert!(svg.starts_with("<svg"));

        // a new prediction gets a new image URL and a new plot
        send(&app, post_form("/predict", ZEROS, Some(&cookie))).await;
        let (_, _, body) = send(&app, get("/", Some(&cookie))).await;
        let second_src = image_src(&body);
        assert_ne!(second_src, first_src);

        let (_, _, second_svg) = send(&app, get(&second_src, Some(&cookie))).await;
        assert_ne!(second_svg, svg);
    }

    #[tokio::test]
    async fn test_out_of_range_rejected() {
        let state = state(config::ExplanationMode::Inline);
        let app = create_router(state.clone());

        let (status, headers, _) =
            send(&app, post_form("/predict", "X1=11&X10=0&X11=0&X18=0&X29=0&X31=0&X33=0", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, id) = session_cookie(&headers);
        assert_eq!(state.sessions.state(id).lock().phase(), Phase::Empty);

        let (status, _, _) = send(&app, post_form("/predict", "X1=0", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_inference_failure_rerenders_with_422() {
        let state = state(config::ExplanationMode::Inline);
        let app = create_router(state.clone());

        let (_, headers, _) = send(&app, post_form("/predict", OTHER, None)).await;
        let (cookie, id) = session_cookie(&headers);
        send(&app, get("/", Some(&cookie))).await;
        let before = state.sessions.state(id).lock().predicted().unwrap().clone();

        // same sessions, model that cannot produce a finite output
        let bytes = std::fs::read(MODEL_PATH).unwrap();
        let mut artifact = logic::model::artifact::parse_artifact(&bytes).unwrap();
        artifact.base_score = f64::NAN;
        let broken = AppState { model: Arc::new(TreeEnsemble::new(artifact, "nan".to_string())), ..state.clone() };
        let broken_app = create_router(broken);

        let (status, _, body) = send(&broken_app, post_form("/predict", ZEROS, Some(&cookie))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body.contains("Prediction failed"));
        assert!(body.contains("Prediction result"));

        let binding = state.sessions.state(id);
        let current = binding.lock();
        let after = current.predicted().unwrap();
        assert_eq!(after.features, before.features);
        assert_eq!(after.prediction, before.prediction);
        assert!(current.explanation_generated());
    }

    #[tokio::test]
    async fn test_api_predict_consistent() {
        let state = state(config::ExplanationMode::Inline);
        let app = create_router(state.clone());

        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/predict")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"X1":0,"X10":0,"X11":0,"X18":0,"X29":0,"X31":0,"X33":0}"#))
            .unwrap();
        let (status, _, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        let p = &json["prediction"]["probabilities"];
        let p0 = p[0].as_f64().unwrap();
        let p1 = p[1].as_f64().unwrap();
        assert!((p0 + p1 - 1.0).abs() < 1e-9);
        assert_eq!(json["prediction"]["predicted_class"].as_u64().unwrap(), if p1 > p0 { 1 } else { 0 });

        let explanation = &json["explanation"];
        let base = explanation["base_value"].as_f64().unwrap();
        let sum: f64 = explanation["contributions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["shap_value"].as_f64().unwrap())
            .sum();
        let reconstructed = 1.0 / (1.0 + (-(base + sum)).exp());
        assert!((reconstructed - p1).abs() < 1e-6);
        assert!(json["explanation_error"].is_null());
    }

    #[tokio::test]
    async fn test_model_info_and_health() {
        let app = create_router(state(config::ExplanationMode::Inline));

        let (status, _, body) = send(&app, get("/api/v1/model", None)).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["model_type"], "gradient_boosting");
        assert_eq!(json["feature_names"][0], "X1");
        assert_eq!(json["explanation_mode"], "inline");
        assert!(json["reference"]["row_count"].as_u64().unwrap() > 0);

        let (status, _, body) = send(&app, get("/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("healthy"));
    }
}
