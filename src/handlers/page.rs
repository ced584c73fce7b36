//! Page handlers: the form, submit, reset, and the force plot image

use axum::{
    extract::{rejection::FormRejection, Query, State},
    http::{header::{CACHE_CONTROL, CONTENT_TYPE}, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;

use crate::logic::session::{ensure_explanation, on_reset, on_submit, render};
use crate::middleware::session::SessionContext;
use crate::models::FeatureForm;
use crate::views::{page, Banner};
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub notice: Option<String>,
}

/// Render the page for the caller's session
pub async fn index(
    State(state): State<AppState>,
    session: SessionContext,
    Query(query): Query<PageQuery>,
) -> Html<String> {
    let handle = state.sessions.state(session.id);

    let view = {
        let mut current = handle.lock();
        if ensure_explanation(&mut current, &state.model, state.config.consistency_tolerance) {
            tracing::info!(
                session = %session.id,
                ok = current.svg().is_some(),
                "Explanation generated"
            );
        }
        render(&current, state.config.explanation_mode)
    };

    let banner = match query.notice.as_deref() {
        Some("predicted") if view.result.is_some() => Some(Banner::Success("Prediction complete!".to_string())),
        _ => None,
    };

    Html(page(&state.config.app_title, &view, banner.as_ref()))
}

/// Form submit
pub async fn submit(
    State(state): State<AppState>,
    session: SessionContext,
    form: Result<Form<FeatureForm>, FormRejection>,
) -> AppResult<Response> {
    let Form(form) = form?;
    let features = form.into_vector().map_err(AppError::ValidationError)?;

    let handle = state.sessions.state(session.id);
    let outcome = on_submit(&mut handle.lock(), &state.model, features);

    match outcome {
        Ok(transition) => {
            tracing::info!(
                session = %session.id,
                from = ?transition.from,
                features = ?features.as_slice(),
                "Prediction made"
            );
            Ok(Redirect::to("/?notice=predicted").into_response())
        }
        Err(err) => {
            tracing::warn!(session = %session.id, "Prediction failed: {}", err);
            let view = render(&handle.lock(), state.config.explanation_mode);
            let banner = Banner::Error(format!("Prediction failed: {}", err));
            let html = page(&state.config.app_title, &view, Some(&banner));
            Ok((StatusCode::UNPROCESSABLE_ENTITY, Html(html)).into_response())
        }
    }
}

/// Clear the session
pub async fn reset(
    State(state): State<AppState>,
    session: SessionContext,
) -> Redirect {
    let transition = on_reset(&mut state.sessions.state(session.id).lock());
    tracing::info!(session = %session.id, from = ?transition.from, "Prediction cleared");
    Redirect::to("/")
}

/// Force plot served from the session's in-memory buffer
pub async fn explanation_svg(
    State(state): State<AppState>,
    session: SessionContext,
) -> AppResult<Response> {
    let handle = state.sessions.state(session.id);
    let mut current = handle.lock();
    ensure_explanation(&mut current, &state.model, state.config.consistency_tolerance);

    let svg = current
        .svg()
        .ok_or_else(|| AppError::NotFound("No explanation for this session".to_string()))?
        .to_string();

    Ok(([(CONTENT_TYPE, "image/svg+xml"), (CACHE_CONTROL, "no-store")], svg).into_response())
}
