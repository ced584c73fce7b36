//! Session cookie middleware

use axum::{
    extract::{Request, State},
    http::{header::{COOKIE, SET_COOKIE}, HeaderValue},
    middleware::Next,
    response::Response,
};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::{AppError, AppState};

pub const SESSION_COOKIE: &str = "predictor_session";

/// Session resolved for the current request
#[derive(Debug, Clone, Copy)]
pub struct SessionContext {
    pub id: Uuid,
}

/// Middleware: attach a session, issuing a cookie when a new one is created
pub async fn with_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let cookie_id = extract_session_id(&req);
    let (id, created) = state.sessions.resolve(cookie_id);

    req.extensions_mut().insert(SessionContext { id });

    let mut response = next.run(req).await;

    if created {
        let secure = if state.config.is_production() { "; Secure" } else { "" };
        let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax{}", SESSION_COOKIE, id, secure);
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => tracing::error!("Invalid session cookie header: {}", e),
        }
    }

    response
}

/// Read the session id from the Cookie header(s)
fn extract_session_id(req: &Request) -> Option<Uuid> {
    req.headers()
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for SessionContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions
            .get::<SessionContext>()
            .copied()
            .ok_or_else(|| AppError::InternalError("session middleware not installed".to_string()))
    }
}
