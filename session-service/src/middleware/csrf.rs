use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, Method},
    middleware::Next,
    response::Response,
};
use http_body_util::BodyExt;
use service_core::{error::AppError, observability::logging::redact_session_id};

use crate::AppState;

use super::auth::AuthSession;

pub const CSRF_HEADER: &str = "x-csrf-token";

/// Validate the double-submit CSRF token on state-changing requests.
///
/// The token is read from the `x-csrf-token` header, falling back to the
/// `_csrf` field of a JSON body. Unlike the revocation middleware this
/// one fails closed: a store outage during validation is a 503, never a
/// silent pass.
pub async fn csrf_validation_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if matches!(*req.method(), Method::GET | Method::HEAD | Method::OPTIONS) {
        return Ok(next.run(req).await);
    }

    let path = req.uri().path().to_string();
    if state
        .config
        .security
        .csrf_exempt_paths
        .iter()
        .any(|prefix| path.starts_with(prefix.as_str()))
    {
        return Ok(next.run(req).await);
    }

    let (req, presented) = extract_token(req).await?;

    // CSRF protection only makes sense for an authenticated session; a
    // state-changing request with no session fails closed.
    let Some(auth) = req.extensions().get::<AuthSession>().cloned() else {
        tracing::warn!(path = %path, "CSRF check on request without a session");
        return Err(AppError::CsrfInvalid);
    };

    let Some(presented) = presented else {
        tracing::warn!(
            path = %path,
            session_id = %redact_session_id(&auth.session_id),
            "Missing CSRF token"
        );
        return Err(AppError::CsrfInvalid);
    };

    if state.csrf.validate(&presented, &auth.session_id).await? {
        Ok(next.run(req).await)
    } else {
        tracing::warn!(
            path = %path,
            session_id = %redact_session_id(&auth.session_id),
            "CSRF token validation failed"
        );
        Err(AppError::CsrfInvalid)
    }
}

/// Pull the CSRF token out of the request without consuming it. Reading
/// the `_csrf` body field requires buffering the body and rebuilding the
/// request for downstream handlers.
async fn extract_token(req: Request) -> Result<(Request, Option<String>), AppError> {
    let header_token = req
        .headers()
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());
    if header_token.is_some() {
        return Ok((req, header_token));
    }

    let is_json = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("application/json"))
        .unwrap_or(false);

    if !is_json {
        return Ok((req, None));
    }

    let (parts, body) = req.into_parts();
    let bytes = body
        .collect()
        .await
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Failed to read request body: {}", e)))?
        .to_bytes();

    let token = serde_json::from_slice::<serde_json::Value>(&bytes)
        .ok()
        .and_then(|value| value.get("_csrf").and_then(|t| t.as_str()).map(String::from));

    let req = Request::from_parts(parts, Body::from(bytes));
    Ok((req, token))
}
