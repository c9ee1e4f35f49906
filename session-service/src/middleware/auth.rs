use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::AppState;

/// Authenticated identity for the in-flight request, attached by
/// [`identity_middleware`]. This is what the rest of the chain consumes:
/// the current user id, the session identifier issued by the identity
/// layer, and the bearer-token deadline (used to size blacklist entries).
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: i64,
    pub session_id: String,
    pub token_exp: i64,
}

/// Resolve the request's identity, if any.
///
/// Anonymous traffic passes through untouched; a present-but-invalid
/// bearer token is rejected, and a token whose session was terminated at
/// the identity level gets `session_revoked`.
pub async fn identity_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let Some(token) = token else {
        return Ok(next.run(req).await);
    };

    let claims = state
        .jwt
        .validate_access_token(token)
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Invalid or expired token")))?;

    // Terminated at the identity level. If the blacklist is unreachable we
    // continue: the revocation middleware still enforces revoked_at from
    // the record store on this same request.
    match state.blacklist.is_blacklisted(&claims.sid).await {
        Ok(true) => return Err(AppError::SessionRevoked),
        Ok(false) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Blacklist check failed; continuing");
        }
    }

    let user_id = claims
        .user_id()
        .map_err(|e| AppError::Unauthorized(anyhow::anyhow!(e)))?;

    req.extensions_mut().insert(AuthSession {
        user_id,
        session_id: claims.sid.clone(),
        token_exp: claims.exp,
    });

    Ok(next.run(req).await)
}

/// Reject requests that reached a protected route without an identity.
pub async fn require_auth_middleware(req: Request, next: Next) -> Result<Response, AppError> {
    if req.extensions().get::<AuthSession>().is_none() {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Authentication required"
        )));
    }
    Ok(next.run(req).await)
}

/// Extractor for handlers behind `require_auth_middleware`.
pub struct AuthUser(pub AuthSession);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth = parts.extensions.get::<AuthSession>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Identity missing from request extensions"
            ))
        })?;

        Ok(AuthUser(auth.clone()))
    }
}

/// Extractor for routes that serve both anonymous and authenticated
/// callers (e.g. CSRF token issuance).
pub struct MaybeAuthUser(pub Option<AuthSession>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(parts.extensions.get::<AuthSession>().cloned()))
    }
}
