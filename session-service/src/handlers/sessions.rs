use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{MessageResponse, RevokeAllRequest, SessionListResponse},
    middleware::AuthUser,
    AppState,
};

/// List the caller's sessions, most recent activity first.
#[utoipa::path(
    get,
    path = "/sessions",
    responses(
        (status = 200, description = "Sessions for the current user", body = SessionListResponse),
        (status = 401, description = "Not authenticated"),
        (status = 503, description = "Session store unavailable")
    ),
    security(("bearer_auth" = [])),
    tag = "sessions"
)]
pub async fn list_sessions(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
) -> Result<Json<SessionListResponse>, AppError> {
    let sessions = state
        .sessions
        .list_sessions(auth.user_id, &auth.session_id)
        .await?;

    Ok(Json(SessionListResponse { sessions }))
}

/// Revoke one of the caller's sessions.
#[utoipa::path(
    delete,
    path = "/sessions/{session_id}",
    params(
        ("session_id" = String, Path, description = "Session to revoke")
    ),
    responses(
        (status = 200, description = "Session revoked", body = MessageResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Session not found or owned by another user"),
        (status = 503, description = "Session store unavailable")
    ),
    security(("bearer_auth" = [])),
    tag = "sessions"
)]
pub async fn revoke_session(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
    Path(session_id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.sessions.revoke_session(auth.user_id, &session_id).await?;

    // Make sure the revoked session can no longer authenticate even if a
    // request slips past the record store.
    if let Err(e) = state
        .blacklist
        .blacklist_session(
            &session_id,
            state.config.jwt.access_token_expiry_minutes.max(1) * 60,
        )
        .await
    {
        tracing::warn!(error = %e, "Failed to blacklist revoked session");
    }

    Ok(Json(MessageResponse {
        message: "Session revoked successfully".to_string(),
    }))
}

/// Revoke all of the caller's sessions, by default sparing the current one.
#[utoipa::path(
    post,
    path = "/sessions/revoke-all",
    request_body = RevokeAllRequest,
    responses(
        (status = 200, description = "Sessions revoked", body = MessageResponse),
        (status = 401, description = "Not authenticated"),
        (status = 503, description = "Session store unavailable")
    ),
    security(("bearer_auth" = [])),
    tag = "sessions"
)]
pub async fn revoke_all_sessions(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
    body: Option<Json<RevokeAllRequest>>,
) -> Result<Json<MessageResponse>, AppError> {
    let exclude_current = body.map(|Json(b)| b.exclude_current).unwrap_or(true);

    let revoked = state
        .sessions
        .revoke_all_sessions(auth.user_id, &auth.session_id, exclude_current)
        .await?;

    tracing::info!(
        user_id = auth.user_id,
        revoked,
        exclude_current,
        "Bulk session revocation"
    );

    let message = if exclude_current {
        "All other sessions revoked successfully"
    } else {
        "All sessions revoked successfully"
    };

    Ok(Json(MessageResponse {
        message: message.to_string(),
    }))
}
