use axum::{extract::{Request, State}, middleware::Next, response::Response};
use chrono::Utc;
use service_core::{error::AppError, observability::logging::redact_session_id};

use crate::AppState;

use super::auth::AuthSession;

/// Enforce session revocation and expiry on every authenticated request.
///
/// Lookup failures and timeouts fail open: availability of the dashboard
/// wins over immediate enforcement, and the blacklist already catches
/// sessions terminated at the identity level. A record that is present
/// and revoked or expired is a hard 401.
pub async fn session_revocation_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(auth) = req.extensions().get::<AuthSession>().cloned() else {
        return Ok(next.run(req).await);
    };

    let now = Utc::now();

    match state.sessions.get(&auth.session_id).await {
        Err(e) => {
            tracing::error!(
                session_id = %redact_session_id(&auth.session_id),
                error = %e,
                "Session lookup failed; allowing request"
            );
            Ok(next.run(req).await)
        }
        Ok(Some(record)) => {
            if record.is_revoked() {
                tracing::warn!(
                    session_id = %redact_session_id(&auth.session_id),
                    user_id = auth.user_id,
                    "Rejected request for revoked session"
                );
                terminate(&state, &auth).await;
                return Err(AppError::SessionRevoked);
            }

            if record.is_expired(now) {
                if let Err(e) = state.sessions.mark_revoked(&auth.session_id, now).await {
                    tracing::error!(
                        session_id = %redact_session_id(&auth.session_id),
                        error = %e,
                        "Failed to record session expiry"
                    );
                }
                terminate(&state, &auth).await;
                return Err(AppError::SessionExpired);
            }

            if let Err(e) = state.sessions.touch(&auth.session_id, now).await {
                tracing::warn!(
                    session_id = %redact_session_id(&auth.session_id),
                    error = %e,
                    "Failed to update session activity"
                );
            }

            Ok(next.run(req).await)
        }
        Ok(None) => {
            // Session predates server-side tracking. Register it now so it
            // becomes revocable, with a fresh absolute expiry.
            let ip = client_ip(&req);
            let user_agent = req
                .headers()
                .get(axum::http::header::USER_AGENT)
                .and_then(|value| value.to_str().ok())
                .map(|value| value.to_string());

            match state
                .sessions
                .track(&auth.session_id, auth.user_id, ip, user_agent)
                .await
            {
                Ok(_) => {
                    tracing::info!(
                        session_id = %redact_session_id(&auth.session_id),
                        user_id = auth.user_id,
                        "Registered previously untracked session"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        session_id = %redact_session_id(&auth.session_id),
                        error = %e,
                        "Failed to register untracked session; allowing request"
                    );
                }
            }

            Ok(next.run(req).await)
        }
    }
}

/// Blacklist the session for the remaining lifetime of its token so the
/// identity layer rejects it even if the record store is unavailable.
async fn terminate(state: &AppState, auth: &AuthSession) {
    let remaining = auth.token_exp - Utc::now().timestamp();
    let expiry_seconds = remaining.max(60);

    if let Err(e) = state
        .blacklist
        .blacklist_session(&auth.session_id, expiry_seconds)
        .await
    {
        tracing::error!(
            session_id = %redact_session_id(&auth.session_id),
            error = %e,
            "Failed to blacklist terminated session"
        );
    }
}

fn client_ip(req: &Request) -> Option<String> {
    req.headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
}
