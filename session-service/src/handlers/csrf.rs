use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::{
    dtos::CsrfTokenResponse,
    middleware::MaybeAuthUser,
    AppState,
};

/// Issue a CSRF token for the caller's session.
///
/// Anonymous callers (e.g. a login form) get a signed token that is not
/// bound to any stored session.
#[utoipa::path(
    get,
    path = "/csrf-token",
    responses(
        (status = 200, description = "CSRF token issued", body = CsrfTokenResponse),
        (status = 503, description = "Session store unavailable")
    ),
    tag = "csrf"
)]
pub async fn get_csrf_token(
    State(state): State<AppState>,
    MaybeAuthUser(auth): MaybeAuthUser,
) -> Result<Json<CsrfTokenResponse>, AppError> {
    let session_id = auth.as_ref().map(|a| a.session_id.as_str());
    let csrf_token = state.csrf.issue(session_id).await?;

    Ok(Json(CsrfTokenResponse { csrf_token }))
}
