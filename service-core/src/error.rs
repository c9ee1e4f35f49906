use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(anyhow::Error),

    #[error("Session revoked")]
    SessionRevoked,

    #[error("Session expired")]
    SessionExpired,

    #[error("CSRF validation failed")]
    CsrfInvalid,

    #[error("Forbidden: {0}")]
    Forbidden(anyhow::Error),

    #[error("Session store unavailable: {0}")]
    StoreUnavailable(anyhow::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

impl AppError {
    /// Stable machine-readable kind, surfaced in the response body.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "validation_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::SessionRevoked => "session_revoked",
            AppError::SessionExpired => "session_expired",
            AppError::CsrfInvalid => "csrf_invalid",
            AppError::Forbidden(_) => "forbidden",
            AppError::StoreUnavailable(_) => "store_unavailable",
            AppError::InternalError(_) => "internal_error",
            AppError::DatabaseError(_) => "database_error",
            AppError::ConfigError(_) => "config_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
            message: String,
        }

        let kind = self.kind();

        let (status, message) = match self {
            AppError::ValidationError(err) => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
            AppError::BadRequest(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            AppError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string()),
            AppError::Unauthorized(err) => (StatusCode::UNAUTHORIZED, err.to_string()),
            AppError::SessionRevoked => (
                StatusCode::UNAUTHORIZED,
                "Your session has been revoked. Please log in again.".to_string(),
            ),
            AppError::SessionExpired => (
                StatusCode::UNAUTHORIZED,
                "Your session has expired. Please log in again.".to_string(),
            ),
            // Never echo token or signature material back to the caller.
            AppError::CsrfInvalid => (
                StatusCode::FORBIDDEN,
                "The request could not be verified. Please retry.".to_string(),
            ),
            AppError::Forbidden(err) => (StatusCode::FORBIDDEN, err.to_string()),
            AppError::StoreUnavailable(err) => {
                tracing::error!(error = %err, "Session store unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service temporarily unavailable".to_string(),
                )
            }
            AppError::InternalError(err) => {
                tracing::error!(error = %err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::DatabaseError(err) => {
                tracing::error!(error = %err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            AppError::ConfigError(err) => {
                tracing::error!(error = %err, "Configuration error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Configuration error".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: kind, message })).into_response()
    }
}
