pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use metrics_exporter_prometheus::PrometheusHandle;
use service_core::axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Router,
};
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::SecurityScheme,
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::SessionServiceConfig;
use crate::services::{CsrfService, JwtService, SessionBlacklist, SessionService, SessionStore};
use service_core::error::AppError;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::csrf::get_csrf_token,
        handlers::sessions::list_sessions,
        handlers::sessions::revoke_session,
        handlers::sessions::revoke_all_sessions,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::CsrfTokenResponse,
            dtos::SessionView,
            dtos::SessionListResponse,
            dtos::RevokeAllRequest,
            dtos::MessageResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "csrf", description = "CSRF token issuance"),
        (name = "sessions", description = "Session visibility and revocation"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: SessionServiceConfig,
    pub store: Arc<dyn SessionStore>,
    pub blacklist: Arc<dyn SessionBlacklist>,
    pub jwt: JwtService,
    pub sessions: SessionService,
    pub csrf: CsrfService,
    /// Absent when no Prometheus recorder was installed (tests).
    pub metrics: Option<PrometheusHandle>,
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    // Routes that require an authenticated session.
    let session_routes = Router::new()
        .route("/sessions", get(handlers::sessions::list_sessions))
        .route(
            "/sessions/revoke-all",
            post(handlers::sessions::revoke_all_sessions),
        )
        .route(
            "/sessions/:session_id",
            delete(handlers::sessions::revoke_session),
        )
        .route_layer(from_fn(middleware::require_auth_middleware));

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route("/csrf-token", get(handlers::csrf::get_csrf_token));

    if state.config.swagger.enabled {
        app =
            app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { service_core::axum::Json(ApiDoc::openapi()) }),
        );
    }

    let app = app
        .merge(session_routes)
        .with_state(state.clone())
        // CSRF validation runs after identity and revocation so the
        // presented token can be checked against a live session.
        .layer(from_fn_with_state(
            state.clone(),
            middleware::csrf_validation_middleware,
        ))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::session_revocation_middleware,
        ))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::identity_middleware,
        ))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(
                    state
                        .config
                        .security
                        .allowed_origins
                        .iter()
                        .filter_map(|o| {
                            o.parse::<service_core::axum::http::HeaderValue>()
                                .map_err(|e| {
                                    tracing::error!("Invalid CORS origin '{}': {}", o, e);
                                    e
                                })
                                .ok()
                        })
                        .collect::<Vec<service_core::axum::http::HeaderValue>>(),
                )
                .allow_methods([
                    service_core::axum::http::Method::GET,
                    service_core::axum::http::Method::POST,
                    service_core::axum::http::Method::DELETE,
                    service_core::axum::http::Method::OPTIONS,
                ])
                .allow_headers([
                    service_core::axum::http::header::AUTHORIZATION,
                    service_core::axum::http::header::CONTENT_TYPE,
                    service_core::axum::http::header::HeaderName::from_static("x-csrf-token"),
                ])
                .allow_credentials(true),
        );

    Ok(app)
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Service is unhealthy")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    service_core::axum::extract::State(state): service_core::axum::extract::State<AppState>,
) -> Result<service_core::axum::Json<serde_json::Value>, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Session store health check failed");
        AppError::StoreUnavailable(e)
    })?;

    state.blacklist.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Blacklist health check failed");
        AppError::StoreUnavailable(e)
    })?;

    Ok(service_core::axum::Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "postgres": "up",
            "redis": "up"
        }
    })))
}
