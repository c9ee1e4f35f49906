use metrics_exporter_prometheus::PrometheusBuilder;
use service_core::observability::logging::init_tracing;
use session_service::{
    build_router,
    config::SessionServiceConfig,
    db,
    services::{CsrfService, JwtService, PgSessionStore, RedisService, SessionService},
    AppState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = SessionServiceConfig::from_env()?;

    init_tracing(&config.service_name, &config.log_level, &config.otlp_endpoint);

    let metrics_handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
        service_core::error::AppError::ConfigError(anyhow::anyhow!(
            "Failed to install metrics recorder: {}",
            e
        ))
    })?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting session service"
    );

    // Initialize database connections
    tracing::info!("Initializing database connections");
    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool)
        .await
        .map_err(|e| service_core::error::AppError::DatabaseError(anyhow::anyhow!(e)))?;
    tracing::info!("Database initialized successfully");

    let blacklist = RedisService::new(&config.redis).await?;
    let blacklist = Arc::new(blacklist);
    tracing::info!("Redis blacklist initialized");

    let jwt = JwtService::new(&config.jwt)?;
    tracing::info!("JWT service initialized");

    let store = Arc::new(PgSessionStore::new(pool));

    let sessions = SessionService::new(
        store.clone(),
        config.session.ttl_days,
        config.session.store_timeout_ms,
    );
    let csrf = CsrfService::new(
        &config.security.csrf_secret,
        store.clone(),
        config.session.store_timeout_ms,
    );

    let state = AppState {
        config: config.clone(),
        store,
        blacklist,
        jwt,
        sessions,
        csrf,
        metrics: Some(metrics_handle),
    };

    let app = build_router(state).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
