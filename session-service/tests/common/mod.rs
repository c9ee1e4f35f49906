#![allow(dead_code)]

use async_trait::async_trait;
use axum::{response::Response, Router};
use chrono::{DateTime, Duration, Utc};
use http_body_util::BodyExt;
use session_service::{
    build_router,
    config::{
        DatabaseConfig, Environment, JwtConfig, RedisConfig, SecurityConfig, SessionConfig,
        SessionServiceConfig, SwaggerConfig,
    },
    models::{NewUserSession, UserSession},
    services::{
        CsrfService, JwtService, MemoryBlacklist, MemorySessionStore, SessionService, SessionStore,
    },
    AppState,
};
use std::sync::Arc;

pub const JWT_SECRET: &str = "test-jwt-secret-that-is-long-enough!";
pub const CSRF_SECRET: &str = "test-csrf-secret-that-is-long-enough";

pub fn test_config() -> SessionServiceConfig {
    SessionServiceConfig {
        common: service_core::config::Config { port: 8080 },
        environment: Environment::Dev,
        service_name: "session-service".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: "http://localhost:4317".to_string(),
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 1,
            min_connections: 1,
        },
        redis: RedisConfig {
            url: String::new(),
        },
        jwt: JwtConfig {
            secret: JWT_SECRET.to_string(),
            access_token_expiry_minutes: 15,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            csrf_secret: CSRF_SECRET.to_string(),
            csrf_exempt_paths: vec!["/auth/".to_string()],
        },
        session: SessionConfig {
            ttl_days: 7,
            store_timeout_ms: 2000,
        },
        swagger: SwaggerConfig { enabled: false },
    }
}

pub struct TestContext {
    pub app: Router,
    pub state: AppState,
    pub store: Arc<MemorySessionStore>,
    pub blacklist: Arc<MemoryBlacklist>,
}

pub async fn setup() -> TestContext {
    let store = Arc::new(MemorySessionStore::new());
    let blacklist = Arc::new(MemoryBlacklist::new());
    let state = build_state(store.clone(), blacklist.clone()).await;
    let app = build_router(state.clone()).await.expect("router builds");

    TestContext {
        app,
        state,
        store,
        blacklist,
    }
}

/// Same as [`setup`] but with a store double that fails every call, for
/// exercising the fail-open and fail-closed paths.
pub async fn setup_with_failing_store() -> TestContext {
    let store = Arc::new(MemorySessionStore::new());
    let blacklist = Arc::new(MemoryBlacklist::new());
    let state = build_state(Arc::new(FailingStore), blacklist.clone()).await;
    let app = build_router(state.clone()).await.expect("router builds");

    TestContext {
        app,
        state,
        store,
        blacklist,
    }
}

async fn build_state(
    store: Arc<dyn SessionStore>,
    blacklist: Arc<MemoryBlacklist>,
) -> AppState {
    let config = test_config();
    let jwt = JwtService::new(&config.jwt).expect("jwt service");
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

    AppState {
        config,
        store,
        blacklist,
        jwt,
        sessions,
        csrf,
        metrics: None,
    }
}

pub fn session_record(session_id: &str, user_id: i64) -> UserSession {
    let now = Utc::now();
    UserSession {
        session_id: session_id.to_string(),
        user_id,
        ip_address: Some("203.0.113.7".to_string()),
        user_agent: Some("integration-tests".to_string()),
        csrf_token: None,
        csrf_signature: None,
        created_at: now,
        last_activity_at: now,
        expires_at: now + Duration::days(7),
        revoked_at: None,
    }
}

pub fn bearer(state: &AppState, user_id: i64, session_id: &str) -> String {
    let token = state
        .jwt
        .issue_access_token(user_id, session_id)
        .expect("token mints");
    format!("Bearer {}", token)
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body reads")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is JSON")
}

/// Store double whose every call fails, standing in for an unreachable
/// Postgres.
pub struct FailingStore;

#[async_trait]
impl SessionStore for FailingStore {
    async fn get(&self, _session_id: &str) -> Result<Option<UserSession>, anyhow::Error> {
        Err(anyhow::anyhow!("store down"))
    }

    async fn create(&self, _session: NewUserSession) -> Result<(), anyhow::Error> {
        Err(anyhow::anyhow!("store down"))
    }

    async fn update_activity(
        &self,
        _session_id: &str,
        _now: DateTime<Utc>,
    ) -> Result<(), anyhow::Error> {
        Err(anyhow::anyhow!("store down"))
    }

    async fn set_csrf(
        &self,
        _session_id: &str,
        _token: &str,
        _signature: &str,
    ) -> Result<(), anyhow::Error> {
        Err(anyhow::anyhow!("store down"))
    }

    async fn revoke(&self, _session_id: &str, _now: DateTime<Utc>) -> Result<bool, anyhow::Error> {
        Err(anyhow::anyhow!("store down"))
    }

    async fn revoke_all_for_user(
        &self,
        _user_id: i64,
        _now: DateTime<Utc>,
        _except_session_id: Option<&str>,
    ) -> Result<u64, anyhow::Error> {
        Err(anyhow::anyhow!("store down"))
    }

    async fn list_for_user(&self, _user_id: i64) -> Result<Vec<UserSession>, anyhow::Error> {
        Err(anyhow::anyhow!("store down"))
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Err(anyhow::anyhow!("store down"))
    }
}
