//! Session management service.
//!
//! Wraps the Session Record Store with the ownership rules of the
//! management API and the timeout policy every store call is subject to.

use chrono::{DateTime, Duration, Utc};
use service_core::error::AppError;
use service_core::observability::logging::redact_session_id;
use std::future::Future;
use std::sync::Arc;

use crate::dtos::SessionView;
use crate::models::{NewUserSession, UserSession};
use crate::services::store::SessionStore;

#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    session_ttl: Duration,
    store_timeout: std::time::Duration,
}

impl SessionService {
    pub fn new(store: Arc<dyn SessionStore>, ttl_days: i64, store_timeout_ms: u64) -> Self {
        Self {
            store,
            session_ttl: Duration::days(ttl_days),
            store_timeout: std::time::Duration::from_millis(store_timeout_ms),
        }
    }

    /// Bound a store call by the configured timeout. A hung store must not
    /// hold the request open indefinitely; the caller decides whether the
    /// resulting error fails the request open or closed.
    async fn bounded<T, F>(&self, fut: F) -> Result<T, anyhow::Error>
    where
        F: Future<Output = Result<T, anyhow::Error>>,
    {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!("Session store call timed out")),
        }
    }

    // ==================== Used by the revocation middleware ====================

    pub async fn get(&self, session_id: &str) -> Result<Option<UserSession>, anyhow::Error> {
        self.bounded(self.store.get(session_id)).await
    }

    /// Register a session record with the fixed absolute expiry. Used both
    /// by explicit registration at login and by the middleware's lazy
    /// backfill of sessions that predate tracking.
    pub async fn track(
        &self,
        session_id: &str,
        user_id: i64,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<(), anyhow::Error> {
        let now = Utc::now();
        self.bounded(self.store.create(NewUserSession {
            session_id: session_id.to_string(),
            user_id,
            ip_address,
            user_agent,
            last_activity_at: now,
            expires_at: now + self.session_ttl,
        }))
        .await
    }

    pub async fn touch(&self, session_id: &str, now: DateTime<Utc>) -> Result<(), anyhow::Error> {
        self.bounded(self.store.update_activity(session_id, now))
            .await
    }

    /// Record that an expired session was rejected, so the decision is
    /// persisted rather than implied by the clock.
    pub async fn mark_revoked(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, anyhow::Error> {
        self.bounded(self.store.revoke(session_id, now)).await
    }

    // ==================== Session Management API ====================
    //
    // Unlike the middleware, these fail closed: a store we cannot reach is
    // a store we cannot safely mutate.

    pub async fn list_sessions(
        &self,
        owner_id: i64,
        current_session_id: &str,
    ) -> Result<Vec<SessionView>, AppError> {
        let sessions = self
            .bounded(self.store.list_for_user(owner_id))
            .await
            .map_err(AppError::StoreUnavailable)?;

        Ok(sessions
            .into_iter()
            .map(|s| {
                let is_current = s.session_id == current_session_id;
                let mut view: SessionView = s.into();
                view.is_current = is_current;
                view
            })
            .collect())
    }

    /// Revoke one session. The target must exist and belong to `owner_id`;
    /// the id is caller-supplied, so ownership is checked even though the
    /// route is already authenticated.
    pub async fn revoke_session(
        &self,
        owner_id: i64,
        target_session_id: &str,
    ) -> Result<(), AppError> {
        let session = self
            .bounded(self.store.get(target_session_id))
            .await
            .map_err(AppError::StoreUnavailable)?;

        let owned = session.map(|s| s.user_id == owner_id).unwrap_or(false);
        if !owned {
            tracing::warn!(
                user_id = owner_id,
                session = %redact_session_id(target_session_id),
                "Rejected session revocation for a session the caller does not own"
            );
            return Err(AppError::Forbidden(anyhow::anyhow!(
                "Session not found or access denied"
            )));
        }

        self.bounded(self.store.revoke(target_session_id, Utc::now()))
            .await
            .map_err(AppError::StoreUnavailable)?;

        tracing::info!(
            user_id = owner_id,
            session = %redact_session_id(target_session_id),
            "Session revoked"
        );
        Ok(())
    }

    /// Revoke every session owned by `owner_id`, sparing the caller's own
    /// when `exclude_current` is set ("log out everywhere else").
    pub async fn revoke_all_sessions(
        &self,
        owner_id: i64,
        current_session_id: &str,
        exclude_current: bool,
    ) -> Result<u64, AppError> {
        let except = exclude_current.then_some(current_session_id);
        let revoked = self
            .bounded(self.store.revoke_all_for_user(owner_id, Utc::now(), except))
            .await
            .map_err(AppError::StoreUnavailable)?;

        tracing::info!(
            user_id = owner_id,
            revoked_count = revoked,
            exclude_current = exclude_current,
            "Revoked user sessions"
        );
        Ok(revoked)
    }
}
