//! Session Record Store.
//!
//! The durable store of session metadata, keyed by session id with a
//! secondary lookup by user id. All writes are idempotent or
//! last-write-wins-safe, so no locking is needed across concurrent
//! requests from the same user.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;

use crate::models::{NewUserSession, UserSession};

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Option<UserSession>, anyhow::Error>;

    async fn create(&self, session: NewUserSession) -> Result<(), anyhow::Error>;

    async fn update_activity(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), anyhow::Error>;

    /// Overwrite the stored CSRF token/signature pair. Last write wins by
    /// design: concurrent tabs racing here only cost the loser a retry.
    async fn set_csrf(
        &self,
        session_id: &str,
        token: &str,
        signature: &str,
    ) -> Result<(), anyhow::Error>;

    /// Set `revoked_at` if not already set. Returns whether a row changed.
    async fn revoke(&self, session_id: &str, now: DateTime<Utc>) -> Result<bool, anyhow::Error>;

    /// Revoke every session owned by `user_id`, optionally sparing one.
    /// Returns the number of sessions revoked.
    async fn revoke_all_for_user(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
        except_session_id: Option<&str>,
    ) -> Result<u64, anyhow::Error>;

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<UserSession>, anyhow::Error>;

    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<UserSession>, anyhow::Error> {
        sqlx::query_as::<_, UserSession>("SELECT * FROM user_sessions WHERE session_id = $1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to load session: {}", e))
    }

    async fn create(&self, session: NewUserSession) -> Result<(), anyhow::Error> {
        sqlx::query(
            r#"
            INSERT INTO user_sessions (session_id, user_id, ip_address, user_agent, last_activity_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (session_id) DO NOTHING
            "#,
        )
        .bind(&session.session_id)
        .bind(session.user_id)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(session.last_activity_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create session: {}", e))?;
        Ok(())
    }

    async fn update_activity(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), anyhow::Error> {
        sqlx::query("UPDATE user_sessions SET last_activity_at = $1 WHERE session_id = $2")
            .bind(now)
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to update session activity: {}", e))?;
        Ok(())
    }

    async fn set_csrf(
        &self,
        session_id: &str,
        token: &str,
        signature: &str,
    ) -> Result<(), anyhow::Error> {
        sqlx::query(
            "UPDATE user_sessions SET csrf_token = $1, csrf_signature = $2 WHERE session_id = $3",
        )
        .bind(token)
        .bind(signature)
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to store CSRF token: {}", e))?;
        Ok(())
    }

    async fn revoke(&self, session_id: &str, now: DateTime<Utc>) -> Result<bool, anyhow::Error> {
        let result = sqlx::query(
            "UPDATE user_sessions SET revoked_at = $1 WHERE session_id = $2 AND revoked_at IS NULL",
        )
        .bind(now)
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to revoke session: {}", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn revoke_all_for_user(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
        except_session_id: Option<&str>,
    ) -> Result<u64, anyhow::Error> {
        let result = match except_session_id {
            Some(except) => sqlx::query(
                r#"
                UPDATE user_sessions SET revoked_at = $1
                WHERE user_id = $2 AND revoked_at IS NULL AND session_id <> $3
                "#,
            )
            .bind(now)
            .bind(user_id)
            .bind(except)
            .execute(&self.pool)
            .await,
            None => sqlx::query(
                "UPDATE user_sessions SET revoked_at = $1 WHERE user_id = $2 AND revoked_at IS NULL",
            )
            .bind(now)
            .bind(user_id)
            .execute(&self.pool)
            .await,
        }
        .map_err(|e| anyhow::anyhow!("Failed to revoke sessions: {}", e))?;
        Ok(result.rows_affected())
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<UserSession>, anyhow::Error> {
        sqlx::query_as::<_, UserSession>(
            "SELECT * FROM user_sessions WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list sessions: {}", e))
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow::anyhow!("Database health check failed: {}", e))?;
        Ok(())
    }
}

/// In-memory store for tests and local development without Postgres.
#[derive(Default)]
pub struct MemorySessionStore {
    pub sessions: std::sync::Mutex<std::collections::HashMap<String, UserSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: UserSession) {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.session_id.clone(), session);
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<UserSession>, anyhow::Error> {
        Ok(self.sessions.lock().unwrap().get(session_id).cloned())
    }

    async fn create(&self, session: NewUserSession) -> Result<(), anyhow::Error> {
        let now = Utc::now();
        let record = UserSession {
            session_id: session.session_id.clone(),
            user_id: session.user_id,
            ip_address: session.ip_address,
            user_agent: session.user_agent,
            csrf_token: None,
            csrf_signature: None,
            created_at: now,
            last_activity_at: session.last_activity_at,
            expires_at: session.expires_at,
            revoked_at: None,
        };
        self.sessions
            .lock()
            .unwrap()
            .entry(session.session_id)
            .or_insert(record);
        Ok(())
    }

    async fn update_activity(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), anyhow::Error> {
        if let Some(s) = self.sessions.lock().unwrap().get_mut(session_id) {
            s.last_activity_at = now;
        }
        Ok(())
    }

    async fn set_csrf(
        &self,
        session_id: &str,
        token: &str,
        signature: &str,
    ) -> Result<(), anyhow::Error> {
        if let Some(s) = self.sessions.lock().unwrap().get_mut(session_id) {
            s.csrf_token = Some(token.to_string());
            s.csrf_signature = Some(signature.to_string());
        }
        Ok(())
    }

    async fn revoke(&self, session_id: &str, now: DateTime<Utc>) -> Result<bool, anyhow::Error> {
        if let Some(s) = self.sessions.lock().unwrap().get_mut(session_id) {
            if s.revoked_at.is_none() {
                s.revoked_at = Some(now);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn revoke_all_for_user(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
        except_session_id: Option<&str>,
    ) -> Result<u64, anyhow::Error> {
        let mut revoked = 0;
        for s in self.sessions.lock().unwrap().values_mut() {
            if s.user_id == user_id
                && s.revoked_at.is_none()
                && except_session_id != Some(s.session_id.as_str())
            {
                s.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<UserSession>, anyhow::Error> {
        let mut sessions: Vec<UserSession> = self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}
