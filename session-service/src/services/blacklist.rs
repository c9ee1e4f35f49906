//! Lower-level session termination.
//!
//! The identity layer hands out bearer tokens tied to a session id; once a
//! session record is revoked the token itself must stop working too.
//! Terminated session ids are held in Redis until the token would have
//! expired anyway.

use async_trait::async_trait;
use redis::{Client, aio::ConnectionManager};

#[async_trait]
pub trait SessionBlacklist: Send + Sync {
    /// Terminate the underlying authenticated session. `expiry_seconds`
    /// should cover the remaining bearer-token lifetime.
    async fn blacklist_session(
        &self,
        session_id: &str,
        expiry_seconds: i64,
    ) -> Result<(), anyhow::Error>;

    async fn is_blacklisted(&self, session_id: &str) -> Result<bool, anyhow::Error>;

    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

#[derive(Clone)]
pub struct RedisService {
    _client: Client,
    manager: ConnectionManager,
}

impl RedisService {
    pub async fn new(config: &crate::config::RedisConfig) -> Result<Self, anyhow::Error> {
        tracing::info!(url = %config.url, "Connecting to Redis");
        let client = Client::open(config.url.clone())?;

        // ConnectionManager reconnects automatically
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            _client: client,
            manager,
        })
    }
}

#[async_trait]
impl SessionBlacklist for RedisService {
    async fn blacklist_session(
        &self,
        session_id: &str,
        expiry_seconds: i64,
    ) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        let key = format!("terminated:{}", session_id);

        redis::cmd("SET")
            .arg(&key)
            .arg("revoked")
            .arg("EX")
            .arg(expiry_seconds.max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to blacklist session: {}", e))
    }

    async fn is_blacklisted(&self, session_id: &str) -> Result<bool, anyhow::Error> {
        let mut conn = self.manager.clone();
        let key = format!("terminated:{}", session_id);

        let exists: bool = redis::cmd("EXISTS")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to check blacklist: {}", e))?;

        Ok(exists)
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Redis health check failed: {}", e))
    }
}

/// In-memory blacklist for tests.
#[derive(Default)]
pub struct MemoryBlacklist {
    pub blacklisted: std::sync::Mutex<std::collections::HashSet<String>>,
}

impl MemoryBlacklist {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionBlacklist for MemoryBlacklist {
    async fn blacklist_session(
        &self,
        session_id: &str,
        _expiry_seconds: i64,
    ) -> Result<(), anyhow::Error> {
        self.blacklisted
            .lock()
            .unwrap()
            .insert(session_id.to_string());
        Ok(())
    }

    async fn is_blacklisted(&self, session_id: &str) -> Result<bool, anyhow::Error> {
        Ok(self.blacklisted.lock().unwrap().contains(session_id))
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}
