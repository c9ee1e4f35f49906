//! CSRF token issuance and validation against the session record.

use service_core::error::AppError;
use service_core::utils::signature;
use std::future::Future;
use std::sync::Arc;

use crate::services::store::SessionStore;

/// Session id used to sign tokens issued before any session exists.
/// Such tokens protect nothing of value and will never validate against a
/// real session, but issuance must not fail for anonymous visitors.
pub const ANONYMOUS_SESSION_ID: &str = "anonymous";

#[derive(Clone)]
pub struct CsrfService {
    secret: Arc<Vec<u8>>,
    store: Arc<dyn SessionStore>,
    store_timeout: std::time::Duration,
}

impl CsrfService {
    pub fn new(secret: &str, store: Arc<dyn SessionStore>, store_timeout_ms: u64) -> Self {
        Self {
            secret: Arc::new(secret.as_bytes().to_vec()),
            store,
            store_timeout: std::time::Duration::from_millis(store_timeout_ms),
        }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, anyhow::Error>
    where
        F: Future<Output = Result<T, anyhow::Error>>,
    {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!("Session store call timed out")),
        }
    }

    /// Issue a fresh token bound to the given session, overwriting any
    /// previously stored pair for that session, and return the raw token
    /// for embedding in the response.
    pub async fn issue(&self, session_id: Option<&str>) -> Result<String, AppError> {
        let token = signature::generate_token();

        match session_id {
            Some(sid) => {
                let sig = signature::sign(&self.secret, &token, sid);
                self.bounded(self.store.set_csrf(sid, &token, &sig))
                    .await
                    .map_err(AppError::StoreUnavailable)?;
            }
            None => {
                // Nothing to persist for an anonymous visitor; the token is
                // still well-formed so response embedding works.
                let _ = signature::sign(&self.secret, &token, ANONYMOUS_SESSION_ID);
            }
        }

        Ok(token)
    }

    /// Check a presented token against the signature stored for the
    /// session. Store failures surface as `StoreUnavailable`: an
    /// unverifiable state-changing request is rejected, not waved through.
    pub async fn validate(&self, presented: &str, session_id: &str) -> Result<bool, AppError> {
        let session = self
            .bounded(self.store.get(session_id))
            .await
            .map_err(AppError::StoreUnavailable)?;

        let Some(stored_signature) = session.and_then(|s| s.csrf_signature) else {
            return Ok(false);
        };

        Ok(signature::verify(
            &self.secret,
            presented,
            &stored_signature,
            session_id,
        ))
    }
}
