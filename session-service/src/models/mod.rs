//! Session record model.
//!
//! One row per authenticated login instance. Records are only ever
//! created, touched (activity), and revoked; retention/cleanup is left to
//! store-level policy.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

/// A tracked user session.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct UserSession {
    /// Opaque session identifier issued by the identity layer.
    pub session_id: String,

    /// Owning user.
    pub user_id: i64,

    /// Captured at creation, informational only.
    pub ip_address: Option<String>,

    /// Captured at creation, informational only.
    pub user_agent: Option<String>,

    /// Most recently issued CSRF token for this session.
    pub csrf_token: Option<String>,

    /// HMAC signature binding `csrf_token` to `session_id`.
    pub csrf_signature: Option<String>,

    pub created_at: DateTime<Utc>,

    /// Updated on every accepted request.
    pub last_activity_at: DateTime<Utc>,

    /// Fixed absolute deadline set at creation (not sliding).
    pub expires_at: DateTime<Utc>,

    /// Once set, permanent; there is no un-revoke.
    pub revoked_at: Option<DateTime<Utc>>,
}

impl UserSession {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Valid iff not revoked and not past the absolute deadline. Evaluated
    /// fresh on every request; never cached.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && !self.is_expired(now)
    }
}

/// Data required to register a new session record.
#[derive(Debug, Clone)]
pub struct NewUserSession {
    pub session_id: String,
    pub user_id: i64,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
