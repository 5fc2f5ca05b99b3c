/// Session record
///
/// A session is owned by exactly one user for its lifetime and is valid iff
/// `now < expires_at` and the owning user still exists. The id is an opaque
/// unguessable string handed to the HTTP layer as the client credential.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE sessions (
///     id TEXT PRIMARY KEY,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     remember BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     expires_at TIMESTAMPTZ NOT NULL
/// );
/// ```
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An active session.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    /// Opaque session id (`sess_` + 32 base62 chars)
    pub id: String,

    /// Owning user
    pub user_id: Uuid,

    /// Whether the "remember me" expiry policy applies
    pub remember: bool,

    /// When the session was issued
    pub created_at: DateTime<Utc>,

    /// When the session stops validating
    pub expires_at: DateTime<Utc>,
}

/// Input for creating a session.
#[derive(Debug, Clone)]
pub struct CreateSession {
    /// Pre-generated opaque id (see [`crate::auth::token::generate_session_id`])
    pub id: String,

    /// Owning user
    pub user_id: Uuid,

    /// "Remember me" flag, recorded so sliding refresh can reuse the
    /// matching expiry duration
    pub remember: bool,

    /// Initial expiry
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session has passed its expiry instant.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
