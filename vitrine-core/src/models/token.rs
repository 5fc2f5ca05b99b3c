/// Verification token record
///
/// One table serves both email verification and password reset, tagged by
/// purpose. Tokens are single-use: once `consumed` flips to true the token
/// never validates again, even before expiry. Only the SHA-256 digest of
/// the raw token is stored, so a database leak does not leak live links.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE verification_tokens (
///     token_hash TEXT PRIMARY KEY,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     purpose TEXT NOT NULL,
///     consumed BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     expires_at TIMESTAMPTZ NOT NULL
/// );
/// ```
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a verification token is allowed to prove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    /// Confirms ownership of the account's email address
    EmailVerify,

    /// Authorizes a password reset
    PasswordReset,
}

impl TokenPurpose {
    /// Stable string form used in the database `purpose` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::EmailVerify => "email_verify",
            TokenPurpose::PasswordReset => "password_reset",
        }
    }

    /// Parses the database string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email_verify" => Some(TokenPurpose::EmailVerify),
            "password_reset" => Some(TokenPurpose::PasswordReset),
            _ => None,
        }
    }
}

impl std::fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored verification token (digest form — the raw value is only ever
/// held by the email recipient).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationToken {
    /// SHA-256 hex digest of the raw token
    pub token_hash: String,

    /// Owning user
    pub user_id: Uuid,

    /// Purpose tag
    pub purpose: TokenPurpose,

    /// Single-use flag; flipped exactly once by a successful consume
    pub consumed: bool,

    /// When the token was issued
    pub created_at: DateTime<Utc>,

    /// When the token stops validating
    pub expires_at: DateTime<Utc>,
}

/// Input for persisting a freshly issued token.
#[derive(Debug, Clone)]
pub struct CreateToken {
    /// SHA-256 hex digest of the raw token
    pub token_hash: String,

    /// Owning user
    pub user_id: Uuid,

    /// Purpose tag
    pub purpose: TokenPurpose,

    /// Expiry instant (`now + ttl` at issue time)
    pub expires_at: DateTime<Utc>,
}

impl VerificationToken {
    /// Whether the token has passed its expiry instant.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
