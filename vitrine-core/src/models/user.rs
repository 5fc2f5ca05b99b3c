/// User account record
///
/// Users are the owning entity for sessions and verification tokens.
/// Deleting a user cascade-invalidates both (enforced by the store).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email CITEXT NOT NULL UNIQUE,
///     email_verified BOOLEAN NOT NULL DEFAULT FALSE,
///     password_hash VARCHAR(255),
///     name VARCHAR(255),
///     image VARCHAR(512),
///     is_admin BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user account.
///
/// `password_hash` is nullable: admin-created accounts may start without a
/// password, and such accounts cannot complete password sign-in until one
/// is set. Hashes are Argon2id PHC strings, never plaintext.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID (UUID v4)
    pub id: Uuid,

    /// Email address (case-insensitive, unique across all users)
    pub email: String,

    /// Whether the email address has been verified
    pub email_verified: bool,

    /// Argon2id password hash, if a password has ever been set
    pub password_hash: Option<String>,

    /// Optional display name
    pub name: Option<String>,

    /// Optional avatar/profile picture URL
    pub image: Option<String>,

    /// Whether the user may pass the admin authorization gate
    pub is_admin: bool,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    /// Email address (stored case-insensitively)
    pub email: String,

    /// Argon2id password hash — NOT a plaintext password
    pub password_hash: Option<String>,

    /// Optional display name
    pub name: Option<String>,

    /// Optional avatar URL
    pub image: Option<String>,

    /// Admin flag (defaults to false everywhere except admin tooling)
    pub is_admin: bool,

    /// Initial verification state (false for self-service sign-up)
    pub email_verified: bool,
}

/// Input for updating an existing user.
///
/// Only non-None fields are written. Double-Option fields distinguish
/// "leave unchanged" (`None`) from "clear" (`Some(None)`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    /// New email address
    pub email: Option<String>,

    /// New password hash (passwords are set, never cleared)
    pub password_hash: Option<String>,

    /// New display name (`Some(None)` clears it)
    pub name: Option<Option<String>>,

    /// New avatar URL (`Some(None)` clears it)
    pub image: Option<Option<String>>,

    /// New verification state
    pub email_verified: Option<bool>,

    /// New admin flag
    pub is_admin: Option<bool>,
}

impl User {
    /// Whether password-based sign-in is possible for this account.
    ///
    /// Accounts created by an admin without a password have no hash and
    /// must go through the password-reset flow first.
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_user_default_changes_nothing() {
        let update = UpdateUser::default();
        assert!(update.email.is_none());
        assert!(update.password_hash.is_none());
        assert!(update.name.is_none());
        assert!(update.image.is_none());
        assert!(update.email_verified.is_none());
        assert!(update.is_admin.is_none());
    }

    #[test]
    fn test_has_password() {
        let user = User {
            id: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            email_verified: false,
            password_hash: None,
            name: None,
            image: None,
            is_admin: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(!user.has_password());

        let with_hash = User {
            password_hash: Some("$argon2id$...".to_string()),
            ..user
        };
        assert!(with_hash.has_password());
    }
}
