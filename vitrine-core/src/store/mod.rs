/// Persistence boundaries for the credential core
///
/// The auth state machine only ever talks to these traits. Two backends
/// ship: [`postgres`] (production, sqlx over a shared pool) and [`memory`]
/// (tests and local development, one mutex-guarded state so user deletion
/// cascades exactly like the database foreign keys do).
///
/// Conflicting writes are serialized by the backing store's own
/// mechanisms — the unique email index and the conditional consume
/// update — never by application-level locks.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    CreateSession, CreateToken, CreateUser, Session, TokenPurpose, UpdateUser, User,
    VerificationToken,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::{PgSessionStore, PgTokenStore, PgUserStore};

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The email is already owned by another user
    #[error("email address is already in use")]
    EmailConflict,

    /// Backend failure (connection, constraint other than email, decode)
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// User persistence boundary.
///
/// `create` and `update` fail with [`StoreError::EmailConflict`] when the
/// email already belongs to a different user. `delete` cascade-invalidates
/// the user's sessions and pending verification tokens.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, data: CreateUser) -> Result<User, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Case-insensitive email lookup.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Applies the non-None fields of `data`; returns None if the user does
    /// not exist.
    async fn update(&self, id: Uuid, data: UpdateUser) -> Result<Option<User>, StoreError>;

    /// Returns true if a user was deleted. Sessions and tokens owned by the
    /// user are destroyed with it.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Lists users newest-first, for the admin screens.
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;
}

/// Session persistence boundary.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, data: CreateSession) -> Result<Session, StoreError>;

    async fn find(&self, id: &str) -> Result<Option<Session>, StoreError>;

    /// Moves `expires_at` forward; returns false if the session is gone.
    async fn extend(&self, id: &str, expires_at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Returns true if a session was deleted. Deleting an absent session is
    /// not an error — sign-out is idempotent.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// Destroys every session owned by `user_id`; returns how many.
    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, StoreError>;

    /// Deletes sessions whose expiry has passed; returns how many.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Verification token persistence boundary (consumed by
/// [`crate::auth::token::TokenIssuer`]).
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert(&self, data: CreateToken) -> Result<VerificationToken, StoreError>;

    async fn find_by_hash(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
    ) -> Result<Option<VerificationToken>, StoreError>;

    /// Atomically flips `consumed` from false to true and returns the
    /// owning user id, or None if the flag was already set (or the token
    /// is absent). This is a single conditional update: under concurrent
    /// consumes exactly one caller receives `Some`.
    async fn mark_consumed(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
    ) -> Result<Option<Uuid>, StoreError>;

    /// Deletes unconsumed tokens for a (user, purpose) pair, so re-issuing
    /// supersedes older links; returns how many.
    async fn delete_pending(
        &self,
        user_id: Uuid,
        purpose: TokenPurpose,
    ) -> Result<u64, StoreError>;

    /// Destroys every token owned by `user_id`; returns how many.
    async fn delete_for_user(&self, user_id: Uuid) -> Result<u64, StoreError>;

    /// Deletes tokens that are expired or already consumed; returns how many.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}
