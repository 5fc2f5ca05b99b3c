/// Opaque credential generation and the verification token issuer
///
/// # Format
///
/// - Session ids: `sess_{32 base62 chars}`
/// - Verification tokens: `tok_{32 base62 chars}`
///
/// The random part carries 62^32 ≈ 2^190 combinations — comfortably past
/// the 128-bit unguessability floor. Values carry no decodable structure;
/// validity is determined solely by store lookup.
///
/// Verification tokens are hashed with SHA-256 before storage and looked up
/// by digest, so the table never holds a usable credential.
///
/// # Example
///
/// ```
/// use vitrine_core::auth::token::{generate_token, hash_token, generate_session_id};
///
/// let (raw, digest) = generate_token();
/// assert!(raw.starts_with("tok_"));
/// assert_eq!(digest, hash_token(&raw));
/// assert_eq!(digest.len(), 64); // SHA-256 hex
///
/// let session_id = generate_session_id();
/// assert!(session_id.starts_with("sess_"));
/// ```
use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{CreateToken, TokenPurpose, VerificationToken};
use crate::store::{StoreError, TokenStore};

/// Length of the random part of an opaque credential (characters)
const SECRET_RANDOM_LENGTH: usize = 32;

/// Prefix for session ids
const SESSION_PREFIX: &str = "sess_";

/// Prefix for verification/reset tokens
const TOKEN_PREFIX: &str = "tok_";

/// Error type for token issuance and consumption
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// No token with this value exists (or it was superseded or cascaded
    /// away with its user)
    #[error("token not found")]
    NotFound,

    /// The token's expiry instant has passed
    #[error("token expired")]
    Expired,

    /// The token was already consumed; single-use means it never validates
    /// again
    #[error("token already used")]
    AlreadyUsed,

    /// Store failure underneath the issuer
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Generates a random base62 string using the thread CSPRNG.
fn generate_random_string(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();

    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Generates a fresh verification token.
///
/// Returns `(raw, digest)`: the raw value goes into the email link, the
/// digest into the store.
pub fn generate_token() -> (String, String) {
    let raw = format!("{}{}", TOKEN_PREFIX, generate_random_string(SECRET_RANDOM_LENGTH));
    let digest = hash_token(&raw);

    (raw, digest)
}

/// Hashes a raw token to its hex SHA-256 digest (the store key).
pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Generates an opaque session id.
pub fn generate_session_id() -> String {
    format!(
        "{}{}",
        SESSION_PREFIX,
        generate_random_string(SECRET_RANDOM_LENGTH)
    )
}

/// A freshly issued token: the raw value for the outgoing email plus the
/// persisted record.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub raw: String,
    pub record: VerificationToken,
}

/// Issues and consumes time-bounded single-use verification tokens.
pub struct TokenIssuer {
    store: Arc<dyn TokenStore>,
}

impl TokenIssuer {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Issues a token for `(user_id, purpose)` expiring at `now + ttl`.
    ///
    /// Older unconsumed tokens for the same pair are superseded (deleted),
    /// so re-requesting a verification or reset email always succeeds and
    /// only the newest link works.
    pub async fn issue(
        &self,
        user_id: Uuid,
        purpose: TokenPurpose,
        ttl: Duration,
    ) -> Result<IssuedToken, TokenError> {
        self.store.delete_pending(user_id, purpose).await?;

        let (raw, digest) = generate_token();
        let record = self
            .store
            .insert(CreateToken {
                token_hash: digest,
                user_id,
                purpose,
                expires_at: Utc::now() + ttl,
            })
            .await?;

        tracing::debug!(user_id = %user_id, purpose = %purpose, "verification token issued");

        Ok(IssuedToken { raw, record })
    }

    /// Consumes a raw token, returning the owning user id.
    ///
    /// # Errors
    ///
    /// - [`TokenError::NotFound`] — no such token for this purpose
    /// - [`TokenError::Expired`] — `now >= expires_at`, consumed or not
    /// - [`TokenError::AlreadyUsed`] — the single-use flag was already set
    ///
    /// Consumption is atomic: the store flips `consumed` with one
    /// conditional update, so concurrent calls on the same token yield
    /// exactly one success and the rest `AlreadyUsed`.
    pub async fn consume(&self, raw: &str, purpose: TokenPurpose) -> Result<Uuid, TokenError> {
        let digest = hash_token(raw);

        let token = self
            .store
            .find_by_hash(&digest, purpose)
            .await?
            .ok_or(TokenError::NotFound)?;

        if token.is_expired(Utc::now()) {
            return Err(TokenError::Expired);
        }

        match self.store.mark_consumed(&digest, purpose).await? {
            Some(user_id) => {
                tracing::debug!(user_id = %user_id, purpose = %purpose, "verification token consumed");
                Ok(user_id)
            }
            // Lost the race (or the token was consumed between lookup and
            // update) — the flag was already set.
            None => Err(TokenError::AlreadyUsed),
        }
    }

    /// Deletes expired and consumed tokens; returns how many.
    pub async fn purge_expired(
        &self,
        now: chrono::DateTime<Utc>,
    ) -> Result<u64, TokenError> {
        Ok(self.store.purge_expired(now).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreateUser;
    use crate::store::{MemoryStore, UserStore};

    async fn issuer_with_user() -> (TokenIssuer, Uuid, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let user = UserStore::create(
            store.as_ref(),
            CreateUser {
                email: "tokens@example.com".to_string(),
                password_hash: None,
                name: None,
                image: None,
                is_admin: false,
                email_verified: false,
            },
        )
        .await
        .unwrap();

        (TokenIssuer::new(store.clone()), user.id, store)
    }

    #[test]
    fn test_generate_token_format() {
        let (raw1, digest1) = generate_token();
        let (raw2, digest2) = generate_token();

        assert!(raw1.starts_with("tok_"));
        assert_eq!(raw1.len(), "tok_".len() + SECRET_RANDOM_LENGTH);
        assert!(raw1["tok_".len()..].chars().all(|c| c.is_ascii_alphanumeric()));

        assert_ne!(raw1, raw2);
        assert_ne!(digest1, digest2);
        assert_eq!(digest1.len(), 64);
    }

    #[test]
    fn test_hash_token_deterministic() {
        let digest1 = hash_token("tok_fixture");
        let digest2 = hash_token("tok_fixture");
        assert_eq!(digest1, digest2);

        assert_ne!(digest1, hash_token("tok_other"));
    }

    #[test]
    fn test_generate_session_id_format() {
        let id = generate_session_id();
        assert!(id.starts_with("sess_"));
        assert_eq!(id.len(), "sess_".len() + SECRET_RANDOM_LENGTH);
        assert_ne!(id, generate_session_id());
    }

    #[tokio::test]
    async fn test_issue_and_consume_roundtrip() {
        let (issuer, user_id, _store) = issuer_with_user().await;

        let issued = issuer
            .issue(user_id, TokenPurpose::EmailVerify, Duration::hours(1))
            .await
            .unwrap();

        let consumed_user = issuer
            .consume(&issued.raw, TokenPurpose::EmailVerify)
            .await
            .unwrap();
        assert_eq!(consumed_user, user_id);
    }

    #[tokio::test]
    async fn test_consume_is_single_use() {
        let (issuer, user_id, _store) = issuer_with_user().await;

        let issued = issuer
            .issue(user_id, TokenPurpose::PasswordReset, Duration::hours(1))
            .await
            .unwrap();

        issuer
            .consume(&issued.raw, TokenPurpose::PasswordReset)
            .await
            .unwrap();

        let err = issuer
            .consume(&issued.raw, TokenPurpose::PasswordReset)
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::AlreadyUsed));
    }

    #[tokio::test]
    async fn test_consume_expired_token() {
        let (issuer, user_id, _store) = issuer_with_user().await;

        // Zero TTL: expires_at == now at issue, so now >= expires_at holds.
        let issued = issuer
            .issue(user_id, TokenPurpose::EmailVerify, Duration::zero())
            .await
            .unwrap();

        let err = issuer
            .consume(&issued.raw, TokenPurpose::EmailVerify)
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::Expired));
    }

    #[tokio::test]
    async fn test_consume_unknown_token() {
        let (issuer, _user_id, _store) = issuer_with_user().await;

        let err = issuer
            .consume("tok_never_issued_0000000000000000", TokenPurpose::EmailVerify)
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::NotFound));
    }

    #[tokio::test]
    async fn test_consume_wrong_purpose() {
        let (issuer, user_id, _store) = issuer_with_user().await;

        let issued = issuer
            .issue(user_id, TokenPurpose::EmailVerify, Duration::hours(1))
            .await
            .unwrap();

        // A verify link cannot authorize a password reset.
        let err = issuer
            .consume(&issued.raw, TokenPurpose::PasswordReset)
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::NotFound));
    }

    #[tokio::test]
    async fn test_reissue_supersedes_pending_token() {
        let (issuer, user_id, _store) = issuer_with_user().await;

        let first = issuer
            .issue(user_id, TokenPurpose::EmailVerify, Duration::hours(1))
            .await
            .unwrap();
        let second = issuer
            .issue(user_id, TokenPurpose::EmailVerify, Duration::hours(1))
            .await
            .unwrap();

        // Only the newest link is live.
        let err = issuer
            .consume(&first.raw, TokenPurpose::EmailVerify)
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::NotFound));

        issuer
            .consume(&second.raw, TokenPurpose::EmailVerify)
            .await
            .unwrap();
    }
}
