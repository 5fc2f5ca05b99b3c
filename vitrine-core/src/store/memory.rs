/// In-memory store implementation
///
/// One [`MemoryStore`] implements all three persistence boundaries over a
/// single mutex-guarded state, so deleting a user drops their sessions and
/// tokens in the same critical section — the same cascade the PostgreSQL
/// foreign keys provide. Intended for tests and local development; clone an
/// `Arc<MemoryStore>` once per boundary when wiring the auth service.
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    CreateSession, CreateToken, CreateUser, Session, TokenPurpose, UpdateUser, User,
    VerificationToken,
};

use super::{SessionStore, StoreError, TokenStore, UserStore};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    sessions: HashMap<String, Session>,
    /// Keyed by token digest, like the database primary key.
    tokens: HashMap<String, VerificationToken>,
}

impl State {
    fn email_taken(&self, email: &str, exclude: Option<Uuid>) -> bool {
        self.users.values().any(|u| {
            u.email.eq_ignore_ascii_case(email) && exclude.map_or(true, |id| u.id != id)
        })
    }
}

/// Mutex-guarded backend for every store trait.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("memory store mutex poisoned")
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, data: CreateUser) -> Result<User, StoreError> {
        let mut state = self.lock();

        if state.email_taken(&data.email, None) {
            return Err(StoreError::EmailConflict);
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: data.email,
            email_verified: data.email_verified,
            password_hash: data.password_hash,
            name: data.name,
            image: data.image,
            is_admin: data.is_admin,
            created_at: now,
            updated_at: now,
        };

        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn update(&self, id: Uuid, data: UpdateUser) -> Result<Option<User>, StoreError> {
        let mut state = self.lock();

        if !state.users.contains_key(&id) {
            return Ok(None);
        }

        if let Some(ref email) = data.email {
            if state.email_taken(email, Some(id)) {
                return Err(StoreError::EmailConflict);
            }
        }

        let Some(user) = state.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(email) = data.email {
            user.email = email;
        }
        if let Some(password_hash) = data.password_hash {
            user.password_hash = Some(password_hash);
        }
        if let Some(name) = data.name {
            user.name = name;
        }
        if let Some(image) = data.image {
            user.image = image;
        }
        if let Some(email_verified) = data.email_verified {
            user.email_verified = email_verified;
        }
        if let Some(is_admin) = data.is_admin {
            user.is_admin = is_admin;
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.lock();

        let existed = state.users.remove(&id).is_some();
        if existed {
            // Mirror the database cascade.
            state.sessions.retain(|_, s| s.user_id != id);
            state.tokens.retain(|_, t| t.user_id != id);
        }

        Ok(existed)
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, StoreError> {
        let state = self.lock();

        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(users
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.lock().users.len() as i64)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create(&self, data: CreateSession) -> Result<Session, StoreError> {
        let session = Session {
            id: data.id,
            user_id: data.user_id,
            remember: data.remember,
            created_at: Utc::now(),
            expires_at: data.expires_at,
        };

        self.lock()
            .sessions
            .insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn find(&self, id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.lock().sessions.get(id).cloned())
    }

    async fn extend(&self, id: &str, expires_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut state = self.lock();

        match state.sessions.get_mut(id) {
            Some(session) => {
                session.expires_at = expires_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.lock().sessions.remove(id).is_some())
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let mut state = self.lock();

        let before = state.sessions.len();
        state.sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - state.sessions.len()) as u64)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.lock();

        let before = state.sessions.len();
        state.sessions.retain(|_, s| !s.is_expired(now));
        Ok((before - state.sessions.len()) as u64)
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert(&self, data: CreateToken) -> Result<VerificationToken, StoreError> {
        let token = VerificationToken {
            token_hash: data.token_hash,
            user_id: data.user_id,
            purpose: data.purpose,
            consumed: false,
            created_at: Utc::now(),
            expires_at: data.expires_at,
        };

        self.lock()
            .tokens
            .insert(token.token_hash.clone(), token.clone());
        Ok(token)
    }

    async fn find_by_hash(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
    ) -> Result<Option<VerificationToken>, StoreError> {
        Ok(self
            .lock()
            .tokens
            .get(token_hash)
            .filter(|t| t.purpose == purpose)
            .cloned())
    }

    async fn mark_consumed(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
    ) -> Result<Option<Uuid>, StoreError> {
        let mut state = self.lock();

        // Check-and-set under the lock, like the conditional UPDATE.
        match state.tokens.get_mut(token_hash) {
            Some(token) if token.purpose == purpose && !token.consumed => {
                token.consumed = true;
                Ok(Some(token.user_id))
            }
            _ => Ok(None),
        }
    }

    async fn delete_pending(
        &self,
        user_id: Uuid,
        purpose: TokenPurpose,
    ) -> Result<u64, StoreError> {
        let mut state = self.lock();

        let before = state.tokens.len();
        state
            .tokens
            .retain(|_, t| !(t.user_id == user_id && t.purpose == purpose && !t.consumed));
        Ok((before - state.tokens.len()) as u64)
    }

    async fn delete_for_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let mut state = self.lock();

        let before = state.tokens.len();
        state.tokens.retain(|_, t| t.user_id != user_id);
        Ok((before - state.tokens.len()) as u64)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.lock();

        let before = state.tokens.len();
        state.tokens.retain(|_, t| !t.is_expired(now) && !t.consumed);
        Ok((before - state.tokens.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_user(email: &str) -> CreateUser {
        CreateUser {
            email: email.to_string(),
            password_hash: Some("$argon2id$stub".to_string()),
            name: None,
            image: None,
            is_admin: false,
            email_verified: false,
        }
    }

    #[tokio::test]
    async fn test_email_conflict_is_case_insensitive() {
        let store = MemoryStore::new();

        UserStore::create(&store, create_user("shop@example.com"))
            .await
            .unwrap();

        let err = UserStore::create(&store, create_user("Shop@Example.COM"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::EmailConflict));
    }

    #[tokio::test]
    async fn test_update_rejects_email_owned_by_other_user() {
        let store = MemoryStore::new();

        UserStore::create(&store, create_user("first@example.com"))
            .await
            .unwrap();
        let second = UserStore::create(&store, create_user("second@example.com"))
            .await
            .unwrap();

        let err = store
            .update(
                second.id,
                UpdateUser {
                    email: Some("first@example.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::EmailConflict));

        // Re-writing your own email is not a conflict.
        let updated = store
            .update(
                second.id,
                UpdateUser {
                    email: Some("second@example.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.is_some());
    }

    #[tokio::test]
    async fn test_delete_user_cascades_sessions_and_tokens() {
        let store = MemoryStore::new();

        let user = UserStore::create(&store, create_user("owner@example.com"))
            .await
            .unwrap();

        SessionStore::create(
            &store,
            CreateSession {
                id: "sess_abc".to_string(),
                user_id: user.id,
                remember: false,
                expires_at: Utc::now() + Duration::hours(1),
            },
        )
        .await
        .unwrap();

        TokenStore::insert(
            &store,
            CreateToken {
                token_hash: "digest".to_string(),
                user_id: user.id,
                purpose: TokenPurpose::EmailVerify,
                expires_at: Utc::now() + Duration::hours(1),
            },
        )
        .await
        .unwrap();

        assert!(UserStore::delete(&store, user.id).await.unwrap());
        assert!(SessionStore::find(&store, "sess_abc").await.unwrap().is_none());
        assert!(store
            .find_by_hash("digest", TokenPurpose::EmailVerify)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_mark_consumed_flips_exactly_once() {
        let store = MemoryStore::new();

        let user = UserStore::create(&store, create_user("once@example.com"))
            .await
            .unwrap();
        TokenStore::insert(
            &store,
            CreateToken {
                token_hash: "digest".to_string(),
                user_id: user.id,
                purpose: TokenPurpose::PasswordReset,
                expires_at: Utc::now() + Duration::hours(1),
            },
        )
        .await
        .unwrap();

        let first = store
            .mark_consumed("digest", TokenPurpose::PasswordReset)
            .await
            .unwrap();
        assert_eq!(first, Some(user.id));

        let second = store
            .mark_consumed("digest", TokenPurpose::PasswordReset)
            .await
            .unwrap();
        assert_eq!(second, None);
    }

    #[tokio::test]
    async fn test_purge_expired_sessions() {
        let store = MemoryStore::new();
        let user = UserStore::create(&store, create_user("purge@example.com"))
            .await
            .unwrap();

        let now = Utc::now();
        for (id, offset) in [("sess_old", -1i64), ("sess_live", 1)] {
            SessionStore::create(
                &store,
                CreateSession {
                    id: id.to_string(),
                    user_id: user.id,
                    remember: false,
                    expires_at: now + Duration::hours(offset),
                },
            )
            .await
            .unwrap();
        }

        let purged = SessionStore::purge_expired(&store, now).await.unwrap();
        assert_eq!(purged, 1);
        assert!(SessionStore::find(&store, "sess_live").await.unwrap().is_some());
    }
}
