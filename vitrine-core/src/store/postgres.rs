/// PostgreSQL store implementations
///
/// All three boundaries run over one shared [`PgPool`]. Email uniqueness
/// rides on the `users_email_key` unique index (CITEXT, so lookups and
/// conflicts are case-insensitive), cascade invalidation on the
/// `ON DELETE CASCADE` foreign keys, and single-use token consumption on a
/// conditional `UPDATE ... WHERE consumed = FALSE`.
///
/// Integration tests for this module live in `tests/pg_store_tests.rs` and
/// require a provisioned `DATABASE_URL`.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    CreateSession, CreateToken, CreateUser, Session, TokenPurpose, UpdateUser, User,
    VerificationToken,
};

use super::{SessionStore, StoreError, TokenStore, UserStore};

const USER_COLUMNS: &str =
    "id, email, email_verified, password_hash, name, image, is_admin, created_at, updated_at";

/// Maps unique-constraint violations on the email index to
/// [`StoreError::EmailConflict`]; everything else stays a database error.
fn map_user_write_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.constraint().is_some_and(|c| c.contains("email")) {
            return StoreError::EmailConflict;
        }
    }
    StoreError::Database(err)
}

/// User store backed by the `users` table.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, data: CreateUser) -> Result<User, StoreError> {
        let query = format!(
            r#"
            INSERT INTO users (email, password_hash, name, image, is_admin, email_verified)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        );

        let user = sqlx::query_as::<_, User>(&query)
            .bind(data.email)
            .bind(data.password_hash)
            .bind(data.name)
            .bind(data.image)
            .bind(data.is_admin)
            .bind(data.email_verified)
            .fetch_one(&self.pool)
            .await
            .map_err(map_user_write_error)?;

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");

        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn update(&self, id: Uuid, data: UpdateUser) -> Result<Option<User>, StoreError> {
        // Build the update statement from the fields that are present.
        let mut query = String::from("UPDATE users SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.email.is_some() {
            bind_count += 1;
            query.push_str(&format!(", email = ${bind_count}"));
        }
        if data.password_hash.is_some() {
            bind_count += 1;
            query.push_str(&format!(", password_hash = ${bind_count}"));
        }
        if data.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${bind_count}"));
        }
        if data.image.is_some() {
            bind_count += 1;
            query.push_str(&format!(", image = ${bind_count}"));
        }
        if data.email_verified.is_some() {
            bind_count += 1;
            query.push_str(&format!(", email_verified = ${bind_count}"));
        }
        if data.is_admin.is_some() {
            bind_count += 1;
            query.push_str(&format!(", is_admin = ${bind_count}"));
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {USER_COLUMNS}"));

        let mut q = sqlx::query_as::<_, User>(&query).bind(id);

        if let Some(email) = data.email {
            q = q.bind(email);
        }
        if let Some(password_hash) = data.password_hash {
            q = q.bind(password_hash);
        }
        if let Some(name_opt) = data.name {
            q = q.bind(name_opt);
        }
        if let Some(image_opt) = data.image {
            q = q.bind(image_opt);
        }
        if let Some(verified) = data.email_verified {
            q = q.bind(verified);
        }
        if let Some(is_admin) = data.is_admin {
            q = q.bind(is_admin);
        }

        let user = q
            .fetch_optional(&self.pool)
            .await
            .map_err(map_user_write_error)?;

        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        // Sessions and verification tokens go with the user via the
        // ON DELETE CASCADE foreign keys.
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, StoreError> {
        let query = format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#
        );

        let users = sqlx::query_as::<_, User>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Session store backed by the `sessions` table.
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
    async fn create(&self, data: CreateSession) -> Result<Session, StoreError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (id, user_id, remember, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, remember, created_at, expires_at
            "#,
        )
        .bind(data.id)
        .bind(data.user_id)
        .bind(data.remember)
        .bind(data.expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    async fn find(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, remember, created_at, expires_at
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn extend(&self, id: &str, expires_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE sessions SET expires_at = $2 WHERE id = $1")
            .bind(id)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// Verification token store backed by the `verification_tokens` table.
#[derive(Clone)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Raw row shape; `purpose` is a TEXT column decoded manually.
#[derive(sqlx::FromRow)]
struct TokenRow {
    token_hash: String,
    user_id: Uuid,
    purpose: String,
    consumed: bool,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<TokenRow> for VerificationToken {
    type Error = sqlx::Error;

    fn try_from(row: TokenRow) -> Result<Self, Self::Error> {
        let purpose = TokenPurpose::parse(&row.purpose).ok_or_else(|| {
            sqlx::Error::Decode(format!("unknown token purpose '{}'", row.purpose).into())
        })?;

        Ok(VerificationToken {
            token_hash: row.token_hash,
            user_id: row.user_id,
            purpose,
            consumed: row.consumed,
            created_at: row.created_at,
            expires_at: row.expires_at,
        })
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn insert(&self, data: CreateToken) -> Result<VerificationToken, StoreError> {
        let row = sqlx::query_as::<_, TokenRow>(
            r#"
            INSERT INTO verification_tokens (token_hash, user_id, purpose, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING token_hash, user_id, purpose, consumed, created_at, expires_at
            "#,
        )
        .bind(data.token_hash)
        .bind(data.user_id)
        .bind(data.purpose.as_str())
        .bind(data.expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(VerificationToken::try_from(row)?)
    }

    async fn find_by_hash(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
    ) -> Result<Option<VerificationToken>, StoreError> {
        let row = sqlx::query_as::<_, TokenRow>(
            r#"
            SELECT token_hash, user_id, purpose, consumed, created_at, expires_at
            FROM verification_tokens
            WHERE token_hash = $1 AND purpose = $2
            "#,
        )
        .bind(token_hash)
        .bind(purpose.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(VerificationToken::try_from)
            .transpose()
            .map_err(StoreError::Database)
    }

    async fn mark_consumed(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
    ) -> Result<Option<Uuid>, StoreError> {
        // The single conditional update: concurrent consumes race on the
        // row lock and exactly one sees consumed = FALSE.
        let user_id: Option<(Uuid,)> = sqlx::query_as(
            r#"
            UPDATE verification_tokens
            SET consumed = TRUE
            WHERE token_hash = $1 AND purpose = $2 AND consumed = FALSE
            RETURNING user_id
            "#,
        )
        .bind(token_hash)
        .bind(purpose.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(user_id.map(|(id,)| id))
    }

    async fn delete_pending(
        &self,
        user_id: Uuid,
        purpose: TokenPurpose,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM verification_tokens WHERE user_id = $1 AND purpose = $2 AND consumed = FALSE",
        )
        .bind(user_id)
        .bind(purpose.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_for_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM verification_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result =
            sqlx::query("DELETE FROM verification_tokens WHERE expires_at <= $1 OR consumed = TRUE")
                .bind(now)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }
}
