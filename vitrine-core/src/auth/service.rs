/// The credential lifecycle state machine
///
/// `AuthService` orchestrates sign-up, sign-in, sign-out, email
/// verification, password reset, and session validation over the store
/// boundaries, the password hasher, the token issuer, and the email
/// collaborator. Per credential lifecycle a user moves
/// `Unregistered → PendingVerification → Verified`.
///
/// Two deliberate asymmetries in the error surface:
///
/// - Credential failures are coarse: unknown email, passwordless account,
///   and wrong password all yield the same [`AuthError::InvalidCredentials`]
///   so responses cannot be used to enumerate accounts.
/// - Token failures are fine-grained ([`TokenError`]): the token itself is
///   unguessable, so precision here leaks nothing.
///
/// Email delivery failures never roll back committed account or token
/// state; flows that do more than send mail report them in their outcome
/// struct instead of failing.
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::email::{EmailError, EmailMessage, EmailSender};
use crate::models::{CreateSession, CreateUser, Session, TokenPurpose, UpdateUser, User};
use crate::store::{SessionStore, StoreError, TokenStore, UserStore};

use super::password::{self, PasswordError};
use super::token::{generate_session_id, TokenError, TokenIssuer};

/// Error type for auth flows
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The email is already registered
    #[error("email address is already registered")]
    EmailConflict,

    /// Unknown email, passwordless account, or wrong password — one error
    /// for all three, by design
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The account exists and the password was correct, but the email is
    /// unverified and policy requires verification. Intentionally
    /// distinguishable from `InvalidCredentials` so clients can prompt
    /// "check your email" instead of "wrong password".
    #[error("email address has not been verified")]
    EmailNotVerified,

    /// The new password fails the minimum policy
    #[error("{0}")]
    WeakPassword(String),

    /// Verification/reset token failure
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Hashing primitive failure — operational, never shown verbatim to
    /// end users
    #[error(transparent)]
    Hashing(#[from] PasswordError),

    /// Email dispatch failure where the send is the entire operation
    #[error(transparent)]
    EmailDelivery(#[from] EmailError),

    /// Store failure other than an email conflict
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EmailConflict => AuthError::EmailConflict,
            other => AuthError::Store(other),
        }
    }
}

/// Policy knobs for the auth flows.
///
/// Defaults mirror the production configuration: auto sign-in on, email
/// verification required, one-hour token lifetimes.
#[derive(Debug, Clone)]
pub struct AuthPolicy {
    /// Create a session on sign-up and after email verification, without a
    /// separate sign-in. Downstream operations may still require
    /// `email_verified` as a separate gate.
    pub auto_sign_in: bool,

    /// Refuse password sign-in until the email is verified
    pub require_email_verification: bool,

    /// Lifetime of email-verification tokens
    pub verification_ttl: Duration,

    /// Lifetime of password-reset tokens
    pub reset_ttl: Duration,

    /// Session lifetime without "remember me"
    pub session_ttl: Duration,

    /// Session lifetime with "remember me"
    pub remember_session_ttl: Duration,

    /// Slide `expires_at` forward on each validated use
    pub refresh_sessions: bool,

    /// Minimum accepted password length, in characters
    pub min_password_length: usize,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            auto_sign_in: true,
            require_email_verification: true,
            verification_ttl: Duration::hours(1),
            reset_ttl: Duration::hours(1),
            session_ttl: Duration::hours(24),
            remember_session_ttl: Duration::days(30),
            refresh_sessions: true,
            min_password_length: 8,
        }
    }
}

/// Outcome of a successful sign-up.
#[derive(Debug)]
pub struct SignUp {
    /// The new account
    pub user_id: Uuid,

    /// Auto-sign-in session, when policy allows
    pub session: Option<Session>,

    /// Set when the verification email could not be dispatched. The
    /// account and token are committed regardless; delivery can be retried
    /// via `resend_verification_email`.
    pub email_error: Option<EmailError>,
}

/// Outcome of a successful email verification.
#[derive(Debug)]
pub struct EmailVerification {
    pub user_id: Uuid,

    /// Post-verification session, when policy allows
    pub session: Option<Session>,
}

/// Outcome of a password-reset request.
///
/// Success-shaped whether or not the email exists — the caller cannot tell
/// the difference, by design.
#[derive(Debug)]
pub struct PasswordResetRequest {
    /// Set when the account exists but the reset email could not be
    /// dispatched; the token is committed and the request can be retried.
    pub email_error: Option<EmailError>,
}

/// Counts from an expiry sweep.
#[derive(Debug, Clone, Copy)]
pub struct PurgeReport {
    pub sessions: u64,
    pub tokens: u64,
}

/// Input for admin-initiated account creation.
#[derive(Debug, Clone)]
pub struct AdminCreateUser {
    pub email: String,
    /// Optional initial password — hashed here, like every other password
    /// path. Accounts created without one cannot sign in until a reset.
    pub password: Option<String>,
    pub name: Option<String>,
    pub is_admin: bool,
}

/// Input for admin-initiated account updates.
#[derive(Debug, Clone, Default)]
pub struct AdminUpdateUser {
    pub email: Option<String>,
    /// New plaintext password; hashed here. Setting it revokes the user's
    /// sessions.
    pub password: Option<String>,
    pub name: Option<Option<String>>,
    pub image: Option<Option<String>>,
    pub is_admin: Option<bool>,
    pub email_verified: Option<bool>,
}

/// Runs the hasher off the async worker threads; Argon2id is intentionally
/// slow and must not stall unrelated requests.
async fn hash_blocking(password: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(|e| PasswordError::HashError(format!("hashing task aborted: {e}")))?
}

async fn verify_blocking(password: String, hash: String) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || password::verify_password(&password, &hash))
        .await
        .map_err(|e| PasswordError::HashError(format!("verification task aborted: {e}")))?
}

/// The auth state machine. One instance is shared across all requests.
pub struct AuthService {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    tokens: TokenIssuer,
    mailer: Arc<dyn EmailSender>,
    policy: AuthPolicy,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        tokens: Arc<dyn TokenStore>,
        mailer: Arc<dyn EmailSender>,
        policy: AuthPolicy,
    ) -> Self {
        Self {
            users,
            sessions,
            tokens: TokenIssuer::new(tokens),
            mailer,
            policy,
        }
    }

    pub fn policy(&self) -> &AuthPolicy {
        &self.policy
    }

    /// Registers a new account.
    ///
    /// Hashes the password, creates the user unverified, issues an
    /// email-verification token, and dispatches the verification email.
    /// When `auto_sign_in` policy is set a session is created immediately,
    /// verification state notwithstanding.
    ///
    /// # Errors
    ///
    /// - [`AuthError::EmailConflict`] if the email is taken
    /// - [`AuthError::WeakPassword`] if the password fails policy
    ///
    /// A failed verification email is NOT an error: the account and token
    /// are already committed and the outcome carries the failure.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: Option<String>,
    ) -> Result<SignUp, AuthError> {
        password::validate_password_strength(password, self.policy.min_password_length)
            .map_err(AuthError::WeakPassword)?;

        let password_hash = hash_blocking(password.to_string()).await?;

        let user = self
            .users
            .create(CreateUser {
                email: email.to_string(),
                password_hash: Some(password_hash),
                name,
                image: None,
                is_admin: false,
                email_verified: false,
            })
            .await?;

        let issued = self
            .tokens
            .issue(user.id, TokenPurpose::EmailVerify, self.policy.verification_ttl)
            .await?;

        let email_error = match self.mailer.send(self.verification_email(&user, &issued.raw)).await
        {
            Ok(()) => None,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "verification email failed to send");
                Some(e)
            }
        };

        let session = if self.policy.auto_sign_in {
            Some(self.issue_session(user.id, false).await?)
        } else {
            None
        };

        info!(user_id = %user.id, "user signed up");

        Ok(SignUp {
            user_id: user.id,
            session,
            email_error,
        })
    }

    /// Confirms an email address with a verification token.
    ///
    /// Consumes the token (single-use) and sets `email_verified`. When
    /// `auto_sign_in` policy is set the user is signed in on the spot.
    ///
    /// # Errors
    ///
    /// [`AuthError::Token`] with the issuer's fine-grained reason; the HTTP
    /// layer collapses these into "link invalid or expired".
    pub async fn verify_email(&self, raw_token: &str) -> Result<EmailVerification, AuthError> {
        let user_id = self
            .tokens
            .consume(raw_token, TokenPurpose::EmailVerify)
            .await?;

        let updated = self
            .users
            .update(
                user_id,
                UpdateUser {
                    email_verified: Some(true),
                    ..Default::default()
                },
            )
            .await?;

        if updated.is_none() {
            // The account vanished between consume and update; the link is
            // dead either way.
            return Err(TokenError::NotFound.into());
        }

        let session = if self.policy.auto_sign_in {
            Some(self.issue_session(user_id, false).await?)
        } else {
            None
        };

        info!(user_id = %user_id, "email verified");

        Ok(EmailVerification { user_id, session })
    }

    /// Authenticates with email and password, returning a fresh session.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidCredentials`] for unknown email, passwordless
    ///   account, or wrong password — indistinguishable by design
    /// - [`AuthError::EmailNotVerified`] when the credentials are right but
    ///   policy requires a verified email first
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
        remember: bool,
    ) -> Result<Session, AuthError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let hash = user
            .password_hash
            .clone()
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_blocking(password.to_string(), hash).await? {
            return Err(AuthError::InvalidCredentials);
        }

        if self.policy.require_email_verification && !user.email_verified {
            return Err(AuthError::EmailNotVerified);
        }

        let session = self.issue_session(user.id, remember).await?;

        info!(user_id = %user.id, remember, "user signed in");

        Ok(session)
    }

    /// Starts a password-reset flow.
    ///
    /// Always returns a success-shaped outcome: when the email is unknown
    /// nothing happens and the caller cannot tell (anti-enumeration). When
    /// it exists, a reset token is issued and mailed.
    pub async fn request_password_reset(
        &self,
        email: &str,
    ) -> Result<PasswordResetRequest, AuthError> {
        let Some(user) = self.users.find_by_email(email).await? else {
            debug!("password reset requested for unknown email");
            return Ok(PasswordResetRequest { email_error: None });
        };

        let issued = self
            .tokens
            .issue(user.id, TokenPurpose::PasswordReset, self.policy.reset_ttl)
            .await?;

        let email_error = match self.mailer.send(self.reset_email(&user, &issued.raw)).await {
            Ok(()) => None,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "password reset email failed to send");
                Some(e)
            }
        };

        info!(user_id = %user.id, "password reset requested");

        Ok(PasswordResetRequest { email_error })
    }

    /// Completes a password reset with a token from the reset email.
    ///
    /// On success every existing session for the user is destroyed — a
    /// reset must not leave old sessions alive.
    ///
    /// # Errors
    ///
    /// - [`AuthError::WeakPassword`] — checked before the token is
    ///   consumed, so a rejected password leaves the link usable
    /// - [`AuthError::Token`] with the issuer's reason
    pub async fn reset_password(&self, raw_token: &str, new_password: &str) -> Result<(), AuthError> {
        password::validate_password_strength(new_password, self.policy.min_password_length)
            .map_err(AuthError::WeakPassword)?;

        let user_id = self
            .tokens
            .consume(raw_token, TokenPurpose::PasswordReset)
            .await?;

        let password_hash = hash_blocking(new_password.to_string()).await?;

        let updated = self
            .users
            .update(
                user_id,
                UpdateUser {
                    password_hash: Some(password_hash),
                    ..Default::default()
                },
            )
            .await?;

        if updated.is_none() {
            return Err(TokenError::NotFound.into());
        }

        let revoked = self.sessions.delete_all_for_user(user_id).await?;

        info!(user_id = %user_id, revoked_sessions = revoked, "password reset completed");

        Ok(())
    }

    /// Re-sends the verification email.
    ///
    /// Success-shaped for unknown emails and already-verified accounts
    /// (anti-enumeration). Re-issuing supersedes the previous token, so
    /// repeated requests never trip duplicate-key errors.
    ///
    /// # Errors
    ///
    /// [`AuthError::EmailDelivery`] — here the send IS the operation.
    pub async fn resend_verification_email(&self, email: &str) -> Result<(), AuthError> {
        let Some(user) = self.users.find_by_email(email).await? else {
            debug!("verification resend requested for unknown email");
            return Ok(());
        };

        if user.email_verified {
            debug!(user_id = %user.id, "verification resend for already-verified account");
            return Ok(());
        }

        let issued = self
            .tokens
            .issue(user.id, TokenPurpose::EmailVerify, self.policy.verification_ttl)
            .await?;

        self.mailer
            .send(self.verification_email(&user, &issued.raw))
            .await?;

        info!(user_id = %user.id, "verification email re-sent");

        Ok(())
    }

    /// Changes a signed-in user's password (the profile path).
    ///
    /// Credentials changed means cascade invalidation: every session for
    /// the user is destroyed and the client must sign in again. Returns
    /// false if the user no longer exists.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        new_password: &str,
    ) -> Result<bool, AuthError> {
        password::validate_password_strength(new_password, self.policy.min_password_length)
            .map_err(AuthError::WeakPassword)?;

        let password_hash = hash_blocking(new_password.to_string()).await?;

        let updated = self
            .users
            .update(
                user_id,
                UpdateUser {
                    password_hash: Some(password_hash),
                    ..Default::default()
                },
            )
            .await?;

        if updated.is_none() {
            return Ok(false);
        }

        let revoked = self.sessions.delete_all_for_user(user_id).await?;
        info!(user_id = %user_id, revoked_sessions = revoked, "password changed");

        Ok(true)
    }

    /// Self-service profile update (name and/or email).
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        name: Option<Option<String>>,
        email: Option<String>,
    ) -> Result<Option<User>, AuthError> {
        let updated = self
            .users
            .update(
                user_id,
                UpdateUser {
                    email,
                    name,
                    ..Default::default()
                },
            )
            .await?;

        Ok(updated)
    }

    /// Admin-initiated account creation.
    ///
    /// The optional initial password goes through the same strength check
    /// and hasher as every other path — plaintext never reaches a store.
    pub async fn admin_create_user(&self, data: AdminCreateUser) -> Result<User, AuthError> {
        let password_hash = match data.password {
            Some(password) => {
                password::validate_password_strength(&password, self.policy.min_password_length)
                    .map_err(AuthError::WeakPassword)?;
                Some(hash_blocking(password).await?)
            }
            None => None,
        };

        let user = self
            .users
            .create(CreateUser {
                email: data.email,
                password_hash,
                name: data.name,
                image: None,
                is_admin: data.is_admin,
                email_verified: false,
            })
            .await?;

        info!(user_id = %user.id, is_admin = user.is_admin, "user created by admin");

        Ok(user)
    }

    /// Admin-initiated account update.
    ///
    /// Setting a password revokes the user's sessions, same as a reset.
    pub async fn admin_update_user(
        &self,
        user_id: Uuid,
        data: AdminUpdateUser,
    ) -> Result<Option<User>, AuthError> {
        let password_hash = match data.password {
            Some(password) => {
                password::validate_password_strength(&password, self.policy.min_password_length)
                    .map_err(AuthError::WeakPassword)?;
                Some(hash_blocking(password).await?)
            }
            None => None,
        };
        let password_changed = password_hash.is_some();

        let updated = self
            .users
            .update(
                user_id,
                UpdateUser {
                    email: data.email,
                    password_hash,
                    name: data.name,
                    image: data.image,
                    email_verified: data.email_verified,
                    is_admin: data.is_admin,
                },
            )
            .await?;

        if password_changed && updated.is_some() {
            let revoked = self.sessions.delete_all_for_user(user_id).await?;
            info!(user_id = %user_id, revoked_sessions = revoked, "password set by admin");
        }

        Ok(updated)
    }

    /// Deletes an account; the store cascades sessions and pending tokens.
    pub async fn delete_account(&self, user_id: Uuid) -> Result<bool, AuthError> {
        let deleted = self.users.delete(user_id).await?;

        if deleted {
            info!(user_id = %user_id, "account deleted");
        }

        Ok(deleted)
    }

    /// Destroys a session. Idempotent — signing out an absent or expired
    /// session is not an error.
    pub async fn sign_out(&self, session_id: &str) -> Result<(), AuthError> {
        let existed = self.sessions.delete(session_id).await?;
        debug!(existed, "sign out");

        Ok(())
    }

    /// Resolves a session id to its owning user.
    ///
    /// Returns `Ok(None)` — never an error — for absent, expired, or
    /// orphaned sessions; callers treat `None` as unauthenticated. Expired
    /// and orphaned sessions are deleted on sight. When policy allows,
    /// validation slides the expiry forward by the session's original TTL.
    pub async fn validate_session(&self, session_id: &str) -> Result<Option<User>, AuthError> {
        let Some(session) = self.sessions.find(session_id).await? else {
            return Ok(None);
        };

        let now = Utc::now();
        if session.is_expired(now) {
            self.sessions.delete(session_id).await?;
            debug!("expired session dropped on validation");
            return Ok(None);
        }

        let Some(user) = self.users.find_by_id(session.user_id).await? else {
            // Owner is gone; the session is an orphan.
            self.sessions.delete(session_id).await?;
            debug!(user_id = %session.user_id, "orphan session dropped on validation");
            return Ok(None);
        };

        if self.policy.refresh_sessions {
            let ttl = if session.remember {
                self.policy.remember_session_ttl
            } else {
                self.policy.session_ttl
            };
            self.sessions.extend(session_id, now + ttl).await?;
        }

        Ok(Some(user))
    }

    /// Sweeps expired sessions and dead tokens. Run periodically; the lazy
    /// paths only clean rows they happen to touch.
    pub async fn purge_expired(&self) -> Result<PurgeReport, AuthError> {
        let now = Utc::now();

        let sessions = self.sessions.purge_expired(now).await?;
        let tokens = self.tokens.purge_expired(now).await?;

        if sessions > 0 || tokens > 0 {
            info!(sessions, tokens, "expired credential sweep");
        }

        Ok(PurgeReport { sessions, tokens })
    }

    async fn issue_session(&self, user_id: Uuid, remember: bool) -> Result<Session, AuthError> {
        let ttl = if remember {
            self.policy.remember_session_ttl
        } else {
            self.policy.session_ttl
        };

        let session = self
            .sessions
            .create(CreateSession {
                id: generate_session_id(),
                user_id,
                remember,
                expires_at: Utc::now() + ttl,
            })
            .await?;

        Ok(session)
    }

    fn verification_email(&self, user: &User, raw_token: &str) -> EmailMessage {
        let minutes = self.policy.verification_ttl.num_minutes();

        EmailMessage {
            to_address: user.email.clone(),
            to_name: user.name.clone(),
            subject: "Verify your email address".to_string(),
            html_body: format!(
                "<p>Welcome to Vitrine!</p>\
                 <p>Confirm your email address with the code below. \
                 It expires in {minutes} minutes.</p>\
                 <p><strong>{raw_token}</strong></p>"
            ),
            reply_to: None,
        }
    }

    fn reset_email(&self, user: &User, raw_token: &str) -> EmailMessage {
        let minutes = self.policy.reset_ttl.num_minutes();

        EmailMessage {
            to_address: user.email.clone(),
            to_name: user.name.clone(),
            subject: "Reset your password".to_string(),
            html_body: format!(
                "<p>A password reset was requested for your Vitrine account.</p>\
                 <p>Use the code below to choose a new password. \
                 It expires in {minutes} minutes.</p>\
                 <p><strong>{raw_token}</strong></p>\
                 <p>If you did not request this reset, you can ignore this email.</p>"
            ),
            reply_to: None,
        }
    }
}
