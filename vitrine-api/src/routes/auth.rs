/// Credential flow endpoints
///
/// # Endpoints
///
/// - `POST /v1/auth/register` — create an account
/// - `POST /v1/auth/login` — exchange credentials for a session
/// - `POST /v1/auth/logout` — destroy the presented session (idempotent)
/// - `POST /v1/auth/verify-email` — confirm an email address
/// - `POST /v1/auth/resend-verification` — re-send the verification email
/// - `POST /v1/auth/forgot-password` — start a password reset
/// - `POST /v1/auth/reset-password` — complete a password reset
///
/// The forgot-password and resend-verification responses are identical
/// whether or not the email exists — account enumeration gets nothing.
use crate::{
    app::{bearer_session, AppState},
    error::{validation_failure, ApiError, ApiResult},
    routes::MessageResponse,
};
use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;
use vitrine_core::models::Session;

/// Session payload handed to the client. The id is the opaque credential;
/// transport (cookie vs. bearer) is the client's concern.
#[derive(Debug, Serialize)]
pub struct SessionPayload {
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
}

impl From<Session> for SessionPayload {
    fn from(session: Session) -> Self {
        Self {
            session_id: session.id,
            expires_at: session.expires_at,
        }
    }
}

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password (strength is enforced by the core policy)
    pub password: String,

    /// Optional display name
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,
}

/// Register response
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    /// New user id
    pub user_id: String,

    /// Auto-sign-in session, when policy allows
    pub session: Option<SessionPayload>,

    /// Whether the verification email went out. False means delivery
    /// failed; the account exists and `resend-verification` will retry.
    pub verification_email_sent: bool,
}

/// Registers a new account.
///
/// # Errors
///
/// - `409 Conflict`: email already registered
/// - `422 Unprocessable Entity`: validation or password policy failure
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    req.validate().map_err(validation_failure)?;

    let outcome = state.auth.sign_up(&req.email, &req.password, req.name).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: outcome.user_id.to_string(),
            session: outcome.session.map(SessionPayload::from),
            verification_email_sent: outcome.email_error.is_none(),
        }),
    ))
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password
    pub password: String,

    /// Extended-expiry session
    #[serde(default)]
    pub remember: bool,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: String,
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Authenticates and returns a fresh session.
///
/// # Errors
///
/// - `401 Unauthorized`: invalid credentials (one message for unknown
///   email, passwordless account, and wrong password)
/// - `403 Forbidden` with `email_not_verified`: credentials are right but
///   the email still needs verifying
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    req.validate().map_err(validation_failure)?;

    let session = state
        .auth
        .sign_in(&req.email, &req.password, req.remember)
        .await?;

    Ok(Json(LoginResponse {
        user_id: session.user_id.to_string(),
        session_id: session.id,
        expires_at: session.expires_at,
    }))
}

/// Destroys the presented session. Idempotent: logging out an expired or
/// unknown session still succeeds.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<MessageResponse>> {
    let session_id = bearer_session(&headers)?;

    state.auth.sign_out(session_id).await?;

    Ok(Json(MessageResponse::new("Signed out")))
}

/// Verify-email request
#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    /// Raw token from the verification email
    pub token: String,
}

/// Verify-email response
#[derive(Debug, Serialize)]
pub struct VerifyEmailResponse {
    pub user_id: String,

    /// Post-verification session, when policy allows
    pub session: Option<SessionPayload>,
}

/// Confirms an email address.
///
/// # Errors
///
/// - `400 Bad Request`: the link is invalid, expired, or already used
pub async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<VerifyEmailRequest>,
) -> ApiResult<Json<VerifyEmailResponse>> {
    let outcome = state.auth.verify_email(&req.token).await?;

    Ok(Json(VerifyEmailResponse {
        user_id: outcome.user_id.to_string(),
        session: outcome.session.map(SessionPayload::from),
    }))
}

/// Email-only request body shared by the resend and forgot flows.
#[derive(Debug, Deserialize, Validate)]
pub struct EmailRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Re-sends the verification email. The response does not reveal whether
/// the account exists or is already verified.
///
/// # Errors
///
/// - `502 Bad Gateway`: the account exists but the email could not be sent
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> ApiResult<Json<MessageResponse>> {
    req.validate().map_err(validation_failure)?;

    state.auth.resend_verification_email(&req.email).await?;

    Ok(Json(MessageResponse::new(
        "If that account needs verification, a new email is on its way",
    )))
}

/// Starts a password reset. Success-shaped whether or not the email exists.
///
/// # Errors
///
/// - `502 Bad Gateway`: the account exists but the email could not be sent
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> ApiResult<Json<MessageResponse>> {
    req.validate().map_err(validation_failure)?;

    let outcome = state.auth.request_password_reset(&req.email).await?;

    if let Some(e) = outcome.email_error {
        // The token is committed; only delivery failed, so retrying the
        // request is safe.
        return Err(ApiError::EmailDeliveryFailed(e.to_string()));
    }

    Ok(Json(MessageResponse::new(
        "If that account exists, a password reset email is on its way",
    )))
}

/// Reset-password request
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    /// Raw token from the reset email
    pub token: String,

    /// Replacement password
    pub new_password: String,
}

/// Completes a password reset. All of the user's existing sessions are
/// destroyed.
///
/// # Errors
///
/// - `400 Bad Request`: the link is invalid, expired, or already used
/// - `422 Unprocessable Entity`: the new password fails policy (the link
///   stays usable)
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .auth
        .reset_password(&req.token, &req.new_password)
        .await?;

    Ok(Json(MessageResponse::new(
        "Password updated; please sign in again",
    )))
}
