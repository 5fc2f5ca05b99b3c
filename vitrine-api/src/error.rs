/// Error handling for the API server
///
/// One unified error type maps core outcomes to HTTP responses. Handlers
/// return `ApiResult<T>`; the `From` impls at the bottom translate the
/// core's error taxonomy:
///
/// - credential errors stay coarse (401 with one fixed message)
/// - token errors collapse to a single "link invalid or expired" 400
/// - `EmailNotVerified` gets its own 403 code so clients can prompt
///   "check your email"
/// - hashing/store faults log at error level and return a generic 500
/// - email delivery failures surface as 502 — the triggering action has
///   already committed and can be retried
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use vitrine_core::auth::{AuthError, AuthzError};
use vitrine_core::store::StoreError;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Forbidden (403) with the `email_not_verified` code — the account
    /// exists and the password was right
    EmailNotVerified,

    /// Not found (404)
    NotFound(String),

    /// Conflict (409) — duplicate email
    Conflict(String),

    /// Unprocessable entity (422) — validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Bad gateway (502) — outbound email dispatch failed
    EmailDeliveryFailed(String),

    /// Internal server error (500)
    InternalError(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g. "unauthorized", "email_not_verified")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::EmailNotVerified => write!(f, "Email not verified"),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::EmailDeliveryFailed(msg) => write!(f, "Email delivery failed: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::EmailNotVerified => (
                StatusCode::FORBIDDEN,
                "email_not_verified",
                "Please verify your email address before signing in".to_string(),
                None,
            ),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::EmailDeliveryFailed(msg) => {
                // The action itself committed; only delivery failed.
                tracing::warn!("email delivery failed: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "email_delivery_failed",
                    "The email could not be sent; please try again".to_string(),
                    None,
                )
            }
            ApiError::InternalError(msg) => {
                // Log the detail but never expose it to clients.
                tracing::error!("internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Converts validator failures to the 422 shape.
pub fn validation_failure(errors: validator::ValidationErrors) -> ApiError {
    let details: Vec<ValidationErrorDetail> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| ValidationErrorDetail {
                field: field.to_string(),
                message: error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Validation failed".to_string()),
            })
        })
        .collect();

    ApiError::ValidationError(details)
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::EmailConflict => {
                ApiError::Conflict("An account with this email already exists".to_string())
            }
            AuthError::InvalidCredentials => {
                ApiError::Unauthorized("Invalid email or password".to_string())
            }
            AuthError::EmailNotVerified => ApiError::EmailNotVerified,
            AuthError::WeakPassword(msg) => ApiError::ValidationError(vec![ValidationErrorDetail {
                field: "password".to_string(),
                message: msg,
            }]),
            // The fine-grained token reasons collapse into one user-facing
            // message.
            AuthError::Token(_) => {
                ApiError::BadRequest("This link is invalid or has expired".to_string())
            }
            AuthError::Hashing(e) => ApiError::InternalError(format!("hashing failure: {}", e)),
            AuthError::EmailDelivery(e) => ApiError::EmailDeliveryFailed(e.to_string()),
            AuthError::Store(e) => ApiError::InternalError(format!("store failure: {}", e)),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Unauthenticated => {
                ApiError::Unauthorized("Authentication required".to_string())
            }
            AuthzError::Forbidden => ApiError::Forbidden("Insufficient privileges".to_string()),
            AuthzError::Auth(e) => e.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EmailConflict => {
                ApiError::Conflict("An account with this email already exists".to_string())
            }
            StoreError::Database(e) => ApiError::InternalError(format!("database error: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrine_core::auth::TokenError;

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::NotFound("User not found".to_string());
        assert_eq!(err.to_string(), "Not found: User not found");
    }

    #[test]
    fn test_credential_errors_stay_coarse() {
        let err: ApiError = AuthError::InvalidCredentials.into();
        match err {
            ApiError::Unauthorized(msg) => assert_eq!(msg, "Invalid email or password"),
            other => panic!("expected Unauthorized, got {other:?}"),
        }
    }

    #[test]
    fn test_token_errors_collapse_to_one_message() {
        let variants = [
            TokenError::NotFound,
            TokenError::Expired,
            TokenError::AlreadyUsed,
        ];

        let mut messages = Vec::new();
        for variant in variants {
            match ApiError::from(AuthError::Token(variant)) {
                ApiError::BadRequest(msg) => messages.push(msg),
                other => panic!("expected BadRequest, got {other:?}"),
            }
        }

        assert!(messages.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_email_not_verified_is_distinct_from_credentials() {
        let verified: ApiError = AuthError::EmailNotVerified.into();
        assert!(matches!(verified, ApiError::EmailNotVerified));
    }
}
