/// The authorization gate for privileged operations
///
/// Every route that mutates state or returns non-public data goes through
/// exactly one of two entry points, both derived from a validated session:
///
/// - [`AuthorizationGate::require_user`] — self-service operations
///   (a user editing their own profile or password)
/// - [`AuthorizationGate::require_admin`] — admin operations
///   (user management, settings)
///
/// Handlers never re-implement the check; the per-route `isAdmin`
/// sprinkling this replaces is how enforcement drifts.
///
/// # Example
///
/// ```no_run
/// use vitrine_core::auth::{AuthorizationGate, AuthzError};
///
/// # async fn example(gate: AuthorizationGate, session_id: &str) -> Result<(), AuthzError> {
/// // Admin-only operation:
/// let admin = gate.require_admin(session_id).await?;
/// println!("authorized as {}", admin.email);
/// # Ok(())
/// # }
/// ```
use std::sync::Arc;

use crate::models::User;

use super::service::{AuthError, AuthService};

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// No valid session — absent, expired, or orphaned
    #[error("authentication required")]
    Unauthenticated,

    /// Valid session, but the user lacks the required privilege
    #[error("insufficient privileges")]
    Forbidden,

    /// Underlying auth/store failure
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Derives admin/non-admin decisions from validated sessions.
pub struct AuthorizationGate {
    service: Arc<AuthService>,
}

impl AuthorizationGate {
    pub fn new(service: Arc<AuthService>) -> Self {
        Self { service }
    }

    /// Requires a valid session; returns its owning user.
    ///
    /// # Errors
    ///
    /// [`AuthzError::Unauthenticated`] when the session does not validate.
    pub async fn require_user(&self, session_id: &str) -> Result<User, AuthzError> {
        self.service
            .validate_session(session_id)
            .await?
            .ok_or(AuthzError::Unauthenticated)
    }

    /// Requires a valid session owned by an admin.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::Unauthenticated`] when the session does not validate
    /// - [`AuthzError::Forbidden`] when the user is not an admin
    pub async fn require_admin(&self, session_id: &str) -> Result<User, AuthzError> {
        let user = self.require_user(session_id).await?;

        if !user.is_admin {
            tracing::debug!(user_id = %user.id, "admin gate refused non-admin user");
            return Err(AuthzError::Forbidden);
        }

        Ok(user)
    }
}
