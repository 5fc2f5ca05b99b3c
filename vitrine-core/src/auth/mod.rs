//! Authentication and authorization for the vitrine credential core.
//!
//! ## Components
//!
//! - [`password`]: Argon2id hashing/verification and the password policy
//! - [`token`]: Opaque verification/reset token issuance and single-use
//!   consumption
//! - [`service`]: The credential state machine (sign-up, sign-in, email
//!   verification, password reset, session validation)
//! - [`authorization`]: The gate every privileged operation goes through

pub mod authorization;
pub mod password;
pub mod service;
pub mod token;

pub use authorization::{AuthorizationGate, AuthzError};
pub use service::{AuthError, AuthPolicy, AuthService};
pub use token::{TokenError, TokenIssuer};
