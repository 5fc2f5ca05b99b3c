//! Route handlers for the vitrine API.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use vitrine_core::models::User;

pub mod admin_users;
pub mod auth;
pub mod health;
pub mod profile;

/// User payload shared by the profile and admin endpoints.
///
/// The password hash deliberately has no field here — it never leaves the
/// core.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub email_verified: bool,
    pub name: Option<String>,
    pub image: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            email_verified: user.email_verified,
            name: user.name,
            image: user.image,
            is_admin: user.is_admin,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Plain message payload for endpoints with nothing else to say.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
