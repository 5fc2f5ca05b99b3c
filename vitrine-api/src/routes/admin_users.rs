/// Admin user management endpoints
///
/// # Endpoints
///
/// - `GET /v1/admin/users` — list accounts (paginated, newest first)
/// - `POST /v1/admin/users` — create an account
/// - `GET /v1/admin/users/:id` — fetch one account
/// - `PATCH /v1/admin/users/:id` — update an account
/// - `DELETE /v1/admin/users/:id` — delete an account
///
/// The admin middleware has already passed `require_admin` before any of
/// these run. Responses never contain password hashes, and any password
/// supplied on the create/update paths is hashed by the core before it
/// touches a store.
use crate::{
    app::AppState,
    error::{validation_failure, ApiError, ApiResult},
    routes::{MessageResponse, UserResponse},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;
use vitrine_core::auth::service::{AdminCreateUser, AdminUpdateUser};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 100;

/// List query parameters
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Page size (max 100)
    pub limit: Option<i64>,

    /// Rows to skip
    pub offset: Option<i64>,
}

/// List response
#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,

    /// Total accounts, for pagination
    pub total: i64,
}

/// Lists accounts, newest first.
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<UserListResponse>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);

    let users = state.users.list(limit, offset).await?;
    let total = state.users.count().await?;

    Ok(Json(UserListResponse {
        users: users.into_iter().map(UserResponse::from).collect(),
        total,
    }))
}

/// Create request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Optional initial password. Without one the account cannot sign in
    /// until a password reset sets one.
    pub password: Option<String>,

    /// Optional display name
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,

    /// Grant admin privileges
    #[serde(default)]
    pub is_admin: bool,
}

/// Creates an account.
///
/// # Errors
///
/// - `409 Conflict`: email already registered
/// - `422 Unprocessable Entity`: validation or password policy failure
pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    req.validate().map_err(validation_failure)?;

    let user = state
        .auth
        .admin_create_user(AdminCreateUser {
            email: req.email,
            password: req.password,
            name: req.name,
            is_admin: req.is_admin,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Fetches one account.
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserResponse>> {
    let user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(UserResponse::from(user)))
}

/// Update request. Absent fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    /// New email address
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    /// New password; setting one revokes the user's sessions
    pub password: Option<String>,

    /// New display name
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,

    /// New avatar URL
    pub image: Option<String>,

    /// New admin flag
    pub is_admin: Option<bool>,

    /// New verification state
    pub email_verified: Option<bool>,
}

/// Updates an account.
///
/// # Errors
///
/// - `404 Not Found`: no such user
/// - `409 Conflict`: the new email belongs to another account
/// - `422 Unprocessable Entity`: validation or password policy failure
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    req.validate().map_err(validation_failure)?;

    let user = state
        .auth
        .admin_update_user(
            id,
            AdminUpdateUser {
                email: req.email,
                password: req.password,
                name: req.name.map(Some),
                image: req.image.map(Some),
                is_admin: req.is_admin,
                email_verified: req.email_verified,
            },
        )
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(UserResponse::from(user)))
}

/// Deletes an account; sessions and pending tokens cascade with it.
///
/// # Errors
///
/// - `404 Not Found`: no such user
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let deleted = state.auth.delete_account(id).await?;

    if !deleted {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    Ok(Json(MessageResponse::new("User deleted")))
}
