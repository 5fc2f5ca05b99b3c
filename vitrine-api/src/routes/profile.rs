/// Self-service profile endpoints
///
/// # Endpoints
///
/// - `GET /v1/profile` — the signed-in user's own record
/// - `PUT /v1/profile` — update name/email/password
/// - `DELETE /v1/profile` — delete the account (cascades sessions and
///   tokens)
///
/// These require only a valid session, not admin — editing your own
/// profile goes through `require_user`, never `require_admin`.
use crate::{
    app::{AppState, CurrentUser},
    error::{validation_failure, ApiResult},
    routes::{MessageResponse, UserResponse},
};
use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use validator::Validate;

/// Returns the caller's own user record.
pub async fn get_profile(
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<UserResponse>> {
    Ok(Json(UserResponse::from(current.user)))
}

/// Profile update request. Absent fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    /// New display name
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,

    /// New email address
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    /// New password — changing it signs the user out everywhere
    pub password: Option<String>,
}

/// Updates the caller's own profile.
///
/// # Errors
///
/// - `409 Conflict`: the new email belongs to another account
/// - `422 Unprocessable Entity`: validation or password policy failure
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<MessageResponse>> {
    req.validate().map_err(validation_failure)?;

    let user_id = current.user.id;

    if req.name.is_some() || req.email.is_some() {
        state
            .auth
            .update_profile(user_id, req.name.map(Some), req.email)
            .await?;
    }

    // The password goes last: changing it revokes every session, including
    // the one authorizing this request.
    if let Some(password) = req.password {
        state.auth.change_password(user_id, &password).await?;

        return Ok(Json(MessageResponse::new(
            "Profile updated; password changed, please sign in again",
        )));
    }

    Ok(Json(MessageResponse::new("Profile updated")))
}

/// Deletes the caller's own account. Sessions and pending tokens go with
/// it.
pub async fn delete_profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<MessageResponse>> {
    state.auth.delete_account(current.user.id).await?;

    Ok(Json(MessageResponse::new("Account deleted")))
}
