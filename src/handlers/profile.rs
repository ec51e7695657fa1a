use crate::{
    AppState,
    auth::{AuthUser, hash_password, verify_password},
    error::ApiError,
    models::{
        ChangePasswordRequest, UpdateProfileRequest, User, validate_email,
        validate_password_strength,
    },
};
use axum::{Json, extract::State};
use serde_json::{Value, json};

/// get_profile
///
/// [Authenticated Route] Returns the requester's own record.
pub async fn get_profile(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, ApiError> {
    state
        .repo
        .find_user(auth.id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("user"))
}

/// update_profile
///
/// [Authenticated Route] Partial update of the requester's own contact details.
/// Role flags and username are not reachable through this endpoint.
pub async fn update_profile(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<User>, ApiError> {
    let mut user = state
        .repo
        .find_user(auth.id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    if let Some(email) = payload.email {
        validate_email(&email).map_err(|msg| ApiError::validation("email", msg))?;
        user.email = email;
    }
    if let Some(first_name) = payload.first_name {
        user.first_name = first_name;
    }
    if let Some(last_name) = payload.last_name {
        user.last_name = last_name;
    }

    let updated = state.repo.update_user(user).await?;
    Ok(Json(updated))
}

/// change_password
///
/// [Authenticated Route] Replaces the requester's password after re-verifying
/// the current one. The new password goes through the same strength policy as
/// registration.
pub async fn change_password(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut user = state
        .repo
        .find_user(auth.id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    if !verify_password(&payload.old_password, &user.password_hash) {
        return Err(ApiError::validation("old_password", "incorrect password"));
    }

    validate_password_strength(&payload.new_password, &user.username)
        .map_err(|msg| ApiError::validation("new_password", msg))?;

    user.password_hash = hash_password(&payload.new_password)?;
    state.repo.update_user(user).await?;

    Ok(Json(json!({ "message": "password updated successfully" })))
}
