use crate::{
    AppState,
    auth::{
        AuthUser, hash_password, issue_access_token, issue_reset_token, verify_password,
        verify_reset_token,
    },
    error::ApiError,
    models::{
        LoginRequest, LoginResponse, PasswordResetConfirmRequest, PasswordResetRequest,
        PasswordResetResponse, RegisterRequest, User, validate_password_strength,
    },
};
use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// register
///
/// [Public Route] Creates a new account with the reader role. Field validation
/// runs first; username/email uniqueness is pre-checked so the client gets a
/// per-field message rather than a bare constraint violation.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    payload.validate()?;

    if state
        .repo
        .find_user_by_username(&payload.username)
        .await?
        .is_some()
    {
        return Err(ApiError::validation("username", "already exists"));
    }
    if state
        .repo
        .find_user_by_email(&payload.email)
        .await?
        .is_some()
    {
        return Err(ApiError::validation("email", "already exists"));
    }

    let user = User {
        id: Uuid::new_v4(),
        username: payload.username,
        email: payload.email,
        first_name: payload.first_name,
        last_name: payload.last_name,
        password_hash: hash_password(&payload.password)?,
        ..User::default()
    };

    let created = state.repo.create_user(user).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// login
///
/// [Public Route] Verifies credentials and issues a bearer token. A missing
/// user, a deactivated user and a wrong password are indistinguishable in the
/// response.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let rejection = || ApiError::validation("credentials", "invalid username or password");

    let user = state
        .repo
        .find_user_by_username(&payload.username)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(rejection)?;

    if !verify_password(&payload.password, &user.password_hash) {
        return Err(rejection());
    }

    let token = issue_access_token(user.id, &state.config)?;
    Ok(Json(LoginResponse { token, user }))
}

/// logout
///
/// [Authenticated Route] Tokens are stateless and expire on their own, so
/// logout is an acknowledgement; the client discards its token.
pub async fn logout(_auth: AuthUser) -> StatusCode {
    StatusCode::NO_CONTENT
}

/// password_reset_request
///
/// [Public Route] Issues a short-lived, purpose-scoped reset token for the
/// account matching the given email. Mail delivery is out of scope, so the
/// token is returned directly in the response body.
pub async fn password_reset_request(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetRequest>,
) -> Result<Json<PasswordResetResponse>, ApiError> {
    let user = state
        .repo
        .find_user_by_email(&payload.email)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| ApiError::validation("email", "no user found with this email"))?;

    let reset_token = issue_reset_token(user.id, &state.config)?;
    Ok(Json(PasswordResetResponse {
        message: format!("recovery token generated for {}", user.email),
        reset_token,
    }))
}

/// password_reset_confirm
///
/// [Public Route] Validates the reset token and replaces the account password.
pub async fn password_reset_confirm(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetConfirmRequest>,
) -> Result<Json<Value>, ApiError> {
    let user_id = verify_reset_token(&payload.token, &state.config)?;

    let mut user = state
        .repo
        .find_user(user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| ApiError::validation("token", "invalid or expired token"))?;

    validate_password_strength(&payload.new_password, &user.username)
        .map_err(|msg| ApiError::validation("new_password", msg))?;

    user.password_hash = hash_password(&payload.new_password)?;
    state.repo.update_user(user).await?;

    Ok(Json(json!({ "message": "password updated successfully" })))
}
