use crate::{
    AppState,
    auth::{AuthUser, hash_password},
    error::ApiError,
    models::{
        CreateUserRequest, PageQuery, Paginated, Role, UpdateUserRequest, User, validate_email,
    },
    policy::{self, Operation, Resource, sees_inactive},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;

/// list_users
///
/// [Authenticated Route] Paginated account listing. Admins also see deactivated
/// accounts; everyone else gets the active set.
pub async fn list_users(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Paginated<User>>, ApiError> {
    let (users, count) = state.repo.list_users(sees_inactive(auth.role), page).await?;
    Ok(Json(Paginated::new(users, count, page)))
}

/// get_user
pub async fn get_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    state
        .repo
        .find_user_scoped(id, sees_inactive(auth.role))
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("user"))
}

/// create_user
///
/// [Admin Route] Creates an account with explicit role flags. Unlike public
/// registration, this path can mint writers and staff directly.
pub async fn create_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    policy::authorize(auth.role, Resource::User, Operation::Create)?;
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
        is_writer: payload.is_writer,
        is_staff: payload.is_staff,
        password_hash: hash_password(&payload.password)?,
        ..User::default()
    };

    let created = state.repo.create_user(user).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// update_user
///
/// [Authenticated Route] Updates an account record. Any authenticated user may
/// hit this endpoint, but role flag changes (is_writer/is_staff) are honored
/// only when the requester is an admin; anyone else gets a permission error.
pub async fn update_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    policy::authorize(auth.role, Resource::User, Operation::Update)?;

    if (payload.is_writer.is_some() || payload.is_staff.is_some()) && auth.role != Role::Admin {
        return Err(ApiError::Permission(
            "only administrators can change role flags".to_string(),
        ));
    }

    let mut user = state
        .repo
        .find_user_scoped(id, sees_inactive(auth.role))
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
    if let Some(is_writer) = payload.is_writer {
        user.is_writer = is_writer;
    }
    if let Some(is_staff) = payload.is_staff {
        user.is_staff = is_staff;
    }

    let updated = state.repo.update_user(user).await?;
    Ok(Json(updated))
}

/// delete_user
///
/// [Admin Route] Soft-delete: deactivates the account and records the deletion
/// stamps. The record stays in the table and admins can still see it.
pub async fn delete_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    policy::authorize(auth.role, Resource::User, Operation::Destroy)?;

    let mut user = state
        .repo
        .find_user_scoped(id, true)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    user.is_active = false;
    user.deleted_by = Some(auth.display_name);
    user.deleted_at = Some(Utc::now());

    state.repo.update_user(user).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// activate_user
///
/// [Admin Route] Named action: restores a deactivated account and clears its
/// deletion stamps. Only permitted while the account is inactive; activating
/// an already-active account is a conflict and leaves the record untouched.
pub async fn activate_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    policy::authorize(auth.role, Resource::User, Operation::Reactivate)?;

    let mut user = state
        .repo
        .find_user_scoped(id, true)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    if user.is_active {
        return Err(ApiError::Conflict("the user is already active".to_string()));
    }

    user.is_active = true;
    user.deleted_by = None;
    user.deleted_at = None;

    let updated = state.repo.update_user(user).await?;
    Ok(Json(updated))
}
