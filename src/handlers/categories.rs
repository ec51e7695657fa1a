use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    models::{
        Category, CreateCategoryRequest, PageQuery, Paginated, UpdateCategoryRequest,
        normalize_category_name,
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

/// list_categories
///
/// [Authenticated Route] Paginated category listing. Admins also see the
/// deactivated ones; everyone else gets the active set.
pub async fn list_categories(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Paginated<Category>>, ApiError> {
    let (categories, count) = state
        .repo
        .list_categories(sees_inactive(auth.role), page)
        .await?;
    Ok(Json(Paginated::new(categories, count, page)))
}

/// get_category
pub async fn get_category(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Category>, ApiError> {
    state
        .repo
        .find_category(id, sees_inactive(auth.role))
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("category"))
}

/// create_category
///
/// [Admin Route] Creates a category. The name is normalized (trimmed,
/// title-cased) before the uniqueness constraint applies, so "  rust  " and
/// "RUST" collapse into the same record.
pub async fn create_category(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    policy::authorize(auth.role, Resource::Category, Operation::Create)?;

    let name = normalize_category_name(&payload.name)?;
    let now = Utc::now();
    let category = Category {
        id: Uuid::new_v4(),
        name,
        is_active: true,
        created_by: auth.display_name,
        created_at: now,
        updated_by: None,
        updated_at: now,
        deleted_by: None,
        deleted_at: None,
    };

    let created = state.repo.create_category(category).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// update_category
///
/// [Admin Route] Renames a category; the new name goes through the same
/// normalization as creation.
pub async fn update_category(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> Result<Json<Category>, ApiError> {
    policy::authorize(auth.role, Resource::Category, Operation::Update)?;

    let mut category = state
        .repo
        .find_category(id, true)
        .await?
        .ok_or(ApiError::NotFound("category"))?;

    if let Some(name) = payload.name {
        category.name = normalize_category_name(&name)?;
    }
    category.updated_by = Some(auth.display_name);

    let updated = state.repo.update_category(category).await?;
    Ok(Json(updated))
}

/// delete_category
///
/// [Admin Route] Soft-delete: marks the category inactive and records the
/// deletion stamps. Posts referencing it keep their reference.
pub async fn delete_category(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    policy::authorize(auth.role, Resource::Category, Operation::Destroy)?;

    let mut category = state
        .repo
        .find_category(id, true)
        .await?
        .ok_or(ApiError::NotFound("category"))?;

    category.is_active = false;
    category.deleted_by = Some(auth.display_name.clone());
    category.deleted_at = Some(Utc::now());
    category.updated_by = Some(auth.display_name);

    state.repo.update_category(category).await?;
    Ok(StatusCode::NO_CONTENT)
}
