use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    models::{CreateMediaRequest, MediaAttachment, PageQuery, Paginated, UpdateMediaRequest},
    policy::{self, Operation, PostScope, Resource},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;

/// list_media
///
/// [Authenticated Route] Paginated listing of media attachments.
pub async fn list_media(
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Paginated<MediaAttachment>>, ApiError> {
    let (media, count) = state.repo.list_media(page).await?;
    Ok(Json(Paginated::new(media, count, page)))
}

/// get_media
pub async fn get_media(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MediaAttachment>, ApiError> {
    state
        .repo
        .find_media(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("media attachment"))
}

/// create_media
///
/// [Admin Route] Attaches a media record to a post. The post must exist; the
/// lookup is unscoped since an admin is the only role that reaches this point.
pub async fn create_media(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateMediaRequest>,
) -> Result<(StatusCode, Json<MediaAttachment>), ApiError> {
    policy::authorize(auth.role, Resource::Media, Operation::Create)?;

    state
        .repo
        .find_post(payload.post_id, PostScope::All)
        .await?
        .ok_or_else(|| ApiError::validation("post_id", "unknown post"))?;

    let media = MediaAttachment {
        id: Uuid::new_v4(),
        post_id: payload.post_id,
        kind: payload.kind,
        file: payload.file,
        description: payload.description,
        created_at: Utc::now(),
    };

    let created = state.repo.create_media(media).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// update_media
///
/// [Admin Route] Replaces the provided fields of an attachment. The owning post
/// never changes; re-attaching means delete and create.
pub async fn update_media(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateMediaRequest>,
) -> Result<Json<MediaAttachment>, ApiError> {
    policy::authorize(auth.role, Resource::Media, Operation::Update)?;

    let mut media = state
        .repo
        .find_media(id)
        .await?
        .ok_or(ApiError::NotFound("media attachment"))?;

    if let Some(kind) = payload.kind {
        media.kind = kind;
    }
    if let Some(file) = payload.file {
        media.file = file;
    }
    if let Some(description) = payload.description {
        media.description = Some(description);
    }

    let updated = state.repo.update_media(media).await?;
    Ok(Json(updated))
}

/// delete_media
///
/// [Admin Route] The only hard delete in the system: attachments have no
/// independent lifecycle worth preserving.
pub async fn delete_media(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    policy::authorize(auth.role, Resource::Media, Operation::Destroy)?;

    if state.repo.delete_media(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("media attachment"))
    }
}
