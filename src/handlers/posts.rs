use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    models::{CreatePostRequest, Paginated, Post, PostListQuery, PostState, UpdatePostRequest},
    policy::{
        self, Operation, PostScope, Resource, can_modify_post, post_read_scope,
        publication_timestamp, reactivated_state,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;

/// list_posts
///
/// [Authenticated Route] Paginated post listing. What the requester sees is
/// decided entirely by their visibility scope: admins get everything, writers
/// their own active work, readers the published feed.
pub async fn list_posts(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PostListQuery>,
) -> Result<Json<Paginated<Post>>, ApiError> {
    let scope = post_read_scope(Some((auth.id, auth.role)));
    let (posts, count) = state.repo.list_posts(scope, &query).await?;
    Ok(Json(Paginated::new(posts, count, query.page_query())))
}

/// get_post
///
/// [Authenticated Route] Single-item lookup through the same scope as the
/// listing, so an out-of-scope post is a plain 404.
pub async fn get_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Post>, ApiError> {
    let scope = post_read_scope(Some((auth.id, auth.role)));
    state
        .repo
        .find_post(id, scope)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("post"))
}

/// create_post
///
/// [Writer Route] Submits a new article. The author is always the requester,
/// overriding anything the client may have supplied. Creating directly in the
/// published state stamps the publication timestamp.
pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    policy::authorize(auth.role, Resource::Post, Operation::Create)?;
    payload.validate()?;

    if let Some(category_id) = payload.category_id {
        state
            .repo
            .find_category(category_id, true)
            .await?
            .ok_or_else(|| ApiError::validation("category_id", "unknown category"))?;
    }

    let post_state = payload.state.unwrap_or(PostState::Draft);
    let now = Utc::now();
    let post = Post {
        id: Uuid::new_v4(),
        author_id: auth.id,
        category_id: payload.category_id,
        title: payload.title,
        summary: payload.summary,
        body: payload.body,
        cover_image: payload.cover_image,
        keywords: payload.keywords,
        state: post_state,
        published_at: publication_timestamp(post_state, payload.published_at),
        created_by: auth.display_name,
        created_at: now,
        updated_by: None,
        updated_at: now,
        deleted_by: None,
        deleted_at: None,
    };

    let created = state.repo.create_post(post).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// update_post
///
/// [Writer Route] Full or partial update. Field validation and the staged write
/// happen first; ownership (author or admin) is the last gate before
/// persistence, so validation errors and permission errors surface separately.
pub async fn update_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<Post>, ApiError> {
    policy::authorize(auth.role, Resource::Post, Operation::Update)?;

    let scope = post_read_scope(Some((auth.id, auth.role)));
    let mut post = state
        .repo
        .find_post(id, scope)
        .await?
        .ok_or(ApiError::NotFound("post"))?;

    payload.validate()?;

    if let Some(category_id) = payload.category_id {
        state
            .repo
            .find_category(category_id, true)
            .await?
            .ok_or_else(|| ApiError::validation("category_id", "unknown category"))?;
        post.category_id = Some(category_id);
    }
    if let Some(title) = payload.title {
        post.title = title;
    }
    if let Some(summary) = payload.summary {
        post.summary = Some(summary);
    }
    if let Some(body) = payload.body {
        post.body = body;
    }
    if let Some(keywords) = payload.keywords {
        post.keywords = Some(keywords);
    }
    if let Some(cover_image) = payload.cover_image {
        post.cover_image = Some(cover_image);
    }
    if let Some(new_state) = payload.state {
        // Leaving the archived state is the reactivate action's job; the
        // generic update never moves a post out of (or into) it.
        if post.state == PostState::Archived {
            return Err(ApiError::Conflict(
                "archived posts are restored through reactivate".to_string(),
            ));
        }
        post.state = new_state;
    }
    if let Some(published_at) = payload.published_at {
        post.published_at = Some(published_at);
    }

    // Ownership is checked after the write is staged, never before validation.
    if !can_modify_post(auth.id, auth.role, post.author_id) {
        return Err(ApiError::Permission(
            "you cannot edit posts that are not yours".to_string(),
        ));
    }

    post.published_at = publication_timestamp(post.state, post.published_at);
    post.updated_by = Some(auth.display_name);

    let updated = state.repo.update_post(post).await?;
    Ok(Json(updated))
}

/// delete_post
///
/// [Writer Route] Soft-delete: archives the post and records deletion stamps.
/// No physical delete, and no ownership gate beyond the role table — though in
/// practice a non-admin writer can only reach posts inside their own scope.
/// Deleting an already-archived post is a conflict, so the original deletion
/// stamps are never overwritten.
pub async fn delete_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    policy::authorize(auth.role, Resource::Post, Operation::Destroy)?;

    let scope = post_read_scope(Some((auth.id, auth.role)));
    let mut post = state
        .repo
        .find_post(id, scope)
        .await?
        .ok_or(ApiError::NotFound("post"))?;

    if post.state == PostState::Archived {
        return Err(ApiError::Conflict(
            "the post is already archived".to_string(),
        ));
    }

    // The draft -> archived shortcut is intentional; no intermediate publish.
    post.state = PostState::Archived;
    post.deleted_by = Some(auth.display_name.clone());
    post.deleted_at = Some(Utc::now());
    post.updated_by = Some(auth.display_name);

    state.repo.update_post(post).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// reactivate_post
///
/// [Writer Route] Named action: brings an archived post back to published.
/// Any other starting state is a 409 and leaves the record untouched. The
/// original publication timestamp is retained, never re-stamped. Archived posts
/// sit outside a writer's read scope, so the lookup here is unscoped and the
/// author check is applied explicitly instead.
pub async fn reactivate_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Post>, ApiError> {
    policy::authorize(auth.role, Resource::Post, Operation::Reactivate)?;

    let mut post = state
        .repo
        .find_post(id, PostScope::All)
        .await?
        .ok_or(ApiError::NotFound("post"))?;

    if !can_modify_post(auth.id, auth.role, post.author_id) {
        return Err(ApiError::NotFound("post"));
    }

    post.state = reactivated_state(post.state)?;
    post.deleted_by = None;
    post.deleted_at = None;
    post.updated_by = Some(auth.display_name);

    let updated = state.repo.update_post(post).await?;
    Ok(Json(updated))
}
