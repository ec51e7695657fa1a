use async_trait::async_trait;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use cms_portal::{
    AppState,
    auth::AuthUser,
    config::AppConfig,
    error::ApiError,
    handlers,
    models::{
        Category, CreateCategoryRequest, CreatePostRequest, MediaAttachment, MediaKind, PageQuery,
        Post, PostListQuery, PostState, Role, UpdatePostRequest, UpdateUserRequest, User,
    },
    policy::PostScope,
    repository::{Repository, RepositoryState},
};
use std::sync::{Arc, Mutex};
use tokio::test;
use uuid::Uuid;

// --- MOCK REPOSITORY IMPLEMENTATION ---

// In-memory repository backing the handler tests. Handlers depend on the
// Repository trait, so the whole persistence layer can be swapped for a few
// mutex-guarded vectors while keeping the scope and uniqueness semantics the
// real queries enforce.
#[derive(Default)]
pub struct MockRepository {
    pub users: Mutex<Vec<User>>,
    pub categories: Mutex<Vec<Category>>,
    pub posts: Mutex<Vec<Post>>,
    pub media: Mutex<Vec<MediaAttachment>>,
}

fn in_scope(post: &Post, scope: PostScope) -> bool {
    match scope {
        PostScope::Nothing => false,
        PostScope::PublishedOnly => post.state == PostState::Published,
        PostScope::AuthoredBy(id) => post.author_id == id && post.state != PostState::Archived,
        PostScope::All => true,
    }
}

fn paginate<T: Clone>(items: Vec<T>, page: PageQuery) -> (Vec<T>, i64) {
    let count = items.len() as i64;
    let page_items = items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.page_size() as usize)
        .collect();
    (page_items, count)
}

#[async_trait]
impl Repository for MockRepository {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, ApiError> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_scoped(
        &self,
        id: Uuid,
        include_inactive: bool,
    ) -> Result<Option<User>, ApiError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == id && (include_inactive || u.is_active))
            .cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, ApiError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list_users(
        &self,
        include_inactive: bool,
        page: PageQuery,
    ) -> Result<(Vec<User>, i64), ApiError> {
        let mut users: Vec<User> = self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| include_inactive || u.is_active)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(paginate(users, page))
    }

    async fn create_user(&self, user: User) -> Result<User, ApiError> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.username == user.username) {
            return Err(ApiError::validation("username", "already exists"));
        }
        if users.iter().any(|u| u.email == user.email) {
            return Err(ApiError::validation("email", "already exists"));
        }
        users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, user: User) -> Result<User, ApiError> {
        let mut users = self.users.lock().unwrap();
        let slot = users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or(ApiError::NotFound("user"))?;
        *slot = user.clone();
        Ok(user)
    }

    async fn list_categories(
        &self,
        include_inactive: bool,
        page: PageQuery,
    ) -> Result<(Vec<Category>, i64), ApiError> {
        let mut categories: Vec<Category> = self
            .categories
            .lock()
            .unwrap()
            .iter()
            .filter(|c| include_inactive || c.is_active)
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(paginate(categories, page))
    }

    async fn find_category(
        &self,
        id: Uuid,
        include_inactive: bool,
    ) -> Result<Option<Category>, ApiError> {
        Ok(self
            .categories
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id && (include_inactive || c.is_active))
            .cloned())
    }

    async fn create_category(&self, category: Category) -> Result<Category, ApiError> {
        let mut categories = self.categories.lock().unwrap();
        if categories.iter().any(|c| c.name == category.name) {
            return Err(ApiError::validation("name", "already exists"));
        }
        categories.push(category.clone());
        Ok(category)
    }

    async fn update_category(&self, category: Category) -> Result<Category, ApiError> {
        let mut categories = self.categories.lock().unwrap();
        let slot = categories
            .iter_mut()
            .find(|c| c.id == category.id)
            .ok_or(ApiError::NotFound("category"))?;
        *slot = category.clone();
        Ok(category)
    }

    async fn list_posts(
        &self,
        scope: PostScope,
        query: &PostListQuery,
    ) -> Result<(Vec<Post>, i64), ApiError> {
        let users = self.users.lock().unwrap().clone();
        let mut posts: Vec<Post> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| in_scope(p, scope))
            .filter(|p| query.category.is_none_or(|c| p.category_id == Some(c)))
            .filter(|p| {
                query
                    .published_on
                    .is_none_or(|d| p.published_at.map(|ts| ts.date_naive()) == Some(d))
            })
            .filter(|p| {
                query.author_name.as_deref().is_none_or(|needle| {
                    let needle = needle.to_lowercase();
                    users.iter().any(|u| {
                        u.id == p.author_id
                            && (u.first_name.to_lowercase().contains(&needle)
                                || u.last_name.to_lowercase().contains(&needle))
                    })
                })
            })
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(paginate(posts, query.page_query()))
    }

    async fn find_post(&self, id: Uuid, scope: PostScope) -> Result<Option<Post>, ApiError> {
        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id && in_scope(p, scope))
            .cloned())
    }

    async fn create_post(&self, post: Post) -> Result<Post, ApiError> {
        let mut posts = self.posts.lock().unwrap();
        if posts.iter().any(|p| p.title == post.title) {
            return Err(ApiError::validation("title", "already exists"));
        }
        posts.push(post.clone());
        Ok(post)
    }

    async fn update_post(&self, post: Post) -> Result<Post, ApiError> {
        let mut posts = self.posts.lock().unwrap();
        let slot = posts
            .iter_mut()
            .find(|p| p.id == post.id)
            .ok_or(ApiError::NotFound("post"))?;
        *slot = post.clone();
        Ok(post)
    }

    async fn list_media(
        &self,
        page: PageQuery,
    ) -> Result<(Vec<MediaAttachment>, i64), ApiError> {
        Ok(paginate(self.media.lock().unwrap().clone(), page))
    }

    async fn find_media(&self, id: Uuid) -> Result<Option<MediaAttachment>, ApiError> {
        Ok(self.media.lock().unwrap().iter().find(|m| m.id == id).cloned())
    }

    async fn create_media(&self, media: MediaAttachment) -> Result<MediaAttachment, ApiError> {
        self.media.lock().unwrap().push(media.clone());
        Ok(media)
    }

    async fn update_media(&self, media: MediaAttachment) -> Result<MediaAttachment, ApiError> {
        let mut attachments = self.media.lock().unwrap();
        let slot = attachments
            .iter_mut()
            .find(|m| m.id == media.id)
            .ok_or(ApiError::NotFound("media attachment"))?;
        *slot = media.clone();
        Ok(media)
    }

    async fn delete_media(&self, id: Uuid) -> Result<bool, ApiError> {
        let mut attachments = self.media.lock().unwrap();
        let before = attachments.len();
        attachments.retain(|m| m.id != id);
        Ok(attachments.len() < before)
    }
}

// --- TEST UTILITIES ---

const ADMIN_ID: Uuid = Uuid::from_u128(1);
const WRITER_ID: Uuid = Uuid::from_u128(2);
const OTHER_WRITER_ID: Uuid = Uuid::from_u128(3);
const READER_ID: Uuid = Uuid::from_u128(4);

fn test_state(repo: Arc<MockRepository>) -> AppState {
    AppState {
        repo: repo as RepositoryState,
        config: AppConfig::default(),
    }
}

fn admin() -> AuthUser {
    AuthUser {
        id: ADMIN_ID,
        role: Role::Admin,
        display_name: "Site Admin".to_string(),
    }
}

fn writer() -> AuthUser {
    AuthUser {
        id: WRITER_ID,
        role: Role::Writer,
        display_name: "Wendy Writer".to_string(),
    }
}

fn reader() -> AuthUser {
    AuthUser {
        id: READER_ID,
        role: Role::Reader,
        display_name: "Rita Reader".to_string(),
    }
}

fn seed_user(id: Uuid, username: &str, is_writer: bool, is_staff: bool) -> User {
    User {
        id,
        username: username.to_string(),
        email: format!("{username}@example.com"),
        is_writer,
        is_staff,
        ..User::default()
    }
}

fn seed_post(author_id: Uuid, title: &str, state: PostState) -> Post {
    Post {
        author_id,
        title: title.to_string(),
        body: "body text".to_string(),
        state,
        published_at: (state == PostState::Published).then(Utc::now),
        created_by: "seed".to_string(),
        ..Post::default()
    }
}

fn repo_with_posts(posts: Vec<Post>) -> Arc<MockRepository> {
    let repo = MockRepository::default();
    *repo.posts.lock().unwrap() = posts;
    Arc::new(repo)
}

// --- VISIBILITY TESTS ---

#[test]
async fn test_writer_listing_is_scoped_to_own_active_posts() {
    let repo = repo_with_posts(vec![
        seed_post(WRITER_ID, "my draft article here", PostState::Draft),
        seed_post(WRITER_ID, "my archived article here", PostState::Archived),
        seed_post(OTHER_WRITER_ID, "someone elses published piece", PostState::Published),
    ]);
    let state = test_state(repo);

    let result = handlers::posts::list_posts(
        writer(),
        State(state),
        Query(PostListQuery::default()),
    )
    .await;

    let Json(page) = result.unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.results[0].title, "my draft article here");
}

#[test]
async fn test_reader_listing_sees_published_only() {
    let repo = repo_with_posts(vec![
        seed_post(WRITER_ID, "a draft nobody sees yet", PostState::Draft),
        seed_post(WRITER_ID, "the published article one", PostState::Published),
        seed_post(OTHER_WRITER_ID, "the published article two", PostState::Published),
        seed_post(OTHER_WRITER_ID, "an archived article gone", PostState::Archived),
    ]);
    let state = test_state(repo);

    let result = handlers::posts::list_posts(
        reader(),
        State(state),
        Query(PostListQuery::default()),
    )
    .await;

    let Json(page) = result.unwrap();
    assert_eq!(page.count, 2);
    assert!(page.results.iter().all(|p| p.state == PostState::Published));
}

#[test]
async fn test_admin_listing_includes_archived() {
    let repo = repo_with_posts(vec![
        seed_post(WRITER_ID, "a draft nobody sees yet", PostState::Draft),
        seed_post(OTHER_WRITER_ID, "an archived article gone", PostState::Archived),
    ]);
    let state = test_state(repo);

    let result = handlers::posts::list_posts(
        admin(),
        State(state),
        Query(PostListQuery::default()),
    )
    .await;

    let Json(page) = result.unwrap();
    assert_eq!(page.count, 2);
}

#[test]
async fn test_foreign_draft_is_a_missing_record_for_writers() {
    let foreign = seed_post(OTHER_WRITER_ID, "a draft by someone else", PostState::Draft);
    let foreign_id = foreign.id;
    let state = test_state(repo_with_posts(vec![foreign]));

    let result = handlers::posts::get_post(writer(), State(state), Path(foreign_id)).await;

    // Out-of-scope lookups fail closed: 404, never 403.
    assert!(matches!(result.unwrap_err(), ApiError::NotFound(_)));
}

// --- POST MUTATION TESTS ---

#[test]
async fn test_reader_cannot_create_posts() {
    let state = test_state(Arc::new(MockRepository::default()));

    let payload = CreatePostRequest {
        title: "a perfectly valid title".to_string(),
        category_id: None,
        summary: None,
        body: "body".to_string(),
        keywords: None,
        cover_image: None,
        state: None,
        published_at: None,
    };

    let result = handlers::posts::create_post(reader(), State(state), Json(payload)).await;
    assert!(matches!(result.unwrap_err(), ApiError::Permission(_)));
}

#[test]
async fn test_create_post_defaults_to_draft_and_records_author() {
    let repo = Arc::new(MockRepository::default());
    let state = test_state(repo.clone());

    let payload = CreatePostRequest {
        title: "a perfectly valid title".to_string(),
        category_id: None,
        summary: None,
        body: "body".to_string(),
        keywords: None,
        cover_image: None,
        state: None,
        published_at: None,
    };

    let (status, Json(post)) = handlers::posts::create_post(writer(), State(state), Json(payload))
        .await
        .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(post.author_id, WRITER_ID);
    assert_eq!(post.state, PostState::Draft);
    assert!(post.published_at.is_none());
    assert_eq!(post.created_by, "Wendy Writer");
}

#[test]
async fn test_create_post_published_stamps_publication_time() {
    let state = test_state(Arc::new(MockRepository::default()));

    let payload = CreatePostRequest {
        title: "straight to the front page".to_string(),
        category_id: None,
        summary: None,
        body: "body".to_string(),
        keywords: None,
        cover_image: None,
        state: Some(PostState::Published),
        published_at: None,
    };

    let (_, Json(post)) = handlers::posts::create_post(writer(), State(state), Json(payload))
        .await
        .unwrap();

    assert_eq!(post.state, PostState::Published);
    assert!(post.published_at.is_some());
}

#[test]
async fn test_create_post_short_title_rejected() {
    let state = test_state(Arc::new(MockRepository::default()));

    let payload = CreatePostRequest {
        title: "too short".to_string(),
        category_id: None,
        summary: None,
        body: "body".to_string(),
        keywords: None,
        cover_image: None,
        state: None,
        published_at: None,
    };

    let result = handlers::posts::create_post(writer(), State(state), Json(payload)).await;
    assert!(matches!(result.unwrap_err(), ApiError::Validation(_)));
}

#[test]
async fn test_create_post_duplicate_title_is_field_error() {
    let state = test_state(repo_with_posts(vec![seed_post(
        OTHER_WRITER_ID,
        "an already taken headline",
        PostState::Published,
    )]));

    let payload = CreatePostRequest {
        title: "an already taken headline".to_string(),
        category_id: None,
        summary: None,
        body: "body".to_string(),
        keywords: None,
        cover_image: None,
        state: None,
        published_at: None,
    };

    let result = handlers::posts::create_post(writer(), State(state), Json(payload)).await;
    match result.unwrap_err() {
        ApiError::Validation(fields) => assert!(fields.contains_key("title")),
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[test]
async fn test_admin_can_update_foreign_post() {
    let foreign = seed_post(WRITER_ID, "the original headline here", PostState::Published);
    let foreign_id = foreign.id;
    let repo = repo_with_posts(vec![foreign]);
    let state = test_state(repo);

    let payload = UpdatePostRequest {
        summary: Some("an editorial summary".to_string()),
        ..UpdatePostRequest::default()
    };

    let Json(post) = handlers::posts::update_post(admin(), State(state), Path(foreign_id), Json(payload))
        .await
        .unwrap();

    assert_eq!(post.summary.as_deref(), Some("an editorial summary"));
    assert_eq!(post.author_id, WRITER_ID);
    assert_eq!(post.updated_by.as_deref(), Some("Site Admin"));
}

#[test]
async fn test_publishing_via_update_stamps_once() {
    let draft = seed_post(WRITER_ID, "a draft about to go live", PostState::Draft);
    let draft_id = draft.id;
    let repo = repo_with_posts(vec![draft]);
    let state = test_state(repo.clone());

    let payload = UpdatePostRequest {
        state: Some(PostState::Published),
        ..UpdatePostRequest::default()
    };

    let Json(post) = handlers::posts::update_post(
        writer(),
        State(state.clone()),
        Path(draft_id),
        Json(payload),
    )
    .await
    .unwrap();

    let first_stamp = post.published_at.expect("publishing must stamp the timestamp");

    // A second no-op update must not move the stamp.
    let Json(post) = handlers::posts::update_post(
        writer(),
        State(state),
        Path(draft_id),
        Json(UpdatePostRequest::default()),
    )
    .await
    .unwrap();

    assert_eq!(post.published_at, Some(first_stamp));
}

#[test]
async fn test_delete_post_archives_and_stamps() {
    let post = seed_post(WRITER_ID, "a post on its way out now", PostState::Published);
    let post_id = post.id;
    let repo = repo_with_posts(vec![post]);
    let state = test_state(repo.clone());

    let status = handlers::posts::delete_post(writer(), State(state), Path(post_id))
        .await
        .unwrap();

    assert_eq!(status, StatusCode::NO_CONTENT);

    let stored = repo.posts.lock().unwrap()[0].clone();
    assert_eq!(stored.state, PostState::Archived);
    assert!(!stored.is_active());
    assert_eq!(stored.deleted_by.as_deref(), Some("Wendy Writer"));
    assert!(stored.deleted_at.is_some());
}

#[test]
async fn test_update_cannot_archive_directly() {
    let post = seed_post(WRITER_ID, "a post that stays published", PostState::Published);
    let post_id = post.id;
    let repo = repo_with_posts(vec![post]);
    let state = test_state(repo.clone());

    let payload = UpdatePostRequest {
        state: Some(PostState::Archived),
        ..UpdatePostRequest::default()
    };

    let result =
        handlers::posts::update_post(writer(), State(state), Path(post_id), Json(payload)).await;

    // Archiving goes through delete so the deletion stamps get recorded; the
    // generic update rejects the state outright.
    match result.unwrap_err() {
        ApiError::Validation(fields) => assert!(fields.contains_key("state")),
        other => panic!("expected a validation error, got {other:?}"),
    }
    let stored = repo.posts.lock().unwrap()[0].clone();
    assert_eq!(stored.state, PostState::Published);
    assert!(stored.deleted_at.is_none());
}

#[test]
async fn test_update_cannot_unarchive_either() {
    let mut post = seed_post(WRITER_ID, "an archived post held back", PostState::Published);
    post.state = PostState::Archived;
    let post_id = post.id;
    let repo = repo_with_posts(vec![post]);
    let state = test_state(repo.clone());

    let payload = UpdatePostRequest {
        state: Some(PostState::Published),
        ..UpdatePostRequest::default()
    };

    // Admin scope reaches the archived post, but leaving the archived state is
    // reserved for the reactivate action.
    let result =
        handlers::posts::update_post(admin(), State(state), Path(post_id), Json(payload)).await;

    assert!(matches!(result.unwrap_err(), ApiError::Conflict(_)));
    assert_eq!(repo.posts.lock().unwrap()[0].state, PostState::Archived);
}

#[test]
async fn test_delete_already_archived_post_is_conflict() {
    let mut post = seed_post(WRITER_ID, "a post already taken down", PostState::Published);
    post.state = PostState::Archived;
    post.deleted_by = Some("First Remover".to_string());
    let first_stamp = Utc::now() - chrono::Duration::days(3);
    post.deleted_at = Some(first_stamp);
    let post_id = post.id;
    let repo = repo_with_posts(vec![post]);
    let state = test_state(repo.clone());

    let result = handlers::posts::delete_post(admin(), State(state), Path(post_id)).await;

    assert!(matches!(result.unwrap_err(), ApiError::Conflict(_)));

    // The original deletion audit record survives untouched.
    let stored = repo.posts.lock().unwrap()[0].clone();
    assert_eq!(stored.deleted_by.as_deref(), Some("First Remover"));
    assert_eq!(stored.deleted_at, Some(first_stamp));
}

// --- REACTIVATE TESTS ---

#[test]
async fn test_reactivate_restores_archived_post() {
    let mut post = seed_post(WRITER_ID, "an archived post coming back", PostState::Published);
    let original_stamp = post.published_at;
    post.state = PostState::Archived;
    post.deleted_by = Some("Wendy Writer".to_string());
    post.deleted_at = Some(Utc::now());
    let post_id = post.id;
    let state = test_state(repo_with_posts(vec![post]));

    let Json(restored) = handlers::posts::reactivate_post(writer(), State(state), Path(post_id))
        .await
        .unwrap();

    assert_eq!(restored.state, PostState::Published);
    assert!(restored.is_active());
    // The original publication timestamp survives; reactivation never re-stamps.
    assert_eq!(restored.published_at, original_stamp);
    assert!(restored.deleted_by.is_none());
    assert!(restored.deleted_at.is_none());
}

#[test]
async fn test_reactivate_non_archived_post_is_conflict() {
    let post = seed_post(WRITER_ID, "a live post left untouched", PostState::Published);
    let post_id = post.id;
    let repo = repo_with_posts(vec![post]);
    let state = test_state(repo.clone());

    let result = handlers::posts::reactivate_post(writer(), State(state), Path(post_id)).await;

    assert!(matches!(result.unwrap_err(), ApiError::Conflict(_)));
    // The record is untouched by the failed transition.
    assert_eq!(repo.posts.lock().unwrap()[0].state, PostState::Published);
}

#[test]
async fn test_reactivate_foreign_post_requires_admin() {
    let mut post = seed_post(OTHER_WRITER_ID, "someone elses archived work", PostState::Archived);
    post.deleted_at = Some(Utc::now());
    let post_id = post.id;
    let state = test_state(repo_with_posts(vec![post]));

    let result = handlers::posts::reactivate_post(writer(), State(state), Path(post_id)).await;
    assert!(matches!(result.unwrap_err(), ApiError::NotFound(_)));
}

// --- CATEGORY TESTS ---

#[test]
async fn test_writer_cannot_create_categories() {
    let state = test_state(Arc::new(MockRepository::default()));

    let payload = CreateCategoryRequest {
        name: "tech".to_string(),
    };

    let result = handlers::categories::create_category(writer(), State(state), Json(payload)).await;
    assert!(matches!(result.unwrap_err(), ApiError::Permission(_)));
}

#[test]
async fn test_create_category_normalizes_name() {
    let state = test_state(Arc::new(MockRepository::default()));

    let payload = CreateCategoryRequest {
        name: "  rust PROGRAMMING  ".to_string(),
    };

    let (status, Json(category)) =
        handlers::categories::create_category(admin(), State(state), Json(payload))
            .await
            .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(category.name, "Rust Programming");
    assert!(category.is_active);
}

#[test]
async fn test_create_category_blank_name_rejected() {
    let state = test_state(Arc::new(MockRepository::default()));

    let payload = CreateCategoryRequest {
        name: "   ".to_string(),
    };

    let result = handlers::categories::create_category(admin(), State(state), Json(payload)).await;
    assert!(matches!(result.unwrap_err(), ApiError::Validation(_)));
}

#[test]
async fn test_inactive_categories_hidden_from_non_admins() {
    let repo = MockRepository::default();
    *repo.categories.lock().unwrap() = vec![
        Category {
            id: Uuid::new_v4(),
            name: "Active".to_string(),
            is_active: true,
            created_by: "seed".to_string(),
            created_at: Utc::now(),
            updated_by: None,
            updated_at: Utc::now(),
            deleted_by: None,
            deleted_at: None,
        },
        Category {
            id: Uuid::new_v4(),
            name: "Retired".to_string(),
            is_active: false,
            created_by: "seed".to_string(),
            created_at: Utc::now(),
            updated_by: None,
            updated_at: Utc::now(),
            deleted_by: Some("seed".to_string()),
            deleted_at: Some(Utc::now()),
        },
    ];
    let repo = Arc::new(repo);

    let Json(page) = handlers::categories::list_categories(
        reader(),
        State(test_state(repo.clone())),
        Query(PageQuery::default()),
    )
    .await
    .unwrap();
    assert_eq!(page.count, 1);

    let Json(page) = handlers::categories::list_categories(
        admin(),
        State(test_state(repo)),
        Query(PageQuery::default()),
    )
    .await
    .unwrap();
    assert_eq!(page.count, 2);
}

// --- MEDIA TESTS ---

#[test]
async fn test_create_media_requires_existing_post() {
    let state = test_state(Arc::new(MockRepository::default()));

    let payload = cms_portal::models::CreateMediaRequest {
        post_id: Uuid::new_v4(),
        kind: MediaKind::Image,
        file: "covers/img.png".to_string(),
        description: None,
    };

    let result = handlers::media::create_media(admin(), State(state), Json(payload)).await;
    assert!(matches!(result.unwrap_err(), ApiError::Validation(_)));
}

#[test]
async fn test_delete_media_is_hard_delete() {
    let post = seed_post(WRITER_ID, "a post carrying an image", PostState::Published);
    let repo = repo_with_posts(vec![post.clone()]);
    let media = MediaAttachment {
        id: Uuid::new_v4(),
        post_id: post.id,
        kind: MediaKind::Image,
        file: "covers/img.png".to_string(),
        description: None,
        created_at: Utc::now(),
    };
    let media_id = media.id;
    repo.media.lock().unwrap().push(media);
    let state = test_state(repo.clone());

    let status = handlers::media::delete_media(admin(), State(state), Path(media_id))
        .await
        .unwrap();

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(repo.media.lock().unwrap().is_empty());

    // A second delete finds nothing.
    let result =
        handlers::media::delete_media(admin(), State(test_state(repo)), Path(media_id)).await;
    assert!(matches!(result.unwrap_err(), ApiError::NotFound(_)));
}

// --- USER ADMINISTRATION TESTS ---

#[test]
async fn test_role_flag_changes_are_admin_gated() {
    let repo = MockRepository::default();
    repo.users
        .lock()
        .unwrap()
        .push(seed_user(READER_ID, "rita", false, false));
    let state = test_state(Arc::new(repo));

    let payload = UpdateUserRequest {
        is_writer: Some(true),
        ..UpdateUserRequest::default()
    };

    let result =
        handlers::users::update_user(reader(), State(state), Path(READER_ID), Json(payload)).await;
    assert!(matches!(result.unwrap_err(), ApiError::Permission(_)));
}

#[test]
async fn test_admin_promotes_reader_to_writer() {
    let repo = MockRepository::default();
    repo.users
        .lock()
        .unwrap()
        .push(seed_user(READER_ID, "rita", false, false));
    let state = test_state(Arc::new(repo));

    let payload = UpdateUserRequest {
        is_writer: Some(true),
        ..UpdateUserRequest::default()
    };

    let Json(user) =
        handlers::users::update_user(admin(), State(state), Path(READER_ID), Json(payload))
            .await
            .unwrap();

    assert!(user.is_writer);
    assert_eq!(user.role(), Role::Writer);
}

#[test]
async fn test_deactivate_then_activate_round_trip() {
    let repo = MockRepository::default();
    repo.users
        .lock()
        .unwrap()
        .push(seed_user(WRITER_ID, "wendy", true, false));
    let repo = Arc::new(repo);

    let status =
        handlers::users::delete_user(admin(), State(test_state(repo.clone())), Path(WRITER_ID))
            .await
            .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);

    {
        let users = repo.users.lock().unwrap();
        assert!(!users[0].is_active);
        assert!(users[0].deleted_at.is_some());
        assert_eq!(users[0].deleted_by.as_deref(), Some("Site Admin"));
    }

    // Deactivated accounts are invisible to non-admin lookups.
    let result = handlers::users::get_user(
        reader(),
        State(test_state(repo.clone())),
        Path(WRITER_ID),
    )
    .await;
    assert!(matches!(result.unwrap_err(), ApiError::NotFound(_)));

    let Json(user) =
        handlers::users::activate_user(admin(), State(test_state(repo)), Path(WRITER_ID))
            .await
            .unwrap();

    assert!(user.is_active);
    assert!(user.deleted_by.is_none());
    assert!(user.deleted_at.is_none());
}

#[test]
async fn test_activate_already_active_user_is_conflict() {
    let repo = MockRepository::default();
    repo.users
        .lock()
        .unwrap()
        .push(seed_user(WRITER_ID, "wendy", true, false));
    let repo = Arc::new(repo);

    let result =
        handlers::users::activate_user(admin(), State(test_state(repo.clone())), Path(WRITER_ID))
            .await;

    assert!(matches!(result.unwrap_err(), ApiError::Conflict(_)));
    // The record is untouched by the rejected action.
    assert!(repo.users.lock().unwrap()[0].is_active);
}

#[test]
async fn test_non_admin_cannot_deactivate_accounts() {
    let repo = MockRepository::default();
    repo.users
        .lock()
        .unwrap()
        .push(seed_user(READER_ID, "rita", false, false));
    let state = test_state(Arc::new(repo));

    let result = handlers::users::delete_user(writer(), State(state), Path(READER_ID)).await;
    assert!(matches!(result.unwrap_err(), ApiError::Permission(_)));
}

// --- AUTH FLOW TESTS ---

#[test]
async fn test_register_creates_reader_account() {
    let repo = Arc::new(MockRepository::default());

    let payload = cms_portal::models::RegisterRequest {
        username: "newreader".to_string(),
        email: "newreader@example.com".to_string(),
        first_name: "New".to_string(),
        last_name: "Reader".to_string(),
        password: "a fine passphrase".to_string(),
        confirm_password: "a fine passphrase".to_string(),
    };

    let (status, Json(user)) =
        handlers::auth::register(State(test_state(repo.clone())), Json(payload))
            .await
            .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user.role(), Role::Reader);
    assert!(user.is_active);

    // The stored credential is a hash, never the raw password.
    let stored = repo.users.lock().unwrap()[0].clone();
    assert_ne!(stored.password_hash, "a fine passphrase");

    // Login round-trip with the registered credentials.
    let login = cms_portal::models::LoginRequest {
        username: "newreader".to_string(),
        password: "a fine passphrase".to_string(),
    };
    let Json(response) = handlers::auth::login(State(test_state(repo)), Json(login))
        .await
        .unwrap();
    assert!(!response.token.is_empty());
    assert_eq!(response.user.username, "newreader");
}

#[test]
async fn test_register_duplicate_username_rejected() {
    let repo = MockRepository::default();
    repo.users
        .lock()
        .unwrap()
        .push(seed_user(READER_ID, "taken", false, false));
    let state = test_state(Arc::new(repo));

    let payload = cms_portal::models::RegisterRequest {
        username: "taken".to_string(),
        email: "someone@example.com".to_string(),
        first_name: String::new(),
        last_name: String::new(),
        password: "a fine passphrase".to_string(),
        confirm_password: "a fine passphrase".to_string(),
    };

    let result = handlers::auth::register(State(state), Json(payload)).await;
    match result.unwrap_err() {
        ApiError::Validation(fields) => assert!(fields.contains_key("username")),
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[test]
async fn test_login_rejections_are_indistinguishable() {
    let repo = MockRepository::default();
    let mut active = seed_user(READER_ID, "rita", false, false);
    active.password_hash = cms_portal::auth::hash_password("her password").unwrap();
    let mut inactive = seed_user(WRITER_ID, "gone", false, false);
    inactive.password_hash = cms_portal::auth::hash_password("his password").unwrap();
    inactive.is_active = false;
    repo.users.lock().unwrap().extend([active, inactive]);
    let repo = Arc::new(repo);

    let attempts = [
        ("rita", "wrong password"),
        ("gone", "his password"),
        ("nobody", "whatever"),
    ];

    for (username, password) in attempts {
        let login = cms_portal::models::LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let result =
            handlers::auth::login(State(test_state(repo.clone())), Json(login)).await;
        match result.unwrap_err() {
            ApiError::Validation(fields) => assert!(fields.contains_key("credentials")),
            other => panic!("expected a validation error, got {other:?}"),
        }
    }
}

#[test]
async fn test_password_reset_flow() {
    let repo = MockRepository::default();
    let mut user = seed_user(READER_ID, "rita", false, false);
    user.password_hash = cms_portal::auth::hash_password("old passphrase").unwrap();
    repo.users.lock().unwrap().push(user);
    let repo = Arc::new(repo);

    let Json(issued) = handlers::auth::password_reset_request(
        State(test_state(repo.clone())),
        Json(cms_portal::models::PasswordResetRequest {
            email: "rita@example.com".to_string(),
        }),
    )
    .await
    .unwrap();

    handlers::auth::password_reset_confirm(
        State(test_state(repo.clone())),
        Json(cms_portal::models::PasswordResetConfirmRequest {
            token: issued.reset_token,
            new_password: "a brand new passphrase".to_string(),
        }),
    )
    .await
    .unwrap();

    // Old password is dead, the new one works.
    let old_login = cms_portal::models::LoginRequest {
        username: "rita".to_string(),
        password: "old passphrase".to_string(),
    };
    assert!(
        handlers::auth::login(State(test_state(repo.clone())), Json(old_login))
            .await
            .is_err()
    );

    let new_login = cms_portal::models::LoginRequest {
        username: "rita".to_string(),
        password: "a brand new passphrase".to_string(),
    };
    assert!(
        handlers::auth::login(State(test_state(repo)), Json(new_login))
            .await
            .is_ok()
    );
}

#[test]
async fn test_change_password_requires_current_password() {
    let repo = MockRepository::default();
    let mut user = seed_user(READER_ID, "rita", false, false);
    user.password_hash = cms_portal::auth::hash_password("current one").unwrap();
    repo.users.lock().unwrap().push(user);
    let state = test_state(Arc::new(repo));

    let payload = cms_portal::models::ChangePasswordRequest {
        old_password: "not the current one".to_string(),
        new_password: "a brand new passphrase".to_string(),
    };

    let result = handlers::profile::change_password(reader(), State(state), Json(payload)).await;
    match result.unwrap_err() {
        ApiError::Validation(fields) => assert!(fields.contains_key("old_password")),
        other => panic!("expected a validation error, got {other:?}"),
    }
}

// --- LIFECYCLE SCENARIOS ---

#[test]
async fn test_multi_identity_scenario() {
    let repo = Arc::new(MockRepository::default());
    let other_writer = AuthUser {
        id: OTHER_WRITER_ID,
        role: Role::Writer,
        display_name: "Walter Writer".to_string(),
    };

    // Writer A drafts a post.
    let payload = CreatePostRequest {
        title: "Draft Title Long Enough".to_string(),
        category_id: None,
        summary: None,
        body: "body".to_string(),
        keywords: None,
        cover_image: None,
        state: None,
        published_at: None,
    };
    let (_, Json(post)) =
        handlers::posts::create_post(writer(), State(test_state(repo.clone())), Json(payload))
            .await
            .unwrap();
    assert_eq!(post.state, PostState::Draft);
    assert_eq!(post.author_id, WRITER_ID);
    assert!(post.published_at.is_none());

    // Writer B cannot touch it; the foreign draft is outside B's scope.
    let foreign_update = UpdatePostRequest {
        body: Some("hijacked".to_string()),
        ..UpdatePostRequest::default()
    };
    let result = handlers::posts::update_post(
        other_writer,
        State(test_state(repo.clone())),
        Path(post.id),
        Json(foreign_update),
    )
    .await;
    assert!(result.is_err());
    assert_eq!(repo.posts.lock().unwrap()[0].body, "body");

    // Admin publishes: the publication timestamp is stamped now.
    let publish = UpdatePostRequest {
        state: Some(PostState::Published),
        ..UpdatePostRequest::default()
    };
    let Json(post) = handlers::posts::update_post(
        admin(),
        State(test_state(repo.clone())),
        Path(post.id),
        Json(publish),
    )
    .await
    .unwrap();
    let stamp = post.published_at.expect("publishing must stamp");

    // Admin soft-deletes: archived and inactive.
    handlers::posts::delete_post(admin(), State(test_state(repo.clone())), Path(post.id))
        .await
        .unwrap();
    {
        let stored = &repo.posts.lock().unwrap()[0];
        assert_eq!(stored.state, PostState::Archived);
        assert!(!stored.is_active());
    }

    // Admin reactivates: published again, active again, timestamp unchanged.
    let Json(post) =
        handlers::posts::reactivate_post(admin(), State(test_state(repo)), Path(post.id))
            .await
            .unwrap();
    assert_eq!(post.state, PostState::Published);
    assert!(post.is_active());
    assert_eq!(post.published_at, Some(stamp));
}

#[test]
async fn test_full_post_lifecycle() {
    let repo = Arc::new(MockRepository::default());

    // Draft submission.
    let payload = CreatePostRequest {
        title: "the full lifecycle article".to_string(),
        category_id: None,
        summary: None,
        body: "body".to_string(),
        keywords: None,
        cover_image: None,
        state: None,
        published_at: None,
    };
    let (_, Json(post)) =
        handlers::posts::create_post(writer(), State(test_state(repo.clone())), Json(payload))
            .await
            .unwrap();
    assert_eq!(post.state, PostState::Draft);

    // Invisible to readers while drafted.
    let Json(page) = handlers::posts::list_posts(
        reader(),
        State(test_state(repo.clone())),
        Query(PostListQuery::default()),
    )
    .await
    .unwrap();
    assert_eq!(page.count, 0);

    // Publish.
    let publish = UpdatePostRequest {
        state: Some(PostState::Published),
        ..UpdatePostRequest::default()
    };
    let Json(post) = handlers::posts::update_post(
        writer(),
        State(test_state(repo.clone())),
        Path(post.id),
        Json(publish),
    )
    .await
    .unwrap();
    let stamp = post.published_at.unwrap();

    // Now visible to readers.
    let Json(page) = handlers::posts::list_posts(
        reader(),
        State(test_state(repo.clone())),
        Query(PostListQuery::default()),
    )
    .await
    .unwrap();
    assert_eq!(page.count, 1);

    // Archive (soft delete): gone for readers again.
    handlers::posts::delete_post(writer(), State(test_state(repo.clone())), Path(post.id))
        .await
        .unwrap();
    let Json(page) = handlers::posts::list_posts(
        reader(),
        State(test_state(repo.clone())),
        Query(PostListQuery::default()),
    )
    .await
    .unwrap();
    assert_eq!(page.count, 0);

    // Reactivate: published again with the original timestamp.
    let Json(post) =
        handlers::posts::reactivate_post(writer(), State(test_state(repo)), Path(post.id))
            .await
            .unwrap();
    assert_eq!(post.state, PostState::Published);
    assert_eq!(post.published_at, Some(stamp));
}
