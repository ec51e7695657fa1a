use crate::error::ApiError;
use crate::models::{Category, MediaAttachment, PageQuery, Post, PostListQuery, User};
use crate::policy::PostScope;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

/// Repository Trait
///
/// The abstract contract for all persistence operations, letting handlers work
/// against `Arc<dyn Repository>` without knowing the concrete implementation
/// (Postgres in production, an in-memory mock in tests).
///
/// Visibility is part of the contract: post lookups take the requester's
/// `PostScope`, and user/category lookups take an `include_inactive` flag, so an
/// out-of-scope record and a missing record are the same `None` at this layer.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    /// Unscoped lookup used by the auth extractor and admin-only paths.
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, ApiError>;
    async fn find_user_scoped(
        &self,
        id: Uuid,
        include_inactive: bool,
    ) -> Result<Option<User>, ApiError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, ApiError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError>;
    async fn list_users(
        &self,
        include_inactive: bool,
        page: PageQuery,
    ) -> Result<(Vec<User>, i64), ApiError>;
    async fn create_user(&self, user: User) -> Result<User, ApiError>;
    /// Full-row write keyed by id.
    async fn update_user(&self, user: User) -> Result<User, ApiError>;

    // --- Categories ---
    async fn list_categories(
        &self,
        include_inactive: bool,
        page: PageQuery,
    ) -> Result<(Vec<Category>, i64), ApiError>;
    async fn find_category(
        &self,
        id: Uuid,
        include_inactive: bool,
    ) -> Result<Option<Category>, ApiError>;
    async fn create_category(&self, category: Category) -> Result<Category, ApiError>;
    async fn update_category(&self, category: Category) -> Result<Category, ApiError>;

    // --- Posts ---
    async fn list_posts(
        &self,
        scope: PostScope,
        query: &PostListQuery,
    ) -> Result<(Vec<Post>, i64), ApiError>;
    async fn find_post(&self, id: Uuid, scope: PostScope) -> Result<Option<Post>, ApiError>;
    async fn create_post(&self, post: Post) -> Result<Post, ApiError>;
    async fn update_post(&self, post: Post) -> Result<Post, ApiError>;

    // --- Media ---
    async fn list_media(&self, page: PageQuery)
    -> Result<(Vec<MediaAttachment>, i64), ApiError>;
    async fn find_media(&self, id: Uuid) -> Result<Option<MediaAttachment>, ApiError>;
    async fn create_media(&self, media: MediaAttachment)
    -> Result<MediaAttachment, ApiError>;
    async fn update_media(&self, media: MediaAttachment)
    -> Result<MediaAttachment, ApiError>;
    /// The only hard delete in the system. Returns false if nothing matched.
    async fn delete_media(&self, id: Uuid) -> Result<bool, ApiError>;
}

/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The Postgres-backed implementation of the `Repository` trait.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const POST_COLUMNS: &str = "p.id, p.author_id, p.category_id, p.title, p.summary, p.body, \
     p.cover_image, p.keywords, p.state, p.published_at, p.created_by, p.created_at, \
     p.updated_by, p.updated_at, p.deleted_by, p.deleted_at";

/// Appends the WHERE fragment for a post visibility scope. Both the listing and
/// the single-item lookup go through this, so the two can never disagree.
fn push_post_scope(builder: &mut QueryBuilder<'_, Postgres>, scope: PostScope) {
    match scope {
        PostScope::Nothing => {
            builder.push(" AND false");
        }
        PostScope::PublishedOnly => {
            builder.push(" AND p.state = 'published'");
        }
        PostScope::AuthoredBy(author_id) => {
            builder.push(" AND p.author_id = ");
            builder.push_bind(author_id);
            builder.push(" AND p.state <> 'archived'");
        }
        PostScope::All => {}
    }
}

/// Appends the optional post filters (author name, publication date, category).
fn push_post_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &PostListQuery) {
    if let Some(name) = &query.author_name {
        let pattern = format!("%{}%", name);
        builder.push(" AND (u.first_name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR u.last_name ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
    if let Some(date) = query.published_on {
        builder.push(" AND p.published_at::date = ");
        builder.push_bind(date);
    }
    if let Some(category) = query.category {
        builder.push(" AND p.category_id = ");
        builder.push_bind(category);
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_scoped(
        &self,
        id: Uuid,
        include_inactive: bool,
    ) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE id = $1 AND (is_active = true OR $2)",
        )
        .bind(id)
        .bind(include_inactive)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn list_users(
        &self,
        include_inactive: bool,
        page: PageQuery,
    ) -> Result<(Vec<User>, i64), ApiError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE (is_active = true OR $1) \
             ORDER BY username ASC LIMIT $2 OFFSET $3",
        )
        .bind(include_inactive)
        .bind(page.page_size())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE (is_active = true OR $1)")
                .bind(include_inactive)
                .fetch_one(&self.pool)
                .await?;

        Ok((users, count))
    }

    async fn create_user(&self, user: User) -> Result<User, ApiError> {
        let created = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, username, email, first_name, last_name, is_writer, \
             is_staff, is_active, password_hash, created_at, updated_at, deleted_by, deleted_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) RETURNING *",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.is_writer)
        .bind(user.is_staff)
        .bind(user.is_active)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(&user.deleted_by)
        .bind(user.deleted_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_user(&self, user: User) -> Result<User, ApiError> {
        let updated = sqlx::query_as::<_, User>(
            "UPDATE users SET username = $2, email = $3, first_name = $4, last_name = $5, \
             is_writer = $6, is_staff = $7, is_active = $8, password_hash = $9, \
             updated_at = NOW(), deleted_by = $10, deleted_at = $11 \
             WHERE id = $1 RETURNING *",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.is_writer)
        .bind(user.is_staff)
        .bind(user.is_active)
        .bind(&user.password_hash)
        .bind(&user.deleted_by)
        .bind(user.deleted_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(updated)
    }

    // --- CATEGORIES ---

    async fn list_categories(
        &self,
        include_inactive: bool,
        page: PageQuery,
    ) -> Result<(Vec<Category>, i64), ApiError> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE (is_active = true OR $1) \
             ORDER BY name ASC LIMIT $2 OFFSET $3",
        )
        .bind(include_inactive)
        .bind(page.page_size())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE (is_active = true OR $1)")
                .bind(include_inactive)
                .fetch_one(&self.pool)
                .await?;

        Ok((categories, count))
    }

    async fn find_category(
        &self,
        id: Uuid,
        include_inactive: bool,
    ) -> Result<Option<Category>, ApiError> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE id = $1 AND (is_active = true OR $2)",
        )
        .bind(id)
        .bind(include_inactive)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    async fn create_category(&self, category: Category) -> Result<Category, ApiError> {
        let created = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (id, name, is_active, created_by, created_at, \
             updated_by, updated_at, deleted_by, deleted_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(category.is_active)
        .bind(&category.created_by)
        .bind(category.created_at)
        .bind(&category.updated_by)
        .bind(category.updated_at)
        .bind(&category.deleted_by)
        .bind(category.deleted_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_category(&self, category: Category) -> Result<Category, ApiError> {
        let updated = sqlx::query_as::<_, Category>(
            "UPDATE categories SET name = $2, is_active = $3, updated_by = $4, \
             updated_at = NOW(), deleted_by = $5, deleted_at = $6 \
             WHERE id = $1 RETURNING *",
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(category.is_active)
        .bind(&category.updated_by)
        .bind(&category.deleted_by)
        .bind(category.deleted_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(updated)
    }

    // --- POSTS ---

    /// Listing joins the author record so the name filter can match against it.
    /// The visibility scope and filters are assembled with QueryBuilder for safe
    /// parameterization.
    async fn list_posts(
        &self,
        scope: PostScope,
        query: &PostListQuery,
    ) -> Result<(Vec<Post>, i64), ApiError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {POST_COLUMNS} FROM posts p JOIN users u ON p.author_id = u.id WHERE true"
        ));
        push_post_scope(&mut builder, scope);
        push_post_filters(&mut builder, query);
        builder.push(" ORDER BY p.published_at DESC NULLS LAST, p.created_at DESC");
        builder.push(" LIMIT ");
        builder.push_bind(query.page_query().page_size());
        builder.push(" OFFSET ");
        builder.push_bind(query.page_query().offset());

        let posts = builder
            .build_query_as::<Post>()
            .fetch_all(&self.pool)
            .await?;

        let mut count_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT COUNT(*) FROM posts p JOIN users u ON p.author_id = u.id WHERE true",
        );
        push_post_scope(&mut count_builder, scope);
        push_post_filters(&mut count_builder, query);

        let count: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        Ok((posts, count))
    }

    async fn find_post(&self, id: Uuid, scope: PostScope) -> Result<Option<Post>, ApiError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = "));
        builder.push_bind(id);
        push_post_scope(&mut builder, scope);

        let post = builder
            .build_query_as::<Post>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    async fn create_post(&self, post: Post) -> Result<Post, ApiError> {
        let created = sqlx::query_as::<_, Post>(
            "INSERT INTO posts (id, author_id, category_id, title, summary, body, cover_image, \
             keywords, state, published_at, created_by, created_at, updated_by, updated_at, \
             deleted_by, deleted_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             RETURNING *",
        )
        .bind(post.id)
        .bind(post.author_id)
        .bind(post.category_id)
        .bind(&post.title)
        .bind(&post.summary)
        .bind(&post.body)
        .bind(&post.cover_image)
        .bind(&post.keywords)
        .bind(post.state.as_str())
        .bind(post.published_at)
        .bind(&post.created_by)
        .bind(post.created_at)
        .bind(&post.updated_by)
        .bind(post.updated_at)
        .bind(&post.deleted_by)
        .bind(post.deleted_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_post(&self, post: Post) -> Result<Post, ApiError> {
        let updated = sqlx::query_as::<_, Post>(
            "UPDATE posts SET category_id = $2, title = $3, summary = $4, body = $5, \
             cover_image = $6, keywords = $7, state = $8, published_at = $9, updated_by = $10, \
             updated_at = NOW(), deleted_by = $11, deleted_at = $12 \
             WHERE id = $1 RETURNING *",
        )
        .bind(post.id)
        .bind(post.category_id)
        .bind(&post.title)
        .bind(&post.summary)
        .bind(&post.body)
        .bind(&post.cover_image)
        .bind(&post.keywords)
        .bind(post.state.as_str())
        .bind(post.published_at)
        .bind(&post.updated_by)
        .bind(&post.deleted_by)
        .bind(post.deleted_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(updated)
    }

    // --- MEDIA ---

    async fn list_media(
        &self,
        page: PageQuery,
    ) -> Result<(Vec<MediaAttachment>, i64), ApiError> {
        let media = sqlx::query_as::<_, MediaAttachment>(
            "SELECT * FROM media_attachments ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(page.page_size())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM media_attachments")
            .fetch_one(&self.pool)
            .await?;

        Ok((media, count))
    }

    async fn find_media(&self, id: Uuid) -> Result<Option<MediaAttachment>, ApiError> {
        let media =
            sqlx::query_as::<_, MediaAttachment>("SELECT * FROM media_attachments WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(media)
    }

    async fn create_media(
        &self,
        media: MediaAttachment,
    ) -> Result<MediaAttachment, ApiError> {
        let created = sqlx::query_as::<_, MediaAttachment>(
            "INSERT INTO media_attachments (id, post_id, kind, file, description, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(media.id)
        .bind(media.post_id)
        .bind(media.kind.as_str())
        .bind(&media.file)
        .bind(&media.description)
        .bind(media.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_media(
        &self,
        media: MediaAttachment,
    ) -> Result<MediaAttachment, ApiError> {
        let updated = sqlx::query_as::<_, MediaAttachment>(
            "UPDATE media_attachments SET kind = $2, file = $3, description = $4 \
             WHERE id = $1 RETURNING *",
        )
        .bind(media.id)
        .bind(media.kind.as_str())
        .bind(&media.file)
        .bind(&media.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn delete_media(&self, id: Uuid) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM media_attachments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
