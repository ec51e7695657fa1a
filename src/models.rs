use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

use crate::error::ApiError;

// --- Enumerations ---

/// Role
///
/// The access tier derived from a user's flags. Every policy decision is expressed
/// in terms of this enum rather than raw booleans scattered through handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Reader,
    Writer,
    Admin,
}

/// PostState
///
/// The post lifecycle tag. A post's "active" flag is derived from it: a post is
/// active iff it is not archived. Keeping a single tag removes the invalid
/// combination of an archived-but-active record that two independent fields allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostState {
    Draft,
    Published,
    Archived,
}

impl PostState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostState::Draft => "draft",
            PostState::Published => "published",
            PostState::Archived => "archived",
        }
    }
}

/// Raised when a stored tag value does not match any known variant. Only reachable
/// if the database contains a value this build does not know about.
#[derive(Debug, Error)]
#[error("unknown tag value: {0}")]
pub struct UnknownTag(String);

impl TryFrom<String> for PostState {
    type Error = UnknownTag;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "draft" => Ok(PostState::Draft),
            "published" => Ok(PostState::Published),
            "archived" => Ok(PostState::Archived),
            _ => Err(UnknownTag(value)),
        }
    }
}

/// MediaKind
///
/// The kind tag on a media attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

impl TryFrom<String> for MediaKind {
    type Error = UnknownTag;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            _ => Err(UnknownTag(value)),
        }
    }
}

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Canonical identity record from the `users` table. Soft-deleted via `is_active`
/// plus deletion stamps; never physically removed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_writer: bool,
    pub is_staff: bool,
    pub is_active: bool,
    // Never leaves the server. `default` keeps the struct deserializable in tests.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_by: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// The access tier this identity operates at. Staff outranks writer.
    pub fn role(&self) -> Role {
        if self.is_staff {
            Role::Admin
        } else if self.is_writer {
            Role::Writer
        } else {
            Role::Reader
        }
    }

    /// Display name used for audit stamps: "First Last", falling back to the
    /// username when both name fields are blank.
    pub fn full_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string();
        if full.is_empty() {
            self.username.clone()
        } else {
            full
        }
    }
}

impl Default for User {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username: String::new(),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            is_writer: false,
            is_staff: false,
            is_active: true,
            password_hash: String::new(),
            created_at: now,
            updated_at: now,
            deleted_by: None,
            deleted_at: None,
        }
    }
}

/// Category
///
/// A content category from the `categories` table. The name is unique after
/// normalization (trimmed, title-cased). Soft-deleted via `is_active` + stamps.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub deleted_by: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Post
///
/// An article from the `posts` table. Owned by its author for mutation purposes;
/// visibility depends on the requester's role. The lifecycle tag is the single
/// source of truth for the soft-delete status.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub category_id: Option<Uuid>,
    pub title: String,
    pub summary: Option<String>,
    pub body: String,
    pub cover_image: Option<String>,
    pub keywords: Option<String>,
    #[sqlx(try_from = "String")]
    pub state: PostState,
    pub published_at: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub deleted_by: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Post {
    /// Derived activity flag: archived posts are the inactive ones.
    pub fn is_active(&self) -> bool {
        self.state != PostState::Archived
    }
}

impl Default for Post {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            author_id: Uuid::nil(),
            category_id: None,
            title: String::new(),
            summary: None,
            body: String::new(),
            cover_image: None,
            keywords: None,
            state: PostState::Draft,
            published_at: None,
            created_by: String::new(),
            created_at: now,
            updated_by: None,
            updated_at: now,
            deleted_by: None,
            deleted_at: None,
        }
    }
}

/// MediaAttachment
///
/// A media record from the `media_attachments` table. Belongs to exactly one post
/// (cascade-deleted with it) and has no independent lifecycle — its destroy is the
/// only hard delete in the system.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MediaAttachment {
    pub id: Uuid,
    pub post_id: Uuid,
    #[sqlx(try_from = "String")]
    pub kind: MediaKind,
    pub file: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// Input payload for the public registration endpoint (POST /auth/register).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegisterRequest {
    /// Field-level validation: username presence, email format, password strength
    /// and confirmation match. All offending fields are reported in one pass.
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut fields = BTreeMap::new();
        if self.username.trim().is_empty() {
            fields.insert("username", "username is required".to_string());
        }
        if let Err(msg) = validate_email(&self.email) {
            fields.insert("email", msg);
        }
        if let Err(msg) = validate_password_strength(&self.password, &self.username) {
            fields.insert("password", msg);
        }
        if self.password != self.confirm_password {
            fields.insert("confirm_password", "passwords do not match".to_string());
        }
        if fields.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(fields))
        }
    }
}

/// Input payload for POST /auth/login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Output schema for a successful login: the signed bearer token plus the
/// resolved user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// Input payload for POST /auth/password-reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// Output schema for a reset request. Mail delivery is out of scope, so the
/// short-lived token is returned directly in the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetResponse {
    pub message: String,
    pub reset_token: String,
}

/// Input payload for POST /auth/password-reset-confirm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetConfirmRequest {
    pub token: String,
    pub new_password: String,
}

/// Input payload for POST /profile/change-password.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Partial update payload for the authenticated user's own profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// Input payload for the admin user-creation endpoint (POST /users).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    #[serde(default)]
    pub is_writer: bool,
    #[serde(default)]
    pub is_staff: bool,
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut fields = BTreeMap::new();
        if self.username.trim().is_empty() {
            fields.insert("username", "username is required".to_string());
        }
        if let Err(msg) = validate_email(&self.email) {
            fields.insert("email", msg);
        }
        if let Err(msg) = validate_password_strength(&self.password, &self.username) {
            fields.insert("password", msg);
        }
        if fields.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(fields))
        }
    }
}

/// Partial update payload for a user record (PUT/PATCH /users/{id}).
/// Role flags are only honored for admin requesters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_writer: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_staff: Option<bool>,
}

/// Input payload for submitting a new post (POST /posts).
/// The author is always the requester; any client-supplied author is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub summary: Option<String>,
    pub body: String,
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub state: Option<PostState>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl CreatePostRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_title(&self.title)?;
        validate_requested_state(self.state)
    }
}

/// Partial update payload for modifying an existing post (PUT/PATCH /posts/{id}).
/// Uses `Option<T>` throughout so only provided fields are touched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePostRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<PostState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl UpdatePostRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        validate_requested_state(self.state)
    }
}

/// Input payload for creating a category (POST /categories).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
}

/// Partial update payload for a category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCategoryRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Input payload for attaching media to a post (POST /media).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMediaRequest {
    pub post_id: Uuid,
    pub kind: MediaKind,
    pub file: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial update payload for a media attachment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateMediaRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<MediaKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// --- Pagination & Filtering ---

/// Page/page_size query parameters shared by all list endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

impl PageQuery {
    /// Effective page number, 1-based.
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Effective page size, clamped to the allowed range.
    pub fn page_size(&self) -> i64 {
        self.page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.page_size()
    }
}

/// Query parameters for the post listing endpoint: the filter set plus paging.
/// Kept flat because axum's Query extractor binds a single struct.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostListQuery {
    /// Substring match against the author's first or last name.
    pub author_name: Option<String>,
    /// Exact calendar date of publication.
    pub published_on: Option<NaiveDate>,
    /// Category id.
    pub category: Option<Uuid>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl PostListQuery {
    pub fn page_query(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// Paginated list envelope: total count plus page metadata around the results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub count: i64,
    pub total_pages: i64,
    pub current_page: i64,
    pub page_size: i64,
    pub results: Vec<T>,
}

impl<T> Paginated<T> {
    pub fn new(results: Vec<T>, count: i64, page: PageQuery) -> Self {
        let page_size = page.page_size();
        Self {
            count,
            total_pages: (count + page_size - 1) / page_size,
            current_page: page.page(),
            page_size,
            results,
        }
    }
}

// --- Field Validators ---

/// The archived state is never client-selectable: a post enters it only
/// through the delete endpoint, which also records the deletion stamps.
pub fn validate_requested_state(state: Option<PostState>) -> Result<(), ApiError> {
    if state == Some(PostState::Archived) {
        return Err(ApiError::validation(
            "state",
            "posts are archived through delete, not by setting the state",
        ));
    }
    Ok(())
}

/// A post title must be at least 10 characters long. Uniqueness is enforced by
/// the database constraint and surfaced as a field error on conflict.
pub fn validate_title(title: &str) -> Result<(), ApiError> {
    if title.chars().count() < 10 {
        return Err(ApiError::validation(
            "title",
            "the title must be at least 10 characters long",
        ));
    }
    Ok(())
}

/// Normalizes a category name: trim, then title-case each word. Rejects names
/// that are empty or whitespace-only before normalization is applied.
pub fn normalize_category_name(raw: &str) -> Result<String, ApiError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation(
            "name",
            "the name cannot be empty or just whitespace",
        ));
    }
    Ok(title_case(trimmed))
}

/// Uppercases the first letter of each whitespace-separated word and lowercases
/// the rest.
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Minimal structural email check: one '@' with a non-empty local part and a
/// dotted domain.
pub fn validate_email(email: &str) -> Result<(), String> {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None)
            if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') =>
        {
            Ok(())
        }
        _ => Err("invalid email format".to_string()),
    }
}

/// Password policy: at least 8 characters and must not contain the username.
pub fn validate_password_strength(password: &str, username: &str) -> Result<(), String> {
    if !username.is_empty()
        && password
            .to_lowercase()
            .contains(&username.to_lowercase())
    {
        return Err("the password cannot contain the username".to_string());
    }
    if password.chars().count() < 8 {
        return Err("the password must be at least 8 characters long".to_string());
    }
    Ok(())
}
