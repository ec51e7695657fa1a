use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{PostState, Role};

/// Resource
///
/// The four record families the policy table covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Post,
    Category,
    Media,
    User,
}

/// Operation
///
/// The operations a request can intend. `Reactivate` covers both the post
/// reactivate action and the user activate action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Retrieve,
    Create,
    Update,
    Destroy,
    Reactivate,
}

/// permits
///
/// The explicit {role, resource, operation} -> allow/deny table, evaluated once
/// per request. Every role-based decision in the application goes through this
/// single match so the access matrix is readable and unit-testable in one place.
///
/// Anonymous requesters never reach this table: the authentication layer rejects
/// them first, and the visibility policy independently maps "no identity" to an
/// empty read scope.
pub fn permits(role: Role, resource: Resource, operation: Operation) -> bool {
    use Operation::*;
    use Resource::*;

    match (resource, operation) {
        // Reading is open to every authenticated tier; what is readable is
        // decided by the visibility scope, not by this table.
        (_, List) | (_, Retrieve) => true,

        // Content authoring requires the writer role; admins qualify everywhere.
        (Post, Create) | (Post, Update) | (Post, Reactivate) => {
            matches!(role, Role::Writer | Role::Admin)
        }
        // Destroy (archive) deliberately carries no ownership requirement beyond
        // the role: any writer may archive any post. See DESIGN.md.
        (Post, Destroy) => matches!(role, Role::Writer | Role::Admin),

        // Taxonomy and media management is an admin concern.
        (Category, Create) | (Category, Update) | (Category, Destroy) => role == Role::Admin,
        (Media, Create) | (Media, Update) | (Media, Destroy) => role == Role::Admin,
        (Category, Reactivate) | (Media, Reactivate) => false,

        // Account management: any authenticated user may update a record (role
        // flag changes are additionally admin-gated in the handler), but only
        // admins create, deactivate or reactivate accounts.
        (User, Update) => true,
        (User, Create) | (User, Destroy) | (User, Reactivate) => role == Role::Admin,
    }
}

/// authorize
///
/// `permits` lifted into the error taxonomy for direct use in handlers.
pub fn authorize(role: Role, resource: Resource, operation: Operation) -> Result<(), ApiError> {
    if permits(role, resource, operation) {
        Ok(())
    } else {
        Err(ApiError::Permission(
            "you do not have permission to perform this action".to_string(),
        ))
    }
}

// --- Visibility ---

/// PostScope
///
/// The read-only view of the post collection a requester is entitled to. The
/// repository translates a scope into the matching WHERE clause, so the rule is
/// decided exactly once and cannot drift between the list and detail paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostScope {
    /// No identity: the listing is empty and every lookup misses.
    Nothing,
    /// Published, non-archived posts only.
    PublishedOnly,
    /// Posts authored by this identity, excluding archived ones.
    AuthoredBy(Uuid),
    /// Everything, archived included.
    All,
}

/// post_read_scope
///
/// Maps a requesting identity to its post visibility. Admins see everything,
/// writers see their own active work (drafts included), everyone else sees the
/// published feed. No identity yields the empty scope.
pub fn post_read_scope(requester: Option<(Uuid, Role)>) -> PostScope {
    match requester {
        None => PostScope::Nothing,
        Some((_, Role::Admin)) => PostScope::All,
        Some((id, Role::Writer)) => PostScope::AuthoredBy(id),
        Some((_, Role::Reader)) => PostScope::PublishedOnly,
    }
}

/// Whether a role may see inactive (soft-deleted) categories and users. Needed
/// so admins can reach a deactivated record in order to reactivate it.
pub fn sees_inactive(role: Role) -> bool {
    role == Role::Admin
}

// --- Ownership ---

/// The last gate before persisting a post update: only the author or an admin
/// may write. Runs after field validation so validation failures and ownership
/// failures surface as distinct errors.
pub fn can_modify_post(requester: Uuid, role: Role, author: Uuid) -> bool {
    role == Role::Admin || requester == author
}

// --- State Transitions ---

/// publication_timestamp
///
/// Entry to `published` by any path stamps the publication timestamp, but only
/// if it is currently unset; it is never cleared or re-stamped automatically.
pub fn publication_timestamp(
    state: PostState,
    current: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    match (state, current) {
        (PostState::Published, None) => Some(Utc::now()),
        (_, existing) => existing,
    }
}

/// reactivated_state
///
/// The reactivate transition: archived posts return to `published`; any other
/// starting state is a conflict and leaves the record untouched. The original
/// publication timestamp is retained by the caller (no re-stamp).
pub fn reactivated_state(current: PostState) -> Result<PostState, ApiError> {
    match current {
        PostState::Archived => Ok(PostState::Published),
        _ => Err(ApiError::Conflict("the post is not archived".to_string())),
    }
}
