use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Defines the routes accessible to any requester who has passed the
/// authentication layer. Every handler here receives a validated `AuthUser`
/// struct carrying the user's id, role and display name.
///
/// Access Control Strategy:
/// Authentication is guaranteed by the `auth_middleware` layer above this
/// module; authorization is decided per handler through the central policy
/// table, so writer-only and admin-only operations share this router rather
/// than being split into separate trees.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /auth/logout
        // Acknowledges the logout; tokens are stateless and expire on their own.
        .route("/auth/logout", post(handlers::auth::logout))
        // --- Own Profile ---
        // GET/PUT /profile
        // Retrieves or partially updates the requester's own record. Role flags
        // are not reachable through this endpoint.
        .route(
            "/profile",
            get(handlers::profile::get_profile).put(handlers::profile::update_profile),
        )
        // POST /profile/change-password
        // Replaces the requester's password after re-verifying the current one.
        .route(
            "/profile/change-password",
            post(handlers::profile::change_password),
        )
        // --- Posts ---
        // GET/POST /posts
        // Listing is filtered by the requester's visibility scope; creation is
        // writer-tier and always records the requester as the author.
        .route(
            "/posts",
            get(handlers::posts::list_posts).post(handlers::posts::create_post),
        )
        // GET/PUT/DELETE /posts/{id}
        // Detail lookup shares the listing scope. Updates require authorship
        // (or the admin role); DELETE is a soft-delete that archives the post.
        .route(
            "/posts/{id}",
            get(handlers::posts::get_post)
                .put(handlers::posts::update_post)
                .delete(handlers::posts::delete_post),
        )
        // POST /posts/{id}/reactivate
        // Named action: archived -> published, retaining the original
        // publication timestamp. Any other starting state is a 409.
        .route(
            "/posts/{id}/reactivate",
            post(handlers::posts::reactivate_post),
        )
        // --- Categories (mutations are admin-only) ---
        .route(
            "/categories",
            get(handlers::categories::list_categories).post(handlers::categories::create_category),
        )
        .route(
            "/categories/{id}",
            get(handlers::categories::get_category)
                .put(handlers::categories::update_category)
                .delete(handlers::categories::delete_category),
        )
        // --- Media attachments (mutations are admin-only) ---
        .route(
            "/media",
            get(handlers::media::list_media).post(handlers::media::create_media),
        )
        // DELETE here is the only hard delete in the system.
        .route(
            "/media/{id}",
            get(handlers::media::get_media)
                .put(handlers::media::update_media)
                .delete(handlers::media::delete_media),
        )
        // --- User administration ---
        // GET /users is open to any authenticated requester (admins also see
        // deactivated accounts); POST is admin-only.
        .route(
            "/users",
            get(handlers::users::list_users).post(handlers::users::create_user),
        )
        // PUT is open but role-flag changes inside it are admin-gated;
        // DELETE is an admin-only soft-delete (deactivation).
        .route(
            "/users/{id}",
            get(handlers::users::get_user)
                .put(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        // POST /users/{id}/activate
        // Named action: restores a deactivated account and clears its
        // deletion stamps.
        .route("/users/{id}/activate", post(handlers::users::activate_user))
}
