use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Defines endpoints that are **unauthenticated** and accessible to any client.
/// Only the health check and the identity gateway live here; every content
/// endpoint requires a resolved identity, since an anonymous requester's read
/// scope is empty by policy and would only ever see empty listings.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // A simple, unauthenticated endpoint used for monitoring and load balancer checks.
        // Returns "ok" immediately to verify the service is running and responsive.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/register
        // Self-service account creation. New accounts always start at the reader
        // tier; writer and staff flags can only be granted by an admin afterwards.
        .route("/auth/register", post(handlers::auth::register))
        // POST /auth/login
        // Credential verification and bearer token issuance. Deactivated accounts
        // are rejected with the same message as a bad password.
        .route("/auth/login", post(handlers::auth::login))
        // POST /auth/password-reset
        // Issues a short-lived, purpose-scoped reset token for the given email.
        .route(
            "/auth/password-reset",
            post(handlers::auth::password_reset_request),
        )
        // POST /auth/password-reset-confirm
        // Consumes a reset token and replaces the account password.
        .route(
            "/auth/password-reset-confirm",
            post(handlers::auth::password_reset_confirm),
        )
}
