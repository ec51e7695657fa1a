/// Router Module Index
///
/// Organizes the application's routing into security-segregated modules, so that
/// access control is applied explicitly at the module level (via Axum layers)
/// rather than scattered across handlers.
///
/// Two tiers are enough here: everything behind authentication shares a single
/// router, and the finer role distinctions (writer vs. admin) are decided by the
/// policy table inside the handlers, where the resolved `AuthUser` is available.

/// Routes accessible without credentials: health check and the auth gateway.
pub mod public;

/// Routes protected by the `AuthUser` extractor middleware.
/// Requires a validated identity.
pub mod authenticated;
