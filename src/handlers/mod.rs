// Handler modules, one per resource. Every handler receives the resolved
// `AuthUser` where authentication is required and consults the policy module
// before touching the repository.

pub mod auth;
pub mod categories;
pub mod media;
pub mod posts;
pub mod profile;
pub mod users;
