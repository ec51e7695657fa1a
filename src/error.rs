use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;

/// ApiError
///
/// The single error taxonomy for every operation in the application. Each variant maps
/// to exactly one HTTP status and one machine-checkable `code` string, so clients can
/// branch on the code while humans read the message. All errors are local to a single
/// request; nothing here is fatal to the process.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Field-level input rejection. Carries one message per offending field and is
    /// always recoverable by the client.
    #[error("validation failed")]
    Validation(BTreeMap<&'static str, String>),

    /// Wrong role or non-owner mutation. No partial state change has occurred.
    #[error("{0}")]
    Permission(String),

    /// Missing record, or a record outside the requester's visibility scope. The two
    /// are deliberately indistinguishable so lookups fail closed.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Invalid state transition (e.g. reactivating a post that is not archived).
    #[error("{0}")]
    Conflict(String),

    /// Database or hashing failure. Logged with detail, surfaced generically.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Convenience constructor for a single-field validation error.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field, message.into());
        ApiError::Validation(fields)
    }

    /// The machine-checkable reason string carried in every error body.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::Permission(_) => "permission_denied",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Internal(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Permission(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            // Full detail goes to the log only; the client gets a generic body.
            tracing::error!("internal error: {detail}");
        }

        let body = match &self {
            ApiError::Validation(fields) => json!({
                "code": self.code(),
                "message": self.to_string(),
                "fields": fields,
            }),
            ApiError::Internal(_) => json!({
                "code": self.code(),
                "message": "internal server error",
            }),
            other => json!({
                "code": other.code(),
                "message": other.to_string(),
            }),
        };

        (self.status(), Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    /// Maps persistence failures into the taxonomy. Unique-constraint violations are
    /// reported as field-level validation errors (the constraint name tells us which
    /// field collided); everything else is internal.
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => ApiError::NotFound("record"),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                let field = match db.constraint() {
                    Some("posts_title_key") => "title",
                    Some("categories_name_key") => "name",
                    Some("users_username_key") => "username",
                    Some("users_email_key") => "email",
                    _ => "record",
                };
                ApiError::validation(field, "already exists")
            }
            _ => ApiError::Internal(err.to_string()),
        }
    }
}
