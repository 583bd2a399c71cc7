use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// ApiError
///
/// The request-boundary error taxonomy. Every fallible operation in the
/// application funnels into one of these variants, which are mapped onto HTTP
/// status codes and structured JSON bodies by the `IntoResponse` impl below.
/// Field-level failures name the offending field so clients can surface them
/// next to the right form input.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A malformed or out-of-range field value, surfaced per-field.
    #[error("validation failed on field '{field}': {message}")]
    Validation { field: &'static str, message: String },

    /// A unique-constraint violation (slug, username/email pairing, duplicate
    /// review). Carries one message per colliding field.
    #[error("conflict on unique field(s)")]
    Conflict { fields: Vec<(&'static str, String)> },

    /// Missing or invalid bearer token.
    #[error("authentication required")]
    Unauthenticated,

    /// Valid caller, insufficient role or ownership.
    #[error("permission denied")]
    Forbidden,

    /// Unknown id/slug/username. Carries the entity kind for the message.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Unhandled storage or collaborator failure. Logged, never detailed to
    /// the client.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias used throughout the repository and handlers.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn conflict(field: &'static str, message: impl Into<String>) -> Self {
        Self::Conflict {
            fields: vec![(field, message.into())],
        }
    }

    /// The canonical slug-collision error for Category/Genre creation.
    pub fn slug_taken() -> Self {
        Self::conflict("slug", "object with this slug already exists.")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation { field, message } => {
                (StatusCode::BAD_REQUEST, json!({ field: message }))
            }
            ApiError::Conflict { fields } => {
                let map: serde_json::Map<String, serde_json::Value> = fields
                    .into_iter()
                    .map(|(field, message)| (field.to_string(), json!(message)))
                    .collect();
                (StatusCode::BAD_REQUEST, serde_json::Value::Object(map))
            }
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                json!({ "detail": "Authentication credentials were not provided." }),
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                json!({ "detail": "You do not have permission to perform this action." }),
            ),
            ApiError::NotFound(entity) => (
                StatusCode::NOT_FOUND,
                json!({ "detail": format!("{entity} not found.") }),
            ),
            ApiError::Internal(message) => {
                // The detail stays server-side; the client gets an opaque 500.
                tracing::error!("internal error: {message}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "detail": "Internal server error." }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Translates storage-layer failures into the taxonomy above.
///
/// Unique-constraint races (two simultaneous reviews by the same author, two
/// signups for the same username) surface from Postgres as 23505 errors; the
/// constraint name tells us which user-facing field collided. Everything else
/// is an internal error.
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => ApiError::NotFound("object"),
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                match db_err.constraint() {
                    Some("categories_slug_key") | Some("genres_slug_key") => ApiError::slug_taken(),
                    Some("users_username_key") => {
                        ApiError::conflict("username", "this username is already in use.")
                    }
                    Some("users_email_key") => {
                        ApiError::conflict("email", "this email is already in use.")
                    }
                    Some("reviews_author_title_key") => {
                        ApiError::conflict("detail", "Not unique!")
                    }
                    _ => ApiError::Internal(err.to_string()),
                }
            }
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_taken_names_the_slug_field() {
        match ApiError::slug_taken() {
            ApiError::Conflict { fields } => {
                assert_eq!(fields.len(), 1);
                assert_eq!(fields[0].0, "slug");
                assert_eq!(fields[0].1, "object with this slug already exists.");
            }
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[test]
    fn validation_error_message_names_field() {
        let err = ApiError::validation("year", "enter a real year.");
        assert_eq!(
            err.to_string(),
            "validation failed on field 'year': enter a real year."
        );
    }
}
