use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Authenticated Router Module
///
/// Defines the routes accessible to any user who has exchanged a
/// confirmation code for a bearer token: posting and moderating reviews and
/// comments, and the own-profile endpoint.
///
/// Access Control Strategy:
/// Every handler in this module relies on the `AuthUser` extractor wired
/// through the router layer above it, which guarantees a validated identity
/// (id + role). Ownership checks for PATCH/DELETE on reviews and comments
/// are enforced in the handlers: author, moderator or admin.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Reviews ---
        // POST /titles/{title_id}/reviews
        // The author is the caller; one review per (author, title).
        .route("/titles/{title_id}/reviews", post(handlers::create_review))
        // PATCH/DELETE /titles/{title_id}/reviews/{id}
        .route(
            "/titles/{title_id}/reviews/{id}",
            patch(handlers::update_review).delete(handlers::delete_review),
        )
        // --- Comments ---
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments",
            post(handlers::create_comment),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments/{id}",
            patch(handlers::update_comment).delete(handlers::delete_comment),
        )
        // --- Own profile ---
        // GET/PATCH /users/me
        // The role field is read-only here for non-admin callers.
        .route(
            "/users/me",
            get(handlers::get_me).patch(handlers::update_me),
        )
}
