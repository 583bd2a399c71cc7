use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Defines endpoints that are **unauthenticated** and accessible to any client
/// (anonymous or logged-in): the whole catalog read surface and the
/// passwordless auth gateway. All write verbs on these resources live in the
/// authenticated/admin routers.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Unauthenticated endpoint for monitoring and load balancer checks.
        .route("/health", get(|| async { "ok" }))
        // --- Auth gateway ---
        // POST /auth/signup
        // Issues (or re-issues) a confirmation code, delivered by mail.
        .route("/auth/signup", post(handlers::signup))
        // POST /auth/token
        // Exchanges username + confirmation code for a bearer token.
        .route("/auth/token", post(handlers::get_token))
        // --- Catalog reads ---
        // GET /categories?search=...  /genres?search=...
        // Name-substring search, case-insensitive.
        .route("/categories", get(handlers::list_categories))
        .route("/genres", get(handlers::list_genres))
        // GET /titles?category=...&genre=...&name=...&year=...
        // Read-shape listing with filtering; rating computed from live reviews.
        .route("/titles", get(handlers::list_titles))
        .route("/titles/{id}", get(handlers::get_title))
        // --- Review & comment reads (nested) ---
        .route("/titles/{title_id}/reviews", get(handlers::list_reviews))
        .route("/titles/{title_id}/reviews/{id}", get(handlers::get_review))
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments",
            get(handlers::list_comments),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments/{id}",
            get(handlers::get_comment),
        )
}
