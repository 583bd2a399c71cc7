use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, patch, post},
};

/// Admin Router Module
///
/// Defines the write surface of the catalog (categories, genres, titles) and
/// the user-management endpoints, all restricted to the 'admin' role.
///
/// Access Control:
/// Every handler here takes the `AdminUser` extractor, which rejects with
/// 401 (no valid token) or 403 (valid token, not an admin) before the
/// request body is deserialized, so permission checks always precede
/// payload validation.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // --- Catalog writes ---
        // POST /categories, DELETE /categories/{slug}
        // Category/Genre support create, list and delete only; no update.
        .route("/categories", post(handlers::create_category))
        .route("/categories/{slug}", delete(handlers::delete_category))
        .route("/genres", post(handlers::create_genre))
        .route("/genres/{slug}", delete(handlers::delete_genre))
        // POST /titles, PATCH/DELETE /titles/{id}
        // Write shape in (slug references), read shape out.
        .route("/titles", post(handlers::create_title))
        .route(
            "/titles/{id}",
            patch(handlers::update_title).delete(handlers::delete_title),
        )
        // --- User management ---
        // GET /users?search=..., POST /users
        .route(
            "/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        // GET/PATCH/DELETE /users/{username}
        // The static /users/me route in the authenticated router takes
        // priority over this parameterized one.
        .route(
            "/users/{username}",
            get(handlers::get_user)
                .patch(handlers::update_user)
                .delete(handlers::delete_user),
        )
}
