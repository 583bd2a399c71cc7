use crate::{
    AppState,
    auth::{self, AdminUser, AuthUser, generate_confirmation_code},
    error::{ApiError, ApiResult},
    models::{
        CatalogItemRequest, Category, Comment, CreateCommentRequest, CreateReviewRequest,
        CreateUserRequest, Genre, Review, Role, SignupRequest, TitleDetail, TitleWrite,
        TokenRequest, TokenResponse, UpdateCommentRequest, UpdateReviewRequest,
        UpdateTitleRequest, UpdateUserRequest, User,
    },
    repository::TitleQuery,
    validation,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

// --- Filter Structs ---

fn default_limit() -> i64 {
    100
}

/// Pagination
///
/// Shared limit/offset parameters for all list endpoints.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

/// SearchFilter
///
/// Case-insensitive substring search plus pagination, used by the category,
/// genre and user lists.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct SearchFilter {
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

/// TitleListFilter
///
/// Accepted query parameters for GET /titles: category slug, genre slug,
/// name substring, exact year.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct TitleListFilter {
    pub category: Option<String>,
    pub genre: Option<String>,
    pub name: Option<String>,
    pub year: Option<i32>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

/// Negative pagination values are treated as zero instead of reaching the
/// database, where a negative LIMIT/OFFSET is an error.
fn clamp_page(limit: i64, offset: i64) -> (i64, i64) {
    (limit.max(0), offset.max(0))
}

/// The caller may mutate a review/comment only as its author, a moderator,
/// or an admin. Runs after the object is fetched and before any body
/// validation.
fn check_can_mutate(user: &AuthUser, author_id: Uuid) -> ApiResult<()> {
    if user.id == author_id || user.role.can_moderate() {
        return Ok(());
    }
    Err(ApiError::Forbidden)
}

// --- Category & Genre Handlers ---

/// [Public Route] Lists categories, optionally filtered by name substring.
#[utoipa::path(
    get,
    path = "/categories",
    params(SearchFilter),
    responses((status = 200, description = "Categories", body = [Category]))
)]
pub async fn list_categories(
    State(state): State<AppState>,
    Query(filter): Query<SearchFilter>,
) -> ApiResult<Json<Vec<Category>>> {
    let (limit, offset) = clamp_page(filter.limit, filter.offset);
    let categories = state
        .repo
        .list_categories(filter.search, limit, offset)
        .await?;
    Ok(Json(categories))
}

/// [Admin Route] Creates a category. Slug collisions surface as a
/// field-level "object with this slug already exists." error.
#[utoipa::path(
    post,
    path = "/categories",
    request_body = CatalogItemRequest,
    responses(
        (status = 201, description = "Created", body = Category),
        (status = 400, description = "Invalid or duplicate slug")
    )
)]
pub async fn create_category(
    _admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<CatalogItemRequest>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    validation::validate_name("name", &payload.name)?;
    validation::validate_slug(&payload.slug)?;
    let category = state.repo.create_category(payload).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// [Admin Route] Deletes a category by slug; referencing titles go with it.
#[utoipa::path(
    delete,
    path = "/categories/{slug}",
    params(("slug" = String, Path, description = "Category slug")),
    responses((status = 204, description = "Deleted"), (status = 404, description = "Not Found"))
)]
pub async fn delete_category(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<StatusCode> {
    state.repo.delete_category(&slug).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// [Public Route] Lists genres, optionally filtered by name substring.
#[utoipa::path(
    get,
    path = "/genres",
    params(SearchFilter),
    responses((status = 200, description = "Genres", body = [Genre]))
)]
pub async fn list_genres(
    State(state): State<AppState>,
    Query(filter): Query<SearchFilter>,
) -> ApiResult<Json<Vec<Genre>>> {
    let (limit, offset) = clamp_page(filter.limit, filter.offset);
    let genres = state
        .repo
        .list_genres(filter.search, limit, offset)
        .await?;
    Ok(Json(genres))
}

/// [Admin Route] Creates a genre.
#[utoipa::path(
    post,
    path = "/genres",
    request_body = CatalogItemRequest,
    responses(
        (status = 201, description = "Created", body = Genre),
        (status = 400, description = "Invalid or duplicate slug")
    )
)]
pub async fn create_genre(
    _admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<CatalogItemRequest>,
) -> ApiResult<(StatusCode, Json<Genre>)> {
    validation::validate_name("name", &payload.name)?;
    validation::validate_slug(&payload.slug)?;
    let genre = state.repo.create_genre(payload).await?;
    Ok((StatusCode::CREATED, Json(genre)))
}

/// [Admin Route] Deletes a genre by slug.
#[utoipa::path(
    delete,
    path = "/genres/{slug}",
    params(("slug" = String, Path, description = "Genre slug")),
    responses((status = 204, description = "Deleted"), (status = 404, description = "Not Found"))
)]
pub async fn delete_genre(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<StatusCode> {
    state.repo.delete_genre(&slug).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Title Handlers ---

/// [Public Route] Lists titles in the read shape, with filtering by category
/// slug, genre slug, name substring and exact year.
#[utoipa::path(
    get,
    path = "/titles",
    params(TitleListFilter),
    responses((status = 200, description = "Titles", body = [TitleDetail]))
)]
pub async fn list_titles(
    State(state): State<AppState>,
    Query(filter): Query<TitleListFilter>,
) -> ApiResult<Json<Vec<TitleDetail>>> {
    let (limit, offset) = clamp_page(filter.limit, filter.offset);
    let query = TitleQuery {
        category: filter.category,
        genre: filter.genre,
        name: filter.name,
        year: filter.year,
    };
    let titles = state.repo.list_titles(query, limit, offset).await?;
    Ok(Json(titles))
}

/// [Public Route] Retrieves one title in the read shape.
#[utoipa::path(
    get,
    path = "/titles/{id}",
    params(("id" = Uuid, Path, description = "Title ID")),
    responses((status = 200, description = "Found", body = TitleDetail), (status = 404, description = "Not Found"))
)]
pub async fn get_title(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TitleDetail>> {
    Ok(Json(state.repo.get_title(id).await?))
}

/// [Admin Route] Creates a title from the write shape (category/genre as
/// slugs). The response is the read shape regardless.
#[utoipa::path(
    post,
    path = "/titles",
    request_body = TitleWrite,
    responses(
        (status = 201, description = "Created", body = TitleDetail),
        (status = 400, description = "Future year or unknown slug")
    )
)]
pub async fn create_title(
    _admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<TitleWrite>,
) -> ApiResult<(StatusCode, Json<TitleDetail>)> {
    validation::validate_name("name", &payload.name)?;
    validation::validate_year(payload.year)?;
    if let Some(description) = &payload.description {
        validation::validate_description(description)?;
    }
    let title = state.repo.create_title(payload).await?;
    Ok((StatusCode::CREATED, Json(title)))
}

/// [Admin Route] Partially updates a title. A provided genre set replaces
/// the previous one.
#[utoipa::path(
    patch,
    path = "/titles/{id}",
    params(("id" = Uuid, Path, description = "Title ID")),
    request_body = UpdateTitleRequest,
    responses((status = 200, description = "Updated", body = TitleDetail), (status = 404, description = "Not Found"))
)]
pub async fn update_title(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTitleRequest>,
) -> ApiResult<Json<TitleDetail>> {
    if let Some(name) = &payload.name {
        validation::validate_name("name", name)?;
    }
    if let Some(year) = payload.year {
        validation::validate_year(year)?;
    }
    if let Some(description) = &payload.description {
        validation::validate_description(description)?;
    }
    Ok(Json(state.repo.update_title(id, payload).await?))
}

/// [Admin Route] Deletes a title; its reviews and their comments cascade.
#[utoipa::path(
    delete,
    path = "/titles/{id}",
    params(("id" = Uuid, Path, description = "Title ID")),
    responses((status = 204, description = "Deleted"), (status = 404, description = "Not Found"))
)]
pub async fn delete_title(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.repo.delete_title(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Review Handlers ---

/// [Public Route] Lists a title's reviews; 404 for an unknown title.
#[utoipa::path(
    get,
    path = "/titles/{title_id}/reviews",
    params(("title_id" = Uuid, Path, description = "Title ID"), Pagination),
    responses((status = 200, description = "Reviews", body = [Review]))
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(title_id): Path<Uuid>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<Review>>> {
    let (limit, offset) = clamp_page(page.limit, page.offset);
    let reviews = state.repo.list_reviews(title_id, limit, offset).await?;
    Ok(Json(reviews))
}

/// [Public Route] Retrieves one review under its title.
#[utoipa::path(
    get,
    path = "/titles/{title_id}/reviews/{id}",
    params(("title_id" = Uuid, Path, description = "Title ID"), ("id" = Uuid, Path, description = "Review ID")),
    responses((status = 200, description = "Found", body = Review), (status = 404, description = "Not Found"))
)]
pub async fn get_review(
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Review>> {
    Ok(Json(state.repo.get_review(title_id, review_id).await?))
}

/// [Authenticated Route] Posts a review. The author is the caller; a second
/// review by the same author for the same title is a conflict, enforced by
/// the (author, title) unique constraint.
#[utoipa::path(
    post,
    path = "/titles/{title_id}/reviews",
    params(("title_id" = Uuid, Path, description = "Title ID")),
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Created", body = Review),
        (status = 400, description = "Out-of-range score or duplicate review")
    )
)]
pub async fn create_review(
    user: AuthUser,
    State(state): State<AppState>,
    Path(title_id): Path<Uuid>,
    Json(payload): Json<CreateReviewRequest>,
) -> ApiResult<(StatusCode, Json<Review>)> {
    validation::validate_text(&payload.text)?;
    validation::validate_score(payload.score)?;
    let review = state
        .repo
        .create_review(title_id, user.id, payload.text, payload.score)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// [Authenticated Route] Partially updates a review. Allowed for the author,
/// any moderator, or any admin; the ownership check runs before body
/// validation.
#[utoipa::path(
    patch,
    path = "/titles/{title_id}/reviews/{id}",
    params(("title_id" = Uuid, Path, description = "Title ID"), ("id" = Uuid, Path, description = "Review ID")),
    request_body = UpdateReviewRequest,
    responses((status = 200, description = "Updated", body = Review), (status = 403, description = "Not author/moderator/admin"))
)]
pub async fn update_review(
    user: AuthUser,
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateReviewRequest>,
) -> ApiResult<Json<Review>> {
    let existing = state.repo.get_review(title_id, review_id).await?;
    check_can_mutate(&user, existing.author_id)?;
    if let Some(text) = &payload.text {
        validation::validate_text(text)?;
    }
    if let Some(score) = payload.score {
        validation::validate_score(score)?;
    }
    let review = state
        .repo
        .update_review(title_id, review_id, payload.text, payload.score)
        .await?;
    Ok(Json(review))
}

/// [Authenticated Route] Deletes a review under the same ownership rule.
#[utoipa::path(
    delete,
    path = "/titles/{title_id}/reviews/{id}",
    params(("title_id" = Uuid, Path, description = "Title ID"), ("id" = Uuid, Path, description = "Review ID")),
    responses((status = 204, description = "Deleted"), (status = 403, description = "Not author/moderator/admin"))
)]
pub async fn delete_review(
    user: AuthUser,
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let existing = state.repo.get_review(title_id, review_id).await?;
    check_can_mutate(&user, existing.author_id)?;
    state.repo.delete_review(title_id, review_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Comment Handlers ---

/// [Public Route] Lists the comments on a review.
#[utoipa::path(
    get,
    path = "/titles/{title_id}/reviews/{review_id}/comments",
    params(
        ("title_id" = Uuid, Path, description = "Title ID"),
        ("review_id" = Uuid, Path, description = "Review ID"),
        Pagination
    ),
    responses((status = 200, description = "Comments", body = [Comment]))
)]
pub async fn list_comments(
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(Uuid, Uuid)>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<Comment>>> {
    let (limit, offset) = clamp_page(page.limit, page.offset);
    let comments = state
        .repo
        .list_comments(title_id, review_id, limit, offset)
        .await?;
    Ok(Json(comments))
}

/// [Public Route] Retrieves one comment under its review and title.
#[utoipa::path(
    get,
    path = "/titles/{title_id}/reviews/{review_id}/comments/{id}",
    params(
        ("title_id" = Uuid, Path, description = "Title ID"),
        ("review_id" = Uuid, Path, description = "Review ID"),
        ("id" = Uuid, Path, description = "Comment ID")
    ),
    responses((status = 200, description = "Found", body = Comment), (status = 404, description = "Not Found"))
)]
pub async fn get_comment(
    State(state): State<AppState>,
    Path((title_id, review_id, comment_id)): Path<(Uuid, Uuid, Uuid)>,
) -> ApiResult<Json<Comment>> {
    Ok(Json(
        state.repo.get_comment(title_id, review_id, comment_id).await?,
    ))
}

/// [Authenticated Route] Posts a comment on a review; the author is the caller.
#[utoipa::path(
    post,
    path = "/titles/{title_id}/reviews/{review_id}/comments",
    params(
        ("title_id" = Uuid, Path, description = "Title ID"),
        ("review_id" = Uuid, Path, description = "Review ID")
    ),
    request_body = CreateCommentRequest,
    responses((status = 201, description = "Created", body = Comment))
)]
pub async fn create_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    validation::validate_text(&payload.text)?;
    let comment = state
        .repo
        .create_comment(title_id, review_id, user.id, payload.text)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// [Authenticated Route] Partially updates a comment; author, moderator or
/// admin only.
#[utoipa::path(
    patch,
    path = "/titles/{title_id}/reviews/{review_id}/comments/{id}",
    params(
        ("title_id" = Uuid, Path, description = "Title ID"),
        ("review_id" = Uuid, Path, description = "Review ID"),
        ("id" = Uuid, Path, description = "Comment ID")
    ),
    request_body = UpdateCommentRequest,
    responses((status = 200, description = "Updated", body = Comment), (status = 403, description = "Not author/moderator/admin"))
)]
pub async fn update_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path((title_id, review_id, comment_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(payload): Json<UpdateCommentRequest>,
) -> ApiResult<Json<Comment>> {
    let existing = state.repo.get_comment(title_id, review_id, comment_id).await?;
    check_can_mutate(&user, existing.author_id)?;
    if let Some(text) = &payload.text {
        validation::validate_text(text)?;
    }
    let comment = state
        .repo
        .update_comment(title_id, review_id, comment_id, payload.text)
        .await?;
    Ok(Json(comment))
}

/// [Authenticated Route] Deletes a comment; author, moderator or admin only.
#[utoipa::path(
    delete,
    path = "/titles/{title_id}/reviews/{review_id}/comments/{id}",
    params(
        ("title_id" = Uuid, Path, description = "Title ID"),
        ("review_id" = Uuid, Path, description = "Review ID"),
        ("id" = Uuid, Path, description = "Comment ID")
    ),
    responses((status = 204, description = "Deleted"), (status = 403, description = "Not author/moderator/admin"))
)]
pub async fn delete_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path((title_id, review_id, comment_id)): Path<(Uuid, Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let existing = state.repo.get_comment(title_id, review_id, comment_id).await?;
    check_can_mutate(&user, existing.author_id)?;
    state
        .repo
        .delete_comment(title_id, review_id, comment_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Auth Handlers ---

/// [Public Route] Passwordless signup. Idempotent for an existing exact
/// (username, email) pair; a partial collision is a conflict naming the
/// colliding field(s). In every success path a fresh confirmation code is
/// generated, persisted and mailed out-of-band. The response echoes the
/// submitted pair and never the code.
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Code issued", body = SignupRequest),
        (status = 400, description = "Invalid username or field collision")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> ApiResult<Json<SignupRequest>> {
    validation::validate_username(&payload.username)?;
    validation::validate_email(&payload.email)?;

    let by_username = state.repo.find_user_by_username(&payload.username).await?;
    let by_email = state.repo.find_user_by_email(&payload.email).await?;

    let user = match (by_username, by_email) {
        // The exact pair already exists: proceed and re-issue a code.
        (Some(u), Some(_)) if u.email == payload.email => u,
        (Some(_), Some(_)) => {
            return Err(ApiError::Conflict {
                fields: vec![
                    ("username", "this username is already in use.".to_string()),
                    ("email", "this email is already in use.".to_string()),
                ],
            });
        }
        (Some(_), None) => {
            return Err(ApiError::conflict(
                "username",
                "this username is already in use.",
            ));
        }
        (None, Some(_)) => {
            return Err(ApiError::conflict("email", "this email is already in use."));
        }
        (None, None) => {
            let user = User {
                id: Uuid::new_v4(),
                username: payload.username.clone(),
                email: payload.email.clone(),
                role: Role::User,
                ..Default::default()
            };
            // A concurrent signup for the same username/email loses the race
            // here and surfaces as a conflict from the unique constraints.
            state.repo.create_user(user).await?
        }
    };

    let code = generate_confirmation_code();
    state.repo.set_confirmation_code(user.id, &code).await?;

    let body = format!(
        "Hi, {}! Your confirmation code: {code}",
        user.username
    );
    state
        .mailer
        .send(&user.email, "Confirmation code for the review portal", &body)
        .await
        .map_err(ApiError::Internal)?;

    Ok(Json(payload))
}

/// [Public Route] Exchanges a confirmation code for a bearer token. The code
/// stays valid after the exchange unless `invalidate_code_on_use` is set.
#[utoipa::path(
    post,
    path = "/auth/token",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token minted", body = TokenResponse),
        (status = 400, description = "Wrong confirmation code"),
        (status = 404, description = "Unknown username")
    )
)]
pub async fn get_token(
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    validation::validate_username(&payload.username)?;

    let user = state.repo.get_user_by_username(&payload.username).await?;

    if user.confirmation_code.as_deref() != Some(payload.confirmation_code.as_str()) {
        return Err(ApiError::validation(
            "confirmation_code",
            "invalid confirmation code.",
        ));
    }

    let token = auth::mint_token(user.id, &state.config.jwt_secret)?;
    if state.config.invalidate_code_on_use {
        state.repo.clear_confirmation_code(user.id).await?;
    }
    Ok(Json(TokenResponse { token }))
}

// --- User Handlers ---

/// [Admin Route] Lists users with username substring search.
#[utoipa::path(
    get,
    path = "/users",
    params(SearchFilter),
    responses((status = 200, description = "Users", body = [User]))
)]
pub async fn list_users(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(filter): Query<SearchFilter>,
) -> ApiResult<Json<Vec<User>>> {
    let (limit, offset) = clamp_page(filter.limit, filter.offset);
    let users = state
        .repo
        .list_users(filter.search, limit, offset)
        .await?;
    Ok(Json(users))
}

/// [Admin Route] Creates a user directly, role assignable. No confirmation
/// code is issued; the user can obtain one through signup later.
#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Created", body = User),
        (status = 400, description = "Invalid or colliding username/email")
    )
)]
pub async fn create_user(
    _admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    validation::validate_username(&payload.username)?;
    validation::validate_email(&payload.email)?;

    let user = User {
        id: Uuid::new_v4(),
        username: payload.username,
        email: payload.email,
        role: payload.role.unwrap_or_default(),
        first_name: payload.first_name.unwrap_or_default(),
        last_name: payload.last_name.unwrap_or_default(),
        bio: payload.bio.unwrap_or_default(),
        confirmation_code: None,
    };
    let created = state.repo.create_user(user).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// [Admin Route] Retrieves a user by username.
#[utoipa::path(
    get,
    path = "/users/{username}",
    params(("username" = String, Path, description = "Username")),
    responses((status = 200, description = "Found", body = User), (status = 404, description = "Not Found"))
)]
pub async fn get_user(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.repo.get_user_by_username(&username).await?))
}

/// [Admin Route] Partially updates any user, including the role.
#[utoipa::path(
    patch,
    path = "/users/{username}",
    params(("username" = String, Path, description = "Username")),
    request_body = UpdateUserRequest,
    responses((status = 200, description = "Updated", body = User), (status = 404, description = "Not Found"))
)]
pub async fn update_user(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    if let Some(new_username) = &payload.username {
        validation::validate_username(new_username)?;
    }
    if let Some(email) = &payload.email {
        validation::validate_email(email)?;
    }
    let target = state.repo.get_user_by_username(&username).await?;
    Ok(Json(state.repo.update_user(target.id, payload).await?))
}

/// [Admin Route] Deletes a user; their reviews and comments cascade.
#[utoipa::path(
    delete,
    path = "/users/{username}",
    params(("username" = String, Path, description = "Username")),
    responses((status = 204, description = "Deleted"), (status = 404, description = "Not Found"))
)]
pub async fn delete_user(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<StatusCode> {
    state.repo.delete_user(&username).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// [Authenticated Route] The caller's own profile.
#[utoipa::path(
    get,
    path = "/users/me",
    responses((status = 200, description = "Profile", body = User))
)]
pub async fn get_me(
    user: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.repo.get_user(user.id).await?))
}

/// [Authenticated Route] Updates the caller's own profile. The role field is
/// read-only here unless the caller is an admin; a non-admin's role value is
/// dropped rather than rejected, matching the read-only-field convention.
#[utoipa::path(
    patch,
    path = "/users/me",
    request_body = UpdateUserRequest,
    responses((status = 200, description = "Updated", body = User))
)]
pub async fn update_me(
    user: AuthUser,
    State(state): State<AppState>,
    Json(mut payload): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    if !user.role.is_admin() {
        payload.role = None;
    }
    if let Some(new_username) = &payload.username {
        validation::validate_username(new_username)?;
    }
    if let Some(email) = &payload.email {
        validation::validate_email(email)?;
    }
    Ok(Json(state.repo.update_user(user.id, payload).await?))
}
