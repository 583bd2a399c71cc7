use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// The RBAC field, stored in Postgres as the `user_role` enum. A single
/// enumerated value with capability methods, so permission checks never
/// inspect raw flags.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema, sqlx::Type,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Role {
    /// Full catalog and user management rights.
    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }

    /// May edit or delete any review/comment regardless of authorship.
    pub fn can_moderate(self) -> bool {
        matches!(self, Role::Moderator | Role::Admin)
    }
}

/// User
///
/// The canonical identity record from the `users` table. The id and the
/// confirmation code never appear in API responses; the code is a shared
/// secret delivered by mail only.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct User {
    #[serde(skip)]
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: Role,
    #[serde(skip)]
    pub confirmation_code: Option<String>,
}

/// Category
///
/// A catalog grouping (e.g., "Books", "Films"). Identified externally by its
/// unique, URL-safe slug; the surrogate id stays internal.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct Category {
    #[serde(skip)]
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

/// Genre
///
/// Same shape as Category, attached to titles many-to-many.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct Genre {
    #[serde(skip)]
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

/// TitleRow
///
/// The raw `titles` row. Internal only: API responses always use the read
/// shape (`TitleDetail`) with category/genre expanded and the live rating.
#[derive(Debug, Clone, FromRow, Default)]
pub struct TitleRow {
    pub id: Uuid,
    pub name: String,
    pub year: i32,
    pub description: String,
    pub category_id: Uuid,
}

/// TitleDetail
///
/// The read shape of a title. `rating` is the arithmetic mean of associated
/// review scores computed on demand, null when no reviews exist. Every title
/// response uses this shape, including the ones produced by POST and PATCH.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct TitleDetail {
    pub id: Uuid,
    pub name: String,
    pub year: i32,
    pub rating: Option<f64>,
    pub description: String,
    pub genre: Vec<Genre>,
    pub category: Category,
}

/// title_detail
///
/// The single encode step from the canonical entity to the read shape. The
/// matching decode step is slug resolution in the repository's title writes;
/// keeping both as explicit transformations avoids the serializer-inheritance
/// tangle the write/read split otherwise invites.
pub fn title_detail(
    row: TitleRow,
    category: Category,
    genre: Vec<Genre>,
    rating: Option<f64>,
) -> TitleDetail {
    TitleDetail {
        id: row.id,
        name: row.name,
        year: row.year,
        rating,
        description: row.description,
        genre,
        category,
    }
}

/// Review
///
/// A review row joined with its author's username. `author_id` drives the
/// ownership checks but is not part of the wire shape: clients see the
/// author as a username string and can never supply it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct Review {
    pub id: Uuid,
    #[serde(skip)]
    pub title_id: Uuid,
    #[serde(skip)]
    pub author_id: Uuid,
    pub text: String,
    pub author: String,
    pub score: i32,
    pub pub_date: DateTime<Utc>,
}

/// Comment
///
/// A comment row joined with its author's username, same conventions as
/// `Review`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct Comment {
    pub id: Uuid,
    #[serde(skip)]
    pub review_id: Uuid,
    #[serde(skip)]
    pub author_id: Uuid,
    pub text: String,
    pub author: String,
    pub pub_date: DateTime<Utc>,
}

/// ReviewRecord
///
/// A raw review row for the bulk-import surface. Unlike the API path the
/// author arrives as an id and pub_date is caller-supplied; storage
/// constraints are the only validation applied.
#[derive(Debug, Clone, FromRow, Default)]
pub struct ReviewRecord {
    pub id: Uuid,
    pub title_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    pub score: i32,
    pub pub_date: DateTime<Utc>,
}

/// CommentRecord
///
/// A raw comment row for the bulk-import surface.
#[derive(Debug, Clone, FromRow, Default)]
pub struct CommentRecord {
    pub id: Uuid,
    pub review_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    pub pub_date: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// CatalogItemRequest
///
/// Input payload for creating a Category or Genre (POST /categories,
/// POST /genres). Both entities share the (name, slug) shape.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct CatalogItemRequest {
    pub name: String,
    pub slug: String,
}

/// TitleWrite
///
/// The write shape of a title: category and genre arrive as slug references
/// and are resolved to rows during creation. An empty genre set is allowed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct TitleWrite {
    pub name: String,
    pub year: i32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub genre: Vec<String>,
    pub category: String,
}

/// UpdateTitleRequest
///
/// Partial update payload for PATCH /titles/{id}. Only provided fields
/// change; `genre`, when present, replaces the full set.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct UpdateTitleRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// CreateReviewRequest
///
/// Input payload for posting a review. The author is always the
/// authenticated caller.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct CreateReviewRequest {
    pub text: String,
    pub score: i32,
}

/// UpdateReviewRequest
///
/// Partial update payload for PATCH on a review.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct UpdateReviewRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i32>,
}

/// CreateCommentRequest
///
/// Input payload for posting a comment on a review.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct CreateCommentRequest {
    pub text: String,
}

/// UpdateCommentRequest
///
/// Partial update payload for PATCH on a comment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct UpdateCommentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

// --- Auth Payloads ---

/// SignupRequest
///
/// Input payload for the passwordless signup endpoint (POST /auth/signup).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
}

/// TokenRequest
///
/// Input payload for exchanging a confirmation code for a bearer token
/// (POST /auth/token).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct TokenRequest {
    pub username: String,
    pub confirmation_code: String,
}

/// TokenResponse
///
/// Output schema carrying the minted bearer access token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct TokenResponse {
    pub token: String,
}

// --- User Management Payloads ---

/// CreateUserRequest
///
/// Input payload for direct user creation by an admin (POST /users). Unlike
/// signup, the role is assignable here.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

/// UpdateUserRequest
///
/// Partial update payload shared by PATCH /users/{username} (admin) and
/// PATCH /users/me. On the profile path the `role` field is read-only for
/// non-admin callers and silently ignored.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}
