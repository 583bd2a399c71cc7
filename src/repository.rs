use crate::error::{ApiError, ApiResult};
use crate::models::{
    CatalogItemRequest, Category, Comment, CommentRecord, Genre, Review, ReviewRecord, TitleDetail,
    TitleRow, TitleWrite, UpdateTitleRequest, UpdateUserRequest, User, title_detail,
};
use async_trait::async_trait;
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

/// TitleQuery
///
/// Accepted filters for the title listing: category slug, genre slug,
/// case-insensitive name substring, and exact year.
#[derive(Debug, Clone, Default)]
pub struct TitleQuery {
    pub category: Option<String>,
    pub genre: Option<String>,
    pub name: Option<String>,
    pub year: Option<i32>,
}

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations, allowing
/// the handlers to interact with the data layer without knowing the specific
/// implementation (Postgres, in-memory test double, etc.).
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) safely shareable across Axum's async tasks.
///
/// Uniqueness is enforced by database constraints, not trait-level checks:
/// concurrent inserts racing on the same slug, username or (author, title)
/// pair surface as `ApiError::Conflict` through the sqlx error translation.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Catalog: Categories & Genres ---
    async fn list_categories(
        &self,
        search: Option<String>,
        limit: i64,
        offset: i64,
    ) -> ApiResult<Vec<Category>>;
    async fn create_category(&self, req: CatalogItemRequest) -> ApiResult<Category>;
    // Deletion cascades to titles referencing the category.
    async fn delete_category(&self, slug: &str) -> ApiResult<()>;

    async fn list_genres(
        &self,
        search: Option<String>,
        limit: i64,
        offset: i64,
    ) -> ApiResult<Vec<Genre>>;
    async fn create_genre(&self, req: CatalogItemRequest) -> ApiResult<Genre>;
    async fn delete_genre(&self, slug: &str) -> ApiResult<()>;

    // --- Titles ---
    // Reads always return the read shape: category/genre expanded, rating
    // recomputed from live reviews.
    async fn list_titles(
        &self,
        query: TitleQuery,
        limit: i64,
        offset: i64,
    ) -> ApiResult<Vec<TitleDetail>>;
    async fn get_title(&self, id: Uuid) -> ApiResult<TitleDetail>;
    // Write shape in (slugs), read shape out. Unknown slugs are field-level
    // validation errors.
    async fn create_title(&self, req: TitleWrite) -> ApiResult<TitleDetail>;
    async fn update_title(&self, id: Uuid, req: UpdateTitleRequest) -> ApiResult<TitleDetail>;
    async fn delete_title(&self, id: Uuid) -> ApiResult<()>;

    // --- Reviews (nested under a title) ---
    async fn list_reviews(
        &self,
        title_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> ApiResult<Vec<Review>>;
    async fn get_review(&self, title_id: Uuid, review_id: Uuid) -> ApiResult<Review>;
    // One review per (author, title); a duplicate is a conflict, never an
    // overwrite.
    async fn create_review(
        &self,
        title_id: Uuid,
        author_id: Uuid,
        text: String,
        score: i32,
    ) -> ApiResult<Review>;
    async fn update_review(
        &self,
        title_id: Uuid,
        review_id: Uuid,
        text: Option<String>,
        score: Option<i32>,
    ) -> ApiResult<Review>;
    async fn delete_review(&self, title_id: Uuid, review_id: Uuid) -> ApiResult<()>;

    // --- Comments (nested under a review) ---
    async fn list_comments(
        &self,
        title_id: Uuid,
        review_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> ApiResult<Vec<Comment>>;
    async fn get_comment(
        &self,
        title_id: Uuid,
        review_id: Uuid,
        comment_id: Uuid,
    ) -> ApiResult<Comment>;
    async fn create_comment(
        &self,
        title_id: Uuid,
        review_id: Uuid,
        author_id: Uuid,
        text: String,
    ) -> ApiResult<Comment>;
    async fn update_comment(
        &self,
        title_id: Uuid,
        review_id: Uuid,
        comment_id: Uuid,
        text: Option<String>,
    ) -> ApiResult<Comment>;
    async fn delete_comment(
        &self,
        title_id: Uuid,
        review_id: Uuid,
        comment_id: Uuid,
    ) -> ApiResult<()>;

    // --- Users ---
    async fn list_users(
        &self,
        search: Option<String>,
        limit: i64,
        offset: i64,
    ) -> ApiResult<Vec<User>>;
    async fn get_user(&self, id: Uuid) -> ApiResult<User>;
    async fn get_user_by_username(&self, username: &str) -> ApiResult<User>;
    // Optional lookups used by the signup collision rules.
    async fn find_user_by_username(&self, username: &str) -> ApiResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> ApiResult<Option<User>>;
    async fn create_user(&self, user: User) -> ApiResult<User>;
    async fn update_user(&self, id: Uuid, req: UpdateUserRequest) -> ApiResult<User>;
    async fn delete_user(&self, username: &str) -> ApiResult<()>;
    // Confirmation-code lifecycle: regenerated on every signup, optionally
    // cleared after a successful token exchange.
    async fn set_confirmation_code(&self, user_id: Uuid, code: &str) -> ApiResult<()>;
    async fn clear_confirmation_code(&self, user_id: Uuid) -> ApiResult<()>;

    // --- Bulk-insert surface for the external data-import tool ---
    // Rows are inserted as given; only storage constraints apply.
    async fn bulk_insert_categories(&self, rows: Vec<Category>) -> ApiResult<u64>;
    async fn bulk_insert_genres(&self, rows: Vec<Genre>) -> ApiResult<u64>;
    async fn bulk_insert_titles(&self, rows: Vec<TitleRow>) -> ApiResult<u64>;
    async fn bulk_insert_title_genres(&self, rows: Vec<(Uuid, Uuid)>) -> ApiResult<u64>;
    async fn bulk_insert_users(&self, rows: Vec<User>) -> ApiResult<u64>;
    async fn bulk_insert_reviews(&self, rows: Vec<ReviewRecord>) -> ApiResult<u64>;
    async fn bulk_insert_comments(&self, rows: Vec<CommentRecord>) -> ApiResult<u64>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Case-insensitive name search shared by the category and genre lists.
    async fn list_catalog<T>(
        &self,
        table: &str,
        search: Option<String>,
        limit: i64,
        offset: i64,
    ) -> ApiResult<Vec<T>>
    where
        T: for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
    {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT id, name, slug FROM {table}"));
        if let Some(s) = search {
            builder.push(" WHERE name ILIKE ");
            builder.push_bind(format!("%{s}%"));
        }
        builder.push(" ORDER BY name LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let rows = builder.build_query_as::<T>().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    /// Resolves a category slug to its row, as a field-level error on miss.
    async fn category_by_slug(&self, slug: &str) -> ApiResult<Category> {
        sqlx::query_as::<_, Category>("SELECT id, name, slug FROM categories WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::validation("category", "unknown category slug."))
    }

    /// Resolves a set of genre slugs, requiring every slug to exist.
    async fn genres_by_slugs(&self, slugs: &[String]) -> ApiResult<Vec<Genre>> {
        if slugs.is_empty() {
            return Ok(vec![]);
        }
        let genres = sqlx::query_as::<_, Genre>(
            "SELECT id, name, slug FROM genres WHERE slug = ANY($1) ORDER BY name",
        )
        .bind(slugs)
        .fetch_all(&self.pool)
        .await?;
        if genres.len() != slugs.len() {
            return Err(ApiError::validation("genre", "unknown genre slug."));
        }
        Ok(genres)
    }

    async fn genres_for_title(&self, title_id: Uuid) -> ApiResult<Vec<Genre>> {
        let genres = sqlx::query_as::<_, Genre>(
            r#"
            SELECT g.id, g.name, g.slug
            FROM genres g
            JOIN title_genres tg ON tg.genre_id = g.id
            WHERE tg.title_id = $1
            ORDER BY g.name
            "#,
        )
        .bind(title_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(genres)
    }

    /// The stored rating column is not authoritative; the displayed value is
    /// always the live average over current reviews.
    async fn rating_for_title(&self, title_id: Uuid) -> ApiResult<Option<f64>> {
        let avg: Option<f64> =
            sqlx::query_scalar("SELECT AVG(score)::float8 FROM reviews WHERE title_id = $1")
                .bind(title_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(avg)
    }

    async fn title_exists(&self, title_id: Uuid) -> ApiResult<()> {
        let found: Option<i32> = sqlx::query_scalar("SELECT 1 FROM titles WHERE id = $1")
            .bind(title_id)
            .fetch_optional(&self.pool)
            .await?;
        found.map(|_| ()).ok_or(ApiError::NotFound("title"))
    }

    /// A review counts as existing only under its own title.
    async fn review_exists(&self, title_id: Uuid, review_id: Uuid) -> ApiResult<()> {
        let found: Option<i32> =
            sqlx::query_scalar("SELECT 1 FROM reviews WHERE id = $1 AND title_id = $2")
                .bind(review_id)
                .bind(title_id)
                .fetch_optional(&self.pool)
                .await?;
        found.map(|_| ()).ok_or(ApiError::NotFound("review"))
    }

    async fn assemble_detail(&self, row: TitleRow) -> ApiResult<TitleDetail> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, name, slug FROM categories WHERE id = $1",
        )
        .bind(row.category_id)
        .fetch_one(&self.pool)
        .await?;
        let genres = self.genres_for_title(row.id).await?;
        let rating = self.rating_for_title(row.id).await?;
        Ok(title_detail(row, category, genres, rating))
    }
}

/// Intermediate row for the title list: title columns, its category, and the
/// aggregated rating in one pass. Genres are attached afterwards.
#[derive(sqlx::FromRow)]
struct TitleListRow {
    id: Uuid,
    name: String,
    year: i32,
    description: String,
    category_id: Uuid,
    category_name: String,
    category_slug: String,
    rating: Option<f64>,
}

const TITLE_LIST_SELECT: &str = r#"
    SELECT t.id, t.name, t.year, t.description, t.category_id,
           c.name AS category_name, c.slug AS category_slug,
           AVG(r.score)::float8 AS rating
    FROM titles t
    JOIN categories c ON c.id = t.category_id
    LEFT JOIN reviews r ON r.title_id = t.id
"#;

#[async_trait]
impl Repository for PostgresRepository {
    // --- Catalog ---

    async fn list_categories(
        &self,
        search: Option<String>,
        limit: i64,
        offset: i64,
    ) -> ApiResult<Vec<Category>> {
        self.list_catalog("categories", search, limit, offset).await
    }

    async fn create_category(&self, req: CatalogItemRequest) -> ApiResult<Category> {
        let category = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (id, name, slug) VALUES ($1, $2, $3) RETURNING id, name, slug",
        )
        .bind(Uuid::new_v4())
        .bind(&req.name)
        .bind(&req.slug)
        .fetch_one(&self.pool)
        .await?;
        Ok(category)
    }

    async fn delete_category(&self, slug: &str) -> ApiResult<()> {
        let result = sqlx::query("DELETE FROM categories WHERE slug = $1")
            .bind(slug)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("category"));
        }
        Ok(())
    }

    async fn list_genres(
        &self,
        search: Option<String>,
        limit: i64,
        offset: i64,
    ) -> ApiResult<Vec<Genre>> {
        self.list_catalog("genres", search, limit, offset).await
    }

    async fn create_genre(&self, req: CatalogItemRequest) -> ApiResult<Genre> {
        let genre = sqlx::query_as::<_, Genre>(
            "INSERT INTO genres (id, name, slug) VALUES ($1, $2, $3) RETURNING id, name, slug",
        )
        .bind(Uuid::new_v4())
        .bind(&req.name)
        .bind(&req.slug)
        .fetch_one(&self.pool)
        .await?;
        Ok(genre)
    }

    async fn delete_genre(&self, slug: &str) -> ApiResult<()> {
        let result = sqlx::query("DELETE FROM genres WHERE slug = $1")
            .bind(slug)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("genre"));
        }
        Ok(())
    }

    // --- Titles ---

    /// Implements flexible filtering with QueryBuilder for safe
    /// parameterization. The genre filter uses an EXISTS subquery so it does
    /// not multiply the AVG aggregate rows.
    async fn list_titles(
        &self,
        query: TitleQuery,
        limit: i64,
        offset: i64,
    ) -> ApiResult<Vec<TitleDetail>> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(TITLE_LIST_SELECT);
        builder.push(" WHERE TRUE ");

        if let Some(category) = query.category {
            builder.push(" AND c.slug = ");
            builder.push_bind(category);
        }
        if let Some(genre) = query.genre {
            builder.push(
                " AND EXISTS (SELECT 1 FROM title_genres tg JOIN genres g ON g.id = tg.genre_id \
                 WHERE tg.title_id = t.id AND g.slug = ",
            );
            builder.push_bind(genre);
            builder.push(")");
        }
        if let Some(name) = query.name {
            builder.push(" AND t.name ILIKE ");
            builder.push_bind(format!("%{name}%"));
        }
        if let Some(year) = query.year {
            builder.push(" AND t.year = ");
            builder.push_bind(year);
        }

        builder.push(" GROUP BY t.id, c.id ORDER BY t.name LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let rows = builder
            .build_query_as::<TitleListRow>()
            .fetch_all(&self.pool)
            .await?;

        let mut details = Vec::with_capacity(rows.len());
        for row in rows {
            let genres = self.genres_for_title(row.id).await?;
            details.push(TitleDetail {
                id: row.id,
                name: row.name,
                year: row.year,
                rating: row.rating,
                description: row.description,
                genre: genres,
                category: Category {
                    id: row.category_id,
                    name: row.category_name,
                    slug: row.category_slug,
                },
            });
        }
        Ok(details)
    }

    async fn get_title(&self, id: Uuid) -> ApiResult<TitleDetail> {
        let row = sqlx::query_as::<_, TitleRow>(
            "SELECT id, name, year, description, category_id FROM titles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ApiError::NotFound("title"))?;
        self.assemble_detail(row).await
    }

    async fn create_title(&self, req: TitleWrite) -> ApiResult<TitleDetail> {
        let category = self.category_by_slug(&req.category).await?;
        let genres = self.genres_by_slugs(&req.genre).await?;

        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, TitleRow>(
            r#"
            INSERT INTO titles (id, name, year, description, category_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, year, description, category_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&req.name)
        .bind(req.year)
        .bind(req.description.unwrap_or_default())
        .bind(category.id)
        .fetch_one(&mut *tx)
        .await?;

        for genre in &genres {
            sqlx::query("INSERT INTO title_genres (title_id, genre_id) VALUES ($1, $2)")
                .bind(row.id)
                .bind(genre.id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        // A brand-new title has no reviews, so the rating is null.
        Ok(title_detail(row, category, genres, None))
    }

    async fn update_title(&self, id: Uuid, req: UpdateTitleRequest) -> ApiResult<TitleDetail> {
        // Resolve slug references before touching the row so bad input
        // leaves the title unchanged.
        let category = match &req.category {
            Some(slug) => Some(self.category_by_slug(slug).await?),
            None => None,
        };
        let genres = match &req.genre {
            Some(slugs) => Some(self.genres_by_slugs(slugs).await?),
            None => None,
        };

        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, TitleRow>(
            r#"
            UPDATE titles
            SET name = COALESCE($2, name),
                year = COALESCE($3, year),
                description = COALESCE($4, description),
                category_id = COALESCE($5, category_id)
            WHERE id = $1
            RETURNING id, name, year, description, category_id
            "#,
        )
        .bind(id)
        .bind(req.name)
        .bind(req.year)
        .bind(req.description)
        .bind(category.as_ref().map(|c| c.id))
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ApiError::NotFound("title"))?;

        // When a genre set is provided it replaces the previous set wholesale.
        if let Some(genres) = &genres {
            sqlx::query("DELETE FROM title_genres WHERE title_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            for genre in genres {
                sqlx::query("INSERT INTO title_genres (title_id, genre_id) VALUES ($1, $2)")
                    .bind(id)
                    .bind(genre.id)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        tx.commit().await?;

        self.assemble_detail(row).await
    }

    async fn delete_title(&self, id: Uuid) -> ApiResult<()> {
        let result = sqlx::query("DELETE FROM titles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("title"));
        }
        Ok(())
    }

    // --- Reviews ---

    async fn list_reviews(
        &self,
        title_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> ApiResult<Vec<Review>> {
        self.title_exists(title_id).await?;
        let reviews = sqlx::query_as::<_, Review>(
            r#"
            SELECT r.id, r.title_id, r.author_id, r.text, u.username AS author,
                   r.score, r.pub_date
            FROM reviews r
            JOIN users u ON u.id = r.author_id
            WHERE r.title_id = $1
            ORDER BY r.pub_date
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(title_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(reviews)
    }

    async fn get_review(&self, title_id: Uuid, review_id: Uuid) -> ApiResult<Review> {
        sqlx::query_as::<_, Review>(
            r#"
            SELECT r.id, r.title_id, r.author_id, r.text, u.username AS author,
                   r.score, r.pub_date
            FROM reviews r
            JOIN users u ON u.id = r.author_id
            WHERE r.id = $1 AND r.title_id = $2
            "#,
        )
        .bind(review_id)
        .bind(title_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ApiError::NotFound("review"))
    }

    /// Inserts a review and joins the author username in one round trip. A
    /// concurrent duplicate insert trips the (author, title) unique
    /// constraint and comes back as a conflict error.
    async fn create_review(
        &self,
        title_id: Uuid,
        author_id: Uuid,
        text: String,
        score: i32,
    ) -> ApiResult<Review> {
        self.title_exists(title_id).await?;
        let review = sqlx::query_as::<_, Review>(
            r#"
            WITH inserted AS (
                INSERT INTO reviews (id, title_id, author_id, text, score)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, title_id, author_id, text, score, pub_date
            )
            SELECT i.id, i.title_id, i.author_id, i.text, u.username AS author,
                   i.score, i.pub_date
            FROM inserted i
            JOIN users u ON u.id = i.author_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(title_id)
        .bind(author_id)
        .bind(text)
        .bind(score)
        .fetch_one(&self.pool)
        .await?;
        Ok(review)
    }

    async fn update_review(
        &self,
        title_id: Uuid,
        review_id: Uuid,
        text: Option<String>,
        score: Option<i32>,
    ) -> ApiResult<Review> {
        sqlx::query_as::<_, Review>(
            r#"
            WITH updated AS (
                UPDATE reviews
                SET text = COALESCE($3, text),
                    score = COALESCE($4, score)
                WHERE id = $1 AND title_id = $2
                RETURNING id, title_id, author_id, text, score, pub_date
            )
            SELECT p.id, p.title_id, p.author_id, p.text, u.username AS author,
                   p.score, p.pub_date
            FROM updated p
            JOIN users u ON u.id = p.author_id
            "#,
        )
        .bind(review_id)
        .bind(title_id)
        .bind(text)
        .bind(score)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ApiError::NotFound("review"))
    }

    async fn delete_review(&self, title_id: Uuid, review_id: Uuid) -> ApiResult<()> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1 AND title_id = $2")
            .bind(review_id)
            .bind(title_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("review"));
        }
        Ok(())
    }

    // --- Comments ---

    async fn list_comments(
        &self,
        title_id: Uuid,
        review_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> ApiResult<Vec<Comment>> {
        self.review_exists(title_id, review_id).await?;
        let comments = sqlx::query_as::<_, Comment>(
            r#"
            SELECT c.id, c.review_id, c.author_id, c.text, u.username AS author,
                   c.pub_date
            FROM comments c
            JOIN users u ON u.id = c.author_id
            WHERE c.review_id = $1
            ORDER BY c.pub_date
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(review_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn get_comment(
        &self,
        title_id: Uuid,
        review_id: Uuid,
        comment_id: Uuid,
    ) -> ApiResult<Comment> {
        // The join with reviews pins the comment to its full nesting path.
        sqlx::query_as::<_, Comment>(
            r#"
            SELECT c.id, c.review_id, c.author_id, c.text, u.username AS author,
                   c.pub_date
            FROM comments c
            JOIN users u ON u.id = c.author_id
            JOIN reviews r ON r.id = c.review_id
            WHERE c.id = $1 AND c.review_id = $2 AND r.title_id = $3
            "#,
        )
        .bind(comment_id)
        .bind(review_id)
        .bind(title_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ApiError::NotFound("comment"))
    }

    async fn create_comment(
        &self,
        title_id: Uuid,
        review_id: Uuid,
        author_id: Uuid,
        text: String,
    ) -> ApiResult<Comment> {
        self.review_exists(title_id, review_id).await?;
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            WITH inserted AS (
                INSERT INTO comments (id, review_id, author_id, text)
                VALUES ($1, $2, $3, $4)
                RETURNING id, review_id, author_id, text, pub_date
            )
            SELECT i.id, i.review_id, i.author_id, i.text, u.username AS author,
                   i.pub_date
            FROM inserted i
            JOIN users u ON u.id = i.author_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(review_id)
        .bind(author_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn update_comment(
        &self,
        title_id: Uuid,
        review_id: Uuid,
        comment_id: Uuid,
        text: Option<String>,
    ) -> ApiResult<Comment> {
        self.review_exists(title_id, review_id).await?;
        sqlx::query_as::<_, Comment>(
            r#"
            WITH updated AS (
                UPDATE comments
                SET text = COALESCE($3, text)
                WHERE id = $1 AND review_id = $2
                RETURNING id, review_id, author_id, text, pub_date
            )
            SELECT p.id, p.review_id, p.author_id, p.text, u.username AS author,
                   p.pub_date
            FROM updated p
            JOIN users u ON u.id = p.author_id
            "#,
        )
        .bind(comment_id)
        .bind(review_id)
        .bind(text)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ApiError::NotFound("comment"))
    }

    async fn delete_comment(
        &self,
        title_id: Uuid,
        review_id: Uuid,
        comment_id: Uuid,
    ) -> ApiResult<()> {
        self.review_exists(title_id, review_id).await?;
        let result = sqlx::query("DELETE FROM comments WHERE id = $1 AND review_id = $2")
            .bind(comment_id)
            .bind(review_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("comment"));
        }
        Ok(())
    }

    // --- Users ---

    async fn list_users(
        &self,
        search: Option<String>,
        limit: i64,
        offset: i64,
    ) -> ApiResult<Vec<User>> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT id, username, email, first_name, last_name, bio, role, confirmation_code \
             FROM users",
        );
        if let Some(s) = search {
            builder.push(" WHERE username ILIKE ");
            builder.push_bind(format!("%{s}%"));
        }
        builder.push(" ORDER BY username LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let users = builder.build_query_as::<User>().fetch_all(&self.pool).await?;
        Ok(users)
    }

    async fn get_user(&self, id: Uuid) -> ApiResult<User> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, email, first_name, last_name, bio, role, confirmation_code \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ApiError::NotFound("user"))
    }

    async fn get_user_by_username(&self, username: &str) -> ApiResult<User> {
        self.find_user_by_username(username)
            .await?
            .ok_or(ApiError::NotFound("user"))
    }

    async fn find_user_by_username(&self, username: &str) -> ApiResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, first_name, last_name, bio, role, confirmation_code \
             FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> ApiResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, first_name, last_name, bio, role, confirmation_code \
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, user: User) -> ApiResult<User> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, first_name, last_name, bio, role, confirmation_code)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, username, email, first_name, last_name, bio, role, confirmation_code
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.bio)
        .bind(user.role)
        .bind(&user.confirmation_code)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    /// Partial update via COALESCE: only provided fields change. Role
    /// filtering for non-admin callers happens before this is called.
    async fn update_user(&self, id: Uuid, req: UpdateUserRequest) -> ApiResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                email = COALESCE($3, email),
                first_name = COALESCE($4, first_name),
                last_name = COALESCE($5, last_name),
                bio = COALESCE($6, bio),
                role = COALESCE($7, role)
            WHERE id = $1
            RETURNING id, username, email, first_name, last_name, bio, role, confirmation_code
            "#,
        )
        .bind(id)
        .bind(req.username)
        .bind(req.email)
        .bind(req.first_name)
        .bind(req.last_name)
        .bind(req.bio)
        .bind(req.role)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ApiError::NotFound("user"))
    }

    async fn delete_user(&self, username: &str) -> ApiResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE username = $1")
            .bind(username)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("user"));
        }
        Ok(())
    }

    async fn set_confirmation_code(&self, user_id: Uuid, code: &str) -> ApiResult<()> {
        sqlx::query("UPDATE users SET confirmation_code = $2 WHERE id = $1")
            .bind(user_id)
            .bind(code)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear_confirmation_code(&self, user_id: Uuid) -> ApiResult<()> {
        sqlx::query("UPDATE users SET confirmation_code = NULL WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // --- Bulk-insert surface ---

    async fn bulk_insert_categories(&self, rows: Vec<Category>) -> ApiResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut count = 0u64;
        for row in rows {
            count += sqlx::query("INSERT INTO categories (id, name, slug) VALUES ($1, $2, $3)")
                .bind(row.id)
                .bind(&row.name)
                .bind(&row.slug)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(count)
    }

    async fn bulk_insert_genres(&self, rows: Vec<Genre>) -> ApiResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut count = 0u64;
        for row in rows {
            count += sqlx::query("INSERT INTO genres (id, name, slug) VALUES ($1, $2, $3)")
                .bind(row.id)
                .bind(&row.name)
                .bind(&row.slug)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(count)
    }

    async fn bulk_insert_titles(&self, rows: Vec<TitleRow>) -> ApiResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut count = 0u64;
        for row in rows {
            count += sqlx::query(
                "INSERT INTO titles (id, name, year, description, category_id) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(row.id)
            .bind(&row.name)
            .bind(row.year)
            .bind(&row.description)
            .bind(row.category_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }
        tx.commit().await?;
        Ok(count)
    }

    async fn bulk_insert_title_genres(&self, rows: Vec<(Uuid, Uuid)>) -> ApiResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut count = 0u64;
        for (title_id, genre_id) in rows {
            count += sqlx::query("INSERT INTO title_genres (title_id, genre_id) VALUES ($1, $2)")
                .bind(title_id)
                .bind(genre_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(count)
    }

    async fn bulk_insert_users(&self, rows: Vec<User>) -> ApiResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut count = 0u64;
        for row in rows {
            count += sqlx::query(
                "INSERT INTO users (id, username, email, first_name, last_name, bio, role, confirmation_code) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(row.id)
            .bind(&row.username)
            .bind(&row.email)
            .bind(&row.first_name)
            .bind(&row.last_name)
            .bind(&row.bio)
            .bind(row.role)
            .bind(&row.confirmation_code)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }
        tx.commit().await?;
        Ok(count)
    }

    async fn bulk_insert_reviews(&self, rows: Vec<ReviewRecord>) -> ApiResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut count = 0u64;
        for row in rows {
            count += sqlx::query(
                "INSERT INTO reviews (id, title_id, author_id, text, score, pub_date) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(row.id)
            .bind(row.title_id)
            .bind(row.author_id)
            .bind(&row.text)
            .bind(row.score)
            .bind(row.pub_date)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }
        tx.commit().await?;
        Ok(count)
    }

    async fn bulk_insert_comments(&self, rows: Vec<CommentRecord>) -> ApiResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut count = 0u64;
        for row in rows {
            count += sqlx::query(
                "INSERT INTO comments (id, review_id, author_id, text, pub_date) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(row.id)
            .bind(row.review_id)
            .bind(row.author_id)
            .bind(&row.text)
            .bind(row.pub_date)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }
        tx.commit().await?;
        Ok(count)
    }
}
