#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use review_portal::{
    AppConfig, AppState, MockMailer, create_router,
    error::{ApiError, ApiResult},
    mailer::MailerState,
    models::{
        CatalogItemRequest, Category, Comment, CommentRecord, Genre, Review, ReviewRecord, Role,
        TitleDetail, TitleRow, TitleWrite, UpdateTitleRequest, UpdateUserRequest, User,
        title_detail,
    },
    repository::{Repository, RepositoryState, TitleQuery},
};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use uuid::Uuid;

// --- In-memory Repository double ---
//
// Implements the same contract as PostgresRepository over plain vectors, so
// the full router can be exercised without a database. Uniqueness and
// cascade rules mirror the schema constraints.

#[derive(Default)]
struct Store {
    categories: Vec<Category>,
    genres: Vec<Genre>,
    titles: Vec<TitleRow>,
    title_genres: Vec<(Uuid, Uuid)>,
    reviews: Vec<ReviewRecord>,
    comments: Vec<CommentRecord>,
    users: Vec<User>,
}

pub struct MemoryRepository {
    store: Mutex<Store>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store::default()),
        }
    }
}

fn page<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn username_of(store: &Store, user_id: Uuid) -> String {
    store
        .users
        .iter()
        .find(|u| u.id == user_id)
        .map(|u| u.username.clone())
        .unwrap_or_default()
}

fn review_out(store: &Store, record: &ReviewRecord) -> Review {
    Review {
        id: record.id,
        title_id: record.title_id,
        author_id: record.author_id,
        text: record.text.clone(),
        author: username_of(store, record.author_id),
        score: record.score,
        pub_date: record.pub_date,
    }
}

fn comment_out(store: &Store, record: &CommentRecord) -> Comment {
    Comment {
        id: record.id,
        review_id: record.review_id,
        author_id: record.author_id,
        text: record.text.clone(),
        author: username_of(store, record.author_id),
        pub_date: record.pub_date,
    }
}

fn detail_of(store: &Store, row: &TitleRow) -> TitleDetail {
    let category = store
        .categories
        .iter()
        .find(|c| c.id == row.category_id)
        .cloned()
        .unwrap_or_default();
    let mut genre: Vec<Genre> = store
        .title_genres
        .iter()
        .filter(|(title_id, _)| *title_id == row.id)
        .filter_map(|(_, genre_id)| store.genres.iter().find(|g| g.id == *genre_id).cloned())
        .collect();
    genre.sort_by(|a, b| a.name.cmp(&b.name));

    let scores: Vec<i32> = store
        .reviews
        .iter()
        .filter(|r| r.title_id == row.id)
        .map(|r| r.score)
        .collect();
    let rating = if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<i32>() as f64 / scores.len() as f64)
    };
    title_detail(row.clone(), category, genre, rating)
}

fn review_in_store(store: &Store, title_id: Uuid, review_id: Uuid) -> ApiResult<ReviewRecord> {
    store
        .reviews
        .iter()
        .find(|r| r.id == review_id && r.title_id == title_id)
        .cloned()
        .ok_or(ApiError::NotFound("review"))
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn list_categories(
        &self,
        search: Option<String>,
        limit: i64,
        offset: i64,
    ) -> ApiResult<Vec<Category>> {
        let store = self.store.lock().unwrap();
        let mut items: Vec<Category> = store
            .categories
            .iter()
            .filter(|c| search.as_deref().is_none_or(|s| contains_ci(&c.name, s)))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(page(items, limit, offset))
    }

    async fn create_category(&self, req: CatalogItemRequest) -> ApiResult<Category> {
        let mut store = self.store.lock().unwrap();
        if store.categories.iter().any(|c| c.slug == req.slug) {
            return Err(ApiError::slug_taken());
        }
        let category = Category {
            id: Uuid::new_v4(),
            name: req.name,
            slug: req.slug,
        };
        store.categories.push(category.clone());
        Ok(category)
    }

    async fn delete_category(&self, slug: &str) -> ApiResult<()> {
        let mut store = self.store.lock().unwrap();
        let Some(category) = store.categories.iter().find(|c| c.slug == slug).cloned() else {
            return Err(ApiError::NotFound("category"));
        };
        // Cascade: titles in this category, then their reviews and comments.
        let doomed: Vec<Uuid> = store
            .titles
            .iter()
            .filter(|t| t.category_id == category.id)
            .map(|t| t.id)
            .collect();
        let doomed_reviews: Vec<Uuid> = store
            .reviews
            .iter()
            .filter(|r| doomed.contains(&r.title_id))
            .map(|r| r.id)
            .collect();
        store.comments.retain(|c| !doomed_reviews.contains(&c.review_id));
        store.reviews.retain(|r| !doomed.contains(&r.title_id));
        store.title_genres.retain(|(t, _)| !doomed.contains(t));
        store.titles.retain(|t| t.category_id != category.id);
        store.categories.retain(|c| c.slug != slug);
        Ok(())
    }

    async fn list_genres(
        &self,
        search: Option<String>,
        limit: i64,
        offset: i64,
    ) -> ApiResult<Vec<Genre>> {
        let store = self.store.lock().unwrap();
        let mut items: Vec<Genre> = store
            .genres
            .iter()
            .filter(|g| search.as_deref().is_none_or(|s| contains_ci(&g.name, s)))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(page(items, limit, offset))
    }

    async fn create_genre(&self, req: CatalogItemRequest) -> ApiResult<Genre> {
        let mut store = self.store.lock().unwrap();
        if store.genres.iter().any(|g| g.slug == req.slug) {
            return Err(ApiError::slug_taken());
        }
        let genre = Genre {
            id: Uuid::new_v4(),
            name: req.name,
            slug: req.slug,
        };
        store.genres.push(genre.clone());
        Ok(genre)
    }

    async fn delete_genre(&self, slug: &str) -> ApiResult<()> {
        let mut store = self.store.lock().unwrap();
        let Some(genre) = store.genres.iter().find(|g| g.slug == slug).cloned() else {
            return Err(ApiError::NotFound("genre"));
        };
        store.title_genres.retain(|(_, g)| *g != genre.id);
        store.genres.retain(|g| g.slug != slug);
        Ok(())
    }

    async fn list_titles(
        &self,
        query: TitleQuery,
        limit: i64,
        offset: i64,
    ) -> ApiResult<Vec<TitleDetail>> {
        let store = self.store.lock().unwrap();
        let mut details: Vec<TitleDetail> = store
            .titles
            .iter()
            .map(|row| detail_of(&store, row))
            .filter(|d| {
                query
                    .category
                    .as_deref()
                    .is_none_or(|slug| d.category.slug == slug)
            })
            .filter(|d| {
                query
                    .genre
                    .as_deref()
                    .is_none_or(|slug| d.genre.iter().any(|g| g.slug == slug))
            })
            .filter(|d| query.name.as_deref().is_none_or(|n| contains_ci(&d.name, n)))
            .filter(|d| query.year.is_none_or(|y| d.year == y))
            .collect();
        details.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(page(details, limit, offset))
    }

    async fn get_title(&self, id: Uuid) -> ApiResult<TitleDetail> {
        let store = self.store.lock().unwrap();
        store
            .titles
            .iter()
            .find(|t| t.id == id)
            .map(|row| detail_of(&store, row))
            .ok_or(ApiError::NotFound("title"))
    }

    async fn create_title(&self, req: TitleWrite) -> ApiResult<TitleDetail> {
        let mut store = self.store.lock().unwrap();
        let category = store
            .categories
            .iter()
            .find(|c| c.slug == req.category)
            .cloned()
            .ok_or_else(|| ApiError::validation("category", "unknown category slug."))?;
        let mut genres = Vec::new();
        for slug in &req.genre {
            let genre = store
                .genres
                .iter()
                .find(|g| &g.slug == slug)
                .cloned()
                .ok_or_else(|| ApiError::validation("genre", "unknown genre slug."))?;
            genres.push(genre);
        }
        let row = TitleRow {
            id: Uuid::new_v4(),
            name: req.name,
            year: req.year,
            description: req.description.unwrap_or_default(),
            category_id: category.id,
        };
        for genre in &genres {
            store.title_genres.push((row.id, genre.id));
        }
        store.titles.push(row.clone());
        Ok(detail_of(&store, &row))
    }

    async fn update_title(&self, id: Uuid, req: UpdateTitleRequest) -> ApiResult<TitleDetail> {
        let mut store = self.store.lock().unwrap();
        let category_id = match &req.category {
            Some(slug) => Some(
                store
                    .categories
                    .iter()
                    .find(|c| &c.slug == slug)
                    .map(|c| c.id)
                    .ok_or_else(|| ApiError::validation("category", "unknown category slug."))?,
            ),
            None => None,
        };
        let genre_ids = match &req.genre {
            Some(slugs) => {
                let mut ids = Vec::new();
                for slug in slugs {
                    let id = store
                        .genres
                        .iter()
                        .find(|g| &g.slug == slug)
                        .map(|g| g.id)
                        .ok_or_else(|| ApiError::validation("genre", "unknown genre slug."))?;
                    ids.push(id);
                }
                Some(ids)
            }
            None => None,
        };

        let position = store
            .titles
            .iter()
            .position(|t| t.id == id)
            .ok_or(ApiError::NotFound("title"))?;
        {
            let row = &mut store.titles[position];
            if let Some(name) = req.name {
                row.name = name;
            }
            if let Some(year) = req.year {
                row.year = year;
            }
            if let Some(description) = req.description {
                row.description = description;
            }
            if let Some(category_id) = category_id {
                row.category_id = category_id;
            }
        }
        if let Some(ids) = genre_ids {
            store.title_genres.retain(|(t, _)| *t != id);
            for genre_id in ids {
                store.title_genres.push((id, genre_id));
            }
        }
        let row = store.titles[position].clone();
        Ok(detail_of(&store, &row))
    }

    async fn delete_title(&self, id: Uuid) -> ApiResult<()> {
        let mut store = self.store.lock().unwrap();
        if !store.titles.iter().any(|t| t.id == id) {
            return Err(ApiError::NotFound("title"));
        }
        let doomed_reviews: Vec<Uuid> = store
            .reviews
            .iter()
            .filter(|r| r.title_id == id)
            .map(|r| r.id)
            .collect();
        store.comments.retain(|c| !doomed_reviews.contains(&c.review_id));
        store.reviews.retain(|r| r.title_id != id);
        store.title_genres.retain(|(t, _)| *t != id);
        store.titles.retain(|t| t.id != id);
        Ok(())
    }

    async fn list_reviews(
        &self,
        title_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> ApiResult<Vec<Review>> {
        let store = self.store.lock().unwrap();
        if !store.titles.iter().any(|t| t.id == title_id) {
            return Err(ApiError::NotFound("title"));
        }
        let mut items: Vec<Review> = store
            .reviews
            .iter()
            .filter(|r| r.title_id == title_id)
            .map(|r| review_out(&store, r))
            .collect();
        items.sort_by_key(|r| r.pub_date);
        Ok(page(items, limit, offset))
    }

    async fn get_review(&self, title_id: Uuid, review_id: Uuid) -> ApiResult<Review> {
        let store = self.store.lock().unwrap();
        let record = review_in_store(&store, title_id, review_id)?;
        Ok(review_out(&store, &record))
    }

    async fn create_review(
        &self,
        title_id: Uuid,
        author_id: Uuid,
        text: String,
        score: i32,
    ) -> ApiResult<Review> {
        let mut store = self.store.lock().unwrap();
        if !store.titles.iter().any(|t| t.id == title_id) {
            return Err(ApiError::NotFound("title"));
        }
        // The (author, title) unique constraint.
        if store
            .reviews
            .iter()
            .any(|r| r.title_id == title_id && r.author_id == author_id)
        {
            return Err(ApiError::conflict("detail", "Not unique!"));
        }
        let record = ReviewRecord {
            id: Uuid::new_v4(),
            title_id,
            author_id,
            text,
            score,
            pub_date: Utc::now(),
        };
        store.reviews.push(record.clone());
        Ok(review_out(&store, &record))
    }

    async fn update_review(
        &self,
        title_id: Uuid,
        review_id: Uuid,
        text: Option<String>,
        score: Option<i32>,
    ) -> ApiResult<Review> {
        let mut store = self.store.lock().unwrap();
        let position = store
            .reviews
            .iter()
            .position(|r| r.id == review_id && r.title_id == title_id)
            .ok_or(ApiError::NotFound("review"))?;
        {
            let record = &mut store.reviews[position];
            if let Some(text) = text {
                record.text = text;
            }
            if let Some(score) = score {
                record.score = score;
            }
        }
        let record = store.reviews[position].clone();
        Ok(review_out(&store, &record))
    }

    async fn delete_review(&self, title_id: Uuid, review_id: Uuid) -> ApiResult<()> {
        let mut store = self.store.lock().unwrap();
        review_in_store(&store, title_id, review_id)?;
        store.comments.retain(|c| c.review_id != review_id);
        store.reviews.retain(|r| r.id != review_id);
        Ok(())
    }

    async fn list_comments(
        &self,
        title_id: Uuid,
        review_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> ApiResult<Vec<Comment>> {
        let store = self.store.lock().unwrap();
        review_in_store(&store, title_id, review_id)?;
        let mut items: Vec<Comment> = store
            .comments
            .iter()
            .filter(|c| c.review_id == review_id)
            .map(|c| comment_out(&store, c))
            .collect();
        items.sort_by_key(|c| c.pub_date);
        Ok(page(items, limit, offset))
    }

    async fn get_comment(
        &self,
        title_id: Uuid,
        review_id: Uuid,
        comment_id: Uuid,
    ) -> ApiResult<Comment> {
        let store = self.store.lock().unwrap();
        review_in_store(&store, title_id, review_id)?;
        store
            .comments
            .iter()
            .find(|c| c.id == comment_id && c.review_id == review_id)
            .map(|c| comment_out(&store, c))
            .ok_or(ApiError::NotFound("comment"))
    }

    async fn create_comment(
        &self,
        title_id: Uuid,
        review_id: Uuid,
        author_id: Uuid,
        text: String,
    ) -> ApiResult<Comment> {
        let mut store = self.store.lock().unwrap();
        review_in_store(&store, title_id, review_id)?;
        let record = CommentRecord {
            id: Uuid::new_v4(),
            review_id,
            author_id,
            text,
            pub_date: Utc::now(),
        };
        store.comments.push(record.clone());
        Ok(comment_out(&store, &record))
    }

    async fn update_comment(
        &self,
        title_id: Uuid,
        review_id: Uuid,
        comment_id: Uuid,
        text: Option<String>,
    ) -> ApiResult<Comment> {
        let mut store = self.store.lock().unwrap();
        review_in_store(&store, title_id, review_id)?;
        let position = store
            .comments
            .iter()
            .position(|c| c.id == comment_id && c.review_id == review_id)
            .ok_or(ApiError::NotFound("comment"))?;
        if let Some(text) = text {
            store.comments[position].text = text;
        }
        let record = store.comments[position].clone();
        Ok(comment_out(&store, &record))
    }

    async fn delete_comment(
        &self,
        title_id: Uuid,
        review_id: Uuid,
        comment_id: Uuid,
    ) -> ApiResult<()> {
        let mut store = self.store.lock().unwrap();
        review_in_store(&store, title_id, review_id)?;
        if !store
            .comments
            .iter()
            .any(|c| c.id == comment_id && c.review_id == review_id)
        {
            return Err(ApiError::NotFound("comment"));
        }
        store.comments.retain(|c| c.id != comment_id);
        Ok(())
    }

    async fn list_users(
        &self,
        search: Option<String>,
        limit: i64,
        offset: i64,
    ) -> ApiResult<Vec<User>> {
        let store = self.store.lock().unwrap();
        let mut items: Vec<User> = store
            .users
            .iter()
            .filter(|u| {
                search
                    .as_deref()
                    .is_none_or(|s| contains_ci(&u.username, s))
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(page(items, limit, offset))
    }

    async fn get_user(&self, id: Uuid) -> ApiResult<User> {
        let store = self.store.lock().unwrap();
        store
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or(ApiError::NotFound("user"))
    }

    async fn get_user_by_username(&self, username: &str) -> ApiResult<User> {
        self.find_user_by_username(username)
            .await?
            .ok_or(ApiError::NotFound("user"))
    }

    async fn find_user_by_username(&self, username: &str) -> ApiResult<Option<User>> {
        let store = self.store.lock().unwrap();
        Ok(store.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> ApiResult<Option<User>> {
        let store = self.store.lock().unwrap();
        Ok(store.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, user: User) -> ApiResult<User> {
        let mut store = self.store.lock().unwrap();
        if store.users.iter().any(|u| u.username == user.username) {
            return Err(ApiError::conflict(
                "username",
                "this username is already in use.",
            ));
        }
        if store.users.iter().any(|u| u.email == user.email) {
            return Err(ApiError::conflict("email", "this email is already in use."));
        }
        store.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: Uuid, req: UpdateUserRequest) -> ApiResult<User> {
        let mut store = self.store.lock().unwrap();
        let position = store
            .users
            .iter()
            .position(|u| u.id == id)
            .ok_or(ApiError::NotFound("user"))?;
        {
            let user = &mut store.users[position];
            if let Some(username) = req.username {
                user.username = username;
            }
            if let Some(email) = req.email {
                user.email = email;
            }
            if let Some(first_name) = req.first_name {
                user.first_name = first_name;
            }
            if let Some(last_name) = req.last_name {
                user.last_name = last_name;
            }
            if let Some(bio) = req.bio {
                user.bio = bio;
            }
            if let Some(role) = req.role {
                user.role = role;
            }
        }
        Ok(store.users[position].clone())
    }

    async fn delete_user(&self, username: &str) -> ApiResult<()> {
        let mut store = self.store.lock().unwrap();
        let Some(user) = store.users.iter().find(|u| u.username == username).cloned() else {
            return Err(ApiError::NotFound("user"));
        };
        let doomed_reviews: Vec<Uuid> = store
            .reviews
            .iter()
            .filter(|r| r.author_id == user.id)
            .map(|r| r.id)
            .collect();
        store
            .comments
            .retain(|c| c.author_id != user.id && !doomed_reviews.contains(&c.review_id));
        store.reviews.retain(|r| r.author_id != user.id);
        store.users.retain(|u| u.username != username);
        Ok(())
    }

    async fn set_confirmation_code(&self, user_id: Uuid, code: &str) -> ApiResult<()> {
        let mut store = self.store.lock().unwrap();
        if let Some(user) = store.users.iter_mut().find(|u| u.id == user_id) {
            user.confirmation_code = Some(code.to_string());
        }
        Ok(())
    }

    async fn clear_confirmation_code(&self, user_id: Uuid) -> ApiResult<()> {
        let mut store = self.store.lock().unwrap();
        if let Some(user) = store.users.iter_mut().find(|u| u.id == user_id) {
            user.confirmation_code = None;
        }
        Ok(())
    }

    async fn bulk_insert_categories(&self, rows: Vec<Category>) -> ApiResult<u64> {
        let mut store = self.store.lock().unwrap();
        let count = rows.len() as u64;
        store.categories.extend(rows);
        Ok(count)
    }

    async fn bulk_insert_genres(&self, rows: Vec<Genre>) -> ApiResult<u64> {
        let mut store = self.store.lock().unwrap();
        let count = rows.len() as u64;
        store.genres.extend(rows);
        Ok(count)
    }

    async fn bulk_insert_titles(&self, rows: Vec<TitleRow>) -> ApiResult<u64> {
        let mut store = self.store.lock().unwrap();
        let count = rows.len() as u64;
        store.titles.extend(rows);
        Ok(count)
    }

    async fn bulk_insert_title_genres(&self, rows: Vec<(Uuid, Uuid)>) -> ApiResult<u64> {
        let mut store = self.store.lock().unwrap();
        let count = rows.len() as u64;
        store.title_genres.extend(rows);
        Ok(count)
    }

    async fn bulk_insert_users(&self, rows: Vec<User>) -> ApiResult<u64> {
        let mut store = self.store.lock().unwrap();
        let count = rows.len() as u64;
        store.users.extend(rows);
        Ok(count)
    }

    async fn bulk_insert_reviews(&self, rows: Vec<ReviewRecord>) -> ApiResult<u64> {
        let mut store = self.store.lock().unwrap();
        let count = rows.len() as u64;
        store.reviews.extend(rows);
        Ok(count)
    }

    async fn bulk_insert_comments(&self, rows: Vec<CommentRecord>) -> ApiResult<u64> {
        let mut store = self.store.lock().unwrap();
        let count = rows.len() as u64;
        store.comments.extend(rows);
        Ok(count)
    }
}

// --- Test application scaffolding ---

pub struct TestApp {
    pub address: String,
    pub repo: Arc<MemoryRepository>,
    pub mailer: MockMailer,
}

/// Spawns the full router on a random port, backed by the in-memory
/// repository and the recording mailer. The default config runs in Local
/// mode, so tests can authenticate either with real bearer tokens or the
/// x-user-id development bypass.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(AppConfig::default(), MockMailer::new()).await
}

/// Same as `spawn_app`, with an injectable mailer (e.g. `MockMailer::new_failing()`
/// to simulate a gateway outage).
pub async fn spawn_app_with_mailer(mailer: MockMailer) -> TestApp {
    spawn_app_with(AppConfig::default(), mailer).await
}

/// Fully injectable variant for tests that tweak the configuration.
pub async fn spawn_app_with(config: AppConfig, mailer: MockMailer) -> TestApp {
    let repo = Arc::new(MemoryRepository::new());

    let state = AppState {
        repo: repo.clone() as RepositoryState,
        mailer: Arc::new(mailer.clone()) as MailerState,
        config,
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address,
        repo,
        mailer,
    }
}

/// Seeds a user directly through the repository and returns their id.
pub async fn seed_user(app: &TestApp, username: &str, role: Role) -> Uuid {
    let user = User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email: format!("{username}@example.com"),
        role,
        ..Default::default()
    };
    app.repo.create_user(user).await.expect("seed user").id
}

/// Seeds one category and one genre for title tests.
pub async fn seed_catalog(app: &TestApp) {
    app.repo
        .create_category(CatalogItemRequest {
            name: "Books".to_string(),
            slug: "books".to_string(),
        })
        .await
        .expect("seed category");
    app.repo
        .create_genre(CatalogItemRequest {
            name: "Sci-Fi".to_string(),
            slug: "sci-fi".to_string(),
        })
        .await
        .expect("seed genre");
}

/// Seeds a title in the "books" category and returns its id.
pub async fn seed_title(app: &TestApp, name: &str, year: i32) -> Uuid {
    app.repo
        .create_title(TitleWrite {
            name: name.to_string(),
            year,
            description: None,
            genre: vec!["sci-fi".to_string()],
            category: "books".to_string(),
        })
        .await
        .expect("seed title")
        .id
}
