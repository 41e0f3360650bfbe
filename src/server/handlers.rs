//! HTTP request handlers.

use crate::catalog::{CatalogEntry, CategoryFilter};
use crate::db::{self, Bookmark, Category, HistoryEntry, Page};
use crate::error::{AppError, Result};
use crate::progress::compute_progress_percent;
use crate::server::AppState;
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, Response},
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

// ============================================================================
// WEB PAGES
// ============================================================================

/// Index page (simple HTML).
pub async fn index(State(state): State<AppState>) -> Html<String> {
    let book_count = state.db.book_count().unwrap_or(0);
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <style>
        body {{ font-family: system-ui, sans-serif; max-width: 600px; margin: 2rem auto; padding: 0 1rem; }}
        h1 {{ color: #333; }}
        a {{ color: #0066cc; }}
        .stats {{ background: #f5f5f5; padding: 1rem; border-radius: 8px; margin: 1rem 0; }}
        code {{ background: #e8e8e8; padding: 0.2rem 0.4rem; border-radius: 4px; }}
    </style>
</head>
<body>
    <h1>📚 {title}</h1>
    <div class="stats">
        <p><strong>{book_count}</strong> books in library</p>
    </div>
    <h2>API</h2>
    <ul>
        <li><a href="/api/books">Books (JSON)</a></li>
        <li><a href="/api/categories">Categories (JSON)</a></li>
        <li><a href="/api/stats">Stats (JSON)</a></li>
    </ul>
</body>
</html>"#,
        title = state.config.server.title,
        book_count = book_count,
    );

    Html(html)
}

// ============================================================================
// AUTH API
// ============================================================================

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

/// Login response.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    token: String,
    user_id: String,
    username: String,
    role: String,
}

/// Register request.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    username: String,
    password: String,
}

/// Auth login.
pub async fn auth_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let (user, token) = state.auth.login(&req.username, &req.password)?;

    Ok(Json(LoginResponse {
        token,
        user_id: user.id,
        username: user.username,
        role: user.role,
    }))
}

/// Auth register.
pub async fn auth_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<LoginResponse>> {
    let _user = state.auth.register(&req.username, &req.password)?;
    let (user, token) = state.auth.login(&req.username, &req.password)?;

    Ok(Json(LoginResponse {
        token,
        user_id: user.id,
        username: user.username,
        role: user.role,
    }))
}

/// Auth logout.
pub async fn auth_logout(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode> {
    if let Some(token) = extract_token(&headers) {
        state.auth.logout(&token)?;
    }
    Ok(StatusCode::OK)
}

/// Get current user info.
pub async fn auth_me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<db::User>> {
    let user = get_authenticated_user(&state, &headers)?;
    Ok(Json(user))
}

// ============================================================================
// CATALOG API
// ============================================================================

/// Book listing query parameters.
#[derive(Debug, Deserialize)]
pub struct ListBooksParams {
    /// Category ID or "all".
    category: Option<String>,
    /// Free-text search over title or author.
    q: Option<String>,
}

/// List books, optionally filtered by category and search text.
pub async fn list_books(
    State(state): State<AppState>,
    Query(params): Query<ListBooksParams>,
) -> Result<Json<Vec<CatalogEntry>>> {
    let filter = CategoryFilter::parse(params.category.as_deref());
    let search_text = params.q.unwrap_or_default();

    let entries = state.catalog.list_books(&filter, &search_text).await?;
    Ok(Json(entries))
}

/// List categories.
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    Ok(Json(state.catalog.list_categories()?))
}

/// Book detail response.
#[derive(Debug, Serialize)]
pub struct BookResponse {
    /// The book.
    #[serde(flatten)]
    pub book: CatalogEntry,
    /// Resolved category display name.
    pub category_name: String,
    /// Number of paginated content pages.
    pub page_count: i64,
}

/// Book metadata.
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BookResponse>> {
    let book = state.catalog.get_book(&id)?;
    let category_name = state.catalog.category_name(&book)?;
    let page_count = state.db.page_count(&id)?;

    Ok(Json(BookResponse {
        book: CatalogEntry::from_book(book),
        category_name,
        page_count,
    }))
}

/// Pages of a book, ordered by page number.
pub async fn get_book_pages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Page>>> {
    // 404 for an unknown book, empty list for a pageless one
    let _book = state.catalog.get_book(&id)?;
    Ok(Json(state.catalog.list_pages(&id)?))
}

/// Create a book from a multipart upload.
///
/// Fields: title, author, description, category_id, publication_year, and
/// optional cover / file parts.
pub async fn create_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<BookResponse>> {
    let user = get_authenticated_user(&state, &headers)?;

    let mut title = String::new();
    let mut author = String::new();
    let mut description: Option<String> = None;
    let mut category_id: Option<String> = None;
    let mut publication_year: Option<i64> = None;
    let mut cover: Option<(String, Vec<u8>)> = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Invalid(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "title" => title = read_text_field(field).await?,
            "author" => author = read_text_field(field).await?,
            "description" => description = Some(read_text_field(field).await?),
            "category_id" => category_id = Some(read_text_field(field).await?),
            "publication_year" => {
                let raw = read_text_field(field).await?;
                publication_year = Some(raw.trim().parse().map_err(|_| {
                    AppError::Invalid(format!("Invalid publication year: {}", raw))
                })?);
            }
            "cover" | "file" => {
                let ext = field
                    .file_name()
                    .and_then(|f| f.rsplit('.').next())
                    .unwrap_or("bin")
                    .to_lowercase();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Invalid(format!("Invalid upload: {}", e)))?;

                if bytes.len() as u64 > state.config.storage.max_upload_bytes {
                    return Err(AppError::Invalid(format!(
                        "Upload exceeds maximum size of {} bytes",
                        state.config.storage.max_upload_bytes
                    )));
                }

                if name == "cover" {
                    cover = Some((ext, bytes.to_vec()));
                } else {
                    file = Some((ext, bytes.to_vec()));
                }
            }
            _ => {}
        }
    }

    if title.trim().is_empty() || author.trim().is_empty() {
        return Err(AppError::Invalid(
            "Title and author are required".to_string(),
        ));
    }

    if let Some(id) = &category_id
        && state.db.get_category(id)?.is_none()
    {
        return Err(AppError::Invalid(format!("Unknown category: {}", id)));
    }

    let book_id = uuid::Uuid::new_v4().to_string();

    let cover_path = match &cover {
        Some((ext, bytes)) => {
            let path = format!("covers/{}.{}", book_id, ext);
            state.store.upload(&path, bytes)?;
            Some(path)
        }
        None => None,
    };

    let file_path = match &file {
        Some((ext, bytes)) => {
            let path = format!("books/{}.{}", book_id, ext);
            state.store.upload(&path, bytes)?;
            Some(path)
        }
        None => None,
    };

    let book = db::Book {
        id: book_id.clone(),
        title: title.trim().to_string(),
        author: author.trim().to_string(),
        description,
        category_id,
        cover_path,
        file_path,
        publication_year,
        uploader_id: Some(user.id),
        created_at: db::now_timestamp(),
    };

    state.db.create_book(&book)?;
    tracing::info!(book_id = %book_id, title = %book.title, "Book uploaded");

    let created = state.catalog.get_book(&book_id)?;
    let category_name = state.catalog.category_name(&created)?;

    Ok(Json(BookResponse {
        book: CatalogEntry::from_book(created),
        category_name,
        page_count: 0,
    }))
}

/// Page upload request.
#[derive(Debug, Deserialize)]
pub struct AddPagesRequest {
    /// Page contents, appended in order after any existing pages.
    pages: Vec<String>,
}

/// Append paginated content to a book (uploader only).
pub async fn add_book_pages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<AddPagesRequest>,
) -> Result<Json<Vec<Page>>> {
    let user = get_authenticated_user(&state, &headers)?;
    let book = state.catalog.get_book(&id)?;

    if book.uploader_id.as_deref() != Some(user.id.as_str()) {
        return Err(AppError::Invalid(
            "Only the uploader can modify book pages".to_string(),
        ));
    }

    let start = state.db.page_count(&id)?;
    for (offset, content) in req.pages.iter().enumerate() {
        state.db.create_page(&id, start + 1 + offset as i64, content)?;
    }

    Ok(Json(state.catalog.list_pages(&id)?))
}

/// Delete a book (uploader or admin), removing its stored objects.
pub async fn delete_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let user = get_authenticated_user(&state, &headers)?;
    let book = state.catalog.get_book(&id)?;

    if book.uploader_id.as_deref() != Some(user.id.as_str()) && !state.auth.is_admin(&user) {
        return Err(AppError::Invalid(
            "Only the uploader can delete a book".to_string(),
        ));
    }

    let paths: Vec<String> = [book.cover_path.clone(), book.file_path.clone()]
        .into_iter()
        .flatten()
        .collect();
    state.store.remove(&paths)?;

    state.db.delete_book(&id)?;
    tracing::info!(book_id = %id, "Book deleted");

    Ok(StatusCode::OK)
}

/// Book cover image.
pub async fn book_cover(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response<Body>> {
    let book = state.catalog.get_book(&id)?;

    let cover_path = book
        .cover_path
        .ok_or_else(|| AppError::NotFound(format!("No cover for book: {}", id)))?;

    let data = state.store.read(&cover_path)?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&cover_path))
        .header(header::CACHE_CONTROL, "public, max-age=86400")
        .body(Body::from(data))
        .unwrap_or_else(|_| Response::default()))
}

/// Book cover thumbnail.
pub async fn book_thumbnail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response<Body>> {
    let book = state.catalog.get_book(&id)?;

    let cover_path = book
        .cover_path
        .ok_or_else(|| AppError::NotFound(format!("No cover for book: {}", id)))?;

    let data = state.store.read(&cover_path)?;

    let img = image::load_from_memory(&data)?;
    let size = state.config.storage.thumbnail_size;
    let thumb = img.thumbnail(size, size * 2);

    let mut thumb_data = Vec::new();
    thumb.write_to(
        &mut std::io::Cursor::new(&mut thumb_data),
        image::ImageFormat::Png,
    )?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/png")
        .header(header::CACHE_CONTROL, "public, max-age=86400")
        .body(Body::from(thumb_data))
        .unwrap_or_else(|_| Response::default()))
}

// ============================================================================
// READER API
// ============================================================================

/// Combined reader state for a book.
#[derive(Debug, Serialize)]
pub struct ReadingStateResponse {
    /// The book.
    pub book: CatalogEntry,
    /// Resolved category display name.
    pub category_name: String,
    /// Number of paginated content pages.
    pub page_count: i64,
    /// The caller's bookmark, if any.
    pub bookmark: Option<Bookmark>,
    /// The caller's history row, if any.
    pub history: Option<HistoryEntry>,
    /// Whether the caller has favorited the book.
    pub favorite: bool,
    /// Page to resume reading at.
    pub resume_page: i64,
    /// Reading progress percentage at the resume page.
    pub progress_percent: u8,
}

/// Reader state: book, pages, bookmark, history and derived progress.
///
/// Works anonymously; user-scoped fields are absent without a valid token.
pub async fn book_reading_state(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ReadingStateResponse>> {
    let book = state.catalog.get_book(&id)?;
    let category_name = state.catalog.category_name(&book)?;
    let page_count = state.db.page_count(&id)?;

    let user = resolve_user(&state, &headers)?;

    let (bookmark, history, favorite) = match &user {
        Some(u) => (
            state.progress.resolve_bookmark(&u.id, &id)?,
            state.progress.history(&u.id, &id)?,
            state.db.is_favorite(&u.id, &id)?,
        ),
        None => (None, None, false),
    };

    let resume_page = bookmark.as_ref().map(|b| b.page_number).unwrap_or(1);
    let progress_percent = compute_progress_percent(resume_page, page_count);

    Ok(Json(ReadingStateResponse {
        book: CatalogEntry::from_book(book),
        category_name,
        page_count,
        bookmark,
        history,
        favorite,
        resume_page,
        progress_percent,
    }))
}

/// Bookmark update request.
#[derive(Debug, Deserialize)]
pub struct BookmarkRequest {
    page_number: i64,
}

/// Get the caller's bookmark for a book.
pub async fn get_bookmark(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<String>,
) -> Result<Json<Option<Bookmark>>> {
    let user = get_authenticated_user(&state, &headers)?;
    Ok(Json(state.progress.resolve_bookmark(&user.id, &book_id)?))
}

/// Set the caller's bookmark for a book.
pub async fn put_bookmark(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<String>,
    Json(req): Json<BookmarkRequest>,
) -> Result<Json<Bookmark>> {
    let user = get_authenticated_user(&state, &headers)?;
    let bookmark = state
        .progress
        .set_bookmark(&user.id, &book_id, req.page_number)?;
    Ok(Json(bookmark))
}

/// Delete a bookmark by ID. Deleting an absent bookmark is success.
pub async fn delete_bookmark(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let user = get_authenticated_user(&state, &headers)?;
    state.progress.delete_bookmark(&id, &user.id)?;
    Ok(StatusCode::OK)
}

/// Get the caller's history row for a book.
pub async fn get_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<String>,
) -> Result<Json<Option<HistoryEntry>>> {
    let user = get_authenticated_user(&state, &headers)?;
    Ok(Json(state.progress.history(&user.id, &book_id)?))
}

/// Mark a book completed.
pub async fn mark_completed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<String>,
) -> Result<Json<HistoryEntry>> {
    let user = get_authenticated_user(&state, &headers)?;
    let entry = state.progress.mark_completed(&user.id, &book_id)?;
    Ok(Json(entry))
}

/// Rating update request.
#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    /// 1-5, or null to clear.
    rating: Option<i64>,
}

/// Set or clear the caller's rating for a book.
pub async fn put_rating(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<String>,
    Json(req): Json<RatingRequest>,
) -> Result<Json<HistoryEntry>> {
    let user = get_authenticated_user(&state, &headers)?;
    let entry = state.progress.set_rating(&user.id, &book_id, req.rating)?;
    Ok(Json(entry))
}

/// Review update request.
#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    review: String,
}

/// Set the caller's review for a book.
pub async fn put_review(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<String>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<HistoryEntry>> {
    let user = get_authenticated_user(&state, &headers)?;
    let entry = state.progress.set_review(&user.id, &book_id, &req.review)?;
    Ok(Json(entry))
}

/// Add a book to the caller's favorites.
pub async fn add_favorite(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<String>,
) -> Result<StatusCode> {
    let user = get_authenticated_user(&state, &headers)?;
    state.progress.add_favorite(&user.id, &book_id)?;
    Ok(StatusCode::OK)
}

/// Remove a book from the caller's favorites.
pub async fn remove_favorite(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<String>,
) -> Result<StatusCode> {
    let user = get_authenticated_user(&state, &headers)?;
    state.progress.remove_favorite(&user.id, &book_id)?;
    Ok(StatusCode::OK)
}

/// List the caller's favorite books.
pub async fn list_favorites(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<CatalogEntry>>> {
    let user = get_authenticated_user(&state, &headers)?;
    let favorites = state.db.list_user_favorites(&user.id)?;

    Ok(Json(
        favorites
            .into_iter()
            .map(|(_, book)| CatalogEntry::from_book(book))
            .collect(),
    ))
}

/// Recommendations response.
#[derive(Debug, Serialize)]
pub struct RecommendationsResponse {
    /// Whether the list is personalized (false: recent-books fallback).
    pub personalized: bool,
    /// Recommended books.
    pub books: Vec<CatalogEntry>,
}

/// Recommend books for the caller.
pub async fn recommendations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RecommendationsResponse>> {
    let user = get_authenticated_user(&state, &headers)?;

    let history = state.db.list_user_history(&user.id)?;
    let favorites = state.db.list_user_favorites(&user.id)?;
    let personalized = !history.is_empty() || !favorites.is_empty();

    let books = state.progress.recommend_books(&user.id)?;

    Ok(Json(RecommendationsResponse {
        personalized,
        books: books.into_iter().map(CatalogEntry::from_book).collect(),
    }))
}

// ============================================================================
// PROFILE API
// ============================================================================

/// A bookmarked book with its saved position.
#[derive(Debug, Serialize)]
pub struct BookmarkedBook {
    /// The book.
    #[serde(flatten)]
    pub book: CatalogEntry,
    /// Saved page number.
    pub page_number: i64,
}

/// A completed book with its completion data.
#[derive(Debug, Serialize)]
pub struct CompletedBook {
    /// The book.
    #[serde(flatten)]
    pub book: CatalogEntry,
    /// Completion timestamp.
    pub completed_at: Option<i64>,
    /// Rating given.
    pub rating: Option<i64>,
    /// Review text.
    pub review: Option<String>,
}

/// Profile response.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    /// Account username.
    pub username: String,
    /// Display name.
    pub display_name: Option<String>,
    /// Number of favorite books.
    pub favorite_count: usize,
    /// Number of bookmarked books.
    pub bookmark_count: usize,
    /// Number of completed books.
    pub completed_count: usize,
    /// Favorite books.
    pub favorites: Vec<CatalogEntry>,
    /// Bookmarked books with positions.
    pub bookmarks: Vec<BookmarkedBook>,
    /// Reading history.
    pub history: Vec<CompletedBook>,
}

/// Profile summary: counts plus per-user favorite/bookmark/history lists.
pub async fn profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ProfileResponse>> {
    let user = get_authenticated_user(&state, &headers)?;

    let favorites: Vec<CatalogEntry> = state
        .db
        .list_user_favorites(&user.id)?
        .into_iter()
        .map(|(_, book)| CatalogEntry::from_book(book))
        .collect();

    let bookmarks: Vec<BookmarkedBook> = state
        .db
        .list_user_bookmarks(&user.id)?
        .into_iter()
        .map(|(bookmark, book)| BookmarkedBook {
            book: CatalogEntry::from_book(book),
            page_number: bookmark.page_number,
        })
        .collect();

    let history: Vec<CompletedBook> = state
        .db
        .list_user_history(&user.id)?
        .into_iter()
        .map(|(entry, book)| CompletedBook {
            book: CatalogEntry::from_book(book),
            completed_at: entry.completed_at,
            rating: entry.rating,
            review: entry.review,
        })
        .collect();

    let completed_count = history.iter().filter(|h| h.completed_at.is_some()).count();

    Ok(Json(ProfileResponse {
        username: user.username,
        display_name: user.display_name,
        favorite_count: favorites.len(),
        bookmark_count: bookmarks.len(),
        completed_count,
        favorites,
        bookmarks,
        history,
    }))
}

// ============================================================================
// FILES AND STATS
// ============================================================================

/// Serve a stored object (cover or book file).
pub async fn serve_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response<Body>> {
    let fs_path = state.store.object_path(&path)?;

    let file = tokio::fs::File::open(&fs_path).await?;
    let stream = ReaderStream::new(file);
    let body = Body::from_stream(stream);

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&path))
        .body(body)
        .unwrap_or_else(|_| Response::default()))
}

/// Stats response.
#[derive(Serialize)]
pub struct StatsResponse {
    total_books: usize,
    total_categories: usize,
    books_per_category: std::collections::HashMap<String, usize>,
}

/// API: Get library statistics.
pub async fn api_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let books = state.db.list_books(None)?;
    let categories = state.catalog.list_categories()?;

    let mut books_per_category = std::collections::HashMap::new();
    for book in &books {
        let name = categories
            .iter()
            .find(|c| Some(c.id.as_str()) == book.category_id.as_deref())
            .map(|c| c.name.clone())
            .unwrap_or_else(|| "Uncategorized".to_string());
        *books_per_category.entry(name).or_insert(0) += 1;
    }

    Ok(Json(StatsResponse {
        total_books: books.len(),
        total_categories: categories.len(),
        books_per_category,
    }))
}

// ============================================================================
// HELPERS
// ============================================================================

/// Guess a content type from a stored object path.
fn content_type_for(path: &str) -> &'static str {
    match path.rsplit('.').next().unwrap_or("").to_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "epub" => "application/epub+zip",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        _ => "application/octet-stream",
    }
}

/// Read a multipart text field.
async fn read_text_field(field: axum::extract::multipart::Field<'_>) -> Result<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::Invalid(format!("Invalid multipart field: {}", e)))
}

/// Extract token from Authorization header.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

/// Resolve the request identity, anonymous when no valid token is present.
fn resolve_user(state: &AppState, headers: &HeaderMap) -> Result<Option<db::User>> {
    match extract_token(headers) {
        Some(token) => state.auth.validate_token(&token),
        None => Ok(None),
    }
}

/// Get authenticated user from token, failing when identity is required but
/// absent.
fn get_authenticated_user(state: &AppState, headers: &HeaderMap) -> Result<db::User> {
    resolve_user(state, headers)?
        .ok_or_else(|| AppError::AuthRequired("Missing or invalid session token".to_string()))
}
