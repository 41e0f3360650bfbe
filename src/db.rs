mod schema;

pub use schema::Database;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID.
    pub id: String,
    /// Username for login.
    pub username: String,
    /// Argon2 password hash.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Display name.
    pub display_name: Option<String>,
    /// User role: "admin" or "user".
    pub role: String,
    /// Account creation timestamp.
    pub created_at: i64,
    /// Last login timestamp.
    pub last_login: Option<i64>,
}

/// Authentication session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session token.
    pub token: String,
    /// User ID.
    pub user_id: String,
    /// Expiration timestamp.
    pub expires_at: i64,
}

/// Book category (static reference set).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    /// Unique category ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Creation timestamp.
    pub created_at: i64,
}

/// Book in the library.
///
/// Immutable from the reader's perspective; only the uploader mutates it,
/// at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    /// Book ID.
    pub id: String,
    /// Book title.
    pub title: String,
    /// Author name.
    pub author: String,
    /// Book description.
    pub description: Option<String>,
    /// Category ID the book belongs to.
    pub category_id: Option<String>,
    /// Storage path of the cover image.
    pub cover_path: Option<String>,
    /// Storage path of the book file (external-file books).
    pub file_path: Option<String>,
    /// Publication year.
    pub publication_year: Option<i64>,
    /// ID of the user who uploaded the book.
    pub uploader_id: Option<String>,
    /// Creation timestamp.
    pub created_at: i64,
}

/// Single page of a book's paginated content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// Page ID.
    pub id: i64,
    /// Book ID.
    pub book_id: String,
    /// 1-based page number, unique within the book.
    pub page_number: i64,
    /// Page text content.
    pub content: String,
}

/// Reading-position bookmark.
///
/// At most one per (user, book) pair; updated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmark {
    /// Bookmark ID.
    pub id: String,
    /// User ID.
    pub user_id: String,
    /// Book ID.
    pub book_id: String,
    /// Bookmarked page number.
    pub page_number: i64,
    /// Creation timestamp.
    pub created_at: i64,
    /// Last update timestamp.
    pub updated_at: i64,
}

/// Reading-history record for a (user, book) pair.
///
/// At most one row per pair. A non-null `completed_at` signals the book was
/// completed; rating and review live on the same row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// History entry ID.
    pub id: String,
    /// User ID.
    pub user_id: String,
    /// Book ID.
    pub book_id: String,
    /// Completion timestamp (None while not completed).
    pub completed_at: Option<i64>,
    /// Rating, 1-5.
    pub rating: Option<i64>,
    /// Free-text review.
    pub review: Option<String>,
    /// Creation timestamp.
    pub created_at: i64,
    /// Last update timestamp.
    pub updated_at: i64,
}

/// Favorite association between a user and a book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoriteEntry {
    /// Favorite ID.
    pub id: String,
    /// User ID.
    pub user_id: String,
    /// Book ID.
    pub book_id: String,
    /// Creation timestamp.
    pub created_at: i64,
}

/// Timestamp helper.
pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Convert timestamp to DateTime.
pub fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}
