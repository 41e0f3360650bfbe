use crate::db::*;
use crate::error::{AppError, Result};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Arc;

/// Database wrapper for thread-safe access.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Open in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            -- Users table
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                display_name TEXT,
                role TEXT NOT NULL DEFAULT 'user',
                created_at INTEGER NOT NULL,
                last_login INTEGER
            );

            -- Sessions table
            CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                expires_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Categories table (static reference set)
            CREATE TABLE IF NOT EXISTS categories (
                id TEXT PRIMARY KEY,
                name TEXT UNIQUE NOT NULL,
                created_at INTEGER NOT NULL
            );

            -- Books table
            CREATE TABLE IF NOT EXISTS books (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                author TEXT NOT NULL,
                description TEXT,
                category_id TEXT,
                cover_path TEXT,
                file_path TEXT,
                publication_year INTEGER,
                uploader_id TEXT,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE SET NULL,
                FOREIGN KEY (uploader_id) REFERENCES users(id) ON DELETE SET NULL
            );

            -- Book pages table
            CREATE TABLE IF NOT EXISTS book_pages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                book_id TEXT NOT NULL,
                page_number INTEGER NOT NULL,
                content TEXT NOT NULL,
                UNIQUE (book_id, page_number),
                FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
            );

            -- Bookmarks table: at most one row per (user, book)
            CREATE TABLE IF NOT EXISTS bookmarks (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                book_id TEXT NOT NULL,
                page_number INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE (user_id, book_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
            );

            -- Reading history table: at most one row per (user, book)
            CREATE TABLE IF NOT EXISTS reading_history (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                book_id TEXT NOT NULL,
                completed_at INTEGER,
                rating INTEGER,
                review TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE (user_id, book_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
            );

            -- Favorites table
            CREATE TABLE IF NOT EXISTS favorites (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                book_id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE (user_id, book_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_books_category ON books(category_id);
            CREATE INDEX IF NOT EXISTS idx_books_created ON books(created_at);
            CREATE INDEX IF NOT EXISTS idx_pages_book ON book_pages(book_id);
            CREATE INDEX IF NOT EXISTS idx_bookmarks_user ON bookmarks(user_id);
            CREATE INDEX IF NOT EXISTS idx_history_user ON reading_history(user_id);
            CREATE INDEX IF NOT EXISTS idx_favorites_user ON favorites(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
            "#,
        )
        .map_err(|e| AppError::Internal(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    /// Run raw SQL, for tests that simulate legacy data states.
    #[cfg(test)]
    pub(crate) fn execute_batch_raw(&self, sql: &str) -> Result<()> {
        self.conn
            .lock()
            .execute_batch(sql)
            .map_err(|e| AppError::Internal(format!("Failed to execute batch: {}", e)))
    }

    // ========== USER OPERATIONS ==========

    /// Create a new user.
    pub fn create_user(&self, user: &User) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO users (id, username, password_hash, display_name, role, created_at, last_login)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.id,
                user.username,
                user.password_hash,
                user.display_name,
                user.role,
                user.created_at,
                user.last_login,
            ],
        )
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                AppError::Invalid(format!("Username '{}' already exists", user.username))
            } else {
                AppError::Internal(format!("Failed to create user: {}", e))
            }
        })?;
        Ok(())
    }

    /// Get user by username.
    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, username, password_hash, display_name, role, created_at, last_login
             FROM users WHERE username = ?1",
            params![username],
            Self::row_to_user,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get user: {}", e)))
    }

    /// Get user by ID.
    pub fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, username, password_hash, display_name, role, created_at, last_login
             FROM users WHERE id = ?1",
            params![id],
            Self::row_to_user,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get user: {}", e)))
    }

    /// List all users.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, username, password_hash, display_name, role, created_at, last_login
                 FROM users ORDER BY username",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let users = stmt
            .query_map([], Self::row_to_user)
            .map_err(|e| AppError::Internal(format!("Failed to list users: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect users: {}", e)))?;

        Ok(users)
    }

    /// Update user password.
    pub fn update_user_password(&self, username: &str, password_hash: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE users SET password_hash = ?1 WHERE username = ?2",
                params![password_hash, username],
            )
            .map_err(|e| AppError::Internal(format!("Failed to update password: {}", e)))?;
        Ok(rows > 0)
    }

    /// Update user last login.
    pub fn update_user_last_login(&self, user_id: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE users SET last_login = ?1 WHERE id = ?2",
            params![now_timestamp(), user_id],
        )
        .map_err(|e| AppError::Internal(format!("Failed to update last login: {}", e)))?;
        Ok(())
    }

    /// Delete user.
    pub fn delete_user(&self, username: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM users WHERE username = ?1", params![username])
            .map_err(|e| AppError::Internal(format!("Failed to delete user: {}", e)))?;
        Ok(rows > 0)
    }

    fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            password_hash: row.get(2)?,
            display_name: row.get(3)?,
            role: row.get(4)?,
            created_at: row.get(5)?,
            last_login: row.get(6)?,
        })
    }

    // ========== SESSION OPERATIONS ==========

    /// Create session.
    pub fn create_session(&self, session: &Session) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
            params![session.token, session.user_id, session.expires_at],
        )
        .map_err(|e| AppError::Internal(format!("Failed to create session: {}", e)))?;
        Ok(())
    }

    /// Get session by token.
    pub fn get_session(&self, token: &str) -> Result<Option<Session>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT token, user_id, expires_at FROM sessions WHERE token = ?1",
            params![token],
            |row| {
                Ok(Session {
                    token: row.get(0)?,
                    user_id: row.get(1)?,
                    expires_at: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get session: {}", e)))
    }

    /// Delete session.
    pub fn delete_session(&self, token: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])
            .map_err(|e| AppError::Internal(format!("Failed to delete session: {}", e)))?;
        Ok(())
    }

    /// Cleanup expired sessions.
    pub fn cleanup_expired_sessions(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM sessions WHERE expires_at < ?1",
                params![now_timestamp()],
            )
            .map_err(|e| AppError::Internal(format!("Failed to cleanup sessions: {}", e)))?;
        Ok(rows)
    }

    // ========== CATEGORY OPERATIONS ==========

    /// Create category.
    pub fn create_category(&self, category: &Category) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO categories (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![category.id, category.name, category.created_at],
        )
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                AppError::Invalid(format!("Category '{}' already exists", category.name))
            } else {
                AppError::Internal(format!("Failed to create category: {}", e))
            }
        })?;
        Ok(())
    }

    /// Get category by ID.
    pub fn get_category(&self, id: &str) -> Result<Option<Category>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, name, created_at FROM categories WHERE id = ?1",
            params![id],
            Self::row_to_category,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get category: {}", e)))
    }

    /// Get category by name.
    pub fn get_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, name, created_at FROM categories WHERE name = ?1",
            params![name],
            Self::row_to_category,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get category: {}", e)))
    }

    /// List all categories.
    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT id, name, created_at FROM categories ORDER BY name")
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let categories = stmt
            .query_map([], Self::row_to_category)
            .map_err(|e| AppError::Internal(format!("Failed to list categories: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect categories: {}", e)))?;

        Ok(categories)
    }

    /// Delete category by name.
    pub fn delete_category(&self, name: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM categories WHERE name = ?1", params![name])
            .map_err(|e| AppError::Internal(format!("Failed to delete category: {}", e)))?;
        Ok(rows > 0)
    }

    fn row_to_category(row: &rusqlite::Row<'_>) -> rusqlite::Result<Category> {
        Ok(Category {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: row.get(2)?,
        })
    }

    // ========== BOOK OPERATIONS ==========

    /// Create a book.
    pub fn create_book(&self, book: &Book) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO books
             (id, title, author, description, category_id, cover_path, file_path,
              publication_year, uploader_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                book.id,
                book.title,
                book.author,
                book.description,
                book.category_id,
                book.cover_path,
                book.file_path,
                book.publication_year,
                book.uploader_id,
                book.created_at,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to create book: {}", e)))?;
        Ok(())
    }

    /// Get book by ID.
    pub fn get_book(&self, id: &str) -> Result<Option<Book>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, title, author, description, category_id, cover_path, file_path,
                    publication_year, uploader_id, created_at
             FROM books WHERE id = ?1",
            params![id],
            Self::row_to_book,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get book: {}", e)))
    }

    /// List books, optionally filtered by category, newest first.
    pub fn list_books(&self, category_id: Option<&str>) -> Result<Vec<Book>> {
        let conn = self.conn.lock();

        let (sql, filter) = match category_id {
            Some(id) => (
                "SELECT id, title, author, description, category_id, cover_path, file_path,
                        publication_year, uploader_id, created_at
                 FROM books WHERE category_id = ?1
                 ORDER BY created_at DESC, id DESC",
                Some(id),
            ),
            None => (
                "SELECT id, title, author, description, category_id, cover_path, file_path,
                        publication_year, uploader_id, created_at
                 FROM books ORDER BY created_at DESC, id DESC",
                None,
            ),
        };

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let rows = match filter {
            Some(id) => stmt.query_map(params![id], Self::row_to_book),
            None => stmt.query_map([], Self::row_to_book),
        };

        let books = rows
            .map_err(|e| AppError::Internal(format!("Failed to list books: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect books: {}", e)))?;

        Ok(books)
    }

    /// Get the most recently added books.
    pub fn list_recent_books(&self, limit: usize) -> Result<Vec<Book>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, title, author, description, category_id, cover_path, file_path,
                        publication_year, uploader_id, created_at
                 FROM books ORDER BY created_at DESC, id DESC LIMIT ?1",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let books = stmt
            .query_map(params![limit as i64], Self::row_to_book)
            .map_err(|e| AppError::Internal(format!("Failed to list recent books: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect books: {}", e)))?;

        Ok(books)
    }

    /// List books in any of the given categories, newest first.
    pub fn list_books_in_categories(
        &self,
        category_ids: &[String],
        limit: usize,
    ) -> Result<Vec<Book>> {
        if category_ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock();
        let placeholders: Vec<String> = category_ids.iter().map(|_| "?".to_string()).collect();
        let sql = format!(
            "SELECT id, title, author, description, category_id, cover_path, file_path,
                    publication_year, uploader_id, created_at
             FROM books WHERE category_id IN ({})
             ORDER BY created_at DESC, id DESC LIMIT {}",
            placeholders.join(","),
            limit
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let books = stmt
            .query_map(rusqlite::params_from_iter(category_ids), Self::row_to_book)
            .map_err(|e| AppError::Internal(format!("Failed to query books: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect books: {}", e)))?;

        Ok(books)
    }

    /// Delete a book by ID.
    pub fn delete_book(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM books WHERE id = ?1", params![id])
            .map_err(|e| AppError::Internal(format!("Failed to delete book: {}", e)))?;
        Ok(rows > 0)
    }

    /// Count all books.
    pub fn book_count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))
            .map_err(|e| AppError::Internal(format!("Failed to count books: {}", e)))?;
        Ok(count as usize)
    }

    fn row_to_book(row: &rusqlite::Row<'_>) -> rusqlite::Result<Book> {
        Ok(Book {
            id: row.get(0)?,
            title: row.get(1)?,
            author: row.get(2)?,
            description: row.get(3)?,
            category_id: row.get(4)?,
            cover_path: row.get(5)?,
            file_path: row.get(6)?,
            publication_year: row.get(7)?,
            uploader_id: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    // ========== PAGE OPERATIONS ==========

    /// Insert a page for a book.
    pub fn create_page(&self, book_id: &str, page_number: i64, content: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO book_pages (book_id, page_number, content) VALUES (?1, ?2, ?3)",
            params![book_id, page_number, content],
        )
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                AppError::Invalid(format!(
                    "Page {} already exists for book {}",
                    page_number, book_id
                ))
            } else {
                AppError::Internal(format!("Failed to create page: {}", e))
            }
        })?;
        Ok(())
    }

    /// Get all pages of a book, ordered by page number.
    pub fn get_pages(&self, book_id: &str) -> Result<Vec<Page>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, book_id, page_number, content
                 FROM book_pages WHERE book_id = ?1
                 ORDER BY page_number ASC",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let pages = stmt
            .query_map(params![book_id], |row| {
                Ok(Page {
                    id: row.get(0)?,
                    book_id: row.get(1)?,
                    page_number: row.get(2)?,
                    content: row.get(3)?,
                })
            })
            .map_err(|e| AppError::Internal(format!("Failed to get pages: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect pages: {}", e)))?;

        Ok(pages)
    }

    /// Number of page rows for a book.
    ///
    /// Page count is the row count, not max(page_number).
    pub fn page_count(&self, book_id: &str) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT COUNT(*) FROM book_pages WHERE book_id = ?1",
            params![book_id],
            |row| row.get(0),
        )
        .map_err(|e| AppError::Internal(format!("Failed to count pages: {}", e)))
    }

    // ========== BOOKMARK OPERATIONS ==========

    /// Get the bookmark for a (user, book) pair.
    ///
    /// More than one row for the natural key is a data-integrity error and is
    /// surfaced, never silently resolved to one of the rows.
    pub fn get_bookmark(&self, user_id: &str, book_id: &str) -> Result<Option<Bookmark>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, book_id, page_number, created_at, updated_at
                 FROM bookmarks WHERE user_id = ?1 AND book_id = ?2",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let mut bookmarks = stmt
            .query_map(params![user_id, book_id], Self::row_to_bookmark)
            .map_err(|e| AppError::Internal(format!("Failed to get bookmark: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect bookmarks: {}", e)))?;

        if bookmarks.len() > 1 {
            return Err(AppError::Integrity(format!(
                "{} bookmark rows for user {} book {}, expected at most one",
                bookmarks.len(),
                user_id,
                book_id
            )));
        }

        Ok(bookmarks.pop())
    }

    /// Create or update the bookmark for a (user, book) pair.
    ///
    /// Upsert by natural key: a second call overwrites the page number in
    /// place and never creates a second row.
    pub fn upsert_bookmark(&self, user_id: &str, book_id: &str, page_number: i64) -> Result<()> {
        let now = now_timestamp();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO bookmarks (id, user_id, book_id, page_number, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (user_id, book_id) DO UPDATE SET
                page_number = excluded.page_number,
                updated_at = excluded.updated_at",
            params![
                uuid::Uuid::new_v4().to_string(),
                user_id,
                book_id,
                page_number,
                now,
                now,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to save bookmark: {}", e)))?;
        Ok(())
    }

    /// Delete bookmark by ID. Returns whether a row existed.
    pub fn delete_bookmark(&self, id: &str, user_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM bookmarks WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to delete bookmark: {}", e)))?;
        Ok(rows > 0)
    }

    /// Get all bookmarks of a user, each with its book.
    pub fn list_user_bookmarks(&self, user_id: &str) -> Result<Vec<(Bookmark, Book)>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT bm.id, bm.user_id, bm.book_id, bm.page_number, bm.created_at, bm.updated_at,
                        b.id, b.title, b.author, b.description, b.category_id, b.cover_path,
                        b.file_path, b.publication_year, b.uploader_id, b.created_at
                 FROM bookmarks bm
                 JOIN books b ON b.id = bm.book_id
                 WHERE bm.user_id = ?1
                 ORDER BY bm.updated_at DESC",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![user_id], |row| {
                let bookmark = Bookmark {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    book_id: row.get(2)?,
                    page_number: row.get(3)?,
                    created_at: row.get(4)?,
                    updated_at: row.get(5)?,
                };
                let book = Book {
                    id: row.get(6)?,
                    title: row.get(7)?,
                    author: row.get(8)?,
                    description: row.get(9)?,
                    category_id: row.get(10)?,
                    cover_path: row.get(11)?,
                    file_path: row.get(12)?,
                    publication_year: row.get(13)?,
                    uploader_id: row.get(14)?,
                    created_at: row.get(15)?,
                };
                Ok((bookmark, book))
            })
            .map_err(|e| AppError::Internal(format!("Failed to list bookmarks: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect bookmarks: {}", e)))?;

        Ok(rows)
    }

    fn row_to_bookmark(row: &rusqlite::Row<'_>) -> rusqlite::Result<Bookmark> {
        Ok(Bookmark {
            id: row.get(0)?,
            user_id: row.get(1)?,
            book_id: row.get(2)?,
            page_number: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    // ========== READING HISTORY OPERATIONS ==========

    /// Get the reading-history row for a (user, book) pair.
    pub fn get_history(&self, user_id: &str, book_id: &str) -> Result<Option<HistoryEntry>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, user_id, book_id, completed_at, rating, review, created_at, updated_at
             FROM reading_history WHERE user_id = ?1 AND book_id = ?2",
            params![user_id, book_id],
            Self::row_to_history,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get history: {}", e)))
    }

    /// Record completion for a (user, book) pair.
    ///
    /// An existing history row gets its completion timestamp refreshed; a
    /// second completion never creates a duplicate.
    pub fn mark_completed(&self, user_id: &str, book_id: &str) -> Result<()> {
        let now = now_timestamp();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO reading_history
             (id, user_id, book_id, completed_at, rating, review, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, NULL, NULL, ?5, ?6)
             ON CONFLICT (user_id, book_id) DO UPDATE SET
                completed_at = excluded.completed_at,
                updated_at = excluded.updated_at",
            params![
                uuid::Uuid::new_v4().to_string(),
                user_id,
                book_id,
                now,
                now,
                now,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to mark completed: {}", e)))?;
        Ok(())
    }

    /// Set or clear the rating on the history row for a (user, book) pair.
    ///
    /// Clearing a rating keeps the row.
    pub fn set_rating(&self, user_id: &str, book_id: &str, rating: Option<i64>) -> Result<()> {
        let now = now_timestamp();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO reading_history
             (id, user_id, book_id, completed_at, rating, review, created_at, updated_at)
             VALUES (?1, ?2, ?3, NULL, ?4, NULL, ?5, ?6)
             ON CONFLICT (user_id, book_id) DO UPDATE SET
                rating = excluded.rating,
                updated_at = excluded.updated_at",
            params![
                uuid::Uuid::new_v4().to_string(),
                user_id,
                book_id,
                rating,
                now,
                now,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to set rating: {}", e)))?;
        Ok(())
    }

    /// Set the review text on the history row for a (user, book) pair.
    pub fn set_review(&self, user_id: &str, book_id: &str, review: &str) -> Result<()> {
        let now = now_timestamp();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO reading_history
             (id, user_id, book_id, completed_at, rating, review, created_at, updated_at)
             VALUES (?1, ?2, ?3, NULL, NULL, ?4, ?5, ?6)
             ON CONFLICT (user_id, book_id) DO UPDATE SET
                review = excluded.review,
                updated_at = excluded.updated_at",
            params![
                uuid::Uuid::new_v4().to_string(),
                user_id,
                book_id,
                review,
                now,
                now,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to set review: {}", e)))?;
        Ok(())
    }

    /// Get all reading-history rows of a user, each with its book.
    pub fn list_user_history(&self, user_id: &str) -> Result<Vec<(HistoryEntry, Book)>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT h.id, h.user_id, h.book_id, h.completed_at, h.rating, h.review,
                        h.created_at, h.updated_at,
                        b.id, b.title, b.author, b.description, b.category_id, b.cover_path,
                        b.file_path, b.publication_year, b.uploader_id, b.created_at
                 FROM reading_history h
                 JOIN books b ON b.id = h.book_id
                 WHERE h.user_id = ?1
                 ORDER BY h.updated_at DESC",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![user_id], |row| {
                let entry = HistoryEntry {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    book_id: row.get(2)?,
                    completed_at: row.get(3)?,
                    rating: row.get(4)?,
                    review: row.get(5)?,
                    created_at: row.get(6)?,
                    updated_at: row.get(7)?,
                };
                let book = Book {
                    id: row.get(8)?,
                    title: row.get(9)?,
                    author: row.get(10)?,
                    description: row.get(11)?,
                    category_id: row.get(12)?,
                    cover_path: row.get(13)?,
                    file_path: row.get(14)?,
                    publication_year: row.get(15)?,
                    uploader_id: row.get(16)?,
                    created_at: row.get(17)?,
                };
                Ok((entry, book))
            })
            .map_err(|e| AppError::Internal(format!("Failed to list history: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect history: {}", e)))?;

        Ok(rows)
    }

    fn row_to_history(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryEntry> {
        Ok(HistoryEntry {
            id: row.get(0)?,
            user_id: row.get(1)?,
            book_id: row.get(2)?,
            completed_at: row.get(3)?,
            rating: row.get(4)?,
            review: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    // ========== FAVORITE OPERATIONS ==========

    /// Add a book to a user's favorites.
    ///
    /// Adding an existing favorite is success and leaves a single row.
    pub fn add_favorite(&self, user_id: &str, book_id: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO favorites (id, user_id, book_id, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (user_id, book_id) DO NOTHING",
            params![
                uuid::Uuid::new_v4().to_string(),
                user_id,
                book_id,
                now_timestamp(),
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to add favorite: {}", e)))?;
        Ok(())
    }

    /// Remove a book from a user's favorites. Returns whether a row existed.
    pub fn remove_favorite(&self, user_id: &str, book_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM favorites WHERE user_id = ?1 AND book_id = ?2",
                params![user_id, book_id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to remove favorite: {}", e)))?;
        Ok(rows > 0)
    }

    /// Whether a (user, book) pair is favorited.
    pub fn is_favorite(&self, user_id: &str, book_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM favorites WHERE user_id = ?1 AND book_id = ?2",
                params![user_id, book_id],
                |row| row.get(0),
            )
            .map_err(|e| AppError::Internal(format!("Failed to check favorite: {}", e)))?;
        Ok(count > 0)
    }

    /// Get all favorites of a user, each with its book.
    pub fn list_user_favorites(&self, user_id: &str) -> Result<Vec<(FavoriteEntry, Book)>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT f.id, f.user_id, f.book_id, f.created_at,
                        b.id, b.title, b.author, b.description, b.category_id, b.cover_path,
                        b.file_path, b.publication_year, b.uploader_id, b.created_at
                 FROM favorites f
                 JOIN books b ON b.id = f.book_id
                 WHERE f.user_id = ?1
                 ORDER BY f.created_at DESC",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![user_id], |row| {
                let favorite = FavoriteEntry {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    book_id: row.get(2)?,
                    created_at: row.get(3)?,
                };
                let book = Book {
                    id: row.get(4)?,
                    title: row.get(5)?,
                    author: row.get(6)?,
                    description: row.get(7)?,
                    category_id: row.get(8)?,
                    cover_path: row.get(9)?,
                    file_path: row.get(10)?,
                    publication_year: row.get(11)?,
                    uploader_id: row.get(12)?,
                    created_at: row.get(13)?,
                };
                Ok((favorite, book))
            })
            .map_err(|e| AppError::Internal(format!("Failed to list favorites: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect favorites: {}", e)))?;

        Ok(rows)
    }
}
