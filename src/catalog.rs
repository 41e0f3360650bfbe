//! Catalog queries.
//!
//! Listing merges the local catalog with the optional public search source;
//! free-text search is a case-insensitive substring filter over title or
//! author, applied after retrieval across the union of both sources.

use crate::db::{Book, Category, Database, Page};
use crate::error::{AppError, Result};
use crate::search::{PublicBook, SearchClient};
use crate::storage;
use serde::Serialize;

/// Category filter for a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryFilter {
    /// Every book.
    All,
    /// Only books in the given category.
    Category(String),
}

impl CategoryFilter {
    /// Parse from a query value; absent or "all" means every book.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None => CategoryFilter::All,
            Some(v) if v.eq_ignore_ascii_case("all") || v.is_empty() => CategoryFilter::All,
            Some(v) => CategoryFilter::Category(v.to_string()),
        }
    }
}

/// One entry of a catalog listing.
///
/// Local books carry source "library"; results from the public search source
/// carry source "public" and are never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    /// Book ID (synthetic for public entries).
    pub id: String,
    /// Book title.
    pub title: String,
    /// Author name.
    pub author: String,
    /// Book description.
    pub description: Option<String>,
    /// Category ID (local books only).
    pub category_id: Option<String>,
    /// Cover image URL.
    pub cover_url: Option<String>,
    /// Book file URL.
    pub file_url: Option<String>,
    /// Publication year.
    pub publication_year: Option<i64>,
    /// Creation timestamp (local books only).
    pub created_at: Option<i64>,
    /// Entry source: "library" or "public".
    pub source: &'static str,
}

impl CatalogEntry {
    /// Catalog entry for a local library book.
    pub fn from_book(book: Book) -> Self {
        Self {
            id: book.id,
            title: book.title,
            author: book.author,
            description: book.description,
            category_id: book.category_id,
            cover_url: book.cover_path.as_deref().map(storage::public_url),
            file_url: book.file_path.as_deref().map(storage::public_url),
            publication_year: book.publication_year,
            created_at: Some(book.created_at),
            source: "library",
        }
    }

    fn from_public(book: PublicBook) -> Self {
        Self {
            id: book.id,
            title: book.title,
            author: book.author,
            description: None,
            category_id: None,
            cover_url: None,
            file_url: None,
            publication_year: book.publication_year,
            created_at: None,
            source: "public",
        }
    }
}

/// Case-insensitive substring match over title or author.
pub fn matches_search(title: &str, author: &str, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    title.to_lowercase().contains(&needle) || author.to_lowercase().contains(&needle)
}

/// Catalog query service.
#[derive(Clone)]
pub struct CatalogService {
    db: Database,
    search: SearchClient,
}

impl CatalogService {
    /// Create a catalog service over the store and the public search source.
    pub fn new(db: Database, search: SearchClient) -> Self {
        Self { db, search }
    }

    /// List books, newest first, optionally narrowed by category and search
    /// text.
    ///
    /// Zero results is success with an empty vector; a store failure is the
    /// error it produced. The public source contributes only to text
    /// searches and its failures contribute nothing.
    pub async fn list_books(
        &self,
        filter: &CategoryFilter,
        search_text: &str,
    ) -> Result<Vec<CatalogEntry>> {
        let category_id = match filter {
            CategoryFilter::All => None,
            CategoryFilter::Category(id) => Some(id.as_str()),
        };

        let local = self.db.list_books(category_id)?;
        let mut entries: Vec<CatalogEntry> =
            local.into_iter().map(CatalogEntry::from_book).collect();

        let search_text = search_text.trim();
        if !search_text.is_empty() {
            // Public results are appended after local ones
            let public = self.search.search(search_text).await;
            entries.extend(public.into_iter().map(CatalogEntry::from_public));

            entries.retain(|e| matches_search(&e.title, &e.author, search_text));
        }

        Ok(entries)
    }

    /// Get a book by ID.
    pub fn get_book(&self, id: &str) -> Result<Book> {
        self.db
            .get_book(id)?
            .ok_or_else(|| AppError::NotFound(format!("Book not found: {}", id)))
    }

    /// List all categories.
    pub fn list_categories(&self) -> Result<Vec<Category>> {
        self.db.list_categories()
    }

    /// Display name of a book's category, "Uncategorized" when the book has
    /// no category or the reference does not resolve.
    pub fn category_name(&self, book: &Book) -> Result<String> {
        let Some(category_id) = &book.category_id else {
            return Ok("Uncategorized".to_string());
        };

        Ok(self
            .db
            .get_category(category_id)?
            .map(|c| c.name)
            .unwrap_or_else(|| "Uncategorized".to_string()))
    }

    /// Pages of a book, ordered by page number.
    pub fn list_pages(&self, book_id: &str) -> Result<Vec<Page>> {
        self.db.get_pages(book_id)
    }
}
