//! Reading progress, bookmarks, history and recommendations.
//!
//! Per (user, book) pair two independent state tracks exist: the bookmark
//! (reading position, at most one row, updated in place) and the history row
//! (completion, rating, review, at most one row). A book can be completed
//! without ever being bookmarked and vice versa.

use crate::db::{Book, Bookmark, Database, HistoryEntry};
use crate::error::{AppError, Result};
use std::collections::HashMap;

/// Number of genres considered for personalized recommendations.
const TOP_GENRES: usize = 3;

/// Maximum number of recommended books.
const RECOMMENDATION_LIMIT: usize = 8;

/// Weight of a completed/history book in genre ranking.
const HISTORY_WEIGHT: u32 = 2;

/// Weight of a favorited book in genre ranking.
const FAVORITE_WEIGHT: u32 = 1;

/// Reading progress as a whole percentage.
///
/// Meaningful only for paginated books: a non-positive page total yields 0.
/// Otherwise `round(current / total * 100)`, clamped to 0-100.
pub fn compute_progress_percent(current_page: i64, total_pages: i64) -> u8 {
    if total_pages <= 0 {
        return 0;
    }

    let percent = (current_page as f64 / total_pages as f64 * 100.0).round();
    percent.clamp(0.0, 100.0) as u8
}

/// Rank genres by reading history and favorites.
///
/// History entries weigh more than favorites so recommendations lean toward
/// finished books rather than merely liked ones. Ties keep first-seen input
/// order. Returns at most the top three genre IDs; empty inputs rank
/// nothing.
pub fn rank_recommended_genres<'a, H, F>(history_genres: H, favorite_genres: F) -> Vec<String>
where
    H: IntoIterator<Item = Option<&'a str>>,
    F: IntoIterator<Item = Option<&'a str>>,
{
    let mut order: Vec<String> = Vec::new();
    let mut weights: HashMap<String, u32> = HashMap::new();

    for genre in history_genres.into_iter().flatten() {
        if !weights.contains_key(genre) {
            order.push(genre.to_string());
        }
        *weights.entry(genre.to_string()).or_insert(0) += HISTORY_WEIGHT;
    }

    for genre in favorite_genres.into_iter().flatten() {
        if !weights.contains_key(genre) {
            order.push(genre.to_string());
        }
        *weights.entry(genre.to_string()).or_insert(0) += FAVORITE_WEIGHT;
    }

    // Stable sort keeps first-seen order between equal weights
    order.sort_by(|a, b| weights[b].cmp(&weights[a]));
    order.truncate(TOP_GENRES);
    order
}

/// Progress engine over the store.
#[derive(Clone)]
pub struct ProgressService {
    db: Database,
}

impl ProgressService {
    /// Create a progress service.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Resolve the bookmark for a (user, book) pair.
    ///
    /// Duplicate natural-key rows surface as an integrity error.
    pub fn resolve_bookmark(&self, user_id: &str, book_id: &str) -> Result<Option<Bookmark>> {
        self.db.get_bookmark(user_id, book_id)
    }

    /// The page to resume reading at: the bookmarked page, or 1.
    pub fn resume_page(&self, user_id: &str, book_id: &str) -> Result<i64> {
        Ok(self
            .resolve_bookmark(user_id, book_id)?
            .map(|b| b.page_number)
            .unwrap_or(1))
    }

    /// Set the bookmark for a (user, book) pair to the given page.
    ///
    /// Upsert by natural key: calling twice leaves exactly one row holding
    /// the latest page. The page must lie within the book's page range when
    /// the book has paginated content; external-file-only books accept any
    /// page from 1 up.
    pub fn set_bookmark(&self, user_id: &str, book_id: &str, page: i64) -> Result<Bookmark> {
        if self.db.get_book(book_id)?.is_none() {
            return Err(AppError::NotFound(format!("Book not found: {}", book_id)));
        }

        if page < 1 {
            return Err(AppError::Invalid(format!("Invalid page number: {}", page)));
        }

        let page_count = self.db.page_count(book_id)?;
        if page_count > 0 && page > page_count {
            return Err(AppError::Invalid(format!(
                "Page {} is past the last page ({})",
                page, page_count
            )));
        }

        self.db.upsert_bookmark(user_id, book_id, page)?;

        // Refetch so callers read back exactly what the store now holds
        self.db
            .get_bookmark(user_id, book_id)?
            .ok_or_else(|| AppError::Internal("Bookmark missing after write".to_string()))
    }

    /// Delete a bookmark by ID.
    ///
    /// Deleting an already-deleted ID is success; no existence check is made
    /// before issuing the delete.
    pub fn delete_bookmark(&self, bookmark_id: &str, user_id: &str) -> Result<()> {
        self.db.delete_bookmark(bookmark_id, user_id)?;
        Ok(())
    }

    /// Reading-history row for a (user, book) pair.
    pub fn history(&self, user_id: &str, book_id: &str) -> Result<Option<HistoryEntry>> {
        self.db.get_history(user_id, book_id)
    }

    /// Record completion of a book.
    ///
    /// An existing history row gets its completion timestamp updated in
    /// place; duplicates are never created.
    pub fn mark_completed(&self, user_id: &str, book_id: &str) -> Result<HistoryEntry> {
        if self.db.get_book(book_id)?.is_none() {
            return Err(AppError::NotFound(format!("Book not found: {}", book_id)));
        }

        self.db.mark_completed(user_id, book_id)?;
        self.db
            .get_history(user_id, book_id)?
            .ok_or_else(|| AppError::Internal("History missing after write".to_string()))
    }

    /// Set or clear the rating for a book.
    ///
    /// `None` clears the rating but keeps the history row.
    pub fn set_rating(
        &self,
        user_id: &str,
        book_id: &str,
        rating: Option<i64>,
    ) -> Result<HistoryEntry> {
        if let Some(r) = rating
            && !(1..=5).contains(&r)
        {
            return Err(AppError::Invalid(format!(
                "Rating must be between 1 and 5, got {}",
                r
            )));
        }

        if self.db.get_book(book_id)?.is_none() {
            return Err(AppError::NotFound(format!("Book not found: {}", book_id)));
        }

        self.db.set_rating(user_id, book_id, rating)?;
        self.db
            .get_history(user_id, book_id)?
            .ok_or_else(|| AppError::Internal("History missing after write".to_string()))
    }

    /// Set the review text for a book.
    pub fn set_review(&self, user_id: &str, book_id: &str, review: &str) -> Result<HistoryEntry> {
        if self.db.get_book(book_id)?.is_none() {
            return Err(AppError::NotFound(format!("Book not found: {}", book_id)));
        }

        self.db.set_review(user_id, book_id, review)?;
        self.db
            .get_history(user_id, book_id)?
            .ok_or_else(|| AppError::Internal("History missing after write".to_string()))
    }

    /// Add a book to the user's favorites. Adding twice keeps one row.
    pub fn add_favorite(&self, user_id: &str, book_id: &str) -> Result<()> {
        if self.db.get_book(book_id)?.is_none() {
            return Err(AppError::NotFound(format!("Book not found: {}", book_id)));
        }

        self.db.add_favorite(user_id, book_id)
    }

    /// Remove a book from the user's favorites. Removing an absent favorite
    /// is success.
    pub fn remove_favorite(&self, user_id: &str, book_id: &str) -> Result<()> {
        self.db.remove_favorite(user_id, book_id)?;
        Ok(())
    }

    /// Recommend books for a user.
    ///
    /// Books from the user's top-ranked genres, newest first, excluding
    /// books already in their history. Without any history or favorites the
    /// listing falls back to the most recent books.
    pub fn recommend_books(&self, user_id: &str) -> Result<Vec<Book>> {
        let history = self.db.list_user_history(user_id)?;
        let favorites = self.db.list_user_favorites(user_id)?;

        let genres = rank_recommended_genres(
            history.iter().map(|(_, book)| book.category_id.as_deref()),
            favorites.iter().map(|(_, book)| book.category_id.as_deref()),
        );

        if genres.is_empty() {
            return self.db.list_recent_books(RECOMMENDATION_LIMIT);
        }

        let read_ids: std::collections::HashSet<&str> = history
            .iter()
            .map(|(entry, _)| entry.book_id.as_str())
            .collect();

        let candidates = self
            .db
            .list_books_in_categories(&genres, RECOMMENDATION_LIMIT)?;

        Ok(candidates
            .into_iter()
            .filter(|b| !read_ids.contains(b.id.as_str()))
            .collect())
    }
}
