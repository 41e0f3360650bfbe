use crate::auth::AuthService;
use crate::catalog::{CatalogService, CategoryFilter};
use crate::config::{Config, SearchConfig};
use crate::db::{Book, Category, Database, User, now_timestamp};
use crate::error::AppError;
use crate::progress::ProgressService;
use crate::search::SearchClient;

fn test_db() -> Database {
    Database::open_memory().unwrap()
}

fn offline_catalog(db: &Database) -> CatalogService {
    let search = SearchClient::new(&SearchConfig {
        enabled: false,
        endpoint: "http://127.0.0.1:1/search.json".to_string(),
        limit: 5,
    });
    CatalogService::new(db.clone(), search)
}

fn create_user(db: &Database, id: &str, username: &str) {
    let user = User {
        id: id.to_string(),
        username: username.to_string(),
        password_hash: "hash".to_string(),
        display_name: None,
        role: "user".to_string(),
        created_at: now_timestamp(),
        last_login: None,
    };
    db.create_user(&user).unwrap();
}

fn create_category(db: &Database, id: &str, name: &str) {
    let category = Category {
        id: id.to_string(),
        name: name.to_string(),
        created_at: now_timestamp(),
    };
    db.create_category(&category).unwrap();
}

fn create_book(db: &Database, id: &str, title: &str, category_id: Option<&str>, created_at: i64) {
    let book = Book {
        id: id.to_string(),
        title: title.to_string(),
        author: "Author".to_string(),
        description: None,
        category_id: category_id.map(|c| c.to_string()),
        cover_path: None,
        file_path: None,
        publication_year: None,
        uploader_id: None,
        created_at,
    };
    db.create_book(&book).unwrap();
}

fn create_pages(db: &Database, book_id: &str, count: i64) {
    for n in 1..=count {
        db.create_page(book_id, n, &format!("Page {} content", n))
            .unwrap();
    }
}

fn setup_user_and_book(db: &Database) {
    create_user(db, "user-1", "testuser");
    create_book(db, "book-1", "Test Book", None, now_timestamp());
}

// ========== USERS AND SESSIONS ==========

#[test]
fn db_create_and_get_user() {
    let db = test_db();
    let user = User {
        id: "user-1".to_string(),
        username: "alice".to_string(),
        password_hash: "hash".to_string(),
        display_name: Some("Alice".to_string()),
        role: "user".to_string(),
        created_at: now_timestamp(),
        last_login: None,
    };

    db.create_user(&user).unwrap();

    let found = db.get_user_by_username("alice").unwrap().unwrap();
    assert_eq!(found.id, "user-1");
    assert_eq!(found.username, "alice");

    let found_by_id = db.get_user_by_id("user-1").unwrap().unwrap();
    assert_eq!(found_by_id.username, "alice");
}

#[test]
fn db_duplicate_username_fails() {
    let db = test_db();
    create_user(&db, "user-1", "alice");

    let dup = User {
        id: "user-2".to_string(),
        username: "alice".to_string(),
        password_hash: "hash2".to_string(),
        display_name: None,
        role: "user".to_string(),
        created_at: now_timestamp(),
        last_login: None,
    };
    assert!(db.create_user(&dup).is_err());
}

#[test]
fn db_delete_user() {
    let db = test_db();
    create_user(&db, "user-1", "bob");

    assert!(db.delete_user("bob").unwrap());
    assert!(db.get_user_by_username("bob").unwrap().is_none());
}

#[test]
fn db_create_and_get_session() {
    let db = test_db();
    create_user(&db, "user-1", "testuser");

    let session = crate::db::Session {
        token: "token123".to_string(),
        user_id: "user-1".to_string(),
        expires_at: now_timestamp() + 3600,
    };

    db.create_session(&session).unwrap();

    let found = db.get_session("token123").unwrap().unwrap();
    assert_eq!(found.user_id, "user-1");
}

#[test]
fn db_expired_sessions_cleanup() {
    let db = test_db();
    create_user(&db, "user-1", "testuser");

    let expired = crate::db::Session {
        token: "expired".to_string(),
        user_id: "user-1".to_string(),
        expires_at: now_timestamp() - 3600,
    };
    let valid = crate::db::Session {
        token: "valid".to_string(),
        user_id: "user-1".to_string(),
        expires_at: now_timestamp() + 3600,
    };

    db.create_session(&expired).unwrap();
    db.create_session(&valid).unwrap();

    db.cleanup_expired_sessions().unwrap();

    assert!(db.get_session("expired").unwrap().is_none());
    assert!(db.get_session("valid").unwrap().is_some());
}

// ========== CATEGORIES ==========

#[test]
fn db_create_and_list_categories() {
    let db = test_db();
    create_category(&db, "cat-1", "Fiction");
    create_category(&db, "cat-2", "History");

    let categories = db.list_categories().unwrap();
    assert_eq!(categories.len(), 2);
    // Ordered by name
    assert_eq!(categories[0].name, "Fiction");
    assert_eq!(categories[1].name, "History");
}

#[test]
fn db_duplicate_category_name_fails() {
    let db = test_db();
    create_category(&db, "cat-1", "Fiction");

    let dup = Category {
        id: "cat-2".to_string(),
        name: "Fiction".to_string(),
        created_at: now_timestamp(),
    };
    assert!(db.create_category(&dup).is_err());
}

#[test]
fn db_delete_category() {
    let db = test_db();
    create_category(&db, "cat-1", "Mystery");

    assert!(db.delete_category("Mystery").unwrap());
    assert!(db.get_category_by_name("Mystery").unwrap().is_none());
}

// ========== BOOKS AND PAGES ==========

#[test]
fn db_create_and_get_book() {
    let db = test_db();
    create_category(&db, "cat-1", "Fiction");
    create_book(&db, "book-1", "Test Book", Some("cat-1"), now_timestamp());

    let found = db.get_book("book-1").unwrap().unwrap();
    assert_eq!(found.title, "Test Book");
    assert_eq!(found.category_id.as_deref(), Some("cat-1"));
}

#[test]
fn db_list_books_newest_first() {
    let db = test_db();
    let base = now_timestamp();
    create_book(&db, "book-old", "Old", None, base - 100);
    create_book(&db, "book-mid", "Mid", None, base - 50);
    create_book(&db, "book-new", "New", None, base);

    let books = db.list_books(None).unwrap();
    let ids: Vec<&str> = books.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec!["book-new", "book-mid", "book-old"]);
}

#[test]
fn db_list_books_filters_by_category() {
    let db = test_db();
    create_category(&db, "cat-1", "Fiction");
    create_category(&db, "cat-2", "History");
    create_book(&db, "book-1", "A", Some("cat-1"), now_timestamp());
    create_book(&db, "book-2", "B", Some("cat-2"), now_timestamp());
    create_book(&db, "book-3", "C", Some("cat-1"), now_timestamp());

    let books = db.list_books(Some("cat-1")).unwrap();
    assert_eq!(books.len(), 2);
    assert!(books.iter().all(|b| b.category_id.as_deref() == Some("cat-1")));
}

#[test]
fn db_list_recent_books_limits() {
    let db = test_db();
    let base = now_timestamp();
    for i in 0..10 {
        create_book(&db, &format!("book-{}", i), &format!("Book {}", i), None, base + i);
    }

    let recent = db.list_recent_books(8).unwrap();
    assert_eq!(recent.len(), 8);
    assert_eq!(recent[0].id, "book-9");
}

#[test]
fn db_delete_book() {
    let db = test_db();
    create_book(&db, "book-del", "To Delete", None, now_timestamp());

    assert!(db.delete_book("book-del").unwrap());
    assert!(db.get_book("book-del").unwrap().is_none());
}

#[test]
fn db_pages_ordered_and_counted_by_rows() {
    let db = test_db();
    create_book(&db, "book-1", "Paged", None, now_timestamp());

    // Insert out of order with a gap: count is rows, not max(page_number)
    db.create_page("book-1", 3, "third").unwrap();
    db.create_page("book-1", 1, "first").unwrap();

    let pages = db.get_pages("book-1").unwrap();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].page_number, 1);
    assert_eq!(pages[1].page_number, 3);

    assert_eq!(db.page_count("book-1").unwrap(), 2);
}

#[test]
fn db_duplicate_page_number_fails() {
    let db = test_db();
    create_book(&db, "book-1", "Paged", None, now_timestamp());

    db.create_page("book-1", 1, "first").unwrap();
    assert!(db.create_page("book-1", 1, "again").is_err());
}

// ========== BOOKMARKS ==========

#[test]
fn bookmark_upsert_keeps_single_row_with_latest_page() {
    let db = test_db();
    setup_user_and_book(&db);
    create_pages(&db, "book-1", 100);
    let progress = ProgressService::new(db.clone());

    let first = progress.set_bookmark("user-1", "book-1", 10).unwrap();
    let second = progress.set_bookmark("user-1", "book-1", 42).unwrap();

    // Same row, updated in place
    assert_eq!(first.id, second.id);
    assert_eq!(second.page_number, 42);

    let bookmarks = db.list_user_bookmarks("user-1").unwrap();
    assert_eq!(bookmarks.len(), 1);
    assert_eq!(bookmarks[0].0.page_number, 42);
}

#[test]
fn bookmark_page_must_be_in_range_for_paginated_books() {
    let db = test_db();
    setup_user_and_book(&db);
    create_pages(&db, "book-1", 5);
    let progress = ProgressService::new(db.clone());

    assert!(matches!(
        progress.set_bookmark("user-1", "book-1", 0),
        Err(AppError::Invalid(_))
    ));
    assert!(matches!(
        progress.set_bookmark("user-1", "book-1", 6),
        Err(AppError::Invalid(_))
    ));
    assert!(progress.set_bookmark("user-1", "book-1", 5).is_ok());
}

#[test]
fn bookmark_page_unconstrained_without_pages() {
    let db = test_db();
    create_user(&db, "user-1", "testuser");

    // External-file book with no paginated content
    let book = Book {
        id: "book-ext".to_string(),
        title: "External".to_string(),
        author: "Author".to_string(),
        description: None,
        category_id: None,
        cover_path: None,
        file_path: Some("books/book-ext.pdf".to_string()),
        publication_year: None,
        uploader_id: None,
        created_at: now_timestamp(),
    };
    db.create_book(&book).unwrap();

    let progress = ProgressService::new(db.clone());
    assert!(progress.set_bookmark("user-1", "book-ext", 7777).is_ok());
}

#[test]
fn bookmark_on_unknown_book_is_not_found() {
    let db = test_db();
    create_user(&db, "user-1", "testuser");
    let progress = ProgressService::new(db.clone());

    assert!(matches!(
        progress.set_bookmark("user-1", "nope", 1),
        Err(AppError::NotFound(_))
    ));
}

#[test]
fn bookmark_delete_is_idempotent() {
    let db = test_db();
    setup_user_and_book(&db);
    let progress = ProgressService::new(db.clone());

    let bookmark = progress.set_bookmark("user-1", "book-1", 3).unwrap();

    progress.delete_bookmark(&bookmark.id, "user-1").unwrap();
    // Second delete of the same id is still success
    progress.delete_bookmark(&bookmark.id, "user-1").unwrap();
    // As is deleting an id that never existed
    progress.delete_bookmark("never-existed", "user-1").unwrap();

    assert!(progress.resolve_bookmark("user-1", "book-1").unwrap().is_none());
}

#[test]
fn resume_page_defaults_to_first_page() {
    let db = test_db();
    setup_user_and_book(&db);
    let progress = ProgressService::new(db.clone());

    assert_eq!(progress.resume_page("user-1", "book-1").unwrap(), 1);

    progress.set_bookmark("user-1", "book-1", 12).unwrap();
    assert_eq!(progress.resume_page("user-1", "book-1").unwrap(), 12);
}

#[test]
fn duplicate_bookmark_rows_surface_as_integrity_error() {
    let db = test_db();
    setup_user_and_book(&db);

    // Simulate a legacy table without the natural-key constraint
    db.execute_batch_raw(
        r#"
        DROP TABLE bookmarks;
        CREATE TABLE bookmarks (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            book_id TEXT NOT NULL,
            page_number INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        INSERT INTO bookmarks VALUES ('bm-1', 'user-1', 'book-1', 5, 0, 0);
        INSERT INTO bookmarks VALUES ('bm-2', 'user-1', 'book-1', 9, 0, 0);
        "#,
    )
    .unwrap();

    let progress = ProgressService::new(db.clone());
    assert!(matches!(
        progress.resolve_bookmark("user-1", "book-1"),
        Err(AppError::Integrity(_))
    ));
}

// ========== READING HISTORY ==========

#[test]
fn mark_completed_twice_updates_single_row() {
    let db = test_db();
    setup_user_and_book(&db);
    let progress = ProgressService::new(db.clone());

    let first = progress.mark_completed("user-1", "book-1").unwrap();
    assert!(first.completed_at.is_some());

    let second = progress.mark_completed("user-1", "book-1").unwrap();
    assert_eq!(first.id, second.id);

    let history = db.list_user_history("user-1").unwrap();
    assert_eq!(history.len(), 1);
}

#[test]
fn rating_upserts_and_clears_without_deleting_row() {
    let db = test_db();
    setup_user_and_book(&db);
    let progress = ProgressService::new(db.clone());

    let rated = progress.set_rating("user-1", "book-1", Some(4)).unwrap();
    assert_eq!(rated.rating, Some(4));

    let cleared = progress.set_rating("user-1", "book-1", None).unwrap();
    assert_eq!(cleared.rating, None);
    assert_eq!(cleared.id, rated.id);

    // The row survives a cleared rating
    assert!(progress.history("user-1", "book-1").unwrap().is_some());
}

#[test]
fn rating_out_of_range_is_rejected() {
    let db = test_db();
    setup_user_and_book(&db);
    let progress = ProgressService::new(db.clone());

    assert!(matches!(
        progress.set_rating("user-1", "book-1", Some(0)),
        Err(AppError::Invalid(_))
    ));
    assert!(matches!(
        progress.set_rating("user-1", "book-1", Some(6)),
        Err(AppError::Invalid(_))
    ));
}

#[test]
fn rating_before_completion_keeps_completion_unset() {
    let db = test_db();
    setup_user_and_book(&db);
    let progress = ProgressService::new(db.clone());

    let entry = progress.set_rating("user-1", "book-1", Some(5)).unwrap();
    assert!(entry.completed_at.is_none());

    let completed = progress.mark_completed("user-1", "book-1").unwrap();
    assert!(completed.completed_at.is_some());
    assert_eq!(completed.rating, Some(5));
}

#[test]
fn review_lives_on_the_history_row() {
    let db = test_db();
    setup_user_and_book(&db);
    let progress = ProgressService::new(db.clone());

    progress.mark_completed("user-1", "book-1").unwrap();
    let entry = progress
        .set_review("user-1", "book-1", "Loved the ending.")
        .unwrap();

    assert_eq!(entry.review.as_deref(), Some("Loved the ending."));
    assert!(entry.completed_at.is_some());

    let history = db.list_user_history("user-1").unwrap();
    assert_eq!(history.len(), 1);
}

// ========== FAVORITES ==========

#[test]
fn favorite_add_twice_keeps_single_row() {
    let db = test_db();
    setup_user_and_book(&db);
    let progress = ProgressService::new(db.clone());

    progress.add_favorite("user-1", "book-1").unwrap();
    progress.add_favorite("user-1", "book-1").unwrap();

    let favorites = db.list_user_favorites("user-1").unwrap();
    assert_eq!(favorites.len(), 1);
    assert!(db.is_favorite("user-1", "book-1").unwrap());
}

#[test]
fn favorite_remove_absent_is_success() {
    let db = test_db();
    setup_user_and_book(&db);
    let progress = ProgressService::new(db.clone());

    progress.remove_favorite("user-1", "book-1").unwrap();

    progress.add_favorite("user-1", "book-1").unwrap();
    progress.remove_favorite("user-1", "book-1").unwrap();
    assert!(!db.is_favorite("user-1", "book-1").unwrap());
}

// ========== RECOMMENDATIONS ==========

#[test]
fn recommendations_fall_back_to_recent_books() {
    let db = test_db();
    create_user(&db, "user-1", "testuser");
    let base = now_timestamp();
    for i in 0..10 {
        create_book(&db, &format!("book-{}", i), &format!("Book {}", i), None, base + i);
    }

    let progress = ProgressService::new(db.clone());
    let books = progress.recommend_books("user-1").unwrap();

    // Most recent 8, newest first
    assert_eq!(books.len(), 8);
    assert_eq!(books[0].id, "book-9");
    assert_eq!(books[7].id, "book-2");
}

#[test]
fn recommendations_prefer_top_genres_and_exclude_read_books() {
    let db = test_db();
    create_user(&db, "user-1", "testuser");
    create_category(&db, "cat-scifi", "Science Fiction");
    create_category(&db, "cat-hist", "History");

    let base = now_timestamp();
    create_book(&db, "book-read", "Read Already", Some("cat-scifi"), base);
    create_book(&db, "book-new-scifi", "Fresh Scifi", Some("cat-scifi"), base + 1);
    create_book(&db, "book-hist", "Some History", Some("cat-hist"), base + 2);
    create_book(&db, "book-uncat", "No Genre", None, base + 3);

    let progress = ProgressService::new(db.clone());
    progress.mark_completed("user-1", "book-read").unwrap();

    let books = progress.recommend_books("user-1").unwrap();
    let ids: Vec<&str> = books.iter().map(|b| b.id.as_str()).collect();

    // Only the scifi genre ranks; the completed book itself is excluded
    assert_eq!(ids, vec!["book-new-scifi"]);
}

#[test]
fn recommendations_use_favorites_when_nothing_completed() {
    let db = test_db();
    create_user(&db, "user-1", "testuser");
    create_category(&db, "cat-1", "Fiction");

    let base = now_timestamp();
    create_book(&db, "book-fav", "Favorited", Some("cat-1"), base);
    create_book(&db, "book-other", "Another Fiction", Some("cat-1"), base + 1);

    let progress = ProgressService::new(db.clone());
    progress.add_favorite("user-1", "book-fav").unwrap();

    let books = progress.recommend_books("user-1").unwrap();
    let ids: Vec<&str> = books.iter().map(|b| b.id.as_str()).collect();

    // Favorited but unread books stay in the listing
    assert_eq!(ids, vec!["book-other", "book-fav"]);
}

// ========== CATALOG ==========

#[test]
fn catalog_list_all_newest_first() {
    let db = test_db();
    let base = now_timestamp();
    create_book(&db, "book-a", "Alpha", None, base);
    create_book(&db, "book-b", "Beta", None, base + 10);

    let catalog = offline_catalog(&db);
    let entries =
        tokio_test::block_on(catalog.list_books(&CategoryFilter::All, "")).unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].id, "book-b");
    assert_eq!(entries[0].source, "library");
}

#[test]
fn catalog_category_filter_narrows_listing() {
    let db = test_db();
    create_category(&db, "cat-1", "Fiction");
    create_book(&db, "book-a", "Alpha", Some("cat-1"), now_timestamp());
    create_book(&db, "book-b", "Beta", None, now_timestamp());

    let catalog = offline_catalog(&db);
    let entries = tokio_test::block_on(
        catalog.list_books(&CategoryFilter::Category("cat-1".to_string()), ""),
    )
    .unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, "book-a");
}

#[test]
fn catalog_search_filters_title_and_author_case_insensitively() {
    let db = test_db();
    let base = now_timestamp();

    let by_title = Book {
        id: "book-title".to_string(),
        title: "The Dispossessed".to_string(),
        author: "Ursula K. Le Guin".to_string(),
        description: None,
        category_id: None,
        cover_path: None,
        file_path: None,
        publication_year: Some(1974),
        uploader_id: None,
        created_at: base,
    };
    let by_author = Book {
        id: "book-author".to_string(),
        title: "Unrelated Title".to_string(),
        author: "le guin".to_string(),
        description: None,
        category_id: None,
        cover_path: None,
        file_path: None,
        publication_year: None,
        uploader_id: None,
        created_at: base + 1,
    };
    let neither = Book {
        id: "book-neither".to_string(),
        title: "Something Else".to_string(),
        author: "Someone Else".to_string(),
        description: None,
        category_id: None,
        cover_path: None,
        file_path: None,
        publication_year: None,
        uploader_id: None,
        created_at: base + 2,
    };
    db.create_book(&by_title).unwrap();
    db.create_book(&by_author).unwrap();
    db.create_book(&neither).unwrap();

    let catalog = offline_catalog(&db);
    let entries =
        tokio_test::block_on(catalog.list_books(&CategoryFilter::All, "LE GUIN")).unwrap();

    let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["book-author", "book-title"]);
}

#[test]
fn catalog_zero_results_is_success() {
    let db = test_db();
    let catalog = offline_catalog(&db);

    let entries =
        tokio_test::block_on(catalog.list_books(&CategoryFilter::All, "nothing here")).unwrap();
    assert!(entries.is_empty());
}

#[test]
fn catalog_get_book_not_found() {
    let db = test_db();
    let catalog = offline_catalog(&db);

    assert!(matches!(
        catalog.get_book("missing"),
        Err(AppError::NotFound(_))
    ));
}

#[test]
fn catalog_category_name_resolves_with_fallback() {
    let db = test_db();
    create_category(&db, "cat-1", "Fiction");
    create_book(&db, "book-1", "A", Some("cat-1"), now_timestamp());
    create_book(&db, "book-2", "B", None, now_timestamp());

    let catalog = offline_catalog(&db);

    let with_category = catalog.get_book("book-1").unwrap();
    assert_eq!(catalog.category_name(&with_category).unwrap(), "Fiction");

    let without = catalog.get_book("book-2").unwrap();
    assert_eq!(catalog.category_name(&without).unwrap(), "Uncategorized");
}

#[test]
fn catalog_entry_maps_storage_paths_to_urls() {
    let db = test_db();
    let book = Book {
        id: "book-1".to_string(),
        title: "Stored".to_string(),
        author: "Author".to_string(),
        description: None,
        category_id: None,
        cover_path: Some("covers/book-1.jpg".to_string()),
        file_path: Some("books/book-1.pdf".to_string()),
        publication_year: None,
        uploader_id: None,
        created_at: now_timestamp(),
    };
    db.create_book(&book).unwrap();

    let catalog = offline_catalog(&db);
    let entries = tokio_test::block_on(catalog.list_books(&CategoryFilter::All, "")).unwrap();

    assert_eq!(entries[0].cover_url.as_deref(), Some("/files/covers/book-1.jpg"));
    assert_eq!(entries[0].file_url.as_deref(), Some("/files/books/book-1.pdf"));
}

#[test]
fn pageless_book_keeps_file_url_for_external_view() {
    let db = test_db();

    let external = Book {
        id: "book-ext".to_string(),
        title: "External Only".to_string(),
        author: "Author".to_string(),
        description: None,
        category_id: None,
        cover_path: None,
        file_path: Some("books/book-ext.pdf".to_string()),
        publication_year: None,
        uploader_id: None,
        created_at: now_timestamp(),
    };
    db.create_book(&external).unwrap();
    create_book(&db, "book-empty", "Nothing At All", None, now_timestamp());

    let catalog = offline_catalog(&db);

    // Zero pages with a file reference: the external-file view applies
    let ext = catalog.get_book("book-ext").unwrap();
    assert_eq!(db.page_count("book-ext").unwrap(), 0);
    assert!(ext.file_path.is_some());

    // Zero pages and no file reference: nothing to render
    let empty = catalog.get_book("book-empty").unwrap();
    assert_eq!(db.page_count("book-empty").unwrap(), 0);
    assert!(empty.file_path.is_none());
}

// ========== AUTH ==========

#[test]
fn auth_create_user_and_login() {
    let db = test_db();
    let auth = AuthService::new(db, 30, true);

    let user = auth.create_user("testuser", "password123", "user").unwrap();
    assert_eq!(user.username, "testuser");
    assert_eq!(user.role, "user");

    let (logged_in, token) = auth.login("testuser", "password123").unwrap();
    assert_eq!(logged_in.username, "testuser");
    assert!(!token.is_empty());
}

#[test]
fn auth_validate_token() {
    let db = test_db();
    let auth = AuthService::new(db, 30, true);

    auth.create_user("alice", "pass1234", "admin").unwrap();
    let (_, token) = auth.login("alice", "pass1234").unwrap();

    let user = auth.validate_token(&token).unwrap().unwrap();
    assert_eq!(user.username, "alice");

    // Unknown tokens resolve to anonymous, not an error
    assert!(auth.validate_token("invalid_token").unwrap().is_none());
}

#[test]
fn auth_expired_session_resolves_anonymous() {
    let db = test_db();
    create_user(&db, "user-1", "testuser");

    let session = crate::db::Session {
        token: "stale".to_string(),
        user_id: "user-1".to_string(),
        expires_at: now_timestamp() - 10,
    };
    db.create_session(&session).unwrap();

    let auth = AuthService::new(db.clone(), 30, true);
    assert!(auth.validate_token("stale").unwrap().is_none());

    // The expired session was deleted on sight
    assert!(db.get_session("stale").unwrap().is_none());
}

#[test]
fn auth_logout() {
    let db = test_db();
    let auth = AuthService::new(db, 30, true);

    auth.create_user("bob", "password", "user").unwrap();
    let (_, token) = auth.login("bob", "password").unwrap();

    auth.logout(&token).unwrap();
    assert!(auth.validate_token(&token).unwrap().is_none());

    // Logout of an already-deleted session is success
    auth.logout(&token).unwrap();
}

#[test]
fn auth_registration_disabled() {
    let db = test_db();
    let auth = AuthService::new(db, 30, false);

    let result = auth.register("newuser", "password");
    assert!(result.is_err());
}

#[test]
fn auth_invalid_password() {
    let db = test_db();
    let auth = AuthService::new(db, 30, true);

    auth.create_user("user", "correct", "user").unwrap();
    let result = auth.login("user", "wrong");
    assert!(result.is_err());
}

#[test]
fn auth_change_password() {
    let db = test_db();
    let auth = AuthService::new(db, 30, true);

    auth.create_user("user", "oldpass", "user").unwrap();
    auth.change_password("user", "newpass").unwrap();

    assert!(auth.login("user", "oldpass").is_err());
    assert!(auth.login("user", "newpass").is_ok());
}

#[test]
fn auth_short_password_rejected() {
    let db = test_db();
    let auth = AuthService::new(db, 30, true);

    let result = auth.create_user("user", "abc", "user");
    assert!(result.is_err());
}

#[test]
fn auth_invalid_username_rejected() {
    let db = test_db();
    let auth = AuthService::new(db, 30, true);

    assert!(auth.create_user("user@email", "password", "user").is_err());
    assert!(auth.create_user("user name", "password", "user").is_err());
    assert!(auth.create_user("", "password", "user").is_err());
}

#[test]
fn auth_is_admin() {
    let db = test_db();
    let auth = AuthService::new(db, 30, true);

    let admin = auth.create_user("admin", "password", "admin").unwrap();
    let user = auth.create_user("user", "password", "user").unwrap();

    assert!(auth.is_admin(&admin));
    assert!(!auth.is_admin(&user));
}

// ========== CONFIG ==========

#[test]
fn config_parse_toml() {
    let toml = r#"
[server]
bind = "127.0.0.1:9090"
title = "Test Library"

[database]
path = "/tmp/test.db"

[auth]
registration = "disabled"
session_days = 7

[search]
enabled = false
limit = 3
"#;
    let config: Config = toml::from_str(toml).unwrap();
    assert_eq!(config.server.bind.port(), 9090);
    assert_eq!(config.server.title, "Test Library");
    assert!(!config.auth.registration_enabled());
    assert_eq!(config.auth.session_days, 7);
    assert!(!config.search.enabled);
    assert_eq!(config.search.limit, 3);
}

#[test]
fn config_default_values() {
    let config = Config::default();
    assert_eq!(config.server.bind.port(), 8080);
    assert!(config.auth.registration_enabled());
    assert!(config.search.enabled);
    assert_eq!(config.search.limit, 10);
    assert_eq!(config.storage.thumbnail_size, 200);
}
