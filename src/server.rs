//! HTTP server and routes.

mod handlers;
mod state;

pub use state::AppState;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let max_body = state.config.storage.max_upload_bytes as usize;

    let auth_routes = Router::new()
        .route("/login", post(handlers::auth_login))
        .route("/register", post(handlers::auth_register))
        .route("/logout", post(handlers::auth_logout))
        .route("/me", get(handlers::auth_me));

    let book_routes = Router::new()
        .route("/", get(handlers::list_books))
        .route("/", post(handlers::create_book))
        .route("/{id}", get(handlers::get_book))
        .route("/{id}", delete(handlers::delete_book))
        .route("/{id}/pages", get(handlers::get_book_pages))
        .route("/{id}/pages", post(handlers::add_book_pages))
        .route("/{id}/cover", get(handlers::book_cover))
        .route("/{id}/thumbnail", get(handlers::book_thumbnail))
        // Reader state and per-book user actions
        .route("/{id}/reading", get(handlers::book_reading_state))
        .route("/{id}/bookmark", get(handlers::get_bookmark))
        .route("/{id}/bookmark", put(handlers::put_bookmark))
        .route("/{id}/history", get(handlers::get_history))
        .route("/{id}/complete", post(handlers::mark_completed))
        .route("/{id}/rating", put(handlers::put_rating))
        .route("/{id}/review", put(handlers::put_review))
        .route("/{id}/favorite", post(handlers::add_favorite))
        .route("/{id}/favorite", delete(handlers::remove_favorite));

    let api_routes = Router::new()
        .route("/categories", get(handlers::list_categories))
        .route("/bookmarks/{id}", delete(handlers::delete_bookmark))
        .route("/favorites", get(handlers::list_favorites))
        .route("/recommendations", get(handlers::recommendations))
        .route("/profile", get(handlers::profile))
        .route("/stats", get(handlers::api_stats));

    Router::new()
        .route("/", get(handlers::index))
        .route("/files/{*path}", get(handlers::serve_file))
        .nest("/api/auth", auth_routes)
        .nest("/api/books", book_routes)
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(max_body))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
