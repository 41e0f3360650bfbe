//! bookshelf-rs: A self-hosted book library server with reading sync.
//!
//! This crate provides a book-library web service: users browse a catalog,
//! read paginated books or external files, bookmark their reading position,
//! mark books complete, rate them and keep favorites.
//!
//! # Features
//!
//! - Catalog with categories and free-text search
//! - Optional public-book search merged into listings (Open Library)
//! - User accounts and session authentication
//! - Reading-position bookmarks (one per user and book, updated in place)
//! - Reading history with completion, ratings and reviews
//! - Favorites and genre-based book recommendations
//! - Cover image and book file storage with thumbnails

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Authentication and user management.
pub mod auth;
/// Catalog queries.
pub mod catalog;
/// Configuration and CLI.
pub mod config;
/// Database operations.
pub mod db;
/// Error types.
pub mod error;
/// Reading progress and recommendations.
pub mod progress;
/// External public-book search.
pub mod search;
/// HTTP server.
pub mod server;
/// Object storage for uploads.
pub mod storage;

#[cfg(test)]
mod tests;

pub use config::{Cli, Command, Config};
pub use db::Database;
pub use error::{AppError, Result};
pub use server::AppState;
