//! Application state shared across handlers.

use crate::auth::AuthService;
use crate::catalog::CatalogService;
use crate::config::Config;
use crate::db::Database;
use crate::progress::ProgressService;
use crate::search::SearchClient;
use crate::storage::ObjectStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Database connection.
    pub db: Database,
    /// Authentication service.
    pub auth: Arc<AuthService>,
    /// Catalog query service.
    pub catalog: Arc<CatalogService>,
    /// Progress engine.
    pub progress: Arc<ProgressService>,
    /// Object store for covers and book files.
    pub store: Arc<ObjectStore>,
}

impl AppState {
    /// Wire up application state from configuration and an open database.
    pub fn new(config: Config, db: Database, auth: AuthService) -> Self {
        let search = SearchClient::new(&config.search);
        let catalog = CatalogService::new(db.clone(), search);
        let progress = ProgressService::new(db.clone());
        let store = ObjectStore::new(config.storage.root.clone());

        Self {
            config: Arc::new(config),
            db,
            auth: Arc::new(auth),
            catalog: Arc::new(catalog),
            progress: Arc::new(progress),
            store: Arc::new(store),
        }
    }
}
