use std::sync::Arc;

use crate::auth::SessionStore;
use crate::config::Config;
use crate::engine::ScanEngine;
use crate::storage::Storage;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub engine: ScanEngine,
    pub sessions: SessionStore,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(storage: Storage, config: Arc<Config>) -> Self {
        Self {
            engine: ScanEngine::new(storage.clone()),
            sessions: SessionStore::new(config.session_ttl_hours),
            storage,
            config,
        }
    }
}
