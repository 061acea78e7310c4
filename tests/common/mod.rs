use std::sync::Arc;

use gatepass_server::config::Config;
use gatepass_server::state::AppState;
use gatepass_server::storage::Storage;
use gatepass_server::token::generate_token;

/// Open a fresh, fully migrated database under a unique temp path so tests
/// never share state.
pub async fn test_storage() -> Storage {
    let path = std::env::temp_dir().join(format!("gatepass-test-{}.db", generate_token()));
    let url = format!("sqlite:{}", path.display());
    let storage = Storage::connect(&url).await.expect("open test database");
    storage.migrate().await.expect("migrate test database");
    storage
}

#[allow(dead_code)]
pub fn test_config(scan_rate_limit: u32) -> Config {
    Config {
        database_url: String::new(),
        port: 0,
        base_url: "http://localhost:3000".to_string(),
        max_tickets: 200,
        scan_rate_limit,
        session_ttl_hours: 12,
        admin_username: None,
        admin_password: None,
    }
}

#[allow(dead_code)]
pub async fn test_state(scan_rate_limit: u32) -> AppState {
    let storage = test_storage().await;
    AppState::new(storage, Arc::new(test_config(scan_rate_limit)))
}
