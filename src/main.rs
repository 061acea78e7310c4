use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use dotenvy::dotenv;
use tokio::net::TcpListener;

use gatepass_server::auth;
use gatepass_server::config::Config;
use gatepass_server::routes::create_routes;
use gatepass_server::state::AppState;
use gatepass_server::storage::Storage;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env();

    let storage = Storage::connect(&config.database_url)
        .await
        .expect("Failed to open database");

    tracing::info!("Successfully opened database");

    storage.migrate().await.expect("Failed to run migrations");

    tracing::info!("Migrations run successfully");

    if let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) {
        auth::ensure_admin(&storage, username, password)
            .await
            .expect("Failed to bootstrap admin account");
    }

    let port = config.port;
    let state = AppState::new(storage, Arc::new(config));
    let app: Router = create_routes(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("🚀 Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server failed");
}
