use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers::{self, health_check};
use crate::middleware::RateLimitLayer;
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    // The rate limit guards only the adjudication endpoint; a rejected
    // request never reaches the engine.
    let scan_routes = Router::new()
        .route("/scan", post(handlers::scan::scan))
        .route_layer(RateLimitLayer::new(
            state.config.scan_rate_limit,
            Duration::from_secs(60),
        ));

    let api = Router::new()
        .merge(scan_routes)
        .route(
            "/tickets",
            post(handlers::tickets::issue).get(handlers::tickets::list),
        )
        .route("/tickets/:token", get(handlers::tickets::detail))
        .route("/tickets/:token/void", post(handlers::tickets::toggle_void))
        .route("/stats", get(handlers::tickets::stats));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/t/:token", get(handlers::public::ticket_page))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
