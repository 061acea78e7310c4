use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::auth::AdminIdentity;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub token: String,
}

/// POST /api/scan — the engine's HTTP boundary. Identity comes from the
/// session; device info is the scanner's user agent.
pub async fn scan(
    State(state): State<AppState>,
    admin: AdminIdentity,
    headers: HeaderMap,
    Json(body): Json<ScanRequest>,
) -> Result<Response, AppError> {
    let device_info = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok());

    let adjudication = state
        .engine
        .adjudicate(&body.token, &admin.username, device_info)
        .await?;

    Ok(success(adjudication, "Scan adjudicated").into_response())
}
