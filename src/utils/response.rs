//! JSON envelopes shared by every endpoint.
//!
//! Success bodies are `{ "success": true, "data": ..., "message": ... }`,
//! failures are `{ "success": false, "error": { "code", "message",
//! "details" } }`. Scanner clients key off `data.outcome` and, for capacity
//! errors, `error.details.remaining`, so these shapes are part of the API
//! contract.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
struct Envelope<T: Serialize> {
    success: bool,
    data: Option<T>,
    message: Option<String>,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
    details: Option<Value>,
}

pub fn success<T: Serialize>(data: T, message: impl Into<String>) -> impl IntoResponse {
    Json(Envelope {
        success: true,
        data: Some(data),
        message: Some(message.into()),
    })
}

/// Acknowledgement with no payload, e.g. logout.
pub fn empty_success(message: impl Into<String>) -> impl IntoResponse {
    Json(Envelope::<()> {
        success: true,
        data: None,
        message: Some(message.into()),
    })
}

pub fn error(
    code: &str,
    message: impl Into<String>,
    details: Option<Value>,
    status: StatusCode,
) -> Response {
    let body = ErrorEnvelope {
        success: false,
        error: ErrorDetail {
            code: code.to_string(),
            message: message.into(),
            details,
        },
    };
    (status, Json(body)).into_response()
}
