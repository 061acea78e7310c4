use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::models::{TicketCategory, TicketStatus};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

/// Data for the ticket holder's page. The `qr_url` is the string an external
/// utility renders as the QR image; the token is all it encodes.
#[derive(Serialize)]
struct PublicTicket {
    token: String,
    category: TicketCategory,
    status: TicketStatus,
    qr_url: String,
}

/// GET /t/:token — no auth; this is the link the ticket holder receives.
pub async fn ticket_page(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    let ticket = state
        .storage
        .tickets()
        .find_by_token(&token)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("Ticket not found or invalid link".to_string())
        })?;

    let payload = PublicTicket {
        qr_url: format!("{}/t/{}", state.config.base_url, ticket.token),
        token: ticket.token,
        category: ticket.category,
        status: ticket.status,
    };
    Ok(success(payload, "Ticket").into_response())
}
