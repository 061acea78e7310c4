use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::AdminIdentity;
use crate::models::{ScanRecord, Ticket, TicketCategory};
use crate::state::AppState;
use crate::storage::TicketFilter;
use crate::utils::error::AppError;
use crate::utils::response::success;

const PAGE_SIZE: u32 = 50;

#[derive(Deserialize)]
pub struct IssueRequest {
    #[serde(default)]
    pub vip_count: u32,
    #[serde(default)]
    pub general_count: u32,
}

/// POST /api/tickets
pub async fn issue(
    State(state): State<AppState>,
    _admin: AdminIdentity,
    Json(body): Json<IssueRequest>,
) -> Result<Response, AppError> {
    let tickets = state
        .storage
        .tickets()
        .issue_batch(body.vip_count, body.general_count, state.config.max_tickets)
        .await?;

    Ok(success(tickets, "Tickets issued").into_response())
}

#[derive(Deserialize)]
pub struct ListParams {
    pub prefix: Option<String>,
    pub category: Option<TicketCategory>,
    #[serde(default = "default_page")]
    pub page: u32,
}

fn default_page() -> u32 {
    1
}

#[derive(Serialize)]
struct TicketPage {
    tickets: Vec<Ticket>,
    total_count: i64,
    page: u32,
    page_size: u32,
}

/// GET /api/tickets
pub async fn list(
    State(state): State<AppState>,
    _admin: AdminIdentity,
    Query(params): Query<ListParams>,
) -> Result<Response, AppError> {
    let filter = TicketFilter {
        token_prefix: params.prefix,
        category: params.category,
    };
    let page = params.page.max(1);
    let (tickets, total_count) = state
        .storage
        .tickets()
        .list_page(&filter, page, PAGE_SIZE)
        .await?;

    let payload = TicketPage {
        tickets,
        total_count,
        page,
        page_size: PAGE_SIZE,
    };
    Ok(success(payload, "Tickets listed").into_response())
}

#[derive(Serialize)]
struct TicketDetail {
    ticket: Ticket,
    scans: Vec<ScanRecord>,
    qr_url: String,
}

/// GET /api/tickets/:token
pub async fn detail(
    State(state): State<AppState>,
    _admin: AdminIdentity,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    let ticket = state
        .storage
        .tickets()
        .find_by_token(&token)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Ticket '{}' was not found", token)))?;

    let scans = state.storage.scans().history_for(ticket.id).await?;
    let qr_url = format!("{}/t/{}", state.config.base_url, ticket.token);

    let payload = TicketDetail {
        ticket,
        scans,
        qr_url,
    };
    Ok(success(payload, "Ticket detail").into_response())
}

/// POST /api/tickets/:token/void
pub async fn toggle_void(
    State(state): State<AppState>,
    _admin: AdminIdentity,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    let ticket = state.storage.tickets().toggle_void(&token).await?;
    Ok(success(ticket, "Ticket void state toggled").into_response())
}

/// GET /api/stats
pub async fn stats(
    State(state): State<AppState>,
    _admin: AdminIdentity,
) -> Result<Response, AppError> {
    let stats = state.storage.tickets().stats().await?;
    Ok(success(stats, "Ticket stats").into_response())
}
