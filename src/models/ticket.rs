use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Ticket class chosen at issuance time. Immutable for the life of the ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum TicketCategory {
    #[sqlx(rename = "VIP")]
    #[serde(rename = "VIP")]
    Vip,
    General,
}

impl TicketCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketCategory::Vip => "VIP",
            TicketCategory::General => "General",
        }
    }
}

/// Operator-controlled admission switch, orthogonal to scan history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Active,
    Voided,
}

impl TicketStatus {
    /// Strict inversion used by the void toggle.
    pub fn toggled(self) -> Self {
        match self {
            TicketStatus::Active => TicketStatus::Voided,
            TicketStatus::Voided => TicketStatus::Active,
        }
    }
}

/// An issued admission unit. The `token` is the public unguessable string
/// embedded in the ticket's QR artifact; whether the ticket has been consumed
/// is derived from the scan ledger, never stored here.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: i64,
    pub token: String,
    pub category: TicketCategory,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
}

/// Dashboard counts over the whole ticket table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TicketStats {
    pub total: i64,
    pub vip: i64,
    pub general: i64,
    pub voided: i64,
}
