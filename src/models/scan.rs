use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Adjudicated result of a single scan attempt.
///
/// `Duplicate` is a blocked re-scan of a ticket that already has a `Valid`
/// record; it is recorded as its own outcome so the ledger distinguishes a
/// replayed QR from a token that never resolved at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ScanOutcome {
    Valid,
    Duplicate,
    Voided,
    Invalid,
}

/// One immutable ledger entry per adjudication attempt.
///
/// `ticket_id` is `None` when the raw token resolved to no ticket; the raw
/// token itself is kept (truncated) for forensic trace of invalid attempts.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScanRecord {
    pub id: i64,
    pub ticket_id: Option<i64>,
    pub raw_token: String,
    pub scanned_at: DateTime<Utc>,
    pub outcome: ScanOutcome,
    pub operator: String,
    pub device_info: Option<String>,
}
