use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::models::{ScanOutcome, ScanRecord};
use crate::utils::error::AppError;

/// Fields for one ledger entry; the id and timestamp are assigned on insert.
#[derive(Debug, Clone, Copy)]
pub struct NewScan<'a> {
    pub ticket_id: Option<i64>,
    pub raw_token: &'a str,
    pub outcome: ScanOutcome,
    pub operator: &'a str,
    pub device_info: Option<&'a str>,
}

/// Append-only record of every scan attempt. Rows are never updated or
/// deleted; the adjudication engine derives ticket admission state from them.
#[derive(Clone)]
pub struct ScanLedger {
    pool: SqlitePool,
}

impl ScanLedger {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one record. The returned row carries the authoritative
    /// timestamp that callers echo back to the scanner. The insert runs in an
    /// explicit transaction whose commit is awaited, so the row is visible to
    /// every other connection before the outcome is acknowledged.
    pub async fn record(&self, scan: NewScan<'_>) -> Result<ScanRecord, AppError> {
        let mut tx = self.pool.begin().await?;
        let record = Self::record_on(&mut *tx, scan).await?;
        tx.commit().await?;
        Ok(record)
    }

    /// Same as [`record`](Self::record), but on an explicit connection so the
    /// engine can append inside its check-and-write transaction.
    pub(crate) async fn record_on(
        conn: &mut SqliteConnection,
        scan: NewScan<'_>,
    ) -> Result<ScanRecord, AppError> {
        let record = sqlx::query_as::<_, ScanRecord>(
            "INSERT INTO scans (ticket_id, raw_token, scanned_at, outcome, operator, device_info) \
             VALUES (?, ?, ?, ?, ?, ?) \
             RETURNING id, ticket_id, raw_token, scanned_at, outcome, operator, device_info",
        )
        .bind(scan.ticket_id)
        .bind(scan.raw_token)
        .bind(Utc::now())
        .bind(scan.outcome)
        .bind(scan.operator)
        .bind(scan.device_info)
        .fetch_one(conn)
        .await?;
        Ok(record)
    }

    /// Earliest `valid` record for a ticket, if any. This is the single
    /// authority for whether the ticket has been consumed.
    pub async fn first_valid_scan(&self, ticket_id: i64) -> Result<Option<ScanRecord>, AppError> {
        let mut conn = self.pool.acquire().await?;
        Self::first_valid_scan_on(&mut *conn, ticket_id).await
    }

    pub(crate) async fn first_valid_scan_on(
        conn: &mut SqliteConnection,
        ticket_id: i64,
    ) -> Result<Option<ScanRecord>, AppError> {
        let record = sqlx::query_as::<_, ScanRecord>(
            "SELECT id, ticket_id, raw_token, scanned_at, outcome, operator, device_info \
             FROM scans WHERE ticket_id = ? AND outcome = 'valid' \
             ORDER BY scanned_at ASC, id ASC LIMIT 1",
        )
        .bind(ticket_id)
        .fetch_optional(conn)
        .await?;
        Ok(record)
    }

    /// Full history for a ticket, newest-first, for the detail view.
    pub async fn history_for(&self, ticket_id: i64) -> Result<Vec<ScanRecord>, AppError> {
        let records = sqlx::query_as::<_, ScanRecord>(
            "SELECT id, ticket_id, raw_token, scanned_at, outcome, operator, device_info \
             FROM scans WHERE ticket_id = ? \
             ORDER BY scanned_at DESC, id DESC",
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Total number of ledger entries, across all outcomes.
    pub async fn count(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scans")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
