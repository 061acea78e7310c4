//! Scan adjudication engine.
//!
//! Decides, in one atomic step, whether a scanned token grants entry, and
//! appends the decision to the scan ledger so the same physical ticket can
//! never be admitted twice. Ticket admission state is derived from the
//! ledger's history, never from a stored flag: the existence check for a
//! prior `valid` record and the insert of the new record run in a single
//! transaction under a per-ticket lock, so the insert itself is the point of
//! truth and the full who-scanned-first history survives for dispute
//! resolution.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

use sqlx::SqliteConnection;

use crate::models::{ScanOutcome, Ticket, TicketCategory, TicketStatus};
use crate::storage::{self, NewScan, ScanLedger, Storage};
use crate::utils::error::AppError;

/// Unresolvable raw tokens are kept for forensics but truncated so malicious
/// input cannot grow the ledger without bound.
const RAW_TOKEN_MAX_LEN: usize = 64;

const RESCAN_BLOCKED_NOTE: &str = "[re-scan blocked]";

/// The engine's answer for one scan attempt, derived from the ledger row it
/// just persisted. Absent fields are omitted from the JSON body — an
/// `invalid` outcome carries nothing that would distinguish a garbage token
/// from a near-miss of a real one.
#[derive(Debug, Clone, Serialize)]
pub struct Adjudication {
    pub outcome: ScanOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<TicketCategory>,
    /// For `duplicate`: when the ticket was first admitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_scanned_at: Option<DateTime<Utc>>,
    /// For `valid`: the persisted timestamp of this admission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scanned_at: Option<DateTime<Utc>>,
}

impl Adjudication {
    fn invalid() -> Self {
        Self {
            outcome: ScanOutcome::Invalid,
            category: None,
            first_scanned_at: None,
            scanned_at: None,
        }
    }
}

/// Serializes adjudications per ticket while leaving unrelated tickets fully
/// concurrent. Holds the storage handle and a map of per-ticket locks.
#[derive(Clone)]
pub struct ScanEngine {
    storage: Storage,
    ticket_locks: Arc<Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>>,
}

impl ScanEngine {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            ticket_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Adjudicate one raw scanned token.
    ///
    /// Every branch writes exactly one ledger record before returning, and
    /// the response is built from that persisted record. A storage failure
    /// aborts the whole call with no record written; retries are safe because
    /// an already-admitted ticket falls into the duplicate branch.
    pub async fn adjudicate(
        &self,
        raw_token: &str,
        operator: &str,
        device_info: Option<&str>,
    ) -> Result<Adjudication, AppError> {
        let token = raw_token.trim();
        let ledger = self.storage.scans();

        // Unresolvable tokens (including empty input) are recorded with no
        // ticket reference and answered uniformly: the response must not act
        // as an oracle for whether a guessed token exists.
        let ticket = if token.is_empty() {
            None
        } else {
            self.storage.tickets().find_by_token(token).await?
        };
        let Some(ticket) = ticket else {
            let truncated = truncate_token(token);
            ledger
                .record(NewScan {
                    ticket_id: None,
                    raw_token: truncated,
                    outcome: ScanOutcome::Invalid,
                    operator,
                    device_info,
                })
                .await?;
            tracing::warn!(operator, "Scan of unresolvable token");
            return Ok(Adjudication::invalid());
        };

        // Resolved ticket: every remaining branch is decided under the
        // per-ticket lock inside an immediate-mode transaction. Two
        // near-simultaneous scans of the same QR must not both win, and the
        // status must be read inside the transaction so a void committed
        // after the token lookup still blocks admission.
        let lock = self.lock_for(ticket.id);
        let _guard = lock.lock().await;

        let mut conn = storage::begin_immediate(self.storage.pool()).await?;
        let decided = Self::decide_and_record(&mut conn, &ticket, token, operator, device_info).await;
        let adjudication = match decided {
            Ok(adjudication) => adjudication,
            Err(err) => {
                storage::rollback_logged(conn).await;
                return Err(err);
            }
        };
        storage::commit_tx(conn).await?;

        match adjudication.outcome {
            ScanOutcome::Valid => {
                tracing::info!(token = %ticket.token, operator, "Ticket admitted");
            }
            ScanOutcome::Duplicate => {
                tracing::warn!(token = %ticket.token, operator, "Blocked re-scan of consumed ticket");
            }
            ScanOutcome::Voided => {
                tracing::info!(token = %ticket.token, operator, "Scan of voided ticket");
            }
            ScanOutcome::Invalid => {}
        }
        Ok(adjudication)
    }

    /// The consumed check and the new record as one atomic unit. Runs inside
    /// the per-ticket lock and the caller's open transaction.
    async fn decide_and_record(
        conn: &mut SqliteConnection,
        ticket: &Ticket,
        token: &str,
        operator: &str,
        device_info: Option<&str>,
    ) -> Result<Adjudication, AppError> {
        let status: TicketStatus = sqlx::query_scalar("SELECT status FROM tickets WHERE id = ?")
            .bind(ticket.id)
            .fetch_one(&mut *conn)
            .await?;

        // Voided wins over everything, including prior valid scans. The
        // category is safe to reveal here: the token already proved itself.
        if status == TicketStatus::Voided {
            ScanLedger::record_on(
                &mut *conn,
                NewScan {
                    ticket_id: Some(ticket.id),
                    raw_token: token,
                    outcome: ScanOutcome::Voided,
                    operator,
                    device_info,
                },
            )
            .await?;
            return Ok(Adjudication {
                outcome: ScanOutcome::Voided,
                category: Some(ticket.category),
                first_scanned_at: None,
                scanned_at: None,
            });
        }

        if let Some(first) = ScanLedger::first_valid_scan_on(&mut *conn, ticket.id).await? {
            let annotated = match device_info {
                Some(info) => format!("{} {}", info, RESCAN_BLOCKED_NOTE),
                None => RESCAN_BLOCKED_NOTE.to_string(),
            };
            ScanLedger::record_on(
                &mut *conn,
                NewScan {
                    ticket_id: Some(ticket.id),
                    raw_token: token,
                    outcome: ScanOutcome::Duplicate,
                    operator,
                    device_info: Some(&annotated),
                },
            )
            .await?;
            return Ok(Adjudication {
                outcome: ScanOutcome::Duplicate,
                category: Some(ticket.category),
                first_scanned_at: Some(first.scanned_at),
                scanned_at: None,
            });
        }

        let record = ScanLedger::record_on(
            &mut *conn,
            NewScan {
                ticket_id: Some(ticket.id),
                raw_token: token,
                outcome: ScanOutcome::Valid,
                operator,
                device_info,
            },
        )
        .await?;
        Ok(Adjudication {
            outcome: ScanOutcome::Valid,
            category: Some(ticket.category),
            first_scanned_at: None,
            scanned_at: Some(record.scanned_at),
        })
    }

    fn lock_for(&self, ticket_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .ticket_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // A lock only matters while a scan of its ticket is in flight; once
        // no task holds a clone the entry is dead weight, so the map stays
        // bounded by the number of concurrent scans.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(ticket_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.ticket_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

fn truncate_token(token: &str) -> &str {
    match token.char_indices().nth(RAW_TOKEN_MAX_LEN) {
        Some((idx, _)) => &token[..idx],
        None => token,
    }
}
