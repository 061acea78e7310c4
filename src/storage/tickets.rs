use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::models::{Ticket, TicketCategory, TicketStats};
use crate::storage::{begin_immediate, commit_tx, rollback_logged};
use crate::token::generate_token;
use crate::utils::error::AppError;

/// Filter for the admin ticket listing.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub token_prefix: Option<String>,
    pub category: Option<TicketCategory>,
}

/// Durable records of issued tickets and their active/voided lifecycle.
#[derive(Clone)]
pub struct TicketStore {
    pool: SqlitePool,
}

impl TicketStore {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create `vip_count + general_count` fresh tickets in one transaction.
    ///
    /// The cap check runs against the current count inside the same
    /// transaction, so either every requested ticket is created or none are.
    /// A token UNIQUE violation rolls the whole batch back as an integrity
    /// error; the caller retries with fresh tokens. The transaction is
    /// immediate-mode so concurrent scans never abort the batch mid-write.
    pub async fn issue_batch(
        &self,
        vip_count: u32,
        general_count: u32,
        cap: i64,
    ) -> Result<Vec<Ticket>, AppError> {
        let total = i64::from(vip_count) + i64::from(general_count);
        if total == 0 {
            return Err(AppError::ValidationError(
                "At least one ticket must be requested".to_string(),
            ));
        }

        let mut conn = begin_immediate(&self.pool).await?;
        let issued = match Self::issue_batch_on(&mut conn, vip_count, general_count, cap).await {
            Ok(issued) => issued,
            Err(err) => {
                rollback_logged(conn).await;
                return Err(err);
            }
        };
        commit_tx(conn).await?;

        tracing::info!(
            vip = vip_count,
            general = general_count,
            "Issued ticket batch"
        );
        Ok(issued)
    }

    async fn issue_batch_on(
        conn: &mut SqliteConnection,
        vip_count: u32,
        general_count: u32,
        cap: i64,
    ) -> Result<Vec<Ticket>, AppError> {
        let total = i64::from(vip_count) + i64::from(general_count);
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tickets")
            .fetch_one(&mut *conn)
            .await?;

        if existing + total > cap {
            return Err(AppError::CapacityExceeded {
                remaining: (cap - existing).max(0),
            });
        }

        let categories = std::iter::repeat(TicketCategory::Vip)
            .take(vip_count as usize)
            .chain(std::iter::repeat(TicketCategory::General).take(general_count as usize));

        let mut issued = Vec::with_capacity(total as usize);
        for category in categories {
            let token = generate_token();
            let ticket = sqlx::query_as::<_, Ticket>(
                "INSERT INTO tickets (token, category, status, created_at) \
                 VALUES (?, ?, 'active', ?) \
                 RETURNING id, token, category, status, created_at",
            )
            .bind(&token)
            .bind(category)
            .bind(Utc::now())
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::IntegrityError("ticket token collision on insert".to_string())
                } else {
                    AppError::from(e)
                }
            })?;
            issued.push(ticket);
        }
        Ok(issued)
    }

    pub async fn find_by_token(&self, token: &str) -> Result<Option<Ticket>, AppError> {
        let ticket = sqlx::query_as::<_, Ticket>(
            "SELECT id, token, category, status, created_at FROM tickets WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ticket)
    }

    /// Flip a ticket between active and voided. Each call strictly inverts the
    /// current status, so two calls in a row restore the original state.
    pub async fn toggle_void(&self, token: &str) -> Result<Ticket, AppError> {
        let mut conn = begin_immediate(&self.pool).await?;
        let updated = match Self::toggle_void_on(&mut conn, token).await {
            Ok(updated) => updated,
            Err(err) => {
                rollback_logged(conn).await;
                return Err(err);
            }
        };
        commit_tx(conn).await?;

        tracing::info!(token = %updated.token, status = ?updated.status, "Toggled ticket void state");
        Ok(updated)
    }

    async fn toggle_void_on(conn: &mut SqliteConnection, token: &str) -> Result<Ticket, AppError> {
        let ticket = sqlx::query_as::<_, Ticket>(
            "SELECT id, token, category, status, created_at FROM tickets WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Ticket '{}' was not found", token)))?;

        let updated = sqlx::query_as::<_, Ticket>(
            "UPDATE tickets SET status = ? WHERE id = ? \
             RETURNING id, token, category, status, created_at",
        )
        .bind(ticket.status.toggled())
        .bind(ticket.id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(updated)
    }

    /// One page of tickets, newest-first, plus the total row count for the
    /// filter.
    pub async fn list_page(
        &self,
        filter: &TicketFilter,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<Ticket>, i64), AppError> {
        let mut where_sql = String::from("WHERE 1=1");
        let prefix_pattern = filter
            .token_prefix
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| format!("{}%", escape_like(p)));

        if prefix_pattern.is_some() {
            where_sql.push_str(" AND token LIKE ? ESCAPE '\\'");
        }
        if filter.category.is_some() {
            where_sql.push_str(" AND category = ?");
        }

        let count_sql = format!("SELECT COUNT(*) FROM tickets {}", where_sql);
        let list_sql = format!(
            "SELECT id, token, category, status, created_at FROM tickets {} \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            where_sql
        );

        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        let mut list_query = sqlx::query_as::<_, Ticket>(&list_sql);

        if let Some(pattern) = &prefix_pattern {
            count_query = count_query.bind(pattern.clone());
            list_query = list_query.bind(pattern.clone());
        }
        if let Some(category) = filter.category {
            count_query = count_query.bind(category);
            list_query = list_query.bind(category);
        }

        let page = page.max(1);
        let offset = i64::from(page - 1) * i64::from(page_size);
        list_query = list_query.bind(i64::from(page_size)).bind(offset);

        let total = count_query.fetch_one(&self.pool).await?;
        let tickets = list_query.fetch_all(&self.pool).await?;

        Ok((tickets, total))
    }

    pub async fn stats(&self) -> Result<TicketStats, AppError> {
        let stats = sqlx::query_as::<_, TicketStats>(
            "SELECT COUNT(*) AS total, \
                    COALESCE(SUM(CASE WHEN category = 'VIP' THEN 1 ELSE 0 END), 0) AS vip, \
                    COALESCE(SUM(CASE WHEN category = 'General' THEN 1 ELSE 0 END), 0) AS general, \
                    COALESCE(SUM(CASE WHEN status = 'voided' THEN 1 ELSE 0 END), 0) AS voided \
             FROM tickets",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Escape LIKE wildcards so a literal prefix stays literal ('_' is in the
/// token alphabet).
fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_neutralizes_wildcards() {
        assert_eq!(escape_like("ab_c%"), "ab\\_c\\%");
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
    }
}
