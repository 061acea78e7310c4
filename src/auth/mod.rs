//! Access gate: operator credentials and session-cookie identity.
//!
//! The engine itself trusts its callers; everything here runs in front of it.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use chrono::Utc;

use crate::models::Admin;
use crate::state::AppState;
use crate::storage::Storage;
use crate::utils::error::AppError;

pub mod password;
pub mod session;

pub use session::{SessionStore, SESSION_COOKIE};

/// Check a username/password pair against the admins table.
///
/// Unknown usernames are verified against a fixed dummy hash so the failure
/// path costs the same whether or not the username exists.
pub async fn verify_login(
    storage: &Storage,
    username: &str,
    supplied_password: &str,
) -> Result<Option<Admin>, AppError> {
    let admin = sqlx::query_as::<_, Admin>(
        "SELECT id, username, password_hash, created_at FROM admins WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(storage.pool())
    .await?;

    let stored_hash = admin
        .as_ref()
        .map(|a| a.password_hash.as_str())
        .unwrap_or(password::DUMMY_HASH);

    if password::verify_password(supplied_password, stored_hash) {
        Ok(admin)
    } else {
        Ok(None)
    }
}

/// Insert an operator account if the username is not yet taken. Used by the
/// startup bootstrap; an existing account is left untouched.
pub async fn ensure_admin(
    storage: &Storage,
    username: &str,
    plaintext_password: &str,
) -> Result<(), AppError> {
    let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM admins WHERE username = ?")
        .bind(username)
        .fetch_one(storage.pool())
        .await?;
    if exists > 0 {
        return Ok(());
    }

    sqlx::query("INSERT INTO admins (username, password_hash, created_at) VALUES (?, ?, ?)")
        .bind(username)
        .bind(password::hash_password(plaintext_password))
        .bind(Utc::now())
        .execute(storage.pool())
        .await?;

    tracing::info!(username, "Created admin account");
    Ok(())
}

/// Identity of the logged-in operator, extracted from the session cookie.
/// Rejects with 401 when the cookie is missing, unknown, or expired.
#[derive(Debug, Clone)]
pub struct AdminIdentity {
    pub username: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AdminIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let cookies = parts
            .headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        let token = cookie_value(cookies, SESSION_COOKIE)
            .ok_or_else(|| AppError::AuthError("Unauthorized".to_string()))?;

        let username = state
            .sessions
            .resolve(token)
            .ok_or_else(|| AppError::AuthError("Unauthorized".to_string()))?;

        Ok(AdminIdentity { username })
    }
}

/// Pull one value out of a `Cookie` request header.
pub fn cookie_value<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value)
    })
}
