use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;

/// Name of the HttpOnly session cookie.
pub const SESSION_COOKIE: &str = "gatepass_session";

const SESSION_TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone)]
struct Session {
    username: String,
    expires_at: DateTime<Utc>,
}

/// In-memory session registry for operator logins. Tokens are opaque random
/// strings; entries expire after the configured TTL and are evicted on the
/// next lookup.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, Session>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl_hours: i64) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Issue a fresh session token for a logged-in operator.
    pub fn create(&self, username: &str) -> String {
        let mut raw = [0u8; SESSION_TOKEN_BYTES];
        OsRng.fill_bytes(&mut raw);
        let token = URL_SAFE_NO_PAD.encode(raw);

        let mut sessions = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions.insert(
            token.clone(),
            Session {
                username: username.to_string(),
                expires_at: Utc::now() + self.ttl,
            },
        );
        token
    }

    /// Resolve a session token to its operator, evicting it when expired.
    pub fn resolve(&self, token: &str) -> Option<String> {
        let mut sessions = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match sessions.get(token) {
            Some(session) if session.expires_at > Utc::now() => Some(session.username.clone()),
            Some(_) => {
                sessions.remove(token);
                None
            }
            None => None,
        }
    }

    pub fn revoke(&self, token: &str) {
        let mut sessions = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions.remove(token);
    }
}
