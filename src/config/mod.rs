use std::env;
use std::fmt::Debug;
use std::str::FromStr;

pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Public origin used to build the URL embedded in ticket QR artifacts.
    pub base_url: String,
    /// Hard cap on total issued tickets across the event.
    pub max_tickets: i64,
    /// Scan adjudication calls allowed per client IP per minute.
    pub scan_rate_limit: u32,
    pub session_ttl_hours: i64,
    /// Optional bootstrap operator account created at startup.
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let port = env_or("PORT", 3000u16);
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:gatepass.db".to_string()),
            port,
            base_url: env::var("BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{}", port)),
            max_tickets: env_or("MAX_TICKETS", 200i64),
            scan_rate_limit: env_or("SCAN_RATE_LIMIT", 30u32),
            session_ttl_hours: env_or("SESSION_TTL_HOURS", 12i64),
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
        }
    }
}

fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Debug,
{
    match env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(var = name, value = %raw, error = ?e, "Unparseable env var, using default");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_on_garbage() {
        env::set_var("GATEPASS_TEST_PORT", "not-a-number");
        assert_eq!(env_or("GATEPASS_TEST_PORT", 3000u16), 3000);
        env::remove_var("GATEPASS_TEST_PORT");
    }

    #[test]
    fn env_or_parses_valid_values() {
        env::set_var("GATEPASS_TEST_CAP", "500");
        assert_eq!(env_or("GATEPASS_TEST_CAP", 200i64), 500);
        env::remove_var("GATEPASS_TEST_CAP");
    }
}
