//! Application configuration loaded from environment variables.

use domain::{CancellationPolicy, DEFAULT_RESTOCKING_FEE_BPS, RetryPolicy};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `DATABASE_URL` — PostgreSQL connection string (default: unset, in-memory storage)
/// - `DATABASE_MAX_CONNECTIONS` — pool size (default: `10`)
/// - `RESTOCKING_FEE_BPS` — in-transit cancellation fee in basis points (default: `1500`)
/// - `MAX_TRANSACTION_ATTEMPTS` — attempts per write before giving up (default: `5`)
/// - `SEED_CATALOG` — load the demo catalog at startup (default: `true`)
/// - `DELIVERY_DAYS_OFFSET` — days until the quoted delivery date (default: `3`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub restocking_fee_bps: u32,
    pub max_transaction_attempts: u32,
    pub seed_catalog: bool,
    pub delivery_days_offset: u32,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: env_or("PORT", defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            database_max_connections: env_or(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            ),
            restocking_fee_bps: env_or("RESTOCKING_FEE_BPS", defaults.restocking_fee_bps),
            max_transaction_attempts: env_or(
                "MAX_TRANSACTION_ATTEMPTS",
                defaults.max_transaction_attempts,
            ),
            seed_catalog: std::env::var("SEED_CATALOG")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.seed_catalog),
            delivery_days_offset: env_or("DELIVERY_DAYS_OFFSET", defaults.delivery_days_offset),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn cancellation_policy(&self) -> CancellationPolicy {
        CancellationPolicy::default().with_restocking_fee_bps(self.restocking_fee_bps)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default().with_max_attempts(self.max_transaction_attempts)
    }

    pub fn delivery_offset(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.delivery_days_offset))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            database_max_connections: 10,
            restocking_fee_bps: DEFAULT_RESTOCKING_FEE_BPS,
            max_transaction_attempts: 5,
            seed_catalog: true,
            delivery_days_offset: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert!(config.database_url.is_none());
        assert_eq!(config.restocking_fee_bps, 1500);
        assert_eq!(config.max_transaction_attempts, 5);
        assert!(config.seed_catalog);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_addr_default() {
        let config = Config::default();
        assert_eq!(config.addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_engine_policies_follow_config() {
        let config = Config {
            restocking_fee_bps: 2000,
            max_transaction_attempts: 0,
            ..Config::default()
        };
        assert_eq!(config.cancellation_policy().restocking_fee_bps(), 2000);
        assert_eq!(config.retry_policy().max_attempts, 1);
        assert_eq!(config.delivery_offset(), chrono::Duration::days(3));
    }

    #[test]
    fn test_flag_parsing() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" 0 "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
