//! Application configuration loaded from environment variables.

use std::time::Duration;

use checkout::CheckoutSettings;
use domain::OrderCodeStrategy;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
/// - `DATABASE_URL`: PostgreSQL URL; unset selects the in-memory store
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `ORDER_CODE_STRATEGY`: `sequence` or `random` (default: `sequence`)
/// - `ORDER_CODE_PREFIX`: order code prefix (default: `"ORD"`)
/// - `CHECKOUT_TIMEOUT_MS`: transaction timeout (default: `5000`)
/// - `CART_CLEAR_MAX_ATTEMPTS`: post-commit cart clear attempts (default: `3`)
/// - `CART_CLEAR_BACKOFF_MS`: base backoff between attempts (default: `50`)
///
/// Unparseable values fall back to their defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub checkout: CheckoutSettings,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let checkout = CheckoutSettings {
            order_code_strategy: lookup("ORDER_CODE_STRATEGY")
                .and_then(|v| v.parse::<OrderCodeStrategy>().ok())
                .unwrap_or(defaults.checkout.order_code_strategy),
            order_code_prefix: lookup("ORDER_CODE_PREFIX")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.checkout.order_code_prefix),
            timeout: parse_var(&lookup, "CHECKOUT_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.checkout.timeout),
            cart_clear_max_attempts: parse_var(&lookup, "CART_CLEAR_MAX_ATTEMPTS")
                .unwrap_or(defaults.checkout.cart_clear_max_attempts),
            cart_clear_backoff: parse_var(&lookup, "CART_CLEAR_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.checkout.cart_clear_backoff),
        };

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.log_format),
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            database_max_connections: parse_var(&lookup, "DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            checkout,
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            database_max_connections: 10,
            checkout: CheckoutSettings::default(),
        }
    }
}
