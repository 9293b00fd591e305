//! Storefront configuration loaded from environment variables.

use std::str::FromStr;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// What happens when a user starts a checkout while another is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConcurrentCheckoutPolicy {
    /// Fail the second call with `InvalidState`.
    #[default]
    Reject,
    /// Queue behind the running checkout.
    Wait,
}

impl FromStr for ConcurrentCheckoutPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(ConcurrentCheckoutPolicy::Reject),
            "wait" => Ok(ConcurrentCheckoutPolicy::Wait),
            other => Err(format!("unknown checkout policy: {other}")),
        }
    }
}

/// Settings for [`crate::CartService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartConfig {
    /// Reject cart writes that exceed current stock. Checkout re-validates
    /// regardless.
    pub enforce_stock_on_add: bool,
    /// How often a save that lost an optimistic-concurrency race is retried.
    pub max_conflict_retries: u32,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            enforce_stock_on_add: false,
            max_conflict_retries: 3,
        }
    }
}

/// Settings for [`crate::CheckoutEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutConfig {
    pub policy: ConcurrentCheckoutPolicy,
    /// Attempts made to clear the cart after an order is committed.
    pub cart_clear_attempts: u32,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            policy: ConcurrentCheckoutPolicy::Reject,
            cart_clear_attempts: 3,
        }
    }
}

/// Storefront configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `DATABASE_URL`: Postgres connection string (default: unset)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `5`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `STOREFRONT_LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
/// - `STOREFRONT_CHECKOUT_POLICY`: `reject` or `wait` (default: `reject`)
/// - `STOREFRONT_CART_CLEAR_ATTEMPTS`: (default: `3`)
/// - `STOREFRONT_CART_STOCK_CHECK`: advisory stock check on cart writes (default: `false`)
/// - `STOREFRONT_MAX_CONFLICT_RETRIES`: (default: `3`)
///
/// Unparseable values fall back to the default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub log_level: String,
    pub log_format: LogFormat,
    pub checkout_policy: ConcurrentCheckoutPolicy,
    pub cart_clear_attempts: u32,
    pub cart_stock_check: bool,
    pub max_conflict_retries: u32,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |name: &str| lookup(name).and_then(|value| value.parse().ok());

        Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: parsed("DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("STOREFRONT_LOG_FORMAT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.log_format),
            checkout_policy: lookup("STOREFRONT_CHECKOUT_POLICY")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.checkout_policy),
            cart_clear_attempts: parsed("STOREFRONT_CART_CLEAR_ATTEMPTS")
                .filter(|attempts: &u32| *attempts > 0)
                .unwrap_or(defaults.cart_clear_attempts),
            cart_stock_check: lookup("STOREFRONT_CART_STOCK_CHECK")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.cart_stock_check),
            max_conflict_retries: parsed("STOREFRONT_MAX_CONFLICT_RETRIES")
                .unwrap_or(defaults.max_conflict_retries),
        }
    }

    pub fn cart_config(&self) -> CartConfig {
        CartConfig {
            enforce_stock_on_add: self.cart_stock_check,
            max_conflict_retries: self.max_conflict_retries,
        }
    }

    pub fn checkout_config(&self) -> CheckoutConfig {
        CheckoutConfig {
            policy: self.checkout_policy,
            cart_clear_attempts: self.cart_clear_attempts,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            database_max_connections: 5,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            checkout_policy: ConcurrentCheckoutPolicy::Reject,
            cart_clear_attempts: 3,
            cart_stock_check: false,
            max_conflict_retries: 3,
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_map(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.database_url, None);
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.checkout_policy, ConcurrentCheckoutPolicy::Reject);
        assert_eq!(config.cart_clear_attempts, 3);
        assert!(!config.cart_stock_check);
    }

    #[test]
    fn test_empty_source_gives_defaults() {
        assert_eq!(from_map(&[]), Config::default());
    }

    #[test]
    fn test_reads_all_variables() {
        let config = from_map(&[
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("DATABASE_MAX_CONNECTIONS", "20"),
            ("RUST_LOG", "debug"),
            ("STOREFRONT_LOG_FORMAT", "JSON"),
            ("STOREFRONT_CHECKOUT_POLICY", "wait"),
            ("STOREFRONT_CART_CLEAR_ATTEMPTS", "5"),
            ("STOREFRONT_CART_STOCK_CHECK", "true"),
            ("STOREFRONT_MAX_CONFLICT_RETRIES", "7"),
        ]);

        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/shop")
        );
        assert_eq!(config.database_max_connections, 20);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.checkout_policy, ConcurrentCheckoutPolicy::Wait);
        assert_eq!(config.cart_config().max_conflict_retries, 7);
        assert!(config.cart_config().enforce_stock_on_add);
        assert_eq!(config.checkout_config().cart_clear_attempts, 5);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = from_map(&[
            ("DATABASE_URL", "  "),
            ("DATABASE_MAX_CONNECTIONS", "many"),
            ("STOREFRONT_CHECKOUT_POLICY", "maybe"),
            ("STOREFRONT_CART_CLEAR_ATTEMPTS", "0"),
            ("STOREFRONT_CART_STOCK_CHECK", "perhaps"),
        ]);
        assert_eq!(config, Config::default());
    }
}
