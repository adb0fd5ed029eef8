//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront (used for
//!   conversion event source URLs)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `ORDER_STORAGE_DIR` - Directory holding one JSON file per order
//!   (default: data/orders)
//! - `STALE_ORDER_MINUTES` - Age after which a pending order is reconciled
//!   against the gateway (default: 30)
//! - `TOSS_CLIENT_KEY` / `TOSS_SECRET_KEY` - Payment gateway keys. Without
//!   both, payment confirmation runs in simulation mode.
//! - `TOSS_API_BASE` - Gateway API base URL (default: <https://api.tosspayments.com>)
//! - `TOSS_TIMEOUT_SECS` - Gateway request timeout (default: 10)
//! - `META_PIXEL_ID` (or `NEXT_PUBLIC_META_PIXEL_ID`) / `META_ACCESS_TOKEN` -
//!   Conversions API credentials. Without both, conversion events are skipped.
//! - `META_API_BASE` - Conversions API base URL (default: <https://graph.facebook.com>)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Default directory for order records.
pub const DEFAULT_ORDER_STORAGE_DIR: &str = "data/orders";

/// Default gateway API base URL.
pub const DEFAULT_TOSS_API_BASE: &str = "https://api.tosspayments.com";

/// Default Conversions API base URL.
pub const DEFAULT_META_API_BASE: &str = "https://graph.facebook.com";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: Url,
    /// Directory holding order records
    pub order_storage_dir: PathBuf,
    /// Pending orders older than this are eligible for reconciliation
    pub stale_order_after: Duration,
    /// Payment gateway configuration (`None` = simulation mode)
    pub toss: Option<TossConfig>,
    /// Conversions API configuration (`None` = events skipped)
    pub meta: Option<MetaConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate
    pub sentry_traces_sample_rate: f32,
}

/// Payment gateway configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct TossConfig {
    /// Client key (safe to expose in the browser widget)
    pub client_key: String,
    /// Secret key (server-side only)
    pub secret_key: SecretString,
    /// API base URL
    pub api_base: Url,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for TossConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TossConfig")
            .field("client_key", &self.client_key)
            .field("secret_key", &"[REDACTED]")
            .field("api_base", &self.api_base.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Conversions API configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct MetaConfig {
    /// Pixel (dataset) ID
    pub pixel_id: String,
    /// Conversions API access token
    pub access_token: SecretString,
    /// API base URL
    pub api_base: Url,
}

impl std::fmt::Debug for MetaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaConfig")
            .field("pixel_id", &self.pixel_id)
            .field("access_token", &"[REDACTED]")
            .field("api_base", &self.api_base.as_str())
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env("STOREFRONT_PORT", "3000")?;
        let base_url = parse_url("STOREFRONT_BASE_URL", &get_required_env("STOREFRONT_BASE_URL")?)?;
        let order_storage_dir =
            PathBuf::from(get_env_or_default("ORDER_STORAGE_DIR", DEFAULT_ORDER_STORAGE_DIR));
        let stale_minutes: u64 = parse_env("STALE_ORDER_MINUTES", "30")?;

        Ok(Self {
            host,
            port,
            base_url,
            order_storage_dir,
            stale_order_after: minutes(stale_minutes),
            toss: TossConfig::from_env()?,
            meta: MetaConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl TossConfig {
    /// Both keys must be present; either missing means simulation mode.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let (Some(client_key), Some(secret_key)) = (
            get_optional_env("TOSS_CLIENT_KEY"),
            get_optional_env("TOSS_SECRET_KEY"),
        ) else {
            return Ok(None);
        };
        validate_secret_strength(&secret_key, "TOSS_SECRET_KEY")?;

        let timeout_secs: u64 = parse_env("TOSS_TIMEOUT_SECS", "10")?;
        Ok(Some(Self {
            client_key,
            secret_key: SecretString::from(secret_key),
            api_base: parse_url(
                "TOSS_API_BASE",
                &get_env_or_default("TOSS_API_BASE", DEFAULT_TOSS_API_BASE),
            )?,
            timeout: Duration::from_secs(timeout_secs),
        }))
    }
}

impl MetaConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let pixel_id =
            get_optional_env("META_PIXEL_ID").or_else(|| get_optional_env("NEXT_PUBLIC_META_PIXEL_ID"));
        let (Some(pixel_id), Some(access_token)) = (pixel_id, get_optional_env("META_ACCESS_TOKEN"))
        else {
            return Ok(None);
        };
        validate_secret_strength(&access_token, "META_ACCESS_TOKEN")?;

        Ok(Some(Self {
            pixel_id,
            access_token: SecretString::from(access_token),
            api_base: parse_url(
                "META_API_BASE",
                &get_env_or_default("META_API_BASE", DEFAULT_META_API_BASE),
            )?,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable (or its default) with `FromStr`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Minutes as a `Duration`, saturating instead of overflowing.
const fn minutes(value: u64) -> Duration {
    Duration::from_secs(value.saturating_mul(60))
}

fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real API keys have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the key issued by the provider."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn test_config() -> StorefrontConfig {
        StorefrontConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: Url::parse("http://localhost:3000").unwrap(),
            order_storage_dir: PathBuf::from("data/orders"),
            stale_order_after: Duration::from_secs(1800),
            toss: None,
            meta: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        // All same character = 0 entropy
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-toss-key-here", "TOSS_SECRET_KEY");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TOSS_SECRET_KEY");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_gateway_test_key() {
        // Shape of a gateway-issued test secret key
        let result = validate_secret_strength("test_sk_zXLkKEypNArWmo50nX3lmeaxYG5R", "TOSS_SECRET_KEY");
        assert!(result.is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let addr = test_config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_toss_config_debug_redacts_secrets() {
        let config = TossConfig {
            client_key: "test_ck_public_value".to_string(),
            secret_key: SecretString::from("test_sk_super_secret_value"),
            api_base: Url::parse(DEFAULT_TOSS_API_BASE).unwrap(),
            timeout: Duration::from_secs(10),
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("test_ck_public_value"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("test_sk_super_secret_value"));
        assert_eq!(config.secret_key.expose_secret(), "test_sk_super_secret_value");
    }

    #[test]
    fn test_meta_config_debug_redacts_secrets() {
        let config = MetaConfig {
            pixel_id: "1234567890".to_string(),
            access_token: SecretString::from("EAAGm0PX4ZCpsBAsecrettoken"),
            api_base: Url::parse(DEFAULT_META_API_BASE).unwrap(),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("1234567890"));
        assert!(!debug_output.contains("EAAGm0PX4ZCpsBAsecrettoken"));
    }

    #[test]
    fn test_stale_minutes_saturate() {
        assert_eq!(minutes(30), Duration::from_secs(1800));
        assert_eq!(minutes(u64::MAX), Duration::from_secs(u64::MAX));
    }
}
