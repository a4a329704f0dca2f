//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MERCATO_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `MERCATO_BASE_URL` - Public URL for the storefront (checkout return pages hang off it)
//! - `MERCATO_AUTH_SECRET` - HS256 key for bearer tokens (min 32 chars, high entropy)
//! - `CHECKOUT_SECRET_KEY` - Hosted checkout provider API key
//! - `CHECKOUT_WEBHOOK_SECRET` - Shared secret for webhook signatures
//!
//! ## Optional
//! - `MERCATO_HOST` - Bind address (default: 127.0.0.1)
//! - `MERCATO_PORT` - Listen port (default: 3000)
//! - `CHECKOUT_API_BASE` - Provider API base URL (default: <https://api.stripe.com>)
//! - `CHECKOUT_CURRENCY` - ISO currency code for sessions (default: USD)
//! - `CHECKOUT_TIMEOUT_SECS` - Bound on a session creation call (default: 10)
//! - `CHECKOUT_SUCCESS_PATH` - Return path after payment (default: /checkout/success)
//! - `CHECKOUT_CANCEL_PATH` - Return path after abandoning payment (default: /checkout/cancel)
//! - `WEBHOOK_TOLERANCE_SECS` - Maximum webhook timestamp age (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use mercato_core::CurrencyCode;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_AUTH_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
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
pub struct MercatoConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: Url,
    /// Bearer token verification key
    pub auth_secret: SecretString,
    /// Hosted checkout provider configuration
    pub checkout: CheckoutConfig,
    /// Inbound webhook configuration
    pub webhook: WebhookConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag (e.g. `production`)
    pub sentry_environment: Option<String>,
}

/// Hosted checkout provider configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct CheckoutConfig {
    /// Provider API base URL
    pub api_base: Url,
    /// Provider API key
    pub secret_key: SecretString,
    /// Currency every session is priced in
    pub currency: CurrencyCode,
    /// Upper bound on a single session creation call
    pub timeout: Duration,
    /// Absolute URL the provider redirects to after payment
    pub success_url: Url,
    /// Absolute URL the provider redirects to when the customer backs out
    pub cancel_url: Url,
}

impl std::fmt::Debug for CheckoutConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutConfig")
            .field("api_base", &self.api_base.as_str())
            .field("secret_key", &"[REDACTED]")
            .field("currency", &self.currency)
            .field("timeout", &self.timeout)
            .field("success_url", &self.success_url.as_str())
            .field("cancel_url", &self.cancel_url.as_str())
            .finish()
    }
}

/// Inbound webhook configuration.
#[derive(Clone)]
pub struct WebhookConfig {
    /// Shared signing secret
    pub secret: SecretString,
    /// How old a signed timestamp may be before the event is rejected
    pub tolerance: Duration,
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("secret", &"[REDACTED]")
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

impl MercatoConfig {
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

        let database_url = get_database_url("MERCATO_DATABASE_URL")?;
        let host = get_env_or_default("MERCATO_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("MERCATO_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("MERCATO_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("MERCATO_PORT".to_string(), e.to_string()))?;
        let base_url = parse_url("MERCATO_BASE_URL", &get_required_env("MERCATO_BASE_URL")?)?;
        let auth_secret = get_validated_secret("MERCATO_AUTH_SECRET")?;
        validate_secret_length(&auth_secret, "MERCATO_AUTH_SECRET")?;

        let checkout = CheckoutConfig::from_env(&base_url)?;
        let webhook = WebhookConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            auth_secret,
            checkout,
            webhook,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl CheckoutConfig {
    fn from_env(base_url: &Url) -> Result<Self, ConfigError> {
        let api_base = parse_url(
            "CHECKOUT_API_BASE",
            &get_env_or_default("CHECKOUT_API_BASE", "https://api.stripe.com"),
        )?;
        let currency = get_env_or_default("CHECKOUT_CURRENCY", "USD")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("CHECKOUT_CURRENCY".to_string(), e))?;
        let timeout = get_secs("CHECKOUT_TIMEOUT_SECS", 10)?;
        let success_url = join_path(
            base_url,
            "CHECKOUT_SUCCESS_PATH",
            &get_env_or_default("CHECKOUT_SUCCESS_PATH", "/checkout/success"),
        )?;
        let cancel_url = join_path(
            base_url,
            "CHECKOUT_CANCEL_PATH",
            &get_env_or_default("CHECKOUT_CANCEL_PATH", "/checkout/cancel"),
        )?;

        Ok(Self {
            api_base,
            secret_key: get_validated_secret("CHECKOUT_SECRET_KEY")?,
            currency,
            timeout,
            success_url,
            cancel_url,
        })
    }
}

impl WebhookConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            secret: get_validated_secret("CHECKOUT_WEBHOOK_SECRET")?,
            tolerance: get_secs("WEBHOOK_TOLERANCE_SECS", 300)?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get a whole number of seconds, with a default.
fn get_secs(key: &str, default: u64) -> Result<Duration, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

fn parse_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Resolve `path` against the public base URL.
fn join_path(base: &Url, key: &str, path: &str) -> Result<Url, ConfigError> {
    base.join(path)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_AUTH_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_AUTH_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
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

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn checkout_config() -> CheckoutConfig {
        let base = Url::parse("http://localhost:3000").unwrap();
        CheckoutConfig {
            api_base: Url::parse("https://api.stripe.com").unwrap(),
            secret_key: SecretString::from("sk_test_super_secret_provider_key"),
            currency: CurrencyCode::USD,
            timeout: Duration::from_secs(10),
            success_url: join_path(&base, "X", "/checkout/success").unwrap(),
            cancel_url: join_path(&base, "X", "/checkout/cancel").unwrap(),
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_char() {
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
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_secret_length() {
        assert!(validate_secret_length(&SecretString::from("short"), "TEST_VAR").is_err());
        assert!(validate_secret_length(&SecretString::from("x".repeat(32)), "TEST_VAR").is_ok());
    }

    #[test]
    fn test_join_path() {
        let base = Url::parse("https://shop.test").unwrap();
        let url = join_path(&base, "TEST_VAR", "/checkout/success").unwrap();
        assert_eq!(url.as_str(), "https://shop.test/checkout/success");
    }

    #[test]
    fn test_checkout_config_debug_redacts_secrets() {
        let debug_output = format!("{:?}", checkout_config());
        assert!(debug_output.contains("api.stripe.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("sk_test_super_secret_provider_key"));
    }

    #[test]
    fn test_webhook_config_debug_redacts_secrets() {
        let config = WebhookConfig {
            secret: SecretString::from("whsec_do_not_print"),
            tolerance: Duration::from_secs(300),
        };
        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("whsec_do_not_print"));
    }

    #[test]
    fn test_socket_addr() {
        let config = MercatoConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: Url::parse("http://localhost:3000").unwrap(),
            auth_secret: SecretString::from("x".repeat(32)),
            checkout: checkout_config(),
            webhook: WebhookConfig {
                secret: SecretString::from("whsec_test"),
                tolerance: Duration::from_secs(300),
            },
            sentry_dsn: None,
            sentry_environment: None,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }
}
