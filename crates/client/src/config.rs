//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_API_URL` - Base URL of the storefront REST API
//!
//! ## Optional
//! - `STOREFRONT_CACHE_KEY` - Base64 32-byte key for the encrypted user cache
//!   (when unset, the user record is not cached locally)
//! - `STOREFRONT_DATA_DIR` - Directory for guest-local storage (default: .storefront)
//! - `STOREFRONT_SYNC_DEBOUNCE_MS` - Idle delay before pushing local changes (default: 1000)
//! - `STOREFRONT_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `STOREFRONT_NOTIFICATION_CAP` - Max notifications held in memory (default: 50)
//! - `STOREFRONT_TOAST_INTERVAL_MS` - Delay between displayed toasts (default: 3000)
//! - `STOREFRONT_TAX_RATE` - Tax as a fraction (default: 0.18)
//! - `STOREFRONT_FREE_SHIPPING_THRESHOLD` - Free shipping above this amount (default: 999)
//! - `STOREFRONT_SHIPPING_FEE` - Flat shipping fee below the threshold (default: 50)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretBox, SecretString};
use storefront_sync_core::cart::PricingPolicy;
use thiserror::Error;
use url::Url;

/// Length of the cache encryption key in bytes.
pub const CACHE_KEY_LENGTH: usize = 32;

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
    "insert",
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

/// Raw cache key material.
pub type CacheKey = SecretBox<[u8; CACHE_KEY_LENGTH]>;

/// Storefront client configuration.
#[derive(Debug)]
pub struct ClientConfig {
    /// Base URL every endpoint path is joined onto (always ends with `/`)
    pub api_url: Url,
    /// Key for the encrypted local user cache
    pub cache_key: Option<CacheKey>,
    /// Directory holding guest-local storage files
    pub data_dir: PathBuf,
    /// Idle delay before a debounced push-sync fires
    pub sync_debounce: Duration,
    /// Timeout applied to every HTTP request
    pub request_timeout: Duration,
    /// Max notifications kept in memory
    pub notification_cap: usize,
    /// Delay between consecutive toasts
    pub toast_interval: Duration,
    /// Tax and shipping rules for cart summaries
    pub pricing: PricingPolicy,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the cache key fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_url = parse_api_url(&get_required_env("STOREFRONT_API_URL")?)?;
        let cache_key = get_optional_env("STOREFRONT_CACHE_KEY")
            .map(|raw| parse_cache_key(&SecretString::from(raw), "STOREFRONT_CACHE_KEY"))
            .transpose()?;

        let defaults = PricingPolicy::default();
        let pricing = PricingPolicy {
            tax_rate: get_parsed_or("STOREFRONT_TAX_RATE", defaults.tax_rate)?,
            free_shipping_threshold: get_parsed_or(
                "STOREFRONT_FREE_SHIPPING_THRESHOLD",
                defaults.free_shipping_threshold,
            )?,
            shipping_fee: get_parsed_or("STOREFRONT_SHIPPING_FEE", defaults.shipping_fee)?,
            currency: defaults.currency,
        };
        if pricing.tax_rate < Decimal::ZERO || pricing.tax_rate > Decimal::ONE {
            return Err(ConfigError::InvalidEnvVar(
                "STOREFRONT_TAX_RATE".to_string(),
                "must be a fraction between 0 and 1".to_string(),
            ));
        }

        Ok(Self {
            api_url,
            cache_key,
            data_dir: PathBuf::from(get_env_or_default("STOREFRONT_DATA_DIR", ".storefront")),
            sync_debounce: Duration::from_millis(get_parsed_or(
                "STOREFRONT_SYNC_DEBOUNCE_MS",
                1000,
            )?),
            request_timeout: Duration::from_secs(get_parsed_or(
                "STOREFRONT_REQUEST_TIMEOUT_SECS",
                30,
            )?),
            notification_cap: get_parsed_or("STOREFRONT_NOTIFICATION_CAP", 50)?,
            toast_interval: Duration::from_millis(get_parsed_or(
                "STOREFRONT_TOAST_INTERVAL_MS",
                3000,
            )?),
            pricing,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
        })
    }

    /// Configuration with defaults for everything but the API URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `api_url` is not a valid URL.
    pub fn with_api_url(api_url: &str, data_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: parse_api_url(api_url)?,
            cache_key: None,
            data_dir: data_dir.into(),
            sync_debounce: Duration::from_millis(1000),
            request_timeout: Duration::from_secs(30),
            notification_cap: 50,
            toast_interval: Duration::from_millis(3000),
            pricing: PricingPolicy::default(),
            sentry_dsn: None,
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

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an optional environment variable, falling back to `default`.
fn get_parsed_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Parse the API base URL, making sure relative joins keep its path.
fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let mut normalized = raw.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    let url = Url::parse(&normalized).map_err(|e| {
        ConfigError::InvalidEnvVar("STOREFRONT_API_URL".to_string(), e.to_string())
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "STOREFRONT_API_URL".to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
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
    let len = s.chars().count() as f64;
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
    reject_placeholder(secret, var_name)?;
    check_entropy(secret, var_name)
}

fn reject_placeholder(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }
    Ok(())
}

fn check_entropy(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated key."
            ),
        ));
    }
    Ok(())
}

/// Decode and validate a base64 cache key.
///
/// The placeholder blocklist only applies to values that are not already a
/// well-formed key, since random base64 can contain words like `xxx`.
fn parse_cache_key(raw: &SecretString, var_name: &str) -> Result<CacheKey, ConfigError> {
    let encoded = raw.expose_secret().trim();

    let decoded = URL_SAFE_NO_PAD
        .decode(encoded.as_bytes())
        .or_else(|_| STANDARD.decode(encoded.as_bytes()));

    let key: Result<[u8; CACHE_KEY_LENGTH], ConfigError> = match decoded {
        Ok(bytes) => bytes.try_into().map_err(|bytes: Vec<u8>| {
            ConfigError::InvalidEnvVar(
                var_name.to_string(),
                format!(
                    "expected {CACHE_KEY_LENGTH} bytes after base64 decoding (got {})",
                    bytes.len()
                ),
            )
        }),
        Err(e) => Err(ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string())),
    };

    match key {
        Ok(key) => {
            check_entropy(encoded, var_name)?;
            Ok(SecretBox::new(Box::new(key)))
        }
        Err(err) => {
            validate_secret_strength(encoded, var_name)?;
            Err(err)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // 32 bytes 0..=31, URL-safe base64 without padding
    const VALID_KEY: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8";

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-cache-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength(&"A".repeat(43), "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_parse_cache_key_valid() {
        let key = parse_cache_key(&SecretString::from(VALID_KEY), "TEST_VAR").unwrap();
        assert_eq!(key.expose_secret()[31], 31);
    }

    #[test]
    fn test_parse_cache_key_allows_placeholder_words_in_random_key() {
        let key = parse_cache_key(
            &SecretString::from("AAECAwQFBgcICQoLDA0OxxxTODOUFRYXGBkaGxwdHh8"),
            "TEST_VAR",
        );
        assert!(key.is_ok());
    }

    #[test]
    fn test_parse_cache_key_rejects_placeholder_text() {
        let result = parse_cache_key(&SecretString::from("your-cache-key-here"), "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_parse_cache_key_wrong_length() {
        // 16 bytes only
        let result = parse_cache_key(
            &SecretString::from("AAECAwQFBgcICQoLDA0ODw"),
            "TEST_VAR",
        );
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar(_, _))));
    }

    #[test]
    fn test_parse_api_url_adds_trailing_slash() {
        let url = parse_api_url("https://api.shop.in/v1").unwrap();
        assert_eq!(url.as_str(), "https://api.shop.in/v1/");
        assert_eq!(url.join("cart/add").unwrap().path(), "/v1/cart/add");
    }

    #[test]
    fn test_parse_api_url_rejects_other_schemes() {
        assert!(parse_api_url("ftp://files.shop.in").is_err());
        assert!(parse_api_url("not a url").is_err());
    }

    #[test]
    fn test_with_api_url_defaults() {
        let config = ClientConfig::with_api_url("http://localhost:4000/api", "/tmp/sfs").unwrap();
        assert_eq!(config.notification_cap, 50);
        assert_eq!(config.sync_debounce, Duration::from_secs(1));
        assert_eq!(config.pricing, PricingPolicy::default());
        assert!(config.cache_key.is_none());
    }
}
