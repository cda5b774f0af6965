//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `TIENDA_API_BASE_URL` - Origin of the REST API (e.g. `http://localhost:5000`)
//!
//! ## Optional
//! - `TIENDA_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 5, range 1-120)
//! - `TIENDA_SESSION_FILE` - Session file path (default: `$HOME/.tienda/session.json`)
//! - `TIENDA_CATALOG_CACHE_TTL_SECS` - Product cache lifetime (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_TIMEOUT_SECS: u64 = 5;
const MAX_TIMEOUT_SECS: u64 = 120;
const DEFAULT_CATALOG_TTL_SECS: u64 = 300;
const SESSION_DIR: &str = ".tienda";
const SESSION_FILE: &str = "session.json";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API origin, always ending in `/` so relative paths join beneath it
    pub api_base_url: Url,
    /// Timeout applied to every request; exceeding it is a network failure
    pub request_timeout: Duration,
    /// Where the session is persisted
    pub session_file: PathBuf,
    /// Lifetime of cached catalog responses
    pub catalog_cache_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl ClientConfig {
    /// Configuration with defaults for everything but the API origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `base_url` is not an absolute
    /// `http`/`https` URL.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_base_url: parse_base_url("TIENDA_API_BASE_URL", base_url)?,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            session_file: default_session_file(),
            catalog_cache_ttl: Duration::from_secs(DEFAULT_CATALOG_TTL_SECS),
            sentry_dsn: None,
            sentry_environment: None,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_base_url =
            parse_base_url("TIENDA_API_BASE_URL", &get_required_env("TIENDA_API_BASE_URL")?)?;

        let timeout_secs = parse_secs("TIENDA_REQUEST_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        if !(1..=MAX_TIMEOUT_SECS).contains(&timeout_secs) {
            return Err(ConfigError::InvalidEnvVar(
                "TIENDA_REQUEST_TIMEOUT_SECS".to_string(),
                format!("must be between 1 and {MAX_TIMEOUT_SECS} (got {timeout_secs})"),
            ));
        }

        let session_file =
            get_optional_env("TIENDA_SESSION_FILE").map_or_else(default_session_file, PathBuf::from);
        let catalog_ttl = parse_secs("TIENDA_CATALOG_CACHE_TTL_SECS", DEFAULT_CATALOG_TTL_SECS)?;

        Ok(Self {
            api_base_url,
            request_timeout: Duration::from_secs(timeout_secs),
            session_file,
            catalog_cache_ttl: Duration::from_secs(catalog_ttl),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Builder-style timeout override.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Builder-style session file override.
    #[must_use]
    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = path.into();
        self
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a whole number of seconds with a default.
fn parse_secs(key: &str, default: u64) -> Result<u64, ConfigError> {
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Parse the API origin and make sure it ends with a slash.
fn parse_base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let mut url =
        Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// `$HOME/.tienda/session.json`, or a relative path when `HOME` is unset.
fn default_session_file() -> PathBuf {
    get_optional_env("HOME")
        .map_or_else(|| PathBuf::from(SESSION_DIR), |home| PathBuf::from(home).join(SESSION_DIR))
        .join(SESSION_FILE)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let url = parse_base_url("X", "http://localhost:5000").unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/");

        let nested = parse_base_url("X", "https://shop.example/tienda").unwrap();
        assert_eq!(nested.as_str(), "https://shop.example/tienda/");
        assert_eq!(
            nested.join("api/cart/").unwrap().as_str(),
            "https://shop.example/tienda/api/cart/"
        );
    }

    #[test]
    fn test_base_url_rejects_other_schemes() {
        let err = parse_base_url("X", "ftp://example.com").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
        assert!(parse_base_url("X", "not a url").is_err());
    }

    #[test]
    fn test_new_uses_defaults() {
        let config = ClientConfig::new("http://127.0.0.1:8080").unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.catalog_cache_ttl, Duration::from_secs(300));
        assert!(config.session_file.ends_with(".tienda/session.json"));
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let config = ClientConfig::new("http://127.0.0.1:8080")
            .unwrap()
            .with_timeout(Duration::from_millis(250))
            .with_session_file("/tmp/tienda-test.json");
        assert_eq!(config.request_timeout, Duration::from_millis(250));
        assert_eq!(config.session_file, PathBuf::from("/tmp/tienda-test.json"));
    }

    #[test]
    fn test_missing_env_var_message() {
        let err = get_required_env("TIENDA_TEST_SURELY_UNSET_VARIABLE").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing environment variable: TIENDA_TEST_SURELY_UNSET_VARIABLE"
        );
    }
}
