//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MARBELLE_API_URL` - Base URL of the Marbelle backend API
//!
//! ## Optional
//! - `MARBELLE_API_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `MARBELLE_CREDENTIALS_FILE` - Path for the persistent credential store;
//!   when unset, credentials live in memory for the process lifetime

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

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
    /// Base URL of the backend API.
    pub base_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Path for the persistent credential store, if any.
    pub credentials_path: Option<PathBuf>,
}

impl ClientConfig {
    /// Create a configuration with defaults for everything but the base URL.
    #[must_use]
    pub const fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            credentials_path: None,
        }
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

        let base_url = get_required_env("MARBELLE_API_URL")?
            .parse::<Url>()
            .map_err(|e| ConfigError::InvalidEnvVar("MARBELLE_API_URL".to_owned(), e.to_string()))?;

        let timeout_secs = parse_timeout(get_optional_env("MARBELLE_API_TIMEOUT_SECS"))?;

        let credentials_path = get_optional_env("MARBELLE_CREDENTIALS_FILE").map(PathBuf::from);

        Ok(Self {
            base_url,
            timeout: Duration::from_secs(timeout_secs),
            credentials_path,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_owned()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Parse the timeout override, falling back to the default when unset.
fn parse_timeout(raw: Option<String>) -> Result<u64, ConfigError> {
    raw.map_or(Ok(DEFAULT_TIMEOUT_SECS), |value| {
        value.parse::<u64>().map_err(|e| {
            ConfigError::InvalidEnvVar("MARBELLE_API_TIMEOUT_SECS".to_owned(), e.to_string())
        })
    })
}
