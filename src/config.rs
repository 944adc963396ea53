//! Application configuration loaded from environment variables.
//!
//! All values, including the token signing secrets, are read once at startup
//! and carried in an immutable struct injected through `AppState`. Nothing
//! here is mutated after `main` constructs it.

use std::env;

const DEFAULT_ACCESS_TOKEN_TTL_SECS: u64 = 15 * 60;
const DEFAULT_REFRESH_TOKEN_TTL_SECS: u64 = 10 * 24 * 60 * 60;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment variables (non-sensitive) ---
    /// Environment name ("production" flips cookie Secure and hides error detail)
    pub environment: String,
    /// Frontend URL for CORS
    pub frontend_url: String,
    /// GCP project ID for Firestore
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,

    // --- Secrets ---
    /// HS256 signing secret for access tokens (raw bytes)
    pub access_token_secret: Vec<u8>,
    /// HS256 signing secret for refresh tokens (raw bytes)
    pub refresh_token_secret: Vec<u8>,
    /// Media storage account name
    pub storage_cloud_name: String,
    /// Media storage API key
    pub storage_api_key: String,
    /// Media storage API secret
    pub storage_api_secret: String,

    // --- Token lifetimes ---
    /// Access token lifetime in seconds
    pub access_token_ttl_secs: u64,
    /// Refresh token lifetime in seconds
    pub refresh_token_ttl_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            environment: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),

            access_token_secret: env::var("ACCESS_TOKEN_SECRET")
                .map_err(|_| ConfigError::Missing("ACCESS_TOKEN_SECRET"))?
                .into_bytes(),
            refresh_token_secret: env::var("REFRESH_TOKEN_SECRET")
                .map_err(|_| ConfigError::Missing("REFRESH_TOKEN_SECRET"))?
                .into_bytes(),
            storage_cloud_name: env::var("STORAGE_CLOUD_NAME")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STORAGE_CLOUD_NAME"))?,
            storage_api_key: env::var("STORAGE_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STORAGE_API_KEY"))?,
            storage_api_secret: env::var("STORAGE_API_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STORAGE_API_SECRET"))?,

            access_token_ttl_secs: env::var("ACCESS_TOKEN_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_ACCESS_TOKEN_TTL_SECS),
            refresh_token_ttl_secs: env::var("REFRESH_TOKEN_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_REFRESH_TOKEN_TTL_SECS),
        })
    }

    /// Whether we are running in production (affects cookie attributes and
    /// error verbosity).
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            environment: "test".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            access_token_secret: b"test_access_secret_32_bytes_min!".to_vec(),
            refresh_token_secret: b"test_refresh_secret_32_bytes_ok!".to_vec(),
            storage_cloud_name: "test-cloud".to_string(),
            storage_api_key: "test_key".to_string(),
            storage_api_secret: "test_secret".to_string(),
            access_token_ttl_secs: DEFAULT_ACCESS_TOKEN_TTL_SECS,
            refresh_token_ttl_secs: DEFAULT_REFRESH_TOKEN_TTL_SECS,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
