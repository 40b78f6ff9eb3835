//! Application configuration loaded from environment variables.
//!
//! All configuration is loaded from environment variables, with a `.env`
//! file picked up when present. Two values have no default and must be set:
//!
//! - `STATIC_RESOURCES_PATH`: root directory holding `template/`, `js/` and `css/`
//! - `SUNLIGHT_API_KEY`: key sent to the Sunlight Congress API
//!
//! # Request Logging
//!
//! - `LOG_FILE_PATH`: file receiving the per-request log blocks (default: stderr)
//!
//! # Proxies
//!
//! - `TRUSTED_PROXIES`: comma-separated CIDR list whose forwarded headers are
//!   honored when resolving the client address (default: empty, trust all)

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Default Sunlight Congress API root.
pub const DEFAULT_SUNLIGHT_BASE_URL: &str = "https://congress.api.sunlightfoundation.com";

/// Roll rendered on the index page when `ROLL_ID` is not set.
pub const DEFAULT_ROLL_ID: &str = "s396-2009";

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 8080)
    pub port: u16,

    /// Root of the static resources tree (required)
    pub static_resources_path: PathBuf,

    // =========================================================================
    // Request Log Configuration
    // =========================================================================
    /// File receiving request log blocks; `None` writes to stderr
    pub log_file_path: Option<PathBuf>,

    // =========================================================================
    // Sunlight API Configuration
    // =========================================================================
    /// API key sent as `X-APIKEY` (required)
    pub sunlight_api_key: String,

    /// API root, without trailing slash
    pub sunlight_base_url: String,

    /// Timeout for a single API request (default: 10 seconds)
    pub sunlight_timeout: Duration,

    /// Roll shown on the index page (default: "s396-2009")
    pub roll_id: String,

    // =========================================================================
    // Security Configuration
    // =========================================================================
    /// Trusted proxy CIDR ranges.
    ///
    /// `X-Forwarded-For` and `X-Real-IP` are only honored when the connection
    /// originates from one of these networks. Empty means every peer is trusted.
    pub trusted_proxies: Vec<String>,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log level (e.g., "info", "debug", "trace")
    pub log_level: String,

    /// Port for Prometheus metrics endpoint (default: 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if a required variable is missing or a
    /// value is invalid (e.g., non-numeric PORT value).
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let config = Self {
            // Server
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 8080)?,
            static_resources_path: PathBuf::from(Self::required_env("STATIC_RESOURCES_PATH")?),

            // Request log
            log_file_path: env::var("LOG_FILE_PATH")
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),

            // Sunlight
            sunlight_api_key: Self::required_env("SUNLIGHT_API_KEY")?,
            sunlight_base_url: env::var("SUNLIGHT_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_SUNLIGHT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            sunlight_timeout: Duration::from_secs(Self::parse_env("SUNLIGHT_TIMEOUT_SECS", 10)?),
            roll_id: env::var("ROLL_ID")
                .ok()
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| DEFAULT_ROLL_ID.to_string()),

            // Security
            trusted_proxies: Self::parse_trusted_proxies(),

            // Observability
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            metrics_port: Self::parse_env("METRICS_PORT", 0)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if validation fails.
    pub fn validate(&self) -> AppResult<()> {
        if self.sunlight_api_key.trim().is_empty() {
            return Err(AppError::ConfigError(
                "SUNLIGHT_API_KEY must not be empty".to_string(),
            ));
        }

        if self.static_resources_path.as_os_str().is_empty() {
            return Err(AppError::ConfigError(
                "STATIC_RESOURCES_PATH must not be empty".to_string(),
            ));
        }

        if self.sunlight_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "SUNLIGHT_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if !(self.sunlight_base_url.starts_with("http://")
            || self.sunlight_base_url.starts_with("https://"))
        {
            return Err(AppError::ConfigError(format!(
                "SUNLIGHT_BASE_URL must start with http:// or https:// (got {})",
                self.sunlight_base_url
            )));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if trusted proxy validation is enabled.
    pub fn proxy_validation_enabled(&self) -> bool {
        !self.trusted_proxies.is_empty()
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_enabled()
            .then(|| SocketAddr::from(([0, 0, 0, 0], self.metrics_port)))
    }

    /// Directory holding the page templates.
    pub fn template_dir(&self) -> PathBuf {
        self.static_resources_path.join("template")
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    fn required_env(name: &str) -> AppResult<String> {
        env::var(name).map_err(|_| AppError::ConfigError(format!("{name} is required")))
    }

    /// Parse trusted proxy CIDR ranges from environment variable.
    ///
    /// Format: Comma-separated CIDR notation (e.g., "10.0.0.0/8,172.16.0.0/12")
    fn parse_trusted_proxies() -> Vec<String> {
        env::var("TRUSTED_PROXIES")
            .ok()
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Configuration for tests and local development.
///
/// The API key is a placeholder; production deployments use `Config::from_env()`.
impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            static_resources_path: PathBuf::from("static"),
            log_file_path: None,
            sunlight_api_key: "development".to_string(),
            sunlight_base_url: DEFAULT_SUNLIGHT_BASE_URL.to_string(),
            sunlight_timeout: Duration::from_secs(10),
            roll_id: DEFAULT_ROLL_ID.to_string(),
            trusted_proxies: vec![], // Empty = trust all
            log_level: "info".to_string(),
            metrics_port: 0,
        }
    }
}
