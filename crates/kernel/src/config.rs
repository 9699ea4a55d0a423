//! Configuration loaded from environment variables.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

/// Fallback cron key; a warning is logged when it is in use.
pub const DEFAULT_CRON_KEY: &str = "default-cron-key";

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// PostgreSQL connection URL. When unset the in-memory store is used.
    pub database_url: Option<String>,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Secret path segment for `POST /cron/{key}`.
    pub cron_key: String,

    /// Whether pages without a workflow row need approval before publishing
    /// (default: false).
    pub require_approval_by_default: bool,

    /// Default number of versions per listing page (default: 50).
    pub version_page_size: i64,

    /// Upper bound on a requested listing page size (default: 200).
    pub max_version_page_size: i64,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,

    /// Per-request timeout for the HTTP API (default: 30 seconds).
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: None,
            database_max_connections: 10,
            cron_key: DEFAULT_CRON_KEY.to_string(),
            require_approval_by_default: false,
            version_page_size: 50,
            max_version_page_size: 200,
            cors_allowed_origins: vec!["*".to_string()],
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let cron_key = env::var("CRON_KEY").unwrap_or_else(|_| DEFAULT_CRON_KEY.to_string());

        let require_approval_by_default = parse_bool(
            &env::var("REQUIRE_APPROVAL_BY_DEFAULT").unwrap_or_else(|_| "false".to_string()),
        )
        .context("REQUIRE_APPROVAL_BY_DEFAULT must be true or false")?;

        let version_page_size: i64 = env::var("VERSION_PAGE_SIZE")
            .unwrap_or_else(|_| "50".to_string())
            .parse()
            .context("VERSION_PAGE_SIZE must be a valid integer")?;

        let max_version_page_size: i64 = env::var("MAX_VERSION_PAGE_SIZE")
            .unwrap_or_else(|_| "200".to_string())
            .parse()
            .context("MAX_VERSION_PAGE_SIZE must be a valid integer")?;

        if version_page_size < 1 || max_version_page_size < version_page_size {
            anyhow::bail!(
                "VERSION_PAGE_SIZE must be at least 1 and not exceed MAX_VERSION_PAGE_SIZE"
            );
        }

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|_| vec!["*".to_string()]);

        let request_timeout_secs: u64 = env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .context("REQUEST_TIMEOUT_SECS must be a valid u64")?;

        Ok(Self {
            port,
            database_url,
            database_max_connections,
            cron_key,
            require_approval_by_default,
            version_page_size,
            max_version_page_size,
            cors_allowed_origins,
            request_timeout: Duration::from_secs(request_timeout_secs),
        })
    }

    /// Clamp a requested listing size to the configured bounds.
    pub fn page_size(&self, requested: Option<i64>) -> i64 {
        requested
            .unwrap_or(self.version_page_size)
            .clamp(1, self.max_version_page_size)
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("invalid boolean {other:?}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool("TRUE").unwrap());
        assert!(parse_bool(" yes ").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn page_size_clamps() {
        let config = Config::default();
        assert_eq!(config.page_size(None), 50);
        assert_eq!(config.page_size(Some(0)), 1);
        assert_eq!(config.page_size(Some(10_000)), 200);
        assert_eq!(config.page_size(Some(25)), 25);
    }
}
