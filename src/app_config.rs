//! Application configuration from file and environment variables
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Environment variables (prefixed with CAMPUS_, sections split by `__`)
//! 2. Config file (config.toml)
//! 3. Default values
//!
//! Secrets like the JWT signing key should be kept in environment variables,
//! not in the config file.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Worker count. None uses the actix default (one per core).
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            workers: None,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL. DATABASE_URL takes precedence when set.
    pub url: String,
    pub max_connections: u32,
    /// Create missing tables and indexes on startup
    pub create_schema: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://campus.db?mode=rwc".to_string(),
            max_connections: 10,
            create_schema: true,
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC key for bearer tokens (should be in env var CAMPUS_AUTH__JWT_SECRET).
    /// Empty means a random key is generated at startup.
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    /// Email domain required at registration
    pub institutional_domain: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_days: 7,
            institutional_domain: "ada.edu.az".to_string(),
        }
    }
}

/// Listing and cache limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub default_page_size: u64,
    pub max_page_size: u64,
    pub rating_cache_ttl_seconds: u64,
    pub rating_cache_capacity: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
            rating_cache_ttl_seconds: 60,
            rating_cache_capacity: 10_000,
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub limits: LimitsConfig,
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &str) -> Result<Self, ConfigError> {
        use config::FileFormat;

        let config = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::new(path, FileFormat::Toml).required(false))
            // e.g., CAMPUS_AUTH__JWT_SECRET, CAMPUS_SERVER__BIND
            .add_source(
                Environment::with_prefix("CAMPUS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Database URL, preferring the DATABASE_URL environment variable.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| self.database.url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.auth.token_ttl_days, 7);
        assert_eq!(config.auth.institutional_domain, "ada.edu.az");
        assert_eq!(config.limits.default_page_size, 20);
        assert_eq!(config.limits.max_page_size, 100);
        assert!(config.database.create_schema);
    }

    #[test]
    fn test_jwt_secret_empty_by_default() {
        let config = AppConfig::default();
        assert!(config.auth.jwt_secret.is_empty());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut temp_file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[server]
bind = "127.0.0.1:9000"
workers = 2

[auth]
token_ttl_days = 1
institutional_domain = "uni.example.edu"

[limits]
default_page_size = 50
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(temp_file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.server.bind, "127.0.0.1:9000");
        assert_eq!(config.server.workers, Some(2));
        assert_eq!(config.auth.token_ttl_days, 1);
        assert_eq!(config.auth.institutional_domain, "uni.example.edu");
        assert_eq!(config.limits.default_page_size, 50);
        // Defaults should still apply for unspecified values
        assert_eq!(config.limits.max_page_size, 100);
        assert_eq!(config.database.max_connections, 10);
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let config = AppConfig::load_from_path("/nonexistent/config.toml").unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.auth.token_ttl_days, 7);
    }
}
