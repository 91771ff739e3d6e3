//! Application configuration from file and environment variables
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Environment variables (prefixed with NEWSROOM_)
//! 2. Config file (config.toml)
//! 3. Default values
//!
//! Secrets like the identity provider secret and the database password
//! should be kept in environment variables, not in the config file.

use config::{Config, ConfigError, Environment, File};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Global application configuration
pub static APP_CONFIG: Lazy<RwLock<AppConfig>> = Lazy::new(|| {
    RwLock::new(AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config file, using defaults: {}", e);
        AppConfig::default()
    }))
});

/// Site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub name: String,
    pub description: String,
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "Newsroom".to_string(),
            description: "News, analysis and opinion".to_string(),
            base_url: "http://localhost:8080".to_string(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Relational database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL (env var DATABASE_URL takes precedence)
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_seconds: u64,
    /// Create missing tables on startup
    pub create_schema: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://newsroom.db?mode=rwc".to_string(),
            max_connections: 10,
            connect_timeout_seconds: 8,
            create_schema: true,
        }
    }
}

/// Which store serves articles, comments and their interactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Relational,
    Document,
}

/// Content storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage backend: "relational" or "document"
    pub backend: Backend,
    /// Snapshot file for the document store. Empty keeps it in memory only.
    pub document_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Relational,
            document_path: "./newsroom-documents.json".to_string(),
        }
    }
}

/// Identity provider and session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Shared secret the identity provider presents when it opens a session
    /// (should be in env var NEWSROOM_IDENTITY_SHARED_SECRET)
    #[serde(default)]
    pub shared_secret: String,
    /// Mark the session cookie Secure (HTTPS only)
    pub secure_cookie: bool,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            shared_secret: String::new(),
            secure_cookie: false,
        }
    }
}

/// Content limits configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Articles per page on public listings
    pub page_size: u64,
    /// Articles per page on the admin listing
    pub admin_page_size: u64,
    /// Distinct reports that flag a comment
    pub report_flag_threshold: u64,
    /// Maximum comment length in characters
    pub max_comment_length: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            admin_page_size: 10,
            report_flag_threshold: 3,
            max_comment_length: 10_000,
        }
    }
}

/// Read cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Time to live for cached public lists in seconds
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_seconds: 60 }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub site: SiteConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub identity: IdentityConfig,
    pub limits: LimitsConfig,
    pub cache: CacheConfig,
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
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // Add config file (optional)
            .add_source(File::new(path, FileFormat::Toml).required(false))
            // Override with environment variables (NEWSROOM_ prefix)
            // e.g., NEWSROOM_STORAGE__BACKEND, NEWSROOM_SERVER__BIND
            .add_source(
                Environment::with_prefix("NEWSROOM")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut loaded: AppConfig = config.try_deserialize()?;

        // Conventional variables win over everything else.
        if let Ok(url) = std::env::var("DATABASE_URL") {
            loaded.database.url = url;
        }

        Ok(loaded)
    }
}

/// Initialize application configuration
///
/// Triggers the lazy load and logs the result.
pub fn init() {
    let config = get_config();
    log::info!(
        "Configuration loaded: site.name = {}, storage.backend = {:?}",
        config.site.name,
        config.storage.backend
    );
}

/// Get the current application configuration
pub fn get_config() -> AppConfig {
    APP_CONFIG.read().map(|c| c.clone()).unwrap_or_default()
}

/// Get limits configuration
pub fn limits() -> LimitsConfig {
    get_config().limits
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.site.name, "Newsroom");
        assert_eq!(config.limits.page_size, 10);
        assert_eq!(config.limits.report_flag_threshold, 3);
        assert_eq!(config.storage.backend, Backend::Relational);
    }

    #[test]
    fn test_identity_secret_empty_by_default() {
        let config = AppConfig::default();
        assert!(config.identity.shared_secret.is_empty());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut temp_file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[site]
name = "Daily Planet"
base_url = "https://planet.example.com"

[storage]
backend = "document"
document_path = "/var/lib/newsroom/docs.json"

[limits]
admin_page_size = 25
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(temp_file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.site.name, "Daily Planet");
        assert_eq!(config.site.base_url, "https://planet.example.com");
        assert_eq!(config.storage.backend, Backend::Document);
        assert_eq!(config.storage.document_path, "/var/lib/newsroom/docs.json");
        assert_eq!(config.limits.admin_page_size, 25);
        // Defaults should still apply for unspecified values
        assert_eq!(config.limits.page_size, 10);
        assert_eq!(config.server.bind, "0.0.0.0:8080");
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let config = AppConfig::load_from_path("/nonexistent/config.toml").unwrap();
        assert_eq!(config.site.name, "Newsroom");
        assert_eq!(config.limits.max_comment_length, 10_000);
    }
}
