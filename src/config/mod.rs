//! Configuration management
//!
//! Configuration is read from `config.yml` and can be overridden with
//! `NEWSHARBOR_*` environment variables. Every value has a default, so a
//! missing or empty file yields a working setup backed by a local SQLite file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub templates: TemplateConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin for the JSON API
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origin() -> String {
    "http://localhost:8000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL or SQLite file path
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/newsharbor.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    #[default]
    Sqlite,
    Mysql,
}

/// In-process cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entry lifetime in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Maximum number of cached entries
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_ttl() -> u64 {
    300
}

fn default_max_entries() -> u64 {
    1_000
}

/// Template configuration
///
/// Templates are compiled into the binary. A directory given here may
/// override any of them by file name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Media root; images land in `<path>/article_images`
    #[serde(default = "default_upload_path")]
    pub path: PathBuf,
    /// Maximum file size in bytes (default: 10MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Allowed image MIME types
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: default_upload_path(),
            max_file_size: default_max_file_size(),
            allowed_types: default_allowed_types(),
        }
    }
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("media")
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "image/gif".to_string(),
        "image/webp".to_string(),
    ]
}

impl UploadConfig {
    /// Check if a MIME type is allowed
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t == mime_type)
    }

    /// Get file extension for a MIME type
    pub fn get_extension(&self, mime_type: &str) -> &'static str {
        match mime_type {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => "bin",
        }
    }
}

/// Text-completion endpoint used by the article generator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Base URL; `/completions` is appended
    #[serde(default = "default_generator_base_url")]
    pub base_url: String,
    /// Bearer token. Generation is disabled when unset.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_generator_model")]
    pub model: String,
    #[serde(default = "default_generator_temperature")]
    pub temperature: f32,
    #[serde(default = "default_generator_max_tokens")]
    pub max_tokens: u32,
    /// Request timeout in seconds
    #[serde(default = "default_generator_timeout")]
    pub timeout_seconds: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: default_generator_base_url(),
            api_key: None,
            model: default_generator_model(),
            temperature: default_generator_temperature(),
            max_tokens: default_generator_max_tokens(),
            timeout_seconds: default_generator_timeout(),
        }
    }
}

fn default_generator_base_url() -> String {
    "https://api.pawan.krd/v1".to_string()
}

fn default_generator_model() -> String {
    "pai-001-light".to_string()
}

fn default_generator_temperature() -> f32 {
    0.1
}

fn default_generator_max_tokens() -> u32 {
    1024
}

fn default_generator_timeout() -> u64 {
    60
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
}

impl Config {
    /// Load configuration from file
    ///
    /// A missing or empty file yields the defaults. Invalid YAML is an error
    /// that carries the line and column.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        Ok(config)
    }

    /// Load configuration from file, then apply environment overrides
    ///
    /// Recognized variables:
    /// - NEWSHARBOR_SERVER_HOST, NEWSHARBOR_SERVER_PORT, NEWSHARBOR_SERVER_CORS_ORIGIN
    /// - NEWSHARBOR_DATABASE_DRIVER, NEWSHARBOR_DATABASE_URL
    /// - NEWSHARBOR_CACHE_TTL_SECONDS
    /// - NEWSHARBOR_TEMPLATES_PATH
    /// - NEWSHARBOR_UPLOAD_PATH
    /// - NEWSHARBOR_GENERATOR_BASE_URL, NEWSHARBOR_GENERATOR_API_KEY, NEWSHARBOR_GENERATOR_MODEL
    pub fn load_with_env(path: &Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Invalid values are ignored and the file value is kept.
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("NEWSHARBOR_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("NEWSHARBOR_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(origin) = std::env::var("NEWSHARBOR_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = origin;
        }

        if let Ok(driver) = std::env::var("NEWSHARBOR_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {}
            }
        }
        if let Ok(url) = std::env::var("NEWSHARBOR_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(ttl) = std::env::var("NEWSHARBOR_CACHE_TTL_SECONDS") {
            if let Ok(ttl) = ttl.parse::<u64>() {
                self.cache.ttl_seconds = ttl;
            }
        }

        if let Ok(path) = std::env::var("NEWSHARBOR_TEMPLATES_PATH") {
            self.templates.path = Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("NEWSHARBOR_UPLOAD_PATH") {
            self.upload.path = PathBuf::from(path);
        }

        if let Ok(base_url) = std::env::var("NEWSHARBOR_GENERATOR_BASE_URL") {
            self.generator.base_url = base_url;
        }
        if let Ok(key) = std::env::var("NEWSHARBOR_GENERATOR_API_KEY") {
            if !key.trim().is_empty() {
                self.generator.api_key = Some(key);
            }
        }
        if let Ok(model) = std::env::var("NEWSHARBOR_GENERATOR_MODEL") {
            self.generator.model = model;
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by every test that touches process environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn driver_strategy() -> impl Strategy<Value = DatabaseDriver> {
        prop_oneof![Just(DatabaseDriver::Sqlite), Just(DatabaseDriver::Mysql)]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// Serializing a config and reading it back keeps every field.
        #[test]
        fn config_yaml_roundtrip(
            host in "[a-z][a-z0-9]{0,10}",
            port in 1u16..=65535,
            driver in driver_strategy(),
            url in "[a-z][a-z0-9_/]{0,20}\\.db",
            ttl in 1u64..=86400,
            model in "[a-z][a-z0-9-]{0,15}",
        ) {
            let mut config = Config::default();
            config.server.host = host.clone();
            config.server.port = port;
            config.database.driver = driver;
            config.database.url = url.clone();
            config.cache.ttl_seconds = ttl;
            config.generator.model = model.clone();

            let yaml = serde_yaml::to_string(&config).expect("serialize");
            let parsed: Config = serde_yaml::from_str(&yaml).expect("deserialize");

            prop_assert_eq!(parsed.server.host, host);
            prop_assert_eq!(parsed.server.port, port);
            prop_assert_eq!(parsed.database.driver, driver);
            prop_assert_eq!(parsed.database.url, url);
            prop_assert_eq!(parsed.cache.ttl_seconds, ttl);
            prop_assert_eq!(parsed.generator.model, model);
        }
    }
}
