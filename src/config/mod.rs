//! Configuration management
//!
//! Configuration is loaded from a `config.yml` file and can be overridden
//! with `NASHR_*` environment variables. Missing values fall back to defaults.

use crate::models::Locale;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub session: SessionConfig,
    /// Credentials for the first administrator, created on startup when no admin exists
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    /// Public base URL, used for links in emails
    #[serde(default = "default_site_url")]
    pub site_url: String,
    #[serde(default = "default_site_name")]
    pub site_name: String,
    /// Locale used when a request does not ask for one
    #[serde(default)]
    pub default_locale: Locale,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            site_url: default_site_url(),
            site_name: default_site_name(),
            default_locale: Locale::default(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_site_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_site_name() -> String {
    "Nashr".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub driver: DatabaseDriver,
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
    "data/nashr.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    #[default]
    Sqlite,
    Mysql,
}

/// Outgoing email (SMTP) configuration
///
/// When `enabled` is false, notification emails are only logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: String,
    #[serde(default)]
    pub smtp_password: String,
    #[serde(default = "default_from_address")]
    pub from_address: String,
    #[serde(default = "default_site_name")]
    pub from_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_address: default_from_address(),
            from_name: default_site_name(),
        }
    }
}

fn default_smtp_port() -> u16 {
    465
}

fn default_from_address() -> String {
    "noreply@localhost".to_string()
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_upload_path")]
    pub path: PathBuf,
    /// Maximum cover image size in bytes (default: 5MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
    /// Maximum article attachment size in bytes (default: 20MB)
    #[serde(default = "default_max_attachment_size")]
    pub max_attachment_size: u64,
    /// Accepted attachment file extensions, lowercase
    #[serde(default = "default_attachment_extensions")]
    pub attachment_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: default_upload_path(),
            max_file_size: default_max_file_size(),
            allowed_types: default_allowed_types(),
            max_attachment_size: default_max_attachment_size(),
            attachment_extensions: default_attachment_extensions(),
        }
    }
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("media")
}

fn default_max_file_size() -> u64 {
    5 * 1024 * 1024
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "image/gif".to_string(),
        "image/webp".to_string(),
    ]
}

fn default_max_attachment_size() -> u64 {
    20 * 1024 * 1024
}

fn default_attachment_extensions() -> Vec<String> {
    vec!["pdf".to_string(), "doc".to_string(), "docx".to_string()]
}

impl UploadConfig {
    /// Lowercased extension of `filename` when it is an accepted attachment type
    pub fn attachment_extension(&self, filename: &str) -> Option<String> {
        let (_, ext) = filename.rsplit_once('.')?;
        let ext = ext.to_lowercase();
        self.attachment_extensions
            .iter()
            .any(|allowed| *allowed == ext)
            .then_some(ext)
    }

    /// Check if a MIME type is allowed
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t == mime_type)
    }

    /// File extension for an allowed MIME type
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

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_days")]
    pub expiration_days: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiration_days: default_session_days(),
        }
    }
}

fn default_session_days() -> i64 {
    7
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub admin_username: Option<String>,
    #[serde(default)]
    pub admin_email: Option<String>,
    #[serde(default)]
    pub admin_password: Option<String>,
}

impl BootstrapConfig {
    /// Returns (username, email, password) when all three are configured
    pub fn admin_credentials(&self) -> Option<(&str, &str, &str)> {
        match (&self.admin_username, &self.admin_email, &self.admin_password) {
            (Some(u), Some(e), Some(p)) if !u.is_empty() && !p.is_empty() => {
                Some((u.as_str(), e.as_str(), p.as_str()))
            }
            _ => None,
        }
    }
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
    /// A missing or empty file yields the default configuration.
    /// Invalid YAML is reported with line and column.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
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
    /// - NASHR_SERVER_HOST, NASHR_SERVER_PORT, NASHR_SERVER_CORS_ORIGIN
    /// - NASHR_SERVER_SITE_URL, NASHR_SERVER_DEFAULT_LOCALE
    /// - NASHR_DATABASE_DRIVER, NASHR_DATABASE_URL
    /// - NASHR_EMAIL_ENABLED, NASHR_EMAIL_SMTP_HOST, NASHR_EMAIL_SMTP_PORT
    /// - NASHR_EMAIL_SMTP_USERNAME, NASHR_EMAIL_SMTP_PASSWORD
    /// - NASHR_UPLOAD_PATH
    /// - NASHR_ADMIN_USERNAME, NASHR_ADMIN_EMAIL, NASHR_ADMIN_PASSWORD
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("NASHR_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("NASHR_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("NASHR_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }
        if let Ok(site_url) = std::env::var("NASHR_SERVER_SITE_URL") {
            self.server.site_url = site_url;
        }
        if let Ok(locale) = std::env::var("NASHR_SERVER_DEFAULT_LOCALE") {
            if let Ok(locale) = locale.parse::<Locale>() {
                self.server.default_locale = locale;
            }
        }

        if let Ok(driver) = std::env::var("NASHR_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {}
            }
        }
        if let Ok(url) = std::env::var("NASHR_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(enabled) = std::env::var("NASHR_EMAIL_ENABLED") {
            if let Ok(enabled) = enabled.parse::<bool>() {
                self.email.enabled = enabled;
            }
        }
        if let Ok(host) = std::env::var("NASHR_EMAIL_SMTP_HOST") {
            self.email.smtp_host = host;
        }
        if let Ok(port) = std::env::var("NASHR_EMAIL_SMTP_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.email.smtp_port = port;
            }
        }
        if let Ok(username) = std::env::var("NASHR_EMAIL_SMTP_USERNAME") {
            self.email.smtp_username = username;
        }
        if let Ok(password) = std::env::var("NASHR_EMAIL_SMTP_PASSWORD") {
            self.email.smtp_password = password;
        }

        if let Ok(path) = std::env::var("NASHR_UPLOAD_PATH") {
            self.upload.path = PathBuf::from(path);
        }

        if let Ok(username) = std::env::var("NASHR_ADMIN_USERNAME") {
            self.bootstrap.admin_username = Some(username);
        }
        if let Ok(email) = std::env::var("NASHR_ADMIN_EMAIL") {
            self.bootstrap.admin_email = Some(email);
        }
        if let Ok(password) = std::env::var("NASHR_ADMIN_PASSWORD") {
            self.bootstrap.admin_password = Some(password);
        }
    }
}

/// Format YAML parsing error with location
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

#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
