//! Application configuration loaded from the environment.
//!
//! Mandatory settings are validated at startup; a missing or malformed
//! `ENCRYPTION_KEY`/`SECRET_KEY` is fatal and exits the process non-zero.

use serde::Deserialize;

use crate::crypto::CredentialVault;

/// Placeholder secrets that must never survive into a running deployment.
const SECRET_KEY_PLACEHOLDERS: &[&str] = &[
    "",
    "your-secret-key-here-change-in-production",
    "dev-secret-key-change-in-production",
];

/// Configuration loading/validation errors. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error(
        "ENCRYPTION_KEY is required and must be base64 of 32 bytes. \
         Generate one with: arguslm-server generate-key"
    )]
    InvalidEncryptionKey,

    #[error(
        "SECRET_KEY is required and must not be a placeholder value. \
         Generate one with: openssl rand -base64 32"
    )]
    InvalidSecretKey,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Log SQL statements at debug level
    #[serde(default)]
    pub database_echo: bool,

    /// Base64-encoded 256-bit key for the credential vault (mandatory)
    #[serde(default)]
    pub encryption_key: String,

    /// Opaque session/CSRF token (mandatory, placeholder values rejected)
    #[serde(default)]
    pub secret_key: String,

    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Default log level when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_database_url() -> String {
    "sqlite://arguslm.db?mode=rwc".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://localhost:3000".to_string(),
    ]
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from environment variables and validate it.
    pub fn from_env() -> Result<Self, ConfigError> {
        let cfg: AppConfig = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors_origins"),
            )
            .build()?
            .try_deserialize()?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate mandatory settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if CredentialVault::new(&self.encryption_key).is_err() {
            return Err(ConfigError::InvalidEncryptionKey);
        }
        if SECRET_KEY_PLACEHOLDERS.contains(&self.secret_key.as_str()) {
            return Err(ConfigError::InvalidSecretKey);
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
