//! Server Configuration
//!
//! All settings come from `PORTAL_*` environment variables. Only the JWT
//! secret is mandatory; everything else has a sensible default.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address
    pub bind_addr: String,
    /// Root directory for the database, vault, index and audit log
    pub data_dir: PathBuf,
    /// JWT signing secret, at least 32 bytes
    pub jwt_secret: String,
    /// Session token lifetime in hours
    pub token_ttl_hours: i64,
    /// Registration code that bypasses the invite store, if configured
    pub invite_bypass_code: Option<String>,
    /// Upload size cap in bytes
    pub max_upload_bytes: usize,
    /// Password for the bootstrap superuser created on an empty database
    pub bootstrap_super_password: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret =
            std::env::var("PORTAL_JWT_SECRET").map_err(|_| ConfigError::MissingVar("PORTAL_JWT_SECRET"))?;

        Ok(Self {
            bind_addr: env_or("PORTAL_BIND_ADDR", "127.0.0.1:8080"),
            data_dir: PathBuf::from(env_or("PORTAL_DATA_DIR", "data")),
            jwt_secret,
            token_ttl_hours: parse_var("PORTAL_TOKEN_TTL_HOURS", 12)?,
            invite_bypass_code: std::env::var("PORTAL_INVITE_BYPASS_CODE")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            max_upload_bytes: parse_var("PORTAL_MAX_UPLOAD_BYTES", 50 * 1024 * 1024)?,
            bootstrap_super_password: std::env::var("PORTAL_BOOTSTRAP_SUPER_PASSWORD").ok(),
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("users.db")
    }

    pub fn files_dir(&self) -> PathBuf {
        self.data_dir.join("files")
    }

    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join("file_index.json")
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.data_dir.join("audit.log")
    }
}

fn env_or(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            var,
            value: raw.clone(),
        }),
        Err(_) => Ok(default),
    }
}
