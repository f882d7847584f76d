use config::{Environment, File, FileFormat};
use log::debug;
use serde::Deserialize;
use std::path::Path;

use crate::error::{AgentError, Result};

/// Environment variable prefix. Nested keys use a double underscore,
/// e.g. `VIAIPE_CONNECTION__HOST` overrides `connection.host`.
pub const ENV_PREFIX: &str = "VIAIPE";

/// Remote API configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// URL of the monitoring endpoint to poll
    #[serde(default = "default_api_url")]
    pub url: String,
    /// Total request timeout in seconds
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            timeout_secs: default_api_timeout(),
        }
    }
}

/// Database connection configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Database host
    #[serde(default = "default_db_host")]
    pub host: String,
    /// Database port
    #[serde(default = "default_db_port")]
    pub port: u16,
    /// Database name
    #[serde(default = "default_db_name")]
    pub name: String,
    /// Database username
    #[serde(default = "default_db_user")]
    pub username: String,
    /// Database password
    #[serde(default = "default_db_password")]
    pub password: String,
    /// SSL mode
    #[serde(default)]
    pub ssl_mode: SslMode,
    /// CA certificate path
    #[serde(default)]
    pub ca_cert: Option<String>,
    /// Client certificate path
    #[serde(default)]
    pub client_cert: Option<String>,
    /// Client key path
    #[serde(default)]
    pub client_key: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_db_host(),
            port: default_db_port(),
            name: default_db_name(),
            username: default_db_user(),
            password: default_db_password(),
            ssl_mode: SslMode::default(),
            ca_cert: None,
            client_cert: None,
            client_key: None,
        }
    }
}

/// SSL mode for database connections
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    /// Disable SSL
    Disable,
    /// Allow SSL
    Allow,
    /// Prefer SSL
    Prefer,
    /// Require SSL
    Require,
    /// Verify CA
    VerifyCa,
    /// Verify full
    VerifyFull,
}

impl Default for SslMode {
    fn default() -> Self {
        SslMode::Disable
    }
}

/// Agent configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    /// Remote API to poll
    #[serde(default)]
    pub api: ApiConfig,
    /// Database connection configuration
    #[serde(default)]
    pub connection: DatabaseConfig,
    /// Target table for summary rows
    #[serde(default = "default_summary_table")]
    pub summary_table: String,
    /// Collection interval in seconds
    #[serde(default = "default_collection_interval")]
    pub collection_interval: u64,
    /// Delay between initial connection attempts in seconds
    #[serde(default = "default_connect_retry_delay")]
    pub connect_retry_delay: u64,
    /// Logging level
    #[serde(default)]
    pub log_level: LogLevel,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            connection: DatabaseConfig::default(),
            summary_table: default_summary_table(),
            collection_interval: default_collection_interval(),
            connect_retry_delay: default_connect_retry_delay(),
            log_level: LogLevel::default(),
        }
    }
}

fn default_api_url() -> String {
    "https://viaipe.rnp.br/api/norte".to_string()
}

fn default_api_timeout() -> u64 {
    30
}

fn default_db_host() -> String {
    "postgres-db".to_string()
}

fn default_db_port() -> u16 {
    5432
}

fn default_db_name() -> String {
    "viaipe_db".to_string()
}

fn default_db_user() -> String {
    "user".to_string()
}

fn default_db_password() -> String {
    "password".to_string()
}

fn default_summary_table() -> String {
    "viaipe_norte_stats".to_string()
}

fn default_collection_interval() -> u64 {
    60
}

fn default_connect_retry_delay() -> u64 {
    5
}

/// Logging level
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Error level
    Error,
    /// Warning level
    Warn,
    /// Info level
    Info,
    /// Debug level
    Debug,
    /// Trace level
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

/// Load agent configuration: struct defaults, overridden by an optional TOML
/// file, overridden by `VIAIPE`-prefixed environment variables.
pub fn load_config(path: Option<&Path>) -> Result<AgentConfig> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        if !path.exists() {
            return Err(AgentError::Config(format!(
                "Configuration file not found: {}",
                path.display()
            ))
            .into());
        }

        debug!("Loading configuration from {}", path.display());
        builder = builder
            .add_source(File::with_name(&path.to_string_lossy()).format(FileFormat::Toml));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| AgentError::Config(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| AgentError::Config(e.to_string()).into())
}
