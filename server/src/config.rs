//! Configuration management for the server.

use autoinc_engine::DEFAULT_COUNTER_NAME;
use std::env;
use std::path::PathBuf;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Upper bound on pooled database connections
    pub max_connections: u32,
    /// Bearer token required on every request when set
    pub auth_secret: Option<String>,
    /// Counter collection the auto-increment plugin writes to
    pub counter_name: String,
    /// JSON file holding the collection schemas
    pub schema_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidMaxConnections)?;

        let auth_secret = env::var("AUTH_SECRET").ok();

        let counter_name = env::var("COUNTER_NAME")
            .ok()
            .map(|name| name.trim().to_string())
            .unwrap_or_else(|| DEFAULT_COUNTER_NAME.to_string());
        if counter_name.is_empty() {
            return Err(ConfigError::EmptyCounterName);
        }

        let schema_path = env::var("SCHEMA_PATH").ok().map(PathBuf::from);

        Ok(Self {
            host,
            port,
            database_url,
            max_connections,
            auth_secret,
            counter_name,
            schema_path,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL environment variable is required")]
    MissingDatabaseUrl,

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid DATABASE_MAX_CONNECTIONS value")]
    InvalidMaxConnections,

    #[error("COUNTER_NAME must not be empty")]
    EmptyCounterName,

    #[error("Failed to read schema file: {0}")]
    SchemaRead(#[from] std::io::Error),

    #[error("Invalid schema file: {0}")]
    SchemaParse(#[from] serde_json::Error),
}
