//! Job ledger database configuration

use crate::{get_env_or_default, parse_env, ConfigError, ConfigResult};

/// Default location of the SQLite job ledger, relative to the working directory
const DEFAULT_DATABASE_URL: &str = "sqlite://data/chorus.db";

/// SQLite database configuration for the job ledger
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Connection URL (e.g., sqlite://data/chorus.db)
    pub url: String,

    /// Maximum number of pooled connections
    pub max_connections: u32,

    /// How long a writer waits on a locked database, in seconds
    pub busy_timeout_secs: u64,

    /// How long to wait for a free pooled connection, in seconds
    pub acquire_timeout_secs: u64,
}

impl DatabaseConfig {
    /// Load database configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let config = Self {
            url: get_env_or_default("DATABASE_URL", DEFAULT_DATABASE_URL),
            max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 5)?,
            busy_timeout_secs: parse_env("DATABASE_BUSY_TIMEOUT", 5)?,
            acquire_timeout_secs: parse_env("DATABASE_ACQUIRE_TIMEOUT", 30)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration with a custom URL (useful for testing)
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Create a configuration pointing at a database file on disk
    pub fn for_file(path: impl AsRef<std::path::Path>) -> Self {
        Self::with_url(format!("sqlite://{}", path.as_ref().display()))
    }

    fn validate(&self) -> ConfigResult<()> {
        if !self.url.starts_with("sqlite:") {
            return Err(ConfigError::InvalidValue(
                "DATABASE_URL".to_string(),
                format!("expected a sqlite: URL, got '{}'", self.url),
            ));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "DATABASE_MAX_CONNECTIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 5,
            busy_timeout_secs: 5,
            acquire_timeout_secs: 30,
        }
    }
}
