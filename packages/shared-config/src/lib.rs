//! Shared configuration types for Chorus services
//!
//! This crate provides the configuration consumed by the job worker and the
//! clients it talks to: the SQLite job ledger, the Ollama aligner, the media
//! engine sidecars and the local asset directories.

mod database;
mod error;
mod ollama;
mod services;
mod storage;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ConfigResult};
pub use ollama::OllamaConfig;
pub use services::ServicesConfig;
pub use storage::StorageConfig;

use std::env;

/// Common configuration shared between all services
#[derive(Debug, Clone)]
pub struct CommonConfig {
    /// Job ledger database configuration
    pub database: DatabaseConfig,

    /// Ollama configuration for lyric alignment
    pub ollama: OllamaConfig,

    /// Media engine endpoints
    pub services: ServicesConfig,

    /// Cache and output directories
    pub storage: StorageConfig,

    /// Environment mode (development, staging, production)
    pub environment: Environment,
}

/// Application environment mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "staging" | "stage" => Self::Staging,
            _ => Self::Development,
        })
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Staging => write!(f, "staging"),
            Self::Production => write!(f, "production"),
        }
    }
}

impl CommonConfig {
    /// Load common configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            database: DatabaseConfig::from_env()?,
            ollama: OllamaConfig::from_env()?,
            services: ServicesConfig::from_env()?,
            storage: StorageConfig::from_env(),
            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string())
                .parse()
                .unwrap_or_default(),
        })
    }
}

/// Helper function to get an optional environment variable with a default
pub fn get_env_or_default(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Helper function to parse an environment variable into a specific type
pub fn parse_env<T>(name: &str, default: T) -> ConfigResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}
