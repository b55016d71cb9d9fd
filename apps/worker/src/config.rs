//! Worker configuration loaded from environment variables
//!
//! Shared settings (database, Ollama, media engines, directories) come from
//! `chorus-shared-config`; this module adds the queue and HTTP settings that
//! only the worker needs.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chorus_shared_config::{
    get_env_or_default, parse_env, CommonConfig, DatabaseConfig, Environment, OllamaConfig,
    ServicesConfig, StorageConfig,
};

use crate::queue::QueueConfig;

/// Worker configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Common configuration shared with the other Chorus services
    pub common: CommonConfig,

    /// Address the HTTP surface binds to
    pub bind_addr: SocketAddr,

    /// Concurrent analysis jobs
    pub max_concurrent_analysis: usize,

    /// Concurrent synced-lyrics jobs
    pub max_concurrent_lrc: usize,

    /// Terminal jobs older than this many days are purged at startup
    pub retention_days: u64,

    /// Seconds `stop()` waits for in-flight jobs
    pub shutdown_grace_secs: u64,

    /// Seconds a finished job stays in the in-memory index
    pub index_eviction_secs: u64,

    /// Seconds between index sweeps
    pub index_sweep_interval_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let common = CommonConfig::from_env().context("Failed to load shared config")?;

        let config = Self {
            common,
            bind_addr: get_env_or_default("WORKER_BIND_ADDR", "0.0.0.0:8090")
                .parse()
                .context("Invalid WORKER_BIND_ADDR value")?,
            max_concurrent_analysis: parse_env("WORKER_MAX_CONCURRENT_ANALYSIS", 1)?,
            max_concurrent_lrc: parse_env("WORKER_MAX_CONCURRENT_LRC", 1)?,
            retention_days: parse_env("JOB_RETENTION_DAYS", 7)?,
            shutdown_grace_secs: parse_env("WORKER_SHUTDOWN_GRACE", 30)?,
            index_eviction_secs: parse_env("JOB_INDEX_EVICTION", 300)?,
            index_sweep_interval_secs: parse_env("JOB_INDEX_SWEEP_INTERVAL", 60)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_concurrent_analysis == 0 {
            bail!("WORKER_MAX_CONCURRENT_ANALYSIS must be at least 1");
        }
        if self.max_concurrent_lrc == 0 {
            bail!("WORKER_MAX_CONCURRENT_LRC must be at least 1");
        }
        if self.index_sweep_interval_secs == 0 {
            bail!("JOB_INDEX_SWEEP_INTERVAL must be greater than zero");
        }
        Ok(())
    }

    /// Queue settings derived from this configuration
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            max_concurrent_analysis: self.max_concurrent_analysis,
            max_concurrent_lrc: self.max_concurrent_lrc,
            retention: Duration::from_secs(self.retention_days * 24 * 60 * 60),
            shutdown_grace: Duration::from_secs(self.shutdown_grace_secs),
            index_eviction_grace: Duration::from_secs(self.index_eviction_secs),
            index_sweep_interval: Duration::from_secs(self.index_sweep_interval_secs),
        }
    }

    /// Get database configuration
    pub fn database(&self) -> &DatabaseConfig {
        &self.common.database
    }

    /// Get Ollama configuration
    pub fn ollama(&self) -> &OllamaConfig {
        &self.common.ollama
    }

    /// Get media engine configuration
    pub fn services(&self) -> &ServicesConfig {
        &self.common.services
    }

    /// Get cache and output directories
    pub fn storage(&self) -> &StorageConfig {
        &self.common.storage
    }

    /// Get environment mode
    pub fn environment(&self) -> Environment {
        self.common.environment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKER_VARS: [&str; 7] = [
        "WORKER_BIND_ADDR",
        "WORKER_MAX_CONCURRENT_ANALYSIS",
        "WORKER_MAX_CONCURRENT_LRC",
        "JOB_RETENTION_DAYS",
        "WORKER_SHUTDOWN_GRACE",
        "JOB_INDEX_EVICTION",
        "JOB_INDEX_SWEEP_INTERVAL",
    ];

    #[test]
    fn test_defaults() {
        temp_env::with_vars_unset(WORKER_VARS, || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.bind_addr, "0.0.0.0:8090".parse().unwrap());
            assert_eq!(config.max_concurrent_analysis, 1);
            assert_eq!(config.max_concurrent_lrc, 1);
            assert_eq!(config.retention_days, 7);
            assert_eq!(config.shutdown_grace_secs, 30);
        });
    }

    #[test]
    fn test_overrides() {
        temp_env::with_vars(
            [
                ("WORKER_BIND_ADDR", Some("127.0.0.1:9000")),
                ("WORKER_MAX_CONCURRENT_ANALYSIS", Some("3")),
                ("WORKER_MAX_CONCURRENT_LRC", Some("2")),
                ("JOB_RETENTION_DAYS", Some("30")),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.bind_addr.port(), 9000);
                assert_eq!(config.max_concurrent_analysis, 3);
                assert_eq!(config.max_concurrent_lrc, 2);
                assert_eq!(config.retention_days, 30);
            },
        );
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        temp_env::with_var("WORKER_MAX_CONCURRENT_LRC", Some("0"), || {
            let err = Config::from_env().unwrap_err();
            assert!(err.to_string().contains("WORKER_MAX_CONCURRENT_LRC"));
        });
    }

    #[test]
    fn test_invalid_number_rejected() {
        temp_env::with_var("JOB_RETENTION_DAYS", Some("a week"), || {
            assert!(Config::from_env().is_err());
        });
    }

    #[test]
    fn test_invalid_bind_addr_rejected() {
        temp_env::with_var("WORKER_BIND_ADDR", Some("localhost"), || {
            assert!(Config::from_env().is_err());
        });
    }

    #[test]
    fn test_queue_config_durations() {
        temp_env::with_vars(
            [
                ("JOB_RETENTION_DAYS", Some("7")),
                ("WORKER_SHUTDOWN_GRACE", Some("5")),
            ],
            || {
                let queue = Config::from_env().unwrap().queue_config();
                assert_eq!(queue.retention, Duration::from_secs(7 * 86_400));
                assert_eq!(queue.shutdown_grace, Duration::from_secs(5));
            },
        );
    }
}
