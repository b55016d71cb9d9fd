//! Media engine endpoints consumed by job executors
//!
//! The transcription, analysis and forced-alignment engines run as sidecar
//! HTTP services on the same host; they read audio from the shared asset cache.

use std::env;

use crate::{get_env_or_default, parse_env, ConfigError, ConfigResult};

/// Endpoint configuration for the media engines
#[derive(Debug, Clone)]
pub struct ServicesConfig {
    /// Whisper transcription service URL
    pub whisper_url: String,

    /// Transcription request timeout in seconds
    pub whisper_timeout_secs: u64,

    /// Audio analysis service URL (tempo, key, sections, stems)
    pub analyzer_url: String,

    /// Analysis request timeout in seconds
    pub analyzer_timeout_secs: u64,

    /// Forced-alignment refinement service URL; refinement is skipped when unset
    pub forced_aligner_url: Option<String>,

    /// Refinement timeout in seconds; on expiry the baseline alignment is kept
    pub forced_aligner_timeout_secs: u64,
}

impl ServicesConfig {
    /// Load service endpoints from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let config = Self {
            whisper_url: get_env_or_default("WHISPER_URL", "http://localhost:9000"),
            whisper_timeout_secs: parse_env("WHISPER_TIMEOUT", 900)?,
            analyzer_url: get_env_or_default("ANALYZER_URL", "http://localhost:9100"),
            analyzer_timeout_secs: parse_env("ANALYZER_TIMEOUT", 1800)?,
            forced_aligner_url: env::var("FORCED_ALIGNER_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            forced_aligner_timeout_secs: parse_env("FORCED_ALIGNER_TIMEOUT", 300)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Point every engine at the same base URL (useful for testing)
    pub fn with_base_url(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            whisper_url: url.clone(),
            whisper_timeout_secs: 30,
            analyzer_url: url.clone(),
            analyzer_timeout_secs: 30,
            forced_aligner_url: Some(url),
            forced_aligner_timeout_secs: 5,
        }
    }

    /// Get the full URL for the transcription endpoint
    pub fn transcribe_url(&self) -> String {
        format!("{}/transcribe", self.whisper_url.trim_end_matches('/'))
    }

    /// Get the full URL for the analysis endpoint
    pub fn analyze_url(&self) -> String {
        format!("{}/analyze", self.analyzer_url.trim_end_matches('/'))
    }

    /// Get the full URL for the forced-alignment endpoint, if configured
    pub fn align_url(&self) -> Option<String> {
        self.forced_aligner_url
            .as_ref()
            .map(|url| format!("{}/align", url.trim_end_matches('/')))
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.forced_aligner_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "FORCED_ALIGNER_TIMEOUT must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            whisper_url: "http://localhost:9000".to_string(),
            whisper_timeout_secs: 900,
            analyzer_url: "http://localhost:9100".to_string(),
            analyzer_timeout_secs: 1800,
            forced_aligner_url: None,
            forced_aligner_timeout_secs: 300,
        }
    }
}
