//! Ollama configuration for LLM lyric alignment

use crate::{get_env_or_default, parse_env, ConfigResult};

/// Ollama service configuration
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Ollama server URL
    pub url: String,

    /// Chat model used to align transcribed phrases against lyrics
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum tokens for generation
    pub max_tokens: u32,

    /// Temperature for generation (0.0 - 1.0); alignment wants it low
    pub temperature: f32,
}

impl OllamaConfig {
    /// Load Ollama configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            url: get_env_or_default("OLLAMA_URL", "http://localhost:11434"),
            model: get_env_or_default("OLLAMA_MODEL", "qwen2.5:7b"),
            timeout_secs: parse_env("OLLAMA_TIMEOUT", 180)?,
            max_tokens: parse_env("OLLAMA_MAX_TOKENS", 4096)?,
            temperature: parse_env("OLLAMA_TEMPERATURE", 0.1)?,
        })
    }

    /// Create a configuration with a custom URL (useful for testing)
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Get the full URL for the chat endpoint
    pub fn chat_url(&self) -> String {
        format!("{}/api/chat", self.url.trim_end_matches('/'))
    }

    /// Get the full URL for the model listing endpoint
    pub fn tags_url(&self) -> String {
        format!("{}/api/tags", self.url.trim_end_matches('/'))
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".to_string(),
            model: "qwen2.5:7b".to_string(),
            timeout_secs: 180,
            max_tokens: 4096,
            temperature: 0.1,
        }
    }
}
