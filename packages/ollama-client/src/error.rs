//! Error types for Ollama client

use thiserror::Error;

/// Errors that can occur when talking to Ollama
#[derive(Error, Debug)]
pub enum OllamaError {
    /// Transport-level failure that is neither a refused connection nor a timeout
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Request or response body could not be (de)serialized
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Ollama answered with a non-success status
    #[error("Ollama API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Model not found or not pulled
    #[error("Model not found: {0}. Try running 'ollama pull {0}'")]
    ModelNotFound(String),

    /// Request timeout
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// The model answered, but not with the structure that was asked for
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Connection refused (Ollama not running)
    #[error("Connection refused. Is Ollama running at {0}?")]
    ConnectionRefused(String),

    /// All retry attempts exhausted
    #[error("All {attempts} retry attempts failed. Last error: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl OllamaError {
    /// Transient failures worth another attempt: timeouts, refused
    /// connections, transport errors and 5xx answers
    pub fn is_retryable(&self) -> bool {
        match self {
            OllamaError::Timeout(_)
            | OllamaError::ConnectionRefused(_)
            | OllamaError::HttpError(_) => true,
            OllamaError::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether the service could not be reached at all
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            OllamaError::ConnectionRefused(_) | OllamaError::RetriesExhausted { .. }
        )
    }
}

/// Result type for Ollama operations
pub type OllamaResult<T> = Result<T, OllamaError>;
