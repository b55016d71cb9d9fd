//! Error handling for the Chorus worker
//!
//! One error type covers the whole job lifecycle: submit-time validation,
//! collaborator calls made by executors, the durable store, executor panics
//! and queue lifecycle misuse. [`WorkerError::category`] exposes that taxonomy
//! so callers can decide how to react without matching every variant.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::repositories::StoreError;

/// Main worker error type
#[derive(Error, Debug)]
pub enum WorkerError {
    // ========== Validation Errors ==========
    /// Malformed or missing request fields
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Job not found
    #[error("job not found: {0}")]
    NotFound(Uuid),

    // ========== Store Errors ==========
    /// Durable ledger failure
    #[error("job store error: {0}")]
    Store(#[from] StoreError),

    // ========== Collaborator Errors ==========
    /// Local filesystem failure (asset cache, LRC output)
    #[error("filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    /// Source audio could not be fetched
    #[error("failed to fetch '{url}': {reason}")]
    AssetFetch { url: String, reason: String },

    /// Transcription stage failed
    #[error("transcription failed: {0}")]
    Transcription(String),

    /// LLM lyric alignment failed
    #[error("lyric alignment failed: {0}")]
    Alignment(String),

    /// Audio analysis failed
    #[error("audio analysis failed: {0}")]
    AudioAnalysis(String),

    /// Forced-alignment refinement failed
    #[error("refinement failed: {0}")]
    Refinement(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// External service timeout
    #[error("external service timeout: {service}")]
    ServiceTimeout { service: String },

    /// External service returned error
    #[error("external service error from {service}: {message}")]
    ServiceError { service: String, message: String },

    /// External service not reachable
    #[error("{0} unavailable")]
    ServiceUnavailable(String),

    // ========== Executor Panics ==========
    /// An executor panicked; the payload becomes the job's failure message
    #[error("executor panicked: {0}")]
    ExecutorPanic(String),

    // ========== Queue Lifecycle Errors ==========
    /// `submit` or `start` called before `initialize`
    #[error("job queue is not initialized")]
    QueueNotInitialized,

    /// `initialize` called twice
    #[error("job queue is already initialized")]
    QueueAlreadyInitialized,

    /// `start` called twice
    #[error("job queue is already started")]
    QueueAlreadyStarted,

    /// Queue has been stopped
    #[error("job queue is stopped")]
    QueueStopped,

    // ========== Configuration Errors ==========
    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    // ========== Internal Errors ==========
    /// Internal worker error (catch-all for unexpected errors)
    #[error("internal worker error: {0}")]
    Internal(String),
}

/// Error taxonomy used for logging and HTTP mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Rejected before the job is ever in flight
    Validation,
    /// A downstream engine or the filesystem failed
    Collaborator,
    /// The job ledger failed
    Store,
    /// An executor panicked
    Panic,
    /// Queue used outside its lifecycle
    Queue,
    Configuration,
    Internal,
}

impl WorkerError {
    /// Taxonomy bucket of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidPayload(_) | Self::NotFound(_) => ErrorCategory::Validation,
            Self::Store(_) => ErrorCategory::Store,
            Self::Filesystem(_)
            | Self::AssetFetch { .. }
            | Self::Transcription(_)
            | Self::Alignment(_)
            | Self::AudioAnalysis(_)
            | Self::Refinement(_)
            | Self::Http(_)
            | Self::ServiceTimeout { .. }
            | Self::ServiceError { .. }
            | Self::ServiceUnavailable(_) => ErrorCategory::Collaborator,
            Self::ExecutorPanic(_) => ErrorCategory::Panic,
            Self::QueueNotInitialized
            | Self::QueueAlreadyInitialized
            | Self::QueueAlreadyStarted
            | Self::QueueStopped => ErrorCategory::Queue,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Whether a later attempt could succeed without changing the request
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::ServiceTimeout { .. } | Self::ServiceUnavailable(_) => true,
            Self::Store(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Get a severity level for logging
    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration => ErrorSeverity::Critical,
            ErrorCategory::Store | ErrorCategory::Panic | ErrorCategory::Internal => {
                ErrorSeverity::Error
            }
            ErrorCategory::Collaborator | ErrorCategory::Queue => ErrorSeverity::Warning,
            ErrorCategory::Validation => ErrorSeverity::Info,
        }
    }

    /// Log the error with appropriate severity
    pub fn log(&self) {
        let category = self.category();
        match self.severity() {
            ErrorSeverity::Critical => tracing::error!(
                error = %self,
                category = ?category,
                transient = self.is_transient(),
                "Critical worker error"
            ),
            ErrorSeverity::Error => tracing::error!(
                error = %self,
                category = ?category,
                transient = self.is_transient(),
                "Worker error"
            ),
            ErrorSeverity::Warning => tracing::warn!(
                error = %self,
                category = ?category,
                transient = self.is_transient(),
                "Worker warning"
            ),
            ErrorSeverity::Info => tracing::info!(
                error = %self,
                category = ?category,
                "Worker info"
            ),
        }
    }

    /// Create a service error
    pub fn service_error(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ServiceError {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create an asset fetch error
    pub fn asset_fetch(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::AssetFetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidPayload(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::QueueNotInitialized | Self::QueueStopped => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidPayload(_) => "INVALID_PAYLOAD",
            Self::NotFound(_) => "NOT_FOUND",
            Self::QueueNotInitialized | Self::QueueStopped => "QUEUE_UNAVAILABLE",
            Self::Store(_) => "STORE_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }
}

/// Error severity levels for logging and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical errors that should trigger alerts
    Critical,
    /// Standard errors
    Error,
    /// Warnings for expected failures
    Warning,
    /// Informational messages
    Info,
}

/// Result type alias for worker operations
pub type WorkerResult<T> = Result<T, WorkerError>;

/// HTTP error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for client-side handling
    pub code: &'static str,
    /// Human-readable error message
    pub message: String,
}

impl IntoResponse for WorkerError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.status_code();
        // Store internals stay in the logs
        let message = match self.category() {
            ErrorCategory::Store | ErrorCategory::Internal => "internal error".to_string(),
            _ => self.to_string(),
        };
        let body = ErrorResponse {
            code: self.error_code(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

// ========== Conversion Implementations ==========

impl From<url::ParseError> for WorkerError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidPayload(format!("invalid URL: {}", err))
    }
}

impl From<serde_json::Error> for WorkerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {}", err))
    }
}

impl From<chorus_ollama_client::OllamaError> for WorkerError {
    fn from(err: chorus_ollama_client::OllamaError) -> Self {
        use chorus_ollama_client::OllamaError;

        match err {
            OllamaError::ConnectionRefused(url) => {
                Self::ServiceUnavailable(format!("Ollama at {}", url))
            }
            OllamaError::Timeout(secs) => Self::ServiceTimeout {
                service: format!("Ollama ({}s)", secs),
            },
            OllamaError::ApiError { status, message } => {
                Self::service_error("Ollama", format!("status {}: {}", status, message))
            }
            other => Self::Alignment(other.to_string()),
        }
    }
}
