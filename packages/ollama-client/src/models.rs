//! Request and response types for the Ollama chat API

use serde::{Deserialize, Serialize};

/// Sampling options passed through to the model
#[derive(Debug, Clone, Serialize, Default)]
pub struct GenerateOptions {
    /// Temperature (0.0 - 1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
    /// Context window size; long lyric sheets need more than the default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
    /// Fixed seed for reproducible alignments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

/// Chat message role
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A single chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: ChatRole,
    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Response format constraint understood by Ollama
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// The model must answer with a single JSON document
    Json,
}

/// Request for chat completion
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model to use
    pub model: String,
    /// Chat messages
    pub messages: Vec<ChatMessage>,
    /// Streaming is never requested; responses are read whole
    pub stream: bool,
    /// Optional output format constraint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<ResponseFormat>,
    /// Generation options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<GenerateOptions>,
}

/// Response from chat completion
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    /// The assistant's response message
    pub message: ChatMessage,
    /// Whether generation is complete
    #[serde(default)]
    pub done: bool,
    /// Why generation stopped ("stop", "length")
    #[serde(default)]
    pub done_reason: Option<String>,
    /// Tokens generated
    #[serde(default)]
    pub eval_count: Option<u32>,
}

/// Response from listing models
#[derive(Debug, Clone, Deserialize)]
pub struct ListModelsResponse {
    /// Available models
    pub models: Vec<ModelInfo>,
}

/// Information about a pulled model
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    /// Model name, including tag (e.g., "qwen2.5:7b")
    pub name: String,
}
