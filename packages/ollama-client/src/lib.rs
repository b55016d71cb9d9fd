//! Ollama API client for Chorus lyric alignment
//!
//! The worker uses a local chat model to line transcribed phrases up against
//! authoritative lyrics. Answers are requested in Ollama's JSON mode and
//! decoded into caller-defined types.
//!
//! `OllamaClient` is `Clone + Send + Sync` and shares one HTTP connection pool.
//!
//! # Example
//!
//! ```no_run
//! use chorus_ollama_client::{ChatMessage, OllamaClient};
//! use chorus_shared_config::OllamaConfig;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Aligned {
//!     lines: Vec<String>,
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new(&OllamaConfig::default())?;
//! let aligned: Aligned = client
//!     .chat_json(
//!         vec![
//!             ChatMessage::system("Answer with JSON."),
//!             ChatMessage::user("Align these lyrics."),
//!         ],
//!         None,
//!     )
//!     .await?;
//! println!("{} lines", aligned.lines.len());
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod models;

pub use client::OllamaClient;
pub use error::{OllamaError, OllamaResult};
pub use models::{
    ChatMessage, ChatRequest, ChatResponse, ChatRole, GenerateOptions, ListModelsResponse,
    ModelInfo, ResponseFormat,
};
