//! Shared test utilities for the Chorus workspace
//!
//! Mock implementations of the external engines the job worker talks to, so
//! executor and queue tests run without network dependencies.
//!
//! # Mock Services
//!
//! - [`MockOllamaServer`] - Ollama chat endpoint answering lyric alignments
//! - [`MockWhisperServer`] - transcription engine
//! - [`MockAnalyzerServer`] - audio analysis engine
//! - [`MockForcedAlignerServer`] - forced-alignment refinement engine
//!
//! # Example
//!
//! ```rust,ignore
//! use chorus_test_utils::MockForcedAlignerServer;
//!
//! #[tokio::test]
//! async fn test_refinement_falls_back() {
//!     let aligner = MockForcedAlignerServer::start().await;
//!     aligner.mock_failure(500).await;
//!
//!     // Point ServicesConfig::forced_aligner_url at aligner.url()
//! }
//! ```

mod ollama;
mod services;

pub use ollama::MockOllamaServer;
pub use services::{MockAnalyzerServer, MockForcedAlignerServer, MockWhisperServer};
