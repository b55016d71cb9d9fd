//! Mock Ollama server for lyric alignment tests
//!
//! Provides a [`MockOllamaServer`] answering `/api/chat` the way the lyric
//! aligner expects: a JSON document with one timed entry per lyric line.

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mock Ollama server
///
/// # Example
///
/// ```rust,ignore
/// use chorus_test_utils::MockOllamaServer;
///
/// #[tokio::test]
/// async fn test_alignment() {
///     let server = MockOllamaServer::start().await;
///     server.mock_alignment(&[(1.0, "first line"), (4.5, "second line")]).await;
///
///     // Configure OllamaConfig::with_url(server.url())
/// }
/// ```
pub struct MockOllamaServer {
    server: MockServer,
}

impl MockOllamaServer {
    /// Start a new mock Ollama server
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Get the server URL
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Get reference to the underlying mock server for custom mock setups
    pub fn inner(&self) -> &MockServer {
        &self.server
    }

    fn chat_envelope(content: String) -> serde_json::Value {
        json!({
            "model": "qwen2.5:7b",
            "message": {
                "role": "assistant",
                "content": content
            },
            "done": true,
            "done_reason": "stop"
        })
    }

    /// Answer every chat request with the given aligned lines
    pub async fn mock_alignment(&self, lines: &[(f64, &str)]) {
        let lines: Vec<serde_json::Value> = lines
            .iter()
            .map(|(time, text)| json!({"time": time, "text": text}))
            .collect();
        self.mock_chat_with_json(json!({ "lines": lines })).await;
    }

    /// Answer every chat request with a custom JSON document as the content
    pub async fn mock_chat_with_json(&self, content: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(Self::chat_envelope(content.to_string())),
            )
            .mount(&self.server)
            .await;
    }

    /// Answer every chat request with raw text content
    pub async fn mock_chat_text(&self, content: &str) {
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(Self::chat_envelope(content.to_string())),
            )
            .mount(&self.server)
            .await;
    }

    /// Fail every chat request with the given status
    pub async fn mock_chat_failure(&self, status_code: u16, error_message: &str) {
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(status_code).set_body_json(json!({
                    "error": error_message
                })),
            )
            .mount(&self.server)
            .await;
    }

    /// Mount the model listing endpoint used by readiness checks
    pub async fn mock_list_models(&self, models: &[&str]) {
        let models: Vec<serde_json::Value> =
            models.iter().map(|name| json!({ "name": name })).collect();

        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": models })))
            .mount(&self.server)
            .await;
    }

    /// Number of chat requests received so far
    pub async fn chat_calls(&self) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == "/api/chat")
            .count()
    }
}
