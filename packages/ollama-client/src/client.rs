//! Ollama HTTP client with retry logic and connection pooling

use std::future::Future;
use std::time::Duration;

use chorus_shared_config::OllamaConfig;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{OllamaError, OllamaResult};
use crate::models::{
    ChatMessage, ChatRequest, ChatResponse, GenerateOptions, ListModelsResponse, ResponseFormat,
};

/// Maximum error body size kept in error messages
const MAX_ERROR_BODY_SIZE: usize = 1000;

const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;

/// Ollama API client with retry logic and connection pooling
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http_client: Client,
    config: OllamaConfig,
    /// Number of attempts for transient failures
    retry_attempts: u32,
    /// Base delay for exponential backoff (milliseconds)
    retry_base_delay_ms: u64,
}

impl OllamaClient {
    /// Create a new Ollama client from configuration
    pub fn new(config: &OllamaConfig) -> OllamaResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(OllamaError::HttpError)?;

        Ok(Self {
            http_client,
            config: config.clone(),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
        })
    }

    /// Set retry configuration
    pub fn with_retry_config(mut self, attempts: u32, base_delay_ms: u64) -> Self {
        self.retry_attempts = attempts;
        self.retry_base_delay_ms = base_delay_ms;
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    async fn with_retry<T, F, Fut>(&self, operation: F) -> OllamaResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = OllamaResult<T>>,
    {
        if self.retry_attempts <= 1 {
            return operation().await;
        }

        let mut last_error = None;
        for attempt in 0..self.retry_attempts {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    if attempt + 1 < self.retry_attempts {
                        let delay = self.retry_base_delay_ms * 2_u64.pow(attempt);
                        warn!(
                            attempt = attempt + 1,
                            max_attempts = self.retry_attempts,
                            delay_ms = delay,
                            error = %e,
                            "Retrying Ollama request after transient error"
                        );
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(OllamaError::RetriesExhausted {
            attempts: self.retry_attempts,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
        })
    }

    /// Truncate an error body on a UTF-8 boundary
    fn truncate_error_body(body: String) -> String {
        if body.len() <= MAX_ERROR_BODY_SIZE {
            return body;
        }

        let truncate_at = body
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|i| *i <= MAX_ERROR_BODY_SIZE)
            .last()
            .unwrap_or(0);

        format!("{}... (truncated)", &body[..truncate_at])
    }

    fn map_send_error(&self, e: reqwest::Error) -> OllamaError {
        if e.is_connect() {
            OllamaError::ConnectionRefused(self.config.url.clone())
        } else if e.is_timeout() {
            OllamaError::Timeout(self.config.timeout_secs)
        } else {
            OllamaError::HttpError(e)
        }
    }

    /// Turn a non-success response into an error, passing successes through
    async fn check_status(&self, response: Response) -> OllamaResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = Self::truncate_error_body(response.text().await.unwrap_or_default());
        if status.as_u16() == 404 && body.contains("not found") {
            return Err(OllamaError::ModelNotFound(self.config.model.clone()));
        }

        Err(OllamaError::ApiError {
            status: status.as_u16(),
            message: body,
        })
    }

    /// List pulled models
    pub async fn list_models(&self) -> OllamaResult<Vec<String>> {
        let response = self
            .http_client
            .get(self.config.tags_url())
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = self.check_status(response).await?;

        let list: ListModelsResponse = response.json().await?;
        Ok(list.models.into_iter().map(|m| m.name).collect())
    }

    /// Check whether the configured model has been pulled, ignoring the tag
    pub async fn has_model(&self) -> OllamaResult<bool> {
        let wanted = self.config.model.split(':').next().unwrap_or_default();
        let models = self.list_models().await?;
        Ok(models
            .iter()
            .any(|m| m.split(':').next().unwrap_or_default() == wanted))
    }

    fn default_options(&self) -> GenerateOptions {
        GenerateOptions {
            temperature: Some(self.config.temperature),
            num_predict: Some(self.config.max_tokens),
            ..Default::default()
        }
    }

    /// Single chat request, no retry
    async fn chat_once(
        &self,
        messages: &[ChatMessage],
        format: Option<ResponseFormat>,
        options: Option<GenerateOptions>,
    ) -> OllamaResult<String> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: messages.to_vec(),
            stream: false,
            format,
            options: Some(options.unwrap_or_else(|| self.default_options())),
        };

        let response = self
            .http_client
            .post(self.config.chat_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = self.check_status(response).await?;

        let chat_response: ChatResponse = response.json().await?;
        if chat_response.done_reason.as_deref() == Some("length") {
            warn!(
                model = %self.config.model,
                eval_count = ?chat_response.eval_count,
                "Chat response hit the token limit"
            );
        }
        Ok(chat_response.message.content)
    }

    async fn chat_retrying(
        &self,
        messages: Vec<ChatMessage>,
        format: Option<ResponseFormat>,
        options: Option<GenerateOptions>,
    ) -> OllamaResult<String> {
        debug!(
            model = %self.config.model,
            message_count = messages.len(),
            json = format.is_some(),
            "Sending chat request"
        );

        let result = self
            .with_retry(|| {
                let options = options.clone();
                let messages = &messages;
                async move { self.chat_once(messages, format, options).await }
            })
            .await?;

        debug!(response_len = result.len(), "Chat response received");
        Ok(result)
    }

    /// Chat in JSON mode and decode the answer into `T`.
    ///
    /// Ollama is asked for `format: "json"`; an answer that still does not
    /// decode into `T` is reported as [`OllamaError::InvalidResponse`] and is
    /// not retried.
    pub async fn chat_json<T: DeserializeOwned>(
        &self,
        messages: Vec<ChatMessage>,
        options: Option<GenerateOptions>,
    ) -> OllamaResult<T> {
        let content = self
            .chat_retrying(messages, Some(ResponseFormat::Json), options)
            .await?;

        serde_json::from_str(content.trim()).map_err(|e| {
            OllamaError::InvalidResponse(format!(
                "expected JSON answer: {} ({})",
                e,
                Self::truncate_error_body(content)
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server_url: &str) -> OllamaConfig {
        OllamaConfig {
            url: server_url.to_string(),
            model: "test-model".to_string(),
            timeout_secs: 5,
            max_tokens: 512,
            temperature: 0.1,
        }
    }

    fn chat_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "message": {"role": "assistant", "content": content},
            "done": true,
            "done_reason": "stop"
        })
    }

    #[derive(Debug, Deserialize)]
    struct Answer {
        lines: Vec<String>,
    }

    #[test]
    fn test_client_creation() {
        assert!(OllamaClient::new(&OllamaConfig::default()).is_ok());
    }

    #[test]
    fn test_with_retry_configuration() {
        let client = OllamaClient::new(&OllamaConfig::default())
            .unwrap()
            .with_retry_config(5, 10);
        assert_eq!(client.retry_attempts, 5);
        assert_eq!(client.retry_base_delay_ms, 10);
    }

    #[test]
    fn test_truncate_error_body() {
        let short = "short error".to_string();
        assert_eq!(OllamaClient::truncate_error_body(short.clone()), short);

        let exact = "x".repeat(MAX_ERROR_BODY_SIZE);
        assert_eq!(OllamaClient::truncate_error_body(exact.clone()), exact);

        let truncated = OllamaClient::truncate_error_body("x".repeat(2000));
        assert!(truncated.ends_with("... (truncated)"));
        assert!(truncated.len() < MAX_ERROR_BODY_SIZE + 20);
    }

    #[test]
    fn test_truncate_error_body_utf8_boundary() {
        // '日' is 3 bytes
        let truncated = OllamaClient::truncate_error_body("日".repeat(500));
        assert!(truncated.ends_with("... (truncated)"));
        assert!(truncated.chars().count() > 300);
    }

    #[tokio::test]
    async fn test_chat_json_requests_json_format_and_decodes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({
                "model": "test-model",
                "format": "json",
                "stream": false
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(chat_body(r#" {"lines": ["a", "b"]} "#)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = OllamaClient::new(&test_config(&server.uri())).unwrap();
        let answer: Answer = client
            .chat_json(vec![ChatMessage::user("align")], None)
            .await
            .unwrap();
        assert_eq!(answer.lines, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_chat_json_rejects_prose_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("Sure! Here it is")))
            .expect(1)
            .mount(&server)
            .await;

        let client = OllamaClient::new(&test_config(&server.uri())).unwrap();
        let result: OllamaResult<Answer> = client.chat_json(vec![ChatMessage::user("x")], None).await;
        assert!(matches!(result, Err(OllamaError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_model_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_string(r#"{"error":"model 'test-model' not found"}"#),
            )
            .mount(&server)
            .await;

        let client = OllamaClient::new(&test_config(&server.uri())).unwrap();
        let result: OllamaResult<Answer> = client.chat_json(vec![ChatMessage::user("x")], None).await;
        assert!(matches!(result, Err(OllamaError::ModelNotFound(m)) if m == "test-model"));
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .expect(1)
            .mount(&server)
            .await;

        let client = OllamaClient::new(&test_config(&server.uri()))
            .unwrap()
            .with_retry_config(3, 1);
        let result: OllamaResult<Answer> = client.chat_json(vec![ChatMessage::user("x")], None).await;
        assert!(matches!(
            result,
            Err(OllamaError::ApiError { status: 400, .. })
        ));
    }

    #[tokio::test]
    async fn test_server_error_exhausts_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(503).set_body_string("loading model"))
            .expect(3)
            .mount(&server)
            .await;

        let client = OllamaClient::new(&test_config(&server.uri()))
            .unwrap()
            .with_retry_config(3, 1);
        let result: OllamaResult<Answer> = client.chat_json(vec![ChatMessage::user("x")], None).await;
        assert!(matches!(
            result,
            Err(OllamaError::RetriesExhausted { attempts: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let client = OllamaClient::new(&test_config("http://127.0.0.1:1"))
            .unwrap()
            .with_retry_config(1, 1);
        let result: OllamaResult<Answer> = client.chat_json(vec![ChatMessage::user("x")], None).await;
        assert!(matches!(result, Err(OllamaError::ConnectionRefused(_))));
    }

    #[tokio::test]
    async fn test_has_model_ignores_tag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [{"name": "test-model:latest"}, {"name": "other:7b"}]
            })))
            .mount(&server)
            .await;

        let client = OllamaClient::new(&test_config(&server.uri())).unwrap();
        assert!(client.has_model().await.unwrap());

        let other = OllamaClient::new(&OllamaConfig {
            model: "missing".into(),
            ..test_config(&server.uri())
        })
        .unwrap();
        assert!(!other.has_model().await.unwrap());
    }
}
