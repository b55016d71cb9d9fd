//! JSON-over-HTTP plumbing shared by the media engine clients

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{WorkerError, WorkerResult};

/// Connection timeout for engine requests
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Longest error body kept in a failure message
const MAX_ERROR_BODY_LEN: usize = 500;

/// POSTs JSON to one engine endpoint
#[derive(Debug, Clone)]
pub(crate) struct EngineEndpoint {
    http: Client,
    url: String,
    service: &'static str,
}

impl EngineEndpoint {
    pub fn new(service: &'static str, url: String, timeout_secs: u64) -> WorkerResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent("Chorus-Worker/1.0")
            .build()?;
        Ok(Self { http, url, service })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn post<B, T>(&self, body: &B) -> WorkerResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(service = self.service, url = %self.url, "Calling engine");

        let response = self
            .http
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WorkerError::service_error(
                self.service,
                format!("status {}: {}", status.as_u16(), truncate(&body)),
            ));
        }

        response.json::<T>().await.map_err(|e| {
            WorkerError::service_error(self.service, format!("invalid response: {}", e))
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> WorkerError {
        if e.is_timeout() {
            WorkerError::ServiceTimeout {
                service: self.service.to_string(),
            }
        } else if e.is_connect() {
            WorkerError::ServiceUnavailable(format!("{} at {}", self.service, self.url))
        } else {
            WorkerError::Http(e)
        }
    }
}

fn truncate(body: &str) -> &str {
    if body.len() <= MAX_ERROR_BODY_LEN {
        return body;
    }
    let mut end = MAX_ERROR_BODY_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
