//! Forced-alignment refinement engine

use std::path::Path;

use async_trait::async_trait;
use chorus_shared_config::ServicesConfig;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::http::EngineEndpoint;
use crate::error::{WorkerError, WorkerResult};

/// Aligns known lyrics to audio and answers with an LRC document
#[async_trait]
pub trait ForcedAligner: Send + Sync {
    async fn align(
        &self,
        audio: &Path,
        lyrics: &[String],
        language: Option<&str>,
    ) -> WorkerResult<String>;
}

#[derive(Serialize)]
struct AlignRequest<'a> {
    audio_path: String,
    lyrics: &'a [String],
    language: Option<&'a str>,
}

#[derive(Deserialize)]
struct AlignResponse {
    lrc: String,
}

/// Client for the forced-alignment sidecar (`POST /align`)
#[derive(Debug, Clone)]
pub struct ForcedAlignerClient {
    endpoint: EngineEndpoint,
}

impl ForcedAlignerClient {
    /// `None` when no forced-alignment URL is configured
    pub fn from_config(config: &ServicesConfig) -> WorkerResult<Option<Self>> {
        config
            .align_url()
            .map(|url| {
                EngineEndpoint::new("forced-aligner", url, config.forced_aligner_timeout_secs)
                    .map(|endpoint| Self { endpoint })
            })
            .transpose()
    }
}

#[async_trait]
impl ForcedAligner for ForcedAlignerClient {
    #[instrument(skip(self, lyrics), fields(url = %self.endpoint.url(), lines = lyrics.len()))]
    async fn align(
        &self,
        audio: &Path,
        lyrics: &[String],
        language: Option<&str>,
    ) -> WorkerResult<String> {
        let request = AlignRequest {
            audio_path: audio.display().to_string(),
            lyrics,
            language,
        };

        let response: AlignResponse = self.endpoint.post(&request).await.map_err(|e| match e {
            WorkerError::ServiceError { message, .. } => WorkerError::Refinement(message),
            other => other,
        })?;
        Ok(response.lrc)
    }
}
