//! Speech transcription engine

use std::path::Path;

use async_trait::async_trait;
use chorus_shared_config::ServicesConfig;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::http::EngineEndpoint;
use crate::error::{WorkerError, WorkerResult};
use crate::models::Phrase;

/// Transcribed audio: timed phrases and the length of the audio
#[derive(Debug, Clone, PartialEq)]
pub struct Transcription {
    pub language: Option<String>,
    /// Audio length in seconds; zero when the engine did not report it
    pub duration_seconds: f64,
    pub phrases: Vec<Phrase>,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        audio: &Path,
        model: &str,
        language: Option<&str>,
    ) -> WorkerResult<Transcription>;
}

#[derive(Serialize)]
struct TranscribeRequest<'a> {
    audio_path: String,
    model: &'a str,
    language: Option<&'a str>,
}

#[derive(Deserialize)]
struct TranscribeResponse {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    segments: Vec<Segment>,
}

#[derive(Deserialize)]
struct Segment {
    start: f64,
    end: f64,
    text: String,
}

/// Client for the Whisper sidecar (`POST /transcribe`)
#[derive(Debug, Clone)]
pub struct WhisperClient {
    endpoint: EngineEndpoint,
}

impl WhisperClient {
    pub fn new(config: &ServicesConfig) -> WorkerResult<Self> {
        Ok(Self {
            endpoint: EngineEndpoint::new(
                "whisper",
                config.transcribe_url(),
                config.whisper_timeout_secs,
            )?,
        })
    }
}

#[async_trait]
impl Transcriber for WhisperClient {
    #[instrument(skip(self), fields(audio = %audio.display()))]
    async fn transcribe(
        &self,
        audio: &Path,
        model: &str,
        language: Option<&str>,
    ) -> WorkerResult<Transcription> {
        let request = TranscribeRequest {
            audio_path: audio.display().to_string(),
            model,
            language,
        };

        let response: TranscribeResponse =
            self.endpoint.post(&request).await.map_err(|e| match e {
                WorkerError::ServiceError { message, .. } => WorkerError::Transcription(message),
                other => other,
            })?;

        let phrases = response
            .segments
            .into_iter()
            .filter_map(|s| {
                let text = s.text.trim();
                (!text.is_empty()).then(|| Phrase {
                    start: s.start,
                    end: s.end,
                    text: text.to_string(),
                })
            })
            .collect();

        Ok(Transcription {
            language: response.language,
            duration_seconds: response
                .duration
                .filter(|d| d.is_finite() && *d > 0.0)
                .unwrap_or(0.0),
            phrases,
        })
    }
}
