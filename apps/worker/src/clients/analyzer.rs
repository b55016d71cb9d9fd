//! Audio analysis engine: tempo, key, loudness, sections and stems

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chorus_shared_config::ServicesConfig;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::http::EngineEndpoint;
use crate::error::{WorkerError, WorkerResult};
use crate::models::{AnalyzeResult, Section};

/// What the analysis engine reports about one file
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AudioAnalysis {
    pub duration_seconds: f64,
    pub tempo_bpm: f64,
    pub key: String,
    pub mode: String,
    pub key_confidence: f64,
    pub loudness_db: f64,
    #[serde(default)]
    pub beats: Vec<f64>,
    #[serde(default)]
    pub downbeats: Vec<f64>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl AudioAnalysis {
    pub fn into_result(self, stems_url: Option<String>) -> AnalyzeResult {
        AnalyzeResult {
            duration_seconds: self.duration_seconds,
            tempo_bpm: self.tempo_bpm,
            musical_key: self.key,
            musical_mode: self.mode,
            key_confidence: self.key_confidence,
            loudness_db: self.loudness_db,
            beats: self.beats,
            downbeats: self.downbeats,
            sections: self.sections,
            stems_url,
        }
    }
}

#[async_trait]
pub trait AudioAnalyzer: Send + Sync {
    /// Analyze `audio`; with `stems_dir`, also write separated stems there
    async fn analyze(&self, audio: &Path, stems_dir: Option<&Path>)
        -> WorkerResult<AudioAnalysis>;
}

#[derive(Serialize)]
struct AnalyzeRequestBody {
    audio_path: String,
    generate_stems: bool,
    stems_dir: Option<PathBuf>,
}

/// Client for the analysis sidecar (`POST /analyze`)
#[derive(Debug, Clone)]
pub struct AnalyzerClient {
    endpoint: EngineEndpoint,
}

impl AnalyzerClient {
    pub fn new(config: &ServicesConfig) -> WorkerResult<Self> {
        Ok(Self {
            endpoint: EngineEndpoint::new(
                "analyzer",
                config.analyze_url(),
                config.analyzer_timeout_secs,
            )?,
        })
    }
}

#[async_trait]
impl AudioAnalyzer for AnalyzerClient {
    #[instrument(skip(self), fields(audio = %audio.display()))]
    async fn analyze(
        &self,
        audio: &Path,
        stems_dir: Option<&Path>,
    ) -> WorkerResult<AudioAnalysis> {
        let body = AnalyzeRequestBody {
            audio_path: audio.display().to_string(),
            generate_stems: stems_dir.is_some(),
            stems_dir: stems_dir.map(Path::to_path_buf),
        };

        self.endpoint.post(&body).await.map_err(|e| match e {
            WorkerError::ServiceError { message, .. } => WorkerError::AudioAnalysis(message),
            other => other,
        })
    }
}
