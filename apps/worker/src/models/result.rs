//! Result payloads of completed jobs

use serde::{Deserialize, Serialize};

use super::JobKind;

/// Result for any job kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobResult {
    Analyze(AnalyzeResult),
    Lrc(LrcResult),
}

impl JobResult {
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Analyze(_) => JobKind::Analyze,
            Self::Lrc(_) => JobKind::Lrc,
        }
    }

    /// Serialize the concrete payload without the kind tag
    pub fn to_payload(&self) -> serde_json::Result<String> {
        match self {
            Self::Analyze(r) => serde_json::to_string(r),
            Self::Lrc(r) => serde_json::to_string(r),
        }
    }

    /// Decode a stored payload as the type belonging to `kind`
    pub fn from_payload(kind: JobKind, payload: &str) -> serde_json::Result<Self> {
        Ok(match kind {
            JobKind::Analyze => Self::Analyze(serde_json::from_str(payload)?),
            JobKind::Lrc => Self::Lrc(serde_json::from_str(payload)?),
        })
    }
}

/// Musical analysis of one song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResult {
    pub duration_seconds: f64,
    pub tempo_bpm: f64,
    /// Tonic, e.g. "F#"
    pub musical_key: String,
    /// "major" or "minor"
    pub musical_mode: String,
    pub key_confidence: f64,
    pub loudness_db: f64,
    /// Beat times in seconds
    pub beats: Vec<f64>,
    pub downbeats: Vec<f64>,
    pub sections: Vec<Section>,
    /// Directory holding separated stems, when they were requested
    pub stems_url: Option<String>,
}

/// Structural section of a song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub start: f64,
    pub end: f64,
    pub label: String,
}

/// Synced-lyrics output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LrcResult {
    pub lrc_file_path: String,
    pub line_count: usize,
    /// Transcribed phrases the timing was derived from
    pub phrases: Vec<Phrase>,
}

/// Transcribed phrase with coarse timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phrase {
    pub start: f64,
    pub end: f64,
    pub text: String,
}
