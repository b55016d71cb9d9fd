//! Submission payloads
//!
//! On the wire a request carries an internal `kind` tag. In the store only
//! the concrete payload is serialized; the `kind` column picks the type to
//! decode it into (see [`JobRequest::from_payload`]).

use serde::{Deserialize, Serialize};

use super::JobKind;
use crate::error::{WorkerError, WorkerResult};
use crate::lrc;

/// Longest accepted content hash
const MAX_CONTENT_HASH_LEN: usize = 128;

/// Request for any job kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobRequest {
    Analyze(AnalyzeRequest),
    Lrc(LrcRequest),
}

impl JobRequest {
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Analyze(_) => JobKind::Analyze,
            Self::Lrc(_) => JobKind::Lrc,
        }
    }

    pub fn content_hash(&self) -> &str {
        match self {
            Self::Analyze(r) => &r.content_hash,
            Self::Lrc(r) => &r.content_hash,
        }
    }

    /// Check the fields every executor relies on
    pub fn validate(&self) -> WorkerResult<()> {
        match self {
            Self::Analyze(r) => r.validate(),
            Self::Lrc(r) => r.validate(),
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

impl From<AnalyzeRequest> for JobRequest {
    fn from(request: AnalyzeRequest) -> Self {
        Self::Analyze(request)
    }
}

impl From<LrcRequest> for JobRequest {
    fn from(request: LrcRequest) -> Self {
        Self::Lrc(request)
    }
}

/// Song analysis request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    /// Where to fetch the audio from (`http(s)://`, `file://` or a local path)
    pub audio_url: String,
    /// Stable identifier of the audio content; keys the asset cache
    pub content_hash: String,
    #[serde(default)]
    pub options: AnalyzeOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzeOptions {
    /// Also separate stems (vocals, accompaniment)
    pub generate_stems: bool,
    /// Ignore cached analysis
    pub force: bool,
}

impl AnalyzeRequest {
    pub fn validate(&self) -> WorkerResult<()> {
        validate_source(&self.audio_url, &self.content_hash)
    }
}

/// Synced-lyrics request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LrcRequest {
    pub audio_url: String,
    pub content_hash: String,
    /// Authoritative lyrics, one line per sung line; `[Section]` headers are skipped
    pub lyrics_text: String,
    #[serde(default)]
    pub options: LrcOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LrcOptions {
    /// Whisper model size used for transcription
    pub whisper_model: String,
    /// Language hint for transcription and refinement; detected when absent
    pub language: Option<String>,
    /// Transcribe the isolated vocals stem when one is cached
    pub use_vocals_stem: bool,
    /// Ignore a cached result
    pub force: bool,
    /// Attempt forced-alignment refinement of the baseline timings
    pub use_qwen3: bool,
    /// Longest audio, in seconds, refinement is attempted on
    pub max_qwen3_duration: f64,
}

impl Default for LrcOptions {
    fn default() -> Self {
        Self {
            whisper_model: "medium".to_string(),
            language: None,
            use_vocals_stem: false,
            force: false,
            use_qwen3: false,
            max_qwen3_duration: 300.0,
        }
    }
}

impl LrcRequest {
    pub fn validate(&self) -> WorkerResult<()> {
        validate_source(&self.audio_url, &self.content_hash)?;

        if self.lyrics_text.trim().is_empty() {
            return Err(WorkerError::InvalidPayload("lyrics_text is empty".into()));
        }
        if lrc::lyric_lines(&self.lyrics_text).is_empty() {
            return Err(WorkerError::InvalidPayload(
                "lyrics_text has no lyric lines".into(),
            ));
        }
        if self.options.whisper_model.trim().is_empty() {
            return Err(WorkerError::InvalidPayload("whisper_model is empty".into()));
        }
        let max = self.options.max_qwen3_duration;
        if !max.is_finite() || max < 0.0 {
            return Err(WorkerError::InvalidPayload(format!(
                "max_qwen3_duration must be a non-negative number, got {}",
                max
            )));
        }
        Ok(())
    }
}

fn validate_source(audio_url: &str, content_hash: &str) -> WorkerResult<()> {
    if audio_url.trim().is_empty() {
        return Err(WorkerError::InvalidPayload("audio_url is empty".into()));
    }
    validate_content_hash(content_hash)
}

/// Content hashes name cache directories, so only `[A-Za-z0-9_-]` is allowed
pub fn validate_content_hash(hash: &str) -> WorkerResult<()> {
    if hash.is_empty() {
        return Err(WorkerError::InvalidPayload("content_hash is empty".into()));
    }
    if hash.len() > MAX_CONTENT_HASH_LEN {
        return Err(WorkerError::InvalidPayload(format!(
            "content_hash longer than {} characters",
            MAX_CONTENT_HASH_LEN
        )));
    }
    if !hash
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(WorkerError::InvalidPayload(format!(
            "content_hash '{}' contains invalid characters",
            hash
        )));
    }
    Ok(())
}
