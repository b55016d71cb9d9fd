//! Mock media engines: transcription, analysis and forced alignment
//!
//! Each mock wraps a [`wiremock::MockServer`] serving the single endpoint the
//! worker calls on that engine. Call counts come from the recorded requests,
//! which lets tests assert that an engine was never contacted.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// One engine endpoint behind a mock server
struct EngineMock {
    server: MockServer,
    endpoint: &'static str,
}

impl EngineMock {
    async fn start(endpoint: &'static str) -> Self {
        Self {
            server: MockServer::start().await,
            endpoint,
        }
    }

    async fn respond(&self, template: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path(self.endpoint))
            .respond_with(template)
            .mount(&self.server)
            .await;
    }

    async fn calls(&self) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == self.endpoint)
            .count()
    }

    async fn last_body(&self) -> Option<serde_json::Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .rev()
            .find(|r| r.url.path() == self.endpoint)
            .and_then(|r| serde_json::from_slice(&r.body).ok())
    }
}

/// Mock Whisper transcription service (`POST /transcribe`)
pub struct MockWhisperServer {
    inner: EngineMock,
}

impl MockWhisperServer {
    /// Start a new mock transcription server
    pub async fn start() -> Self {
        Self {
            inner: EngineMock::start("/transcribe").await,
        }
    }

    /// Get the server URL
    pub fn url(&self) -> String {
        self.inner.server.uri()
    }

    /// Answer with the given phrases `(start, end, text)` and audio duration
    pub async fn mock_transcription(&self, duration: f64, phrases: &[(f64, f64, &str)]) {
        let segments: Vec<serde_json::Value> = phrases
            .iter()
            .map(|(start, end, text)| json!({"start": start, "end": end, "text": text}))
            .collect();

        self.inner
            .respond(ResponseTemplate::new(200).set_body_json(json!({
                "language": "en",
                "duration": duration,
                "segments": segments
            })))
            .await;
    }

    /// Fail every request with the given status
    pub async fn mock_failure(&self, status_code: u16) {
        self.inner
            .respond(
                ResponseTemplate::new(status_code)
                    .set_body_json(json!({"detail": "transcription failed"})),
            )
            .await;
    }

    /// Number of transcription requests received
    pub async fn calls(&self) -> usize {
        self.inner.calls().await
    }

    /// Body of the most recent transcription request
    pub async fn last_request(&self) -> Option<serde_json::Value> {
        self.inner.last_body().await
    }
}

/// Mock audio analysis service (`POST /analyze`)
pub struct MockAnalyzerServer {
    inner: EngineMock,
}

impl MockAnalyzerServer {
    /// Start a new mock analysis server
    pub async fn start() -> Self {
        Self {
            inner: EngineMock::start("/analyze").await,
        }
    }

    /// Get the server URL
    pub fn url(&self) -> String {
        self.inner.server.uri()
    }

    /// Answer with a fixed analysis of a 4/4 song at the given tempo
    pub async fn mock_analysis(&self, duration: f64, tempo_bpm: f64) {
        self.mock_analysis_after(duration, tempo_bpm, Duration::ZERO)
            .await;
    }

    /// Like [`Self::mock_analysis`], but each answer is delayed
    pub async fn mock_analysis_after(&self, duration: f64, tempo_bpm: f64, delay: Duration) {
        let beat = 60.0 / tempo_bpm;
        let beats: Vec<f64> = (0..8).map(|i| i as f64 * beat).collect();
        let downbeats: Vec<f64> = beats.iter().step_by(4).copied().collect();

        self.inner
            .respond(
                ResponseTemplate::new(200)
                    .set_delay(delay)
                    .set_body_json(json!({
                        "duration_seconds": duration,
                        "tempo_bpm": tempo_bpm,
                        "key": "A",
                        "mode": "minor",
                        "key_confidence": 0.82,
                        "loudness_db": -9.5,
                        "beats": beats,
                        "downbeats": downbeats,
                        "sections": [
                            {"start": 0.0, "end": duration / 2.0, "label": "verse"},
                            {"start": duration / 2.0, "end": duration, "label": "chorus"}
                        ]
                    })),
            )
            .await;
    }

    /// Fail every request with the given status
    pub async fn mock_failure(&self, status_code: u16) {
        self.inner
            .respond(
                ResponseTemplate::new(status_code)
                    .set_body_json(json!({"detail": "analysis failed"})),
            )
            .await;
    }

    /// Number of analysis requests received
    pub async fn calls(&self) -> usize {
        self.inner.calls().await
    }

    /// Body of the most recent analysis request
    pub async fn last_request(&self) -> Option<serde_json::Value> {
        self.inner.last_body().await
    }
}

/// Mock forced-alignment refinement service (`POST /align`)
pub struct MockForcedAlignerServer {
    inner: EngineMock,
}

impl MockForcedAlignerServer {
    /// Start a new mock forced-alignment server
    pub async fn start() -> Self {
        Self {
            inner: EngineMock::start("/align").await,
        }
    }

    /// Get the server URL
    pub fn url(&self) -> String {
        self.inner.server.uri()
    }

    /// Answer with the given LRC document
    pub async fn mock_lrc(&self, lrc: &str) {
        self.inner
            .respond(ResponseTemplate::new(200).set_body_json(json!({ "lrc": lrc })))
            .await;
    }

    /// Answer with the given LRC document after a delay
    pub async fn mock_lrc_after(&self, lrc: &str, delay: Duration) {
        self.inner
            .respond(
                ResponseTemplate::new(200)
                    .set_delay(delay)
                    .set_body_json(json!({ "lrc": lrc })),
            )
            .await;
    }

    /// Fail every request with the given status
    pub async fn mock_failure(&self, status_code: u16) {
        self.inner
            .respond(
                ResponseTemplate::new(status_code)
                    .set_body_json(json!({"detail": "alignment failed"})),
            )
            .await;
    }

    /// Number of refinement requests received
    pub async fn calls(&self) -> usize {
        self.inner.calls().await
    }
}
