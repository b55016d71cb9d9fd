//! Synced-lyrics executor
//!
//! Transcription and LLM alignment always run and produce the baseline
//! timing. Forced-alignment refinement is optional: it only runs when
//! requested for audio short enough, and any problem with it falls back to
//! the baseline instead of failing the job.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::{wrong_request, JobExecutor};
use crate::clients::{
    scratch_path, AssetCache, AssetFetcher, ForcedAligner, LyricsAligner, Transcriber, LRC_ENTRY,
};
use crate::error::{WorkerError, WorkerResult};
use crate::lrc::{self, LrcLine};
use crate::models::{
    JobKind, JobRequest, JobResult, LrcOptions, LrcRequest, LrcResult, Phrase,
};
use crate::queue::ProgressReporter;

#[derive(Debug, Clone)]
pub struct LrcExecutorConfig {
    /// Directory receiving `<content_hash>.lrc`
    pub output_dir: PathBuf,
    /// Upper bound on one refinement attempt
    pub refinement_timeout: Duration,
}

/// Inputs a cached result was produced from. The cache answers a request
/// only when every field matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CacheKey {
    lyrics: Vec<String>,
    whisper_model: String,
    language: Option<String>,
    use_vocals_stem: bool,
    use_qwen3: bool,
    max_qwen3_duration: f64,
}

impl CacheKey {
    fn new(lyrics: &[String], options: &LrcOptions) -> Self {
        Self {
            lyrics: lyrics.to_vec(),
            whisper_model: options.whisper_model.clone(),
            language: options.language.clone(),
            use_vocals_stem: options.use_vocals_stem,
            use_qwen3: options.use_qwen3,
            max_qwen3_duration: options.max_qwen3_duration,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedLrc {
    key: CacheKey,
    result: LrcResult,
}

pub struct LrcExecutor {
    fetcher: Arc<dyn AssetFetcher>,
    cache: AssetCache,
    transcriber: Arc<dyn Transcriber>,
    aligner: Arc<dyn LyricsAligner>,
    forced_aligner: Option<Arc<dyn ForcedAligner>>,
    config: LrcExecutorConfig,
}

impl LrcExecutor {
    pub fn new(
        fetcher: Arc<dyn AssetFetcher>,
        cache: AssetCache,
        transcriber: Arc<dyn Transcriber>,
        aligner: Arc<dyn LyricsAligner>,
        config: LrcExecutorConfig,
    ) -> Self {
        Self {
            fetcher,
            cache,
            transcriber,
            aligner,
            forced_aligner: None,
            config,
        }
    }

    /// Enable refinement through `forced_aligner`
    pub fn with_forced_aligner(mut self, forced_aligner: Arc<dyn ForcedAligner>) -> Self {
        self.forced_aligner = Some(forced_aligner);
        self
    }

    #[instrument(skip_all, fields(job_id = %progress.job_id(), hash = %request.content_hash))]
    async fn run(&self, request: &LrcRequest, progress: &ProgressReporter) -> WorkerResult<LrcResult> {
        request.validate()?;
        let hash = request.content_hash.as_str();
        let options = &request.options;
        let lyrics = lrc::lyric_lines(&request.lyrics_text);
        let key = CacheKey::new(&lyrics, options);

        if !options.force {
            if let Some(cached) = self.cached_result(hash, &key).await? {
                info!(path = %cached.lrc_file_path, "Using cached synced lyrics");
                progress.report(1.0, "cached").await;
                return Ok(cached);
            }
        }

        progress.report(0.05, "fetching").await;
        let source = self
            .cache
            .fetch_source(self.fetcher.as_ref(), &request.audio_url, hash)
            .await?;
        let audio = if options.use_vocals_stem {
            match self.cache.vocals_stem(hash).await? {
                Some(vocals) => vocals,
                None => {
                    warn!("No vocals stem cached; transcribing the full mix");
                    source
                }
            }
        } else {
            source
        };

        progress.report(0.15, "transcribing").await;
        let transcription = self
            .transcriber
            .transcribe(&audio, &options.whisper_model, options.language.as_deref())
            .await?;
        if transcription.phrases.is_empty() {
            return Err(WorkerError::Transcription(
                "no phrases transcribed".to_string(),
            ));
        }
        debug!(
            phrases = transcription.phrases.len(),
            duration = transcription.duration_seconds,
            "Transcription complete"
        );

        progress.report(0.45, "aligning").await;
        let baseline = self.align(&transcription.phrases, &lyrics).await?;

        let duration = transcription.duration_seconds;
        let lines = if options.use_qwen3 && duration > 0.0 && duration <= options.max_qwen3_duration
        {
            progress.report(0.7, "refining").await;
            self.refine(&audio, &lyrics, options.language.as_deref(), baseline)
                .await
        } else {
            if options.use_qwen3 {
                debug!(
                    duration,
                    max = options.max_qwen3_duration,
                    "Audio duration outside refinement range; keeping baseline"
                );
            }
            baseline
        };

        progress.report(0.9, "writing").await;
        let path = self.write_lrc(hash, &lines).await?;

        let result = LrcResult {
            lrc_file_path: path.display().to_string(),
            line_count: lines.len(),
            phrases: transcription.phrases,
        };
        let entry = CachedLrc {
            key,
            result: result.clone(),
        };
        if let Err(e) = self.cache.store_json(hash, LRC_ENTRY, &entry).await {
            warn!(error = %e, "Failed to cache synced lyrics result");
        }

        info!(lines = result.line_count, path = %result.lrc_file_path, "Synced lyrics written");
        Ok(result)
    }

    /// Cached result produced from the same inputs whose LRC file is still on disk
    async fn cached_result(&self, hash: &str, key: &CacheKey) -> WorkerResult<Option<LrcResult>> {
        let Some(cached) = self.cache.load_json::<CachedLrc>(hash, LRC_ENTRY).await? else {
            return Ok(None);
        };
        if cached.key != *key {
            debug!("Cached synced lyrics were made from other inputs; regenerating");
            return Ok(None);
        }
        let exists = tokio::fs::try_exists(&cached.result.lrc_file_path)
            .await
            .unwrap_or(false);
        Ok(exists.then_some(cached.result))
    }

    /// Baseline timing: one line per lyric line, authoritative text, times
    /// never going backwards
    async fn align(
        &self,
        phrases: &[Phrase],
        lyrics: &[String],
    ) -> WorkerResult<Vec<LrcLine>> {
        let mut lines = self.aligner.align(phrases, lyrics).await?;
        if lines.len() != lyrics.len() {
            return Err(WorkerError::Alignment(format!(
                "expected {} aligned lines, got {}",
                lyrics.len(),
                lines.len()
            )));
        }

        for (line, text) in lines.iter_mut().zip(lyrics) {
            line.text = text.clone();
        }
        lrc::make_monotonic(&mut lines);
        Ok(lines)
    }

    /// Refined timing when it covers at least as many lines as `baseline`,
    /// otherwise `baseline`
    async fn refine(
        &self,
        audio: &Path,
        lyrics: &[String],
        language: Option<&str>,
        baseline: Vec<LrcLine>,
    ) -> Vec<LrcLine> {
        let Some(forced_aligner) = &self.forced_aligner else {
            debug!("Refinement requested but no forced aligner configured");
            return baseline;
        };

        let attempt = tokio::time::timeout(
            self.config.refinement_timeout,
            forced_aligner.align(audio, lyrics, language),
        )
        .await;

        let text = match attempt {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!(error = %e, "Refinement failed; keeping baseline");
                return baseline;
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.config.refinement_timeout.as_secs_f64(),
                    "Refinement timed out; keeping baseline"
                );
                return baseline;
            }
        };

        let mut refined = lrc::parse(&text);
        if refined.len() < baseline.len() {
            warn!(
                refined = refined.len(),
                baseline = baseline.len(),
                "Refinement covers fewer lines; keeping baseline"
            );
            return baseline;
        }

        lrc::make_monotonic(&mut refined);
        info!(lines = refined.len(), "Using refined timing");
        refined
    }

    async fn write_lrc(&self, hash: &str, lines: &[LrcLine]) -> WorkerResult<PathBuf> {
        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        let path = self.config.output_dir.join(format!("{}.lrc", hash));
        let tmp = scratch_path(&path);
        tokio::fs::write(&tmp, lrc::render(lines)).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(path)
    }
}

#[async_trait]
impl JobExecutor for LrcExecutor {
    fn kind(&self) -> JobKind {
        JobKind::Lrc
    }

    async fn execute(
        &self,
        request: JobRequest,
        progress: &ProgressReporter,
    ) -> WorkerResult<JobResult> {
        match request {
            JobRequest::Lrc(request) => self.run(&request, progress).await.map(JobResult::Lrc),
            other => Err(wrong_request(JobKind::Lrc, &other)),
        }
    }
}
