//! Song analysis executor

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use super::{wrong_request, JobExecutor};
use crate::clients::{AssetCache, AssetFetcher, AudioAnalyzer, ANALYSIS_ENTRY};
use crate::error::WorkerResult;
use crate::models::{AnalyzeRequest, AnalyzeResult, JobKind, JobRequest, JobResult};
use crate::queue::ProgressReporter;

pub struct AnalyzeExecutor {
    fetcher: Arc<dyn AssetFetcher>,
    cache: AssetCache,
    analyzer: Arc<dyn AudioAnalyzer>,
}

impl AnalyzeExecutor {
    pub fn new(
        fetcher: Arc<dyn AssetFetcher>,
        cache: AssetCache,
        analyzer: Arc<dyn AudioAnalyzer>,
    ) -> Self {
        Self {
            fetcher,
            cache,
            analyzer,
        }
    }

    #[instrument(skip_all, fields(job_id = %progress.job_id(), hash = %request.content_hash))]
    async fn run(
        &self,
        request: &AnalyzeRequest,
        progress: &ProgressReporter,
    ) -> WorkerResult<AnalyzeResult> {
        request.validate()?;
        let hash = request.content_hash.as_str();

        if !request.options.force {
            if let Some(cached) = self
                .cache
                .load_json::<AnalyzeResult>(hash, ANALYSIS_ENTRY)
                .await?
            {
                // A cached run without stems can't answer a request for them
                if !request.options.generate_stems || cached.stems_url.is_some() {
                    info!("Using cached analysis");
                    progress.report(1.0, "cached").await;
                    return Ok(cached);
                }
            }
        }

        progress.report(0.05, "fetching").await;
        let audio = self
            .cache
            .fetch_source(self.fetcher.as_ref(), &request.audio_url, hash)
            .await?;

        progress.report(0.2, "analyzing").await;
        let stems_dir = if request.options.generate_stems {
            let dir = self.cache.stems_dir(hash)?;
            tokio::fs::create_dir_all(&dir).await?;
            Some(dir)
        } else {
            None
        };

        let analysis = self.analyzer.analyze(&audio, stems_dir.as_deref()).await?;
        let result =
            analysis.into_result(stems_dir.map(|dir| dir.display().to_string()));

        progress.report(0.9, "caching").await;
        if let Err(e) = self.cache.store_json(hash, ANALYSIS_ENTRY, &result).await {
            warn!(error = %e, "Failed to cache analysis result");
        }

        info!(
            tempo_bpm = result.tempo_bpm,
            key = %result.musical_key,
            mode = %result.musical_mode,
            "Analysis complete"
        );
        Ok(result)
    }
}

#[async_trait]
impl JobExecutor for AnalyzeExecutor {
    fn kind(&self) -> JobKind {
        JobKind::Analyze
    }

    async fn execute(
        &self,
        request: JobRequest,
        progress: &ProgressReporter,
    ) -> WorkerResult<JobResult> {
        match request {
            JobRequest::Analyze(request) => {
                self.run(&request, progress).await.map(JobResult::Analyze)
            }
            other => Err(wrong_request(JobKind::Analyze, &other)),
        }
    }
}
