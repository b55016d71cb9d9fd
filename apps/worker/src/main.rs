use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chorus_ollama_client::OllamaClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chorus_worker::clients::{
    AnalyzerClient, AssetCache, ForcedAlignerClient, HttpAssetFetcher, OllamaLyricsAligner,
    WhisperClient,
};
use chorus_worker::config::Config;
use chorus_worker::executors::{AnalyzeExecutor, JobExecutors, LrcExecutor, LrcExecutorConfig};
use chorus_worker::routes::{router, AppState};
use chorus_worker::{JobQueue, JobStore};

/// Upper bound on downloading one source file
const ASSET_FETCH_TIMEOUT_SECS: u64 = 600;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chorus_worker=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("failed to load configuration")?;
    tracing::info!(
        environment = %config.environment(),
        bind_addr = %config.bind_addr,
        "Starting Chorus worker"
    );

    let store = JobStore::connect(config.database())
        .await
        .context("failed to open job store")?;

    let ollama = OllamaClient::new(config.ollama()).context("failed to build Ollama client")?;
    check_alignment_model(&ollama).await;

    let executors = build_executors(&config, ollama)?;
    let queue = Arc::new(JobQueue::new(store, executors, config.queue_config()));

    let report = queue.initialize().await?;
    tracing::info!(
        purged = report.purged,
        requeued = report.requeued,
        "Recovered job state"
    );
    queue.start().await?;

    let app = router(AppState::new(Arc::clone(&queue)));
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!("Listening on {}", config.bind_addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    queue.stop().await;
    served?;

    tracing::info!("Chorus worker stopped");
    Ok(())
}

/// Lyric alignment fails at job time without the model; surface that early
async fn check_alignment_model(ollama: &OllamaClient) {
    let model = &ollama.config().model;
    match ollama.has_model().await {
        Ok(true) => tracing::info!(model = %model, "Alignment model available"),
        Ok(false) => tracing::warn!(model = %model, "Alignment model not pulled; LRC jobs will fail"),
        Err(e) => tracing::warn!(error = %e, "Ollama unreachable at startup"),
    }
}

fn build_executors(config: &Config, ollama: OllamaClient) -> anyhow::Result<JobExecutors> {
    let storage = config.storage();
    let services = config.services();

    let cache = AssetCache::new(&storage.cache_dir);
    let fetcher = Arc::new(HttpAssetFetcher::new(Duration::from_secs(
        ASSET_FETCH_TIMEOUT_SECS,
    ))?);

    let analyze = AnalyzeExecutor::new(
        fetcher.clone(),
        cache.clone(),
        Arc::new(AnalyzerClient::new(services)?),
    );

    let mut lrc = LrcExecutor::new(
        fetcher,
        cache,
        Arc::new(WhisperClient::new(services)?),
        Arc::new(OllamaLyricsAligner::new(ollama)),
        LrcExecutorConfig {
            output_dir: storage.lrc_output_dir.clone(),
            refinement_timeout: Duration::from_secs(services.forced_aligner_timeout_secs),
        },
    );
    match ForcedAlignerClient::from_config(services)? {
        Some(client) => lrc = lrc.with_forced_aligner(Arc::new(client)),
        None => tracing::info!("FORCED_ALIGNER_URL not set; LRC refinement disabled"),
    }

    Ok(JobExecutors::new(Arc::new(analyze), Arc::new(lrc))?)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
