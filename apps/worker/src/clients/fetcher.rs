//! Source audio download

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};
use url::Url;

use super::cache::scratch_path;
use crate::error::{WorkerError, WorkerResult};

/// Copies the audio behind a URL to a local file
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Write the asset at `url` to `dest`, replacing it; returns bytes written
    async fn fetch(&self, url: &str, dest: &Path) -> WorkerResult<u64>;
}

/// Where an audio URL points
#[derive(Debug, PartialEq)]
enum Source {
    Remote(Url),
    Local(PathBuf),
}

fn resolve(url: &str) -> WorkerResult<Source> {
    match Url::parse(url) {
        Ok(parsed) => match parsed.scheme() {
            "http" | "https" => Ok(Source::Remote(parsed)),
            "file" => parsed
                .to_file_path()
                .map(Source::Local)
                .map_err(|_| WorkerError::asset_fetch(url, "not a local file URL")),
            scheme => Err(WorkerError::asset_fetch(
                url,
                format!("unsupported scheme '{}'", scheme),
            )),
        },
        Err(url::ParseError::RelativeUrlWithoutBase) => Ok(Source::Local(PathBuf::from(url))),
        Err(e) => Err(e.into()),
    }
}

/// Fetches `http(s)://` URLs over HTTP and copies `file://` URLs and plain paths
#[derive(Debug, Clone)]
pub struct HttpAssetFetcher {
    http: Client,
}

impl HttpAssetFetcher {
    pub fn new(timeout: Duration) -> WorkerResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent("Chorus-Worker/1.0")
            .build()?;
        Ok(Self { http })
    }

    async fn download(&self, url: Url, part: &Path) -> WorkerResult<u64> {
        let source = url.to_string();
        let mut response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| WorkerError::asset_fetch(&source, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WorkerError::asset_fetch(
                &source,
                format!("status {}", status.as_u16()),
            ));
        }

        let mut file = tokio::fs::File::create(part).await?;
        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| WorkerError::asset_fetch(&source, e))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

#[async_trait]
impl AssetFetcher for HttpAssetFetcher {
    #[instrument(skip(self), fields(dest = %dest.display()))]
    async fn fetch(&self, url: &str, dest: &Path) -> WorkerResult<u64> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let part = scratch_path(dest);

        let written = match resolve(url)? {
            Source::Remote(remote) => self.download(remote, &part).await,
            Source::Local(path) => tokio::fs::copy(&path, &part)
                .await
                .map_err(|e| WorkerError::asset_fetch(url, e)),
        };

        let written = match written {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(e);
            }
        };
        if let Err(e) = tokio::fs::rename(&part, dest).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(e.into());
        }

        debug!(bytes = written, "Asset fetched");
        Ok(written)
    }
}
