use std::sync::Arc;

use reqwest::Url;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::{DownloaderConfig, RequestOptions};
use crate::error::{DownloadError, DownloadResult};
use crate::fetch::{Fetched, Fetcher};

/// Schemes the downloader will request.
const FETCHABLE_SCHEMES: &[&str] = &["http", "https"];

/// Resolves URLs to bytes without blocking the calling task.
///
/// Validates the URL, bounds the number of concurrent fetches, and forwards
/// request options to a [`Fetcher`]. An unparseable URL, or one whose scheme
/// cannot be fetched, fails with [`DownloadError::InvalidUrl`] before any
/// request is made.
pub struct Downloader {
    fetcher: Arc<dyn Fetcher>,
    permits: Semaphore,
    request: RequestOptions,
    config: DownloaderConfig,
}

impl Downloader {
    /// Create a downloader over an arbitrary fetcher.
    pub fn new(fetcher: Arc<dyn Fetcher>, config: DownloaderConfig) -> Self {
        Self {
            fetcher,
            permits: Semaphore::new(config.max_concurrent.max(1)),
            request: RequestOptions::from(&config),
            config,
        }
    }

    /// Parse and check a URL without fetching it.
    pub fn validate(url: &str) -> DownloadResult<Url> {
        let parsed = Url::parse(url.trim()).map_err(|e| DownloadError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !FETCHABLE_SCHEMES.contains(&parsed.scheme()) {
            return Err(DownloadError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme {:?}", parsed.scheme()),
            });
        }
        Ok(parsed)
    }

    /// Fetch the body at `url`.
    pub async fn download(&self, url: &str) -> DownloadResult<Fetched> {
        let parsed = Self::validate(url)?;
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| DownloadError::InvalidRequest(e.to_string()))?;

        debug!(url = %parsed, "download started");
        match self.fetcher.fetch(&parsed, &self.request).await {
            Ok(fetched) => {
                debug!(url = %parsed, bytes = fetched.bytes.len(), "download finished");
                Ok(fetched)
            }
            Err(e) => {
                warn!(url = %parsed, error = %e, "download failed");
                Err(e)
            }
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }
}
