use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the [`crate::Downloader`].
///
/// `method`, `headers`, and `timeout` are forwarded to the fetcher verbatim.
/// There is no retry: a failed fetch is reported once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    /// Maximum number of fetches in flight at once.
    pub max_concurrent: usize,
    /// Largest response body accepted, in bytes.
    pub max_bytes: u64,
    /// HTTP method.
    pub method: String,
    /// Extra request headers.
    pub headers: BTreeMap<String, String>,
    /// Per-request timeout. `None` leaves it to the fetcher.
    pub timeout: Option<Duration>,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 8,
            max_bytes: 64 * 1024 * 1024,
            method: "GET".into(),
            headers: BTreeMap::new(),
            timeout: None,
        }
    }
}

/// The per-request part of [`DownloaderConfig`], as handed to a fetcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestOptions {
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
    pub max_bytes: u64,
}

impl From<&DownloaderConfig> for RequestOptions {
    fn from(config: &DownloaderConfig) -> Self {
        Self {
            method: config.method.clone(),
            headers: config.headers.clone(),
            timeout: config.timeout,
            max_bytes: config.max_bytes,
        }
    }
}
