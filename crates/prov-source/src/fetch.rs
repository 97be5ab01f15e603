use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;

use crate::config::RequestOptions;
use crate::error::DownloadResult;

/// A fetched response body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fetched {
    pub bytes: Bytes,
    /// The `Content-Type` the server declared, if any.
    pub content_type: Option<String>,
}

impl Fetched {
    pub fn new(bytes: impl Into<Bytes>, content_type: Option<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type,
        }
    }
}

/// Network access used by the [`crate::Downloader`].
///
/// Implementations perform exactly one request per call and must enforce
/// `request.max_bytes` on the body they return.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url, request: &RequestOptions) -> DownloadResult<Fetched>;
}
