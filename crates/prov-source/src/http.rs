use async_trait::async_trait;
use bytes::BytesMut;
use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, Url};
use tracing::debug;

use crate::config::RequestOptions;
use crate::error::{DownloadError, DownloadResult};
use crate::fetch::{Fetched, Fetcher};

/// [`Fetcher`] backed by a shared `reqwest` client.
#[derive(Clone, Debug, Default)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client (proxies, TLS roots, ...).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, request: &RequestOptions) -> DownloadResult<Fetched> {
        let method = Method::from_bytes(request.method.as_bytes()).map_err(|e| {
            DownloadError::InvalidRequest(format!("method {:?}: {e}", request.method))
        })?;
        let mut builder = self.client.request(method, url.clone());
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| DownloadError::InvalidRequest(format!("header {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| DownloadError::InvalidRequest(format!("header value: {e}")))?;
            builder = builder.header(name, value);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let network = |e: reqwest::Error| DownloadError::Network {
            url: url.to_string(),
            message: e.to_string(),
        };
        let mut response = builder.send().await.map_err(network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let too_large = || DownloadError::TooLarge {
            url: url.to_string(),
            limit: request.max_bytes,
        };
        if response
            .content_length()
            .is_some_and(|len| len > request.max_bytes)
        {
            return Err(too_large());
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(network)? {
            if (body.len() + chunk.len()) as u64 > request.max_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        debug!(%url, bytes = body.len(), "fetched");
        Ok(Fetched {
            bytes: body.freeze(),
            content_type,
        })
    }
}
