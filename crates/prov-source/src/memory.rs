use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;

use crate::config::RequestOptions;
use crate::error::{DownloadError, DownloadResult};
use crate::fetch::{Fetched, Fetcher};

#[derive(Clone, Debug)]
enum Route {
    Body(Fetched),
    Status(u16),
    Unreachable(String),
}

/// In-memory [`Fetcher`] serving canned responses by URL.
///
/// Intended for tests and offline embedding. Unknown URLs answer 404. Every
/// request is counted so callers can assert on fetch traffic.
pub struct InMemoryFetcher {
    routes: RwLock<HashMap<String, Route>>,
    hits: Mutex<HashMap<String, usize>>,
}

impl InMemoryFetcher {
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Serve `body` with an optional content type at `url`.
    pub fn serve(&self, url: &str, body: impl Into<Bytes>, content_type: Option<&str>) {
        self.route(
            url,
            Route::Body(Fetched::new(body, content_type.map(str::to_string))),
        );
    }

    /// Answer `url` with an HTTP error status.
    pub fn fail_with_status(&self, url: &str, status: u16) {
        self.route(url, Route::Status(status));
    }

    /// Make `url` fail as if the host could not be reached.
    pub fn unreachable(&self, url: &str, message: &str) {
        self.route(url, Route::Unreachable(message.to_string()));
    }

    /// Requests made for `url` so far.
    pub fn hits(&self, url: &str) -> usize {
        let key = normalize(url);
        self.hits
            .lock()
            .expect("hit counter poisoned")
            .get(&key)
            .copied()
            .unwrap_or(0)
    }

    /// Requests made for any URL so far.
    pub fn total_hits(&self) -> usize {
        self.hits.lock().expect("hit counter poisoned").values().sum()
    }

    fn route(&self, url: &str, route: Route) {
        self.routes
            .write()
            .expect("route table poisoned")
            .insert(normalize(url), route);
    }
}

impl Default for InMemoryFetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Key routes by their parsed form so `https://a.example` and
/// `https://a.example/` are the same route.
fn normalize(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

#[async_trait]
impl Fetcher for InMemoryFetcher {
    async fn fetch(&self, url: &Url, request: &RequestOptions) -> DownloadResult<Fetched> {
        let key = url.to_string();
        *self
            .hits
            .lock()
            .expect("hit counter poisoned")
            .entry(key.clone())
            .or_insert(0) += 1;

        let route = self
            .routes
            .read()
            .expect("route table poisoned")
            .get(&key)
            .cloned();
        match route {
            Some(Route::Body(fetched)) => {
                if fetched.bytes.len() as u64 > request.max_bytes {
                    return Err(DownloadError::TooLarge {
                        url: key,
                        limit: request.max_bytes,
                    });
                }
                Ok(fetched)
            }
            Some(Route::Status(status)) => Err(DownloadError::Status { url: key, status }),
            Some(Route::Unreachable(message)) => Err(DownloadError::Network { url: key, message }),
            None => Err(DownloadError::Status {
                url: key,
                status: 404,
            }),
        }
    }
}
