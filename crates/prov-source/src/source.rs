use std::fmt;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use prov_types::MediaType;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::downloader::Downloader;
use crate::input::AssetInput;

/// Which kind of input a [`Source`] was built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Blob,
    File,
    Url,
    ImageElement,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blob => write!(f, "blob"),
            Self::File => write!(f, "file"),
            Self::Url => write!(f, "url"),
            Self::ImageElement => write!(f, "image-element"),
        }
    }
}

/// A normalized input: bytes (when they could be loaded) plus a media type.
///
/// Immutable once built. A source without bytes is still a valid source; it
/// remembers where it came from so results can be reported against it.
#[derive(Clone, PartialEq, Eq)]
pub struct Source {
    kind: SourceKind,
    media_type: MediaType,
    bytes: Option<Bytes>,
    url: Option<String>,
    filename: Option<String>,
}

impl Source {
    /// A source for bytes already in memory.
    pub fn from_bytes(kind: SourceKind, bytes: Bytes, media_type: MediaType) -> Self {
        Self {
            kind,
            media_type,
            bytes: Some(bytes),
            url: None,
            filename: None,
        }
    }

    /// A source whose bytes could not be loaded.
    pub fn unavailable(kind: SourceKind, media_type: MediaType) -> Self {
        Self {
            kind,
            media_type,
            bytes: None,
            url: None,
            filename: None,
        }
    }

    fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    fn with_filename(mut self, filename: Option<String>) -> Self {
        self.filename = filename;
        self
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn media_type(&self) -> &MediaType {
        &self.media_type
    }

    /// Whether there is anything to decode.
    pub fn bytes_available(&self) -> bool {
        self.bytes.is_some()
    }

    /// The asset bytes. Cloning is a reference-count bump.
    pub fn bytes(&self) -> Option<Bytes> {
        self.bytes.clone()
    }

    /// The URL this source was resolved from, for URL and image inputs.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Last path segment of the file or URL, when there is one.
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("kind", &self.kind)
            .field("media_type", &self.media_type)
            .field("bytes", &self.bytes.as_ref().map(Bytes::len))
            .field("url", &self.url)
            .field("filename", &self.filename)
            .finish()
    }
}

/// Builds [`Source`]s from [`AssetInput`]s.
///
/// Never fails: anything that cannot be loaded degrades to a source without
/// bytes and a warning in the log.
#[derive(Clone)]
pub struct SourceAdapter {
    downloader: Arc<Downloader>,
}

impl SourceAdapter {
    pub fn new(downloader: Arc<Downloader>) -> Self {
        Self { downloader }
    }

    /// Normalize `input` into a source.
    pub async fn resolve(&self, input: AssetInput) -> Source {
        match input {
            AssetInput::Blob { bytes, media_type } => {
                let media_type = declared_or(&media_type, None);
                debug!(
                    kind = %SourceKind::Blob,
                    bytes = bytes.len(),
                    %media_type,
                    "source resolved"
                );
                Source::from_bytes(SourceKind::Blob, bytes, media_type)
            }
            AssetInput::File { path, media_type } => Self::resolve_file(&path, media_type).await,
            AssetInput::Url(url) => self.resolve_url(SourceKind::Url, &url).await,
            AssetInput::ImageElement { src, current_src } => {
                let effective = current_src
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or(src);
                self.resolve_url(SourceKind::ImageElement, &effective).await
            }
        }
    }

    async fn resolve_file(path: &Path, declared: Option<String>) -> Source {
        let inferred = path.to_str().and_then(MediaType::from_path);
        let media_type = match declared {
            Some(d) => declared_or(&d, inferred),
            None => inferred.unwrap_or_else(MediaType::octet_stream),
        };
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string);

        match tokio::fs::read(path).await {
            Ok(data) => {
                debug!(
                    kind = %SourceKind::File,
                    path = %path.display(),
                    bytes = data.len(),
                    "source resolved"
                );
                Source::from_bytes(SourceKind::File, Bytes::from(data), media_type)
                    .with_filename(filename)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "file unreadable, no bytes to decode");
                Source::unavailable(SourceKind::File, media_type).with_filename(filename)
            }
        }
    }

    async fn resolve_url(&self, kind: SourceKind, url: &str) -> Source {
        let from_path = MediaType::from_path(url);
        let filename = url_filename(url);

        match self.downloader.download(url).await {
            Ok(fetched) => {
                let media_type = fetched
                    .content_type
                    .as_deref()
                    .and_then(|ct| MediaType::parse(ct).ok())
                    .filter(|mt| *mt != MediaType::octet_stream())
                    .or(from_path)
                    .unwrap_or_else(MediaType::octet_stream);
                debug!(%kind, %url, bytes = fetched.bytes.len(), %media_type, "source resolved");
                Source::from_bytes(kind, fetched.bytes, media_type)
                    .with_url(url)
                    .with_filename(filename)
            }
            Err(e) => {
                warn!(%kind, %url, error = %e, "could not load source, no bytes to decode");
                Source::unavailable(kind, from_path.unwrap_or_else(MediaType::octet_stream))
                    .with_url(url)
                    .with_filename(filename)
            }
        }
    }
}

/// Use the declared type when it is well-formed, else the fallback, else
/// `application/octet-stream`.
fn declared_or(declared: &str, fallback: Option<MediaType>) -> MediaType {
    match MediaType::parse(declared) {
        Ok(mt) => mt,
        Err(_) => {
            if !declared.is_empty() {
                warn!(declared, "ignoring malformed media type");
            }
            fallback.unwrap_or_else(MediaType::octet_stream)
        }
    }
}

fn url_filename(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let after_scheme = path.split_once("://").map_or(path, |(_, rest)| rest);
    let (_, tail) = after_scheme.split_once('/')?;
    tail.rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}
