//! Inputs for the provenance reader.
//!
//! Callers hand the reader blobs, file paths, URLs, or references to rendered
//! images. This crate normalizes all of them into a [`Source`]: the asset
//! bytes, when they could be obtained, plus a media type. Remote bytes come
//! through a [`Downloader`], which validates URLs, bounds concurrent fetches,
//! and delegates the transfer to a pluggable [`Fetcher`].
//!
//! Resolution never fails outright. A file that cannot be read or a URL that
//! cannot be fetched yields a source without bytes, which the reader reports
//! as "no manifest store".

pub mod config;
pub mod downloader;
pub mod error;
pub mod fetch;
pub mod http;
pub mod input;
pub mod memory;
pub mod source;

pub use config::{DownloaderConfig, RequestOptions};
pub use downloader::Downloader;
pub use error::{DownloadError, DownloadResult, SourceError, SourceResult};
pub use fetch::{Fetched, Fetcher};
pub use http::HttpFetcher;
pub use input::AssetInput;
pub use memory::InMemoryFetcher;
pub use source::{Source, SourceAdapter, SourceKind};
