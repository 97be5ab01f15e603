//! High-level SDK for the provenance reader.
//!
//! A [`Session`] owns a worker pool and one compiled module. Its read
//! operations turn blobs, files, URLs, and image references into manifest
//! stores without blocking the calling task, and route decode failures
//! through [`recovery`]: benign ones read as "no manifest", remote manifest
//! pointers get a single paired decode, and anything else propagates.

pub mod builder;
pub mod config;
pub mod error;
pub mod recovery;
pub mod session;

pub use builder::{ManifestStoreBuilder, RawManifestBuilder, RawManifestStore};
pub use config::{BinarySource, ReadOptions, SessionConfig, SessionFileConfig};
pub use error::{SessionError, SessionResult};
pub use recovery::{classify, Disposition};
pub use session::{ReadResult, Session};

// Re-export key types
pub use prov_pool::{DecodeEngine, PoolConfig};
pub use prov_source::{AssetInput, DownloaderConfig, Source, SourceKind};
pub use prov_types::{DecodeError, DecodeResult, ScanResult, ToolkitSettings};
