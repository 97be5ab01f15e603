//! What to do when a decode fails.
//!
//! Every decode failure passes through [`Recovery::recover`] exactly once.
//! Benign failures become "no manifest", a remote manifest pointer gets one
//! paired decode against the fetched manifest, and everything else propagates
//! unchanged.

use prov_pool::{CompiledModule, WorkerPool};
use prov_source::{Downloader, Source};
use prov_types::{DecodeError, DecodeResult, JobId};
use tracing::{debug, warn};

use crate::error::{SessionError, SessionResult};

/// How a decode failure is treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition<'a> {
    /// No usable provenance: resolve to no manifest.
    Benign,
    /// The manifest lives at this URL.
    RemoteManifest(&'a str),
    /// Propagate to the caller.
    Fatal,
}

/// Sort a decode failure into benign, remote, or fatal.
pub fn classify(error: &DecodeError) -> Disposition<'_> {
    if error.is_benign() {
        return Disposition::Benign;
    }
    match error.remote_manifest_url() {
        Some(url) => Disposition::RemoteManifest(url),
        None => Disposition::Fatal,
    }
}

/// Borrowed view of the session parts recovery needs.
pub(crate) struct Recovery<'a> {
    pub(crate) pool: &'a WorkerPool,
    pub(crate) module: &'a CompiledModule,
    pub(crate) downloader: &'a Downloader,
    pub(crate) fetch_remote_manifests: bool,
}

impl Recovery<'_> {
    /// Resolve `error` to a decode result, to no result, or to an error.
    pub(crate) async fn recover(
        &self,
        job: JobId,
        error: DecodeError,
        source: &Source,
        settings: Option<String>,
    ) -> SessionResult<Option<DecodeResult>> {
        let url = match classify(&error) {
            Disposition::Benign => {
                debug!(%job, error = %error, "no usable provenance");
                return Ok(None);
            }
            Disposition::Fatal => return Err(SessionError::Decode(error)),
            Disposition::RemoteManifest(url) => url,
        };

        if !self.fetch_remote_manifests {
            debug!(%job, %url, "remote manifest fetching disabled");
            return Ok(None);
        }
        let Some(asset) = source.bytes() else {
            return Err(SessionError::InvalidInput(
                "remote manifest cannot be paired with an asset whose bytes were never loaded"
                    .into(),
            ));
        };

        let manifest = match self.downloader.download(url).await {
            Ok(fetched) => fetched.bytes,
            Err(e) if e.is_invalid_url() => {
                warn!(%job, %url, "malformed remote manifest URL, no manifest");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        debug!(%job, %url, bytes = manifest.len(), "decoding remote manifest against asset");
        let result = self
            .pool
            .decode_paired_manifest_asset(
                self.module,
                manifest,
                asset,
                source.media_type().clone(),
                settings,
            )
            .await?;
        Ok(Some(result))
    }
}
