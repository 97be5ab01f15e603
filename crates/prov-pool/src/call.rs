use bytes::Bytes;
use prov_types::{DecodeResult, MediaType, ScanResult, WireError};

use crate::engine::{CompiledModule, DecodeEngine};

/// A call to the worker-side surface, with its arguments.
///
/// Buffers are [`Bytes`], so handing a job to a worker moves a reference
/// count rather than the asset.
#[derive(Clone, Debug)]
pub enum WorkerCall {
    DecodeBuffer {
        bytes: Bytes,
        media_type: MediaType,
        settings: Option<String>,
    },
    DecodePairedManifestAsset {
        manifest: Bytes,
        asset: Bytes,
        asset_type: MediaType,
        settings: Option<String>,
    },
    DecodeFragment {
        init: Bytes,
        fragment: Bytes,
        media_type: MediaType,
        settings: Option<String>,
    },
    /// Argument order is fragment, rolling hash, anchor everywhere.
    DecodeRollingHash {
        fragment: Bytes,
        rolling_hash: Bytes,
        anchor: Option<Bytes>,
        settings: Option<String>,
    },
    ScanPresence {
        bytes: Bytes,
    },
}

impl WorkerCall {
    /// Method name, for logs and error messages.
    pub fn method(&self) -> &'static str {
        match self {
            Self::DecodeBuffer { .. } => "decode_buffer",
            Self::DecodePairedManifestAsset { .. } => "decode_paired_manifest_asset",
            Self::DecodeFragment { .. } => "decode_fragment",
            Self::DecodeRollingHash { .. } => "decode_rolling_hash",
            Self::ScanPresence { .. } => "scan_presence",
        }
    }

    /// Run the call against `engine`. Executed on a worker thread.
    pub(crate) fn execute(
        self,
        engine: &dyn DecodeEngine,
        module: &CompiledModule,
    ) -> Result<WorkerReply, WireError> {
        match self {
            Self::DecodeBuffer {
                bytes,
                media_type,
                settings,
            } => engine
                .decode_buffer(module, &bytes, &media_type, settings.as_deref())
                .map(WorkerReply::Decoded),
            Self::DecodePairedManifestAsset {
                manifest,
                asset,
                asset_type,
                settings,
            } => engine
                .decode_paired_manifest_asset(
                    module,
                    &manifest,
                    &asset,
                    &asset_type,
                    settings.as_deref(),
                )
                .map(WorkerReply::Decoded),
            Self::DecodeFragment {
                init,
                fragment,
                media_type,
                settings,
            } => engine
                .decode_fragment(module, &init, &fragment, &media_type, settings.as_deref())
                .map(WorkerReply::Decoded),
            Self::DecodeRollingHash {
                fragment,
                rolling_hash,
                anchor,
                settings,
            } => engine
                .decode_rolling_hash(
                    module,
                    &fragment,
                    &rolling_hash,
                    anchor.as_deref(),
                    settings.as_deref(),
                )
                .map(|hash| WorkerReply::RollingHash(Bytes::from(hash))),
            Self::ScanPresence { bytes } => engine
                .scan_presence(module, &bytes)
                .map(WorkerReply::Scan),
        }
    }
}

/// A successful reply from a worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerReply {
    Decoded(DecodeResult),
    RollingHash(Bytes),
    Scan(ScanResult),
}
