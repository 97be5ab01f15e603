use std::any::Any;
use std::fmt;
use std::sync::Arc;

use prov_types::{DecodeResult, MediaType, ModuleDigest, ScanResult, WireError};

/// An immutable, compiled binary module.
///
/// Cloning a `CompiledModule` clones a reference, never the artifact: every
/// job in a session runs against the same compiled unit. The artifact itself
/// is engine-specific and recovered with [`CompiledModule::artifact`].
#[derive(Clone)]
pub struct CompiledModule {
    inner: Arc<ModuleInner>,
}

struct ModuleInner {
    digest: ModuleDigest,
    artifact: Box<dyn Any + Send + Sync>,
}

impl CompiledModule {
    /// Wrap an engine artifact compiled from bytes with the given digest.
    pub fn new<A: Any + Send + Sync>(digest: ModuleDigest, artifact: A) -> Self {
        Self {
            inner: Arc::new(ModuleInner {
                digest,
                artifact: Box::new(artifact),
            }),
        }
    }

    /// Digest of the module bytes.
    pub fn digest(&self) -> ModuleDigest {
        self.inner.digest
    }

    /// Borrow the engine artifact, if it has type `A`.
    pub fn artifact<A: Any>(&self) -> Option<&A> {
        self.inner.artifact.downcast_ref::<A>()
    }

    /// Returns `true` if both handles refer to the same compiled unit.
    pub fn same_module(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for CompiledModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompiledModule({})", self.inner.digest.short_hex())
    }
}

/// What [`crate::WorkerPool::load_module`] accepts.
#[derive(Clone, Debug)]
pub enum ModuleSource {
    /// Already compiled; loading is a no-op.
    Compiled(CompiledModule),
    /// Raw module bytes to compile.
    Bytes(bytes::Bytes),
}

/// The decode/verify engine as seen from a worker.
///
/// Every method runs on a worker's blocking thread and must not assume any
/// state beyond the module it is handed. Failures are reported as
/// [`WireError`], the only error shape that survives the trip back to the
/// orchestrating side.
///
/// The trait is object-safe and `Send + Sync` so one engine can be shared by
/// every worker through an `Arc<dyn DecodeEngine>`.
pub trait DecodeEngine: Send + Sync {
    /// Report whether the current environment can run this engine.
    fn check_compatibility(&self) -> Result<(), String> {
        Ok(())
    }

    /// Compile module bytes into a reusable module.
    fn compile_module(&self, bytes: &[u8]) -> Result<CompiledModule, WireError>;

    /// Decode and verify a complete asset.
    fn decode_buffer(
        &self,
        module: &CompiledModule,
        bytes: &[u8],
        media_type: &MediaType,
        settings: Option<&str>,
    ) -> Result<DecodeResult, WireError>;

    /// Decode a detached manifest against the asset it describes.
    fn decode_paired_manifest_asset(
        &self,
        module: &CompiledModule,
        manifest: &[u8],
        asset: &[u8],
        asset_type: &MediaType,
        settings: Option<&str>,
    ) -> Result<DecodeResult, WireError>;

    /// Decode one fragment of a fragmented stream against its init segment.
    fn decode_fragment(
        &self,
        module: &CompiledModule,
        init: &[u8],
        fragment: &[u8],
        media_type: &MediaType,
        settings: Option<&str>,
    ) -> Result<DecodeResult, WireError>;

    /// Advance a rolling hash over one fragment. Returns the new hash state.
    fn decode_rolling_hash(
        &self,
        module: &CompiledModule,
        fragment: &[u8],
        rolling_hash: &[u8],
        anchor: Option<&[u8]>,
        settings: Option<&str>,
    ) -> Result<Vec<u8>, WireError>;

    /// Look for a provenance container without decoding it.
    fn scan_presence(&self, module: &CompiledModule, bytes: &[u8])
        -> Result<ScanResult, WireError>;
}
