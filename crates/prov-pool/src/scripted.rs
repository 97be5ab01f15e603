//! An in-memory decode engine driven by a script of canned outcomes.
//!
//! Intended for tests and embedding. Outcomes are keyed by the exact bytes of
//! the asset (or, for paired decodes, of the manifest), and every call is
//! counted so callers can assert how many round-trips actually happened.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use bytes::Bytes;
use prov_types::{fault::names, DecodeResult, MediaType, ModuleDigest, ScanResult, WireError};

use crate::engine::{CompiledModule, DecodeEngine};

/// WebAssembly magic number; the only module bytes the scripted engine accepts.
pub const MODULE_MAGIC: &[u8] = b"\0asm";

/// Marker a presence scan looks for.
const CONTAINER_MARKER: &[u8] = b"jumb";

/// What a scripted call does.
#[derive(Clone, Debug)]
pub enum Scripted {
    /// Succeed with this result.
    Report(DecodeResult),
    /// Fail with this wire error.
    Fail(WireError),
    /// Panic on the worker thread with this message.
    Panic(String),
}

impl Scripted {
    /// Fail the way an asset without provenance fails.
    pub fn no_provenance() -> Self {
        Self::Fail(WireError::new(
            format!("Toolkit(C2pa({}))", names::PROVENANCE_MISSING),
            "no provenance found",
        ))
    }

    /// Fail with a remote manifest pointer.
    pub fn remote_manifest(url: impl Into<String>) -> Self {
        Self::Fail(WireError::remote_manifest(url))
    }
}

#[derive(Clone, Debug)]
struct Rule {
    outcome: Scripted,
    delay: Duration,
}

/// Artifact stored inside modules this engine compiles.
#[derive(Debug)]
struct ScriptedArtifact;

/// Scripted [`DecodeEngine`] for tests and embedding.
pub struct ScriptedEngine {
    assets: RwLock<HashMap<Vec<u8>, Rule>>,
    manifests: RwLock<HashMap<Vec<u8>, Rule>>,
    fallback: Scripted,
    incompatible: Option<String>,
    calls: Mutex<HashMap<&'static str, usize>>,
    compiles: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedEngine {
    /// An engine for which every unscripted asset has no provenance.
    pub fn new() -> Self {
        Self {
            assets: RwLock::new(HashMap::new()),
            manifests: RwLock::new(HashMap::new()),
            fallback: Scripted::no_provenance(),
            incompatible: None,
            calls: Mutex::new(HashMap::new()),
            compiles: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Outcome for assets without a rule.
    pub fn with_fallback(mut self, outcome: Scripted) -> Self {
        self.fallback = outcome;
        self
    }

    /// Make [`DecodeEngine::check_compatibility`] fail with `reason`.
    pub fn incompatible(mut self, reason: impl Into<String>) -> Self {
        self.incompatible = Some(reason.into());
        self
    }

    /// Valid module bytes for this engine.
    pub fn module_bytes() -> Bytes {
        Bytes::from_static(b"\0asm\x01\0\0\0")
    }

    /// Script the outcome of decoding `asset`.
    pub fn on_asset(&self, asset: impl AsRef<[u8]>, outcome: Scripted) {
        self.on_asset_delayed(asset, outcome, Duration::ZERO);
    }

    /// Script the outcome of decoding `asset`, after blocking for `delay`.
    pub fn on_asset_delayed(&self, asset: impl AsRef<[u8]>, outcome: Scripted, delay: Duration) {
        self.assets
            .write()
            .expect("script lock poisoned")
            .insert(asset.as_ref().to_vec(), Rule { outcome, delay });
    }

    /// Script the outcome of a paired decode whose manifest is `manifest`.
    pub fn on_manifest(&self, manifest: impl AsRef<[u8]>, outcome: Scripted) {
        self.manifests.write().expect("script lock poisoned").insert(
            manifest.as_ref().to_vec(),
            Rule {
                outcome,
                delay: Duration::ZERO,
            },
        );
    }

    /// Number of calls made to `method` (see [`crate::WorkerCall::method`]).
    pub fn calls(&self, method: &str) -> usize {
        self.calls
            .lock()
            .expect("call log poisoned")
            .get(method)
            .copied()
            .unwrap_or(0)
    }

    /// Number of calls across all decode and scan methods.
    pub fn total_calls(&self) -> usize {
        self.calls.lock().expect("call log poisoned").values().sum()
    }

    /// Number of modules compiled.
    pub fn compile_count(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn lookup(&self, table: &RwLock<HashMap<Vec<u8>, Rule>>, key: &[u8]) -> Rule {
        table
            .read()
            .expect("script lock poisoned")
            .get(key)
            .cloned()
            .unwrap_or_else(|| Rule {
                outcome: self.fallback.clone(),
                delay: Duration::ZERO,
            })
    }

    /// Record the call, hold an activity slot for the rule's delay, then play
    /// the outcome.
    fn play(
        &self,
        method: &'static str,
        module: &CompiledModule,
        rule: Rule,
    ) -> Result<DecodeResult, WireError> {
        self.enter(method, module)?;
        if !rule.delay.is_zero() {
            std::thread::sleep(rule.delay);
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        match rule.outcome {
            Scripted::Report(result) => Ok(result),
            Scripted::Fail(err) => Err(err),
            Scripted::Panic(message) => panic!("{message}"),
        }
    }

    fn enter(&self, method: &'static str, module: &CompiledModule) -> Result<(), WireError> {
        *self
            .calls
            .lock()
            .expect("call log poisoned")
            .entry(method)
            .or_insert(0) += 1;
        if module.artifact::<ScriptedArtifact>().is_none() {
            return Err(WireError::new(
                "Toolkit(ModuleMismatch)",
                "module was not compiled by this engine",
            ));
        }
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        Ok(())
    }
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodeEngine for ScriptedEngine {
    fn check_compatibility(&self) -> Result<(), String> {
        match &self.incompatible {
            Some(reason) => Err(reason.clone()),
            None => Ok(()),
        }
    }

    fn compile_module(&self, bytes: &[u8]) -> Result<CompiledModule, WireError> {
        if !bytes.starts_with(MODULE_MAGIC) {
            return Err(WireError::new(
                "Toolkit(CompileError)",
                "module bytes lack the wasm magic number",
            ));
        }
        self.compiles.fetch_add(1, Ordering::SeqCst);
        Ok(CompiledModule::new(
            ModuleDigest::from_bytes(bytes),
            ScriptedArtifact,
        ))
    }

    fn decode_buffer(
        &self,
        module: &CompiledModule,
        bytes: &[u8],
        _media_type: &MediaType,
        _settings: Option<&str>,
    ) -> Result<DecodeResult, WireError> {
        let rule = self.lookup(&self.assets, bytes);
        self.play("decode_buffer", module, rule)
    }

    fn decode_paired_manifest_asset(
        &self,
        module: &CompiledModule,
        manifest: &[u8],
        _asset: &[u8],
        _asset_type: &MediaType,
        _settings: Option<&str>,
    ) -> Result<DecodeResult, WireError> {
        let rule = self.lookup(&self.manifests, manifest);
        self.play("decode_paired_manifest_asset", module, rule)
    }

    fn decode_fragment(
        &self,
        module: &CompiledModule,
        _init: &[u8],
        fragment: &[u8],
        _media_type: &MediaType,
        _settings: Option<&str>,
    ) -> Result<DecodeResult, WireError> {
        let rule = self.lookup(&self.assets, fragment);
        self.play("decode_fragment", module, rule)
    }

    /// The new hash state is BLAKE3 over rolling hash, fragment, and anchor.
    fn decode_rolling_hash(
        &self,
        module: &CompiledModule,
        fragment: &[u8],
        rolling_hash: &[u8],
        anchor: Option<&[u8]>,
        _settings: Option<&str>,
    ) -> Result<Vec<u8>, WireError> {
        self.enter("decode_rolling_hash", module)?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(rolling_hash);
        hasher.update(fragment);
        if let Some(anchor) = anchor {
            hasher.update(anchor);
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(hasher.finalize().as_bytes().to_vec())
    }

    fn scan_presence(
        &self,
        module: &CompiledModule,
        bytes: &[u8],
    ) -> Result<ScanResult, WireError> {
        self.enter("scan_presence", module)?;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(bytes
            .windows(CONTAINER_MARKER.len())
            .position(|w| w == CONTAINER_MARKER)
            .map(|offset| ScanResult::at(offset as u64))
            .unwrap_or_else(ScanResult::absent))
    }
}
