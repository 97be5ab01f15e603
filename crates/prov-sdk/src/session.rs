use std::sync::Arc;

use bytes::Bytes;
use futures::future::try_join_all;
use prov_pool::{CompiledModule, DecodeEngine, ModuleSource, PoolError, WorkerPool};
use prov_source::{AssetInput, Downloader, Fetcher, HttpFetcher, Source, SourceAdapter};
use prov_types::{
    wire_settings, DecodeResult, JobCounter, JobId, ScanResult, SessionId, ToolkitSettings,
};
use tracing::{debug, info};

use crate::builder::{ManifestStoreBuilder, RawManifestBuilder};
use crate::config::{BinarySource, ReadOptions, SessionConfig};
use crate::error::{SessionError, SessionResult};
use crate::recovery::Recovery;

/// A manifest store (or none) paired with the source it was read from.
#[derive(Clone, Debug, PartialEq)]
pub struct ReadResult<S> {
    pub manifest_store: Option<S>,
    pub source: Source,
}

impl<S> ReadResult<S> {
    fn empty(source: Source) -> Self {
        Self {
            manifest_store: None,
            source,
        }
    }
}

/// A reader session: one worker pool, one compiled module, many reads.
///
/// Every read gets a job id, resolves its input to a [`Source`], and, when
/// there are bytes to decode, dispatches to the pool. Failures go through
/// recovery once. Reads may overlap freely; the pool bounds how many decode
/// at the same time.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use prov_pool::ScriptedEngine;
/// use prov_sdk::{AssetInput, BinarySource, ReadOptions, Session, SessionConfig};
/// use prov_source::InMemoryFetcher;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let config = SessionConfig::new(BinarySource::Bytes(ScriptedEngine::module_bytes()));
/// let session = Session::create_with_fetcher(
///     config,
///     Arc::new(ScriptedEngine::new()),
///     Arc::new(InMemoryFetcher::new()),
/// )
/// .await
/// .unwrap();
///
/// let result = session
///     .read(AssetInput::blob(&b"plain pixels"[..], "image/png"), ReadOptions::default())
///     .await
///     .unwrap();
/// assert!(result.manifest_store.is_none());
/// session.dispose();
/// # }
/// ```
pub struct Session<B: ManifestStoreBuilder = RawManifestBuilder> {
    id: SessionId,
    pool: WorkerPool,
    module: CompiledModule,
    downloader: Arc<Downloader>,
    adapter: SourceAdapter,
    builder: B,
    jobs: JobCounter,
    fetch_remote_manifests: bool,
    settings: Option<ToolkitSettings>,
}

impl Session<RawManifestBuilder> {
    /// Create a session that fetches remote inputs over HTTP.
    pub async fn create(
        config: SessionConfig,
        engine: Arc<dyn DecodeEngine>,
    ) -> SessionResult<Self> {
        Self::create_with_fetcher(config, engine, Arc::new(HttpFetcher::new())).await
    }

    /// Create a session over an arbitrary fetcher.
    pub async fn create_with_fetcher(
        config: SessionConfig,
        engine: Arc<dyn DecodeEngine>,
        fetcher: Arc<dyn Fetcher>,
    ) -> SessionResult<Self> {
        Session::with_builder(config, engine, fetcher, RawManifestBuilder).await
    }
}

impl<B: ManifestStoreBuilder> Session<B> {
    /// Create a session whose manifest stores are built by `builder`.
    ///
    /// Starts the pool and compiles the module exactly once. The module is
    /// shared by every call this session makes.
    pub async fn with_builder(
        config: SessionConfig,
        engine: Arc<dyn DecodeEngine>,
        fetcher: Arc<dyn Fetcher>,
        builder: B,
    ) -> SessionResult<Self> {
        let id = SessionId::new();
        let pool = WorkerPool::initialize(engine, config.effective_pool_config())?;
        let downloader = Arc::new(Downloader::new(fetcher, config.downloader.clone()));

        let module_source = match config.module {
            BinarySource::Compiled(module) => ModuleSource::Compiled(module),
            BinarySource::Bytes(bytes) => ModuleSource::Bytes(bytes),
            BinarySource::Locator(locator) => {
                ModuleSource::Bytes(fetch_module(&downloader, &locator).await?)
            }
        };
        let module = pool.load_module(module_source).await?;

        info!(
            session = %id,
            module = %module.digest().short_hex(),
            workers = pool.worker_count(),
            fetch_remote_manifests = config.fetch_remote_manifests,
            "session created"
        );

        Ok(Self {
            id,
            pool,
            module,
            adapter: SourceAdapter::new(Arc::clone(&downloader)),
            downloader,
            builder,
            jobs: JobCounter::new(),
            fetch_remote_manifests: config.fetch_remote_manifests,
            settings: config.settings,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The module every call runs against.
    pub fn module(&self) -> &CompiledModule {
        &self.module
    }

    /// Job ids handed out so far.
    pub fn jobs_issued(&self) -> u64 {
        self.jobs.issued()
    }

    pub fn is_disposed(&self) -> bool {
        self.pool.is_disposed()
    }

    /// Read the manifest store of one asset.
    ///
    /// Resolves to no manifest store when the input has no bytes or carries
    /// no usable provenance. Fails when the session is disposed, the input is
    /// unusable for recovery, or the engine raises an error recovery does
    /// not handle.
    pub async fn read(
        &self,
        input: AssetInput,
        options: ReadOptions,
    ) -> SessionResult<ReadResult<B::Store>> {
        self.ensure_live()?;
        let job = self.start_job("read");
        let outcome = self.read_job(job, input, &options).await;
        finish(job, outcome)
    }

    /// Read a locator string: a URL or a file path.
    pub async fn read_locator(
        &self,
        locator: &str,
        options: ReadOptions,
    ) -> SessionResult<ReadResult<B::Store>> {
        self.ensure_live()?;
        self.read(AssetInput::from_locator(locator)?, options).await
    }

    /// Read every input concurrently. Results line up with `inputs`; the
    /// first failure fails the whole call.
    pub async fn read_all(
        &self,
        inputs: Vec<AssetInput>,
        options: ReadOptions,
    ) -> SessionResult<Vec<ReadResult<B::Store>>> {
        self.ensure_live()?;
        try_join_all(
            inputs
                .into_iter()
                .map(|input| self.read(input, options.clone())),
        )
        .await
    }

    /// Read one fragment of a fragmented stream against its init segment.
    ///
    /// The result is paired with the init segment's source.
    pub async fn read_fragment(
        &self,
        init: AssetInput,
        fragment: AssetInput,
        options: ReadOptions,
    ) -> SessionResult<ReadResult<B::Store>> {
        self.ensure_live()?;
        let job = self.start_job("read_fragment");
        let outcome = self.read_fragment_job(job, init, fragment, &options).await;
        finish(job, outcome)
    }

    /// Advance a rolling hash over `fragment`, returning the new hash state.
    ///
    /// Arguments are in the order `(fragment, rolling_hash, anchor)`. No
    /// manifest store is built and no recovery is attempted.
    pub async fn read_rolling_hash(
        &self,
        fragment: Bytes,
        rolling_hash: Bytes,
        anchor: Option<Bytes>,
        options: ReadOptions,
    ) -> SessionResult<Bytes> {
        self.ensure_live()?;
        let job = self.start_job("read_rolling_hash");
        let outcome: SessionResult<Bytes> = async {
            if fragment.is_empty() {
                return Err(SessionError::InvalidInput(
                    "rolling hash needs fragment bytes".into(),
                ));
            }
            let settings = self.wire_settings(&options)?;
            debug!(%job, state = "dispatched", bytes = fragment.len(), "job state");
            Ok(self
                .pool
                .decode_rolling_hash(&self.module, fragment, rolling_hash, anchor, settings)
                .await?)
        }
        .await;
        finish(job, outcome)
    }

    /// Check whether an asset carries a provenance container, without
    /// decoding it.
    pub async fn scan(&self, input: AssetInput) -> SessionResult<ScanResult> {
        self.ensure_live()?;
        let job = self.start_job("scan");
        let outcome: SessionResult<ScanResult> = async {
            let source = self.resolve(job, input).await;
            match source.bytes() {
                Some(bytes) => Ok(self.pool.scan_presence(&self.module, bytes).await?),
                None => Ok(ScanResult::absent()),
            }
        }
        .await;
        finish(job, outcome)
    }

    /// Release the worker pool. Reads still waiting fail with
    /// [`SessionError::PoolDisposed`], as does every later call. Calling it
    /// again does nothing.
    pub fn dispose(&self) {
        if self.pool.is_disposed() {
            return;
        }
        self.pool.dispose();
        info!(session = %self.id, jobs = self.jobs.issued(), "session disposed");
    }

    async fn read_job(
        &self,
        job: JobId,
        input: AssetInput,
        options: &ReadOptions,
    ) -> SessionResult<ReadResult<B::Store>> {
        let source = self.resolve(job, input).await;
        let Some(bytes) = source.bytes() else {
            return Ok(ReadResult::empty(source));
        };
        let settings = self.wire_settings(options)?;

        debug!(%job, state = "dispatched", bytes = bytes.len(), "job state");
        let decoded = self
            .pool
            .decode_buffer(
                &self.module,
                bytes,
                source.media_type().clone(),
                settings.clone(),
            )
            .await;
        self.complete(job, decoded, source, settings).await
    }

    async fn read_fragment_job(
        &self,
        job: JobId,
        init: AssetInput,
        fragment: AssetInput,
        options: &ReadOptions,
    ) -> SessionResult<ReadResult<B::Store>> {
        let (init, fragment) = tokio::join!(self.resolve(job, init), self.resolve(job, fragment));
        let (Some(init_bytes), Some(fragment_bytes)) = (init.bytes(), fragment.bytes()) else {
            return Ok(ReadResult::empty(init));
        };
        let settings = self.wire_settings(options)?;

        debug!(%job, state = "dispatched", bytes = fragment_bytes.len(), "job state");
        let decoded = self
            .pool
            .decode_fragment(
                &self.module,
                init_bytes,
                fragment_bytes,
                init.media_type().clone(),
                settings.clone(),
            )
            .await;
        self.complete(job, decoded, init, settings).await
    }

    /// Turn a decode outcome into a read result, recovering on failure.
    async fn complete(
        &self,
        job: JobId,
        decoded: Result<DecodeResult, PoolError>,
        source: Source,
        settings: Option<String>,
    ) -> SessionResult<ReadResult<B::Store>> {
        let result = match decoded {
            Ok(result) => Some(result),
            Err(PoolError::Decode(error)) => {
                debug!(%job, state = "recovering", error = %error, "job state");
                self.recovery().recover(job, error, &source, settings).await?
            }
            Err(other) => return Err(other.into()),
        };
        let manifest_store = result
            .map(|result| self.builder.build(result, &source))
            .transpose()?;
        Ok(ReadResult {
            manifest_store,
            source,
        })
    }

    async fn resolve(&self, job: JobId, input: AssetInput) -> Source {
        let source = self.adapter.resolve(input).await;
        debug!(
            %job,
            state = "source_resolved",
            kind = %source.kind(),
            bytes_available = source.bytes_available(),
            "job state"
        );
        source
    }

    fn recovery(&self) -> Recovery<'_> {
        Recovery {
            pool: &self.pool,
            module: &self.module,
            downloader: &self.downloader,
            fetch_remote_manifests: self.fetch_remote_manifests,
        }
    }

    /// Wire form of the settings for one call: the call's own, else the
    /// session's, else none.
    pub(crate) fn wire_settings(&self, options: &ReadOptions) -> SessionResult<Option<String>> {
        let settings = options.settings.as_ref().or(self.settings.as_ref());
        Ok(wire_settings(settings)?)
    }

    fn start_job(&self, operation: &'static str) -> JobId {
        let job = self.jobs.next_id();
        debug!(session = %self.id, %job, operation, state = "created", "job state");
        job
    }

    fn ensure_live(&self) -> SessionResult<()> {
        if self.pool.is_disposed() {
            return Err(SessionError::PoolDisposed);
        }
        Ok(())
    }
}

impl<B: ManifestStoreBuilder> Drop for Session<B> {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn finish<T>(job: JobId, outcome: SessionResult<T>) -> SessionResult<T> {
    match &outcome {
        Ok(_) => debug!(%job, state = "completed", "job state"),
        Err(e) => debug!(%job, state = "failed", error = %e, "job state"),
    }
    outcome
}

/// Load module bytes from a URL or a file path.
async fn fetch_module(downloader: &Downloader, locator: &str) -> SessionResult<Bytes> {
    match AssetInput::from_locator(locator)? {
        AssetInput::Url(url) => Ok(downloader.download(&url).await?.bytes),
        AssetInput::File { path, .. } => tokio::fs::read(&path)
            .await
            .map(Bytes::from)
            .map_err(|e| {
                SessionError::Config(format!("cannot read module {}: {e}", path.display()))
            }),
        other => Err(SessionError::InvalidInput(format!(
            "unusable module locator: {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use prov_pool::{PoolConfig, Scripted, ScriptedEngine};
    use prov_source::{DownloadError, InMemoryFetcher, SourceKind};
    use prov_types::{DecodeError, TrustSettings, WireError};

    use crate::builder::RawManifestStore;

    const MANIFEST_URL: &str = "https://manifests.example/m/1.c2pa";

    struct Fixture {
        engine: Arc<ScriptedEngine>,
        fetcher: Arc<InMemoryFetcher>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                engine: Arc::new(ScriptedEngine::new()),
                fetcher: Arc::new(InMemoryFetcher::new()),
            }
        }

        fn config(&self) -> SessionConfig {
            let mut config =
                SessionConfig::new(BinarySource::Bytes(ScriptedEngine::module_bytes()));
            config.pool = PoolConfig::with_workers(2);
            config
        }

        async fn session(&self) -> Session {
            self.session_with(self.config()).await
        }

        async fn session_with(&self, config: SessionConfig) -> Session {
            Session::create_with_fetcher(
                config,
                Arc::clone(&self.engine) as Arc<dyn DecodeEngine>,
                Arc::clone(&self.fetcher) as Arc<dyn Fetcher>,
            )
            .await
            .unwrap()
        }
    }

    fn report(label: &str) -> Scripted {
        Scripted::Report(DecodeResult::new(format!(r#"{{"active_manifest":"{label}"}}"#)))
    }

    fn blob(bytes: &'static [u8]) -> AssetInput {
        AssetInput::blob(bytes, "image/jpeg")
    }

    fn label(result: &ReadResult<RawManifestStore>) -> Option<&str> {
        result.manifest_store.as_ref()?.active_manifest()
    }

    #[tokio::test]
    async fn no_provenance_reads_as_none() {
        let fx = Fixture::new();
        let session = fx.session().await;

        let result = session.read(blob(b"plain pixels"), ReadOptions::default()).await.unwrap();
        assert!(result.manifest_store.is_none());
        assert_eq!(result.source.kind(), SourceKind::Blob);
        assert_eq!(result.source.bytes().unwrap(), Bytes::from_static(b"plain pixels"));
        assert_eq!(fx.engine.calls("decode_buffer"), 1);
    }

    #[tokio::test]
    async fn decoded_report_is_built() {
        let fx = Fixture::new();
        fx.engine.on_asset(
            b"signed",
            Scripted::Report(
                DecodeResult::new(r#"{"active_manifest":"urn:c2pa:signed"}"#)
                    .with_cawg(r#"{"identity":"alice"}"#),
            ),
        );
        let session = fx.session().await;

        let result = session.read(blob(b"signed"), ReadOptions::default()).await.unwrap();
        let store = result.manifest_store.unwrap();
        assert_eq!(store.active_manifest(), Some("urn:c2pa:signed"));
        assert_eq!(store.cawg.unwrap()["identity"], "alice");
    }

    #[tokio::test]
    async fn unloadable_input_never_dispatches() {
        let fx = Fixture::new();
        fx.fetcher.fail_with_status("https://cdn.example/a.jpg", 404);
        let session = fx.session().await;

        let result = session
            .read(AssetInput::url("https://cdn.example/a.jpg"), ReadOptions::default())
            .await
            .unwrap();
        assert!(result.manifest_store.is_none());
        assert!(!result.source.bytes_available());
        assert_eq!(result.source.url(), Some("https://cdn.example/a.jpg"));
        assert_eq!(fx.engine.total_calls(), 0);
    }

    #[tokio::test]
    async fn url_input_is_downloaded_and_decoded() {
        let fx = Fixture::new();
        fx.fetcher
            .serve("https://cdn.example/b.jpg", &b"remote asset"[..], Some("image/jpeg"));
        fx.engine.on_asset(b"remote asset", report("urn:c2pa:url"));
        let session = fx.session().await;

        let result = session
            .read_locator("https://cdn.example/b.jpg", ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(label(&result), Some("urn:c2pa:url"));
        assert_eq!(result.source.media_type().as_str(), "image/jpeg");
    }

    #[tokio::test]
    async fn unsupported_locator_is_invalid_input() {
        let fx = Fixture::new();
        let session = fx.session().await;
        let err = session
            .read_locator("ftp://files.example/a.jpg", ReadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidInput(_)));
        assert_eq!(fx.engine.total_calls(), 0);
    }

    #[tokio::test]
    async fn remote_manifest_is_fetched_and_paired_once() {
        let fx = Fixture::new();
        fx.engine.on_asset(b"pointer", Scripted::remote_manifest(MANIFEST_URL));
        fx.fetcher.serve(MANIFEST_URL, &b"manifest bytes"[..], None);
        fx.engine.on_manifest(b"manifest bytes", report("urn:c2pa:remote"));
        let session = fx.session().await;

        let result = session.read(blob(b"pointer"), ReadOptions::default()).await.unwrap();
        assert_eq!(label(&result), Some("urn:c2pa:remote"));
        assert_eq!(result.source.bytes().unwrap(), Bytes::from_static(b"pointer"));
        assert_eq!(fx.fetcher.hits(MANIFEST_URL), 1);
        assert_eq!(fx.engine.calls("decode_buffer"), 1);
        assert_eq!(fx.engine.calls("decode_paired_manifest_asset"), 1);
    }

    #[tokio::test]
    async fn remote_fetching_can_be_disabled() {
        let fx = Fixture::new();
        fx.engine.on_asset(b"pointer", Scripted::remote_manifest(MANIFEST_URL));
        fx.fetcher.serve(MANIFEST_URL, &b"manifest bytes"[..], None);
        let mut config = fx.config();
        config.fetch_remote_manifests = false;
        let session = fx.session_with(config).await;

        let result = session.read(blob(b"pointer"), ReadOptions::default()).await.unwrap();
        assert!(result.manifest_store.is_none());
        assert_eq!(fx.fetcher.total_hits(), 0);
        assert_eq!(fx.engine.calls("decode_paired_manifest_asset"), 0);
    }

    #[tokio::test]
    async fn malformed_remote_url_reads_as_none() {
        let fx = Fixture::new();
        fx.engine.on_asset(b"pointer", Scripted::remote_manifest("http://[::1/m.c2pa"));
        let session = fx.session().await;

        let result = session.read(blob(b"pointer"), ReadOptions::default()).await.unwrap();
        assert!(result.manifest_store.is_none());
        assert_eq!(fx.fetcher.total_hits(), 0);
        assert_eq!(fx.engine.calls("decode_paired_manifest_asset"), 0);
    }

    #[tokio::test]
    async fn remote_fetch_failure_propagates() {
        let fx = Fixture::new();
        fx.engine.on_asset(b"pointer", Scripted::remote_manifest(MANIFEST_URL));
        fx.fetcher.fail_with_status(MANIFEST_URL, 503);
        let session = fx.session().await;

        let err = session.read(blob(b"pointer"), ReadOptions::default()).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Download(DownloadError::Status { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn unknown_engine_errors_propagate_unchanged() {
        let fx = Fixture::new();
        fx.engine.on_asset(
            b"tampered",
            Scripted::Fail(WireError::new("Toolkit(Signature(Mismatch))", "hash mismatch")),
        );
        let session = fx.session().await;

        let err = session.read(blob(b"tampered"), ReadOptions::default()).await.unwrap_err();
        match err {
            SessionError::Decode(DecodeError::Engine { name, message }) => {
                assert_eq!(name, "Toolkit(Signature(Mismatch))");
                assert_eq!(message, "hash mismatch");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_container_reads_as_none() {
        let fx = Fixture::new();
        fx.engine.on_asset(
            b"broken",
            Scripted::Fail(WireError::new(
                "Toolkit(C2pa(JumbfParseError(InvalidBoxHeader)))",
                "bad header",
            )),
        );
        let session = fx.session().await;
        let result = session.read(blob(b"broken"), ReadOptions::default()).await.unwrap();
        assert!(result.manifest_store.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn read_all_keeps_input_order() {
        let fx = Fixture::new();
        fx.engine
            .on_asset_delayed(b"first", report("a"), Duration::from_millis(200));
        fx.engine.on_asset(b"second", report("b"));
        let session = fx.session().await;

        let results = session
            .read_all(
                vec![blob(b"first"), blob(b"second"), blob(b"third")],
                ReadOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(label(&results[0]), Some("a"));
        assert_eq!(label(&results[1]), Some("b"));
        assert!(results[2].manifest_store.is_none());
        assert_eq!(results[2].source.bytes().unwrap(), Bytes::from_static(b"third"));
        assert_eq!(session.jobs_issued(), 3);
    }

    #[tokio::test]
    async fn read_all_fails_on_first_error() {
        let fx = Fixture::new();
        fx.engine
            .on_asset(b"bad", Scripted::Fail(WireError::new("Toolkit(Other)", "nope")));
        let session = fx.session().await;

        let err = session
            .read_all(vec![blob(b"ok"), blob(b"bad")], ReadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Decode(_)));
    }

    #[tokio::test]
    async fn dispose_rejects_pending_and_later_reads() {
        let fx = Fixture::new();
        fx.engine
            .on_asset_delayed(b"slow", report("slow"), Duration::from_millis(300));
        let session = Arc::new(fx.session().await);

        let pending = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.read(blob(b"slow"), ReadOptions::default()).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.dispose();
        session.dispose();

        assert!(matches!(pending.await.unwrap(), Err(SessionError::PoolDisposed)));
        assert!(session.is_disposed());
        assert!(matches!(
            session.read(blob(b"slow"), ReadOptions::default()).await,
            Err(SessionError::PoolDisposed)
        ));
        assert!(matches!(
            session
                .read(AssetInput::url("https://cdn.example/never"), ReadOptions::default())
                .await,
            Err(SessionError::PoolDisposed)
        ));
        assert!(matches!(
            session
                .read_rolling_hash(
                    Bytes::from_static(b"frag"),
                    Bytes::new(),
                    None,
                    ReadOptions::default()
                )
                .await,
            Err(SessionError::PoolDisposed)
        ));
        assert_eq!(fx.fetcher.total_hits(), 0);
    }

    #[tokio::test]
    async fn disposed_session_rejects_locators_before_parsing() {
        let fx = Fixture::new();
        let session = fx.session().await;
        session.dispose();

        let err = session
            .read_locator("ftp://files.example/a.jpg", ReadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::PoolDisposed));
        let err = session
            .read_locator("https://cdn.example/b.jpg", ReadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::PoolDisposed));
        assert_eq!(fx.fetcher.total_hits(), 0);
    }

    #[tokio::test]
    async fn repeated_reads_are_identical() {
        let fx = Fixture::new();
        fx.engine.on_asset(b"signed", report("urn:c2pa:same"));
        let session = fx.session().await;

        let first = session.read(blob(b"signed"), ReadOptions::default()).await.unwrap();
        let second = session.read(blob(b"signed"), ReadOptions::default()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(session.jobs_issued(), 2);
    }

    #[tokio::test]
    async fn settings_reach_the_wire_in_snake_case() {
        let fx = Fixture::new();
        let mut config = fx.config();
        config.settings = Some(ToolkitSettings {
            trust: Some(TrustSettings {
                trust_anchors: Some("session".into()),
                ..Default::default()
            }),
            ..Default::default()
        });
        let session = fx.session_with(config).await;

        assert_eq!(
            session.wire_settings(&ReadOptions::default()).unwrap().as_deref(),
            Some(r#"{"trust":{"trust_anchors":"session"}}"#)
        );

        let per_call = ToolkitSettings::from_value(serde_json::json!({
            "trust": { "trustAnchors": "x" }
        }))
        .unwrap();
        assert_eq!(
            session
                .wire_settings(&ReadOptions::with_settings(per_call))
                .unwrap()
                .as_deref(),
            Some(r#"{"trust":{"trust_anchors":"x"}}"#)
        );
    }

    #[tokio::test]
    async fn absent_settings_stay_absent() {
        let fx = Fixture::new();
        let session = fx.session().await;
        assert!(session.wire_settings(&ReadOptions::default()).unwrap().is_none());
    }

    #[tokio::test]
    async fn fragment_result_pairs_with_init() {
        let fx = Fixture::new();
        fx.engine.on_asset(b"moof-1", report("urn:c2pa:stream"));
        let session = fx.session().await;

        let result = session
            .read_fragment(
                AssetInput::blob(&b"init segment"[..], "video/mp4"),
                AssetInput::blob(&b"moof-1"[..], "video/mp4"),
                ReadOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(label(&result), Some("urn:c2pa:stream"));
        assert_eq!(result.source.bytes().unwrap(), Bytes::from_static(b"init segment"));
        assert_eq!(fx.engine.calls("decode_fragment"), 1);
    }

    #[tokio::test]
    async fn fragment_without_bytes_never_dispatches() {
        let fx = Fixture::new();
        let session = fx.session().await;
        let result = session
            .read_fragment(
                AssetInput::blob(&b"init segment"[..], "video/mp4"),
                AssetInput::url("https://cdn.example/missing.m4s"),
                ReadOptions::default(),
            )
            .await
            .unwrap();
        assert!(result.manifest_store.is_none());
        assert_eq!(fx.engine.total_calls(), 0);
    }

    #[tokio::test]
    async fn rolling_hash_returns_raw_bytes() {
        let fx = Fixture::new();
        let session = fx.session().await;

        let hash = session
            .read_rolling_hash(
                Bytes::from_static(b"fragment"),
                Bytes::from_static(b"previous"),
                Some(Bytes::from_static(b"anchor")),
                ReadOptions::default(),
            )
            .await
            .unwrap();

        let mut expected = blake3::Hasher::new();
        expected.update(b"previous");
        expected.update(b"fragment");
        expected.update(b"anchor");
        assert_eq!(&hash[..], expected.finalize().as_bytes());
        assert_eq!(fx.engine.calls("decode_rolling_hash"), 1);
    }

    #[tokio::test]
    async fn rolling_hash_needs_a_fragment() {
        let fx = Fixture::new();
        let session = fx.session().await;
        let err = session
            .read_rolling_hash(Bytes::new(), Bytes::new(), None, ReadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidInput(_)));
        assert_eq!(fx.engine.total_calls(), 0);
    }

    #[tokio::test]
    async fn scan_reports_container_offset() {
        let fx = Fixture::new();
        let session = fx.session().await;

        let scan = session.scan(blob(b"xxxxjumbrest")).await.unwrap();
        assert!(scan.found);
        assert_eq!(scan.offset, Some(4));

        let scan = session
            .scan(AssetInput::url("https://cdn.example/gone.jpg"))
            .await
            .unwrap();
        assert_eq!(scan, ScanResult::absent());
        assert_eq!(fx.engine.calls("scan_presence"), 1);
    }

    #[tokio::test]
    async fn module_compiled_once_per_session() {
        let fx = Fixture::new();
        let session = fx.session().await;
        for _ in 0..3 {
            session.read(blob(b"plain"), ReadOptions::default()).await.unwrap();
        }
        assert_eq!(fx.engine.compile_count(), 1);
    }

    #[tokio::test]
    async fn precompiled_module_is_reused() {
        let fx = Fixture::new();
        let first = fx.session().await;
        let mut config = fx.config();
        config.module = BinarySource::Compiled(first.module().clone());

        let second = fx.session_with(config).await;
        assert!(second.module().same_module(first.module()));
        assert_eq!(fx.engine.compile_count(), 1);
    }

    #[tokio::test]
    async fn module_from_file_locator() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reader.wasm");
        std::fs::write(&path, ScriptedEngine::module_bytes()).unwrap();

        let fx = Fixture::new();
        let mut config = fx.config();
        config.module = BinarySource::Locator(path.to_string_lossy().into_owned());
        let session = fx.session_with(config).await;
        assert_eq!(
            session.module().digest(),
            prov_types::ModuleDigest::from_bytes(&ScriptedEngine::module_bytes())
        );
    }

    #[tokio::test]
    async fn module_from_url_locator() {
        let fx = Fixture::new();
        fx.fetcher.serve(
            "https://cdn.example/reader.wasm",
            ScriptedEngine::module_bytes(),
            Some("application/wasm"),
        );
        let mut config = fx.config();
        config.module = BinarySource::Locator("https://cdn.example/reader.wasm".into());
        let _session = fx.session_with(config).await;
        assert_eq!(fx.fetcher.hits("https://cdn.example/reader.wasm"), 1);
    }

    #[tokio::test]
    async fn bad_module_fails_creation() {
        let fx = Fixture::new();
        let mut config = fx.config();
        config.module = BinarySource::Bytes(Bytes::from_static(b"not wasm"));
        let err = Session::create_with_fetcher(
            config,
            Arc::clone(&fx.engine) as Arc<dyn DecodeEngine>,
            Arc::clone(&fx.fetcher) as Arc<dyn Fetcher>,
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, SessionError::Pool(PoolError::Compile(_))));
    }

    #[tokio::test]
    async fn incompatible_engine_fails_creation() {
        let fx = Fixture::new();
        let engine = Arc::new(ScriptedEngine::new().incompatible("no threads"));
        let err = Session::create_with_fetcher(
            fx.config(),
            engine,
            Arc::clone(&fx.fetcher) as Arc<dyn Fetcher>,
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, SessionError::Pool(PoolError::Initialization(_))));
    }
}
