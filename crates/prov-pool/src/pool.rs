use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use prov_types::{DecodeError, DecodeResult, MediaType, ScanResult, WireError};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::call::{WorkerCall, WorkerReply};
use crate::config::{OverflowPolicy, PoolConfig};
use crate::engine::{CompiledModule, DecodeEngine, ModuleSource};
use crate::error::{PoolError, PoolResult};

/// Why a worker could not produce a reply.
enum WorkerFault {
    Engine(WireError),
    Crashed(String),
}

/// A queued unit of work.
struct Job {
    ticket: u64,
    call: WorkerCall,
    module: CompiledModule,
    reply: oneshot::Sender<Result<WorkerReply, WorkerFault>>,
}

/// Receiving end of the job queue, shared by all workers.
type SharedQueue = Arc<AsyncMutex<mpsc::Receiver<Job>>>;

/// Decrements the pending-job count when a submission finishes, however it
/// finishes.
struct PendingGuard<'a>(&'a AtomicUsize);

impl<'a> PendingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A fixed-size set of background workers sharing one decode engine.
///
/// Jobs enter a bounded queue and are picked up by whichever worker is idle.
/// Each worker runs one engine call at a time on a blocking thread, so at
/// most `worker_count` calls execute in parallel. Replies come back through a
/// per-job channel; engine failures arrive as [`WireError`] and are decoded
/// into [`DecodeError`] here, at the boundary.
///
/// Disposal is the only cancellation primitive. It closes the queue, aborts
/// every worker, and makes every submission still waiting for a reply fail
/// with [`PoolError::Disposed`].
pub struct WorkerPool {
    config: PoolConfig,
    engine: Arc<dyn DecodeEngine>,
    queue: Mutex<Option<mpsc::Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    disposed: watch::Sender<bool>,
    tickets: AtomicU64,
    pending: AtomicUsize,
}

impl WorkerPool {
    /// Create the pool and start its workers.
    ///
    /// Must be called from within a Tokio runtime. Fails with
    /// [`PoolError::Initialization`] when the configuration is unusable, the
    /// engine reports an incompatible environment, or no runtime is running.
    pub fn initialize(engine: Arc<dyn DecodeEngine>, config: PoolConfig) -> PoolResult<Self> {
        config.validate().map_err(PoolError::Initialization)?;
        engine.check_compatibility().map_err(|reason| {
            PoolError::Initialization(format!("incompatible environment: {reason}"))
        })?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| PoolError::Initialization(format!("no async runtime: {e}")))?;

        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let shared: SharedQueue = Arc::new(AsyncMutex::new(receiver));

        let workers = (0..config.worker_count)
            .map(|index| {
                let name = format!("{}-{index}", config.name);
                runtime.spawn(run_worker(name, Arc::clone(&engine), Arc::clone(&shared)))
            })
            .collect::<Vec<_>>();

        let (disposed, _) = watch::channel(false);

        info!(
            pool = %config.name,
            workers = config.worker_count,
            queue_capacity = config.queue_capacity,
            "worker pool started"
        );

        Ok(Self {
            config,
            engine,
            queue: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            disposed,
            tickets: AtomicU64::new(0),
            pending: AtomicUsize::new(0),
        })
    }

    /// Produce a module every later call can share.
    ///
    /// Raw bytes are compiled once, here on the orchestrating side; a module
    /// that is already compiled is returned as is.
    pub async fn load_module(&self, source: ModuleSource) -> PoolResult<CompiledModule> {
        if self.is_disposed() {
            return Err(PoolError::Disposed);
        }
        match source {
            ModuleSource::Compiled(module) => {
                debug!(module = %module.digest().short_hex(), "using precompiled module");
                Ok(module)
            }
            ModuleSource::Bytes(bytes) => {
                let engine = Arc::clone(&self.engine);
                let size = bytes.len();
                let module = tokio::task::spawn_blocking(move || engine.compile_module(&bytes))
                    .await
                    .map_err(|e| PoolError::Compile(e.to_string()))?
                    .map_err(|w| PoolError::Compile(format!("{}: {}", w.name, w.message)))?;
                info!(module = %module.digest().short_hex(), bytes = size, "module compiled");
                Ok(module)
            }
        }
    }

    /// Send a call to the next idle worker and wait for its reply.
    pub async fn invoke(
        &self,
        module: &CompiledModule,
        call: WorkerCall,
    ) -> PoolResult<WorkerReply> {
        let method = call.method();
        let sender = self
            .queue
            .lock()
            .expect("pool queue lock poisoned")
            .clone()
            .ok_or(PoolError::Disposed)?;
        let mut disposed = self.disposed.subscribe();
        let _pending = PendingGuard::enter(&self.pending);

        let ticket = self.tickets.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        let job = Job {
            ticket,
            call,
            module: module.clone(),
            reply: reply_tx,
        };

        let overflow = self.config.overflow;
        let capacity = self.config.queue_capacity;
        let exchange = async move {
            match overflow {
                OverflowPolicy::Wait => sender
                    .send(job)
                    .await
                    .map_err(|_| PoolError::Disposed)?,
                OverflowPolicy::Reject => sender.try_send(job).map_err(|e| match e {
                    TrySendError::Full(_) => PoolError::QueueFull { capacity },
                    TrySendError::Closed(_) => PoolError::Disposed,
                })?,
            }
            drop(sender);
            debug!(ticket, method, "job queued");

            match reply_rx.await {
                Ok(Ok(reply)) => Ok(reply),
                Ok(Err(WorkerFault::Engine(wire))) => {
                    Err(PoolError::Decode(DecodeError::from_wire(wire)))
                }
                Ok(Err(WorkerFault::Crashed(message))) => {
                    Err(PoolError::WorkerCrashed { method, message })
                }
                Err(_) => Err(PoolError::Disposed),
            }
        };

        let guarded = async move {
            tokio::select! {
                biased;
                _ = disposed.wait_for(|d| *d) => Err(PoolError::Disposed),
                result = exchange => result,
            }
        };

        match self.config.task_timeout {
            Some(limit) => tokio::time::timeout(limit, guarded)
                .await
                .unwrap_or(Err(PoolError::Timeout(limit))),
            None => guarded.await,
        }
    }

    /// Decode and verify a complete asset.
    pub async fn decode_buffer(
        &self,
        module: &CompiledModule,
        bytes: Bytes,
        media_type: MediaType,
        settings: Option<String>,
    ) -> PoolResult<DecodeResult> {
        let call = WorkerCall::DecodeBuffer {
            bytes,
            media_type,
            settings,
        };
        expect_decoded(self.invoke(module, call).await?, "decode_buffer")
    }

    /// Decode a detached manifest against its asset.
    pub async fn decode_paired_manifest_asset(
        &self,
        module: &CompiledModule,
        manifest: Bytes,
        asset: Bytes,
        asset_type: MediaType,
        settings: Option<String>,
    ) -> PoolResult<DecodeResult> {
        let call = WorkerCall::DecodePairedManifestAsset {
            manifest,
            asset,
            asset_type,
            settings,
        };
        expect_decoded(
            self.invoke(module, call).await?,
            "decode_paired_manifest_asset",
        )
    }

    /// Decode one fragment against its init segment.
    pub async fn decode_fragment(
        &self,
        module: &CompiledModule,
        init: Bytes,
        fragment: Bytes,
        media_type: MediaType,
        settings: Option<String>,
    ) -> PoolResult<DecodeResult> {
        let call = WorkerCall::DecodeFragment {
            init,
            fragment,
            media_type,
            settings,
        };
        expect_decoded(self.invoke(module, call).await?, "decode_fragment")
    }

    /// Advance a rolling hash over one fragment.
    pub async fn decode_rolling_hash(
        &self,
        module: &CompiledModule,
        fragment: Bytes,
        rolling_hash: Bytes,
        anchor: Option<Bytes>,
        settings: Option<String>,
    ) -> PoolResult<Bytes> {
        let call = WorkerCall::DecodeRollingHash {
            fragment,
            rolling_hash,
            anchor,
            settings,
        };
        match self.invoke(module, call).await? {
            WorkerReply::RollingHash(hash) => Ok(hash),
            _ => Err(PoolError::UnexpectedReply {
                method: "decode_rolling_hash",
            }),
        }
    }

    /// Look for a provenance container without decoding it.
    pub async fn scan_presence(
        &self,
        module: &CompiledModule,
        bytes: Bytes,
    ) -> PoolResult<ScanResult> {
        match self.invoke(module, WorkerCall::ScanPresence { bytes }).await? {
            WorkerReply::Scan(scan) => Ok(scan),
            _ => Err(PoolError::UnexpectedReply {
                method: "scan_presence",
            }),
        }
    }

    /// Terminate all workers. Safe to call more than once and while jobs are
    /// outstanding; every job without a reply fails with
    /// [`PoolError::Disposed`].
    pub fn dispose(&self) {
        if self.disposed.send_replace(true) {
            return;
        }
        drop(self.queue.lock().expect("pool queue lock poisoned").take());
        let workers = std::mem::take(&mut *self.workers.lock().expect("worker list poisoned"));
        for worker in &workers {
            worker.abort();
        }
        info!(
            pool = %self.config.name,
            workers = workers.len(),
            pending = self.pending_jobs(),
            "worker pool disposed"
        );
    }

    /// Returns `true` once [`Self::dispose`] has been called.
    pub fn is_disposed(&self) -> bool {
        *self.disposed.borrow()
    }

    /// Submissions that have not yet received a reply.
    pub fn pending_jobs(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Number of workers the pool was started with.
    pub fn worker_count(&self) -> usize {
        self.config.worker_count
    }

    /// The active configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.config.name)
            .field("workers", &self.config.worker_count)
            .field("pending", &self.pending_jobs())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Worker loop: take the next job, run it on a blocking thread, reply.
async fn run_worker(name: String, engine: Arc<dyn DecodeEngine>, queue: SharedQueue) {
    loop {
        let next = queue.lock().await.recv().await;
        let Some(job) = next else {
            debug!(worker = %name, "queue closed, worker exiting");
            break;
        };
        let Job {
            ticket,
            call,
            module,
            reply,
        } = job;
        if reply.is_closed() {
            debug!(worker = %name, ticket, "caller gone, skipping job");
            continue;
        }

        let method = call.method();
        debug!(worker = %name, ticket, method, "job started");
        let engine = Arc::clone(&engine);
        let outcome =
            tokio::task::spawn_blocking(move || call.execute(engine.as_ref(), &module)).await;

        let reply_value = match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(wire)) => {
                debug!(worker = %name, ticket, error = %wire.name, "job failed");
                Err(WorkerFault::Engine(wire))
            }
            Err(join) => {
                let message = if join.is_panic() {
                    panic_message(join.into_panic())
                } else {
                    join.to_string()
                };
                warn!(worker = %name, ticket, method, %message, "worker call crashed");
                Err(WorkerFault::Crashed(message))
            }
        };
        // The caller may have timed out or been disposed; nothing to do then.
        let _ = reply.send(reply_value);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".into()
    }
}

fn expect_decoded(reply: WorkerReply, method: &'static str) -> PoolResult<DecodeResult> {
    match reply {
        WorkerReply::Decoded(result) => Ok(result),
        _ => Err(PoolError::UnexpectedReply { method }),
    }
}
