//! Worker pool for the provenance reader.
//!
//! Decoding and verifying an asset is CPU-bound work that must never stall
//! the task driving a read. This crate runs it on a fixed set of background
//! workers that all share one compiled binary module.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use prov_pool::{ModuleSource, PoolConfig, ScriptedEngine, WorkerPool};
//! use prov_types::MediaType;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let engine = Arc::new(ScriptedEngine::new());
//! let pool = WorkerPool::initialize(engine, PoolConfig::with_workers(2)).unwrap();
//! let module = pool
//!     .load_module(ModuleSource::Bytes(ScriptedEngine::module_bytes()))
//!     .await
//!     .unwrap();
//! let scan = pool
//!     .scan_presence(&module, Bytes::from_static(b"no container here"))
//!     .await
//!     .unwrap();
//! assert!(!scan.found);
//! pool.dispose();
//! # }
//! ```

pub mod call;
pub mod config;
pub mod engine;
pub mod error;
pub mod pool;
pub mod scripted;

pub use call::{WorkerCall, WorkerReply};
pub use config::{OverflowPolicy, PoolConfig};
pub use engine::{CompiledModule, DecodeEngine, ModuleSource};
pub use error::{PoolError, PoolResult};
pub use pool::WorkerPool;
pub use scripted::{Scripted, ScriptedEngine};
