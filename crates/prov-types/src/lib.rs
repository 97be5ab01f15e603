//! Foundation types for the provenance reader.
//!
//! Every other `prov-*` crate depends on this one. It has no async code and
//! no I/O: only the values that travel between the caller, the worker pool,
//! and the decode engine.
//!
//! # Key Types
//!
//! - [`JobId`] / [`JobCounter`]: Per-session job correlation ids
//! - [`ModuleDigest`]: BLAKE3 identity of a binary module
//! - [`MediaType`]: Validated `type/subtype` hint
//! - [`ToolkitSettings`]: Engine settings and their snake_case wire form
//! - [`DecodeResult`] / [`ScanResult`]: Worker outputs
//! - [`WireError`] / [`DecodeError`]: Cross-boundary error and its typed form

pub mod error;
pub mod fault;
pub mod ids;
pub mod media;
pub mod report;
pub mod settings;

pub use error::TypeError;
pub use fault::{DecodeError, WireError};
pub use ids::{JobCounter, JobId, ModuleDigest, SessionId};
pub use media::MediaType;
pub use report::{DecodeResult, ScanResult};
pub use settings::{
    snake_case_keys, to_snake_case, wire_settings, ToolkitSettings, TrustSettings, VerifySettings,
};
