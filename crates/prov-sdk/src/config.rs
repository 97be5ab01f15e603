use bytes::Bytes;
use prov_pool::{CompiledModule, PoolConfig};
use prov_source::DownloaderConfig;
use prov_types::ToolkitSettings;
use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};

/// Where a session gets its binary module from.
#[derive(Clone, Debug)]
pub enum BinarySource {
    /// A module compiled earlier. Used as is.
    Compiled(CompiledModule),
    /// Module bytes to compile.
    Bytes(Bytes),
    /// A URL or file path to load the module bytes from.
    Locator(String),
}

/// Everything needed to create a [`crate::Session`].
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub module: BinarySource,
    /// Label for the worker contexts. Becomes the pool name in logs.
    pub worker_script: Option<String>,
    pub pool: PoolConfig,
    pub downloader: DownloaderConfig,
    /// Follow remote manifest pointers with a second decode. Default `true`.
    pub fetch_remote_manifests: bool,
    /// Settings applied to every call that does not bring its own.
    pub settings: Option<ToolkitSettings>,
}

impl SessionConfig {
    /// Defaults for everything but the module.
    pub fn new(module: BinarySource) -> Self {
        Self {
            module,
            worker_script: None,
            pool: PoolConfig::default(),
            downloader: DownloaderConfig::default(),
            fetch_remote_manifests: true,
            settings: None,
        }
    }

    /// Parse a TOML session file. The module must be given as a locator.
    pub fn from_toml_str(input: &str) -> SessionResult<Self> {
        let file: SessionFileConfig =
            toml::from_str(input).map_err(|e| SessionError::Config(e.to_string()))?;
        Ok(file.into())
    }

    /// The pool configuration with the worker label applied.
    pub fn effective_pool_config(&self) -> PoolConfig {
        let mut pool = self.pool.clone();
        if let Some(script) = self.worker_script.as_deref().filter(|s| !s.is_empty()) {
            pool.name = script.to_string();
        }
        pool
    }
}

/// On-disk form of [`SessionConfig`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionFileConfig {
    /// Module locator: a URL or a file path.
    pub module: String,
    #[serde(default)]
    pub worker_script: Option<String>,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub downloader: DownloaderConfig,
    #[serde(default = "default_fetch_remote_manifests")]
    pub fetch_remote_manifests: bool,
    #[serde(default)]
    pub settings: Option<ToolkitSettings>,
}

fn default_fetch_remote_manifests() -> bool {
    true
}

impl From<SessionFileConfig> for SessionConfig {
    fn from(file: SessionFileConfig) -> Self {
        Self {
            module: BinarySource::Locator(file.module),
            worker_script: file.worker_script,
            pool: file.pool,
            downloader: file.downloader,
            fetch_remote_manifests: file.fetch_remote_manifests,
            settings: file.settings,
        }
    }
}

/// Per-call options.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReadOptions {
    /// Replaces the session settings for this call only.
    pub settings: Option<ToolkitSettings>,
}

impl ReadOptions {
    pub fn with_settings(settings: ToolkitSettings) -> Self {
        Self {
            settings: Some(settings),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prov_pool::OverflowPolicy;

    #[test]
    fn defaults() {
        let c = SessionConfig::new(BinarySource::Bytes(Bytes::from_static(b"\0asm")));
        assert!(c.fetch_remote_manifests);
        assert!(c.settings.is_none());
        assert!(c.worker_script.is_none());
        assert_eq!(c.effective_pool_config(), PoolConfig::default());
    }

    #[test]
    fn worker_script_names_the_pool() {
        let mut c = SessionConfig::new(BinarySource::Locator("reader.wasm".into()));
        c.worker_script = Some("prov-reader-worker".into());
        assert_eq!(c.effective_pool_config().name, "prov-reader-worker");
    }

    #[test]
    fn minimal_toml() {
        let c =
            SessionConfig::from_toml_str(r#"module = "https://cdn.example/reader.wasm""#).unwrap();
        assert!(matches!(
            c.module,
            BinarySource::Locator(ref l) if l == "https://cdn.example/reader.wasm"
        ));
        assert!(c.fetch_remote_manifests);
        assert_eq!(c.downloader, DownloaderConfig::default());
    }

    #[test]
    fn full_toml() {
        let input = r#"
            module = "/opt/prov/reader.wasm"
            worker_script = "reader-worker"
            fetch_remote_manifests = false

            [pool]
            worker_count = 2
            queue_capacity = 16
            overflow = "reject"

            [downloader]
            max_concurrent = 4

            [downloader.headers]
            user-agent = "prov-reader"

            [settings.trust]
            trustAnchors = "-----BEGIN CERTIFICATE-----"

            [settings.verify]
            verifyTrust = true
        "#;
        let c = SessionConfig::from_toml_str(input).unwrap();
        assert!(!c.fetch_remote_manifests);
        assert_eq!(c.pool.worker_count, 2);
        assert_eq!(c.pool.overflow, OverflowPolicy::Reject);
        assert_eq!(c.downloader.max_concurrent, 4);
        assert_eq!(c.downloader.headers["user-agent"], "prov-reader");

        let settings = c.settings.unwrap();
        assert_eq!(
            settings.trust.unwrap().trust_anchors.as_deref(),
            Some("-----BEGIN CERTIFICATE-----")
        );
        assert_eq!(settings.verify.unwrap().verify_trust, Some(true));
    }

    #[test]
    fn missing_module_is_config_error() {
        let err = SessionConfig::from_toml_str("fetch_remote_manifests = true").unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));
    }
}
