use prov_source::Source;
use prov_types::DecodeResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{SessionError, SessionResult};

/// Turns a raw decode result into the manifest store handed to callers.
///
/// The session never looks inside a [`DecodeResult`]; whatever structure the
/// caller wants is built here.
pub trait ManifestStoreBuilder: Send + Sync {
    type Store: Send;

    fn build(&self, result: DecodeResult, source: &Source) -> SessionResult<Self::Store>;
}

/// A manifest store as parsed JSON, with the CAWG payload alongside.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawManifestStore {
    pub manifest_store: Value,
    /// `None` when the engine sent no CAWG payload or it did not parse.
    pub cawg: Option<Value>,
}

impl RawManifestStore {
    /// Label of the active manifest, when the store names one.
    pub fn active_manifest(&self) -> Option<&str> {
        self.manifest_store.get("active_manifest")?.as_str()
    }
}

/// Parses both payloads of a [`DecodeResult`] as JSON, independently.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawManifestBuilder;

impl ManifestStoreBuilder for RawManifestBuilder {
    type Store = RawManifestStore;

    fn build(&self, result: DecodeResult, source: &Source) -> SessionResult<RawManifestStore> {
        let manifest_store = serde_json::from_str(&result.manifest_store_payload)
            .map_err(|e| SessionError::Builder(format!("manifest store payload: {e}")))?;

        let cawg = result
            .cawg_payload
            .as_deref()
            .and_then(|payload| match serde_json::from_str(payload) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(kind = %source.kind(), error = %e, "dropping unparseable CAWG payload");
                    None
                }
            });

        Ok(RawManifestStore {
            manifest_store,
            cawg,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use prov_source::SourceKind;
    use prov_types::MediaType;

    fn source() -> Source {
        Source::from_bytes(
            SourceKind::Blob,
            Bytes::from_static(b"asset"),
            MediaType::octet_stream(),
        )
    }

    #[test]
    fn parses_both_payloads() {
        let result = DecodeResult::new(r#"{"active_manifest":"urn:c2pa:1","manifests":{}}"#)
            .with_cawg(r#"{"identity":"alice"}"#);
        let store = RawManifestBuilder.build(result, &source()).unwrap();
        assert_eq!(store.active_manifest(), Some("urn:c2pa:1"));
        assert_eq!(store.cawg.unwrap()["identity"], "alice");
    }

    #[test]
    fn bad_cawg_is_dropped_not_fatal() {
        let result = DecodeResult::new("{}").with_cawg("{not json");
        let store = RawManifestBuilder.build(result, &source()).unwrap();
        assert!(store.cawg.is_none());
        assert!(store.active_manifest().is_none());
    }

    #[test]
    fn bad_manifest_store_fails() {
        let err = RawManifestBuilder
            .build(DecodeResult::new("<xml/>"), &source())
            .unwrap_err();
        assert!(matches!(err, SessionError::Builder(_)));
    }
}
