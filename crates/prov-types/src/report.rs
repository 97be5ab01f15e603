use serde::{Deserialize, Serialize};

/// Raw output of a successful decode, as produced inside a worker.
///
/// Both payloads are opaque JSON text. The primary payload feeds the manifest
/// store builder; the auxiliary CAWG payload is deserialized on its own and a
/// failure there never affects the primary result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeResult {
    /// Serialized manifest store report.
    pub manifest_store_payload: String,
    /// Serialized identity-assertion (CAWG) summary, when the engine produced one.
    pub cawg_payload: Option<String>,
}

impl DecodeResult {
    /// Create a result with only a primary payload.
    pub fn new(manifest_store_payload: impl Into<String>) -> Self {
        Self {
            manifest_store_payload: manifest_store_payload.into(),
            cawg_payload: None,
        }
    }

    /// Attach an auxiliary CAWG payload.
    pub fn with_cawg(mut self, cawg_payload: impl Into<String>) -> Self {
        self.cawg_payload = Some(cawg_payload.into());
        self
    }
}

/// Outcome of a presence scan over an asset buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Whether a provenance container was located.
    pub found: bool,
    /// Byte offset of the container, when found.
    pub offset: Option<u64>,
}

impl ScanResult {
    /// A scan that found nothing.
    pub const fn absent() -> Self {
        Self {
            found: false,
            offset: None,
        }
    }

    /// A scan that found a container at `offset`.
    pub const fn at(offset: u64) -> Self {
        Self {
            found: true,
            offset: Some(offset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_attaches_cawg() {
        let r = DecodeResult::new("{}").with_cawg("[]");
        assert_eq!(r.manifest_store_payload, "{}");
        assert_eq!(r.cawg_payload.as_deref(), Some("[]"));
    }

    #[test]
    fn scan_constructors() {
        assert_eq!(ScanResult::absent(), ScanResult::default());
        let hit = ScanResult::at(512);
        assert!(hit.found);
        assert_eq!(hit.offset, Some(512));
    }
}
