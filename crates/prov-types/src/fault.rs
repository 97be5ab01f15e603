//! The error shape that crosses the worker boundary, and its typed form.
//!
//! A worker cannot hand back a live error value: by the time the reply
//! reaches the orchestrating side only a [`WireError`] remains, a classification
//! name plus optional detail. [`DecodeError::from_wire`] turns that back into
//! a typed variant by matching the name against the known taxonomy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification names the decode engine emits.
///
/// Engine names nest (`Toolkit(C2pa(JumbfParseError(InvalidBoxHeader)))`), so
/// matching is by substring.
pub mod names {
    pub const PROVENANCE_MISSING: &str = "ProvenanceMissing";
    pub const JUMBF_NOT_FOUND: &str = "JumbfNotFound";
    pub const JUMBF_PARSE: &str = "JumbfParseError";
    pub const JUMBF_BOX_NOT_FOUND: &str = "JumbfBoxNotFound";
    pub const REMOTE_MANIFEST_URL: &str = "Toolkit(RemoteManifestUrl)";
}

/// Structured error as marshaled across the worker boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    /// Classification name.
    pub name: String,
    /// Human-readable message. May be empty.
    #[serde(default)]
    pub message: String,
    /// Remote manifest location, set only for remote manifest pointers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl WireError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            url: None,
        }
    }

    /// A remote manifest pointer carrying `url`.
    pub fn remote_manifest(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            name: names::REMOTE_MANIFEST_URL.into(),
            message: format!("remote manifest at {url}"),
            url: Some(url),
        }
    }
}

/// Typed decode failure, re-materialized on the orchestrating side.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The asset carries no provenance, embedded or remote.
    #[error("no provenance present")]
    NoProvenance,

    /// A provenance container exists but could not be parsed.
    #[error("malformed provenance container: {0}")]
    MalformedContainer(String),

    /// A required box inside the container is missing.
    #[error("required container box missing")]
    ContainerBoxMissing,

    /// The asset points at a manifest stored elsewhere.
    #[error("remote manifest at {url}")]
    RemoteManifest { url: String },

    /// Anything else the engine raised. Passed through untouched.
    #[error("{name}: {message}")]
    Engine { name: String, message: String },
}

impl DecodeError {
    /// Decode a marshaled error into its typed variant.
    ///
    /// A remote manifest pointer without a URL cannot be followed and is kept
    /// as an opaque engine error.
    pub fn from_wire(wire: WireError) -> Self {
        let name = wire.name.as_str();
        if name.contains(names::REMOTE_MANIFEST_URL) {
            return match wire.url {
                Some(url) => Self::RemoteManifest { url },
                None => Self::Engine {
                    name: wire.name,
                    message: wire.message,
                },
            };
        }
        if name.contains(names::PROVENANCE_MISSING) || name.contains(names::JUMBF_NOT_FOUND) {
            return Self::NoProvenance;
        }
        if name.contains(names::JUMBF_BOX_NOT_FOUND) {
            return Self::ContainerBoxMissing;
        }
        if name.contains(names::JUMBF_PARSE) {
            return Self::MalformedContainer(wire.message);
        }
        Self::Engine {
            name: wire.name,
            message: wire.message,
        }
    }

    /// Returns `true` for failures that mean "no manifest" rather than an
    /// error: absent, malformed, or incomplete provenance.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            Self::NoProvenance | Self::MalformedContainer(_) | Self::ContainerBoxMissing
        )
    }

    /// The pointed-to URL, for remote manifest pointers.
    pub fn remote_manifest_url(&self) -> Option<&str> {
        match self {
            Self::RemoteManifest { url } => Some(url),
            _ => None,
        }
    }
}

impl From<WireError> for DecodeError {
    fn from(wire: WireError) -> Self {
        Self::from_wire(wire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_provenance_variants() {
        for name in [
            "C2pa(ProvenanceMissing)",
            "Toolkit(C2pa(ProvenanceMissing))",
            "C2pa(JumbfNotFound)",
        ] {
            let err = DecodeError::from_wire(WireError::new(name, ""));
            assert_eq!(err, DecodeError::NoProvenance, "{name}");
            assert!(err.is_benign());
        }
    }

    #[test]
    fn parse_error_keeps_message() {
        let err = DecodeError::from_wire(WireError::new(
            "C2pa(JumbfParseError(InvalidBoxHeader))",
            "bad header",
        ));
        assert_eq!(err, DecodeError::MalformedContainer("bad header".into()));
        assert!(err.is_benign());
    }

    #[test]
    fn box_not_found_is_distinct_from_parse_error() {
        let err = DecodeError::from_wire(WireError::new("C2pa(JumbfBoxNotFound)", ""));
        assert_eq!(err, DecodeError::ContainerBoxMissing);
    }

    #[test]
    fn remote_manifest_carries_url() {
        let err = DecodeError::from_wire(WireError::remote_manifest("https://m.example/abc"));
        assert_eq!(err.remote_manifest_url(), Some("https://m.example/abc"));
        assert!(!err.is_benign());
    }

    #[test]
    fn remote_manifest_without_url_is_opaque() {
        let err = DecodeError::from_wire(WireError::new(names::REMOTE_MANIFEST_URL, "no url"));
        assert!(matches!(err, DecodeError::Engine { .. }));
    }

    #[test]
    fn unknown_names_pass_through() {
        let err = DecodeError::from_wire(WireError::new("C2pa(CoseSignature)", "bad sig"));
        assert_eq!(
            err,
            DecodeError::Engine {
                name: "C2pa(CoseSignature)".into(),
                message: "bad sig".into()
            }
        );
        assert!(!err.is_benign());
        assert_eq!(err.to_string(), "C2pa(CoseSignature): bad sig");
    }

    #[test]
    fn wire_error_serde_omits_absent_url() {
        let json = serde_json::to_string(&WireError::new("X", "y")).unwrap();
        assert_eq!(json, r#"{"name":"X","message":"y"}"#);
        let back: WireError = serde_json::from_str(r#"{"name":"X"}"#).unwrap();
        assert_eq!(back.message, "");
    }
}
