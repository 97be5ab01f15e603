use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Extension to media type table used when an input does not declare a type.
const EXTENSION_TABLE: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("avif", "image/avif"),
    ("heic", "image/heic"),
    ("heif", "image/heif"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("svg", "image/svg+xml"),
    ("mp4", "video/mp4"),
    ("m4a", "audio/mp4"),
    ("mov", "video/quicktime"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("pdf", "application/pdf"),
    ("c2pa", "application/c2pa"),
];

/// A media type hint (`type/subtype`) passed to the decode engine.
///
/// Parameters such as `; charset=binary` are stripped and the essence is
/// lower-cased on construction, so `Image/JPEG; q=1` and `image/jpeg` compare
/// equal.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MediaType(String);

impl MediaType {
    /// Parse a media type, validating the `type/subtype` shape.
    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        let essence = raw.split(';').next().unwrap_or_default().trim();
        let mut parts = essence.splitn(2, '/');
        let (Some(top), Some(sub)) = (parts.next(), parts.next()) else {
            return Err(TypeError::InvalidMediaType(raw.to_string()));
        };
        let valid = |s: &str| {
            !s.is_empty()
                && s.chars()
                    .all(|c| c.is_ascii_alphanumeric() || "!#$&-^_.+".contains(c))
        };
        if !valid(top) || !valid(sub) {
            return Err(TypeError::InvalidMediaType(raw.to_string()));
        }
        Ok(Self(essence.to_ascii_lowercase()))
    }

    /// `application/octet-stream`, the fallback when nothing better is known.
    pub fn octet_stream() -> Self {
        Self("application/octet-stream".into())
    }

    /// Look up a media type by file extension (case-insensitive, no dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        EXTENSION_TABLE
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, mt)| Self((*mt).to_string()))
    }

    /// Infer a media type from the extension of a path or URL path.
    ///
    /// Query strings and fragments are ignored.
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let name = path.rsplit(['/', '\\']).next()?;
        let (_, ext) = name.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    /// The `type/subtype` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MediaType({})", self.0)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for MediaType {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MediaType> for String {
    fn from(mt: MediaType) -> Self {
        mt.0
    }
}
