use std::path::PathBuf;

use bytes::Bytes;
use reqwest::Url;

use crate::error::{SourceError, SourceResult};

/// Anything a caller can hand to a read operation.
#[derive(Clone, Debug)]
pub enum AssetInput {
    /// Bytes already in memory, with the type the caller declared for them.
    Blob { bytes: Bytes, media_type: String },
    /// A file on disk. Without a declared type, the extension decides.
    File {
        path: PathBuf,
        media_type: Option<String>,
    },
    /// A remote asset.
    Url(String),
    /// A reference to a rendered image. `current_src` is the candidate the
    /// renderer actually picked (from a `srcset`, say) and wins over `src`.
    ImageElement {
        src: String,
        current_src: Option<String>,
    },
}

impl AssetInput {
    pub fn blob(bytes: impl Into<Bytes>, media_type: impl Into<String>) -> Self {
        Self::Blob {
            bytes: bytes.into(),
            media_type: media_type.into(),
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File {
            path: path.into(),
            media_type: None,
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }

    pub fn image_element(src: impl Into<String>) -> Self {
        Self::ImageElement {
            src: src.into(),
            current_src: None,
        }
    }

    /// Interpret a locator string.
    ///
    /// `http`/`https` URLs become [`AssetInput::Url`]; `file://` URLs and bare
    /// paths become [`AssetInput::File`]. A string that looks like a URL but
    /// does not parse is kept as a URL and left to degrade when fetched. A
    /// well-formed URL with any other scheme is rejected.
    pub fn from_locator(locator: &str) -> SourceResult<Self> {
        let locator = locator.trim();
        if locator.is_empty() {
            return Err(SourceError::InvalidInput("empty locator".into()));
        }
        match Url::parse(locator) {
            Ok(url) => match url.scheme() {
                "http" | "https" => Ok(Self::url(locator)),
                "file" => url
                    .to_file_path()
                    .map(Self::file)
                    .map_err(|_| {
                        SourceError::InvalidInput(format!("unusable file URL {locator:?}"))
                    }),
                // A drive letter parses as a one-letter scheme.
                scheme if scheme.len() == 1 => Ok(Self::file(locator)),
                scheme => Err(SourceError::InvalidInput(format!(
                    "unsupported scheme {scheme:?} in {locator:?}"
                ))),
            },
            Err(_) if locator.contains("://") => Ok(Self::url(locator)),
            Err(_) => Ok(Self::file(locator)),
        }
    }
}

impl TryFrom<&str> for AssetInput {
    type Error = SourceError;

    fn try_from(locator: &str) -> Result<Self, Self::Error> {
        Self::from_locator(locator)
    }
}

impl From<PathBuf> for AssetInput {
    fn from(path: PathBuf) -> Self {
        Self::file(path)
    }
}
