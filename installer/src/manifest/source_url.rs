//! Release artefact location.
//!
//! Only `http`, `https` and `file` URLs are accepted, and the path must end
//! in an archive suffix the extractor understands. Both are checked when the
//! manifest loads so the fetch step never sees a URL it cannot act on.

use super::error::{ManifestError, Result};
use crate::extraction::ArchiveFormat;
use camino::Utf8PathBuf;
use serde::Deserialize;
use std::fmt;
use url::Url;

/// Transport selected by the URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlScheme {
    /// Plain HTTP.
    Http,
    /// HTTP over TLS.
    Https,
    /// A file on the local filesystem.
    File,
}

/// A validated source URL for a release archive.
///
/// # Examples
///
/// ```
/// use milyai_installer::extraction::ArchiveFormat;
/// use milyai_installer::manifest::source_url::{SourceUrl, UrlScheme};
///
/// let url = SourceUrl::try_from(
///     "https://example.com/milyai/releases/0.1.0/milyai-macos-universal.tar.gz",
/// )
/// .unwrap();
/// assert_eq!(url.scheme(), UrlScheme::Https);
/// assert_eq!(url.archive_format(), ArchiveFormat::TarGz);
/// assert_eq!(url.file_name(), "milyai-macos-universal.tar.gz");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct SourceUrl {
    url: Url,
    scheme: UrlScheme,
    format: ArchiveFormat,
}

impl SourceUrl {
    /// Return the URL in its normalised form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Return the URL scheme.
    #[must_use]
    pub fn scheme(&self) -> UrlScheme {
        self.scheme
    }

    /// Return the archive format implied by the path suffix.
    #[must_use]
    pub fn archive_format(&self) -> ArchiveFormat {
        self.format
    }

    /// Return the last path segment, without query or fragment.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
    }

    /// Return the local filesystem path for `file://` URLs, with
    /// percent-escapes decoded.
    #[must_use]
    pub fn local_path(&self) -> Option<Utf8PathBuf> {
        if self.scheme != UrlScheme::File {
            return None;
        }
        let path = self.url.to_file_path().ok()?;
        Utf8PathBuf::try_from(path).ok()
    }
}

impl TryFrom<&str> for SourceUrl {
    type Error = ManifestError;

    fn try_from(value: &str) -> Result<Self> {
        let unsupported = |reason: String| ManifestError::UnsupportedUrl {
            url: value.to_owned(),
            reason,
        };

        let url = Url::parse(value).map_err(|e| unsupported(e.to_string()))?;
        let scheme = match url.scheme() {
            "https" => UrlScheme::Https,
            "http" => UrlScheme::Http,
            "file" => UrlScheme::File,
            _ => return Err(unsupported("expected an http, https or file URL".to_owned())),
        };

        match scheme {
            UrlScheme::File => {
                let local = url
                    .to_file_path()
                    .ok()
                    .and_then(|p| Utf8PathBuf::try_from(p).ok());
                if local.is_none() {
                    return Err(unsupported(
                        "file URLs must carry an absolute UTF-8 path".to_owned(),
                    ));
                }
            }
            UrlScheme::Http | UrlScheme::Https => {
                if url.host_str().is_none_or(str::is_empty) {
                    return Err(unsupported("missing host".to_owned()));
                }
            }
        }

        let format = ArchiveFormat::from_file_name(url.path()).ok_or_else(|| {
            unsupported(
                "expected a .tar.gz, .tgz, .tar.zst, .tzst, .tar or .zip archive".to_owned(),
            )
        })?;

        Ok(Self {
            url,
            scheme,
            format,
        })
    }
}

impl TryFrom<String> for SourceUrl {
    type Error = ManifestError;

    fn try_from(value: String) -> Result<Self> {
        Self::try_from(value.as_str())
    }
}

impl fmt::Display for SourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}
