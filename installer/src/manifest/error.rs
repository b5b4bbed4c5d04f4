//! Error types for manifest loading and field validation.
//!
//! Each variant names the offending input and the constraint it violated so
//! that a broken formula can be fixed without reading the installer source.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors arising from invalid or unreadable package manifests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    /// The package name is empty or contains unsupported characters.
    #[error("invalid package name \"{value}\": {reason}")]
    InvalidPackageName {
        /// The rejected name.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },

    /// The version string is not a semantic version.
    #[error("invalid package version \"{value}\": {reason}")]
    InvalidVersion {
        /// The rejected version string.
        value: String,
        /// Parser message from `semver`.
        reason: String,
    },

    /// A SHA-256 digest is not a valid 64-character hex string.
    #[error("invalid SHA-256 digest: {reason}")]
    InvalidSha256Digest {
        /// Description of the validation failure.
        reason: String,
    },

    /// The source URL uses an unsupported scheme or archive suffix.
    #[error("unsupported source URL \"{url}\": {reason}")]
    UnsupportedUrl {
        /// The rejected URL.
        url: String,
        /// Description of what is unsupported.
        reason: String,
    },

    /// An install mapping is malformed.
    #[error("invalid install target \"{value}\": {reason}")]
    InvalidInstallTarget {
        /// The offending source or destination path.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },

    /// The manifest declares no install targets.
    #[error("manifest declares no install targets")]
    NoInstallTargets,

    /// Two install targets resolve to the same destination.
    #[error("duplicate install destination \"{dest}\"")]
    DuplicateDestination {
        /// The destination named more than once.
        dest: String,
    },

    /// The smoke test command or expectation is malformed.
    #[error("invalid smoke test: {reason}")]
    InvalidSmokeTest {
        /// Description of the validation failure.
        reason: String,
    },

    /// The manifest file could not be read.
    #[error("failed to read manifest {path}: {reason}")]
    Read {
        /// Path to the manifest file.
        path: Utf8PathBuf,
        /// Description of the I/O failure.
        reason: String,
    },

    /// The manifest is not valid TOML or a field failed validation.
    #[error("manifest parse error: {reason}")]
    Parse {
        /// Parser message, including the failing field when known.
        reason: String,
    },
}

/// Result type alias using [`ManifestError`].
pub type Result<T> = std::result::Result<T, ManifestError>;
