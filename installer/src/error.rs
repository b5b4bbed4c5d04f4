//! Error types for the MilyAI installer.
//!
//! Each pipeline component has its own error enum. [`InstallerError`] gathers
//! them into the failure taxonomy the CLI reports, and maps every class to a
//! distinct process exit code.

use crate::extraction::ExtractionError;
use crate::fetch::FetchError;
use crate::manifest::ManifestError;
use crate::manifest::package_name::PackageName;
use crate::smoke::SmokeTestError;
use crate::verify::ChecksumMismatch;
use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Errors that can occur while installing a package.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// The manifest is unreadable or invalid.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// The archive could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The fetched bytes do not match the manifest checksum.
    #[error(transparent)]
    ChecksumMismatch(#[from] ChecksumMismatch),

    /// The archive could not be read or lacks a named entry.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// A filesystem operation on an install path failed.
    #[error("filesystem error at {path}: {source}")]
    Filesystem {
        /// Path the operation targeted.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Another installer run holds the package lock.
    #[error("another install of {package} is in progress (lock held at {path})")]
    LockHeld {
        /// Package whose lock is held.
        package: PackageName,
        /// Lock file path.
        path: Utf8PathBuf,
    },

    /// The installed binary failed its smoke test.
    #[error("smoke test failed: {0}")]
    SmokeTest(#[from] SmokeTestError),

    /// Installer settings could not be resolved.
    #[error("configuration error: {reason}")]
    Configuration {
        /// Description of the missing or invalid setting.
        reason: String,
    },

    /// Failed to write output.
    #[error("failed to write output")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },
}

impl InstallerError {
    /// Build a [`InstallerError::Filesystem`] for `path`.
    #[must_use]
    pub fn filesystem(path: &Utf8Path, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.to_owned(),
            source,
        }
    }

    /// Return the process exit code for this error class.
    ///
    /// | class | code |
    /// |-------|------|
    /// | manifest, configuration, output | 1 |
    /// | network | 3 |
    /// | HTTP status | 4 |
    /// | checksum mismatch | 5 |
    /// | extraction | 6 |
    /// | filesystem, lock held | 7 |
    /// | smoke test | 8 |
    ///
    /// Code 2 is left to `clap` for usage errors.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Manifest(_) | Self::Configuration { .. } | Self::WriteFailed { .. } => 1,
            Self::Fetch(FetchError::Network { .. }) => 3,
            Self::Fetch(FetchError::Http { .. }) => 4,
            Self::ChecksumMismatch(_) => 5,
            Self::Extraction(_) => 6,
            Self::Filesystem { .. } | Self::LockHeld { .. } => 7,
            Self::SmokeTest(_) => 8,
        }
    }
}

/// Result type alias using [`InstallerError`].
pub type Result<T> = std::result::Result<T, InstallerError>;
