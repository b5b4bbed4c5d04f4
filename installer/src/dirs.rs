//! Platform directory resolution.
//!
//! Wraps `directories-next` behind the [`BaseDirs`] trait so that default
//! bin and lock locations can be tested without touching the real home
//! directory.

use camino::Utf8PathBuf;
use std::path::PathBuf;

/// Application directory name under the platform data directory.
pub const APP_DIR: &str = "milyai-installer";

/// Source of platform-specific base directories.
#[cfg_attr(test, mockall::automock)]
pub trait BaseDirs {
    /// Directory for user executables (for example `~/.local/bin`).
    fn bin_dir(&self) -> Option<PathBuf>;

    /// Per-user local data directory.
    fn data_local_dir(&self) -> Option<PathBuf>;
}

/// [`BaseDirs`] backed by `directories-next`.
#[derive(Debug, Clone, Default)]
pub struct SystemBaseDirs {
    inner: Option<directories_next::BaseDirs>,
}

impl SystemBaseDirs {
    /// Resolve the current user's base directories.
    #[must_use]
    pub fn new() -> Self {
        let inner = directories_next::BaseDirs::new();
        if inner.is_none() {
            log::debug!("no home directory found; platform defaults unavailable");
        }
        Self { inner }
    }
}

impl BaseDirs for SystemBaseDirs {
    fn bin_dir(&self) -> Option<PathBuf> {
        let inner = self.inner.as_ref()?;
        inner
            .executable_dir()
            .map(PathBuf::from)
            .or_else(|| Some(inner.home_dir().join(".local").join("bin")))
    }

    fn data_local_dir(&self) -> Option<PathBuf> {
        self.inner
            .as_ref()
            .map(|d| d.data_local_dir().to_path_buf())
    }
}

/// Default directory for relative install targets.
///
/// Returns `None` when the platform has no home directory or the path is
/// not valid UTF-8.
#[must_use]
pub fn default_bin_dir(dirs: &dyn BaseDirs) -> Option<Utf8PathBuf> {
    dirs.bin_dir().and_then(|p| Utf8PathBuf::try_from(p).ok())
}

/// Default directory for per-package lock files.
///
/// Uses `<data_local_dir>/milyai-installer/locks`, falling back to the
/// system temporary directory.
#[must_use]
pub fn default_lock_dir(dirs: &dyn BaseDirs) -> Utf8PathBuf {
    let base = dirs
        .data_local_dir()
        .and_then(|p| Utf8PathBuf::try_from(p).ok())
        .or_else(|| Utf8PathBuf::try_from(std::env::temp_dir()).ok())
        .unwrap_or_else(|| Utf8PathBuf::from("."));
    base.join(APP_DIR).join("locks")
}
