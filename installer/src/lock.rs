//! Per-package advisory install lock.
//!
//! Only one installer run may stage and promote files for a given package at
//! a time. The lock is an exclusive `fs2` lock on `<lock_dir>/<name>.lock`,
//! taken without blocking and released when the guard drops.

use crate::error::{InstallerError, Result};
use crate::manifest::package_name::PackageName;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{File, OpenOptions};

/// Exclusive lock held for the duration of an install.
#[derive(Debug)]
pub struct PackageLock {
    file: File,
    path: Utf8PathBuf,
}

impl PackageLock {
    /// Take the lock for `package` inside `lock_dir`, creating the directory
    /// if needed.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::LockHeld`] when another run holds the lock
    /// and [`InstallerError::Filesystem`] when the lock file cannot be
    /// created or locked.
    pub fn acquire(lock_dir: &Utf8Path, package: &PackageName) -> Result<Self> {
        std::fs::create_dir_all(lock_dir)
            .map_err(|source| InstallerError::filesystem(lock_dir, source))?;

        let path = lock_dir.join(format!("{package}.lock"));
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|source| InstallerError::filesystem(&path, source))?;

        if let Err(err) = fs2::FileExt::try_lock_exclusive(&file) {
            if is_contended(&err) {
                return Err(InstallerError::LockHeld {
                    package: package.clone(),
                    path,
                });
            }
            return Err(InstallerError::filesystem(&path, err));
        }

        log::debug!("acquired install lock {path}");
        Ok(Self { file, path })
    }
}

impl Drop for PackageLock {
    fn drop(&mut self) {
        if let Err(err) = fs2::FileExt::unlock(&self.file) {
            log::warn!("failed to release install lock {}: {err}", self.path);
        } else {
            log::debug!("released install lock {}", self.path);
        }
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
