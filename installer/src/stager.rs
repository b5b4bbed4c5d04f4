//! File staging and promotion.
//!
//! Each extracted entry is written to a hidden temporary file in its
//! destination directory, so promotion is a same-filesystem rename. Nothing
//! at a destination path changes until [`Stager::promote`] runs; dropping a
//! stager without promoting removes every staged file.
//!
//! Promotion covers the whole set: existing destinations are copied aside
//! first, and if any rename fails every file already promoted is put back
//! the way it was.

use crate::error::{InstallerError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::io::Write;
use tempfile::NamedTempFile;

#[derive(Debug)]
struct StagedFile {
    temp: NamedTempFile,
    dest: Utf8PathBuf,
}

/// A promoted destination and the copy of what it replaced, if anything.
#[derive(Debug)]
struct Promoted {
    dest: Utf8PathBuf,
    backup: Option<NamedTempFile>,
}

/// Collects staged files until they are promoted together.
#[derive(Debug, Default)]
pub struct Stager {
    staged: Vec<StagedFile>,
}

impl Stager {
    /// Create an empty stager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `contents` to a temporary file beside `dest` with permission
    /// bits `mode`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Filesystem`] if the directory or file cannot
    /// be created, written, or synced.
    pub fn stage(&mut self, dest: &Utf8Path, contents: &[u8], mode: u32) -> Result<()> {
        let parent = parent_dir(dest);
        std::fs::create_dir_all(parent).map_err(|e| InstallerError::filesystem(parent, e))?;

        let mut temp = sibling_temp(dest, "staged")?;
        let io_error = |e| InstallerError::filesystem(dest, e);
        temp.write_all(contents).map_err(io_error)?;
        set_mode(temp.as_file(), mode).map_err(io_error)?;
        temp.as_file().sync_all().map_err(io_error)?;

        log::debug!(
            "staged {} byte(s) for {dest} at {}",
            contents.len(),
            temp.path().display()
        );
        self.staged.push(StagedFile {
            temp,
            dest: dest.to_owned(),
        });
        Ok(())
    }

    /// Rename every staged file over its destination, in staging order.
    ///
    /// Each rename is atomic. If one fails, destinations already promoted
    /// are restored from their backups (or removed when nothing was there
    /// before), the remaining staged files are deleted, and the error names
    /// the destination that failed.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Filesystem`] if a backup or rename fails.
    pub fn promote(self) -> Result<Vec<Utf8PathBuf>> {
        let mut promoted = Vec::with_capacity(self.staged.len());
        for StagedFile { temp, dest } in self.staged {
            let outcome = back_up(&dest).and_then(|backup| {
                temp.persist(&dest)
                    .map_err(|e| InstallerError::filesystem(&dest, e.error))?;
                Ok(backup)
            });
            match outcome {
                Ok(backup) => promoted.push(Promoted { dest, backup }),
                Err(err) => {
                    roll_back(promoted);
                    return Err(err);
                }
            }
        }

        Ok(promoted
            .into_iter()
            .map(|Promoted { dest, .. }| {
                log::info!("installed {dest}");
                dest
            })
            .collect())
    }
}

fn parent_dir(dest: &Utf8Path) -> &Utf8Path {
    dest.parent()
        .filter(|p| !p.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."))
}

/// Create a hidden temporary file in the same directory as `dest`.
fn sibling_temp(dest: &Utf8Path, suffix: &str) -> Result<NamedTempFile> {
    let parent = parent_dir(dest);
    let file_name = dest.file_name().unwrap_or("staged");
    tempfile::Builder::new()
        .prefix(&format!(".{file_name}."))
        .suffix(&format!(".{suffix}"))
        .tempfile_in(parent)
        .map_err(|e| InstallerError::filesystem(parent, e))
}

/// Copy the file currently at `dest` aside. Missing destinations and
/// directories need no backup; a rename onto a directory fails anyway.
fn back_up(dest: &Utf8Path) -> Result<Option<NamedTempFile>> {
    match std::fs::symlink_metadata(dest) {
        Ok(meta) if meta.is_dir() => return Ok(None),
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(InstallerError::filesystem(dest, e)),
    }

    let backup = sibling_temp(dest, "backup")?;
    std::fs::copy(dest, backup.path()).map_err(|e| InstallerError::filesystem(dest, e))?;
    log::debug!("backed up {dest} to {}", backup.path().display());
    Ok(Some(backup))
}

/// Undo promotions, newest first.
fn roll_back(promoted: Vec<Promoted>) {
    for Promoted { dest, backup } in promoted.into_iter().rev() {
        let restored = match backup {
            Some(backup) => backup.persist(&dest).map(drop).map_err(|e| e.error),
            None => std::fs::remove_file(&dest),
        };
        match restored {
            Ok(()) => log::debug!("rolled back {dest}"),
            Err(err) => log::warn!("failed to roll back {dest}: {err}"),
        }
    }
}

#[cfg(unix)]
fn set_mode(file: &std::fs::File, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &std::fs::File, _mode: u32) -> std::io::Result<()> {
    Ok(())
}
