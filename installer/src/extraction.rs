//! Archive extraction for verified release artefacts.
//!
//! Reads only the entries named by the manifest out of an in-memory
//! archive. Every entry path is checked for traversal before it is
//! compared, so a hostile archive cannot smuggle a `../` name past the
//! install mapping.

use crate::manifest::install_target::normalise_entry_name;
use crate::verify::VerifiedArchive;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read};
use std::path::{Component, Path};

/// Default permissions for entries that carry no Unix mode.
const DEFAULT_MODE: u32 = 0o755;

/// Container format of a release archive, chosen by file suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    /// gzip-compressed tarball (`.tar.gz`, `.tgz`).
    TarGz,
    /// zstd-compressed tarball (`.tar.zst`, `.tzst`).
    TarZst,
    /// Uncompressed tarball (`.tar`).
    Tar,
    /// Zip archive (`.zip`).
    Zip,
}

impl ArchiveFormat {
    /// Detect the format from a file name or URL path.
    ///
    /// # Examples
    ///
    /// ```
    /// use milyai_installer::extraction::ArchiveFormat;
    ///
    /// assert_eq!(
    ///     ArchiveFormat::from_file_name("milyai-macos-universal.tar.gz"),
    ///     Some(ArchiveFormat::TarGz),
    /// );
    /// assert_eq!(ArchiveFormat::from_file_name("milyai.dmg"), None);
    /// ```
    #[must_use]
    pub fn from_file_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        [
            (".tar.gz", Self::TarGz),
            (".tgz", Self::TarGz),
            (".tar.zst", Self::TarZst),
            (".tzst", Self::TarZst),
            (".tar", Self::Tar),
            (".zip", Self::Zip),
        ]
        .into_iter()
        .find_map(|(suffix, format)| lower.ends_with(suffix).then_some(format))
    }
}

impl std::fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::TarGz => "tar.gz",
            Self::TarZst => "tar.zst",
            Self::Tar => "tar",
            Self::Zip => "zip",
        };
        write!(f, "{name}")
    }
}

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// I/O error while decoding the archive.
    #[error("extraction I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The zip container is malformed.
    #[error("malformed zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A path in the archive attempts to traverse outside the archive root.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// A named entry is not in the archive.
    #[error("archive has no entry named \"{entry}\"")]
    MissingEntry {
        /// The entry named by the install mapping.
        entry: String,
    },

    /// A named entry exists but is not a regular file.
    #[error("archive entry \"{entry}\" is not a regular file")]
    NotAFile {
        /// The entry named by the install mapping.
        entry: String,
    },
}

/// A file read out of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEntry {
    /// File contents.
    pub contents: Vec<u8>,
    /// Permission bits recorded in the archive, or `0o755` if none.
    pub mode: u32,
}

/// Extract the entries named in `wanted` from a verified archive.
///
/// Entry names are compared after stripping any leading `./`. The returned
/// map is keyed by the normalised name.
///
/// # Errors
///
/// Returns [`ExtractionError::MissingEntry`] for the first wanted entry
/// that is absent, [`ExtractionError::NotAFile`] when a wanted entry is a
/// directory or link, [`ExtractionError::PathTraversal`] when any entry
/// escapes the archive root, and [`ExtractionError::Io`] or
/// [`ExtractionError::Zip`] for malformed archives.
pub fn extract_entries(
    archive: &VerifiedArchive,
    format: ArchiveFormat,
    wanted: &[&str],
) -> Result<BTreeMap<String, ExtractedEntry>, ExtractionError> {
    let wanted: BTreeSet<String> = wanted.iter().map(|w| normalise_entry_name(w)).collect();
    let bytes = archive.bytes();

    let found = match format {
        ArchiveFormat::TarGz => {
            extract_tar(flate2::read::GzDecoder::new(Cursor::new(bytes)), &wanted)?
        }
        ArchiveFormat::TarZst => {
            extract_tar(zstd::Decoder::new(Cursor::new(bytes))?, &wanted)?
        }
        ArchiveFormat::Tar => extract_tar(Cursor::new(bytes), &wanted)?,
        ArchiveFormat::Zip => extract_zip(bytes, &wanted)?,
    };

    if let Some(missing) = wanted.iter().find(|name| !found.contains_key(*name)) {
        return Err(ExtractionError::MissingEntry {
            entry: missing.clone(),
        });
    }

    log::debug!("extracted {} entr(ies) from {format} archive", found.len());
    Ok(found)
}

fn extract_tar<R: Read>(
    reader: R,
    wanted: &BTreeSet<String>,
) -> Result<BTreeMap<String, ExtractedEntry>, ExtractionError> {
    let mut archive = tar::Archive::new(reader);
    let mut found = BTreeMap::new();

    for entry_result in archive.entries()? {
        let mut entry = entry_result?;
        let entry_path = entry.path()?.into_owned();
        validate_entry_path(&entry_path)?;

        let name = normalise_entry_name(&entry_path.to_string_lossy());
        if !wanted.contains(&name) {
            continue;
        }
        if !entry.header().entry_type().is_file() {
            return Err(ExtractionError::NotAFile { entry: name });
        }

        let mode = entry.header().mode().map_or(DEFAULT_MODE, |m| m & 0o7777);
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents)?;
        log::trace!("read {} byte(s) from tar entry {name}", contents.len());
        found.insert(name, ExtractedEntry { contents, mode });
    }

    Ok(found)
}

fn extract_zip(
    bytes: &[u8],
    wanted: &BTreeSet<String>,
) -> Result<BTreeMap<String, ExtractedEntry>, ExtractionError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut found = BTreeMap::new();

    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        let raw_name = file.name().to_owned();
        if file.enclosed_name().is_none() {
            return Err(ExtractionError::PathTraversal { path: raw_name });
        }
        validate_entry_path(Path::new(&raw_name))?;

        let name = normalise_entry_name(&raw_name);
        if !wanted.contains(&name) {
            continue;
        }
        if !file.is_file() {
            return Err(ExtractionError::NotAFile { entry: name });
        }

        let mode = file.unix_mode().map_or(DEFAULT_MODE, |m| m & 0o7777);
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;
        log::trace!("read {} byte(s) from zip entry {name}", contents.len());
        found.insert(name, ExtractedEntry { contents, mode });
    }

    Ok(found)
}

/// Validate that an archive entry path does not escape the archive root via
/// `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> Result<(), ExtractionError> {
    if path.is_absolute() || path.has_root() {
        return Err(ExtractionError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    for component in path.components() {
        if matches!(component, Component::ParentDir) {
            return Err(ExtractionError::PathTraversal {
                path: path.display().to_string(),
            });
        }
    }
    Ok(())
}
