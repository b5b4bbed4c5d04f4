//! Install mappings from archive entries to destination paths.

use super::error::{ManifestError, Result};
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use serde::Deserialize;

/// One `(entry in archive, destination path)` pair.
///
/// Relative destinations resolve against the bin directory chosen at run
/// time; absolute destinations are used verbatim. When `dest` is omitted the
/// entry's file name is used, which mirrors `bin.install "milyai"`.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use milyai_installer::manifest::install_target::InstallTarget;
///
/// let target = InstallTarget::new("dist/milyai", None).unwrap();
/// assert_eq!(
///     target.destination(Utf8Path::new("/opt/bin")),
///     Utf8Path::new("/opt/bin/milyai"),
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "RawInstallTarget")]
pub struct InstallTarget {
    source: String,
    dest: Utf8PathBuf,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawInstallTarget {
    source: String,
    #[serde(default)]
    dest: Option<String>,
}

impl InstallTarget {
    /// Build a validated install target.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::InvalidInstallTarget`] when the source is
    /// empty, absolute, or climbs out of the archive root, or when the
    /// destination contains `..` components.
    pub fn new(source: &str, dest: Option<Utf8PathBuf>) -> Result<Self> {
        let source = normalise_entry_name(source);
        validate_source(&source)?;

        let dest = match dest {
            Some(dest) => normalise_dest(&dest),
            None => Utf8Path::new(&source)
                .file_name()
                .map(Utf8PathBuf::from)
                .ok_or_else(|| ManifestError::InvalidInstallTarget {
                    value: source.clone(),
                    reason: "source has no file name".to_owned(),
                })?,
        };
        validate_dest(&dest)?;

        Ok(Self { source, dest })
    }

    /// Return the entry path inside the archive, without a leading `./`.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Return the destination as written (or defaulted) in the manifest.
    #[must_use]
    pub fn dest(&self) -> &Utf8Path {
        &self.dest
    }

    /// Resolve the destination against `bin_dir`.
    #[must_use]
    pub fn destination(&self, bin_dir: &Utf8Path) -> Utf8PathBuf {
        if self.dest.is_absolute() {
            self.dest.clone()
        } else {
            bin_dir.join(&self.dest)
        }
    }
}

impl TryFrom<RawInstallTarget> for InstallTarget {
    type Error = ManifestError;

    fn try_from(raw: RawInstallTarget) -> Result<Self> {
        Self::new(&raw.source, raw.dest.map(Utf8PathBuf::from))
    }
}

/// Strip leading `./` segments so `./milyai` and `milyai` name one entry.
pub(crate) fn normalise_entry_name(name: &str) -> String {
    let mut trimmed = name;
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }
    trimmed.trim_end_matches('/').to_owned()
}

/// Drop `.` components so `./milyai` and `milyai` compare equal.
fn normalise_dest(dest: &Utf8Path) -> Utf8PathBuf {
    dest.components()
        .filter(|c| !matches!(c, Utf8Component::CurDir))
        .collect()
}

fn validate_source(source: &str) -> Result<()> {
    let invalid = |reason: &str| ManifestError::InvalidInstallTarget {
        value: source.to_owned(),
        reason: reason.to_owned(),
    };

    if source.is_empty() {
        return Err(invalid("source must not be empty"));
    }
    let path = Utf8Path::new(source);
    if path.is_absolute() || source.starts_with('/') {
        return Err(invalid("source must be relative to the archive root"));
    }
    if path
        .components()
        .any(|c| matches!(c, Utf8Component::ParentDir))
    {
        return Err(invalid("source must not contain '..'"));
    }
    Ok(())
}

fn validate_dest(dest: &Utf8Path) -> Result<()> {
    let invalid = |reason: &str| ManifestError::InvalidInstallTarget {
        value: dest.to_string(),
        reason: reason.to_owned(),
    };

    if dest.as_str().is_empty() {
        return Err(invalid("destination must not be empty"));
    }
    if dest
        .components()
        .any(|c| matches!(c, Utf8Component::ParentDir))
    {
        return Err(invalid("destination must not contain '..'"));
    }
    if dest.file_name().is_none() {
        return Err(invalid("destination must name a file"));
    }
    Ok(())
}
