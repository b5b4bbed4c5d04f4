//! Manifest loading from TOML.
//!
//! All newtype validation runs during deserialization, so a manifest that
//! parses is a manifest the pipeline can act on.

use super::Manifest;
use super::error::{ManifestError, Result};
use camino::Utf8Path;

/// The shipped MilyAI formula, used when no manifest path is given.
pub const BUILTIN_FORMULA: &str = include_str!("../../formula/milyai.toml");

/// Parse a TOML string into a validated [`Manifest`].
///
/// # Errors
///
/// Returns [`ManifestError::Parse`] if the TOML is malformed, a field is
/// missing or unknown, or any field fails validation.
///
/// # Examples
///
/// ```
/// use milyai_installer::manifest::parser::parse_manifest;
///
/// let toml = r#"
/// name = "milyai"
/// version = "0.1.0"
/// url = "https://example.com/milyai.tar.gz"
/// sha256 = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef"
///
/// [[install]]
/// source = "milyai"
///
/// [test]
/// command = "milyai --help"
/// expect = "MilyAI"
/// "#;
/// let manifest = parse_manifest(toml).expect("valid manifest");
/// assert_eq!(manifest.name().as_str(), "milyai");
/// ```
pub fn parse_manifest(contents: &str) -> Result<Manifest> {
    toml::from_str(contents).map_err(|e| ManifestError::Parse {
        reason: e.to_string(),
    })
}

/// Read and parse the manifest at `path`.
///
/// # Errors
///
/// Returns [`ManifestError::Read`] when the file cannot be read and
/// [`ManifestError::Parse`] when it does not describe a valid manifest.
pub fn load_manifest(path: &Utf8Path) -> Result<Manifest> {
    let contents = std::fs::read_to_string(path).map_err(|e| ManifestError::Read {
        path: path.to_owned(),
        reason: e.to_string(),
    })?;
    log::debug!("loaded manifest from {path}");
    parse_manifest(&contents)
}

/// Load the manifest at `path`, or the built-in formula when `None`.
///
/// # Errors
///
/// Propagates [`load_manifest`] and [`parse_manifest`] failures.
pub fn load_or_builtin(path: Option<&Utf8Path>) -> Result<Manifest> {
    match path {
        Some(path) => load_manifest(path),
        None => {
            log::debug!("using built-in formula");
            parse_manifest(BUILTIN_FORMULA)
        }
    }
}
