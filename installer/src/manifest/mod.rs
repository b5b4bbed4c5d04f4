//! Package manifest schema and loading.
//!
//! A manifest is the declarative recipe for one package: where its release
//! archive lives, the checksum the archive must match, which entries to
//! install, and the smoke test that proves the installed binary runs.
//!
//! # Sub-modules
//!
//! - [`error`] - Validation and loading errors.
//! - [`install_target`] - Archive entry to destination mappings.
//! - [`package_name`] - Package identifier newtype (`PackageName`).
//! - [`package_version`] - Semantic version newtype (`PackageVersion`).
//! - [`parser`] - TOML loading and the built-in MilyAI formula.
//! - [`sha256_digest`] - SHA-256 digest newtype (`Sha256Digest`).
//! - [`smoke_test_spec`] - Post-install smoke test declaration.
//! - [`source_url`] - Release archive location (`SourceUrl`).

pub mod error;
pub mod install_target;
pub mod package_name;
pub mod package_version;
pub mod parser;
pub mod sha256_digest;
pub mod smoke_test_spec;
pub mod source_url;

use camino::{Utf8Path, Utf8PathBuf};
pub use error::ManifestError;
use error::Result;
use install_target::InstallTarget;
use package_name::PackageName;
use package_version::PackageVersion;
use serde::Deserialize;
use sha256_digest::Sha256Digest;
use smoke_test_spec::SmokeTestSpec;
use source_url::SourceUrl;
use std::collections::HashSet;

/// An immutable, validated package manifest.
///
/// The TOML form mirrors the Homebrew formula it replaces:
///
/// ```toml
/// name = "milyai"
/// desc = "Modular AI assistant CLI"
/// homepage = "https://example.com/milyai"
/// version = "0.1.0"
/// url = "https://example.com/milyai/releases/0.1.0/milyai-macos-universal.tar.gz"
/// sha256 = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef"
///
/// [[install]]
/// source = "milyai"
///
/// [test]
/// command = "milyai --help"
/// expect = "MilyAI"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawManifest")]
pub struct Manifest {
    name: PackageName,
    desc: Option<String>,
    homepage: Option<String>,
    version: PackageVersion,
    url: SourceUrl,
    sha256: Sha256Digest,
    install: Vec<InstallTarget>,
    test: SmokeTestSpec,
}

/// Field-level form of the manifest, before cross-field validation.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    name: PackageName,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    homepage: Option<String>,
    version: PackageVersion,
    url: SourceUrl,
    sha256: Sha256Digest,
    install: Vec<InstallTarget>,
    test: SmokeTestSpec,
}

impl TryFrom<RawManifest> for Manifest {
    type Error = ManifestError;

    fn try_from(raw: RawManifest) -> Result<Self> {
        if raw.install.is_empty() {
            return Err(ManifestError::NoInstallTargets);
        }

        let mut seen = HashSet::new();
        for target in &raw.install {
            if !seen.insert(target.dest()) {
                return Err(ManifestError::DuplicateDestination {
                    dest: target.dest().to_string(),
                });
            }
        }

        Ok(Self {
            name: raw.name,
            desc: raw.desc,
            homepage: raw.homepage,
            version: raw.version,
            url: raw.url,
            sha256: raw.sha256,
            install: raw.install,
            test: raw.test,
        })
    }
}

impl Manifest {
    /// Return the package name.
    #[must_use]
    pub fn name(&self) -> &PackageName {
        &self.name
    }

    /// Return the one-line description, if any.
    #[must_use]
    pub fn desc(&self) -> Option<&str> {
        self.desc.as_deref()
    }

    /// Return the project homepage, if any.
    #[must_use]
    pub fn homepage(&self) -> Option<&str> {
        self.homepage.as_deref()
    }

    /// Return the package version.
    #[must_use]
    pub fn version(&self) -> &PackageVersion {
        &self.version
    }

    /// Return the release archive URL.
    #[must_use]
    pub fn url(&self) -> &SourceUrl {
        &self.url
    }

    /// Return the expected archive digest.
    #[must_use]
    pub fn sha256(&self) -> &Sha256Digest {
        &self.sha256
    }

    /// Return the install targets in declaration order.
    #[must_use]
    pub fn install_targets(&self) -> &[InstallTarget] {
        &self.install
    }

    /// Return the smoke test declaration.
    #[must_use]
    pub fn smoke_test(&self) -> &SmokeTestSpec {
        &self.test
    }

    /// Resolve every install target against `bin_dir`, in order.
    #[must_use]
    pub fn destinations(&self, bin_dir: &Utf8Path) -> Vec<Utf8PathBuf> {
        self.install
            .iter()
            .map(|target| target.destination(bin_dir))
            .collect()
    }
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
