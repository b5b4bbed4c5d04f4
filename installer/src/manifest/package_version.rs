//! Semantic version newtype for manifests.

use super::error::{ManifestError, Result};
use serde::Deserialize;
use std::fmt;

/// A package version, validated as a semantic version.
///
/// The original string is retained for display so that `0.1.0` round-trips
/// exactly as the formula spelled it.
///
/// # Examples
///
/// ```
/// use milyai_installer::manifest::package_version::PackageVersion;
///
/// let version = PackageVersion::try_from("0.1.0").unwrap();
/// assert_eq!(version.semver().minor, 1);
/// assert!(PackageVersion::try_from("latest").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct PackageVersion {
    raw: String,
    parsed: semver::Version,
}

impl PackageVersion {
    /// Return the parsed semantic version.
    #[must_use]
    pub fn semver(&self) -> &semver::Version {
        &self.parsed
    }

    /// Return the version as written in the manifest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl TryFrom<&str> for PackageVersion {
    type Error = ManifestError;

    fn try_from(value: &str) -> Result<Self> {
        let parsed =
            semver::Version::parse(value).map_err(|e| ManifestError::InvalidVersion {
                value: value.to_owned(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            raw: value.to_owned(),
            parsed,
        })
    }
}

impl TryFrom<String> for PackageVersion {
    type Error = ManifestError;

    fn try_from(value: String) -> Result<Self> {
        Self::try_from(value.as_str())
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn display_preserves_original_spelling() {
        let version = PackageVersion::try_from("1.2.3-beta.1").expect("valid version");
        assert_eq!(version.to_string(), "1.2.3-beta.1");
        assert_eq!(version.semver().pre.as_str(), "beta.1");
    }

    #[rstest]
    #[case::empty("")]
    #[case::two_components("0.1")]
    #[case::word("latest")]
    #[case::leading_v("v0.1.0")]
    fn rejects_non_semver(#[case] value: &str) {
        let err = PackageVersion::try_from(value).expect_err("expected rejection");
        assert!(matches!(err, ManifestError::InvalidVersion { .. }));
    }
}
