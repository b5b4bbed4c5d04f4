//! Validated package identifier.
//!
//! Package names key the per-package install lock, so they double as file
//! names and must stay within a conservative character set.

use super::error::{ManifestError, Result};
use serde::Deserialize;
use std::fmt;

/// A package name such as `milyai`.
///
/// Names start with a lowercase ASCII letter or digit and continue with
/// lowercase letters, digits, `.`, `_` or `-`.
///
/// # Examples
///
/// ```
/// use milyai_installer::manifest::package_name::PackageName;
///
/// let name = PackageName::try_from("milyai").unwrap();
/// assert_eq!(name.as_str(), "milyai");
/// assert!(PackageName::try_from("../etc").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct PackageName(String);

impl PackageName {
    /// Get the package name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for PackageName {
    type Error = ManifestError;

    fn try_from(value: &str) -> Result<Self> {
        validate_package_name(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for PackageName {
    type Error = ManifestError;

    fn try_from(value: String) -> Result<Self> {
        validate_package_name(&value)?;
        Ok(Self(value))
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn validate_package_name(value: &str) -> Result<()> {
    let invalid = |reason: &str| ManifestError::InvalidPackageName {
        value: value.to_owned(),
        reason: reason.to_owned(),
    };

    let Some(first) = value.chars().next() else {
        return Err(invalid("name must not be empty"));
    };
    if !(first.is_ascii_lowercase() || first.is_ascii_digit()) {
        return Err(invalid("name must start with a lowercase letter or digit"));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-')))
    {
        return Err(invalid(&format!("unsupported character '{bad}'")));
    }
    Ok(())
}
