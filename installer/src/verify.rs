//! Checksum gate between fetching and installing.
//!
//! [`VerifiedArchive`] can only be obtained from [`verify`], and the
//! extractor only accepts a [`VerifiedArchive`], so no install step can
//! run on bytes whose digest was not checked against the manifest.

use crate::manifest::sha256_digest::Sha256Digest;

/// The fetched bytes disagree with the manifest checksum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("checksum mismatch: expected {expected}, got {actual}")]
pub struct ChecksumMismatch {
    /// Digest recorded in the manifest.
    pub expected: Sha256Digest,
    /// Digest of the bytes actually fetched.
    pub actual: Sha256Digest,
}

/// Archive bytes whose SHA-256 digest matched the manifest.
#[derive(Debug)]
pub struct VerifiedArchive {
    bytes: Vec<u8>,
    digest: Sha256Digest,
}

impl VerifiedArchive {
    /// Return the verified bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Return the digest the bytes were verified against.
    #[must_use]
    pub fn digest(&self) -> &Sha256Digest {
        &self.digest
    }
}

/// Verify `bytes` against `expected`.
///
/// # Errors
///
/// Returns [`ChecksumMismatch`] when the SHA-256 digest of `bytes` is not
/// `expected`.
///
/// # Examples
///
/// ```
/// use milyai_installer::manifest::sha256_digest::Sha256Digest;
/// use milyai_installer::verify::verify;
///
/// let expected = Sha256Digest::of(b"archive");
/// assert!(verify(b"archive".to_vec(), &expected).is_ok());
/// assert!(verify(b"tampered".to_vec(), &expected).is_err());
/// ```
pub fn verify(bytes: Vec<u8>, expected: &Sha256Digest) -> Result<VerifiedArchive, ChecksumMismatch> {
    let actual = Sha256Digest::of(&bytes);
    if actual != *expected {
        log::debug!(
            "checksum mismatch: expected {}, got {}",
            expected.short(),
            actual.short()
        );
        return Err(ChecksumMismatch {
            expected: expected.clone(),
            actual,
        });
    }

    log::debug!("checksum {} verified over {} byte(s)", actual.short(), bytes.len());
    Ok(VerifiedArchive {
        bytes,
        digest: actual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn matching_digest_yields_verified_archive() {
        let expected = Sha256Digest::of(b"milyai release");
        let archive = verify(b"milyai release".to_vec(), &expected).expect("digest matches");
        assert_eq!(archive.bytes(), b"milyai release");
        assert_eq!(archive.digest(), &expected);
    }

    #[rstest]
    #[case::tampered(b"milyai releasf".as_slice())]
    #[case::truncated(b"milyai".as_slice())]
    #[case::empty(b"".as_slice())]
    fn any_other_bytes_are_rejected(#[case] bytes: &[u8]) {
        let expected = Sha256Digest::of(b"milyai release");
        let err = verify(bytes.to_vec(), &expected).expect_err("digest differs");
        assert_eq!(err.expected, expected);
        assert_eq!(err.actual, Sha256Digest::of(bytes));
    }

    #[test]
    fn placeholder_formula_digest_never_matches_real_bytes() {
        let placeholder = Sha256Digest::try_from(
            "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef",
        )
        .expect("valid digest");
        let err = verify(b"real archive".to_vec(), &placeholder).expect_err("mismatch");
        assert!(err.to_string().contains("expected 0123456789abcdef"));
    }
}
