//! MilyAI installer library.
//!
//! This crate installs a single package described by a manifest: it fetches
//! the release archive, verifies its SHA-256 checksum, stages and promotes
//! the named entries, and smoke-tests the installed binary. It is used by the
//! `milyai-installer` CLI binary and can be consumed programmatically for
//! testing or custom installation workflows.
//!
//! # Modules
//!
//! - [`cli`] - Command-line argument definitions
//! - [`dirs`] - Directory resolution abstraction for platform-specific paths
//! - [`error`] - Failure taxonomy and exit codes
//! - [`extraction`] - Archive format detection and entry extraction
//! - [`fetch`] - Archive retrieval with timeout and bounded retry
//! - [`lock`] - Per-package advisory install lock
//! - [`manifest`] - Manifest schema, validation and loading
//! - [`output`] - Progress, dry-run and manifest formatting
//! - [`pipeline`] - Fetch, verify, install and smoke test orchestration
//! - [`smoke`] - Post-install smoke test
//! - [`stager`] - Staging and atomic promotion of installed files
//! - [`verify`] - Checksum gate producing verified archives

pub mod cli;
pub mod dirs;
pub mod error;
pub mod extraction;
pub mod fetch;
pub mod lock;
pub mod manifest;
pub mod output;
pub mod pipeline;
pub mod smoke;
pub mod stager;
pub mod verify;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
