//! Install pipeline orchestration.
//!
//! Drives one manifest through fetch, verify, install and smoke test, in
//! that order, tracking the run state:
//!
//! ```text
//! Pending -> Fetched -> Verified -> Installed -> Tested -> Done
//!                                        \-----------------^  (smoke test skipped)
//! ```
//!
//! Any failing step moves the run to `Failed` and is reported in the
//! resulting [`RunError`].

use crate::error::{InstallerError, Result};
use crate::extraction::{ExtractionError, extract_entries};
use crate::fetch::{Fetcher, HttpTransport, RetryPolicy, Transport};
use crate::lock::PackageLock;
use crate::manifest::{Manifest, ManifestError};
use crate::manifest::install_target::{InstallTarget, normalise_entry_name};
use crate::manifest::package_name::PackageName;
use crate::manifest::package_version::PackageVersion;
use crate::manifest::sha256_digest::Sha256Digest;
use crate::output::write_stderr_line;
use crate::smoke::{CommandExecutor, SystemCommandExecutor, run_smoke_test};
use crate::stager::Stager;
use crate::verify::{VerifiedArchive, verify};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashSet;
use std::fmt;
use std::io::Write;
use std::time::Duration;

/// State of an install run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Nothing has happened yet.
    Pending,
    /// Archive bytes are in memory.
    Fetched,
    /// Archive checksum matched the manifest.
    Verified,
    /// Files are at their destinations.
    Installed,
    /// The smoke test passed.
    Tested,
    /// The run completed.
    Done,
    /// A step failed; terminal.
    Failed,
}

impl RunState {
    /// Return the step that moves a run out of this state.
    #[must_use]
    pub fn next_step(self) -> Option<Step> {
        match self {
            Self::Pending => Some(Step::Fetch),
            Self::Fetched => Some(Step::Verify),
            Self::Verified => Some(Step::Install),
            Self::Installed => Some(Step::SmokeTest),
            Self::Tested | Self::Done | Self::Failed => None,
        }
    }

    /// Return true for `Done` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// A pipeline step, as named in failure reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Retrieve the archive.
    Fetch,
    /// Check the archive checksum.
    Verify,
    /// Extract, stage and promote files.
    Install,
    /// Run the installed binary.
    SmokeTest,
}

impl Step {
    /// Return the state a run reaches when this step succeeds.
    #[must_use]
    pub fn completes(self) -> RunState {
        match self {
            Self::Fetch => RunState::Fetched,
            Self::Verify => RunState::Verified,
            Self::Install => RunState::Installed,
            Self::SmokeTest => RunState::Tested,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetch => "fetch",
            Self::Verify => "verify",
            Self::Install => "install",
            Self::SmokeTest => "smoke test",
        };
        f.write_str(name)
    }
}

/// A failed run, naming the package and the step that failed.
#[derive(Debug, thiserror::Error)]
#[error("{package} {version} failed at {step}: {source}")]
pub struct RunError {
    /// Package being installed.
    pub package: PackageName,
    /// Version being installed.
    pub version: PackageVersion,
    /// Step that failed.
    pub step: Step,
    /// Underlying failure.
    #[source]
    pub source: InstallerError,
}

impl RunError {
    /// Return the process exit code for the underlying failure.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.source.exit_code()
    }
}

/// Settings for one install run.
#[derive(Debug, Clone)]
pub struct InstallConfig {
    /// Directory relative install targets resolve against.
    pub bin_dir: Utf8PathBuf,
    /// Directory holding per-package lock files.
    pub lock_dir: Utf8PathBuf,
    /// Network and smoke test timeout.
    pub timeout: Duration,
    /// Fetch retry policy.
    pub retry: RetryPolicy,
    /// Skip the post-install smoke test.
    pub skip_smoke_test: bool,
    /// Suppress progress output.
    pub quiet: bool,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Package that was installed.
    pub package: PackageName,
    /// Version that was installed.
    pub version: PackageVersion,
    /// Verified archive digest.
    pub digest: Sha256Digest,
    /// Destination paths, in manifest order.
    pub installed: Vec<Utf8PathBuf>,
    /// Smoke test stdout, when the test ran.
    pub smoke_output: Option<String>,
    /// Every state the run passed through, starting with `Pending`.
    pub states: Vec<RunState>,
}

/// External collaborators of the pipeline.
pub struct Collaborators<'a> {
    /// Network transport for remote archives.
    pub transport: &'a dyn Transport,
    /// Runner for the smoke test.
    pub executor: &'a dyn CommandExecutor,
}

/// Install `manifest` using the real network and process runner.
///
/// # Errors
///
/// Returns a [`RunError`] naming the step that failed.
pub fn run_install(
    manifest: &Manifest,
    config: &InstallConfig,
    stderr: &mut dyn Write,
) -> std::result::Result<InstallReport, RunError> {
    let transport = HttpTransport::new(config.timeout);
    let collaborators = Collaborators {
        transport: &transport,
        executor: &SystemCommandExecutor,
    };
    run_install_with(manifest, config, &collaborators, stderr)
}

/// Install `manifest` with injected collaborators.
///
/// # Errors
///
/// Returns a [`RunError`] naming the step that failed.
pub fn run_install_with(
    manifest: &Manifest,
    config: &InstallConfig,
    collaborators: &Collaborators<'_>,
    stderr: &mut dyn Write,
) -> std::result::Result<InstallReport, RunError> {
    let mut run = Run::new(manifest);

    progress(config, stderr, format!("Fetching {}...", manifest.url()));
    let fetcher = Fetcher::new(collaborators.transport, config.retry);
    let bytes = run.step(Step::Fetch, || {
        fetcher
            .fetch(manifest.url())
            .map_err(InstallerError::from)
    })?;

    progress(config, stderr, format!("Verifying {} byte(s)...", bytes.len()));
    let archive = run.step(Step::Verify, || {
        verify(bytes, manifest.sha256()).map_err(InstallerError::from)
    })?;

    progress(
        config,
        stderr,
        format!(
            "Installing {} file(s) to {}...",
            manifest.install_targets().len(),
            config.bin_dir
        ),
    );
    let (installed, lock) = run.step(Step::Install, || {
        let lock = PackageLock::acquire(&config.lock_dir, manifest.name())?;
        let installed = install_files(manifest, &archive, &config.bin_dir)?;
        Ok((installed, lock))
    })?;

    let smoke_output = if config.skip_smoke_test {
        log::info!("smoke test skipped");
        None
    } else {
        progress(
            config,
            stderr,
            format!("Running smoke test `{}`...", manifest.smoke_test().template()),
        );
        Some(run.step(Step::SmokeTest, || {
            run_smoke_test(
                manifest.smoke_test(),
                &config.bin_dir,
                collaborators.executor,
                config.timeout,
            )
            .map_err(InstallerError::from)
        })?)
    };
    drop(lock);

    run.finish();
    Ok(InstallReport {
        package: manifest.name().clone(),
        version: manifest.version().clone(),
        digest: archive.digest().clone(),
        installed,
        smoke_output,
        states: run.states,
    })
}

fn progress(config: &InstallConfig, stderr: &mut dyn Write, message: impl fmt::Display) {
    if !config.quiet {
        write_stderr_line(stderr, message);
    }
}

/// Extract every install target and promote it into place.
///
/// Destinations are compared after resolving against `bin_dir`, so an
/// absolute path and a relative one naming the same file collide.
fn install_files(
    manifest: &Manifest,
    archive: &VerifiedArchive,
    bin_dir: &Utf8Path,
) -> Result<Vec<Utf8PathBuf>> {
    let targets = manifest.install_targets();
    let mut seen = HashSet::new();
    for target in targets {
        let dest = target.destination(bin_dir);
        if !seen.insert(dest.clone()) {
            return Err(ManifestError::DuplicateDestination {
                dest: dest.to_string(),
            }
            .into());
        }
    }

    let wanted: Vec<&str> = targets.iter().map(InstallTarget::source).collect();
    let entries = extract_entries(archive, manifest.url().archive_format(), &wanted)?;

    let mut stager = Stager::new();
    for target in targets {
        let name = normalise_entry_name(target.source());
        let entry = entries
            .get(&name)
            .ok_or_else(|| ExtractionError::MissingEntry { entry: name.clone() })?;
        stager.stage(&target.destination(bin_dir), &entry.contents, entry.mode)?;
    }
    stager.promote()
}

/// Tracks state transitions for one run.
struct Run<'a> {
    manifest: &'a Manifest,
    states: Vec<RunState>,
}

impl<'a> Run<'a> {
    fn new(manifest: &'a Manifest) -> Self {
        Self {
            manifest,
            states: vec![RunState::Pending],
        }
    }

    fn state(&self) -> RunState {
        self.states.last().copied().unwrap_or(RunState::Pending)
    }

    fn enter(&mut self, state: RunState) {
        log::debug!(
            "{} {}: {:?} -> {state:?}",
            self.manifest.name(),
            self.manifest.version(),
            self.state()
        );
        self.states.push(state);
    }

    fn step<T>(
        &mut self,
        step: Step,
        action: impl FnOnce() -> Result<T>,
    ) -> std::result::Result<T, RunError> {
        debug_assert_eq!(self.state().next_step(), Some(step));
        match action() {
            Ok(value) => {
                self.enter(step.completes());
                Ok(value)
            }
            Err(source) => {
                self.enter(RunState::Failed);
                Err(RunError {
                    package: self.manifest.name().clone(),
                    version: self.manifest.version().clone(),
                    step,
                    source,
                })
            }
        }
    }

    fn finish(&mut self) {
        debug_assert!(matches!(
            self.state(),
            RunState::Installed | RunState::Tested
        ));
        self.enter(RunState::Done);
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
