//! Output formatting for the installer CLI.
//!
//! Progress, dry-run plans and manifest summaries are plain text written to
//! stderr (progress, plans) or stdout (`show`).

use crate::manifest::Manifest;
use crate::pipeline::InstallReport;
use camino::Utf8Path;
use std::io::Write;
use std::time::Duration;

/// Write one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// Format a success message after installation.
///
/// # Example
///
/// ```
/// use camino::Utf8PathBuf;
/// use milyai_installer::output::success_message;
/// use milyai_installer::pipeline::{InstallReport, RunState};
///
/// let report = InstallReport {
///     package: "milyai".try_into().expect("valid name"),
///     version: "0.1.0".try_into().expect("valid version"),
///     digest: milyai_installer::manifest::sha256_digest::Sha256Digest::of(b"archive"),
///     installed: vec![Utf8PathBuf::from("/opt/bin/milyai")],
///     smoke_output: Some("MilyAI".to_owned()),
///     states: vec![RunState::Pending, RunState::Done],
/// };
/// assert_eq!(
///     success_message(&report),
///     "Successfully installed milyai 0.1.0 (1 file)",
/// );
/// ```
#[must_use]
pub fn success_message(report: &InstallReport) -> String {
    let count = report.installed.len();
    let plural = if count == 1 { "file" } else { "files" };
    format!(
        "Successfully installed {} {} ({count} {plural})",
        report.package, report.version
    )
}

/// Format the list of installed paths, one per line.
#[must_use]
pub fn installed_paths_text(report: &InstallReport) -> String {
    report
        .installed
        .iter()
        .map(|path| format!("  {path}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Configuration information for dry-run output.
#[derive(Debug)]
pub struct DryRunInfo<'a> {
    /// Manifest that would be installed.
    pub manifest: &'a Manifest,
    /// Directory relative targets resolve against.
    pub bin_dir: &'a Utf8Path,
    /// Directory for the package lock file.
    pub lock_dir: &'a Utf8Path,
    /// Network and smoke test timeout.
    pub timeout: Duration,
    /// Extra fetch attempts on transient failure.
    pub retries: u32,
    /// Whether the smoke test is skipped.
    pub skip_smoke_test: bool,
}

impl DryRunInfo<'_> {
    /// Format the dry-run information for display.
    #[must_use]
    pub fn display_text(&self) -> String {
        let manifest = self.manifest;
        let mut lines = vec![
            "Dry run - no files will be modified".to_owned(),
            String::new(),
            format!("Package: {} {}", manifest.name(), manifest.version()),
            format!("Source: {}", manifest.url()),
            format!("Archive format: {}", manifest.url().archive_format()),
            format!("Expected SHA-256: {}", manifest.sha256()),
            format!("Timeout: {}s", self.timeout.as_secs()),
            format!("Retries: {}", self.retries),
            format!(
                "Lock file: {}",
                self.lock_dir.join(format!("{}.lock", manifest.name()))
            ),
            String::new(),
            "Files to install:".to_owned(),
        ];

        for target in manifest.install_targets() {
            lines.push(format!(
                "  {} -> {}",
                target.source(),
                target.destination(self.bin_dir)
            ));
        }

        lines.push(String::new());
        if self.skip_smoke_test {
            lines.push("Smoke test: skipped".to_owned());
        } else {
            let command = manifest.smoke_test().resolve(self.bin_dir).display();
            lines.push(format!(
                "Smoke test: {command} (expects \"{}\")",
                manifest.smoke_test().expect()
            ));
        }

        lines.join("\n")
    }
}

/// Format a parsed manifest for the `show` subcommand.
#[must_use]
pub fn manifest_text(manifest: &Manifest) -> String {
    let mut lines = vec![format!("{} {}", manifest.name(), manifest.version())];
    if let Some(desc) = manifest.desc() {
        lines.push(format!("  {desc}"));
    }
    if let Some(homepage) = manifest.homepage() {
        lines.push(format!("  homepage: {homepage}"));
    }
    lines.push(format!("  url:      {}", manifest.url()));
    lines.push(format!("  sha256:   {}", manifest.sha256()));
    for target in manifest.install_targets() {
        lines.push(format!("  install:  {} -> {}", target.source(), target.dest()));
    }
    lines.push(format!(
        "  test:     {} (expects \"{}\")",
        manifest.smoke_test().template(),
        manifest.smoke_test().expect()
    ));
    lines.join("\n")
}
