//! CLI argument definitions for the MilyAI installer.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use crate::fetch::RetryPolicy;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use std::time::Duration;

/// Default network and smoke test timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of extra fetch attempts.
pub const DEFAULT_RETRIES: u32 = 2;

/// Fetch, verify, install and smoke-test a package from its manifest.
#[derive(Parser, Debug)]
#[command(name = "milyai-installer")]
#[command(version, about)]
#[command(long_about = concat!(
    "Fetch, verify, install and smoke-test a package from its manifest.\n\n",
    "The manifest names a release archive, the SHA-256 checksum it must match, ",
    "the archive entries to install, and a command whose output proves the ",
    "installed binary runs. Nothing is written to a destination until the ",
    "checksum matches and every entry has been staged.\n\n",
    "Without --manifest the built-in MilyAI formula is used.",
))]
#[command(after_help = concat!(
    "EXIT CODES:\n",
    "  0  success\n",
    "  1  manifest or configuration error\n",
    "  2  usage error\n",
    "  3  network error\n",
    "  4  HTTP error status\n",
    "  5  checksum mismatch\n",
    "  6  extraction error\n",
    "  7  filesystem error or install lock held\n",
    "  8  smoke test failure\n\n",
    "EXAMPLES:\n",
    "  Install MilyAI into the default bin directory:\n",
    "    $ milyai-installer install\n\n",
    "  Install from a custom manifest into ./bin:\n",
    "    $ milyai-installer install -m tool.toml -b ./bin\n\n",
    "  Preview without downloading:\n",
    "    $ milyai-installer install --dry-run\n\n",
    "  Print the built-in formula:\n",
    "    $ milyai-installer show",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Install arguments (used when no subcommand is given).
    #[command(flatten)]
    pub install: InstallArgs,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Install the package (default when no subcommand given).
    Install(InstallArgs),

    /// Print the parsed manifest without installing.
    Show(ShowArgs),
}

/// Arguments for the install command.
#[derive(Parser, Debug, Clone, Default)]
pub struct InstallArgs {
    /// Manifest TOML file [default: built-in MilyAI formula].
    #[arg(short, long, value_name = "FILE")]
    pub manifest: Option<Utf8PathBuf>,

    /// Destination for relative install targets [default: platform-specific].
    #[arg(short, long, value_name = "DIR")]
    pub bin_dir: Option<Utf8PathBuf>,

    /// Directory holding per-package lock files [default: platform-specific].
    #[arg(long, value_name = "DIR")]
    pub state_dir: Option<Utf8PathBuf>,

    /// Network and smoke test timeout in seconds [default: 30].
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: Option<u64>,

    /// Extra fetch attempts on transient failure, at most 10 [default: 2].
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(0..=10))]
    pub retries: Option<u32>,

    /// Do not run the post-install smoke test.
    #[arg(long)]
    pub skip_smoke_test: bool,

    /// Show the install plan and exit without fetching.
    #[arg(long)]
    pub dry_run: bool,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,
}

/// Arguments for the show command.
#[derive(Parser, Debug, Clone, Default)]
pub struct ShowArgs {
    /// Manifest TOML file [default: built-in MilyAI formula].
    #[arg(short, long, value_name = "FILE")]
    pub manifest: Option<Utf8PathBuf>,
}

impl InstallArgs {
    /// Return the configured timeout.
    ///
    /// # Examples
    ///
    /// ```
    /// use milyai_installer::cli::InstallArgs;
    /// use std::time::Duration;
    ///
    /// assert_eq!(InstallArgs::default().timeout(), Duration::from_secs(30));
    /// ```
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    /// Return the fetch retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retries.unwrap_or(DEFAULT_RETRIES),
            ..RetryPolicy::default()
        }
    }
}

impl Cli {
    /// Returns the effective install arguments.
    ///
    /// If an `Install` subcommand was provided, returns those arguments.
    /// Otherwise returns the flattened install arguments.
    #[must_use]
    pub fn install_args(&self) -> &InstallArgs {
        match &self.command {
            Some(Command::Install(args)) => args,
            Some(Command::Show(_)) | None => &self.install,
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
