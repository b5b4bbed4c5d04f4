//! MilyAI installer CLI entrypoint.
//!
//! This binary loads a package manifest (the built-in MilyAI formula by
//! default), then fetches, verifies, installs and smoke-tests the package.
//! Each failure class exits with its own status code.

use clap::Parser;
use milyai_installer::cli::{Cli, Command, InstallArgs, ShowArgs};
use milyai_installer::dirs::{BaseDirs, SystemBaseDirs, default_bin_dir, default_lock_dir};
use milyai_installer::error::InstallerError;
use milyai_installer::manifest::parser::load_or_builtin;
use milyai_installer::output::{
    DryRunInfo, installed_paths_text, manifest_text, success_message, write_stderr_line,
};
use milyai_installer::pipeline::{InstallConfig, RunError, run_install};
use std::fmt;
use std::io::Write;

/// Why a command did not complete.
#[derive(Debug)]
enum Failure {
    /// The manifest or settings could not be resolved.
    Setup(InstallerError),
    /// A pipeline step failed.
    Run(RunError),
}

impl Failure {
    fn exit_code(&self) -> i32 {
        match self {
            Self::Setup(err) => err.exit_code(),
            Self::Run(err) => err.exit_code(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup(err) => write!(f, "{err}"),
            Self::Run(err) => write!(f, "{err}"),
        }
    }
}

impl From<InstallerError> for Failure {
    fn from(err: InstallerError) -> Self {
        Self::Setup(err)
    }
}

impl From<milyai_installer::manifest::ManifestError> for Failure {
    fn from(err: milyai_installer::manifest::ManifestError) -> Self {
        Self::Setup(err.into())
    }
}

impl From<RunError> for Failure {
    fn from(err: RunError) -> Self {
        Self::Run(err)
    }
}

fn main() {
    let cli = Cli::parse();
    let args = cli.install_args();
    init_logging(log_level(args.verbosity, args.quiet));

    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stderr: &mut dyn Write) -> Result<(), Failure> {
    match &cli.command {
        Some(Command::Show(args)) => run_show(args, &mut std::io::stdout().lock()),
        Some(Command::Install(args)) => run_install_command(args, &SystemBaseDirs::new(), stderr),
        None => run_install_command(&cli.install, &SystemBaseDirs::new(), stderr),
    }
}

/// Prints the parsed manifest to `stdout`.
fn run_show(args: &ShowArgs, stdout: &mut dyn Write) -> Result<(), Failure> {
    let manifest = load_or_builtin(args.manifest.as_deref())?;
    writeln!(stdout, "{}", manifest_text(&manifest))
        .map_err(|source| InstallerError::WriteFailed { source })?;
    Ok(())
}

/// Resolves settings, then installs or prints the dry-run plan.
fn run_install_command(
    args: &InstallArgs,
    dirs: &dyn BaseDirs,
    stderr: &mut dyn Write,
) -> Result<(), Failure> {
    let manifest = load_or_builtin(args.manifest.as_deref())?;
    let bin_dir = args
        .bin_dir
        .clone()
        .or_else(|| default_bin_dir(dirs))
        .ok_or_else(|| InstallerError::Configuration {
            reason: "could not determine a bin directory; pass --bin-dir".to_owned(),
        })?;
    let lock_dir = args
        .state_dir
        .clone()
        .unwrap_or_else(|| default_lock_dir(dirs));

    if args.dry_run {
        let info = DryRunInfo {
            manifest: &manifest,
            bin_dir: &bin_dir,
            lock_dir: &lock_dir,
            timeout: args.timeout(),
            retries: args.retry_policy().max_retries,
            skip_smoke_test: args.skip_smoke_test,
        };
        write_stderr_line(stderr, info.display_text());
        return Ok(());
    }

    let config = InstallConfig {
        bin_dir,
        lock_dir,
        timeout: args.timeout(),
        retry: args.retry_policy(),
        skip_smoke_test: args.skip_smoke_test,
        quiet: args.quiet,
    };
    let report = run_install(&manifest, &config, stderr)?;

    if !args.quiet {
        write_stderr_line(stderr, "");
        write_stderr_line(stderr, success_message(&report));
        write_stderr_line(stderr, installed_paths_text(&report));
    }
    Ok(())
}

fn log_level(verbosity: u8, quiet: bool) -> log::LevelFilter {
    if quiet {
        return log::LevelFilter::Error;
    }
    match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

fn init_logging(level: log::LevelFilter) {
    // A logger may already be installed; keep it.
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .format_target(false)
        .try_init()
        .ok();
}

fn exit_code_for_run_result(result: Result<(), Failure>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            err.exit_code()
        }
    }
}
