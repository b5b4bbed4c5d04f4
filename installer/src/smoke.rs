//! Post-install smoke test.
//!
//! Runs the freshly installed binary directly (no shell) under a timeout and
//! checks that it exits successfully with the expected text on stdout.

use crate::manifest::smoke_test_spec::SmokeTestSpec;
use camino::Utf8Path;
use std::io::Read;
use std::process::{Child, Command, Output, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;
use wait_timeout::ChildExt;

/// Longest stdout or stderr excerpt carried in an error message.
const EXCERPT_LIMIT: usize = 200;

/// Errors arising from the smoke test.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SmokeTestError {
    /// The program could not be started.
    #[error("could not run {program}: {reason}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Description of the spawn failure.
        reason: String,
    },

    /// The program did not exit within the timeout and was killed.
    #[error("`{command}` timed out after {} seconds", .timeout.as_secs())]
    TimedOut {
        /// The command line that was run.
        command: String,
        /// The timeout that expired.
        timeout: Duration,
    },

    /// The program exited unsuccessfully.
    #[error("`{command}` exited with {status}: {stderr}")]
    ExitStatus {
        /// The command line that was run.
        command: String,
        /// Exit status as reported by the platform.
        status: String,
        /// Excerpt of the program's stderr.
        stderr: String,
    },

    /// The expected text did not appear in stdout.
    #[error("`{command}` output does not contain \"{expected}\"; got: {stdout}")]
    MissingOutput {
        /// The command line that was run.
        command: String,
        /// Substring the manifest expects.
        expected: String,
        /// Excerpt of the program's stdout.
        stdout: String,
    },
}

/// Abstraction for running the installed program.
#[cfg_attr(test, mockall::automock)]
pub trait CommandExecutor {
    /// Run `program` with `args`, returning its captured output once it
    /// exits.
    ///
    /// # Errors
    ///
    /// Returns [`SmokeTestError::Spawn`] when the program cannot be started
    /// and [`SmokeTestError::TimedOut`] when it outlives `timeout`.
    fn run(
        &self,
        program: &Utf8Path,
        args: &[String],
        timeout: Duration,
    ) -> Result<Output, SmokeTestError>;
}

/// Executes commands on the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(
        &self,
        program: &Utf8Path,
        args: &[String],
        timeout: Duration,
    ) -> Result<Output, SmokeTestError> {
        let spawn_error = |reason: String| SmokeTestError::Spawn {
            program: program.to_string(),
            reason,
        };

        let mut child = Command::new(program.as_std_path())
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(e.to_string()))?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        match child.wait_timeout(timeout) {
            Ok(Some(status)) => Ok(Output {
                status,
                stdout: collect(stdout),
                stderr: collect(stderr),
            }),
            Ok(None) => {
                reap(&mut child);
                let mut command = vec![program.to_string()];
                command.extend(args.iter().cloned());
                Err(SmokeTestError::TimedOut {
                    command: shell_words::join(command),
                    timeout,
                })
            }
            Err(e) => {
                reap(&mut child);
                Err(spawn_error(e.to_string()))
            }
        }
    }
}

/// Kill `child` and wait for it so no zombie process is left behind.
fn reap(child: &mut Child) {
    if let Err(err) = child.kill() {
        log::debug!("kill failed: {err}");
    }
    if let Err(err) = child.wait() {
        log::debug!("wait failed: {err}");
    }
}

/// Read a pipe to completion on its own thread so a chatty child cannot
/// fill the pipe buffer and stall.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

/// Run the manifest's smoke test against binaries installed in `bin_dir`.
///
/// Returns the program's stdout on success.
///
/// # Errors
///
/// Returns a [`SmokeTestError`] if the program cannot run, times out, exits
/// unsuccessfully, or does not print the expected text.
pub fn run_smoke_test(
    spec: &SmokeTestSpec,
    bin_dir: &Utf8Path,
    executor: &dyn CommandExecutor,
    timeout: Duration,
) -> Result<String, SmokeTestError> {
    let resolved = spec.resolve(bin_dir);
    let command = resolved.display();
    log::info!("running smoke test `{command}`");

    let output = executor.run(&resolved.program, &resolved.args, timeout)?;
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

    if !output.status.success() {
        return Err(SmokeTestError::ExitStatus {
            command,
            status: output.status.to_string(),
            stderr: excerpt(&String::from_utf8_lossy(&output.stderr)),
        });
    }

    if !stdout.contains(spec.expect()) {
        return Err(SmokeTestError::MissingOutput {
            command,
            expected: spec.expect().to_owned(),
            stdout: excerpt(&stdout),
        });
    }

    log::debug!("smoke test output contains \"{}\"", spec.expect());
    Ok(stdout)
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(EXCERPT_LIMIT) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{exit_status, output_with};
    use rstest::{fixture, rstest};

    #[fixture]
    fn spec() -> SmokeTestSpec {
        SmokeTestSpec::new("milyai --help", "MilyAI").expect("valid smoke test")
    }

    fn executor_returning(output: Output) -> MockCommandExecutor {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_run()
            .withf(|program, args, _| {
                program.as_str() == "/opt/bin/milyai" && args.len() == 1 && args[0] == "--help"
            })
            .times(1)
            .return_once(move |_, _, _| Ok(output));
        executor
    }

    #[rstest]
    fn passes_when_output_contains_expected_text(spec: SmokeTestSpec) {
        let executor = executor_returning(output_with(0, "MilyAI 0.1.0\nUsage: milyai", ""));
        let stdout = run_smoke_test(
            &spec,
            Utf8Path::new("/opt/bin"),
            &executor,
            Duration::from_secs(5),
        )
        .expect("smoke test passes");
        assert!(stdout.starts_with("MilyAI"));
    }

    #[rstest]
    fn fails_when_expected_text_is_missing(spec: SmokeTestSpec) {
        let executor = executor_returning(output_with(0, "usage: something-else", ""));
        let err = run_smoke_test(
            &spec,
            Utf8Path::new("/opt/bin"),
            &executor,
            Duration::from_secs(5),
        )
        .expect_err("missing text");
        assert!(
            matches!(err, SmokeTestError::MissingOutput { ref expected, .. } if expected == "MilyAI"),
            "got {err}"
        );
    }

    #[rstest]
    fn fails_on_nonzero_exit_even_with_expected_text(spec: SmokeTestSpec) {
        let executor = executor_returning(output_with(3, "MilyAI", "boom"));
        let err = run_smoke_test(
            &spec,
            Utf8Path::new("/opt/bin"),
            &executor,
            Duration::from_secs(5),
        )
        .expect_err("non-zero exit");
        assert!(
            matches!(err, SmokeTestError::ExitStatus { ref stderr, .. } if stderr == "boom"),
            "got {err}"
        );
    }

    #[rstest]
    fn executor_errors_propagate(spec: SmokeTestSpec) {
        let mut executor = MockCommandExecutor::new();
        executor.expect_run().times(1).returning(|program, _, _| {
            Err(SmokeTestError::Spawn {
                program: program.to_string(),
                reason: "No such file or directory".to_owned(),
            })
        });
        let err = run_smoke_test(
            &spec,
            Utf8Path::new("/opt/bin"),
            &executor,
            Duration::from_secs(5),
        )
        .expect_err("spawn failure");
        assert!(err.to_string().contains("/opt/bin/milyai"), "got {err}");
    }

    #[test]
    fn excerpt_truncates_long_output() {
        let long = "x".repeat(EXCERPT_LIMIT + 50);
        let cut = excerpt(&long);
        assert_eq!(cut.len(), EXCERPT_LIMIT + 3);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn exit_status_helper_reports_code() {
        assert_eq!(exit_status(2).code(), Some(2));
    }

    #[cfg(unix)]
    mod system {
        use super::*;

        fn sh() -> &'static Utf8Path {
            Utf8Path::new("/bin/sh")
        }

        fn args(script: &str) -> Vec<String> {
            vec!["-c".to_owned(), script.to_owned()]
        }

        #[test]
        fn captures_stdout_and_status() {
            let output = SystemCommandExecutor
                .run(sh(), &args("echo MilyAI; exit 0"), Duration::from_secs(10))
                .expect("runs");
            assert!(output.status.success());
            assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "MilyAI");
        }

        #[test]
        fn kills_program_after_timeout() {
            let err = SystemCommandExecutor
                .run(sh(), &args("sleep 10"), Duration::from_millis(200))
                .expect_err("times out");
            assert!(matches!(err, SmokeTestError::TimedOut { .. }), "got {err}");
        }

        #[test]
        fn reap_collects_killed_child() {
            let mut child = Command::new("/bin/sh")
                .args(["-c", "sleep 10"])
                .spawn()
                .expect("spawn sleep");
            reap(&mut child);
            let status = child.try_wait().expect("query child");
            assert!(status.is_some_and(|s| !s.success()), "child not reaped");
        }

        #[test]
        fn missing_program_is_a_spawn_error() {
            let err = SystemCommandExecutor
                .run(
                    Utf8Path::new("/nonexistent/milyai"),
                    &[],
                    Duration::from_secs(1),
                )
                .expect_err("no such program");
            assert!(matches!(err, SmokeTestError::Spawn { .. }), "got {err}");
        }
    }
}
