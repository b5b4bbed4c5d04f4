//! Unit tests for install pipeline orchestration.
//!
//! Archives are built in memory and served from `file://` URLs, so these
//! tests run the real fetch, verify, extract and stage code. The smoke test
//! runner is mocked except in the Unix end-to-end case.

use super::*;
use crate::extraction::ArchiveFormat;
use crate::fetch::{FetchError, MockTransport};
use crate::manifest::parser::parse_manifest;
use crate::smoke::MockCommandExecutor;
use crate::test_utils::{
    ArchiveEntry, FAKE_MILYAI_SCRIPT, build_archive, file_url, manifest_toml, milyai_archive,
    output_with, sha256_hex,
};
use rstest::{fixture, rstest};
use tempfile::TempDir;

struct TestEnv {
    _temp: TempDir,
    root: Utf8PathBuf,
    bin_dir: Utf8PathBuf,
    lock_dir: Utf8PathBuf,
}

impl TestEnv {
    fn new() -> Self {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8 path");
        Self {
            bin_dir: root.join("bin"),
            lock_dir: root.join("locks"),
            root,
            _temp: temp,
        }
    }

    /// Write `archive` beside the test root and return a manifest for it
    /// that expects checksum `sha256`.
    fn manifest(&self, format: ArchiveFormat, archive: &[u8], sha256: &str) -> Manifest {
        let path = self.root.join(format!("milyai.{format}"));
        std::fs::write(&path, archive).expect("write archive");
        parse_manifest(&manifest_toml(&file_url(&path), sha256)).expect("valid manifest")
    }

    /// Like [`TestEnv::manifest`], with the single `milyai` target replaced
    /// by the `[[install]]` tables in `install`.
    fn manifest_with_targets(&self, archive: &[u8], install: &str) -> Manifest {
        let path = self.root.join("milyai.tar.gz");
        std::fs::write(&path, archive).expect("write archive");
        let toml = manifest_toml(&file_url(&path), &sha256_hex(archive))
            .replace("[[install]]\nsource = \"milyai\"\n", install);
        parse_manifest(&toml).expect("valid manifest")
    }

    /// A manifest whose checksum matches the standard MilyAI archive.
    fn milyai_manifest(&self) -> Manifest {
        let archive = milyai_archive(ArchiveFormat::TarGz).expect("build archive");
        self.manifest(ArchiveFormat::TarGz, &archive, &sha256_hex(&archive))
    }

    fn config(&self) -> InstallConfig {
        InstallConfig {
            bin_dir: self.bin_dir.clone(),
            lock_dir: self.lock_dir.clone(),
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::none(),
            skip_smoke_test: false,
            quiet: false,
        }
    }

    fn installed(&self) -> Utf8PathBuf {
        self.bin_dir.join("milyai")
    }
}

#[fixture]
fn env() -> TestEnv {
    TestEnv::new()
}

fn passing_executor() -> MockCommandExecutor {
    let mut executor = MockCommandExecutor::new();
    executor
        .expect_run()
        .returning(|_, _, _| Ok(output_with(0, "MilyAI 0.1.0 - modular AI assistant", "")));
    executor
}

fn install(
    manifest: &Manifest,
    config: &InstallConfig,
    executor: &dyn CommandExecutor,
) -> std::result::Result<InstallReport, RunError> {
    let transport = MockTransport::new();
    let collaborators = Collaborators {
        transport: &transport,
        executor,
    };
    run_install_with(manifest, config, &collaborators, &mut Vec::new())
}

#[rstest]
fn successful_run_passes_through_every_state(env: TestEnv) {
    let manifest = env.milyai_manifest();
    let report = install(&manifest, &env.config(), &passing_executor()).expect("install");

    assert_eq!(
        report.states,
        vec![
            RunState::Pending,
            RunState::Fetched,
            RunState::Verified,
            RunState::Installed,
            RunState::Tested,
            RunState::Done,
        ]
    );
    assert_eq!(report.installed, vec![env.installed()]);
    assert_eq!(&report.digest, manifest.sha256());
    assert!(report.smoke_output.is_some_and(|out| out.contains("MilyAI")));
    assert_eq!(
        std::fs::read(env.installed()).expect("read installed"),
        FAKE_MILYAI_SCRIPT
    );
}

#[rstest]
#[case(ArchiveFormat::TarZst)]
#[case(ArchiveFormat::Tar)]
#[case(ArchiveFormat::Zip)]
fn installs_from_every_archive_format(env: TestEnv, #[case] format: ArchiveFormat) {
    let archive = milyai_archive(format).expect("build archive");
    let manifest = env.manifest(format, &archive, &sha256_hex(&archive));
    install(&manifest, &env.config(), &passing_executor()).expect("install");
    assert!(env.installed().is_file());
}

#[rstest]
#[case::fresh(None)]
#[case::existing(Some(b"milyai 0.0.9".as_slice()))]
fn checksum_mismatch_leaves_destination_untouched(
    env: TestEnv,
    #[case] existing: Option<&[u8]>,
) {
    if let Some(contents) = existing {
        std::fs::create_dir_all(&env.bin_dir).expect("create bin dir");
        std::fs::write(env.installed(), contents).expect("seed previous version");
    }
    let archive = milyai_archive(ArchiveFormat::TarGz).expect("build archive");
    let manifest = env.manifest(ArchiveFormat::TarGz, &archive, &sha256_hex(b"tampered"));

    let err = install(&manifest, &env.config(), &MockCommandExecutor::new())
        .expect_err("checksum mismatch");

    assert_eq!(err.step, Step::Verify);
    assert_eq!(err.exit_code(), 5);
    assert!(err.to_string().starts_with("milyai 0.1.0 failed at verify"));
    match existing {
        Some(contents) => assert_eq!(std::fs::read(env.installed()).expect("read"), contents),
        None => assert!(!env.installed().exists()),
    }
}

#[rstest]
fn missing_entry_is_an_extraction_failure(env: TestEnv) {
    let archive = build_archive(
        ArchiveFormat::TarGz,
        &[ArchiveEntry::file("README.md", b"MilyAI", 0o644)],
    )
    .expect("build archive");
    let manifest = env.manifest(ArchiveFormat::TarGz, &archive, &sha256_hex(&archive));

    let err = install(&manifest, &env.config(), &MockCommandExecutor::new())
        .expect_err("missing entry");

    assert_eq!(err.step, Step::Install);
    assert_eq!(err.exit_code(), 6);
    assert!(!env.installed().exists());
}

#[rstest]
fn failed_second_target_leaves_no_partial_install(env: TestEnv) {
    let archive = build_archive(
        ArchiveFormat::TarGz,
        &[
            ArchiveEntry::file("milyai", FAKE_MILYAI_SCRIPT, 0o755),
            ArchiveEntry::file("helper", b"#!/bin/sh\n", 0o755),
        ],
    )
    .expect("build archive");
    let manifest = env.manifest_with_targets(
        &archive,
        "[[install]]\nsource = \"milyai\"\n\n[[install]]\nsource = \"helper\"\n",
    );
    std::fs::create_dir_all(env.bin_dir.join("helper").join("occupied"))
        .expect("create blocking dir");

    let err = install(&manifest, &env.config(), &MockCommandExecutor::new())
        .expect_err("helper destination is a directory");

    assert_eq!(err.step, Step::Install);
    assert_eq!(err.exit_code(), 7);
    assert!(!env.installed().exists(), "milyai left installed");
}

#[rstest]
fn absolute_and_relative_targets_for_one_file_collide(env: TestEnv) {
    let archive = build_archive(
        ArchiveFormat::TarGz,
        &[
            ArchiveEntry::file("milyai", FAKE_MILYAI_SCRIPT, 0o755),
            ArchiveEntry::file("dist/milyai", b"other", 0o755),
        ],
    )
    .expect("build archive");
    let tables = format!(
        "[[install]]\nsource = \"milyai\"\n\n[[install]]\nsource = \"dist/milyai\"\ndest = \"{}\"\n",
        env.installed()
    );
    let manifest = env.manifest_with_targets(&archive, &tables);

    let err = install(&manifest, &env.config(), &MockCommandExecutor::new())
        .expect_err("duplicate destination");

    assert_eq!(err.step, Step::Install);
    assert_eq!(err.exit_code(), 1);
    assert!(err.to_string().contains("duplicate install destination"), "got {err}");
    assert!(!env.installed().exists());
}

#[rstest]
fn skipping_smoke_test_goes_from_installed_to_done(env: TestEnv) {
    let manifest = env.milyai_manifest();
    let config = InstallConfig {
        skip_smoke_test: true,
        ..env.config()
    };

    let report = install(&manifest, &config, &MockCommandExecutor::new()).expect("install");

    assert_eq!(
        report.states[report.states.len() - 2..],
        [RunState::Installed, RunState::Done]
    );
    assert!(report.smoke_output.is_none());
}

#[rstest]
fn smoke_failure_reports_step_and_keeps_binary(env: TestEnv) {
    let manifest = env.milyai_manifest();
    let mut executor = MockCommandExecutor::new();
    executor
        .expect_run()
        .returning(|_, _, _| Ok(output_with(0, "usage: something-else", "")));

    let err = install(&manifest, &env.config(), &executor).expect_err("smoke failure");

    assert_eq!(err.step, Step::SmokeTest);
    assert_eq!(err.exit_code(), 8);
    assert!(env.installed().is_file());
}

#[rstest]
fn http_error_fails_fetch_step(env: TestEnv) {
    let manifest = parse_manifest(&manifest_toml(
        "https://example.com/milyai/releases/0.1.0/milyai-macos-universal.tar.gz",
        &sha256_hex(b"archive"),
    ))
    .expect("valid manifest");
    let mut transport = MockTransport::new();
    transport.expect_get().times(1).returning(|url| {
        Err(FetchError::Http {
            url: url.to_owned(),
            status: 404,
        })
    });
    let collaborators = Collaborators {
        transport: &transport,
        executor: &MockCommandExecutor::new(),
    };

    let err = run_install_with(&manifest, &env.config(), &collaborators, &mut Vec::new())
        .expect_err("HTTP 404");

    assert_eq!(err.step, Step::Fetch);
    assert_eq!(err.exit_code(), 4);
}

#[rstest]
fn held_lock_fails_install_step(env: TestEnv) {
    let manifest = env.milyai_manifest();
    let _held = PackageLock::acquire(&env.lock_dir, manifest.name()).expect("lock");

    let err = install(&manifest, &env.config(), &MockCommandExecutor::new())
        .expect_err("lock held");

    assert_eq!(err.step, Step::Install);
    assert_eq!(err.exit_code(), 7);
    assert!(!env.installed().exists());
}

#[rstest]
fn repeated_runs_converge_on_one_state(env: TestEnv) {
    let manifest = env.milyai_manifest();
    for _ in 0..2 {
        install(&manifest, &env.config(), &passing_executor()).expect("install");
    }

    let names: Vec<String> = std::fs::read_dir(&env.bin_dir)
        .expect("read bin dir")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["milyai".to_owned()]);
    assert_eq!(
        std::fs::read(env.installed()).expect("read installed"),
        FAKE_MILYAI_SCRIPT
    );
}

#[rstest]
#[case::verbose(false, true)]
#[case::quiet(true, false)]
fn progress_lines_follow_quiet_flag(
    env: TestEnv,
    #[case] quiet: bool,
    #[case] expect_progress: bool,
) {
    let manifest = env.milyai_manifest();
    let config = InstallConfig {
        quiet,
        ..env.config()
    };
    let transport = MockTransport::new();
    let executor = passing_executor();
    let collaborators = Collaborators {
        transport: &transport,
        executor: &executor,
    };

    let mut stderr = Vec::new();
    run_install_with(&manifest, &config, &collaborators, &mut stderr).expect("install");

    let text = String::from_utf8(stderr).expect("stderr was not UTF-8");
    assert_eq!(text.contains("Fetching file://"), expect_progress, "got {text}");
}

#[rstest]
#[case(RunState::Pending, Some(Step::Fetch))]
#[case(RunState::Fetched, Some(Step::Verify))]
#[case(RunState::Verified, Some(Step::Install))]
#[case(RunState::Installed, Some(Step::SmokeTest))]
#[case(RunState::Tested, None)]
#[case(RunState::Done, None)]
#[case(RunState::Failed, None)]
fn each_state_has_at_most_one_next_step(#[case] state: RunState, #[case] next: Option<Step>) {
    assert_eq!(state.next_step(), next);
    if let Some(step) = next {
        assert_ne!(step.completes(), state);
    }
}

#[test]
fn only_done_and_failed_are_terminal() {
    assert!(RunState::Done.is_terminal());
    assert!(RunState::Failed.is_terminal());
    assert!(!RunState::Tested.is_terminal());
}

#[cfg(unix)]
#[rstest]
fn end_to_end_runs_installed_binary(env: TestEnv) {
    use crate::smoke::SystemCommandExecutor;
    use std::os::unix::fs::PermissionsExt;

    let manifest = env.milyai_manifest();
    let report = install(&manifest, &env.config(), &SystemCommandExecutor).expect("install");

    let mode = std::fs::metadata(env.installed())
        .expect("metadata")
        .permissions()
        .mode();
    assert_eq!(mode & 0o111, 0o111, "installed file is not executable");
    assert!(
        report
            .smoke_output
            .is_some_and(|out| out.contains("MilyAI")),
    );
}
