//! End-to-end tests for the `milyai-installer` binary.
//!
//! These run the compiled binary and check its exit codes and stderr for
//! the dry-run, `show` and full install paths.

use camino::Utf8PathBuf;
use milyai_installer::extraction::ArchiveFormat;
use milyai_installer::test_utils::{
    ArchiveEntry, build_archive, file_url, manifest_toml, milyai_archive, sha256_hex,
};
use rstest::{fixture, rstest};
use std::process::{Command, Output};
use tempfile::TempDir;

struct Workspace {
    _temp: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    /// Write `archive` and a manifest expecting `sha256`; return the
    /// manifest path.
    fn manifest(&self, archive: &[u8], sha256: &str) -> Utf8PathBuf {
        let archive_path = self.root.join("milyai-macos-universal.tar.gz");
        std::fs::write(&archive_path, archive).expect("write archive");
        let manifest_path = self.root.join("milyai.toml");
        std::fs::write(
            &manifest_path,
            manifest_toml(&file_url(&archive_path), sha256),
        )
        .expect("write manifest");
        manifest_path
    }

    fn bin_dir(&self) -> Utf8PathBuf {
        self.root.join("bin")
    }

    fn install(&self, manifest: &Utf8PathBuf, extra: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_milyai-installer"))
            .args(["install", "--manifest", manifest.as_str()])
            .args(["--bin-dir", self.bin_dir().as_str()])
            .args(["--state-dir", self.root.join("locks").as_str()])
            .args(extra)
            .output()
            .expect("run milyai-installer")
    }
}

#[fixture]
fn workspace() -> Workspace {
    let temp = tempfile::tempdir().expect("temp dir");
    let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8 temp path");
    Workspace { _temp: temp, root }
}

fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn show_prints_builtin_formula() {
    let output = Command::new(env!("CARGO_BIN_EXE_milyai-installer"))
        .arg("show")
        .output()
        .expect("run milyai-installer");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("milyai 0.1.0"), "got {stdout}");
    assert!(stdout.contains("milyai-macos-universal.tar.gz"));
}

#[test]
fn dry_run_prints_plan_without_side_effects() {
    let output = Command::new(env!("CARGO_BIN_EXE_milyai-installer"))
        .args(["install", "--dry-run", "--bin-dir", "/nonexistent/bin"])
        .output()
        .expect("run milyai-installer");
    assert!(output.status.success(), "stderr: {}", stderr_text(&output));
    let stderr = stderr_text(&output);
    assert!(stderr.contains("Dry run - no files will be modified"));
    assert!(stderr.contains("milyai -> /nonexistent/bin/milyai"));
    assert!(!Utf8PathBuf::from("/nonexistent/bin").exists());
}

#[test]
fn unknown_flag_is_a_usage_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_milyai-installer"))
        .args(["install", "--no-such-flag"])
        .output()
        .expect("run milyai-installer");
    assert_eq!(output.status.code(), Some(2));
}

#[rstest]
fn invalid_manifest_exits_with_one(workspace: Workspace) {
    let manifest = workspace.root.join("broken.toml");
    std::fs::write(&manifest, "name = \"milyai\"\n").expect("write manifest");
    let output = workspace.install(&manifest, &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_text(&output).starts_with("error: "));
}

#[cfg(unix)]
#[rstest]
fn install_succeeds_and_runs_smoke_test(workspace: Workspace) {
    let archive = milyai_archive(ArchiveFormat::TarGz).expect("build archive");
    let manifest = workspace.manifest(&archive, &sha256_hex(&archive));

    let output = workspace.install(&manifest, &[]);

    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr_text(&output));
    assert!(stderr_text(&output).contains("Successfully installed milyai 0.1.0 (1 file)"));
    let installed = Command::new(workspace.bin_dir().join("milyai").as_std_path())
        .arg("--help")
        .output()
        .expect("run installed binary");
    assert!(String::from_utf8_lossy(&installed.stdout).contains("MilyAI"));
}

#[cfg(unix)]
#[rstest]
fn tampered_archive_exits_with_checksum_code(workspace: Workspace) {
    let archive = milyai_archive(ArchiveFormat::TarGz).expect("build archive");
    let manifest = workspace.manifest(&archive, &sha256_hex(b"tampered"));

    let output = workspace.install(&manifest, &[]);

    assert_eq!(output.status.code(), Some(5));
    assert!(
        stderr_text(&output).contains("error: milyai 0.1.0 failed at verify"),
        "stderr: {}",
        stderr_text(&output)
    );
    assert!(!workspace.bin_dir().join("milyai").exists());
}

#[cfg(unix)]
#[rstest]
fn archive_without_entry_exits_with_extraction_code(workspace: Workspace) {
    let archive = build_archive(
        ArchiveFormat::TarGz,
        &[ArchiveEntry::file("README.md", b"MilyAI", 0o644)],
    )
    .expect("build archive");
    let manifest = workspace.manifest(&archive, &sha256_hex(&archive));

    let output = workspace.install(&manifest, &[]);

    assert_eq!(output.status.code(), Some(6));
    assert!(!workspace.bin_dir().join("milyai").exists());
}

#[cfg(unix)]
#[rstest]
fn quiet_install_prints_nothing(workspace: Workspace) {
    let archive = milyai_archive(ArchiveFormat::TarGz).expect("build archive");
    let manifest = workspace.manifest(&archive, &sha256_hex(&archive));

    let output = workspace.install(&manifest, &["--quiet", "--skip-smoke-test"]);

    assert!(output.status.success());
    assert!(output.stderr.is_empty(), "stderr: {}", stderr_text(&output));
}
