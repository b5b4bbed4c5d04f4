//! Shared test utilities for the installer crate.
//!
//! Builds release archives in every supported format and manifests that
//! point at them, so unit and behaviour tests can exercise the real
//! pipeline against `file://` URLs.

use crate::extraction::ArchiveFormat;
use camino::Utf8Path;
use std::io::{Cursor, Write};
use std::process::{ExitStatus, Output};

/// Script standing in for the MilyAI binary; prints a banner for `--help`.
pub const FAKE_MILYAI_SCRIPT: &[u8] = b"#!/bin/sh\n\
if [ \"$1\" = \"--help\" ]; then\n\
  echo 'MilyAI 0.1.0 - modular AI assistant'\n\
  echo 'Usage: milyai [OPTIONS] <COMMAND>'\n\
  exit 0\n\
fi\n\
echo 'milyai: unknown command' >&2\n\
exit 2\n";

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code.cast_unsigned())
}

/// Creates a command `Output` with the given exit code and streams.
#[must_use]
pub fn output_with(code: i32, stdout: &str, stderr: &str) -> Output {
    Output {
        status: exit_status(code),
        stdout: stdout.as_bytes().to_vec(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Directory,
}

/// One entry of a test archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    path: String,
    contents: Vec<u8>,
    mode: u32,
    kind: EntryKind,
}

impl ArchiveEntry {
    /// A regular file with permission bits `mode`.
    #[must_use]
    pub fn file(path: &str, contents: &[u8], mode: u32) -> Self {
        Self {
            path: path.to_owned(),
            contents: contents.to_vec(),
            mode,
            kind: EntryKind::File,
        }
    }

    /// A directory entry.
    #[must_use]
    pub fn directory(path: &str) -> Self {
        Self {
            path: path.to_owned(),
            contents: Vec::new(),
            mode: 0o755,
            kind: EntryKind::Directory,
        }
    }
}

/// Build an in-memory archive of `format` holding `entries`.
///
/// # Errors
///
/// Returns any I/O or encoder error.
pub fn build_archive(format: ArchiveFormat, entries: &[ArchiveEntry]) -> std::io::Result<Vec<u8>> {
    match format {
        ArchiveFormat::Tar => build_tar(entries),
        ArchiveFormat::TarGz => {
            let mut encoder =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(&build_tar(entries)?)?;
            encoder.finish()
        }
        ArchiveFormat::TarZst => zstd::encode_all(build_tar(entries)?.as_slice(), 0),
        ArchiveFormat::Zip => build_zip(entries),
    }
}

fn build_tar(entries: &[ArchiveEntry]) -> std::io::Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    for entry in entries {
        let mut header = tar::Header::new_gnu();
        header.set_mode(entry.mode);
        match entry.kind {
            EntryKind::File => header.set_entry_type(tar::EntryType::Regular),
            EntryKind::Directory => header.set_entry_type(tar::EntryType::Directory),
        }
        header.set_size(entry.contents.len() as u64);
        builder.append_data(&mut header, &entry.path, entry.contents.as_slice())?;
    }
    builder.into_inner()
}

fn build_zip(entries: &[ArchiveEntry]) -> std::io::Result<Vec<u8>> {
    use zip::write::SimpleFileOptions;

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for entry in entries {
        let options = SimpleFileOptions::default().unix_permissions(entry.mode);
        match entry.kind {
            EntryKind::File => {
                writer
                    .start_file(entry.path.as_str(), options)
                    .map_err(std::io::Error::other)?;
                writer.write_all(&entry.contents)?;
            }
            EntryKind::Directory => {
                writer
                    .add_directory(entry.path.as_str(), options)
                    .map_err(std::io::Error::other)?;
            }
        }
    }
    let cursor = writer.finish().map_err(std::io::Error::other)?;
    Ok(cursor.into_inner())
}

/// Build an archive holding the fake `milyai` script at the archive root.
///
/// # Errors
///
/// Returns any I/O or encoder error.
pub fn milyai_archive(format: ArchiveFormat) -> std::io::Result<Vec<u8>> {
    build_archive(
        format,
        &[
            ArchiveEntry::file("milyai", FAKE_MILYAI_SCRIPT, 0o755),
            ArchiveEntry::file("LICENSE", b"MIT", 0o644),
        ],
    )
}

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    crate::manifest::sha256_digest::Sha256Digest::of(bytes)
        .as_str()
        .to_owned()
}

/// `file://` URL for an absolute local path, percent-encoded as needed.
#[must_use]
pub fn file_url(path: &Utf8Path) -> String {
    url::Url::from_file_path(path).map_or_else(|()| format!("file://{path}"), String::from)
}

/// MilyAI manifest TOML pointing at `url` with checksum `sha256`.
#[must_use]
pub fn manifest_toml(url: &str, sha256: &str) -> String {
    format!(
        concat!(
            "name = \"milyai\"\n",
            "desc = \"Modular AI assistant CLI\"\n",
            "homepage = \"https://example.com/milyai\"\n",
            "version = \"0.1.0\"\n",
            "url = \"{url}\"\n",
            "sha256 = \"{sha256}\"\n",
            "\n",
            "[[install]]\n",
            "source = \"milyai\"\n",
            "\n",
            "[test]\n",
            "command = \"milyai --help\"\n",
            "expect = \"MilyAI\"\n",
        ),
        url = url,
        sha256 = sha256,
    )
}
