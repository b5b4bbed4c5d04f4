//! Post-install smoke test declaration.
//!
//! The command template is split with shell quoting rules when the manifest
//! loads, then `{bin}` is expanded per word at run time. No shell is ever
//! involved, so a bin directory containing spaces cannot break the command.

use super::error::{ManifestError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

/// Placeholder expanded to the bin directory.
pub const BIN_PLACEHOLDER: &str = "{bin}";

/// A `(command template, expected substring)` pair.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use milyai_installer::manifest::smoke_test_spec::SmokeTestSpec;
///
/// let spec = SmokeTestSpec::new("milyai --help", "MilyAI").unwrap();
/// let command = spec.resolve(Utf8Path::new("/opt/bin"));
/// assert_eq!(command.program, Utf8Path::new("/opt/bin/milyai"));
/// assert_eq!(command.args, vec!["--help".to_owned()]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "RawSmokeTest")]
pub struct SmokeTestSpec {
    template: String,
    words: Vec<String>,
    expect: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSmokeTest {
    command: String,
    expect: String,
}

/// A smoke test command ready to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    /// Program to run.
    pub program: Utf8PathBuf,
    /// Arguments passed to the program.
    pub args: Vec<String>,
}

impl ResolvedCommand {
    /// Render the command for messages, quoting words that need it.
    #[must_use]
    pub fn display(&self) -> String {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.as_str());
        words.extend(self.args.iter().map(String::as_str));
        shell_words::join(words)
    }
}

impl SmokeTestSpec {
    /// Build a validated smoke test.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::InvalidSmokeTest`] when the command cannot be
    /// split, is empty, or the expected substring is empty.
    pub fn new(command: &str, expect: &str) -> Result<Self> {
        let words = shell_words::split(command).map_err(|e| ManifestError::InvalidSmokeTest {
            reason: format!("cannot split command \"{command}\": {e}"),
        })?;
        if words.is_empty() {
            return Err(ManifestError::InvalidSmokeTest {
                reason: "command must not be empty".to_owned(),
            });
        }
        if expect.is_empty() {
            return Err(ManifestError::InvalidSmokeTest {
                reason: "expected output must not be empty".to_owned(),
            });
        }
        Ok(Self {
            template: command.to_owned(),
            words,
            expect: expect.to_owned(),
        })
    }

    /// Return the command template as written in the manifest.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Return the substring the command's stdout must contain.
    #[must_use]
    pub fn expect(&self) -> &str {
        &self.expect
    }

    /// Expand `{bin}` and resolve a bare program name inside `bin_dir`.
    #[must_use]
    pub fn resolve(&self, bin_dir: &Utf8Path) -> ResolvedCommand {
        let mut expanded = self
            .words
            .iter()
            .map(|word| word.replace(BIN_PLACEHOLDER, bin_dir.as_str()));

        // `new` guarantees at least one word.
        let first = expanded.next().unwrap_or_default();
        let program = if first.contains('/') || first.contains(std::path::MAIN_SEPARATOR) {
            Utf8PathBuf::from(first)
        } else {
            bin_dir.join(first)
        };

        ResolvedCommand {
            program,
            args: expanded.collect(),
        }
    }
}

impl TryFrom<RawSmokeTest> for SmokeTestSpec {
    type Error = ManifestError;

    fn try_from(raw: RawSmokeTest) -> Result<Self> {
        Self::new(&raw.command, &raw.expect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn bin_placeholder_expands_per_word() {
        let spec = SmokeTestSpec::new("{bin}/milyai --config '{bin}/x y.toml'", "MilyAI")
            .expect("valid spec");
        let command = spec.resolve(Utf8Path::new("/home/a b/bin"));
        assert_eq!(command.program, Utf8Path::new("/home/a b/bin/milyai"));
        assert_eq!(command.args, vec!["--config", "/home/a b/bin/x y.toml"]);
    }

    #[test]
    fn absolute_program_is_kept() {
        let spec = SmokeTestSpec::new("/usr/bin/env milyai --help", "MilyAI").expect("valid spec");
        let command = spec.resolve(Utf8Path::new("/opt/bin"));
        assert_eq!(command.program, Utf8Path::new("/usr/bin/env"));
        assert_eq!(command.args, vec!["milyai", "--help"]);
    }

    #[test]
    fn display_quotes_words_with_spaces() {
        let spec = SmokeTestSpec::new("milyai --help", "MilyAI").expect("valid spec");
        let command = spec.resolve(Utf8Path::new("/a b"));
        assert_eq!(command.display(), "'/a b/milyai' --help");
    }

    #[rstest]
    #[case::empty_command("", "MilyAI")]
    #[case::blank_command("   ", "MilyAI")]
    #[case::unbalanced_quote("milyai 'oops", "MilyAI")]
    #[case::empty_expectation("milyai --help", "")]
    fn rejects_invalid_specs(#[case] command: &str, #[case] expect: &str) {
        let err = SmokeTestSpec::new(command, expect).expect_err("expected rejection");
        assert!(matches!(err, ManifestError::InvalidSmokeTest { .. }));
    }
}
