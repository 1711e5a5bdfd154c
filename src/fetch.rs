use std::ffi::OsString;
use std::path::Path;
use std::process::Command;
use std::process::Stdio;

use anyhow::Context;

/// Result of one run of the external downloader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Completed,
    Failed { code: Option<i32>, stderr: String },
}

/// Something that can download the album at `url` into `dir`.
///
/// `Err` is reserved for failures to run the downloader at all; a downloader that
/// ran and gave up reports [`FetchOutcome::Failed`].
pub trait Fetcher: Sync {
    fn fetch(&self, url: &str, dir: &Path) -> anyhow::Result<FetchOutcome>;
}

/// Runs an external command with the album URL as its last argument.
#[derive(Debug, Clone)]
pub struct CommandFetcher {
    program: OsString,
    args: Vec<OsString>,
}

impl CommandFetcher {
    pub fn new<S: Into<OsString>>(program: S) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Arguments placed before the URL, e.g. `-m spotdl` when `program` is `python`.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for CommandFetcher {
    fn default() -> Self {
        Self::new("spotdl")
    }
}

impl Fetcher for CommandFetcher {
    fn fetch(&self, url: &str, dir: &Path) -> anyhow::Result<FetchOutcome> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(url)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("Failed to run {}", self.program.to_string_lossy()))?;

        if output.status.success() {
            Ok(FetchOutcome::Completed)
        } else {
            Ok(FetchOutcome::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            })
        }
    }
}

#[cfg(all(test, unix))]
mod test {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn runs_in_target_dir_with_url() {
        let dir = tempdir().unwrap();
        let fetcher =
            CommandFetcher::new("sh").args(["-c", r#"printf '%s' "$1" > url.txt"#, "sh"]);

        let outcome = fetcher
            .fetch("https://open.spotify.com/album/x", dir.path())
            .unwrap();

        assert_eq!(outcome, FetchOutcome::Completed);
        assert_eq!(
            fs::read_to_string(dir.path().join("url.txt")).unwrap(),
            "https://open.spotify.com/album/x"
        );
    }

    #[test]
    fn nonzero_exit_is_failure_with_stderr() {
        let dir = tempdir().unwrap();
        let fetcher =
            CommandFetcher::new("sh").args(["-c", "echo 'no such album' >&2; exit 3", "sh"]);

        let outcome = fetcher.fetch("url", dir.path()).unwrap();

        assert_eq!(
            outcome,
            FetchOutcome::Failed {
                code: Some(3),
                stderr: "no such album".to_string()
            }
        );
    }

    #[test]
    fn missing_program_is_an_error() {
        let dir = tempdir().unwrap();
        let fetcher = CommandFetcher::new("definitely-not-an-installed-downloader");
        assert!(fetcher.fetch("url", dir.path()).is_err());
    }
}
