//! Read-only access to commits in the ledger repository.

use std::path::PathBuf;
use std::process::{Command, ExitStatus};

#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    #[error("running git {args:?}: {source}")]
    Spawn {
        args: Vec<String>,
        source: std::io::Error,
    },
    #[error("git {args:?} failed ({status}): {stderr}")]
    Failed {
        args: Vec<String>,
        status: ExitStatus,
        stderr: String,
    },
    #[error("git {args:?} produced output that is not UTF-8")]
    Encoding { args: Vec<String> },
}

/// Source of commit information. `commit` selects a commit by any reference
/// git understands, or the most recent commit if `None`.
pub trait CommitReader {
    /// Returns the single-line subject of the commit.
    fn subject(&self, commit: Option<&str>) -> Result<String, VcsError>;

    /// Returns the commit as `git log -p` shows it, including its patch.
    fn patch(&self, commit: Option<&str>) -> Result<String, VcsError>;
}

/// Reads commits by running the `git` command line tool.
#[derive(Debug)]
pub struct GitCli {
    repo: PathBuf,
}

impl GitCli {
    pub fn new<P: Into<PathBuf>>(repo: P) -> Self {
        GitCli { repo: repo.into() }
    }

    fn log(&self, format_args: &[&str], commit: Option<&str>) -> Result<String, VcsError> {
        let mut args: Vec<String> = vec!["log".into(), "-1".into(), "--no-color".into()];
        args.extend(format_args.iter().map(|a| a.to_string()));
        if let Some(commit) = commit {
            args.push(commit.to_string());
            args.push("--".into());
        }

        let output = Command::new("git")
            .arg("-C")
            .arg(&self.repo)
            .args(&args)
            .output()
            .map_err(|source| VcsError::Spawn {
                args: args.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(VcsError::Failed {
                args,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        String::from_utf8(output.stdout).map_err(|_| VcsError::Encoding { args })
    }
}

impl CommitReader for GitCli {
    fn subject(&self, commit: Option<&str>) -> Result<String, VcsError> {
        let out = self.log(&["--format=%s"], commit)?;
        Ok(out.trim_end().to_string())
    }

    fn patch(&self, commit: Option<&str>) -> Result<String, VcsError> {
        self.log(&["-p"], commit)
    }
}

#[cfg(test)]
mod tests {
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::path::Path;

    use super::*;

    use crate::extract::added_lines;
    use crate::inspector::AUTOMATIC_COMMIT_SUBJECT;

    /// Runs git in `dir` with a fixed identity and returns its output.
    fn git(dir: &Path, args: &[&str]) -> String {
        let output = Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(["-c", "user.name=Bar Tab", "-c", "user.email=tab@bar.example"])
            .args(["-c", "commit.gpgsign=false"])
            .args(args)
            .output()
            .expect("run git");
        assert!(
            output.status.success(),
            "git {:?}: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).expect("git output is UTF-8")
    }

    fn append(path: &Path, text: &str) {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .expect("open ledger");
        file.write_all(text.as_bytes()).expect("write ledger");
    }

    #[test]
    fn reads_commits_from_repository() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let ledger = dir.path().join("bar.beancount");
        git(dir.path(), &["init", "-q"]);

        append(&ledger, "2024-01-01 open Liabilities:Bar:Members:alice EUR\n");
        git(dir.path(), &["add", "bar.beancount"]);
        git(dir.path(), &["commit", "-q", "-m", "Open member accounts"]);
        let first = git(dir.path(), &["rev-parse", "HEAD"]).trim().to_string();

        let transaction = concat!(
            "2024-01-02 * \"alice 5.00 beer\"\n",
            "  Liabilities:Bar:Members:alice  5.00 EUR\n",
            "  Income:Bar:Drinks  -5.00 EUR\n",
        );
        append(&ledger, transaction);
        git(dir.path(), &["add", "bar.beancount"]);
        git(
            dir.path(),
            &["commit", "-q", "-m", AUTOMATIC_COMMIT_SUBJECT, "-m", "Booked at the bar."],
        );

        let repo = GitCli::new(dir.path());
        assert_eq!(
            repo.subject(None).expect("latest subject"),
            AUTOMATIC_COMMIT_SUBJECT
        );
        assert_eq!(
            repo.subject(Some(&first)).expect("first subject"),
            "Open member accounts"
        );
        assert_eq!(
            added_lines(&repo.patch(None).expect("latest patch")),
            transaction
        );
        assert_eq!(
            added_lines(&repo.patch(Some(&first)).expect("first patch")),
            "2024-01-01 open Liabilities:Bar:Members:alice EUR\n"
        );
    }

    #[test]
    fn outside_repository_is_an_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let git = GitCli::new(dir.path());
        assert!(git.subject(None).is_err());
        assert!(git.patch(Some("HEAD")).is_err());
    }
}
