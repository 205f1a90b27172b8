//! Recovers the ledger text that a commit added.

use tracing::info;

use crate::vcs::{CommitReader, VcsError};

/// What a commit's patch added to the ledger.
#[derive(Debug, Eq, PartialEq)]
pub enum Extraction {
    /// Added text that should hold a transaction.
    Transaction(String),
    /// The commit only added an `include` of another ledger file.
    Include(String),
    /// The patch added no lines.
    Empty,
}

/// Joins the lines added by `patch`, in order and with their `+` markers
/// removed. File header lines (`+++ b/...`) are skipped.
pub fn added_lines(patch: &str) -> String {
    let mut text = String::new();
    for line in patch.lines() {
        if line.starts_with("++") {
            continue;
        }
        if let Some(added) = line.strip_prefix('+') {
            text.push_str(added);
            text.push('\n');
        }
    }
    text
}

pub fn classify_added(text: String) -> Extraction {
    if text.is_empty() {
        Extraction::Empty
    } else if text.starts_with("include ") {
        Extraction::Include(text)
    } else {
        Extraction::Transaction(text)
    }
}

/// Extracts the text added by `commit` (or the latest commit).
pub fn extract(repo: &dyn CommitReader, commit: Option<&str>) -> Result<Extraction, VcsError> {
    let extraction = classify_added(added_lines(&repo.patch(commit)?));
    match &extraction {
        Extraction::Include(text) => info!(
            "Not a transaction but a new ledger file include:\n{}",
            text
        ),
        Extraction::Empty => info!("Commit adds no lines"),
        Extraction::Transaction(_) => {}
    }
    Ok(extraction)
}
