//! Decides whether a commit was made by the automatic ledger update.

use tracing::info;

use crate::vcs::{CommitReader, VcsError};

/// Subject line of commits that the tab application writes for each new
/// transaction.
pub const AUTOMATIC_COMMIT_SUBJECT: &str = "Automatic commit by backtab";

#[derive(Debug, Eq, PartialEq)]
pub enum CommitClassification {
    Eligible,
    NotEligible { subject: String },
}

/// Classifies `commit` (or the latest commit) by its subject line.
///
/// A failure to read the commit is an error, never `NotEligible`.
pub fn classify(
    repo: &dyn CommitReader,
    commit: Option<&str>,
) -> Result<CommitClassification, VcsError> {
    let subject = repo.subject(commit)?;
    if subject == AUTOMATIC_COMMIT_SUBJECT {
        Ok(CommitClassification::Eligible)
    } else {
        info!(
            "Commit subject {:?} does not match {:?}, assuming not a transaction",
            subject, AUTOMATIC_COMMIT_SUBJECT
        );
        Ok(CommitClassification::NotEligible { subject })
    }
}
