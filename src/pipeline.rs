//! Runs the steps from a new commit to a delivered notification.

use std::fmt;
use std::path::PathBuf;

use tracing::info;

use crate::extract::{self, Extraction};
use crate::inspector::{self, CommitClassification};
use crate::mattermost::{ChatTransport, DispatchError, Dispatcher};
use crate::members::MemberDirectory;
use crate::narration::{self, ResolveError};
use crate::vcs::{CommitReader, VcsError};

#[derive(Clone, Debug)]
pub struct Config {
    /// Commit to inspect; the latest commit if `None`.
    pub commit: Option<String>,
    pub members_file: PathBuf,
    pub members_root: String,
}

#[derive(Debug, Eq, PartialEq)]
pub enum Outcome {
    Delivered { member: String, chat_user: String },
    NotApplicable(Skip),
}

/// Reasons for ending a run early without it being a failure.
#[derive(Debug, Eq, PartialEq)]
pub enum Skip {
    NotAutomaticCommit { subject: String },
    NoAddedLines,
    IncludeDirective,
    NoChatUser { member: String },
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        use Skip::*;
        match self {
            NotAutomaticCommit { subject } => {
                write!(f, "commit {:?} is not an automatic transaction commit", subject)
            }
            NoAddedLines => f.write_str("commit adds no ledger lines"),
            IncludeDirective => f.write_str("commit adds an include, not a transaction"),
            NoChatUser { member } => write!(f, "no chat user configured for member {}", member),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("reading commit: {0}")]
    Vcs(#[from] VcsError),
    #[error("commit is marked as a transaction but its added text is not one: {0}")]
    InvalidTransaction(#[from] ResolveError),
    #[error("{0:#}")]
    Directory(anyhow::Error),
    #[error("configuration inconsistency: {0}. Typo in the members directory?")]
    ConfigurationInconsistency(DispatchError),
    #[error("sending notification: {0}")]
    Dispatch(DispatchError),
}

impl From<DispatchError> for PipelineError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::UserNotFound { .. } => PipelineError::ConfigurationInconsistency(err),
            err => PipelineError::Dispatch(err),
        }
    }
}

impl PipelineError {
    /// Process exit status for the failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::ConfigurationInconsistency(_) => 2,
            _ => 1,
        }
    }
}

pub fn format_message(member: &str, transaction: &str) -> String {
    format!("Bar transaction found for user {}:\n{}", member, transaction)
}

pub struct Pipeline<'a> {
    config: Config,
    repo: &'a dyn CommitReader,
    chat: &'a dyn ChatTransport,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: Config, repo: &'a dyn CommitReader, chat: &'a dyn ChatTransport) -> Self {
        Pipeline { config, repo, chat }
    }

    /// Notifies the member the configured commit's transaction belongs to.
    ///
    /// Stops with `Outcome::NotApplicable` before any chat request is made if
    /// there is nobody to notify.
    pub fn run(&self) -> Result<Outcome, PipelineError> {
        let commit = self.config.commit.as_deref();

        if let CommitClassification::NotEligible { subject } =
            inspector::classify(self.repo, commit)?
        {
            return Ok(Outcome::NotApplicable(Skip::NotAutomaticCommit { subject }));
        }

        let transaction = match extract::extract(self.repo, commit)? {
            Extraction::Transaction(text) => text,
            Extraction::Include(_) => return Ok(Outcome::NotApplicable(Skip::IncludeDirective)),
            Extraction::Empty => return Ok(Outcome::NotApplicable(Skip::NoAddedLines)),
        };
        info!("Transaction from commit:\n{}", transaction);

        let member = narration::resolve_member(&transaction)?;
        info!("Member name from transaction: {}", member);

        let directory =
            MemberDirectory::load(&self.config.members_file, &self.config.members_root)
                .map_err(PipelineError::Directory)?;
        let chat_user = match directory.resolve_chat_user(&member) {
            Some(chat_user) => chat_user.to_string(),
            None => return Ok(Outcome::NotApplicable(Skip::NoChatUser { member })),
        };

        Dispatcher::new(self.chat).send(&chat_user, &format_message(&member, &transaction))?;
        Ok(Outcome::Delivered { member, chat_user })
    }
}
