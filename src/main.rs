use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[cfg(test)]
mod testutil;

mod beancount;
mod extract;
mod inspector;
mod mattermost;
mod members;
mod narration;
mod pipeline;
mod vcs;

use pipeline::{Outcome, Pipeline, PipelineError};

#[derive(Parser)]
/// Tells bar members on Mattermost about new transactions committed to the
/// bar ledger. Intended to run after each commit.
struct Command {
    /// Base URL of the Mattermost server.
    #[arg(env = "BARBOT_MM_URL")]
    server_url: String,
    /// Bearer token of the bot account that sends the messages.
    #[arg(env = "BARBOT_MM_TOKEN", hide_env_values = true)]
    token: String,
    /// Commit to inspect. Defaults to the latest commit.
    commit: Option<String>,
    /// The members directory ledger file.
    #[arg(
        long = "members",
        env = "BARBOT_MEMBERS",
        default_value = "static/members.beancount"
    )]
    members: PathBuf,
    /// Repository containing the commit.
    #[arg(long = "repo", default_value = ".")]
    repo: PathBuf,
    /// Parent account of the member accounts in the members directory.
    #[arg(long = "members-root", default_value = members::DEFAULT_MEMBERS_ROOT)]
    members_root: String,
    /// Log filter, e.g. "debug" or "barbot=debug".
    #[arg(long = "log-level", env = "BARBOT_LOG", default_value = "info")]
    log_level: String,
}

impl Command {
    fn run(self) -> Result<Outcome, PipelineError> {
        let repo = vcs::GitCli::new(self.repo);
        let chat = mattermost::HttpTransport::new(&self.server_url, self.token);
        let config = pipeline::Config {
            commit: self.commit,
            members_file: self.members,
            members_root: self.members_root,
        };
        Pipeline::new(config, &repo, &chat).run()
    }
}

fn init_logging(filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(filter)
        .with_context(|| format!("invalid log filter {:?}", filter))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
    Ok(())
}

fn main() -> ExitCode {
    let cmd = Command::parse();
    if let Err(err) = init_logging(&cmd.log_level) {
        eprintln!("{:#}", err);
        return ExitCode::FAILURE;
    }
    info!("Starting barbot {}", env!("CARGO_PKG_VERSION"));

    match cmd.run() {
        Ok(Outcome::Delivered { member, chat_user }) => {
            info!("Notified {} as {}. Done.", member, chat_user);
            ExitCode::SUCCESS
        }
        Ok(Outcome::NotApplicable(skip)) => {
            info!("Nothing to notify: {}. Stopping here.", skip);
            ExitCode::SUCCESS
        }
        Err(err) => {
            if let PipelineError::InvalidTransaction(narration::ResolveError::NoTransaction {
                errors,
            }) = &err
            {
                for parse_err in errors {
                    error!("Transaction text parse error at {}", parse_err);
                }
            }
            error!("{}", err);
            ExitCode::from(err.exit_code())
        }
    }
}
