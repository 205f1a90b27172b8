//! The members directory: a ledger file that declares one account per bar
//! member, with metadata linking the member to their chat account.
//!
//! ```text
//! 2020-01-01 open Liabilities:Bar:Members:alice EUR
//!   display_name: "Alice"
//!   mm_name: "alice.w"
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::beancount::{self, Entry, EntryKind};

/// Parent account of the member accounts.
pub const DEFAULT_MEMBERS_ROOT: &str = "Liabilities:Bar:Members";

const DISPLAY_NAME_KEY: &str = "display_name";
const CHAT_USERNAME_KEY: &str = "mm_name";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MemberRecord {
    pub kind: EntryKind,
    pub account: Option<String>,
    pub display_name: Option<String>,
    pub chat_username: Option<String>,
}

impl MemberRecord {
    fn from_entry(entry: &Entry) -> Self {
        MemberRecord {
            kind: entry.kind(),
            account: entry.account().map(str::to_string),
            display_name: entry.meta.get_str(DISPLAY_NAME_KEY).map(str::to_string),
            chat_username: entry.meta.get_str(CHAT_USERNAME_KEY).map(str::to_string),
        }
    }

    /// True if the record opens the member's account under `members_root`, or
    /// if it carries the member's display name.
    fn matches(&self, member: &str, members_root: &str) -> bool {
        let opens_member_account = self.kind == EntryKind::Open
            && self
                .account
                .as_deref()
                .and_then(|account| account.strip_prefix(members_root))
                .and_then(|rest| rest.strip_prefix(':'))
                == Some(member);
        opens_member_account || self.display_name.as_deref() == Some(member)
    }
}

#[derive(Debug)]
pub struct MemberDirectory {
    records: Vec<MemberRecord>,
    members_root: String,
}

impl MemberDirectory {
    /// Reads and parses the directory file. Nothing is cached; every call
    /// sees the file as it currently is.
    pub fn load(path: &Path, members_root: &str) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading members directory {:?}", path))?;
        let directory = Self::parse(&text, members_root);
        debug!(
            "Loaded {} records from members directory {:?}",
            directory.records().len(),
            path
        );
        Ok(directory)
    }

    /// Parses a directory from its text. Malformed entries are logged and
    /// skipped.
    pub fn parse(text: &str, members_root: &str) -> Self {
        let (entries, errors) = beancount::parse(text);
        for err in &errors {
            warn!("Skipping malformed members directory entry at {}", err);
        }
        MemberDirectory {
            records: entries.iter().map(MemberRecord::from_entry).collect(),
            members_root: members_root.to_string(),
        }
    }

    /// Records in declaration order.
    pub fn records(&self) -> &[MemberRecord] {
        &self.records
    }

    /// Returns the chat username of the first record matching `member`.
    ///
    /// `None` if no record matches, or if the first match has no chat
    /// username. Later matches are never consulted.
    pub fn resolve_chat_user(&self, member: &str) -> Option<&str> {
        let found = self.records.iter().find(|record| {
            debug!(
                kind = %record.kind,
                account = ?record.account,
                display_name = ?record.display_name,
                "Checking member record"
            );
            record.matches(member, &self.members_root)
        });
        match found.and_then(|record| record.chat_username.as_deref()) {
            Some(chat_user) => {
                info!("Chat user for {} is {}", member, chat_user);
                Some(chat_user)
            }
            None => {
                info!(
                    "Chat user ({}) not found for {} in the members directory",
                    CHAT_USERNAME_KEY, member
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    use test_case::test_case;

    use crate::testutil::dedent;

    fn directory() -> MemberDirectory {
        MemberDirectory::parse(
            &dedent(
                r#"
                2020-01-01 open Liabilities:Bar:Members:alice EUR
                  display_name: "Alice"
                  mm_name: "alice.w"
                2020-01-01 open Liabilities:Bar:Members:bob EUR
                2020-01-01 open Liabilities:Bar:Members:carol EUR
                  display_name: "Caro"
                  mm_name: "carol"
                2020-01-01 open Liabilities:Bar:Members:Caro EUR
                  mm_name: "caro.other"
                2020-01-01 open Assets:Bar:Members:dave EUR
                  mm_name: "dave"
                2020-01-01 open Liabilities:Bar:Members:Team:erin EUR
                  mm_name: "erin"
                2020-06-01 close Liabilities:Bar:Members:frank
                  mm_name: "frank"
                2020-06-01 note Liabilities:Bar:Members:bob "nickname"
                  display_name: "Bobby"
                  mm_name: "bob.b"
                "#,
            ),
            DEFAULT_MEMBERS_ROOT,
        )
    }

    #[test_case("alice" => Some("alice.w".to_string()); "by_account")]
    #[test_case("Alice" => Some("alice.w".to_string()); "by_display_name")]
    #[test_case("bob" => None; "no_chat_user")]
    #[test_case("Bobby" => Some("bob.b".to_string()); "display_name_on_other_entry")]
    #[test_case("Caro" => Some("carol".to_string()); "first_declared_wins")]
    #[test_case("dave" => None; "outside_members_root")]
    #[test_case("erin" => None; "nested_account")]
    #[test_case("frank" => None; "close_is_not_a_declaration")]
    #[test_case("zoe" => None; "unknown_member")]
    #[test_case("Liabilities:Bar:Members:alice" => None; "full_account_name")]
    fn test_resolve_chat_user(member: &str) -> Option<String> {
        directory().resolve_chat_user(member).map(str::to_string)
    }

    #[test]
    fn custom_members_root() {
        let dir = MemberDirectory::parse(
            "2020-01-01 open Liabilities:Club:alice\n  mm_name: \"alice.c\"\n",
            "Liabilities:Club",
        );
        assert_eq!(dir.resolve_chat_user("alice"), Some("alice.c"));
    }

    #[test]
    fn keeps_declaration_order_and_skips_malformed_entries() {
        let dir = MemberDirectory::parse(
            &dedent(
                r#"
                2020-01-01 open Liabilities:Bar:Members:zed
                2020-01-01 bogus
                  mm_name: "nobody"
                option "title" "Members"
                2019-01-01 open Liabilities:Bar:Members:amy
                "#,
            ),
            DEFAULT_MEMBERS_ROOT,
        );
        let kinds: Vec<EntryKind> = dir.records().iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![EntryKind::Open, EntryKind::Option, EntryKind::Open]
        );
        assert_eq!(
            dir.records()[2].account.as_deref(),
            Some("Liabilities:Bar:Members:amy")
        );
    }

    #[test]
    fn load_reads_file_each_time() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        write!(
            file,
            "2020-01-01 open Liabilities:Bar:Members:alice\n  mm_name: \"alice.w\"\n"
        )
        .expect("write members");
        file.flush().expect("flush");

        let dir = MemberDirectory::load(file.path(), DEFAULT_MEMBERS_ROOT).expect("load");
        assert_eq!(dir.resolve_chat_user("alice"), Some("alice.w"));

        file.as_file_mut().set_len(0).expect("truncate");
        let dir = MemberDirectory::load(file.path(), DEFAULT_MEMBERS_ROOT).expect("load");
        assert_eq!(dir.resolve_chat_user("alice"), None);
    }

    #[test]
    fn load_missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let err = MemberDirectory::load(&dir.path().join("members.beancount"), DEFAULT_MEMBERS_ROOT)
            .expect_err("missing file");
        assert!(format!("{:#}", err).contains("reading members directory"));
    }
}
