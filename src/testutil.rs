use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

use crate::beancount::Entry;
use crate::mattermost::{ChatTransport, Response, TransportError};
use crate::vcs::{CommitReader, VcsError};

/// `textwrap::dedent`, without the leading newline of a raw string literal
/// that starts on the line after its opening quote.
pub fn dedent(s: &str) -> String {
    textwrap::dedent(s).trim_start_matches('\n').to_string()
}

pub fn format_entries(entries: &[Entry]) -> String {
    entries.iter().map(|e| e.to_string()).collect()
}

#[macro_export]
macro_rules! assert_entries_eq {
    ($want:expr, $got:expr, $($context_arg:expr),*) => {
        let want_str = crate::testutil::format_entries(&$want);
        let got_str = crate::testutil::format_entries(&$got);
        if want_str != got_str {
            eprintln!($($context_arg,)*);
            text_diff::assert_diff(&want_str, &got_str, "\n", 0);
        }
    };
    ($want:expr, $got:expr) => {
        let want_str = crate::testutil::format_entries(&$want);
        let got_str = crate::testutil::format_entries(&$got);
        if want_str != got_str {
            text_diff::assert_diff(&want_str, &got_str, "\n", 0);
        }
    };
}

struct FakeCommit {
    subject: String,
    patch: String,
}

/// In-memory `CommitReader`. Commits are keyed by reference, with `None`
/// standing for the latest commit.
#[derive(Default)]
pub struct FakeRepo {
    commits: HashMap<Option<String>, FakeCommit>,
    failing: bool,
    patch_reads: Cell<usize>,
}

impl FakeRepo {
    pub fn new() -> Self {
        Default::default()
    }

    /// A repository where every read fails, as outside of a git checkout.
    pub fn failing() -> Self {
        FakeRepo {
            failing: true,
            ..Default::default()
        }
    }

    pub fn with_commit(mut self, commit: Option<&str>, subject: &str, patch: &str) -> Self {
        self.commits.insert(
            commit.map(str::to_string),
            FakeCommit {
                subject: subject.to_string(),
                patch: patch.to_string(),
            },
        );
        self
    }

    /// Number of times a patch was read.
    pub fn patch_reads(&self) -> usize {
        self.patch_reads.get()
    }

    fn commit(&self, commit: Option<&str>) -> Result<&FakeCommit, VcsError> {
        let found = if self.failing {
            None
        } else {
            self.commits.get(&commit.map(str::to_string))
        };
        found.ok_or_else(|| VcsError::Spawn {
            args: vec!["log".to_string(), commit.unwrap_or("HEAD").to_string()],
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "unknown commit"),
        })
    }
}

impl CommitReader for FakeRepo {
    fn subject(&self, commit: Option<&str>) -> Result<String, VcsError> {
        Ok(self.commit(commit)?.subject.clone())
    }

    fn patch(&self, commit: Option<&str>) -> Result<String, VcsError> {
        self.patch_reads.set(self.patch_reads.get() + 1);
        Ok(self.commit(commit)?.patch.clone())
    }
}

/// A request received by `FakeChat`.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    pub method: &'static str,
    pub path: String,
    pub body: Option<serde_json::Value>,
}

impl Request {
    pub fn get(path: &str) -> Self {
        Request {
            method: "GET",
            path: path.to_string(),
            body: None,
        }
    }

    pub fn post(path: &str, body: serde_json::Value) -> Self {
        Request {
            method: "POST",
            path: path.to_string(),
            body: Some(body),
        }
    }
}

/// `ChatTransport` that answers requests with scripted responses, in order,
/// and records what it was sent. Requests beyond the script fail.
#[derive(Default)]
pub struct FakeChat {
    responses: RefCell<VecDeque<Result<Response, TransportError>>>,
    requests: RefCell<Vec<Request>>,
}

impl FakeChat {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn respond(self, status: u16, body: &str) -> Self {
        self.responses.borrow_mut().push_back(Ok(Response {
            status,
            body: body.to_string(),
        }));
        self
    }

    pub fn fail(self, reason: &str) -> Self {
        self.responses
            .borrow_mut()
            .push_back(Err(TransportError(reason.to_string())));
        self
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.borrow().clone()
    }

    fn handle(&self, req: Request) -> Result<Response, TransportError> {
        let path = req.path.clone();
        self.requests.borrow_mut().push(req);
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError(format!("unscripted request to {}", path))))
    }
}

impl ChatTransport for FakeChat {
    fn server_url(&self) -> &str {
        "https://chat.example.org"
    }

    fn get(&self, path: &str) -> Result<Response, TransportError> {
        self.handle(Request::get(path))
    }

    fn post(&self, path: &str, body: &serde_json::Value) -> Result<Response, TransportError> {
        self.handle(Request::post(path, body.clone()))
    }
}
