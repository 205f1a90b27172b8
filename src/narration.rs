//! Finds the member a transaction was booked for.

use tracing::warn;

use crate::beancount::{self, ParseError};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no transaction entry found ({} parse error(s))", .errors.len())]
    NoTransaction { errors: Vec<ParseError> },
    #[error("transaction on line {line} has an empty narration")]
    EmptyNarration { line: usize },
}

/// Returns the member name of the transaction in `text`: the first
/// whitespace separated word of the first transaction's narration.
pub fn resolve_member(text: &str) -> Result<String, ResolveError> {
    let (entries, errors) = beancount::parse(text);
    let found = entries
        .iter()
        .find_map(|entry| entry.as_transaction().map(|trn| (entry.line, trn)));
    let (line, trn) = match found {
        Some(found) => found,
        None => return Err(ResolveError::NoTransaction { errors }),
    };
    for err in &errors {
        warn!("Ignoring transaction text parse error at {}", err);
    }
    trn.narration
        .split_whitespace()
        .next()
        .map(str::to_string)
        .ok_or(ResolveError::EmptyNarration { line })
}
