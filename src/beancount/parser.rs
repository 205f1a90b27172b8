use std::str::FromStr;

use chrono::NaiveDate;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while, take_while1};
use nom::character::complete::{char, digit0, one_of, satisfy, space0, space1};
use nom::combinator::{eof, map, map_opt, map_res, opt, recognize, value, verify};
use nom::error::{Error as NomError, ErrorKind};
use nom::multi::{many0, separated_list1};
use nom::sequence::{delimited, pair, preceded, terminated, tuple};
use nom::IResult;
use rust_decimal::Decimal;

use super::{
    Amount, Cost, Directive, Entry, Flag, MetaValue, Metadata, Posting, Price, Transaction,
};

/// A block of text that could not be parsed into an entry.
#[derive(Debug, Eq, PartialEq, thiserror::Error)]
#[error("line {line}: {reason}")]
pub struct ParseError {
    /// 1-based line number.
    pub line: usize,
    pub reason: String,
}

impl ParseError {
    fn at<S: Into<String>>(line: usize, reason: S) -> Self {
        ParseError {
            line,
            reason: reason.into(),
        }
    }
}

/// Parses `text` into entries, in the order they are written.
///
/// Like the beancount loader, a malformed entry does not stop parsing: it is
/// reported in the returned errors and parsing resumes at the next unindented
/// line. A transaction with a malformed posting is still returned, without
/// that posting.
pub fn parse(text: &str) -> (Vec<Entry>, Vec<ParseError>) {
    let mut errors = Vec::new();
    let mut entries = Vec::new();
    for block in split_blocks(text, &mut errors) {
        match parse_block(&block, &mut errors) {
            Ok(entry) => entries.push(entry),
            Err(err) => errors.push(err),
        }
    }
    (entries, errors)
}

/// An unindented line and the indented lines that follow it.
struct Block<'a> {
    line: usize,
    header: &'a str,
    body: Vec<(usize, &'a str)>,
}

fn split_blocks<'a>(text: &'a str, errors: &mut Vec<ParseError>) -> Vec<Block<'a>> {
    let mut blocks = Vec::new();
    let mut current: Option<Block<'a>> = None;
    for (idx, line) in text.lines().enumerate() {
        let line_num = idx + 1;
        let trimmed = line.trim();
        let indented = line.starts_with(' ') || line.starts_with('\t');

        if trimmed.is_empty() {
            blocks.extend(current.take());
            continue;
        }

        if indented {
            match current.as_mut() {
                Some(block) => block.body.push((line_num, line)),
                None if trimmed.starts_with(';') => {}
                None => errors.push(ParseError::at(
                    line_num,
                    format!("indented line outside of an entry: {:?}", trimmed),
                )),
            }
            continue;
        }

        blocks.extend(current.take());
        // Comments and org-mode style section headings.
        if trimmed.starts_with(';') || trimmed.starts_with('*') || trimmed.starts_with('#') {
            continue;
        }
        current = Some(Block {
            line: line_num,
            header: line,
            body: Vec::new(),
        });
    }
    blocks.extend(current);
    blocks
}

fn parse_block(block: &Block, errors: &mut Vec<ParseError>) -> Result<Entry, ParseError> {
    let (_, mut directive) = directive(block.header).map_err(|_| {
        ParseError::at(
            block.line,
            format!("invalid entry: {:?}", block.header.trim()),
        )
    })?;
    let kind = directive.kind();
    let mut meta = Metadata::default();
    // Set after a malformed posting, until the next posting parses.
    let mut skipping_posting = false;

    for &(line_num, line) in &block.body {
        let line = line.trim();
        if line.starts_with(';') {
            continue;
        }
        if let Ok((_, (key, value))) = meta_line(line) {
            if skipping_posting {
                continue;
            }
            // Metadata following a posting belongs to that posting.
            let target = match &mut directive {
                Directive::Transaction(trn) => trn.postings.last_mut().map(|p| &mut p.meta),
                _ => None,
            };
            target.unwrap_or(&mut meta).0.push((key.to_string(), value));
            continue;
        }
        match &mut directive {
            Directive::Transaction(trn) => match posting(line) {
                Ok((_, post)) => {
                    skipping_posting = false;
                    trn.postings.push(post);
                }
                Err(_) => {
                    skipping_posting = true;
                    errors.push(ParseError::at(
                        line_num,
                        format!("invalid posting: {:?}", line),
                    ));
                }
            },
            _ => {
                return Err(ParseError::at(
                    line_num,
                    format!("unexpected line in {} entry: {:?}", kind, line),
                ))
            }
        }
    }

    Ok(Entry {
        line: block.line,
        directive,
        meta,
    })
}

fn nom_error(i: &str, kind: ErrorKind) -> nom::Err<NomError<&str>> {
    nom::Err::Error(NomError::new(i, kind))
}

fn comment(i: &str) -> IResult<&str, &str> {
    preceded(tag(";"), take_while(|chr: char| chr != '\n' && chr != '\r'))(i)
}

/// Consumes trailing whitespace and an optional comment up to the end of the
/// line.
fn line_end(i: &str) -> IResult<&str, ()> {
    value((), tuple((space0, opt(comment), eof)))(i)
}

#[test]
fn test_line_end() {
    assert_eq!(line_end(""), Ok(("", ())));
    assert_eq!(line_end("   ; a comment"), Ok(("", ())));
    assert!(line_end(" trailing").is_err());
}

fn date(i: &str) -> IResult<&str, NaiveDate> {
    use num::*;
    map_opt(
        alt((
            tuple((int32, tag("-"), uint32, tag("-"), uint32)),
            tuple((int32, tag("/"), uint32, tag("/"), uint32)),
        )),
        |(y, _, m, _, d)| NaiveDate::from_ymd_opt(y, m, d),
    )(i)
}

#[test]
fn test_date() {
    let want = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    assert_eq!(date("2024-01-02"), Ok(("", want)));
    assert_eq!(date("2024/1/2"), Ok(("", want)));
    assert!(date("2024-13-02").is_err());
}

/// A double-quoted string, with `\"`, `\\` and `\n` escapes.
fn string_literal(i: &str) -> IResult<&str, String> {
    let rest = i
        .strip_prefix('"')
        .ok_or_else(|| nom_error(i, ErrorKind::Char))?;
    let mut out = String::new();
    let mut chars = rest.char_indices();
    while let Some((pos, c)) = chars.next() {
        match c {
            '"' => return Ok((&rest[pos + 1..], out)),
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, escaped)) => out.push(escaped),
                None => break,
            },
            c => out.push(c),
        }
    }
    Err(nom_error(i, ErrorKind::Char))
}

#[test]
fn test_string_literal() {
    assert_eq!(
        string_literal("\"alice 5.00 beer\" rest"),
        Ok((" rest", "alice 5.00 beer".to_string()))
    );
    assert_eq!(string_literal("\"\""), Ok(("", "".to_string())));
    assert_eq!(
        string_literal(r#""say \"hi\"""#),
        Ok(("", "say \"hi\"".to_string()))
    );
    assert!(string_literal("\"unterminated").is_err());
    assert!(string_literal("bare").is_err());
}

fn account(i: &str) -> IResult<&str, &str> {
    verify(
        take_while1(|c: char| c.is_alphanumeric() || c == ':' || c == '-' || c == '_'),
        |name: &str| {
            name.starts_with(|c: char| c.is_uppercase())
                && name.split(':').count() > 1
                && name.split(':').all(|component| !component.is_empty())
        },
    )(i)
}

#[test]
fn test_account() {
    assert_eq!(
        account("Liabilities:Bar:Members:alice  -5.00 EUR"),
        Ok(("  -5.00 EUR", "Liabilities:Bar:Members:alice"))
    );
    assert!(account("Liabilities").is_err());
    assert!(account("assets:Cash").is_err());
    assert!(account("Assets::Cash").is_err());
}

fn currency(i: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_uppercase()),
        take_while(|c: char| {
            c.is_ascii_uppercase() || c.is_ascii_digit() || "'._-".contains(c)
        }),
    ))(i)
}

fn number(i: &str) -> IResult<&str, Decimal> {
    map_res(
        recognize(tuple((
            opt(one_of("+-")),
            take_while1(|c: char| c.is_ascii_digit() || c == ','),
            opt(pair(char('.'), digit0)),
        ))),
        |s: &str| Decimal::from_str(&s.replace(',', "")),
    )(i)
}

#[test]
fn test_number() {
    assert_eq!(number("5.00"), Ok(("", Decimal::new(500, 2))));
    assert_eq!(number("-1,234.5"), Ok(("", Decimal::new(-12345, 1))));
    assert_eq!(number("7 EUR"), Ok((" EUR", Decimal::new(7, 0))));
}

/// An arithmetic expression over numbers, with the usual precedence.
fn expr(i: &str) -> IResult<&str, Decimal> {
    let (mut i, mut acc) = term(i)?;
    loop {
        match tuple((space0, one_of("+-"), space0, term))(i) {
            Ok((rest, (_, op, _, rhs))) => {
                let result = match op {
                    '+' => acc.checked_add(rhs),
                    _ => acc.checked_sub(rhs),
                };
                acc = result.ok_or_else(|| nom_error(i, ErrorKind::TooLarge))?;
                i = rest;
            }
            Err(nom::Err::Error(_)) => return Ok((i, acc)),
            Err(e) => return Err(e),
        }
    }
}

fn term(i: &str) -> IResult<&str, Decimal> {
    let (mut i, mut acc) = factor(i)?;
    loop {
        match tuple((space0, one_of("*/"), space0, factor))(i) {
            Ok((rest, (_, op, _, rhs))) => {
                let result = match op {
                    '*' => acc.checked_mul(rhs),
                    _ => acc.checked_div(rhs),
                };
                acc = result.ok_or_else(|| nom_error(i, ErrorKind::Verify))?;
                i = rest;
            }
            Err(nom::Err::Error(_)) => return Ok((i, acc)),
            Err(e) => return Err(e),
        }
    }
}

fn factor(i: &str) -> IResult<&str, Decimal> {
    alt((
        number,
        parenthesized,
        map(preceded(char('-'), parenthesized), |n| -n),
    ))(i)
}

fn parenthesized(i: &str) -> IResult<&str, Decimal> {
    delimited(pair(char('('), space0), expr, pair(space0, char(')')))(i)
}

/// The number of an amount: a literal, or an expression in parentheses.
fn number_expr(i: &str) -> IResult<&str, Decimal> {
    alt((number, parenthesized))(i)
}

#[test]
fn test_number_expr() {
    assert_eq!(number_expr("(2 * 1.50) EUR"), Ok((" EUR", Decimal::new(300, 2))));
    assert_eq!(number_expr("(1 + 2*3)"), Ok(("", Decimal::new(7, 0))));
    assert_eq!(number_expr("((1+2) * 3)"), Ok(("", Decimal::new(9, 0))));
    assert_eq!(number_expr("(10 / 4 - 1)"), Ok(("", Decimal::new(15, 1))));
    assert_eq!(number_expr("(-(1 + 1) * 2)"), Ok(("", Decimal::new(-4, 0))));
    assert!(number_expr("(1 / 0)").is_err());
    assert!(number_expr("(1 + 2").is_err());
}

fn amount(i: &str) -> IResult<&str, Amount> {
    map(
        tuple((number_expr, space1, currency)),
        |(number, _, currency)| Amount {
            number,
            currency: currency.to_string(),
        },
    )(i)
}

fn price(i: &str) -> IResult<&str, Price> {
    alt((
        map(preceded(pair(tag("@@"), space1), amount), Price::Total),
        map(preceded(pair(tag("@"), space1), amount), Price::PerUnit),
    ))(i)
}

fn cost_spec(i: &str) -> IResult<&str, &str> {
    map(take_while(|c: char| c != '{' && c != '}'), str::trim)(i)
}

fn cost(i: &str) -> IResult<&str, Cost> {
    alt((
        map(delimited(tag("{{"), cost_spec, tag("}}")), |s: &str| {
            Cost::Total(s.to_string())
        }),
        map(delimited(char('{'), cost_spec, char('}')), |s: &str| {
            Cost::PerUnit(s.to_string())
        }),
    ))(i)
}

#[test]
fn test_cost() {
    assert_eq!(
        cost("{1.50 EUR}"),
        Ok(("", Cost::PerUnit("1.50 EUR".to_string())))
    );
    assert_eq!(
        cost("{{ 15 EUR, 2024-01-01 }} @"),
        Ok((" @", Cost::Total("15 EUR, 2024-01-01".to_string())))
    );
    assert_eq!(cost("{}"), Ok(("", Cost::PerUnit(String::new()))));
    assert!(cost("{1.50 EUR").is_err());
}

fn flag(i: &str) -> IResult<&str, Flag> {
    alt((
        value(Flag::Complete, char('*')),
        value(Flag::Incomplete, char('!')),
        map(one_of("&#?%PSTCURM"), Flag::Other),
    ))(i)
}

#[test]
fn test_flag() {
    assert_eq!(flag("* "), Ok((" ", Flag::Complete)));
    assert_eq!(flag("P "), Ok((" ", Flag::Other('P'))));
    assert!(flag("x").is_err());
}

fn posting(i: &str) -> IResult<&str, Posting> {
    map(
        terminated(
            tuple((
                opt(terminated(flag, space1)),
                account,
                opt(preceded(space1, amount)),
                opt(preceded(space1, cost)),
                opt(preceded(space1, price)),
            )),
            line_end,
        ),
        |(flag, account, amount, cost, price)| Posting {
            flag,
            account: account.to_string(),
            amount,
            cost,
            price,
            meta: Metadata::default(),
        },
    )(i)
}

#[test]
fn test_posting() {
    assert_eq!(
        posting("Assets:Cash"),
        Ok((
            "",
            Posting {
                flag: None,
                account: "Assets:Cash".to_string(),
                amount: None,
                cost: None,
                price: None,
                meta: Metadata::default(),
            }
        ))
    );
    assert_eq!(
        posting("! Liabilities:Bar:Members:alice  -5.00 EUR ; tab"),
        Ok((
            "",
            Posting {
                flag: Some(Flag::Incomplete),
                account: "Liabilities:Bar:Members:alice".to_string(),
                amount: Some(Amount {
                    number: Decimal::new(-500, 2),
                    currency: "EUR".to_string(),
                }),
                cost: None,
                price: None,
                meta: Metadata::default(),
            }
        ))
    );
    assert_eq!(
        posting("Assets:Crates  2 CRATE @@ 20.00 EUR"),
        Ok((
            "",
            Posting {
                flag: None,
                account: "Assets:Crates".to_string(),
                amount: Some(Amount {
                    number: Decimal::new(2, 0),
                    currency: "CRATE".to_string(),
                }),
                cost: None,
                price: Some(Price::Total(Amount {
                    number: Decimal::new(2000, 2),
                    currency: "EUR".to_string(),
                })),
                meta: Metadata::default(),
            }
        ))
    );
    assert_eq!(
        posting("Assets:Bar:Stock  -1 MATE {1.50 EUR} @ 2.00 EUR"),
        Ok((
            "",
            Posting {
                flag: None,
                account: "Assets:Bar:Stock".to_string(),
                amount: Some(Amount {
                    number: Decimal::new(-1, 0),
                    currency: "MATE".to_string(),
                }),
                cost: Some(Cost::PerUnit("1.50 EUR".to_string())),
                price: Some(Price::PerUnit(Amount {
                    number: Decimal::new(200, 2),
                    currency: "EUR".to_string(),
                })),
                meta: Metadata::default(),
            }
        ))
    );
    assert_eq!(
        posting("Income:Bar:Drinks  (2 * -1.50) EUR")
            .map(|(_, p)| p.amount)
            .map_err(|_| ()),
        Ok(Some(Amount {
            number: Decimal::new(-300, 2),
            currency: "EUR".to_string(),
        }))
    );
    assert!(posting("Assets:Cash  5 EUR [unknown]").is_err());
}

fn meta_key(i: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_lowercase()),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
    ))(i)
}

fn meta_value(i: &str) -> IResult<&str, MetaValue> {
    alt((
        terminated(map(string_literal, MetaValue::String), line_end),
        terminated(value(MetaValue::Bool(true), tag("TRUE")), line_end),
        terminated(value(MetaValue::Bool(false), tag("FALSE")), line_end),
        terminated(map(date, MetaValue::Date), line_end),
        terminated(map(number, MetaValue::Number), line_end),
        terminated(map(account, |a| MetaValue::Account(a.to_string())), line_end),
        terminated(map(currency, |c| MetaValue::Currency(c.to_string())), line_end),
        terminated(
            map(take_while(|c: char| c != ';'), |raw: &str| {
                MetaValue::Raw(raw.trim_end().to_string())
            }),
            line_end,
        ),
    ))(i)
}

fn meta_line(i: &str) -> IResult<&str, (&str, MetaValue)> {
    map(
        tuple((meta_key, char(':'), space0, meta_value)),
        |(key, _, _, value)| (key, value),
    )(i)
}

#[test]
fn test_meta_line() {
    assert_eq!(
        meta_line("mm_name: \"alice.w\""),
        Ok(("", ("mm_name", MetaValue::String("alice.w".to_string()))))
    );
    assert_eq!(
        meta_line("display_name: \"Alice\" ; nickname"),
        Ok(("", ("display_name", MetaValue::String("Alice".to_string()))))
    );
    assert_eq!(
        meta_line("joined: 2023-05-01"),
        Ok((
            "",
            (
                "joined",
                MetaValue::Date(NaiveDate::from_ymd_opt(2023, 5, 1).unwrap())
            )
        ))
    );
    assert_eq!(
        meta_line("limit: 20"),
        Ok(("", ("limit", MetaValue::Number(Decimal::new(20, 0)))))
    );
    assert_eq!(
        meta_line("deposit: Assets:Cash"),
        Ok((
            "",
            ("deposit", MetaValue::Account("Assets:Cash".to_string()))
        ))
    );
    assert_eq!(
        meta_line("note: some words"),
        Ok(("", ("note", MetaValue::Raw("some words".to_string()))))
    );
    assert!(meta_line("Assets:Cash  5 EUR").is_err());
}

enum Mark {
    Tag(String),
    Link(String),
}

fn mark_name(i: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || "-_/.".contains(c))(i)
}

fn mark(i: &str) -> IResult<&str, Mark> {
    alt((
        map(preceded(char('#'), mark_name), |t: &str| {
            Mark::Tag(t.to_string())
        }),
        map(preceded(char('^'), mark_name), |l: &str| {
            Mark::Link(l.to_string())
        }),
    ))(i)
}

fn transaction<'a>(date: NaiveDate) -> impl FnMut(&'a str) -> IResult<&'a str, Directive> {
    move |i: &'a str| {
        let (i, flag) = alt((value(Flag::Complete, tag("txn")), flag))(i)?;
        let (i, mut strings) = many0(preceded(space1, string_literal))(i)?;
        let (i, marks) = many0(preceded(space1, mark))(i)?;
        if strings.len() > 2 {
            return Err(nom_error(i, ErrorKind::TooLarge));
        }
        let narration = strings.pop().unwrap_or_default();
        let payee = strings.pop();
        let mut trn = Transaction {
            date,
            flag,
            payee,
            narration,
            tags: Vec::new(),
            links: Vec::new(),
            postings: Vec::new(),
        };
        for m in marks {
            match m {
                Mark::Tag(t) => trn.tags.push(t),
                Mark::Link(l) => trn.links.push(l),
            }
        }
        Ok((i, Directive::Transaction(trn)))
    }
}

/// A directive keyword, which must be followed by at least one space.
fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag(word), space1)
}

fn dated_directive(i: &str) -> IResult<&str, Directive> {
    let (i, date) = terminated(date, space1)(i)?;
    alt((
        map(
            preceded(
                keyword("open"),
                tuple((
                    account,
                    opt(preceded(
                        space1,
                        separated_list1(tuple((space0, char(','), space0)), currency),
                    )),
                    opt(preceded(space1, string_literal)),
                )),
            ),
            move |(account, currencies, booking)| Directive::Open {
                date,
                account: account.to_string(),
                currencies: currencies
                    .unwrap_or_default()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                booking,
            },
        ),
        map(preceded(keyword("close"), account), move |account| {
            Directive::Close {
                date,
                account: account.to_string(),
            }
        }),
        map(
            preceded(keyword("balance"), tuple((account, space1, amount))),
            move |(account, _, amount)| Directive::Balance {
                date,
                account: account.to_string(),
                amount,
            },
        ),
        map(
            preceded(keyword("note"), tuple((account, space1, string_literal))),
            move |(account, _, text)| Directive::Note {
                date,
                account: account.to_string(),
                text,
            },
        ),
        map(preceded(keyword("commodity"), currency), move |currency| {
            Directive::Commodity {
                date,
                currency: currency.to_string(),
            }
        }),
        map(
            preceded(keyword("price"), tuple((currency, space1, amount))),
            move |(currency, _, amount)| Directive::Price {
                date,
                currency: currency.to_string(),
                amount,
            },
        ),
        map(
            preceded(
                keyword("event"),
                tuple((string_literal, space1, string_literal)),
            ),
            move |(name, _, value)| Directive::Event { date, name, value },
        ),
        map(
            preceded(keyword("pad"), tuple((account, space1, account))),
            move |(account, _, source)| Directive::Pad {
                date,
                account: account.to_string(),
                source: source.to_string(),
            },
        ),
        transaction(date),
    ))(i)
}

fn undated_directive(i: &str) -> IResult<&str, Directive> {
    alt((
        map(
            preceded(
                keyword("option"),
                tuple((string_literal, space1, string_literal)),
            ),
            |(key, _, value)| Directive::Option { key, value },
        ),
        map(preceded(keyword("include"), string_literal), |path| {
            Directive::Include { path }
        }),
        map(
            preceded(
                keyword("plugin"),
                pair(string_literal, opt(preceded(space1, string_literal))),
            ),
            |(module, config)| Directive::Plugin { module, config },
        ),
    ))(i)
}

fn directive(i: &str) -> IResult<&str, Directive> {
    terminated(alt((dated_directive, undated_directive)), line_end)(i)
}

#[test]
fn test_directive() {
    let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    assert_eq!(
        directive("2024-01-01 open Liabilities:Bar:Members:alice EUR, USD"),
        Ok((
            "",
            Directive::Open {
                date: d,
                account: "Liabilities:Bar:Members:alice".to_string(),
                currencies: vec!["EUR".to_string(), "USD".to_string()],
                booking: None,
            }
        ))
    );
    assert_eq!(
        directive("2024-01-01 * \"alice 5.00 beer\" #bar"),
        Ok((
            "",
            Directive::Transaction(Transaction {
                date: d,
                flag: Flag::Complete,
                payee: None,
                narration: "alice 5.00 beer".to_string(),
                tags: vec!["bar".to_string()],
                links: vec![],
                postings: vec![],
            })
        ))
    );
    assert_eq!(
        directive("2024-01-01 txn \"Bar\" \"bob 2.00 mate\""),
        Ok((
            "",
            Directive::Transaction(Transaction {
                date: d,
                flag: Flag::Complete,
                payee: Some("Bar".to_string()),
                narration: "bob 2.00 mate".to_string(),
                tags: vec![],
                links: vec![],
                postings: vec![],
            })
        ))
    );
    assert_eq!(
        directive("include \"2024/january.beancount\""),
        Ok((
            "",
            Directive::Include {
                path: "2024/january.beancount".to_string()
            }
        ))
    );
    assert!(directive("2024-01-01 * \"a\" \"b\" \"c\"").is_err());
    assert!(directive("2024-01-01 opened Assets:Cash").is_err());
    assert!(directive("pushtag #bar").is_err());
}

mod num {
    use std::str::FromStr;

    use nom::character::complete::digit1;
    use nom::combinator::map_res;
    use nom::IResult;

    pub fn int32(i: &str) -> IResult<&str, i32> {
        map_res(digit1, i32::from_str)(i)
    }

    pub fn uint32(i: &str) -> IResult<&str, u32> {
        map_res(digit1, u32::from_str)(i)
    }

    #[test]
    fn tests() {
        assert_eq!(int32("1234"), Ok(("", 1234)));
        assert_eq!(uint32("1234"), Ok(("", 1234)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::beancount::EntryKind;
    use crate::testutil::dedent;

    #[test]
    fn parses_members_directory() {
        let (entries, errors) = parse(&dedent(
            r#"
            option "title" "Bar members"

            ; Regulars
            2020-01-01 open Liabilities:Bar:Members:alice EUR
              display_name: "Alice"
              mm_name: "alice.w"
            2020-01-01 open Liabilities:Bar:Members:bob EUR
            "#,
        ));
        assert_eq!(errors, vec![]);
        let kinds: Vec<EntryKind> = entries.iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![EntryKind::Option, EntryKind::Open, EntryKind::Open]
        );
        assert_eq!(entries[1].line, 4);
        assert_eq!(entries[1].meta.get_str("mm_name"), Some("alice.w"));
        assert_eq!(entries[1].meta.get_str("display_name"), Some("Alice"));
        assert_eq!(entries[2].meta, Metadata::default());
    }

    #[test]
    fn parses_transaction_with_postings() {
        let (entries, errors) = parse(&dedent(
            r#"
            2024-01-01 * "alice 5.00 beer"
              source: "backtab"
              Liabilities:Bar:Members:alice  5.00 EUR
                item: "beer"
              Income:Bar:Drinks  -5.00 EUR
            "#,
        ));
        assert_eq!(errors, vec![]);
        assert_eq!(entries.len(), 1);
        let trn = entries[0].as_transaction().expect("transaction");
        assert_eq!(trn.narration, "alice 5.00 beer");
        assert_eq!(trn.postings.len(), 2);
        assert_eq!(entries[0].meta.get_str("source"), Some("backtab"));
        assert_eq!(trn.postings[0].meta.get_str("item"), Some("beer"));
        assert_eq!(trn.postings[1].meta, Metadata::default());
    }

    #[test]
    fn keeps_transaction_with_malformed_posting() {
        let (entries, errors) = parse(&dedent(
            r#"
            2024-01-01 P "alice 2.00 mate"
              Assets:Bar:Stock  -1 MATE {1.50 EUR}
              Assets:Bar:Crates  1 CRATE ~~ 5 EUR
                crate: "ignored"
              Liabilities:Bar:Members:alice  (2 * 1.00) EUR
                item: "mate"
            "#,
        ));
        assert_eq!(
            errors,
            vec![ParseError::at(
                3,
                "invalid posting: \"Assets:Bar:Crates  1 CRATE ~~ 5 EUR\""
            )]
        );
        assert_eq!(entries.len(), 1);
        let trn = entries[0].as_transaction().expect("transaction");
        assert_eq!(trn.flag, Flag::Other('P'));
        assert_eq!(trn.narration, "alice 2.00 mate");
        let accounts: Vec<&str> = trn.postings.iter().map(|p| p.account.as_str()).collect();
        assert_eq!(
            accounts,
            vec!["Assets:Bar:Stock", "Liabilities:Bar:Members:alice"]
        );
        assert_eq!(trn.postings[0].meta, Metadata::default());
        assert_eq!(trn.postings[1].meta.get_str("item"), Some("mate"));
    }

    #[test]
    fn resumes_after_malformed_entry() {
        let (entries, errors) = parse(&dedent(
            r#"
            2024-01-01 frobnicate Assets:Cash
              mm_name: "ignored"
            2024-01-02 close Assets:Cash
              Assets:Other
            2024-01-03 open Assets:Cash
            "#,
        ));
        assert_eq!(
            errors,
            vec![
                ParseError::at(1, "invalid entry: \"2024-01-01 frobnicate Assets:Cash\""),
                ParseError::at(4, "unexpected line in close entry: \"Assets:Other\""),
            ]
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind(), EntryKind::Open);
    }

    #[test]
    fn reports_orphaned_indented_line() {
        let (entries, errors) = parse("  Assets:Cash  5 EUR\n");
        assert!(entries.is_empty());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, 1);
    }

    #[test]
    fn empty_text_has_no_entries() {
        assert_eq!(parse(""), (vec![], vec![]));
    }

    #[test]
    fn entry_display() {
        let text = dedent(
            r#"
            2024-01-01 * "alice 5.00 beer" #bar
              Liabilities:Bar:Members:alice  5.00 EUR
              Income:Bar:Drinks  -5.00 EUR
            "#,
        );
        let (entries, _) = parse(&text);
        crate::assert_entries_eq!(entries.clone(), parse(&entries[0].to_string()).0);
    }
}
