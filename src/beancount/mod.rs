//! Structures for the subset of the beancount ledger format used by the bar
//! ledger.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;

pub mod parser;

pub use parser::{parse, ParseError};

/// Discriminant of an `Entry`'s directive, without any of its data.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EntryKind {
    Open,
    Close,
    Balance,
    Note,
    Commodity,
    Price,
    Event,
    Pad,
    Transaction,
    Option,
    Include,
    Plugin,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        use EntryKind::*;
        f.write_str(match self {
            Open => "open",
            Close => "close",
            Balance => "balance",
            Note => "note",
            Commodity => "commodity",
            Price => "price",
            Event => "event",
            Pad => "pad",
            Transaction => "txn",
            Option => "option",
            Include => "include",
            Plugin => "plugin",
        })
    }
}

/// A single parsed ledger entry, along with any metadata lines attached to it.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    /// 1-based line number of the entry's first line in the parsed text.
    pub line: usize,
    pub directive: Directive,
    pub meta: Metadata,
}

impl Entry {
    pub fn kind(&self) -> EntryKind {
        self.directive.kind()
    }

    /// Returns the account that the entry declares or refers to, if the
    /// directive has a single account.
    pub fn account(&self) -> Option<&str> {
        use Directive::*;
        match &self.directive {
            Open { account, .. }
            | Close { account, .. }
            | Balance { account, .. }
            | Note { account, .. }
            | Pad { account, .. } => Some(account),
            _ => None,
        }
    }

    pub fn as_transaction(&self) -> Option<&Transaction> {
        match &self.directive {
            Directive::Transaction(trn) => Some(trn),
            _ => None,
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "{}", self.directive)?;
        for (key, value) in &self.meta.0 {
            writeln!(f, "  {}: {}", key, value)?;
        }
        if let Directive::Transaction(trn) = &self.directive {
            for p in &trn.postings {
                writeln!(f, "  {}", p)?;
                for (key, value) in &p.meta.0 {
                    writeln!(f, "    {}: {}", key, value)?;
                }
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Directive {
    Open {
        date: NaiveDate,
        account: String,
        currencies: Vec<String>,
        booking: Option<String>,
    },
    Close {
        date: NaiveDate,
        account: String,
    },
    Balance {
        date: NaiveDate,
        account: String,
        amount: Amount,
    },
    Note {
        date: NaiveDate,
        account: String,
        text: String,
    },
    Commodity {
        date: NaiveDate,
        currency: String,
    },
    Price {
        date: NaiveDate,
        currency: String,
        amount: Amount,
    },
    Event {
        date: NaiveDate,
        name: String,
        value: String,
    },
    Pad {
        date: NaiveDate,
        account: String,
        source: String,
    },
    Transaction(Transaction),
    Option {
        key: String,
        value: String,
    },
    Include {
        path: String,
    },
    Plugin {
        module: String,
        config: Option<String>,
    },
}

impl Directive {
    pub fn kind(&self) -> EntryKind {
        use Directive::*;
        match self {
            Open { .. } => EntryKind::Open,
            Close { .. } => EntryKind::Close,
            Balance { .. } => EntryKind::Balance,
            Note { .. } => EntryKind::Note,
            Commodity { .. } => EntryKind::Commodity,
            Price { .. } => EntryKind::Price,
            Event { .. } => EntryKind::Event,
            Pad { .. } => EntryKind::Pad,
            Transaction(_) => EntryKind::Transaction,
            Option { .. } => EntryKind::Option,
            Include { .. } => EntryKind::Include,
            Plugin { .. } => EntryKind::Plugin,
        }
    }
}

struct IsoDate<'a>(&'a NaiveDate);

impl<'a> fmt::Display for IsoDate<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            self.0.month(),
            self.0.day()
        )
    }
}

/// Formats a string as a quoted beancount string literal.
struct Quoted<'a>(&'a str);

impl<'a> fmt::Display for Quoted<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        f.write_str("\"")?;
        for c in self.0.chars() {
            match c {
                '"' => f.write_str("\\\"")?,
                '\\' => f.write_str("\\\\")?,
                '\n' => f.write_str("\\n")?,
                c => write!(f, "{}", c)?,
            }
        }
        f.write_str("\"")
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        use Directive::*;
        match self {
            Open {
                date,
                account,
                currencies,
                booking,
            } => {
                write!(f, "{} open {}", IsoDate(date), account)?;
                if !currencies.is_empty() {
                    write!(f, " {}", currencies.join(","))?;
                }
                if let Some(booking) = booking {
                    write!(f, " {}", Quoted(booking))?;
                }
                Ok(())
            }
            Close { date, account } => write!(f, "{} close {}", IsoDate(date), account),
            Balance {
                date,
                account,
                amount,
            } => write!(f, "{} balance {}  {}", IsoDate(date), account, amount),
            Note {
                date,
                account,
                text,
            } => write!(f, "{} note {} {}", IsoDate(date), account, Quoted(text)),
            Commodity { date, currency } => write!(f, "{} commodity {}", IsoDate(date), currency),
            Price {
                date,
                currency,
                amount,
            } => write!(f, "{} price {}  {}", IsoDate(date), currency, amount),
            Event { date, name, value } => {
                write!(f, "{} event {} {}", IsoDate(date), Quoted(name), Quoted(value))
            }
            Pad {
                date,
                account,
                source,
            } => write!(f, "{} pad {} {}", IsoDate(date), account, source),
            Transaction(trn) => write!(f, "{}", trn),
            Option { key, value } => write!(f, "option {} {}", Quoted(key), Quoted(value)),
            Include { path } => write!(f, "include {}", Quoted(path)),
            Plugin { module, config } => {
                write!(f, "plugin {}", Quoted(module))?;
                if let Some(config) = config {
                    write!(f, " {}", Quoted(config))?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Flag {
    /// `*`, or the `txn` keyword.
    Complete,
    /// `!`
    Incomplete,
    /// Any of the other flag letters and symbols, such as `P` for padding.
    Other(char),
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        use Flag::*;
        match self {
            Complete => f.write_str("*"),
            Incomplete => f.write_str("!"),
            Other(c) => write!(f, "{}", c),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transaction {
    pub date: NaiveDate,
    pub flag: Flag,
    pub payee: Option<String>,
    pub narration: String,
    pub tags: Vec<String>,
    pub links: Vec<String>,
    pub postings: Vec<Posting>,
}

/// Formats the header line only; postings are written by `Entry`, after any
/// metadata.
impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{} {}", IsoDate(&self.date), self.flag)?;
        if let Some(payee) = &self.payee {
            write!(f, " {}", Quoted(payee))?;
        }
        write!(f, " {}", Quoted(&self.narration))?;
        for tag in &self.tags {
            write!(f, " #{}", tag)?;
        }
        for link in &self.links {
            write!(f, " ^{}", link)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Posting {
    pub flag: Option<Flag>,
    pub account: String,
    pub amount: Option<Amount>,
    pub cost: Option<Cost>,
    pub price: Option<Price>,
    pub meta: Metadata,
}

impl fmt::Display for Posting {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        if let Some(flag) = &self.flag {
            write!(f, "{} ", flag)?;
        }
        f.write_str(&self.account)?;
        if let Some(amount) = &self.amount {
            write!(f, "  {}", amount)?;
        }
        if let Some(cost) = &self.cost {
            write!(f, " {}", cost)?;
        }
        if let Some(price) = &self.price {
            write!(f, " {}", price)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Amount {
    pub number: Decimal,
    pub currency: String,
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{} {}", self.number, self.currency)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Price {
    /// `@ AMOUNT`
    PerUnit(Amount),
    /// `@@ AMOUNT`
    Total(Amount),
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        use Price::*;
        match self {
            PerUnit(amount) => write!(f, "@ {}", amount),
            Total(amount) => write!(f, "@@ {}", amount),
        }
    }
}

/// Cost basis of a posting, kept as written between the braces.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Cost {
    /// `{...}`
    PerUnit(String),
    /// `{{...}}`
    Total(String),
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        use Cost::*;
        match self {
            PerUnit(spec) => write!(f, "{{{}}}", spec),
            Total(spec) => write!(f, "{{{{{}}}}}", spec),
        }
    }
}

/// Value of a metadata line.
#[derive(Clone, Debug, PartialEq)]
pub enum MetaValue {
    String(String),
    Number(Decimal),
    Bool(bool),
    Date(NaiveDate),
    Account(String),
    Currency(String),
    /// Anything else, kept as written.
    Raw(String),
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            MetaValue::String(s) => write!(f, "{}", Quoted(s)),
            MetaValue::Number(n) => write!(f, "{}", n),
            MetaValue::Bool(true) => f.write_str("TRUE"),
            MetaValue::Bool(false) => f.write_str("FALSE"),
            MetaValue::Date(d) => write!(f, "{}", IsoDate(d)),
            MetaValue::Account(s) | MetaValue::Currency(s) | MetaValue::Raw(s) => f.write_str(s),
        }
    }
}

/// Metadata key/value pairs in the order they were written.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Metadata(pub Vec<(String, MetaValue)>);

impl Metadata {
    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns the value for `key` if it is present and is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(MetaValue::as_str)
    }
}
