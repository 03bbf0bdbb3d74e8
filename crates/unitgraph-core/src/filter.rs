//! LDAP-style filter expressions over environment facts.
//!
//! Requirements can be guarded by a filter such as
//! `(&(osgi.os=linux)(|(osgi.arch=x86_64)(osgi.arch=aarch64)))`; the
//! requirement only applies when the filter matches the caller's facts.
//!
//! Supported syntax:
//!
//! | form            | meaning                                       |
//! |-----------------|-----------------------------------------------|
//! | `(&F1 F2 ...)`  | all match                                     |
//! | `(\|F1 F2 ...)` | any matches                                   |
//! | `(!F)`          | negation                                      |
//! | `(k=v)`         | equality                                      |
//! | `(k~=v)`        | equality ignoring case and whitespace         |
//! | `(k>=v)`        | ordering, numeric when both sides are integers |
//! | `(k<=v)`        | ordering, numeric when both sides are integers |
//! | `(k=*)`         | presence                                      |
//! | `(k=a*b*c)`     | wildcard match                                |
//!
//! Attribute names are case-insensitive. A backslash escapes the next
//! character in a value. Comparisons against a missing fact are false.

use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use unitgraph_schema::Platform;

/// A filter expression that failed to parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid filter '{filter}' at offset {offset}: {message}")]
pub struct FilterError {
    /// The raw filter text.
    pub filter: String,
    /// Byte offset where parsing failed.
    pub offset: usize,
    /// What was wrong.
    pub message: &'static str,
}

/// Key/value lookup used during filter evaluation.
pub trait Facts {
    /// Value for `key`. Callers pass lowercased keys.
    fn fact(&self, key: &str) -> Option<&str>;
}

impl Facts for BTreeMap<String, String> {
    fn fact(&self, key: &str) -> Option<&str> {
        if let Some(value) = self.get(key) {
            return Some(value.as_str());
        }
        self.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// Environment facts (operating system, windowing system, architecture, ...)
/// supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    facts: BTreeMap<String, String>,
}

impl Environment {
    /// An environment with no facts. Every comparison filter is false in it.
    pub fn new() -> Self {
        Self::default()
    }

    /// An environment holding the facts of `platform`.
    pub fn for_platform(platform: Platform) -> Self {
        let mut env = Self::new();
        env.set_platform(platform);
        env
    }

    /// Set (or overwrite) a fact. Keys are stored lowercased.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.facts.insert(key.to_lowercase(), value.into());
    }

    /// Set the `osgi.ws`, `osgi.os` and `osgi.arch` facts.
    pub fn set_platform(&mut self, platform: Platform) {
        for (key, value) in platform.facts() {
            self.set(key, value);
        }
    }

    /// Value of a fact, looked up case-insensitively.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.facts.get(&key.to_lowercase()).map(String::as_str)
    }

    /// All facts in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.facts.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of facts.
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// True if no facts are set.
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

impl Facts for Environment {
    fn fact(&self, key: &str) -> Option<&str> {
        self.facts.get(key).map(String::as_str)
    }
}

/// A compiled filter expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Every sub-filter matches.
    And(Vec<Filter>),
    /// At least one sub-filter matches.
    Or(Vec<Filter>),
    /// The sub-filter does not match.
    Not(Box<Filter>),
    /// `(key=value)`
    Equal {
        /// Lowercased attribute name.
        key: String,
        /// Expected value.
        value: String,
    },
    /// `(key~=value)`
    Approx {
        /// Lowercased attribute name.
        key: String,
        /// Expected value.
        value: String,
    },
    /// `(key>=value)`
    GreaterEq {
        /// Lowercased attribute name.
        key: String,
        /// Lower bound.
        value: String,
    },
    /// `(key<=value)`
    LessEq {
        /// Lowercased attribute name.
        key: String,
        /// Upper bound.
        value: String,
    },
    /// `(key=*)`
    Present {
        /// Lowercased attribute name.
        key: String,
    },
    /// `(key=init*any*final)`
    Substring {
        /// Lowercased attribute name.
        key: String,
        /// Required prefix.
        initial: Option<String>,
        /// Fragments that must appear in order.
        any: Vec<String>,
        /// Required suffix.
        last: Option<String>,
    },
}

impl Filter {
    /// Parse a filter expression.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] with the byte offset of the first problem.
    pub fn parse(input: &str) -> Result<Self, FilterError> {
        let mut parser = Parser {
            src: input,
            pos: 0,
            depth: 0,
        };
        let filter = parser.filter()?;
        parser.skip_ws();
        if parser.pos != input.len() {
            return Err(parser.error("trailing characters after filter"));
        }
        Ok(filter)
    }

    /// Evaluate the filter against a set of facts.
    pub fn matches<F: Facts + ?Sized>(&self, facts: &F) -> bool {
        match self {
            Self::And(filters) => filters.iter().all(|f| f.matches(facts)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(facts)),
            Self::Not(filter) => !filter.matches(facts),
            Self::Equal { key, value } => facts.fact(key) == Some(value.as_str()),
            Self::Approx { key, value } => facts
                .fact(key)
                .is_some_and(|actual| normalize(actual) == normalize(value)),
            Self::GreaterEq { key, value } => facts
                .fact(key)
                .is_some_and(|actual| compare(actual, value) != Ordering::Less),
            Self::LessEq { key, value } => facts
                .fact(key)
                .is_some_and(|actual| compare(actual, value) != Ordering::Greater),
            Self::Present { key } => facts.fact(key).is_some(),
            Self::Substring {
                key,
                initial,
                any,
                last,
            } => facts
                .fact(key)
                .is_some_and(|actual| wildcard_match(actual, initial.as_deref(), any, last.as_deref())),
        }
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn compare(actual: &str, expected: &str) -> Ordering {
    match (actual.trim().parse::<i64>(), expected.trim().parse::<i64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => actual.cmp(expected),
    }
}

fn wildcard_match(value: &str, initial: Option<&str>, any: &[String], last: Option<&str>) -> bool {
    let mut rest = value;
    if let Some(prefix) = initial {
        match rest.strip_prefix(prefix) {
            Some(r) => rest = r,
            None => return false,
        }
    }
    for fragment in any {
        match rest.find(fragment.as_str()) {
            Some(at) => rest = &rest[at + fragment.len()..],
            None => return false,
        }
    }
    last.is_none_or(|suffix| rest.ends_with(suffix))
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And(filters) | Self::Or(filters) => {
                let op = if matches!(self, Self::And(_)) { '&' } else { '|' };
                write!(f, "({op}")?;
                for filter in filters {
                    write!(f, "{filter}")?;
                }
                write!(f, ")")
            }
            Self::Not(filter) => write!(f, "(!{filter})"),
            Self::Equal { key, value } => write!(f, "({key}={})", Escaped(value)),
            Self::Approx { key, value } => write!(f, "({key}~={})", Escaped(value)),
            Self::GreaterEq { key, value } => write!(f, "({key}>={})", Escaped(value)),
            Self::LessEq { key, value } => write!(f, "({key}<={})", Escaped(value)),
            Self::Present { key } => write!(f, "({key}=*)"),
            Self::Substring {
                key,
                initial,
                any,
                last,
            } => {
                write!(f, "({key}=")?;
                if let Some(initial) = initial {
                    write!(f, "{}", Escaped(initial))?;
                }
                write!(f, "*")?;
                for fragment in any {
                    write!(f, "{}*", Escaped(fragment))?;
                }
                if let Some(last) = last {
                    write!(f, "{}", Escaped(last))?;
                }
                write!(f, ")")
            }
        }
    }
}

struct Escaped<'a>(&'a str);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0.chars() {
            if matches!(c, '\\' | '*' | '(' | ')') {
                write!(f, "\\")?;
            }
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

enum Op {
    Equal,
    Approx,
    GreaterEq,
    LessEq,
}

/// Deepest `(&...)`/`(|...)`/`(!...)` nesting accepted.
///
/// Keeps parsing, evaluation and display within a bounded stack no matter
/// what the metadata contains.
const MAX_DEPTH: usize = 256;

struct Parser<'s> {
    src: &'s str,
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&self, message: &'static str) -> FilterError {
        FilterError {
            filter: self.src.to_string(),
            offset: self.pos,
            message,
        }
    }

    fn expect(&mut self, expected: char, message: &'static str) -> Result<(), FilterError> {
        if self.peek() == Some(expected) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(message))
        }
    }

    fn filter(&mut self) -> Result<Filter, FilterError> {
        self.skip_ws();
        if self.depth == MAX_DEPTH {
            return Err(self.error("filter nested too deeply"));
        }
        self.expect('(', "expected '('")?;
        self.depth += 1;
        self.skip_ws();
        let filter = match self.peek() {
            Some('&') => {
                self.bump();
                Filter::And(self.filter_list()?)
            }
            Some('|') => {
                self.bump();
                Filter::Or(self.filter_list()?)
            }
            Some('!') => {
                self.bump();
                Filter::Not(Box::new(self.filter()?))
            }
            _ => self.item()?,
        };
        self.skip_ws();
        self.expect(')', "expected ')'")?;
        self.depth -= 1;
        Ok(filter)
    }

    fn filter_list(&mut self) -> Result<Vec<Filter>, FilterError> {
        let mut filters = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() != Some('(') {
                break;
            }
            filters.push(self.filter()?);
        }
        if filters.is_empty() {
            return Err(self.error("empty filter list"));
        }
        Ok(filters)
    }

    fn item(&mut self) -> Result<Filter, FilterError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, '=' | '~' | '<' | '>' | '(' | ')') {
                break;
            }
            self.bump();
        }
        let key = self.src[start..self.pos].trim();
        if key.is_empty() {
            return Err(self.error("missing attribute name"));
        }
        let key = key.to_lowercase();

        let op = match self.peek() {
            Some('=') => Op::Equal,
            Some('~') => Op::Approx,
            Some('>') => Op::GreaterEq,
            Some('<') => Op::LessEq,
            _ => return Err(self.error("expected comparison operator")),
        };
        self.bump();
        if !matches!(op, Op::Equal) {
            self.expect('=', "expected '='")?;
        }

        let mut segments = self.value()?;
        let filter = match op {
            Op::Equal if segments.len() == 1 => Filter::Equal {
                key,
                value: segments.remove(0),
            },
            Op::Equal if segments.len() == 2 && segments.iter().all(String::is_empty) => {
                Filter::Present { key }
            }
            Op::Equal => {
                let last = segments.pop().filter(|s| !s.is_empty());
                let mut rest = segments.into_iter();
                let initial = rest.next().filter(|s| !s.is_empty());
                let any = rest.filter(|s| !s.is_empty()).collect();
                Filter::Substring {
                    key,
                    initial,
                    any,
                    last,
                }
            }
            Op::Approx => Filter::Approx {
                key,
                value: segments.join("*"),
            },
            Op::GreaterEq => Filter::GreaterEq {
                key,
                value: segments.join("*"),
            },
            Op::LessEq => Filter::LessEq {
                key,
                value: segments.join("*"),
            },
        };
        Ok(filter)
    }

    /// Reads a value up to the closing parenthesis, split on unescaped `*`.
    fn value(&mut self) -> Result<Vec<String>, FilterError> {
        let mut segments = Vec::new();
        let mut current = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated filter")),
                Some(')') => break,
                Some('(') => return Err(self.error("unescaped '(' in value")),
                Some('*') => {
                    self.bump();
                    segments.push(std::mem::take(&mut current));
                }
                Some('\\') => {
                    self.bump();
                    match self.bump() {
                        Some(c) => current.push(c),
                        None => return Err(self.error("dangling escape")),
                    }
                }
                Some(c) => {
                    self.bump();
                    current.push(c);
                }
            }
        }
        segments.push(current);
        Ok(segments)
    }
}

/// Memoizes compiled filters by their raw text.
///
/// Repositories repeat a handful of filters across thousands of
/// requirements. The cache is shared by every resolution against an index,
/// so it sits behind a read-write lock.
#[derive(Debug, Default)]
pub struct FilterCache {
    compiled: RwLock<HashMap<String, Arc<Filter>>>,
}

impl FilterCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `raw`, reusing an earlier compilation of the same text.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] if `raw` does not parse. Failures are not cached.
    pub fn compile(&self, raw: &str) -> Result<Arc<Filter>, FilterError> {
        if let Some(filter) = self.compiled.read().get(raw) {
            return Ok(Arc::clone(filter));
        }

        let parsed = Arc::new(Filter::parse(raw)?);
        let mut compiled = self.compiled.write();
        let entry = compiled.entry(raw.to_string()).or_insert(parsed);
        Ok(Arc::clone(entry))
    }

    /// Number of distinct filters compiled so far.
    pub fn len(&self) -> usize {
        self.compiled.read().len()
    }

    /// True if nothing has been compiled yet.
    pub fn is_empty(&self) -> bool {
        self.compiled.read().is_empty()
    }
}
