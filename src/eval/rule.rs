//! Allow/deny rules of the form `command` or `command:filter`.
//!
//! The command part is matched word by word against the start of a
//! component (`git log` matches `git log --oneline` but not `git view`).
//! The filter is parsed once into a [`Filter`]:
//!
//! - `--long-flag` must appear as a whole word,
//! - `-abc` requires each letter in some short-flag group (`-la`, `-al`, `-l -a`),
//! - `=args` requires exactly those shell words after the command and
//!   nothing more (the form written back for persisted approvals),
//! - anything else, including any filter with a space in it, is a literal
//!   argument prefix, or a glob when it contains `*` or `?`.

use std::collections::BTreeSet;
use std::fmt;

use crate::parse;

/// Parsed filter half of a rule.
#[derive(Debug, Clone)]
pub enum Filter {
    ShortFlags(BTreeSet<char>),
    LongFlag(String),
    Literal(Literal),
    /// Exact argument words; empty means no arguments at all.
    Exact(Vec<String>),
}

/// A literal argument filter, optionally a glob.
#[derive(Debug, Clone)]
pub struct Literal {
    text: String,
    glob: Option<glob::Pattern>,
}

impl Literal {
    fn new(text: &str) -> Self {
        let glob = if text.contains(['*', '?']) {
            glob::Pattern::new(text).ok()
        } else {
            None
        };
        Self {
            text: text.to_string(),
            glob,
        }
    }

    /// Match against the argument text following the rule's command words.
    fn matches(&self, args: &str) -> bool {
        match &self.glob {
            Some(pattern) => pattern.matches(args),
            None => {
                args == self.text
                    || args
                        .strip_prefix(self.text.as_str())
                        .is_some_and(|rest| rest.starts_with(' '))
            }
        }
    }
}

impl Filter {
    fn parse(filter: &str) -> Option<Self> {
        if filter.is_empty() {
            None
        } else if let Some(args) = filter.strip_prefix('=') {
            let words = parse::tokenize(args)
                .unwrap_or_else(|_| args.split_whitespace().map(String::from).collect());
            Some(Filter::Exact(words))
        } else if filter.contains(char::is_whitespace) {
            Some(Filter::Literal(Literal::new(filter)))
        } else if filter.starts_with("--") {
            Some(Filter::LongFlag(filter.to_string()))
        } else if filter.starts_with('-') {
            Some(Filter::ShortFlags(
                filter.chars().filter(|&c| c != '-').collect(),
            ))
        } else {
            Some(Filter::Literal(Literal::new(filter)))
        }
    }
}

/// One configured rule, parsed.
#[derive(Debug, Clone)]
pub struct Rule {
    source: String,
    command: Vec<String>,
    filter: Option<Filter>,
}

impl Rule {
    pub fn parse(rule: &str) -> Self {
        let (command, filter) = match rule.split_once(':') {
            Some((command, filter)) => (command, Filter::parse(filter)),
            None => (rule, None),
        };
        Self {
            source: rule.to_string(),
            command: command.split_whitespace().map(String::from).collect(),
            filter,
        }
    }

    /// The rule string as configured.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// First word of the command part; empty for a command-less rule.
    pub fn base(&self) -> &str {
        self.command.first().map(String::as_str).unwrap_or("")
    }

    /// The command part, e.g. `git log` for `git log:--oneline`.
    pub fn command(&self) -> String {
        self.command.join(" ")
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// Whether this rule covers the given component text.
    pub fn matches(&self, text: &str) -> bool {
        // A rule without a command would match everything
        if self.command.is_empty() {
            return false;
        }

        let mut words = text.split_whitespace();
        for part in &self.command {
            if words.next() != Some(part.as_str()) {
                return false;
            }
        }

        match &self.filter {
            None => true,
            Some(Filter::LongFlag(flag)) => text.split_whitespace().any(|w| w == flag),
            Some(Filter::ShortFlags(letters)) => {
                !letters.is_empty()
                    && letters
                        .iter()
                        .all(|&letter| text.split_whitespace().any(|w| short_group_has(w, letter)))
            }
            Some(Filter::Literal(literal)) => {
                literal.matches(&self.trailing_args(text).join(" "))
            }
            Some(Filter::Exact(words)) => self.trailing_args(text) == *words,
        }
    }

    /// Shell words after the rule's command words.
    fn trailing_args(&self, text: &str) -> Vec<String> {
        let mut words = parse::tokenize(text)
            .unwrap_or_else(|_| text.split_whitespace().map(String::from).collect());
        words.drain(..self.command.len().min(words.len()));
        words
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Whether `word` is a short-flag group (`-` then letters) reaching `letter`.
fn short_group_has(word: &str, letter: char) -> bool {
    let Some(rest) = word.strip_prefix('-') else {
        return false;
    };
    for c in rest.chars() {
        if c == letter {
            return true;
        }
        if !c.is_ascii_alphabetic() {
            return false;
        }
    }
    false
}

/// Whether `text` matches the rule string `rule`.
pub fn matches(text: &str, rule: &str) -> bool {
    Rule::parse(rule).matches(text)
}
