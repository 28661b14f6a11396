//! Expression tokenizer for assertion diagnostics.
//!
//! Splits the raw text of a boolean assertion into operands and the operators between them, so
//! that every operand can be replaced by its run-time value. String literals and bracketed groups
//! (calls, indexing, container literals, comprehensions) are escaped before splitting so that
//! operators inside them never produce a split.

use once_cell::sync::Lazy;
use regex::Regex;

/// Boundary operators, in matching order.
pub const OPERATORS: &[&str] = &[
    "is", "not", "and", "or", "if", "else", "==", "!=", ">=", "<=", ">", "<", "&&", "||",
];

const STRING_MARK: char = '\u{1}';
const GROUP_MARK: char = '\u{2}';

static STRING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""[^"]*"|'[^']*'"#).expect("string literal pattern"));

static GROUP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\([^()]*\)|\[[^\[\]]*\]|\{[^{}]*\}").expect("bracket group pattern")
});

// Keywords need a word boundary in front; every operator needs trailing whitespace.
static OPERATOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\b(?:is|not|and|or|if|else)|==|!=|>=|<=|&&|\|\||>|<)\s")
        .expect("operator pattern")
});

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new("([\u{1}\u{2}])([0-9]+)[\u{1}\u{2}]").expect("placeholder pattern"));

// ============================================================================
// ESCAPING
// ============================================================================

/// Assertion text with string literals and bracket groups replaced by placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Escaped {
    line: String,
    strings: Vec<String>,
    groups: Vec<String>,
}

impl Escaped {
    pub fn new(assertion: &str) -> Self {
        let mut strings = Vec::new();
        let line = STRING_RE
            .replace_all(assertion, |caps: &regex::Captures<'_>| {
                strings.push(caps[0].to_string());
                placeholder(STRING_MARK, strings.len() - 1)
            })
            .into_owned();

        let mut groups = Vec::new();
        let mut line = line;
        while let Some(found) = GROUP_RE.find(&line) {
            groups.push(found.as_str().to_string());
            let token = placeholder(GROUP_MARK, groups.len() - 1);
            line.replace_range(found.range(), &token);
        }

        Self {
            line,
            strings,
            groups,
        }
    }

    /// The escaped text.
    pub fn line(&self) -> &str {
        &self.line
    }

    /// Restores the original text of an escaped fragment and trims it.
    ///
    /// Group placeholders are expanded first (repeatedly, since groups nest), then string
    /// placeholders.
    pub fn restore(&self, fragment: &str) -> String {
        let mut text = fragment.to_string();
        while text.contains(GROUP_MARK) {
            let expanded = self.expand(&text, GROUP_MARK);
            if expanded == text {
                break;
            }
            text = expanded;
        }
        self.expand(&text, STRING_MARK).trim().to_string()
    }

    /// Splits off a trailing context expression (`expr, context`) at a top-level comma.
    pub fn split_context(&self) -> (&str, Option<&str>) {
        match self.line.split_once(',') {
            Some((expr, context)) => (expr, Some(context)),
            None => (&self.line, None),
        }
    }

    fn expand(&self, text: &str, mark: char) -> String {
        PLACEHOLDER_RE
            .replace_all(text, |caps: &regex::Captures<'_>| {
                let kind = caps[1].chars().next();
                let index: usize = caps[2].parse().unwrap_or(usize::MAX);
                let table = if kind == Some(STRING_MARK) {
                    &self.strings
                } else {
                    &self.groups
                };
                match table.get(index) {
                    Some(original) if kind == Some(mark) => original.clone(),
                    _ => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

fn placeholder(mark: char, index: usize) -> String {
    format!("{mark}{index}{mark}")
}

// ============================================================================
// SPLITTING
// ============================================================================

/// Operators and operands of one assertion expression.
///
/// `operands.len() == operators.len() + 1`. An operand between two adjacent operators
/// (`x is not None`) is the empty string.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tokens {
    pub operators: Vec<String>,
    pub operands: Vec<String>,
}

impl Tokens {
    /// Rejoins operands and operators with single spaces.
    pub fn rejoin(&self) -> String {
        let mut parts = Vec::with_capacity(self.operands.len() * 2);
        for (i, operand) in self.operands.iter().enumerate() {
            if !operand.is_empty() {
                parts.push(operand.as_str());
            }
            if let Some(op) = self.operators.get(i) {
                parts.push(op.as_str());
            }
        }
        parts.join(" ")
    }
}

/// Tokenizes a whole assertion expression.
pub fn tokenize(assertion: &str) -> Tokens {
    let escaped = Escaped::new(assertion);
    split_escaped(&escaped, escaped.line())
}

/// Splits an already escaped fragment on operators and restores each operand.
pub fn split_escaped(escaped: &Escaped, fragment: &str) -> Tokens {
    let mut tokens = Tokens::default();
    let mut last = 0;
    for found in OPERATOR_RE.find_iter(fragment) {
        tokens
            .operands
            .push(escaped.restore(&fragment[last..found.start()]));
        tokens.operators.push(found.as_str().trim_end().to_string());
        last = found.end();
    }
    tokens.operands.push(escaped.restore(&fragment[last..]));
    tokens
}

/// Splits `text` on commas that are not nested inside strings or brackets.
pub fn split_top_level(text: &str) -> Vec<String> {
    let escaped = Escaped::new(text);
    escaped
        .line()
        .split(',')
        .map(|part| escaped.restore(part))
        .collect()
}
