//! Operand evaluation against a failure-time binding snapshot.
//!
//! There is no general expression evaluator here. An operand resolves to a [`Value`] when it is a
//! bound name (or bound expression text), a literal, or a container of resolvable items. Anything
//! else (calls, arithmetic, field access, names missing from the snapshot) is kept as raw text. Only
//! a malformed literal is an error, which makes the diagnostic engine fall back to its generic
//! message.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::assertion::tokenizer::split_top_level;
use crate::value::{Bindings, Value};

static INT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-]?[0-9][0-9_]*)(?:i8|i16|i32|i64|i128|isize|u8|u16|u32|u64|u128|usize)?$")
        .expect("integer literal pattern")
});

static FLOAT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-]?[0-9][0-9_]*\.[0-9_]*(?:[eE][+-]?[0-9]+)?)(?:f32|f64)?$")
        .expect("float literal pattern")
});

/// An operand that cannot be shown at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("malformed literal `{0}`")]
    Malformed(String),
}

/// Resolves one operand.
pub fn evaluate(operand: &str, bindings: &Bindings) -> Result<Value, EvalError> {
    let text = operand.trim();
    if let Some(value) = bindings.get(text) {
        return Ok(value.clone());
    }

    match text {
        "None" => return Ok(Value::None),
        "True" | "true" => return Ok(Value::Bool(true)),
        "False" | "false" => return Ok(Value::Bool(false)),
        _ => {}
    }

    if let Some(caps) = INT_RE.captures(text) {
        return caps[1]
            .replace('_', "")
            .parse::<i128>()
            .map(Value::Int)
            .map_err(|_| EvalError::Malformed(text.to_string()));
    }
    if let Some(caps) = FLOAT_RE.captures(text) {
        return caps[1]
            .replace('_', "")
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| EvalError::Malformed(text.to_string()));
    }
    if let Some(s) = string_literal(text) {
        return Ok(Value::Str(s));
    }
    if unterminated_string(text) {
        return Err(EvalError::Malformed(text.to_string()));
    }
    if let Some(inner) = text.strip_prefix('!') {
        let value = evaluate(inner, bindings)?;
        return Ok(match value.as_bool() {
            Some(b) => Value::Bool(!b),
            None => Value::Raw(text.to_string()),
        });
    }
    if let Some(value) = container(text, bindings)? {
        return Ok(value);
    }
    Ok(Value::Raw(text.to_string()))
}

/// A leading quote that is never closed.
fn unterminated_string(text: &str) -> bool {
    match text.chars().next() {
        Some(quote @ ('"' | '\'')) => !text[1..].contains(quote),
        _ => false,
    }
}

/// Parses a complete single- or double-quoted literal.
fn string_literal(text: &str) -> Option<String> {
    let quote = text.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let body = text.strip_prefix(quote)?.strip_suffix(quote)?;
    if text.len() < 2 || body.contains(quote) && !body.contains('\\') {
        return None;
    }
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    Some(out)
}

/// Lists, tuples, dicts and the Rust spellings `vec![..]` / `Some(..)`.
fn container(text: &str, bindings: &Bindings) -> Result<Option<Value>, EvalError> {
    if let Some(inner) = text.strip_prefix("Some(").and_then(|t| t.strip_suffix(')')) {
        return evaluate(inner, bindings).map(Some);
    }
    let text = text.strip_prefix("vec!").unwrap_or(text);

    if let Some(inner) = enclosed(text, '[', ']') {
        return Ok(Some(Value::List(items(inner, bindings)?)));
    }
    if let Some(inner) = enclosed(text, '(', ')') {
        let parts = split_top_level(inner);
        if parts.len() == 1 && !parts[0].is_empty() {
            return evaluate(&parts[0], bindings).map(Some);
        }
        return Ok(Some(Value::Tuple(items(inner, bindings)?)));
    }
    if let Some(inner) = enclosed(text, '{', '}') {
        let mut entries = Vec::new();
        for part in split_top_level(inner).into_iter().filter(|p| !p.is_empty()) {
            let Some((key, value)) = split_key(&part) else {
                return Ok(Some(Value::Raw(text.to_string())));
            };
            entries.push((evaluate(key, bindings)?, evaluate(value, bindings)?));
        }
        return Ok(Some(Value::Dict(entries)));
    }
    Ok(None)
}

/// Returns the inside of `text` when the opening bracket at the start closes at the very end.
fn enclosed(text: &str, open: char, close: char) -> Option<&str> {
    let inner = text.strip_prefix(open)?.strip_suffix(close)?;
    let mut depth = 0i32;
    for c in inner.chars() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth < 0 {
                return None;
            }
        }
    }
    (depth == 0).then_some(inner)
}

fn items(inner: &str, bindings: &Bindings) -> Result<Vec<Value>, EvalError> {
    split_top_level(inner)
        .into_iter()
        .filter(|part| !part.is_empty())
        .map(|part| evaluate(&part, bindings))
        .collect()
}

/// Splits a dict entry on its first top-level colon that is not part of a `::` path.
fn split_key(entry: &str) -> Option<(&str, &str)> {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut chars = entry.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(' | '[' | '{') => depth += 1,
            (None, ')' | ']' | '}') => depth -= 1,
            (None, ':') if chars.peek().is_some_and(|&(_, next)| next == ':') => {
                chars.next();
            }
            (None, ':') if depth == 0 => return Some((&entry[..i], &entry[i + 1..])),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(text: &str) -> Result<Value, EvalError> {
        evaluate(text, &Bindings::new())
    }

    #[test]
    fn test_literals() {
        assert_eq!(eval("2"), Ok(Value::Int(2)));
        assert_eq!(eval("-1_000u32"), Ok(Value::Int(-1000)));
        assert_eq!(eval("2.5"), Ok(Value::Float(2.5)));
        assert_eq!(eval("None"), Ok(Value::None));
        assert_eq!(eval("true"), Ok(Value::Bool(true)));
        assert_eq!(eval("\"a\\nb\""), Ok(Value::Str("a\nb".to_string())));
        assert_eq!(eval("'x'"), Ok(Value::Str("x".to_string())));
    }

    #[test]
    fn test_containers() {
        assert_eq!(
            eval("[1, 'a', None]"),
            Ok(Value::List(vec![
                Value::Int(1),
                Value::Str("a".into()),
                Value::None
            ]))
        );
        assert_eq!(eval("(1, 2)").map(|v| v.to_string()), Ok("(1, 2)".into()));
        assert_eq!(eval("(3)"), Ok(Value::Int(3)));
        assert_eq!(eval("vec![1, 2]").map(|v| v.to_string()), Ok("[1, 2]".into()));
        assert_eq!(
            eval("{'a': [1, 2]}").map(|v| v.to_string()),
            Ok("{'a': [1, 2]}".into())
        );
        assert_eq!(eval("Some(4)"), Ok(Value::Int(4)));
    }

    #[test]
    fn test_bound_names_and_expression_text() {
        let bindings: Bindings = [
            ("x", Value::None),
            ("items.len()", Value::Int(3)),
        ]
        .into_iter()
        .collect();
        assert_eq!(evaluate("x", &bindings), Ok(Value::None));
        assert_eq!(evaluate("items.len()", &bindings), Ok(Value::Int(3)));
        assert_eq!(
            evaluate("[x, 1]", &bindings).map(|v| v.to_string()),
            Ok("[None, 1]".into())
        );
    }

    #[test]
    fn test_unbound_identifier_stays_raw() {
        assert_eq!(eval("missing"), Ok(Value::Raw("missing".into())));
        assert_eq!(eval("self.count"), Ok(Value::Raw("self.count".into())));
        assert_eq!(eval("!done"), Ok(Value::Raw("!done".into())));
    }

    #[test]
    fn test_malformed_literals_are_errors() {
        let overflow = "1".repeat(45);
        assert_eq!(eval(&overflow), Err(EvalError::Malformed(overflow.clone())));
        assert_eq!(eval("'open"), Err(EvalError::Malformed("'open".into())));
    }

    #[test]
    fn test_dict_keys_may_be_paths() {
        assert_eq!(
            eval("{Kind::A: 1, 'b': 2}").map(|v| v.to_string()),
            Ok("{Kind::A: 1, 'b': 2}".into())
        );
    }

    #[test]
    fn test_unsupported_expressions_stay_raw() {
        assert_eq!(eval("compute(1, 2)"), Ok(Value::Raw("compute(1, 2)".into())));
        assert_eq!(eval("a + b"), Ok(Value::Raw("a + b".into())));
    }

    #[test]
    fn test_negation() {
        assert_eq!(eval("!true"), Ok(Value::Bool(false)));
        assert_eq!(eval("!f(x)"), Ok(Value::Raw("!f(x)".into())));
    }
}
