//! Value-annotated rendering of failed assertions.
//!
//! The raw assertion text is taken from the source line of the innermost frame, the optional context
//! message is split off, the expression is tokenized, and each operand is replaced by its value as
//! seen in that frame. Operands without a value are shown as written. Rendering never fails: when
//! there is no assertion source, or an operand is malformed, the engine falls back to a generic
//! `AssertionError on line N` message.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::assertion::eval::{evaluate, EvalError};
use crate::assertion::tokenizer::{split_escaped, Escaped};
use crate::assertion::AssertionFailure;
use crate::value::{Bindings, Value};

static ASSERT_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*assert ([^\n]+)").expect("assert line pattern"));

/// Renders the diagnostic message for a failed assertion.
pub fn resolve_assertion_error(failure: &AssertionFailure) -> String {
    let kind = AssertionFailure::KIND;
    let line = failure.line().unwrap_or_default();
    let empty = Bindings::new();
    let frame = failure.traceback().innermost();
    let bindings = frame.map(|frame| &frame.bindings).unwrap_or(&empty);

    // Only the frame's own source counts; the context message may contain `assert` lines too.
    let Some(raw) = frame
        .and_then(|frame| frame.source.as_deref())
        .and_then(|source| ASSERT_LINE_RE.captures(source))
        .map(|caps| caps[1].trim_end().to_string())
    else {
        return generic_message(kind, failure.message(), line);
    };

    match render(&raw, failure.message(), bindings) {
        Ok(rendered) => format!("\n{} on line {}:\n\n{}\n\n", kind, line, rendered),
        Err(err) => {
            debug!(error = %err, assertion = %raw, "falling back to generic assertion message");
            generic_message(kind, failure.message(), line)
        }
    }
}

/// `\n<kind> on line N:\n\n<message>\n\n`, or without the message part.
pub fn generic_message(kind: &str, message: Option<&str>, line: u32) -> String {
    match message.filter(|m| !m.is_empty()) {
        Some(message) => format!("\n{} on line {}:\n\n{}\n\n", kind, line, message),
        None => format!("\n{} on line {}\n\n", kind, line),
    }
}

fn render(raw: &str, message: Option<&str>, bindings: &Bindings) -> Result<String, EvalError> {
    let escaped = Escaped::new(raw);
    let (expression, trailing) = escaped.split_context();

    let context = match (message, trailing) {
        (Some(message), _) => Some(message.to_string()),
        (None, Some(trailing)) => {
            let text = escaped.restore(trailing);
            Some(match evaluate(&text, bindings) {
                Ok(Value::Str(s)) => s,
                _ => text,
            })
        }
        (None, None) => None,
    };

    let tokens = split_escaped(&escaped, expression);
    let values = tokens
        .operands
        .iter()
        .map(|operand| {
            if operand.is_empty() {
                Ok(None)
            } else {
                evaluate(operand, bindings).map(Some)
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = String::from("assert ");
    let mut operators = tokens.operators.iter();
    for value in &values {
        if let Some(value) = value {
            out.push_str(&value.to_string());
        }
        if let Some(op) = operators.next() {
            if value.is_some() {
                out.push(' ');
            }
            out.push_str(op);
            out.push(' ');
        }
    }
    if let Some(context) = context {
        out.push('\n');
        out.push_str(&context);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn failure(source: &str) -> AssertionFailure {
        AssertionFailure::new(source, None, "tests/sample.rs", 12)
    }

    #[test]
    fn test_literal_comparison() {
        let message = resolve_assertion_error(&failure("2 == 1"));
        assert_eq!(message, "\nAssertionError on line 12:\n\nassert 2 == 1\n\n");
    }

    #[test]
    fn test_bound_values_replace_names() {
        let message = resolve_assertion_error(&failure("x is not None").bind("x", Value::None));
        assert!(message.contains("assert None is not None"), "{message}");
    }

    #[test]
    fn test_context_message_on_its_own_line() {
        let failure = AssertionFailure::new(
            "1 == 2, \"custom message\"",
            Some("custom message".into()),
            "t.rs",
            3,
        );
        let message = resolve_assertion_error(&failure);
        assert!(message.contains("assert 1 == 2\ncustom message"), "{message}");
    }

    #[test]
    fn test_trailing_context_without_message_is_evaluated() {
        let message = resolve_assertion_error(&failure("a < b, 'too big'").bind("a", 3).bind("b", 1));
        assert!(message.contains("assert 3 < 1\ntoo big"), "{message}");
    }

    #[test]
    fn test_unbound_name_is_shown_as_written() {
        let message = resolve_assertion_error(&failure("missing == 1"));
        assert_eq!(message, "\nAssertionError on line 12:\n\nassert missing == 1\n\n");
    }

    #[test]
    fn test_malformed_operand_falls_back_to_generic() {
        let overflow = "1000000000000000000000000000000000000000000";
        let message = resolve_assertion_error(&failure(&format!("x == {overflow}")).bind("x", 1));
        assert_eq!(message, "\nAssertionError on line 12\n\n");

        let with_message = failure(&format!("x == {overflow}")).with_message("details");
        assert_eq!(
            resolve_assertion_error(&with_message),
            "\nAssertionError on line 12:\n\ndetails\n\n"
        );
    }

    #[test]
    fn test_assert_lines_in_message_do_not_replace_source() {
        let failure = AssertionFailure::new(
            "x == 1",
            Some("values differ\nassert mode on".into()),
            "t.rs",
            5,
        )
        .bind("x", 5);
        assert_eq!(
            resolve_assertion_error(&failure),
            "\nAssertionError on line 5:\n\nassert 5 == 1\nvalues differ\nassert mode on\n\n"
        );
    }

    #[test]
    fn test_unevaluable_operands_render_as_text() {
        let message =
            resolve_assertion_error(&failure("items.len() == expected").bind("expected", 4));
        assert!(message.contains("assert items.len() == 4"), "{message}");
    }

    #[test]
    fn test_missing_source_uses_generic_message() {
        let failure = AssertionFailure::message_only("No errors raised.", "t.rs", 9);
        assert_eq!(
            resolve_assertion_error(&failure),
            "\nAssertionError on line 9:\n\nNo errors raised.\n\n"
        );
    }
}
