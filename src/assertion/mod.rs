//! Assertion failures and their diagnostics.
//!
//! A failed assertion is an [`AssertionFailure`]: the assertion's source text, an optional context
//! message and a [`Traceback`] whose innermost [`Frame`] holds the variable bindings captured at
//! the failure site. The [`diagnostic`] engine turns it into a value-annotated message.
//!
//! Failures are usually produced by [`check!`](crate::check):
//!
//! ```rust
//! use microtest::{check, TestError};
//!
//! fn body() -> Result<(), TestError> {
//!     let x: Option<i32> = None;
//!     check!(x.is_none() => [x]);
//!     Ok(())
//! }
//! assert!(body().is_ok());
//! ```

use std::fmt::{self, Display, Formatter};
use std::panic::Location;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::assertion::tokenizer::split_top_level;
use crate::error::TestError;
use crate::value::{Bindings, IntoValue, Value};

pub mod diagnostic;
pub mod eval;
pub mod tokenizer;

pub use diagnostic::resolve_assertion_error;

// ============================================================================
// TRACEBACK
// ============================================================================

/// One stack frame of a failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub file: String,
    pub line: u32,
    /// The source line being executed, if known.
    pub source: Option<String>,
    pub bindings: Bindings,
}

impl Frame {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
            source: None,
            bindings: Bindings::new(),
        }
    }

    pub fn from_location(location: &Location<'_>) -> Self {
        Self::new(location.file(), location.line())
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Frames of a failure, outermost first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Traceback {
    frames: Vec<Frame>,
}

impl Traceback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_frame(frame: Frame) -> Self {
        Self {
            frames: vec![frame],
        }
    }

    /// Adds a new innermost frame.
    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Adds a new outermost frame.
    pub fn push_outer(&mut self, frame: Frame) {
        self.frames.insert(0, frame);
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// The deepest frame, where the failure was raised.
    pub fn innermost(&self) -> Option<&Frame> {
        self.frames.last()
    }

    fn innermost_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    /// Renders the traceback followed by the `kind: message` line.
    pub fn render(&self, kind: &str, message: &str) -> String {
        let mut out = String::new();
        if !self.frames.is_empty() {
            out.push_str("Traceback (most recent call last):\n");
            for frame in &self.frames {
                out.push_str(&format!("  File \"{}\", line {}\n", frame.file, frame.line));
                if let Some(source) = &frame.source {
                    out.push_str(&format!("    {}\n", source));
                }
            }
        }
        out.push_str(kind);
        if !message.is_empty() {
            out.push_str(": ");
            out.push_str(message);
        }
        out.push('\n');
        out
    }
}

// ============================================================================
// ASSERTION FAILURE
// ============================================================================

static ASSERT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^assertion failed: (.+)$").expect("assert! message pattern"));

static ASSERT_EQ_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^assertion `left (==|!=) right` failed(?:: (.*?))?\n\s*left: (.*?)\n\s*right: (.*)$")
        .expect("assert_eq! message pattern")
});

static ASSERT_CALL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:debug_)?assert!\s*\(").expect("assert! call pattern"));

/// A failed assertion.
#[derive(Debug, Clone, PartialEq)]
pub struct AssertionFailure {
    message: Option<String>,
    traceback: Traceback,
}

impl AssertionFailure {
    pub const KIND: &'static str = "AssertionError";

    /// A failure of `source` (the asserted expression, optionally followed by `, context`) at
    /// `file:line`.
    pub fn new(source: impl Into<String>, message: Option<String>, file: &str, line: u32) -> Self {
        let frame = Frame::new(file, line).with_source(format!("assert {}", source.into()));
        Self {
            message: message.filter(|m| !m.is_empty()),
            traceback: Traceback::from_frame(frame),
        }
    }

    /// A failure of `source` at the caller's location.
    #[track_caller]
    pub fn at_caller(source: impl Into<String>) -> Self {
        let location = Location::caller();
        Self::new(source, None, location.file(), location.line())
    }

    /// A failure with a message but no recoverable assertion source.
    pub fn message_only(message: impl Into<String>, file: &str, line: u32) -> Self {
        Self {
            message: Some(message.into()),
            traceback: Traceback::from_frame(Frame::new(file, line)),
        }
    }

    /// Binds a variable in the innermost frame.
    pub fn bind(mut self, name: impl Into<String>, value: impl IntoValue) -> Self {
        if let Some(frame) = self.traceback.innermost_mut() {
            frame.bindings.insert(name, value.to_value());
        }
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        self.message = (!message.is_empty()).then_some(message);
        self
    }

    /// Records an outer frame, for helpers that re-raise a failure from their caller.
    pub fn called_from(mut self, file: &str, line: u32) -> Self {
        self.traceback.push_outer(Frame::new(file, line));
        self
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn traceback(&self) -> &Traceback {
        &self.traceback
    }

    /// Line of the innermost frame.
    pub fn line(&self) -> Option<u32> {
        self.traceback.innermost().map(|frame| frame.line)
    }

    /// The fully formatted failure, traceback included.
    pub fn formatted(&self) -> String {
        self.traceback
            .render(Self::KIND, self.message.as_deref().unwrap_or_default())
    }

    /// Recovers a failure from the message of a std `assert!`/`assert_eq!`/`assert_ne!` panic.
    pub fn from_panic_message(message: &str, location: Option<Frame>) -> Option<Self> {
        let (file, line) = location
            .map(|frame| (frame.file, frame.line))
            .unwrap_or_else(|| ("<unknown>".to_string(), 0));

        if let Some(caps) = ASSERT_EQ_RE.captures(message) {
            let source = format!("left {} right", &caps[1]);
            let context = caps.get(2).map(|m| m.as_str().to_string());
            return Some(
                Self::new(source, context, &file, line)
                    .bind("left", Value::raw(caps[3].trim()))
                    .bind("right", Value::raw(caps[4].trim())),
            );
        }
        if let Some(caps) = ASSERT_RE.captures(message) {
            return Some(Self::new(caps[1].trim(), None, &file, line));
        }
        None
    }

    /// Recovers a failure of `assert!(cond, "context", ..)`, whose panic carries only the
    /// formatted context. `source` is the code starting at the panic location.
    pub fn from_assert_invocation(source: &str, message: &str, location: Frame) -> Option<Self> {
        let call = ASSERT_CALL_RE.find(source)?;
        let arguments = macro_arguments(&source[call.end()..])?;
        let mut parts = split_top_level(arguments).into_iter();
        let condition = parts.next()?;
        let condition = condition.trim();
        // Without a context argument the panic message would already have matched `assertion failed`.
        if condition.is_empty() || parts.next().is_none() {
            return None;
        }
        Some(Self::new(
            condition,
            Some(message.to_string()),
            &location.file,
            location.line,
        ))
    }
}

/// The text up to the parenthesis closing a macro call, skipping string literals.
fn macro_arguments(rest: &str) -> Option<&str> {
    let mut depth = 0u32;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in rest.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '(' | '[' | '{' => depth += 1,
            ')' if depth == 0 => return Some(&rest[..i]),
            ')' | ']' | '}' => depth = depth.checked_sub(1)?,
            _ => {}
        }
    }
    None
}

impl Display for AssertionFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let source = self
            .traceback
            .innermost()
            .and_then(|frame| frame.source.as_deref())
            .and_then(|source| source.strip_prefix("assert "));
        match (source, &self.message) {
            (Some(source), Some(message)) => write!(f, "assertion failed: {} ({})", source, message),
            (Some(source), None) => write!(f, "assertion failed: {}", source),
            (None, Some(message)) => write!(f, "assertion failed: {}", message),
            (None, None) => f.write_str("assertion failed"),
        }
    }
}

impl From<AssertionFailure> for TestError {
    fn from(failure: AssertionFailure) -> Self {
        TestError::Assertion(Box::new(failure))
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Runs `f` and returns the error it produced; fails with "No errors raised." if it succeeded.
#[track_caller]
pub fn raises<T, E, F>(f: F) -> Result<E, TestError>
where
    F: FnOnce() -> Result<T, E>,
{
    let location = Location::caller();
    match f() {
        Err(err) => Ok(err),
        Ok(_) => Err(AssertionFailure::message_only(
            "No errors raised.",
            location.file(),
            location.line(),
        )
        .into()),
    }
}

/// Asserts a condition inside a test body, returning an assertion failure from the enclosing
/// function when it does not hold.
///
/// Forms:
/// - `check!(cond)`
/// - `check!(cond, "context {}", args)`
/// - `check!(cond => [a, b])` binds `a` and `b` so the diagnostic can show their values
/// - `check!(cond => [a, b], "context")`
#[macro_export]
macro_rules! check {
    (@failure $cond:expr, $source:expr, $message:expr; $($name:ident),*) => {
        if !($cond) {
            let failure = $crate::AssertionFailure::new($source, $message, file!(), line!())
                $(.bind(stringify!($name), &$name))*;
            return ::core::result::Result::Err($crate::TestError::from(failure));
        }
    };
    ($cond:expr $(=> [$($name:ident),* $(,)?])? $(,)?) => {
        $crate::check!(@failure $cond, stringify!($cond), ::core::option::Option::None; $($($name),*)?)
    };
    ($cond:expr $(=> [$($name:ident),* $(,)?])?, $($arg:tt)+) => {
        $crate::check!(
            @failure $cond,
            stringify!($cond, $($arg)+),
            ::core::option::Option::Some(format!($($arg)+));
            $($($name),*)?
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing(x: Option<i32>) -> Result<(), TestError> {
        check!(x.is_some() => [x], "x was {:?}", x);
        Ok(())
    }

    #[test]
    fn test_assert_invocation_with_context() {
        let source = "        assert!(\n            a > 2,\n            \"a too small: {}\", f(a, \")\")\n        );\n";
        let failure = AssertionFailure::from_assert_invocation(
            source,
            "a too small: 1",
            Frame::new("tests/sample.rs", 7),
        )
        .unwrap();
        assert_eq!(failure.line(), Some(7));
        assert_eq!(failure.message(), Some("a too small: 1"));
        assert_eq!(failure.to_string(), "assertion failed: a > 2 (a too small: 1)");
    }

    #[test]
    fn test_non_assert_source_is_not_recovered() {
        for source in ["panic!(\"boom\");", "assert!(done);", "assert!(a > 2, \"x\""] {
            let failure =
                AssertionFailure::from_assert_invocation(source, "x", Frame::new("t.rs", 1));
            assert!(failure.is_none(), "{source}");
        }
    }

    #[test]
    fn test_check_passes_and_fails() {
        assert!(failing(Some(1)).is_ok());
        let Err(TestError::Assertion(failure)) = failing(None) else {
            panic!("expected an assertion failure");
        };
        assert_eq!(failure.message(), Some("x was None"));
        let frame = failure.traceback().innermost().unwrap();
        assert_eq!(frame.bindings.get("x"), Some(&Value::None));
        assert!(frame
            .source
            .as_deref()
            .unwrap()
            .starts_with("assert x.is_some()"));
    }

    #[test]
    fn test_assert_eq_panic_message_is_recovered() {
        let message = "assertion `left == right` failed: sizes differ\n  left: 1\n right: 2";
        let failure = AssertionFailure::from_panic_message(message, None).unwrap();
        assert_eq!(failure.message(), Some("sizes differ"));
        let frame = failure.traceback().innermost().unwrap();
        assert_eq!(frame.source.as_deref(), Some("assert left == right"));
        assert_eq!(frame.bindings.get("right"), Some(&Value::raw("2")));
    }

    #[test]
    fn test_plain_panics_are_not_assertions() {
        assert!(AssertionFailure::from_panic_message("boom", None).is_none());
        let failure =
            AssertionFailure::from_panic_message("assertion failed: a < b", None).unwrap();
        assert_eq!(failure.to_string(), "assertion failed: a < b");
    }

    #[test]
    fn test_raises() {
        let err = raises(|| "x".parse::<i32>()).unwrap();
        assert!(err.to_string().contains("invalid digit"));
        assert!(matches!(
            raises(|| "1".parse::<i32>()),
            Err(TestError::Assertion(_))
        ));
    }

    #[test]
    fn test_traceback_render() {
        let failure = AssertionFailure::new("1 == 2", Some("ctx".into()), "t.rs", 7);
        assert_eq!(
            failure.formatted(),
            "Traceback (most recent call last):\n  File \"t.rs\", line 7\n    assert 1 == 2\nAssertionError: ctx\n"
        );
    }
}
