//! Run-time values captured for assertion diagnostics.
//!
//! A failed assertion carries a snapshot of the variables it was checked against. Each variable is
//! stored as a [`Value`], whose `Display` implementation is the canonical representation used when
//! the diagnostic engine renders the assertion back to the user (`None`, `True`, `'text'`,
//! `[1, 2]`, ...).

use std::collections::HashMap;
use std::fmt::{self, Debug, Display, Formatter, Write as _};

// ============================================================================
// VALUE
// ============================================================================

/// A captured run-time value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i128),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Dict(Vec<(Value, Value)>),
    /// Pre-rendered text, shown verbatim.
    Raw(String),
}

impl Value {
    /// Captures any `Debug` value as pre-rendered text.
    pub fn debug<T: Debug + ?Sized>(value: &T) -> Self {
        Value::Raw(format!("{:?}", value))
    }

    pub fn raw(text: impl Into<String>) -> Self {
        Value::Raw(text.into())
    }

    /// Truthiness, for values where it is defined.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::None => Some(false),
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            Value::Float(f) => Some(*f != 0.0),
            Value::Str(s) => Some(!s.is_empty()),
            Value::List(items) | Value::Tuple(items) => Some(!items.is_empty()),
            Value::Dict(entries) => Some(!entries.is_empty()),
            Value::Raw(_) => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => write_quoted(f, s),
            Value::List(items) => {
                f.write_char('[')?;
                write_items(f, items)?;
                f.write_char(']')
            }
            Value::Tuple(items) => {
                f.write_char('(')?;
                write_items(f, items)?;
                if items.len() == 1 {
                    f.write_char(',')?;
                }
                f.write_char(')')
            }
            Value::Dict(entries) => {
                f.write_char('{')?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_char('}')
            }
            Value::Raw(text) => f.write_str(text),
        }
    }
}

fn write_items(f: &mut Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// Quotes like a repr: single quotes unless the text only contains single quotes.
fn write_quoted(f: &mut Formatter<'_>, text: &str) -> fmt::Result {
    let quote = if text.contains('\'') && !text.contains('"') {
        '"'
    } else {
        '\''
    };
    f.write_char(quote)?;
    for c in text.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            c if c == quote => {
                f.write_char('\\')?;
                f.write_char(c)?;
            }
            c => f.write_char(c)?,
        }
    }
    f.write_char(quote)
}

// ============================================================================
// CONVERSIONS
// ============================================================================

/// Conversion into a captured [`Value`]. Used by the `check!` macro for bound variables.
pub trait IntoValue {
    fn to_value(&self) -> Value;
}

macro_rules! int_values {
    ($($t:ty),*) => {
        $(impl IntoValue for $t {
            fn to_value(&self) -> Value {
                Value::Int(*self as i128)
            }
        })*
    };
}

int_values!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, usize);

impl IntoValue for u128 {
    fn to_value(&self) -> Value {
        i128::try_from(*self)
            .map(Value::Int)
            .unwrap_or_else(|_| Value::Raw(self.to_string()))
    }
}

impl IntoValue for f32 {
    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }
}

impl IntoValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl IntoValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl IntoValue for char {
    fn to_value(&self) -> Value {
        Value::Str(self.to_string())
    }
}

impl IntoValue for str {
    fn to_value(&self) -> Value {
        Value::Str(self.to_owned())
    }
}

impl IntoValue for String {
    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }
}

impl IntoValue for () {
    fn to_value(&self) -> Value {
        Value::None
    }
}

impl IntoValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::None,
        }
    }
}

impl<T: IntoValue> IntoValue for [T] {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(IntoValue::to_value).collect())
    }
}

impl<T: IntoValue, const N: usize> IntoValue for [T; N] {
    fn to_value(&self) -> Value {
        self.as_slice().to_value()
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn to_value(&self) -> Value {
        self.as_slice().to_value()
    }
}

impl<A: IntoValue, B: IntoValue> IntoValue for (A, B) {
    fn to_value(&self) -> Value {
        Value::Tuple(vec![self.0.to_value(), self.1.to_value()])
    }
}

impl<T: IntoValue + ?Sized> IntoValue for &T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T: IntoValue + ?Sized> IntoValue for Box<T> {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

// ============================================================================
// BINDINGS
// ============================================================================

/// Named values visible at the point an assertion failed.
///
/// Keys are usually variable names, but any operand text may be bound (`"items.len()"`), which
/// lets the diagnostic engine show values for operands it cannot evaluate itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    values: HashMap<String, Value>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut bindings = Bindings::new();
        for (name, value) in iter {
            bindings.insert(name, value);
        }
        bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_representations() {
        assert_eq!(Value::None.to_string(), "None");
        assert_eq!(true.to_value().to_string(), "True");
        assert_eq!(42u8.to_value().to_string(), "42");
        assert_eq!(1.0f64.to_value().to_string(), "1.0");
        assert_eq!("abc".to_value().to_string(), "'abc'");
    }

    #[test]
    fn test_string_quoting_prefers_double_quotes_around_apostrophes() {
        assert_eq!("it's".to_value().to_string(), "\"it's\"");
        assert_eq!("a'b\"c".to_value().to_string(), "'a\\'b\"c'");
    }

    #[test]
    fn test_containers() {
        assert_eq!(vec![1, 2, 3].to_value().to_string(), "[1, 2, 3]");
        assert_eq!(Value::Tuple(vec![Value::Int(1)]).to_string(), "(1,)");
        let dict = Value::Dict(vec![(Value::Str("a".into()), Value::Int(1))]);
        assert_eq!(dict.to_string(), "{'a': 1}");
        assert_eq!(Some(3).to_value(), Value::Int(3));
        assert_eq!(None::<i32>.to_value(), Value::None);
    }

    #[test]
    fn test_debug_capture_is_verbatim() {
        #[derive(Debug)]
        struct Point {
            x: i32,
        }
        assert_eq!(Value::debug(&Point { x: 1 }).to_string(), "Point { x: 1 }");
    }
}
