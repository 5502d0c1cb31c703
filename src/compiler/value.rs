//! Runtime values.

use itertools::Itertools;
use std::collections::HashMap;
use std::fmt;

use crate::markup::MarkupTree;
use crate::types::{LangFloat, LangInt};

/// A value produced or consumed by a compiled program.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(LangInt),
    Float(LangFloat),
    Str(String),
    Array(Vec<Value>),
    Object(HashMap<String, Value>),
    Markup(MarkupTree),
}

impl Value {
    /// Builds an object value from key/value pairs. Convenient for payloads
    /// in host code and tests.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (&'static str, Value)>) -> Self {
        Self::Object(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v))
                .collect(),
        )
    }

    /// Truthiness, used by conditionals and logical operators. Null, false,
    /// zero and the empty string are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::Array(_) | Self::Object(_) | Self::Markup(_) => true,
        }
    }

    /// Numeric view of this value, if it has one. Booleans do not coerce.
    pub fn as_float(&self) -> Option<LangFloat> {
        match self {
            Self::Int(i) => Some(*i as LangFloat),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Integer view of this value, if it has one. Floats with no fractional
    /// part qualify.
    pub fn as_int(&self) -> Option<LangInt> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 => Some(*f as LangInt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Loose equality: numbers compare across Int/Float, otherwise values
    /// compare within their own variant. Mismatched variants are unequal.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            _ => match (self.as_float(), other.as_float()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Ordering for relational operators; defined for number pairs and
    /// string pairs.
    pub fn loose_cmp(&self, other: &Value) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Some(a.cmp(b)),
            _ => match (self.as_float(), other.as_float()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Str(s) => write!(f, "{}", s),
            Self::Array(items) => write!(f, "[{}]", items.iter().join(",")),
            Self::Object(_) => write!(f, "[object]"),
            Self::Markup(_) => write!(f, "[markup]"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.loose_eq(other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}
impl From<LangInt> for Value {
    fn from(i: LangInt) -> Self {
        Self::Int(i)
    }
}
impl From<LangFloat> for Value {
    fn from(f: LangFloat) -> Self {
        Self::Float(f)
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}
impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(Value::Int(-1).is_truthy());
        assert!(Value::Str("x".to_owned()).is_truthy());
        assert!(Value::Array(vec![]).is_truthy());
    }

    #[test]
    fn test_loose_eq() {
        assert_eq!(Value::Int(3), Value::Float(3.0));
        assert_ne!(Value::Int(3), Value::Str("3".to_owned()));
        assert_eq!(
            Value::Array(vec![Value::Int(1), Value::Int(2)]),
            Value::Array(vec![Value::Float(1.0), Value::Int(2)]),
        );
    }

    #[test]
    fn test_display() {
        assert_eq!("1,2,3", format!("{}", Value::Array(vec![
            Value::Int(1),
            Value::Int(2),
            Value::Int(3),
        ])).trim_matches(|c| c == '[' || c == ']'));
        assert_eq!("2.5", format!("{}", Value::Float(2.5)));
        assert_eq!("2", format!("{}", Value::Float(2.0)));
    }
}
