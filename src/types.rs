//! Static types tracked for variable slots and literals.

use std::fmt;

/// Integer type used by compiled programs.
pub type LangInt = i64;
/// Float type used by compiled programs.
pub type LangFloat = f64;

/// Statically known type of a variable slot or expression.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VarType {
    Integer,
    Float,
    String,
    Boolean,
    Array,
    Markup,
    Range,
}
impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Integer => "integer",
                Self::Float => "float",
                Self::String => "string",
                Self::Boolean => "boolean",
                Self::Array => "array",
                Self::Markup => "markup",
                Self::Range => "range",
            }
        )
    }
}
