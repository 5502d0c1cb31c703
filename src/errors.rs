//! Error reporting for tokenization, parsing, code generation and runtime.

use std::borrow::Cow;
use std::error::Error;
use std::fmt;

use crate::span::Span;
use crate::types::VarType;

/// `Result` type alias for errors that have been resolved against the source
/// code they occurred in.
pub type CompleteLangResult<T> = Result<T, LangErrorWithSource>;
/// `Result` type alias for compile-time and runtime errors.
pub type LangResult<T> = Result<T, LangError>;

/// An error annotated with the line of source code it occurred on.
#[derive(Debug, Clone)]
pub struct LangErrorWithSource {
    /// The line of source code containing the error, if it is known.
    pub source_line: Option<String>,
    /// 1-indexed start and end columns of the error within that line.
    pub span: Option<(usize, usize)>,
    /// The error message.
    pub msg: LangErrorMsg,
}
impl fmt::Display for LangErrorWithSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let (Some(line), Some((start, end))) = (&self.source_line, self.span) {
            // Write line of source code.
            writeln!(f, "{}", line)?;
            for _ in 0..(start - 1) {
                write!(f, " ")?;
            }
            // Write arrows pointing to the part with the error.
            for _ in start..end {
                write!(f, "^")?;
            }
            write!(f, "   ")?;
        }
        write!(f, "{}", self.msg)?;
        Ok(())
    }
}
impl Error for LangErrorWithSource {}

/// An error produced while compiling or running a program, with an optional
/// span locating it in the source code.
#[derive(Debug, Clone)]
pub struct LangError {
    pub span: Option<Span>,
    pub msg: LangErrorMsg,
}
impl LangError {
    /// Resolves this error's span against the given source code, producing an
    /// error that can display the offending line.
    pub fn with_source(self, src: &str) -> LangErrorWithSource {
        if let Some(span) = self.span {
            let (start_tp, end_tp) = span.textpoints(src);
            let start = start_tp.column();
            let mut end = start;
            if start_tp.line() == end_tp.line() && end_tp.column() > start_tp.column() {
                end = end_tp.column();
            }
            LangErrorWithSource {
                source_line: src.lines().nth(start_tp.line() - 1).map(str::to_owned),
                span: Some((start, end)),
                msg: self.msg,
            }
        } else {
            LangErrorWithSource {
                source_line: None,
                span: None,
                msg: self.msg,
            }
        }
    }
}
impl fmt::Display for LangError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.msg)
    }
}
impl Error for LangError {}

/// All the kinds of errors the compiler and compiled programs can produce.
#[derive(Debug, Clone)]
pub enum LangErrorMsg {
    // Miscellaneous errors
    InternalError(Cow<'static, str>),

    // Tokenization errors
    UnexpectedCharacter(char),

    // Parse errors
    UnexpectedToken {
        got: String,
        expected: &'static str,
    },
    UnexpectedEndOfInput {
        expected: &'static str,
    },
    InvalidAssignmentTarget,
    InvalidReturnType {
        function: String,
        got: String,
    },
    ElementTypeMismatch,
    UnknownBlock(String),

    // Code generation errors
    UnsafeLoop(String),
    UnknownVariable(String),
    UnknownFunction(String),
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },
    UnsupportedOperator {
        op: String,
        reason: Cow<'static, str>,
    },
    InvalidArrayAccess(String),

    // Runtime / validation errors
    MissingPayloadField(String),
    DivisionByZero,
}
impl fmt::Display for LangErrorMsg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InternalError(s) => {
                write!(f, "Internal error: {}. This is a bug in the compiler, not your code", s)?;
            }

            Self::UnexpectedCharacter(c) => {
                write!(f, "Unexpected character {:?}", c)?;
            }

            Self::UnexpectedToken { got, expected } => {
                write!(f, "Unexpected token {:?}; expected {}", got, expected)?;
            }
            Self::UnexpectedEndOfInput { expected } => {
                write!(f, "Unexpected end of input; expected {}", expected)?;
            }
            Self::InvalidAssignmentTarget => {
                write!(f, "Invalid left-hand side in assignment expression")?;
            }
            Self::InvalidReturnType { function, got } => {
                write!(f, "Invalid return type {:?} for function '{}'", got, function)?;
            }
            Self::ElementTypeMismatch => {
                write!(f, "Array elements must all have the same type")?;
            }
            Self::UnknownBlock(name) => {
                write!(f, "Custom block '{}' is not registered", name)?;
            }

            Self::UnsafeLoop(var) => {
                write!(
                    f,
                    "While loop body never assigns to its test variable '{}'",
                    var
                )?;
            }
            Self::UnknownVariable(name) => {
                write!(f, "Unknown variable '{}'", name)?;
            }
            Self::UnknownFunction(name) => {
                write!(f, "Unknown function '{}'", name)?;
            }
            Self::ArityMismatch {
                name,
                expected,
                got,
            } => {
                write!(
                    f,
                    "Function '{}' expected {} argument(s) but {} given",
                    name, expected, got
                )?;
            }
            Self::UnsupportedOperator { op, reason } => {
                write!(f, "Operator '{}' is not supported {}", op, reason)?;
            }
            Self::InvalidArrayAccess(name) => {
                write!(f, "'{}' is not an array and cannot be indexed", name)?;
            }

            Self::MissingPayloadField(path) => {
                write!(f, "Payload is missing the field '{}'", path)?;
            }
            Self::DivisionByZero => {
                write!(f, "Division by zero")?;
            }
        }
        Ok(())
    }
}
impl LangErrorMsg {
    /// Attaches a span to this error message.
    pub fn with_span(self, span: impl Into<Span>) -> LangError {
        LangError {
            span: Some(span.into()),
            msg: self,
        }
    }
    /// Turns this error message into an error with no span.
    pub fn without_span(self) -> LangError {
        LangError {
            span: None,
            msg: self,
        }
    }
}

impl From<LangErrorMsg> for LangError {
    fn from(msg: LangErrorMsg) -> Self {
        msg.without_span()
    }
}

/// Returns an UnsupportedOperator error for using the modulo operator on a
/// float-typed operand.
pub fn modulo_on_float() -> LangErrorMsg {
    LangErrorMsg::UnsupportedOperator {
        op: "%".to_owned(),
        reason: format!("for {} operands", VarType::Float).into(),
    }
}
