//! Functions for tokenization.
//!
//! The tokenizer is an ordered list of (pattern, kind) rules tried from the
//! top at the current cursor; the first rule whose pattern matches the
//! remaining input wins. The ordering is semantically load-bearing: address
//! forms must be tried before generic identifiers, keyword forms before
//! generic identifiers, and `==`/`!=` before `=`.

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

use crate::errors::*;
use crate::span::Span;
use LangErrorMsg::UnexpectedCharacter;

/// A list of token rules, arranged roughly from least to most general. `None`
/// marks a skip rule (whitespace or comment) that produces no token.
const TOKEN_RULES: &[(&str, Option<TokenKind>)] = &[
    // Whitespace.
    (r"\s+", None),
    // Line comment.
    (r"//[^\r\n]*", None),
    // Block comment, using the non-greedy `[\s\S]*?` to match the contents.
    (r"/\*[\s\S]*?\*/", None),
    // Spreadsheet-style address forms; these must come before `:` punctuation
    // and before generic identifiers.
    (r"\w+\d+:\w+\d+", Some(TokenKind::RangeAddr)),
    (r"\brow:\d+", Some(TokenKind::RowAddr)),
    (r"\bcolumn:\w+", Some(TokenKind::ColumnAddr)),
    // Punctuation and delimiters.
    (r";", Some(TokenKind::Semicolon)),
    (r":", Some(TokenKind::Colon)),
    (r"\{", Some(TokenKind::LBrace)),
    (r"\}", Some(TokenKind::RBrace)),
    (r"\(", Some(TokenKind::LParen)),
    (r"\)", Some(TokenKind::RParen)),
    (r",", Some(TokenKind::Comma)),
    (r"\.", Some(TokenKind::Dot)),
    (r"\[", Some(TokenKind::LBracket)),
    (r"\]", Some(TokenKind::RBracket)),
    // Keywords; all word-bounded so that e.g. `format` lexes as an
    // identifier rather than `for` + `mat`.
    (r"\bconstant\b", Some(TokenKind::Constant)),
    (r"\blet\b", Some(TokenKind::Let)),
    (r"\bnew\b", Some(TokenKind::New)),
    (r"\binteger\b", Some(TokenKind::IntegerType)),
    (r"\blongint\b", Some(TokenKind::LongintType)),
    (r"\bfloat\b", Some(TokenKind::FloatType)),
    (r"\brange\b", Some(TokenKind::RangeType)),
    (r"\bstring\b", Some(TokenKind::StringType)),
    (r"\bboolean\b", Some(TokenKind::BooleanType)),
    (r"\bif\b", Some(TokenKind::If)),
    (r"\belse\b", Some(TokenKind::Else)),
    (r"\btrue\b", Some(TokenKind::True)),
    (r"\bfalse\b", Some(TokenKind::False)),
    (r"\bnull\b", Some(TokenKind::Null)),
    (r"\bwhile\b", Some(TokenKind::While)),
    (r"\bdo\b", Some(TokenKind::Do)),
    (r"\bforEach\b", Some(TokenKind::ForEach)),
    (r"\bfor\b", Some(TokenKind::For)),
    (r"\bmap\b", Some(TokenKind::Map)),
    (r"\bfilter\b", Some(TokenKind::Filter)),
    (r"\bin\b", Some(TokenKind::In)),
    (r"\bto\b", Some(TokenKind::To)),
    (r"\bwhere\b", Some(TokenKind::Where)),
    (r"\bfunction\b", Some(TokenKind::Function)),
    (r"\breturn\b", Some(TokenKind::Return)),
    (r"\bpayload\b", Some(TokenKind::Payload)),
    // Keyword spellings of the logical operators.
    (r"\band\b", Some(TokenKind::AndKeyword)),
    (r"\bor\b", Some(TokenKind::OrKeyword)),
    (r"\bxor\b", Some(TokenKind::XorKeyword)),
    // Numbers; hex before decimal.
    (r"0[xX][0-9a-fA-F]+", Some(TokenKind::HexNumber)),
    (r"\d+\.?\d*", Some(TokenKind::Number)),
    // Identifiers.
    (r"\w+", Some(TokenKind::Identifier)),
    // Equality operators `==` and `!=`; must come before `=` and `!`.
    (r"[=!]=", Some(TokenKind::EqualityOp)),
    // Assignment operators.
    (r"=", Some(TokenKind::SimpleAssign)),
    (r"[*/+-]=", Some(TokenKind::ComplexAssign)),
    // Arithmetic operators.
    (r"[+-]", Some(TokenKind::AdditiveOp)),
    (r"[*/%]", Some(TokenKind::MultiplicativeOp)),
    // Shift operators; must come before the relational operators.
    (r">>>", Some(TokenKind::ShiftRightUnsigned)),
    (r">>", Some(TokenKind::ShiftRight)),
    // Relational operators.
    (r"[><]=?", Some(TokenKind::RelationalOp)),
    // Symbol spellings of the logical operators.
    (r"&&", Some(TokenKind::LogicalAnd)),
    (r"\|\|", Some(TokenKind::LogicalOr)),
    (r"!", Some(TokenKind::LogicalNot)),
    // Strings.
    (r#""[^"]*""#, Some(TokenKind::Str)),
    (r"'[^']*'", Some(TokenKind::Str)),
];

lazy_static! {
    /// TOKEN_RULES with each pattern compiled and anchored to the start of
    /// the remaining input.
    static ref COMPILED_RULES: Vec<(Regex, Option<TokenKind>)> = TOKEN_RULES
        .iter()
        .map(|&(pattern, kind)| {
            (
                Regex::new(&format!("^(?:{})", pattern)).unwrap(),
                kind,
            )
        })
        .collect();
}

/// Classification of a token.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TokenKind {
    // Punctuation
    Semicolon,
    Colon,
    LBrace,
    RBrace,
    LParen,
    RParen,
    Comma,
    Dot,
    LBracket,
    RBracket,

    // Keywords
    Constant,
    Let,
    New,
    IntegerType,
    LongintType,
    FloatType,
    RangeType,
    StringType,
    BooleanType,
    If,
    Else,
    True,
    False,
    Null,
    While,
    Do,
    For,
    ForEach,
    Map,
    Filter,
    In,
    To,
    Where,
    Function,
    Return,
    Payload,
    AndKeyword,
    OrKeyword,
    XorKeyword,

    // Literals
    Number,
    HexNumber,
    Str,
    RangeAddr,
    RowAddr,
    ColumnAddr,

    // Identifiers
    Identifier,

    // Operators
    EqualityOp,
    SimpleAssign,
    ComplexAssign,
    AdditiveOp,
    MultiplicativeOp,
    ShiftRight,
    ShiftRightUnsigned,
    RelationalOp,
    LogicalAnd,
    LogicalOr,
    LogicalNot,
}
impl TokenKind {
    /// Returns an end-user-friendly name for this kind of token.
    pub fn name(self) -> &'static str {
        match self {
            Self::Semicolon => "';'",
            Self::Colon => "':'",
            Self::LBrace => "'{'",
            Self::RBrace => "'}'",
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::Comma => "','",
            Self::Dot => "'.'",
            Self::LBracket => "'['",
            Self::RBracket => "']'",
            Self::Constant => "'constant'",
            Self::Let => "'let'",
            Self::New => "'new'",
            Self::IntegerType => "'integer'",
            Self::LongintType => "'longint'",
            Self::FloatType => "'float'",
            Self::RangeType => "'range'",
            Self::StringType => "'string'",
            Self::BooleanType => "'boolean'",
            Self::If => "'if'",
            Self::Else => "'else'",
            Self::True => "'true'",
            Self::False => "'false'",
            Self::Null => "'null'",
            Self::While => "'while'",
            Self::Do => "'do'",
            Self::For => "'for'",
            Self::ForEach => "'forEach'",
            Self::Map => "'map'",
            Self::Filter => "'filter'",
            Self::In => "'in'",
            Self::To => "'to'",
            Self::Where => "'where'",
            Self::Function => "'function'",
            Self::Return => "'return'",
            Self::Payload => "'payload'",
            Self::AndKeyword => "'and'",
            Self::OrKeyword => "'or'",
            Self::XorKeyword => "'xor'",
            Self::Number => "number",
            Self::HexNumber => "hex number",
            Self::Str => "string literal",
            Self::RangeAddr => "range address",
            Self::RowAddr => "row address",
            Self::ColumnAddr => "column address",
            Self::Identifier => "identifier",
            Self::EqualityOp => "equality operator",
            Self::SimpleAssign => "'='",
            Self::ComplexAssign => "compound assignment operator",
            Self::AdditiveOp => "additive operator",
            Self::MultiplicativeOp => "multiplicative operator",
            Self::ShiftRight => "'>>'",
            Self::ShiftRightUnsigned => "'>>>'",
            Self::RelationalOp => "relational operator",
            Self::LogicalAnd => "'&&'",
            Self::LogicalOr => "'||'",
            Self::LogicalNot => "'!'",
        }
    }
}
impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single token produced by the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// A classification of this token.
    pub kind: TokenKind,
    /// The text that this token matched.
    pub text: String,
    /// The span of text in the current input where this token occurs.
    pub span: Span,
}
impl From<&Token> for Span {
    fn from(token: &Token) -> Span {
        token.span
    }
}
impl From<Token> for Span {
    fn from(token: Token) -> Span {
        token.span
    }
}

/// Produces tokens on demand from source text. Restartable only by
/// constructing a new Tokenizer; not resumable after a tokenization error.
#[derive(Debug)]
pub struct Tokenizer {
    input: String,
    cursor: usize,
}
impl Tokenizer {
    /// Constructs a tokenizer over the given source text.
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            cursor: 0,
        }
    }

    /// Returns whether any input remains past the cursor.
    pub fn has_more(&self) -> bool {
        self.cursor < self.input.len()
    }

    /// Returns the unconsumed remainder of the input.
    pub fn leftover(&self) -> &str {
        &self.input[self.cursor..]
    }

    /// Replaces the unconsumed remainder of the input wholesale. Used to
    /// re-synchronize after an external collaborator (the markup parser) has
    /// consumed an unknown number of characters.
    pub fn set_leftover(&mut self, leftover: String) {
        self.input = leftover;
        self.cursor = 0;
    }

    /// Produces the next token, or None at the end of the input. Skip rules
    /// (whitespace, comments) produce no token; the tokenizer re-invokes
    /// itself past them.
    pub fn next_token(&mut self) -> LangResult<Option<Token>> {
        'token: loop {
            if !self.has_more() {
                return Ok(None);
            }
            let rest = &self.input[self.cursor..];
            for (pattern, kind) in COMPILED_RULES.iter() {
                if let Some(m) = pattern.find(rest) {
                    let start = self.cursor;
                    self.cursor += m.end();
                    match kind {
                        // Skip rule; try again from the new cursor.
                        None => continue 'token,
                        Some(kind) => {
                            return Ok(Some(Token {
                                kind: *kind,
                                text: m.as_str().to_owned(),
                                span: Span {
                                    start,
                                    end: self.cursor,
                                },
                            }));
                        }
                    }
                }
            }
            let c = rest.chars().next().unwrap_or('\0');
            return Err(UnexpectedCharacter(c).with_span(Span {
                start: self.cursor,
                end: self.cursor + c.len_utf8(),
            }));
        }
    }
}
