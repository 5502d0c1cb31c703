//! Abstract syntax tree produced by the parser and consumed by the code
//! generator.

use std::fmt;

use crate::markup::MarkupTree;
use crate::types::VarType;

/// A whole parsed program.
#[derive(Debug, Clone)]
pub struct Program {
    pub body: Vec<Statement>,
}

/// A statement.
#[derive(Debug, Clone)]
pub enum Statement {
    /// A lone semicolon.
    Empty,
    /// A `{ ... }` block.
    Block(Vec<Statement>),
    /// An expression evaluated for its value or side effects.
    Expression(Expr),
    /// A `let` statement, possibly declaring several variables.
    Variable(Vec<VariableDecl>),
    /// A `constant` declaration.
    Constant { name: String, value: Expr },
    /// A `return` statement; `return;` carries no expression.
    Return(Option<Expr>),
    If {
        test: Expr,
        consequent: Box<Statement>,
        alternate: Option<Box<Statement>>,
    },
    While {
        test: Expr,
        body: Box<Statement>,
    },
    DoWhile {
        body: Box<Statement>,
        test: Expr,
    },
    ForEach {
        item: String,
        list: Expr,
        body: Box<Statement>,
    },
    /// A standalone `map` statement; rewrites the source variable with the
    /// mapped array.
    Map {
        item: String,
        list: Expr,
        body: Vec<Statement>,
    },
    /// A standalone `filter` statement; rewrites the source variable with the
    /// filtered array.
    Filter {
        item: String,
        list: Expr,
        test: Expr,
    },
    FunctionDecl {
        name: String,
        params: Vec<Param>,
        return_type: Option<VarType>,
        body: Vec<Statement>,
    },
    /// An invocation of a registered custom block: `name { ... }`. The body
    /// is compiled together with the statements preceding it.
    CustomBlock { name: String, body: Vec<Statement> },
}

/// A function parameter with an optional declared type.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub var_type: Option<VarType>,
}

/// One `name : type = init` clause of a `let` statement.
#[derive(Debug, Clone)]
pub struct VariableDecl {
    pub name: String,
    pub var_type: VarType,
    /// Element type for array declarations like `let xs : integer[] = ...`.
    pub sub_type: Option<VarType>,
    pub init: Option<Expr>,
}

/// An expression.
#[derive(Debug, Clone)]
pub enum Expr {
    Identifier(String),
    Number {
        value: f64,
        /// Whether the literal was written with a decimal point (or in a
        /// float-typed context); governs integer truncation.
        has_decimals: bool,
    },
    Str(String),
    Bool(bool),
    Null,
    /// The whole input value, spelled `payload`.
    Payload,
    /// A spreadsheet range address such as `A1:B10`.
    RangeAddr(String),
    /// A spreadsheet row address such as `row:3`.
    RowAddr(String),
    /// A spreadsheet column address such as `column:B`.
    ColumnAddr(String),
    Array(Vec<Expr>),
    /// An embedded markup expression, already parsed by the collaborator.
    Markup(MarkupTree),
    Member {
        object: Box<Expr>,
        property: Box<Expr>,
        /// True for `a[i]`, false for `a.b`.
        computed: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Assignment {
        op: AssignOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// A `map x in xs { ... }` expression; the block's last expression is the
    /// mapped value.
    MapExpr {
        item: String,
        list: Box<Expr>,
        body: Vec<Statement>,
    },
    /// A `filter x in xs where test` expression.
    Filter {
        item: String,
        list: Box<Expr>,
        test: Box<Expr>,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}
impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Add => "+",
                Self::Sub => "-",
                Self::Mul => "*",
                Self::Div => "/",
                Self::Mod => "%",
                Self::Eq => "==",
                Self::Neq => "!=",
                Self::Lt => "<",
                Self::Lte => "<=",
                Self::Gt => ">",
                Self::Gte => ">=",
            }
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Xor,
    Shr,
    ShrUnsigned,
}
impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::And => "&&",
                Self::Or => "||",
                Self::Xor => "xor",
                Self::Shr => ">>",
                Self::ShrUnsigned => ">>>",
            }
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
}
impl fmt::Display for AssignOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Assign => "=",
                Self::AddAssign => "+=",
                Self::SubAssign => "-=",
                Self::MulAssign => "*=",
                Self::DivAssign => "/=",
            }
        )
    }
}
