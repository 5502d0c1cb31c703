//! Functions for parsing tokens into an AST.
//!
//! A hand-written recursive descent parser with a small token buffer. One
//! token of lookahead suffices everywhere except at the start of a
//! statement, where a registered custom-block name followed by `{` must be
//! told apart from an ordinary expression.

use crate::ast::*;
use crate::errors::*;
use crate::lexer::{Token, TokenKind, Tokenizer};
use crate::types::VarType;
use crate::CompileOptions;
use LangErrorMsg::*;

/// Parses source code into a program AST.
pub fn parse(source: &str, options: &CompileOptions) -> LangResult<Program> {
    Parser::new(source, options).parse_program()
}

struct Parser<'a> {
    tokenizer: Tokenizer,
    /// Tokens read ahead of the cursor; index 0 is next.
    buffered: Vec<Token>,
    options: &'a CompileOptions,
}

impl<'a> Parser<'a> {
    fn new(source: &str, options: &'a CompileOptions) -> Self {
        Self {
            tokenizer: Tokenizer::new(source),
            buffered: Vec::new(),
            options,
        }
    }

    /// Peeks `n` tokens ahead without consuming anything.
    fn peek(&mut self, n: usize) -> LangResult<Option<&Token>> {
        while self.buffered.len() <= n {
            match self.tokenizer.next_token()? {
                Some(token) => self.buffered.push(token),
                None => break,
            }
        }
        Ok(self.buffered.get(n))
    }

    fn peek_kind(&mut self) -> LangResult<Option<TokenKind>> {
        Ok(self.peek(0)?.map(|t| t.kind))
    }

    fn next(&mut self) -> LangResult<Option<Token>> {
        self.peek(0)?;
        if self.buffered.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.buffered.remove(0)))
        }
    }

    /// Consumes the next token, which must have the given kind.
    fn eat(&mut self, kind: TokenKind) -> LangResult<Token> {
        match self.next()? {
            Some(t) if t.kind == kind => Ok(t),
            Some(t) => Err(UnexpectedToken {
                got: t.text.clone(),
                expected: kind.name(),
            }
            .with_span(&t)),
            None => Err(UnexpectedEndOfInput {
                expected: kind.name(),
            }
            .without_span()),
        }
    }

    /// Consumes the next token if it has the given kind.
    fn eat_if(&mut self, kind: TokenKind) -> LangResult<bool> {
        if self.peek_kind()? == Some(kind) {
            self.next()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Consumes a statement-terminating semicolon. The final statement of a
    /// program or block may leave it off.
    fn eat_terminator(&mut self) -> LangResult<()> {
        match self.peek_kind()? {
            Some(TokenKind::Semicolon) => {
                self.next()?;
                Ok(())
            }
            Some(TokenKind::RBrace) | None => Ok(()),
            Some(_) => {
                let t = self.peek(0)?.unwrap();
                Err(UnexpectedToken {
                    got: t.text.clone(),
                    expected: "';'",
                }
                .with_span(t))
            }
        }
    }

    fn parse_program(&mut self) -> LangResult<Program> {
        let mut body = Vec::new();
        while self.peek_kind()?.is_some() {
            body.push(self.statement()?);
        }
        Ok(Program { body })
    }

    fn statement(&mut self) -> LangResult<Statement> {
        match self.peek_kind()? {
            Some(TokenKind::Semicolon) => {
                self.next()?;
                Ok(Statement::Empty)
            }
            Some(TokenKind::LBrace) => Ok(Statement::Block(self.block()?)),
            Some(TokenKind::Let) => self.variable_statement(),
            Some(TokenKind::Constant) => self.constant_statement(),
            Some(TokenKind::If) => self.if_statement(),
            Some(TokenKind::While) => self.while_statement(),
            Some(TokenKind::Do) => self.do_while_statement(),
            Some(TokenKind::ForEach) => self.for_each_statement(),
            Some(TokenKind::Map) => self.map_statement(),
            Some(TokenKind::Filter) => self.filter_statement(),
            Some(TokenKind::Function) => self.function_declaration(),
            Some(TokenKind::Return) => self.return_statement(),
            Some(TokenKind::Identifier) => {
                // An identifier directly followed by `{` is a custom block
                // invocation; whether the name is registered is checked
                // during code generation.
                let is_block = self.peek(1)?.map(|t| t.kind) == Some(TokenKind::LBrace);
                if is_block {
                    let name = self.eat(TokenKind::Identifier)?.text;
                    let body = self.block()?;
                    Ok(Statement::CustomBlock { name, body })
                } else {
                    self.expression_statement()
                }
            }
            Some(_) => self.expression_statement(),
            None => Err(UnexpectedEndOfInput {
                expected: "statement",
            }
            .without_span()),
        }
    }

    /// A `{ ... }` statement list.
    fn block(&mut self) -> LangResult<Vec<Statement>> {
        self.eat(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !matches!(self.peek_kind()?, Some(TokenKind::RBrace) | None) {
            stmts.push(self.statement()?);
        }
        self.eat(TokenKind::RBrace)?;
        Ok(stmts)
    }

    fn block_statement(&mut self) -> LangResult<Statement> {
        Ok(Statement::Block(self.block()?))
    }

    fn expression_statement(&mut self) -> LangResult<Statement> {
        let expr = self.expression()?;
        self.eat_terminator()?;
        Ok(Statement::Expression(expr))
    }

    fn variable_statement(&mut self) -> LangResult<Statement> {
        self.eat(TokenKind::Let)?;
        let mut decls = vec![self.variable_decl()?];
        while self.eat_if(TokenKind::Comma)? {
            decls.push(self.variable_decl()?);
        }
        self.eat_terminator()?;
        Ok(Statement::Variable(decls))
    }

    fn variable_decl(&mut self) -> LangResult<VariableDecl> {
        let name = self.eat(TokenKind::Identifier)?.text;
        let mut var_type = None;
        let mut sub_type = None;
        if self.eat_if(TokenKind::Colon)? {
            let base = self.type_annotation()?;
            if self.eat_if(TokenKind::LBracket)? {
                self.eat(TokenKind::RBracket)?;
                var_type = Some(VarType::Array);
                sub_type = Some(base);
            } else {
                var_type = Some(base);
            }
        }
        let init = if self.eat_if(TokenKind::SimpleAssign)? {
            Some(self.expression()?)
        } else {
            None
        };
        // Untyped declarations default to float, except that an array
        // literal initializer makes the variable an array.
        let var_type = var_type.unwrap_or(match init {
            Some(Expr::Array(_)) => VarType::Array,
            _ => VarType::Float,
        });
        Ok(VariableDecl {
            name,
            var_type,
            sub_type,
            init,
        })
    }

    fn type_annotation(&mut self) -> LangResult<VarType> {
        match self.next()? {
            Some(t) => match t.kind {
                TokenKind::IntegerType | TokenKind::LongintType => Ok(VarType::Integer),
                TokenKind::FloatType => Ok(VarType::Float),
                TokenKind::StringType => Ok(VarType::String),
                TokenKind::BooleanType => Ok(VarType::Boolean),
                TokenKind::RangeType => Ok(VarType::Range),
                _ => Err(UnexpectedToken {
                    got: t.text.clone(),
                    expected: "type name",
                }
                .with_span(&t)),
            },
            None => Err(UnexpectedEndOfInput {
                expected: "type name",
            }
            .without_span()),
        }
    }

    fn constant_statement(&mut self) -> LangResult<Statement> {
        self.eat(TokenKind::Constant)?;
        let name = self.eat(TokenKind::Identifier)?.text;
        self.eat(TokenKind::SimpleAssign)?;
        let value = self.expression()?;
        self.eat_terminator()?;
        Ok(Statement::Constant { name, value })
    }

    fn if_statement(&mut self) -> LangResult<Statement> {
        self.eat(TokenKind::If)?;
        self.eat(TokenKind::LParen)?;
        let test = self.expression()?;
        self.eat(TokenKind::RParen)?;
        let consequent = Box::new(self.statement()?);
        let alternate = if self.eat_if(TokenKind::Else)? {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Statement::If {
            test,
            consequent,
            alternate,
        })
    }

    fn while_statement(&mut self) -> LangResult<Statement> {
        self.eat(TokenKind::While)?;
        self.eat(TokenKind::LParen)?;
        let test = self.expression()?;
        self.eat(TokenKind::RParen)?;
        let body = Box::new(self.block_statement()?);
        Ok(Statement::While { test, body })
    }

    fn do_while_statement(&mut self) -> LangResult<Statement> {
        self.eat(TokenKind::Do)?;
        let body = Box::new(self.block_statement()?);
        self.eat(TokenKind::While)?;
        self.eat(TokenKind::LParen)?;
        let test = self.expression()?;
        self.eat(TokenKind::RParen)?;
        self.eat_terminator()?;
        Ok(Statement::DoWhile { body, test })
    }

    fn for_each_statement(&mut self) -> LangResult<Statement> {
        self.eat(TokenKind::ForEach)?;
        let item = self.eat(TokenKind::Identifier)?.text;
        self.eat(TokenKind::In)?;
        let list = self.expression()?;
        let body = Box::new(self.block_statement()?);
        Ok(Statement::ForEach { item, list, body })
    }

    fn map_statement(&mut self) -> LangResult<Statement> {
        self.eat(TokenKind::Map)?;
        let item = self.eat(TokenKind::Identifier)?.text;
        self.eat(TokenKind::In)?;
        let list = self.expression()?;
        // `to` before the body is optional.
        self.eat_if(TokenKind::To)?;
        let body = self.block()?;
        Ok(Statement::Map { item, list, body })
    }

    fn filter_statement(&mut self) -> LangResult<Statement> {
        self.eat(TokenKind::Filter)?;
        let item = self.eat(TokenKind::Identifier)?.text;
        self.eat(TokenKind::In)?;
        let list = self.expression()?;
        self.eat(TokenKind::Where)?;
        let test = self.expression()?;
        self.eat_terminator()?;
        Ok(Statement::Filter { item, list, test })
    }

    fn function_declaration(&mut self) -> LangResult<Statement> {
        self.eat(TokenKind::Function)?;
        let name = self.eat(TokenKind::Identifier)?.text;
        self.eat(TokenKind::LParen)?;
        let mut params = Vec::new();
        if self.peek_kind()? != Some(TokenKind::RParen) {
            loop {
                let name = self.eat(TokenKind::Identifier)?.text;
                let var_type = if self.eat_if(TokenKind::Colon)? {
                    Some(self.type_annotation()?)
                } else {
                    None
                };
                params.push(Param { name, var_type });
                if !self.eat_if(TokenKind::Comma)? {
                    break;
                }
            }
        }
        self.eat(TokenKind::RParen)?;
        let return_type = if self.eat_if(TokenKind::Colon)? {
            Some(self.type_annotation()?)
        } else {
            None
        };
        let body = self.block()?;
        Ok(Statement::FunctionDecl {
            name,
            params,
            return_type,
            body,
        })
    }

    fn return_statement(&mut self) -> LangResult<Statement> {
        self.eat(TokenKind::Return)?;
        let expr = match self.peek_kind()? {
            Some(TokenKind::Semicolon) | Some(TokenKind::RBrace) | None => None,
            _ => Some(self.expression()?),
        };
        self.eat_terminator()?;
        Ok(Statement::Return(expr))
    }

    // Expression precedence cascade, loosest first.

    fn expression(&mut self) -> LangResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> LangResult<Expr> {
        let left = self.logical_or()?;
        let op = match self.peek_kind()? {
            Some(TokenKind::SimpleAssign) => AssignOp::Assign,
            Some(TokenKind::ComplexAssign) => {
                match self.peek(0)?.unwrap().text.as_str() {
                    "+=" => AssignOp::AddAssign,
                    "-=" => AssignOp::SubAssign,
                    "*=" => AssignOp::MulAssign,
                    _ => AssignOp::DivAssign,
                }
            }
            _ => return Ok(left),
        };
        let op_token = self.next()?.unwrap();
        if !matches!(left, Expr::Identifier(_) | Expr::Member { .. }) {
            return Err(InvalidAssignmentTarget.with_span(&op_token));
        }
        // Right-associative.
        let right = self.assignment()?;
        Ok(Expr::Assignment {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn logical_or(&mut self) -> LangResult<Expr> {
        let mut left = self.logical_and()?;
        while matches!(
            self.peek_kind()?,
            Some(TokenKind::LogicalOr) | Some(TokenKind::OrKeyword)
        ) {
            self.next()?;
            let right = self.logical_and()?;
            left = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn logical_and(&mut self) -> LangResult<Expr> {
        let mut left = self.logical_xor()?;
        while matches!(
            self.peek_kind()?,
            Some(TokenKind::LogicalAnd) | Some(TokenKind::AndKeyword)
        ) {
            self.next()?;
            let right = self.logical_xor()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn logical_xor(&mut self) -> LangResult<Expr> {
        let mut left = self.shift()?;
        while self.peek_kind()? == Some(TokenKind::XorKeyword) {
            self.next()?;
            let right = self.shift()?;
            left = Expr::Logical {
                op: LogicalOp::Xor,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn shift(&mut self) -> LangResult<Expr> {
        let mut left = self.equality()?;
        loop {
            let op = match self.peek_kind()? {
                Some(TokenKind::ShiftRight) => LogicalOp::Shr,
                Some(TokenKind::ShiftRightUnsigned) => LogicalOp::ShrUnsigned,
                _ => return Ok(left),
            };
            self.next()?;
            let right = self.equality()?;
            left = Expr::Logical {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn equality(&mut self) -> LangResult<Expr> {
        let mut left = self.relational()?;
        while self.peek_kind()? == Some(TokenKind::EqualityOp) {
            let token = self.next()?.unwrap();
            let op = if token.text == "==" {
                BinaryOp::Eq
            } else {
                BinaryOp::Neq
            };
            let right = self.relational()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn relational(&mut self) -> LangResult<Expr> {
        let mut left = self.additive()?;
        while self.peek_kind()? == Some(TokenKind::RelationalOp) {
            let token = self.next()?.unwrap();
            let op = match token.text.as_str() {
                "<" => BinaryOp::Lt,
                "<=" => BinaryOp::Lte,
                ">" => BinaryOp::Gt,
                _ => BinaryOp::Gte,
            };
            let right = self.additive()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn additive(&mut self) -> LangResult<Expr> {
        let mut left = self.multiplicative()?;
        while self.peek_kind()? == Some(TokenKind::AdditiveOp) {
            let token = self.next()?.unwrap();
            let op = if token.text == "+" {
                BinaryOp::Add
            } else {
                BinaryOp::Sub
            };
            let right = self.multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> LangResult<Expr> {
        let mut left = self.unary()?;
        while self.peek_kind()? == Some(TokenKind::MultiplicativeOp) {
            let token = self.next()?.unwrap();
            let op = match token.text.as_str() {
                "*" => BinaryOp::Mul,
                "/" => BinaryOp::Div,
                _ => BinaryOp::Mod,
            };
            let right = self.unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> LangResult<Expr> {
        match self.peek_kind()? {
            Some(TokenKind::AdditiveOp) => {
                let token = self.next()?.unwrap();
                let op = if token.text == "-" {
                    UnaryOp::Neg
                } else {
                    UnaryOp::Pos
                };
                let operand = self.unary()?;
                Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                })
            }
            Some(TokenKind::LogicalNot) => {
                self.next()?;
                let operand = self.unary()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                })
            }
            _ => self.call_member(),
        }
    }

    /// Postfix call, member and index expressions.
    fn call_member(&mut self) -> LangResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            match self.peek_kind()? {
                Some(TokenKind::LParen) => {
                    self.next()?;
                    let mut args = Vec::new();
                    if self.peek_kind()? != Some(TokenKind::RParen) {
                        loop {
                            args.push(self.expression()?);
                            if !self.eat_if(TokenKind::Comma)? {
                                break;
                            }
                        }
                    }
                    self.eat(TokenKind::RParen)?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                Some(TokenKind::Dot) => {
                    self.next()?;
                    let prop = self.property_name()?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property: Box::new(Expr::Identifier(prop)),
                        computed: false,
                    };
                }
                Some(TokenKind::LBracket) => {
                    self.next()?;
                    let index = self.expression()?;
                    self.eat(TokenKind::RBracket)?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property: Box::new(index),
                        computed: true,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    /// A property name after `.`. Keywords are allowed here, so `xs.filter`
    /// and `row.to` read as plain field accesses.
    fn property_name(&mut self) -> LangResult<String> {
        match self.next()? {
            Some(t) if t.kind == TokenKind::Identifier => Ok(t.text),
            // Keyword tokens all match `\w+`, so their text is a valid name.
            Some(t) if t.text.chars().all(|c| c.is_alphanumeric() || c == '_') => Ok(t.text),
            Some(t) => Err(UnexpectedToken {
                got: t.text.clone(),
                expected: "property name",
            }
            .with_span(&t)),
            None => Err(UnexpectedEndOfInput {
                expected: "property name",
            }
            .without_span()),
        }
    }

    fn primary(&mut self) -> LangResult<Expr> {
        let token = match self.peek(0)? {
            Some(t) => t.clone(),
            None => {
                return Err(UnexpectedEndOfInput {
                    expected: "expression",
                }
                .without_span())
            }
        };
        match token.kind {
            TokenKind::LParen => {
                self.next()?;
                let expr = self.expression()?;
                self.eat(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::Number => {
                self.next()?;
                let value: f64 = token.text.parse().map_err(|_| {
                    InternalError("unparseable number literal".into()).with_span(&token)
                })?;
                Ok(Expr::Number {
                    value,
                    has_decimals: token.text.contains('.'),
                })
            }
            TokenKind::HexNumber => {
                self.next()?;
                let value = i64::from_str_radix(&token.text[2..], 16).map_err(|_| {
                    InternalError("unparseable hex literal".into()).with_span(&token)
                })?;
                Ok(Expr::Number {
                    value: value as f64,
                    has_decimals: false,
                })
            }
            TokenKind::Str => {
                self.next()?;
                let inner = token.text[1..token.text.len() - 1].to_owned();
                Ok(Expr::Str(inner))
            }
            TokenKind::True => {
                self.next()?;
                Ok(Expr::Bool(true))
            }
            TokenKind::False => {
                self.next()?;
                Ok(Expr::Bool(false))
            }
            TokenKind::Null => {
                self.next()?;
                Ok(Expr::Null)
            }
            TokenKind::Payload => {
                self.next()?;
                Ok(Expr::Payload)
            }
            TokenKind::Identifier => {
                self.next()?;
                Ok(Expr::Identifier(token.text))
            }
            TokenKind::RangeAddr => {
                self.next()?;
                Ok(Expr::RangeAddr(token.text))
            }
            TokenKind::RowAddr => {
                self.next()?;
                Ok(Expr::RowAddr(token.text))
            }
            TokenKind::ColumnAddr => {
                self.next()?;
                Ok(Expr::ColumnAddr(token.text))
            }
            TokenKind::LBracket => {
                self.next()?;
                let mut elems = Vec::new();
                if self.peek_kind()? != Some(TokenKind::RBracket) {
                    loop {
                        elems.push(self.expression()?);
                        if !self.eat_if(TokenKind::Comma)? {
                            break;
                        }
                    }
                }
                self.eat(TokenKind::RBracket)?;
                Ok(Expr::Array(elems))
            }
            TokenKind::Map => {
                self.next()?;
                let item = self.eat(TokenKind::Identifier)?.text;
                self.eat(TokenKind::In)?;
                let list = self.expression()?;
                self.eat_if(TokenKind::To)?;
                let body = self.block()?;
                Ok(Expr::MapExpr {
                    item,
                    list: Box::new(list),
                    body,
                })
            }
            TokenKind::Filter => {
                self.next()?;
                let item = self.eat(TokenKind::Identifier)?.text;
                self.eat(TokenKind::In)?;
                let list = self.expression()?;
                self.eat(TokenKind::Where)?;
                let test = self.expression()?;
                Ok(Expr::Filter {
                    item,
                    list: Box::new(list),
                    test: Box::new(test),
                })
            }
            TokenKind::RelationalOp if token.text == "<" => self.markup_expression(),
            _ => Err(UnexpectedToken {
                got: token.text.clone(),
                expected: "expression",
            }
            .with_span(&token)),
        }
    }

    /// Hands the rest of the input to the markup collaborator and
    /// re-synchronizes the tokenizer on whatever it did not consume.
    fn markup_expression(&mut self) -> LangResult<Expr> {
        let token = self.next()?.unwrap();
        let parser = match (&self.options.markup, self.options.support_markup) {
            (Some(p), true) => p.clone(),
            _ => {
                return Err(UnexpectedToken {
                    got: token.text.clone(),
                    expected: "expression",
                }
                .with_span(&token))
            }
        };
        // The `<` token is already consumed; reattach it so the collaborator
        // sees the full markup text.
        let input = format!("<{}", self.tokenizer.leftover());
        let result = parser.parse_markup(&input)?;
        self.tokenizer.set_leftover(result.leftover);
        self.buffered.clear();
        Ok(Expr::Markup(result.tree))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_default(source: &str) -> LangResult<Program> {
        parse(source, &CompileOptions::default())
    }

    #[test]
    fn test_precedence() {
        let program = parse_default("1 + 2 * 3").unwrap();
        match &program.body[0] {
            Statement::Expression(Expr::Binary {
                op: BinaryOp::Add,
                right,
                ..
            }) => {
                assert!(matches!(
                    &**right,
                    Expr::Binary {
                        op: BinaryOp::Mul,
                        ..
                    }
                ));
            }
            other => panic!("unexpected AST: {:?}", other),
        }
    }

    #[test]
    fn test_trailing_semicolon_optional() {
        assert!(parse_default("let a = 1; a + 2").is_ok());
        assert!(parse_default("let a = 1; a + 2;").is_ok());
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse_default("1 = 2;").unwrap_err();
        assert!(matches!(err.msg, InvalidAssignmentTarget));
    }

    #[test]
    fn test_member_and_call_chains() {
        let program = parse_default("payload.items[0].total").unwrap();
        assert!(matches!(
            &program.body[0],
            Statement::Expression(Expr::Member { .. })
        ));
        let program = parse_default("max(min(a, b), 3)").unwrap();
        assert!(matches!(
            &program.body[0],
            Statement::Expression(Expr::Call { .. })
        ));
    }

    #[test]
    fn test_missing_paren() {
        let err = parse_default("if (a > 1 { 2; }").unwrap_err();
        assert!(matches!(err.msg, UnexpectedToken { .. }));
    }
}
