//! Recursive-descent parser
//!
//! Precedence, loosest first: `or`, `and`, equality, comparison, `+ -`,
//! `* / %`, unary `- not`, then postfix calls, field access and indexing.
//! Statement terminators (`;`) are optional.

use super::ast::*;
use super::errors::ParseError;
use super::lexer::{Token, TokenKind};
use crate::util::span::{Position, Span};
use crate::util::Spanned;

/// Most arguments a call may pass.
pub const MAX_ARGS: usize = 255;

/// Deepest nesting of parenthesized expressions, unary operators and
/// blocks, counted together.
pub const MAX_DEPTH: usize = 128;

/// Parse a token stream that ends with `Eof`.
pub fn parse(tokens: &[Token]) -> Result<Program, ParseError> {
    let mut parser = Parser::new(tokens);
    let mut statements = Vec::new();
    while !parser.check(&TokenKind::Eof) {
        statements.push(parser.statement()?);
    }
    Ok(Program { statements })
}

/// Parse a single expression, rejecting trailing input.
pub fn parse_expression(tokens: &[Token]) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(tokens);
    let expr = parser.expression()?;
    if !parser.check(&TokenKind::Eof) {
        return Err(parser.unexpected("end of expression"));
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [Token],
    current: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            current: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> &TokenKind {
        self.tokens
            .get(self.current)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn peek_next(&self) -> &TokenKind {
        self.tokens
            .get(self.current + 1)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn span(&self) -> Span {
        self.tokens
            .get(self.current)
            .or_else(|| self.tokens.last())
            .map(|t| t.span)
            .unwrap_or_default()
    }

    fn position(&self) -> Position {
        self.span().start
    }

    fn previous_end(&self) -> Position {
        self.current
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.span.end)
            .unwrap_or_default()
    }

    fn check(
        &self,
        kind: &TokenKind,
    ) -> bool {
        self.peek() == kind
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.current);
        if token.is_some() {
            self.current += 1;
        }
        token
    }

    fn eat(
        &mut self,
        kind: &TokenKind,
    ) -> bool {
        if self.check(kind) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn expect(
        &mut self,
        kind: &TokenKind,
    ) -> Result<(), ParseError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected(&kind.to_string()))
        }
    }

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.current += 1;
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn unexpected(
        &self,
        expected: &str,
    ) -> ParseError {
        ParseError::new(
            self.position(),
            format!("expected {}, found {}", expected, self.peek()),
        )
    }

    /// Run `rule` one nesting level deeper, failing past [`MAX_DEPTH`].
    fn nested<T>(
        &mut self,
        what: &str,
        rule: fn(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(ParseError::new(
                self.position(),
                format!("{} nested too deeply", what),
            ));
        }
        self.depth += 1;
        let result = rule(self);
        self.depth -= 1;
        result
    }

    fn spanned<T>(
        &self,
        value: T,
        start: Position,
    ) -> Spanned<T> {
        Spanned::new(value, Span::new(start, self.previous_end()))
    }

    // ---- statements ----

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.position();
        let kind = match self.peek() {
            TokenKind::KwLet => {
                self.advance();
                let name = self.expect_identifier()?;
                self.expect(&TokenKind::Eq)?;
                let value = self.expression()?;
                StmtKind::Let { name, value }
            }
            TokenKind::KwFn if matches!(self.peek_next(), TokenKind::Identifier(_)) => {
                self.advance();
                let name = self.expect_identifier()?;
                StmtKind::Function(self.function_rest(Some(name), start)?)
            }
            TokenKind::KwIf => return self.if_statement(),
            TokenKind::KwWhile => {
                self.advance();
                let condition = self.expression()?;
                let body = self.block()?;
                StmtKind::While { condition, body }
            }
            TokenKind::KwReturn => {
                self.advance();
                let value = match self.peek() {
                    TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof => None,
                    _ => Some(self.expression()?),
                };
                StmtKind::Return(value)
            }
            _ => {
                let expr = self.expression()?;
                if self.eat(&TokenKind::Eq) {
                    let target = Self::assign_target(expr)?;
                    let value = self.expression()?;
                    StmtKind::Assign { target, value }
                } else {
                    StmtKind::Expr(expr)
                }
            }
        };
        self.eat(&TokenKind::Semicolon);
        Ok(self.spanned(kind, start))
    }

    fn assign_target(expr: Expr) -> Result<AssignTarget, ParseError> {
        match expr.value {
            ExprKind::Var(name) => Ok(AssignTarget::Var(name)),
            ExprKind::Field { object, name } => Ok(AssignTarget::Field {
                object: *object,
                name,
            }),
            _ => Err(ParseError::new(expr.span.start, "invalid assignment target")),
        }
    }

    fn if_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.position();
        self.expect(&TokenKind::KwIf)?;
        let condition = self.expression()?;
        let then_branch = self.block()?;
        let else_branch = if self.eat(&TokenKind::KwElse) {
            if self.check(&TokenKind::KwIf) {
                Some(vec![self.if_statement()?])
            } else {
                Some(self.block()?)
            }
        } else {
            None
        };
        self.eat(&TokenKind::Semicolon);
        Ok(self.spanned(
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
            start,
        ))
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.nested("block", Self::block_body)
    }

    fn block_body(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(&TokenKind::LBrace)?;
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::Eof) {
                return Err(self.unexpected("'}'"));
            }
            statements.push(self.statement()?);
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(statements)
    }

    /// Parameter list and body, after `fn` and the optional name.
    fn function_rest(
        &mut self,
        name: Option<String>,
        start: Position,
    ) -> Result<FunctionDecl, ParseError> {
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let param = self.expect_identifier()?;
                if params.contains(&param) {
                    return Err(ParseError::new(
                        self.previous_end(),
                        format!("duplicate parameter '{}'", param),
                    ));
                }
                params.push(param);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        if params.len() > MAX_ARGS {
            return Err(ParseError::new(start, "too many parameters"));
        }
        self.expect(&TokenKind::RParen)?;
        let body = self.block()?;
        Ok(FunctionDecl {
            name,
            params,
            body,
            span: Span::new(start, self.previous_end()),
        })
    }

    // ---- expressions ----

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.nested("expression", Self::or)
    }

    fn or(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.and()?;
        while self.eat(&TokenKind::KwOr) {
            let rhs = self.and()?;
            let span = expr.span.merge(rhs.span);
            expr = Spanned::new(
                ExprKind::Logical {
                    op: LogicalOp::Or,
                    lhs: Box::new(expr),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.equality()?;
        while self.eat(&TokenKind::KwAnd) {
            let rhs = self.equality()?;
            let span = expr.span.merge(rhs.span);
            expr = Spanned::new(
                ExprKind::Logical {
                    op: LogicalOp::And,
                    lhs: Box::new(expr),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        Ok(expr)
    }

    fn binary_level(
        &mut self,
        operators: &[(TokenKind, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let mut expr = next(self)?;
        'outer: loop {
            for (token, op) in operators {
                if self.eat(token) {
                    let rhs = next(self)?;
                    let span = expr.span.merge(rhs.span);
                    expr = Spanned::new(
                        ExprKind::Binary {
                            op: *op,
                            lhs: Box::new(expr),
                            rhs: Box::new(rhs),
                        },
                        span,
                    );
                    continue 'outer;
                }
            }
            return Ok(expr);
        }
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            &[(TokenKind::EqEq, BinaryOp::Eq), (TokenKind::Neq, BinaryOp::Ne)],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            &[
                (TokenKind::Lt, BinaryOp::Lt),
                (TokenKind::Le, BinaryOp::Le),
                (TokenKind::Gt, BinaryOp::Gt),
                (TokenKind::Ge, BinaryOp::Ge),
            ],
            Self::term,
        )
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            &[(TokenKind::Plus, BinaryOp::Add), (TokenKind::Minus, BinaryOp::Sub)],
            Self::factor,
        )
    }

    fn factor(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            &[
                (TokenKind::Star, BinaryOp::Mul),
                (TokenKind::Slash, BinaryOp::Div),
                (TokenKind::Percent, BinaryOp::Mod),
            ],
            Self::unary,
        )
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let start = self.position();
        let op = match self.peek() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::KwNot => UnaryOp::Not,
            _ => return self.postfix(),
        };
        self.advance();
        let operand = self.nested("expression", Self::unary)?;
        Ok(self.spanned(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            start,
        ))
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let start = self.position();
        let mut expr = self.primary()?;
        loop {
            if self.eat(&TokenKind::LParen) {
                let args = self.arguments()?;
                expr = self.spanned(
                    ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                    start,
                );
            } else if self.eat(&TokenKind::Dot) {
                let name = self.expect_identifier()?;
                expr = self.spanned(
                    ExprKind::Field {
                        object: Box::new(expr),
                        name,
                    },
                    start,
                );
            } else if self.eat(&TokenKind::LBracket) {
                let index = self.expression()?;
                self.expect(&TokenKind::RBracket)?;
                expr = self.spanned(
                    ExprKind::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    },
                    start,
                );
            } else {
                return Ok(expr);
            }
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.expression()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        if args.len() > MAX_ARGS {
            return Err(ParseError::new(self.position(), "too many arguments"));
        }
        self.expect(&TokenKind::RParen)?;
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let start = self.position();
        let kind = match self.peek().clone() {
            TokenKind::KwNil => ExprKind::Nil,
            TokenKind::KwTrue => ExprKind::Bool(true),
            TokenKind::KwFalse => ExprKind::Bool(false),
            TokenKind::Number(n) => ExprKind::Number(n),
            TokenKind::Str(s) => ExprKind::Str(s),
            TokenKind::Identifier(name) => ExprKind::Var(name),
            TokenKind::LParen => {
                self.advance();
                let expr = self.expression()?;
                self.expect(&TokenKind::RParen)?;
                return Ok(expr);
            }
            TokenKind::KwFn => {
                self.advance();
                let decl = self.function_rest(None, start)?;
                return Ok(self.spanned(ExprKind::Function(Box::new(decl)), start));
            }
            _ => return Err(self.unexpected("expression")),
        };
        self.advance();
        Ok(self.spanned(kind, start))
    }
}
