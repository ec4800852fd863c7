//! Recursive-descent parser for O.
//!
//! One token of lookahead by default, plus `la(k)` for `k` in `1..=3`. Key
//! behaviours: class-boundary recovery, keyword-as-identifier relaxation,
//! and the assignment-target lookahead that distinguishes `name := expr` /
//! `this.name := expr` from an expression statement.

use crate::ast::*;
use crate::diagnostics::Diagnostic;
use crate::lexer::{tokenize, Token, TokenKind, RELAXABLE_KEYWORDS};
use crate::types::TypeName;

/// Token kinds the parser accepts in place of a plain `Identifier` when
/// context (the next required token) disambiguates. Mirrors
/// [`RELAXABLE_KEYWORDS`] but as `TokenKind`s for fast matching; `This` is
/// handled separately since it also has its own expression meaning.
fn is_relaxable_identifier_kind(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Loop
            | TokenKind::While
            | TokenKind::If
            | TokenKind::Then
            | TokenKind::Else
            | TokenKind::End
            | TokenKind::Class
            | TokenKind::Var
            | TokenKind::Method
            | TokenKind::Return
            | TokenKind::Is
            | TokenKind::Extends
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Identifier
    )
}

/// Tokens that terminate expression parsing in the absence of an explicit
/// separator, both at the top level and after a completed postfix chain.
/// The recursive-descent grammar is self-terminating (it only continues on
/// `(` or `.`), so this set is not consulted to stop parsing; it documents
/// the contract and is used to produce better diagnostics.
pub const TERMINATION_SET: &[TokenKind] = &[
    TokenKind::Loop,
    TokenKind::Then,
    TokenKind::End,
    TokenKind::Else,
    TokenKind::Class,
    TokenKind::While,
    TokenKind::If,
    TokenKind::Return,
    TokenKind::Var,
    TokenKind::RParen,
    TokenKind::Comma,
    TokenKind::RBracket,
];

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

pub fn parse(source: &str) -> Result<Program, Diagnostic> {
    Parser::new(source).parse_program()
}

impl Parser {
    pub fn new(source: &str) -> Self {
        Parser {
            tokens: tokenize(source),
            pos: 0,
        }
    }

    // ---- token-stream primitives -----------------------------------------

    fn la(&self, k: usize) -> TokenKind {
        debug_assert!((1..=3).contains(&k));
        self.tokens
            .get(self.pos + k - 1)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn peek_kind(&self) -> TokenKind {
        self.la(1)
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let tok = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn err(&self, message: impl Into<String>) -> Diagnostic {
        Diagnostic::syntax(self.pos, message)
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, Diagnostic> {
        if self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.err(format!(
                "expected {}, found '{}'",
                what,
                self.current().lexeme
            )))
        }
    }

    /// Consume an `Identifier`, or a relaxed keyword used as one, returning
    /// its lexeme.
    fn expect_name(&mut self) -> Result<String, Diagnostic> {
        if is_relaxable_identifier_kind(self.peek_kind()) {
            Ok(self.advance().lexeme)
        } else {
            Err(self.err(format!(
                "expected identifier, found '{}'",
                self.current().lexeme
            )))
        }
    }

    // ---- top level ---------------------------------------------------------

    pub fn parse_program(&mut self) -> Result<Program, Diagnostic> {
        let mut program = Program::new();
        while self.peek_kind() != TokenKind::Eof {
            if self.peek_kind() != TokenKind::Class {
                return Err(self.err(format!(
                    "expected 'class', found '{}'",
                    self.current().lexeme
                )));
            }
            program.classes.push(self.parse_class()?);
        }
        Ok(program)
    }

    fn parse_class(&mut self) -> Result<ClassDecl, Diagnostic> {
        self.expect(TokenKind::Class, "'class'")?;
        let name = self.expect_name()?;
        let base = if self.peek_kind() == TokenKind::Extends {
            self.advance();
            Some(self.expect_name()?)
        } else {
            None
        };
        self.expect(TokenKind::Is, "'is'")?;

        let mut members = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::End => {
                    self.advance();
                    break;
                }
                // Class boundary recovery: a `class` here ends the current
                // class without being consumed; the outer loop picks it up.
                TokenKind::Class | TokenKind::Eof => break,
                _ => members.push(self.parse_member()?),
            }
        }
        Ok(ClassDecl { name, base, members })
    }

    fn parse_member(&mut self) -> Result<Member, Diagnostic> {
        match self.peek_kind() {
            TokenKind::Var => Ok(Member::Field(self.parse_field()?)),
            TokenKind::This => Ok(Member::Constructor(self.parse_constructor()?)),
            TokenKind::Method => Ok(Member::Method(self.parse_method()?)),
            _ => Err(self.err(format!(
                "expected a member declaration, found '{}'",
                self.current().lexeme
            ))),
        }
    }

    // ---- members ------------------------------------------------------------

    fn parse_field(&mut self) -> Result<FieldDecl, Diagnostic> {
        self.expect(TokenKind::Var, "'var'")?;
        let name = self.expect_name()?;
        let declared_type = if self.peek_kind() == TokenKind::Colon {
            self.advance();
            Some(self.parse_type_name()?)
        } else {
            None
        };
        let init = if self.peek_kind() == TokenKind::Assign {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };
        if declared_type.is_none() && init.is_none() {
            return Err(self.err(format!(
                "field '{}' needs a declared type or an initialiser",
                name
            )));
        }
        self.skip_semicolon();
        Ok(FieldDecl {
            name,
            declared_type,
            init,
        })
    }

    fn parse_params(&mut self) -> Result<Vec<Parameter>, Diagnostic> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        if self.peek_kind() != TokenKind::RParen {
            loop {
                let name = self.expect_name()?;
                self.expect(TokenKind::Colon, "':'")?;
                let type_name = self.parse_type_name()?;
                params.push(Parameter { name, type_name });
                if self.peek_kind() == TokenKind::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok(params)
    }

    fn parse_constructor(&mut self) -> Result<ConstructorDecl, Diagnostic> {
        self.expect(TokenKind::This, "'this'")?;
        let params = self.parse_params()?;
        self.expect(TokenKind::Is, "'is'")?;
        let body = self.parse_block(&[TokenKind::End])?;
        self.expect(TokenKind::End, "'end'")?;
        Ok(ConstructorDecl { params, body })
    }

    fn parse_method(&mut self) -> Result<MethodDecl, Diagnostic> {
        self.expect(TokenKind::Method, "'method'")?;
        let name = self.expect_name()?;
        let params = self.parse_params()?;
        let return_type = if self.peek_kind() == TokenKind::Colon {
            self.advance();
            Some(self.parse_type_name()?)
        } else {
            None
        };

        let body = match self.peek_kind() {
            TokenKind::Is => {
                self.advance();
                let block = self.parse_block(&[TokenKind::End])?;
                self.expect(TokenKind::End, "'end'")?;
                MethodBody::Block(block)
            }
            TokenKind::Arrow => {
                self.advance();
                let expr = self.parse_expr()?;
                self.skip_semicolon();
                MethodBody::Arrow(Box::new(expr))
            }
            _ => MethodBody::Forward,
        };
        Ok(MethodDecl {
            name,
            params,
            return_type,
            body,
        })
    }

    // ---- types --------------------------------------------------------------

    fn parse_type_name(&mut self) -> Result<TypeName, Diagnostic> {
        let head = self.expect_name()?;
        let mut args = Vec::new();
        if self.peek_kind() == TokenKind::LBracket {
            self.advance();
            args.push(self.parse_type_name()?);
            while self.peek_kind() == TokenKind::Comma {
                self.advance();
                args.push(self.parse_type_name()?);
            }
            self.expect(TokenKind::RBracket, "']'")?;
        }
        Ok(TypeName { head, args })
    }

    // ---- blocks and statements ------------------------------------------------

    fn parse_block(&mut self, terminators: &[TokenKind]) -> Result<Block, Diagnostic> {
        let mut block = Block::new();
        loop {
            let kind = self.peek_kind();
            if kind == TokenKind::Eof || terminators.contains(&kind) {
                break;
            }
            let before = self.pos;
            if kind == TokenKind::Var {
                block.push_local(self.parse_local()?);
            } else {
                block.push_statement(self.parse_statement()?);
            }
            if self.pos == before {
                // Defensive: guarantee forward progress even on malformed input.
                return Err(self.err("parser made no progress; malformed statement"));
            }
        }
        Ok(block)
    }

    fn parse_local(&mut self) -> Result<LocalDecl, Diagnostic> {
        self.expect(TokenKind::Var, "'var'")?;
        let name = self.expect_name()?;
        let declared_type = if self.peek_kind() == TokenKind::Colon {
            self.advance();
            Some(self.parse_type_name()?)
        } else {
            None
        };
        let init = if self.peek_kind() == TokenKind::Assign {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };
        if declared_type.is_none() && init.is_none() {
            return Err(self.err(format!(
                "variable '{}' needs a declared type or an initialiser",
                name
            )));
        }
        self.skip_semicolon();
        Ok(LocalDecl {
            name,
            declared_type,
            init,
        })
    }

    fn parse_statement(&mut self) -> Result<Statement, Diagnostic> {
        let stmt = match self.peek_kind() {
            TokenKind::While => self.parse_while()?,
            TokenKind::If => self.parse_if()?,
            TokenKind::Return => self.parse_return()?,
            _ => {
                if let Some(assign) = self.try_parse_assign()? {
                    assign
                } else {
                    Statement::Expr(self.parse_expr()?)
                }
            }
        };
        self.skip_semicolon();
        Ok(stmt)
    }

    /// Assignment-target lookahead: `Identifier :=` or `this . Identifier :=`.
    /// Must be checked before falling through to expression parsing, since
    /// there is no other way to distinguish an assignment from a call whose
    /// receiver happens to share a prefix.
    fn try_parse_assign(&mut self) -> Result<Option<Statement>, Diagnostic> {
        if self.peek_kind() == TokenKind::This {
            if self.la(2) == TokenKind::Assign {
                self.advance(); // this, used here as a plain identifier target
                self.advance(); // :=
                let value = self.parse_expr()?;
                return Ok(Some(Statement::Assign {
                    target: "this".to_string(),
                    value,
                }));
            }
            if self.la(2) == TokenKind::Dot
                && is_relaxable_identifier_kind(self.la(3))
                && self.tokens.get(self.pos + 3).map(|t| t.kind) == Some(TokenKind::Assign)
            {
                self.advance(); // this
                self.advance(); // .
                let target = self.expect_name()?;
                self.advance(); // :=
                let value = self.parse_expr()?;
                return Ok(Some(Statement::Assign { target, value }));
            }
            return Ok(None);
        }
        if is_relaxable_identifier_kind(self.peek_kind()) && self.la(2) == TokenKind::Assign {
            let target = self.expect_name()?;
            self.advance(); // :=
            let value = self.parse_expr()?;
            return Ok(Some(Statement::Assign { target, value }));
        }
        Ok(None)
    }

    fn parse_while(&mut self) -> Result<Statement, Diagnostic> {
        self.expect(TokenKind::While, "'while'")?;
        let condition = self.parse_expr()?;
        self.expect(TokenKind::Loop, "'loop'")?;
        let body = self.parse_block(&[TokenKind::End])?;
        self.expect(TokenKind::End, "'end'")?;
        Ok(Statement::While { condition, body })
    }

    fn parse_if(&mut self) -> Result<Statement, Diagnostic> {
        self.expect(TokenKind::If, "'if'")?;
        let condition = self.parse_expr()?;
        self.expect(TokenKind::Then, "'then'")?;
        let then_branch = self.parse_block(&[TokenKind::Else, TokenKind::End])?;
        let else_branch = if self.peek_kind() == TokenKind::Else {
            self.advance();
            Some(self.parse_block(&[TokenKind::End])?)
        } else {
            None
        };
        self.expect(TokenKind::End, "'end'")?;
        Ok(Statement::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_return(&mut self) -> Result<Statement, Diagnostic> {
        self.expect(TokenKind::Return, "'return'")?;
        let value = if self.can_start_expr() {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(Statement::Return(value))
    }

    fn can_start_expr(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::IntegerLiteral
                | TokenKind::RealLiteral
                | TokenKind::StringLiteral
                | TokenKind::True
                | TokenKind::False
                | TokenKind::This
                | TokenKind::Unknown
        ) || is_relaxable_identifier_kind(self.peek_kind())
    }

    fn skip_semicolon(&mut self) {
        if self.peek_kind() == TokenKind::Semicolon {
            self.advance();
        }
    }

    // ---- expressions ----------------------------------------------------------

    fn parse_args(&mut self) -> Result<Vec<Expr>, Diagnostic> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        if self.peek_kind() != TokenKind::RParen {
            args.push(self.parse_expr()?);
            while self.peek_kind() == TokenKind::Comma {
                self.advance();
                args.push(self.parse_expr()?);
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok(args)
    }

    pub fn parse_expr(&mut self) -> Result<Expr, Diagnostic> {
        let (mut expr, mut pending_type) = self.parse_atom()?;
        loop {
            match self.peek_kind() {
                TokenKind::LParen => {
                    let args = self.parse_args()?;
                    expr = self.resolve_call(expr, pending_type.take(), args);
                }
                TokenKind::Dot => {
                    self.advance();
                    pending_type = None;
                    let member = self.expect_name()?;
                    expr = if self.peek_kind() == TokenKind::LParen {
                        let args = self.parse_args()?;
                        Expr::Call {
                            callee: Box::new(Expr::MemberAccess {
                                target: Box::new(expr),
                                member,
                            }),
                            args,
                        }
                    } else {
                        Expr::MemberAccess {
                            target: Box::new(expr),
                            member,
                        }
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// Resolve a bare call atom: a call directly on an identifier atom
    /// becomes `New` when the (possibly generic) name is a built-in type
    /// name, otherwise an implicit `this.name(args)` call.
    fn resolve_call(&self, expr: Expr, pending_type: Option<TypeName>, args: Vec<Expr>) -> Expr {
        match expr {
            Expr::Ident(name) => {
                let type_name = pending_type.unwrap_or_else(|| TypeName::simple(name.clone()));
                if is_builtin_type_name(&type_name) {
                    Expr::New {
                        class_name: type_name,
                        args,
                    }
                } else {
                    Expr::Call {
                        callee: Box::new(Expr::MemberAccess {
                            target: Box::new(Expr::This),
                            member: name,
                        }),
                        args,
                    }
                }
            }
            other => Expr::Call {
                callee: Box::new(other),
                args,
            },
        }
    }

    /// An atom, plus any generic type arguments immediately following an
    /// identifier (`Array[Integer]`), which only matter if a call follows.
    fn parse_atom(&mut self) -> Result<(Expr, Option<TypeName>), Diagnostic> {
        match self.peek_kind() {
            TokenKind::IntegerLiteral => {
                let tok = self.advance();
                let n: i64 = tok
                    .lexeme
                    .parse()
                    .map_err(|_| self.err(format!("invalid integer literal '{}'", tok.lexeme)))?;
                Ok((Expr::IntLit(n), None))
            }
            TokenKind::RealLiteral => {
                let tok = self.advance();
                let n: f64 = tok
                    .lexeme
                    .parse()
                    .map_err(|_| self.err(format!("invalid real literal '{}'", tok.lexeme)))?;
                Ok((Expr::RealLit(n), None))
            }
            TokenKind::StringLiteral => {
                let tok = self.advance();
                Ok((Expr::StringLit(tok.lexeme), None))
            }
            TokenKind::True => {
                self.advance();
                Ok((Expr::BoolLit(true), None))
            }
            TokenKind::False => {
                self.advance();
                Ok((Expr::BoolLit(false), None))
            }
            TokenKind::This => {
                self.advance();
                Ok((Expr::This, None))
            }
            TokenKind::Unknown if self.current().lexeme == "-" => {
                self.advance();
                match self.peek_kind() {
                    TokenKind::IntegerLiteral => {
                        let tok = self.advance();
                        let n: i64 = tok.lexeme.parse().map_err(|_| {
                            self.err(format!("invalid integer literal '-{}'", tok.lexeme))
                        })?;
                        Ok((Expr::IntLit(-n), None))
                    }
                    TokenKind::RealLiteral => {
                        let tok = self.advance();
                        let n: f64 = tok.lexeme.parse().map_err(|_| {
                            self.err(format!("invalid real literal '-{}'", tok.lexeme))
                        })?;
                        Ok((Expr::RealLit(-n), None))
                    }
                    _ => Err(self.err("expected a numeric literal after '-'")),
                }
            }
            kind if is_relaxable_identifier_kind(kind) => {
                let name = self.expect_name()?;
                if self.peek_kind() == TokenKind::LBracket {
                    let mut args = Vec::new();
                    self.advance();
                    args.push(self.parse_type_name()?);
                    while self.peek_kind() == TokenKind::Comma {
                        self.advance();
                        args.push(self.parse_type_name()?);
                    }
                    self.expect(TokenKind::RBracket, "']'")?;
                    Ok((Expr::Ident(name.clone()), Some(TypeName { head: name, args })))
                } else {
                    Ok((Expr::Ident(name), None))
                }
            }
            _ => Err(self.err(format!(
                "expected an expression, found '{}'",
                self.current().lexeme
            ))),
        }
    }
}

/// The fixed set of built-in type names the parser recognises for `New` vs
/// implicit-call disambiguation.
pub fn is_builtin_type_name(t: &TypeName) -> bool {
    match t.head.as_str() {
        "Integer" | "Real" | "Boolean" | "String" => t.args.is_empty(),
        "Array" | "List" => t.args.len() == 1,
        _ => false,
    }
}
