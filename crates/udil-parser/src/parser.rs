//! Recursive-descent parser from tokens to statements.
//!
//! Expressions are validated against the expression grammar but stored as
//! canonical text: the lexemes of the consumed tokens joined without
//! whitespace. Parsing stops at the first syntax error; there is no recovery.

use std::rc::Rc;

use udil_syntax::ast::*;
use udil_syntax::error::{syntax_error, Result};
use udil_syntax::token::{Token, TokenKind};

/// Limit for blocks, groups, brackets and prefix operators inside one
/// another.
pub const MAX_NESTING: usize = 64;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    /// Creates a parser over a token stream ending with `Eof`.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last(), Some(t) if t.kind == TokenKind::Eof) {
            let (line, col) = tokens.last().map_or((1, 1), |t| (t.line, t.col));
            tokens.push(Token::new(TokenKind::Eof, "", line, col));
        }
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + n).min(last)]
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn advance(&mut self) -> &Token {
        let idx = self.pos.min(self.tokens.len() - 1);
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        &self.tokens[idx]
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected<T>(&self, expected: &str) -> Result<T> {
        let tk = self.peek();
        syntax_error(
            tk.line,
            tk.col,
            format!("Unexpected {}, expected {}", tk.kind, expected),
        )
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<()> {
        if self.eat(&kind) {
            Ok(())
        } else {
            self.unexpected(expected)
        }
    }

    /// Runs `f` one nesting level deeper.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING {
            let tk = self.peek();
            return syntax_error(tk.line, tk.col, "Nesting is too deep");
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn expect_ident(&mut self) -> Result<String> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => self.unexpected("identifier"),
        }
    }

    fn expect_type(&mut self) -> Result<TypeName> {
        let tk = self.peek();
        if tk.kind.is_type_keyword() {
            let ty = TypeName::from_keyword(&tk.lexeme);
            if let Some(ty) = ty {
                self.advance();
                return Ok(ty);
            }
        }
        self.unexpected("type")
    }

    /// Parses the whole token stream into a program.
    pub fn parse_program(&mut self) -> Result<Program> {
        let mut statements = Vec::new();
        while !self.check(&TokenKind::Eof) {
            statements.push(self.parse_statement()?);
        }
        tracing::debug!(statements = statements.len(), "parsed program");
        Ok(Program { statements })
    }

    pub fn parse_statement(&mut self) -> Result<Rc<Statement>> {
        let position = self.peek().line;
        let kind = match &self.peek().kind {
            TokenKind::LBrace => StmtKind::Block(Block::new("", self.parse_block()?)),
            TokenKind::Ident(name) if self.peek_at(1).kind == TokenKind::LBrace => {
                let id = name.clone();
                self.advance();
                StmtKind::Block(Block::new(id, self.parse_block()?))
            }
            TokenKind::If => self.parse_if()?,
            TokenKind::While => self.parse_while()?,
            TokenKind::For => self.parse_for()?,
            TokenKind::Return => self.parse_return()?,
            TokenKind::Sync => self.parse_sync_write()?,
            k if k.is_type_keyword() => self.parse_typed()?,
            TokenKind::Ident(_) => self.parse_ident_statement()?,
            _ => {
                let expr = self.parse_expr()?;
                self.expect(TokenKind::Semicolon, "';'")?;
                StmtKind::Expression(expr)
            }
        };
        Ok(Rc::new(Statement::new(kind, position)))
    }

    /// `'{' statement* '}' [';']`
    fn parse_block(&mut self) -> Result<Vec<Rc<Statement>>> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut body = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::Eof) {
                return self.unexpected("'}'");
            }
            body.push(self.nested(Self::parse_statement)?);
        }
        self.advance();
        self.eat(&TokenKind::Semicolon);
        Ok(body)
    }

    fn parse_paren_expr(&mut self) -> Result<Expr> {
        self.expect(TokenKind::LParen, "'('")?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen, "')'")?;
        Ok(cond)
    }

    fn parse_if(&mut self) -> Result<StmtKind> {
        self.advance();
        let cond = self.parse_paren_expr()?;
        let then_block = self.parse_block()?;
        let else_block = if self.eat(&TokenKind::Else) {
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(StmtKind::If {
            cond,
            then_block,
            else_block,
        })
    }

    fn parse_while(&mut self) -> Result<StmtKind> {
        self.advance();
        let cond = self.parse_paren_expr()?;
        let body = self.parse_block()?;
        Ok(StmtKind::While { cond, body })
    }

    fn parse_for(&mut self) -> Result<StmtKind> {
        self.advance();
        self.expect(TokenKind::LParen, "'('")?;
        let init = self.parse_for_clause()?;
        self.expect(TokenKind::Semicolon, "';'")?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::Semicolon, "';'")?;
        let step = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_for_clause()?)
        };
        self.expect(TokenKind::RParen, "')'")?;
        let body = self.parse_block()?;
        Ok(StmtKind::For {
            init,
            cond,
            step,
            body,
        })
    }

    fn parse_for_clause(&mut self) -> Result<ForClause> {
        if self.peek().kind.is_type_keyword() {
            let ty = self.expect_type()?;
            let name = self.expect_ident()?;
            return Ok(ForClause::Declare { ty, name });
        }
        let target = self.parse_target()?;
        self.expect(TokenKind::Equal, "'='")?;
        let expr = self.parse_expr()?;
        Ok(ForClause::Assign { target, expr })
    }

    fn parse_return(&mut self) -> Result<StmtKind> {
        self.advance();
        if self.eat(&TokenKind::Semicolon) {
            return Ok(StmtKind::Return(None));
        }
        let expr = self.parse_expr()?;
        self.expect(TokenKind::Semicolon, "';'")?;
        Ok(StmtKind::Return(Some(expr)))
    }

    /// `'(' [expr (',' expr)*] ')'` after the `sync` keyword.
    fn parse_sync_args(&mut self) -> Result<Vec<Expr>> {
        self.expect(TokenKind::Sync, "'sync'")?;
        self.expect(TokenKind::LParen, "'('")?;
        let args = self.parse_args(TokenKind::RParen)?;
        self.expect(TokenKind::RParen, "')'")?;
        Ok(args)
    }

    fn parse_sync_write(&mut self) -> Result<StmtKind> {
        let key = self.parse_sync_args()?;
        self.expect(TokenKind::Equal, "'='")?;
        let value = self.parse_expr()?;
        self.expect(TokenKind::Semicolon, "';'")?;
        Ok(StmtKind::SyncWrite { key, value })
    }

    fn parse_sync_read(&mut self, target: String, ty: Option<TypeName>) -> Result<StmtKind> {
        let parts = self.parse_sync_args()?;
        self.expect(TokenKind::Semicolon, "';'")?;
        Ok(StmtKind::SyncRead { target, ty, parts })
    }

    /// Declarations, initialized declarations, typed sync reads and
    /// function definitions all start with a type keyword.
    fn parse_typed(&mut self) -> Result<StmtKind> {
        let ty = self.expect_type()?;
        let name = self.expect_ident()?;
        match self.peek().kind {
            TokenKind::Semicolon => {
                self.advance();
                Ok(StmtKind::Declaration { ty, name })
            }
            TokenKind::Equal => {
                self.advance();
                if self.check(&TokenKind::Sync) {
                    return self.parse_sync_read(name, Some(ty));
                }
                let expr = self.parse_expr()?;
                self.expect(TokenKind::Semicolon, "';'")?;
                Ok(StmtKind::DeclAssign { ty, name, expr })
            }
            TokenKind::LParen => {
                self.advance();
                let mut params = Vec::new();
                if !self.check(&TokenKind::RParen) {
                    loop {
                        let ty = self.expect_type()?;
                        let name = self.expect_ident()?;
                        params.push(Param { ty, name });
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RParen, "')'")?;
                let body = self.parse_block()?;
                Ok(StmtKind::FunctionDef {
                    ret: ty,
                    name,
                    params,
                    body,
                })
            }
            _ => self.unexpected("';', '=' or '('"),
        }
    }

    fn parse_target(&mut self) -> Result<AssignTarget> {
        let name = self.expect_ident()?;
        let mut indices = Vec::new();
        while self.eat(&TokenKind::LBracket) {
            indices.push(self.parse_expr()?);
            self.expect(TokenKind::RBracket, "']'")?;
        }
        Ok(AssignTarget { name, indices })
    }

    /// An identifier starts an assignment, an untyped sync read, or an
    /// expression statement; the target is parsed speculatively and rewound
    /// when no `=` follows.
    fn parse_ident_statement(&mut self) -> Result<StmtKind> {
        let start = self.pos;
        if let Ok(target) = self.parse_target() {
            if self.eat(&TokenKind::Equal) {
                if target.indices.is_empty() && self.check(&TokenKind::Sync) {
                    return self.parse_sync_read(target.name, None);
                }
                let expr = self.parse_expr()?;
                self.expect(TokenKind::Semicolon, "';'")?;
                return Ok(StmtKind::Assignment { target, expr });
            }
        }
        self.pos = start;
        let expr = self.parse_expr()?;
        self.expect(TokenKind::Semicolon, "';'")?;
        Ok(StmtKind::Expression(expr))
    }

    fn parse_args(&mut self, close: TokenKind) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.check(&close) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(args)
    }

    /// Parses one expression and returns its canonical text.
    pub fn parse_expr(&mut self) -> Result<Expr> {
        let start = self.pos;
        self.parse_logic()?;
        let text: String = self.tokens[start..self.pos]
            .iter()
            .map(|t| t.lexeme.as_str())
            .collect();
        Ok(Expr::new(text))
    }

    /// Comparisons, `&&` and `||` form one left-associative level.
    fn parse_logic(&mut self) -> Result<()> {
        self.parse_logic_operand()?;
        while matches!(
            self.peek().kind,
            TokenKind::OrOr
                | TokenKind::AndAnd
                | TokenKind::Less
                | TokenKind::LessEq
                | TokenKind::Greater
                | TokenKind::GreaterEq
                | TokenKind::EqEq
                | TokenKind::NotEq
        ) {
            self.advance();
            self.parse_logic_operand()?;
        }
        Ok(())
    }

    fn parse_logic_operand(&mut self) -> Result<()> {
        if self.eat(&TokenKind::Bang) {
            return self.nested(Self::parse_logic_operand);
        }
        self.parse_add()
    }

    fn parse_add(&mut self) -> Result<()> {
        self.parse_mul()?;
        while matches!(self.peek().kind, TokenKind::Plus | TokenKind::Minus) {
            self.advance();
            self.parse_mul()?;
        }
        Ok(())
    }

    fn parse_mul(&mut self) -> Result<()> {
        self.parse_unary()?;
        while matches!(
            self.peek().kind,
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent
        ) {
            self.advance();
            self.parse_unary()?;
        }
        Ok(())
    }

    fn parse_unary(&mut self) -> Result<()> {
        if self.eat(&TokenKind::Minus) {
            return self.nested(Self::parse_unary);
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<()> {
        match &self.peek().kind {
            TokenKind::Int(_) | TokenKind::Real(_) | TokenKind::Text(_) | TokenKind::Char(_) => {
                self.advance();
                Ok(())
            }
            TokenKind::LParen => {
                self.advance();
                self.nested(Self::parse_logic)?;
                self.expect(TokenKind::RParen, "')'")
            }
            TokenKind::LBracket => {
                self.advance();
                self.nested(|p| p.parse_args(TokenKind::RBracket))?;
                self.expect(TokenKind::RBracket, "']'")
            }
            TokenKind::Ident(_) => {
                self.advance();
                if self.eat(&TokenKind::LParen) {
                    self.nested(|p| p.parse_args(TokenKind::RParen))?;
                    self.expect(TokenKind::RParen, "')'")?;
                }
                while self.eat(&TokenKind::LBracket) {
                    self.nested(Self::parse_logic)?;
                    self.expect(TokenKind::RBracket, "']'")?;
                }
                Ok(())
            }
            _ => self.unexpected("expression"),
        }
    }
}
