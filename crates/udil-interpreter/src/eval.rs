//! Three-grammar expression evaluator.
//!
//! Expressions reach the evaluator as canonical text. The text is tokenized
//! again and read under one of three grammars:
//!
//! - [`Grammar::Logic`]: arithmetic, comparison and boolean logic over
//!   numbers; booleans are the integers `1` and `0`.
//! - [`Grammar::Text`]: text and char literals and text-valued references
//!   joined with `+`.
//! - [`Grammar::Object`]: references (with index chains) to any value, and
//!   list literals.
//!
//! A grammar only succeeds if it consumes the whole expression. When the
//! caller does not pick one, the grammars are tried in [`Grammar::TRIAL_ORDER`]
//! and the first success wins.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use udil_syntax::ast::{Expr, TypeTag};
use udil_syntax::token::{Token, TokenKind};

use crate::error::EvalError;
use crate::symbols::SymbolTable;
use crate::value::Value;

pub type EvalResult<T> = Result<T, EvalError>;

/// Limit for statements whose expressions refer back to statements.
const MAX_DEPTH: usize = 32;

/// Limit for groups, index brackets, nested lists and prefix operators
/// inside one another.
pub const MAX_NESTING: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    Logic,
    Text,
    Object,
}

impl Grammar {
    pub const TRIAL_ORDER: [Grammar; 3] = [Grammar::Logic, Grammar::Text, Grammar::Object];

    /// Grammar used for values headed for a binding tagged `tag`.
    pub fn for_tag(tag: TypeTag) -> Grammar {
        match tag {
            TypeTag::Int | TypeTag::Real => Grammar::Logic,
            TypeTag::Text => Grammar::Text,
            TypeTag::List | TypeTag::Block => Grammar::Object,
        }
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Grammar::Logic => "logic",
            Grammar::Text => "text",
            Grammar::Object => "object",
        })
    }
}

struct Cursor<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Cursor<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&'t TokenKind> {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> Option<&'t TokenKind> {
        self.tokens.get(self.pos + n).map(|t| &t.kind)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == Some(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> EvalResult<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn unexpected(&self) -> EvalError {
        match self.tokens.get(self.pos) {
            Some(t) => EvalError::Syntax(format!("unexpected '{}' in expression", t.lexeme)),
            None => EvalError::Syntax("unexpected end of expression".to_string()),
        }
    }
}

/// Evaluates expression text against a symbol table.
pub struct Evaluator<'a> {
    table: &'a SymbolTable,
    depth: Cell<usize>,
    nesting: Cell<usize>,
}

impl<'a> Evaluator<'a> {
    pub fn new(table: &'a SymbolTable) -> Self {
        Self {
            table,
            depth: Cell::new(0),
            nesting: Cell::new(0),
        }
    }

    /// Evaluates `text` under `grammar`, or by trial when `grammar` is `None`.
    pub fn evaluate(&self, text: &str, grammar: Option<Grammar>) -> EvalResult<Value> {
        let mut tokens = udil_lexer::tokenize(text).map_err(|e| EvalError::Lex(e.msg))?;
        tokens.retain(|t| t.kind != TokenKind::Eof);
        match grammar {
            Some(g) => self.eval_as(&tokens, g),
            None => self.eval_trial(&tokens),
        }
    }

    pub fn eval_expr(&self, expr: &Expr, grammar: Option<Grammar>) -> EvalResult<Value> {
        self.evaluate(expr.as_str(), grammar)
    }

    fn eval_trial(&self, tokens: &[Token]) -> EvalResult<Value> {
        let mut attempts = Vec::new();
        for g in Grammar::TRIAL_ORDER {
            match self.eval_as(tokens, g) {
                Ok(v) => {
                    tracing::trace!(grammar = %g, "grammar matched");
                    return Ok(v);
                }
                Err(e) => {
                    tracing::trace!(grammar = %g, error = %e, "grammar rejected");
                    attempts.push((g, e));
                }
            }
        }
        Err(EvalError::NoGrammarMatched(attempts))
    }

    fn eval_as(&self, tokens: &[Token], grammar: Grammar) -> EvalResult<Value> {
        if tokens.is_empty() {
            return Err(EvalError::Syntax("empty expression".to_string()));
        }
        let mut c = Cursor::new(tokens);
        let value = match grammar {
            Grammar::Logic => self.logic(&mut c)?,
            Grammar::Text => Value::Text(self.text_concat(&mut c)?),
            Grammar::Object => self.object(&mut c)?,
        };
        if c.peek().is_some() {
            return Err(c.unexpected());
        }
        Ok(value)
    }

    /// Evaluates the expression held by a statement reached through an index.
    fn nested(&self, expr: &Expr, grammar: Grammar) -> EvalResult<Value> {
        let depth = self.depth.get();
        if depth >= MAX_DEPTH {
            return Err(EvalError::RecursionLimit);
        }
        self.depth.set(depth + 1);
        let result = self.evaluate(expr.as_str(), Some(grammar));
        self.depth.set(depth);
        result
    }

    /// Runs `f` one nesting level deeper.
    fn descend<T>(&self, f: impl FnOnce() -> EvalResult<T>) -> EvalResult<T> {
        let nesting = self.nesting.get();
        if nesting >= MAX_NESTING {
            return Err(EvalError::RecursionLimit);
        }
        self.nesting.set(nesting + 1);
        let result = f();
        self.nesting.set(nesting);
        result
    }

    /// Resolves `name` followed by any number of `[index]` suffixes. Returns
    /// the value and whether at least one index was applied.
    fn reference(&self, c: &mut Cursor<'_>, name: &str) -> EvalResult<(Value, bool)> {
        c.advance();
        if c.peek() == Some(&TokenKind::LParen) {
            return Err(EvalError::Syntax(format!(
                "call to '{}' is not supported",
                name
            )));
        }
        let mut value = self
            .table
            .lookup(name)
            .map(|b| b.value.clone())
            .ok_or_else(|| EvalError::Undefined(name.to_string()))?;
        let mut indexed = false;
        while c.eat(&TokenKind::LBracket) {
            let index = self.descend(|| self.logic(c))?;
            c.expect(&TokenKind::RBracket)?;
            value = index_value(&value, as_index(&index)?, name)?;
            indexed = true;
        }
        Ok((value, indexed))
    }

    // === Logic grammar ===

    /// Comparisons, `&&` and `||` share one left-associative level below
    /// arithmetic: `1 || 0 == 0` reads as `(1 || 0) == 0`.
    fn logic(&self, c: &mut Cursor<'_>) -> EvalResult<Value> {
        let mut left = self.logic_operand(c)?;
        while let Some(op) = c.peek().filter(|k| is_logic_operator(k)) {
            c.advance();
            let right = self.logic_operand(c)?;
            left = match op {
                TokenKind::AndAnd => {
                    let (l, r) = (truth(&left)?, truth(&right)?);
                    bool_value(l && r)
                }
                TokenKind::OrOr => {
                    let (l, r) = (truth(&left)?, truth(&right)?);
                    bool_value(l || r)
                }
                _ => compare(op, &left, &right)?,
            };
        }
        Ok(left)
    }

    /// `!` negates the arithmetic operand after it, so `!a == b` is
    /// `(!a) == b` while `!a + b` is `!(a + b)`.
    fn logic_operand(&self, c: &mut Cursor<'_>) -> EvalResult<Value> {
        if c.eat(&TokenKind::Bang) {
            let v = self.descend(|| self.logic_operand(c))?;
            return Ok(bool_value(!truth(&v)?));
        }
        self.additive(c)
    }

    fn additive(&self, c: &mut Cursor<'_>) -> EvalResult<Value> {
        let mut left = self.multiplicative(c)?;
        while let Some(op) = c
            .peek()
            .filter(|k| matches!(k, TokenKind::Plus | TokenKind::Minus))
        {
            c.advance();
            let right = self.multiplicative(c)?;
            left = arith(op, &left, &right)?;
        }
        Ok(left)
    }

    fn multiplicative(&self, c: &mut Cursor<'_>) -> EvalResult<Value> {
        let mut left = self.unary(c)?;
        while let Some(op) = c
            .peek()
            .filter(|k| matches!(k, TokenKind::Star | TokenKind::Slash | TokenKind::Percent))
        {
            c.advance();
            let right = self.unary(c)?;
            left = arith(op, &left, &right)?;
        }
        Ok(left)
    }

    fn unary(&self, c: &mut Cursor<'_>) -> EvalResult<Value> {
        if c.eat(&TokenKind::Minus) {
            return match self.descend(|| self.unary(c))? {
                Value::Int(n) => n.checked_neg().map(Value::Int).ok_or(EvalError::Overflow),
                Value::Real(x) => Ok(Value::Real(-x)),
                other => Err(EvalError::NotNumeric(other.to_string())),
            };
        }
        self.logic_primary(c)
    }

    fn logic_primary(&self, c: &mut Cursor<'_>) -> EvalResult<Value> {
        match c.peek() {
            Some(TokenKind::Int(n)) => {
                c.advance();
                Ok(Value::Int(*n))
            }
            Some(TokenKind::Real(x)) => {
                c.advance();
                Ok(Value::Real(*x))
            }
            Some(TokenKind::LParen) => {
                c.advance();
                let v = self.descend(|| self.logic(c))?;
                c.expect(&TokenKind::RParen)?;
                Ok(v)
            }
            Some(TokenKind::Ident(name)) => {
                let (value, indexed) = self.reference(c, name)?;
                match value {
                    Value::Int(_) | Value::Real(_) => Ok(value),
                    Value::Block(stmt) if indexed => match stmt.value_expr() {
                        Some(expr) => match self.nested(expr, Grammar::Logic)? {
                            v @ (Value::Int(_) | Value::Real(_)) => Ok(v),
                            _ => Err(EvalError::NotNumeric(name.clone())),
                        },
                        None => Err(EvalError::NotNumeric(name.clone())),
                    },
                    _ => Err(EvalError::NotNumeric(name.clone())),
                }
            }
            _ => Err(c.unexpected()),
        }
    }

    // === Text grammar ===

    fn text_concat(&self, c: &mut Cursor<'_>) -> EvalResult<String> {
        let mut out = self.text_term(c)?;
        while c.eat(&TokenKind::Plus) {
            out.push_str(&self.text_term(c)?);
        }
        Ok(out)
    }

    fn text_term(&self, c: &mut Cursor<'_>) -> EvalResult<String> {
        match c.peek() {
            Some(TokenKind::Text(s)) | Some(TokenKind::Char(s)) => {
                c.advance();
                Ok(s.clone())
            }
            Some(TokenKind::LParen) => {
                c.advance();
                let s = self.descend(|| self.text_concat(c))?;
                c.expect(&TokenKind::RParen)?;
                Ok(s)
            }
            Some(TokenKind::Ident(name)) => {
                let (value, indexed) = self.reference(c, name)?;
                match value {
                    Value::Text(s) => Ok(s),
                    Value::Block(stmt) if indexed => match stmt.value_expr() {
                        Some(expr) => match self.nested(expr, Grammar::Text)? {
                            Value::Text(s) => Ok(s),
                            _ => Err(EvalError::NotText(name.clone())),
                        },
                        None => Err(EvalError::NotText(name.clone())),
                    },
                    _ => Err(EvalError::NotText(name.clone())),
                }
            }
            _ => Err(c.unexpected()),
        }
    }

    // === Object grammar ===

    fn object(&self, c: &mut Cursor<'_>) -> EvalResult<Value> {
        match c.peek() {
            Some(TokenKind::LBracket) => self.list_literal(c),
            Some(TokenKind::Ident(name)) => Ok(self.reference(c, name)?.0),
            _ => Err(c.unexpected()),
        }
    }

    fn list_literal(&self, c: &mut Cursor<'_>) -> EvalResult<Value> {
        c.expect(&TokenKind::LBracket)?;
        let mut items = Vec::new();
        if c.eat(&TokenKind::RBracket) {
            return Ok(Value::List(items));
        }
        loop {
            let start = c.pos;
            let end = element_end(c.tokens, start)?;
            if start == end {
                return Err(c.unexpected());
            }
            items.push(self.descend(|| self.list_element(&c.tokens[start..end]))?);
            c.pos = end;
            if c.eat(&TokenKind::Comma) {
                continue;
            }
            c.expect(&TokenKind::RBracket)?;
            return Ok(Value::List(items));
        }
    }

    /// A bracketed element is a nested list; anything else is resolved by
    /// trial.
    fn list_element(&self, tokens: &[Token]) -> EvalResult<Value> {
        if tokens[0].kind == TokenKind::LBracket && group_end(tokens) == Some(tokens.len() - 1) {
            self.eval_as(tokens, Grammar::Object)
        } else {
            self.eval_trial(tokens)
        }
    }
}

/// Index of the first top-level `,` or `]` at or after `start`.
fn element_end(tokens: &[Token], start: usize) -> EvalResult<usize> {
    let mut depth = 0usize;
    for (i, t) in tokens.iter().enumerate().skip(start) {
        match t.kind {
            TokenKind::LBracket | TokenKind::LParen => depth += 1,
            TokenKind::RBracket | TokenKind::RParen if depth > 0 => depth -= 1,
            TokenKind::RBracket | TokenKind::Comma if depth == 0 => return Ok(i),
            _ => {}
        }
    }
    Err(EvalError::Syntax("unclosed '[' in list".to_string()))
}

/// Index of the bracket closing the group opened by `tokens[0]`.
fn group_end(tokens: &[Token]) -> Option<usize> {
    let mut depth = 0usize;
    for (i, t) in tokens.iter().enumerate() {
        match t.kind {
            TokenKind::LBracket | TokenKind::LParen => depth += 1,
            TokenKind::RBracket | TokenKind::RParen => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn index_value(value: &Value, index: usize, name: &str) -> EvalResult<Value> {
    match value {
        Value::List(items) => items
            .get(index)
            .cloned()
            .ok_or(EvalError::IndexOutOfRange {
                index,
                len: items.len(),
            }),
        Value::Block(stmt) => match stmt.as_block() {
            Some(block) => block
                .statements
                .get(index)
                .map(|s| Value::Block(Rc::clone(s)))
                .ok_or(EvalError::IndexOutOfRange {
                    index,
                    len: block.len(),
                }),
            None => Err(EvalError::NotIndexable(name.to_string())),
        },
        _ => Err(EvalError::NotIndexable(name.to_string())),
    }
}

pub(crate) fn as_index(value: &Value) -> EvalResult<usize> {
    match value {
        Value::Int(n) if *n >= 0 => Ok(*n as usize),
        other => Err(EvalError::BadIndex(other.to_string())),
    }
}

/// Non-zero numbers are true.
pub(crate) fn truth(value: &Value) -> EvalResult<bool> {
    match value {
        Value::Int(n) => Ok(*n != 0),
        Value::Real(x) => Ok(*x != 0.0),
        other => Err(EvalError::NotNumeric(other.to_string())),
    }
}

fn bool_value(b: bool) -> Value {
    Value::Int(b as i64)
}

fn is_logic_operator(kind: &TokenKind) -> bool {
    matches!(kind, TokenKind::AndAnd | TokenKind::OrOr) || is_comparison(kind)
}

fn is_comparison(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Less
            | TokenKind::LessEq
            | TokenKind::Greater
            | TokenKind::GreaterEq
            | TokenKind::EqEq
            | TokenKind::NotEq
    )
}

fn as_real(value: &Value) -> EvalResult<f64> {
    match value {
        Value::Int(n) => Ok(*n as f64),
        Value::Real(x) => Ok(*x),
        other => Err(EvalError::NotNumeric(other.to_string())),
    }
}

fn compare(op: &TokenKind, left: &Value, right: &Value) -> EvalResult<Value> {
    let ordering = match (left, right) {
        (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
        (a, b) => as_real(a)?.partial_cmp(&as_real(b)?),
    };
    let result = match (op, ordering) {
        (_, None) => matches!(op, TokenKind::NotEq),
        (TokenKind::Less, Some(o)) => o.is_lt(),
        (TokenKind::LessEq, Some(o)) => o.is_le(),
        (TokenKind::Greater, Some(o)) => o.is_gt(),
        (TokenKind::GreaterEq, Some(o)) => o.is_ge(),
        (TokenKind::EqEq, Some(o)) => o.is_eq(),
        (_, Some(o)) => o.is_ne(),
    };
    Ok(bool_value(result))
}

fn arith(op: &TokenKind, left: &Value, right: &Value) -> EvalResult<Value> {
    if let (Value::Int(a), Value::Int(b)) = (left, right) {
        let (a, b) = (*a, *b);
        let result = match op {
            TokenKind::Plus => a.checked_add(b),
            TokenKind::Minus => a.checked_sub(b),
            TokenKind::Star => a.checked_mul(b),
            TokenKind::Slash if b == 0 => return Err(EvalError::DivisionByZero),
            TokenKind::Slash => a.checked_div(b),
            TokenKind::Percent if b == 0 => return Err(EvalError::DivisionByZero),
            _ => a.checked_rem(b),
        };
        return result.map(Value::Int).ok_or(EvalError::Overflow);
    }
    let (a, b) = (as_real(left)?, as_real(right)?);
    let result = match op {
        TokenKind::Plus => a + b,
        TokenKind::Minus => a - b,
        TokenKind::Star => a * b,
        TokenKind::Slash | TokenKind::Percent if b == 0.0 => {
            return Err(EvalError::DivisionByZero)
        }
        TokenKind::Slash => a / b,
        _ => a % b,
    };
    Ok(Value::Real(result))
}
