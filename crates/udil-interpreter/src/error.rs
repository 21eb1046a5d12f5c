//! Runtime error types.
//!
//! Every failure here is local to one statement: the interpreter records it as
//! a [`Report`](crate::interpreter::Report) and moves on to the next one.

use thiserror::Error;
use udil_syntax::ast::TypeTag;

use crate::eval::Grammar;

#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("'{0}' is already declared in this scope")]
    AlreadyDeclared(String),
    #[error("undefined variable '{0}'")]
    Undefined(String),
    #[error("'{name}' holds {expected}, cannot store {found}")]
    TypeMismatch {
        name: String,
        expected: TypeTag,
        found: TypeTag,
    },
    #[error("'{0}' cannot be declared with a type that holds no value")]
    VoidBinding(String),
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    Overflow,
    #[error("undefined variable '{0}'")]
    Undefined(String),
    #[error("'{0}' is not a number")]
    NotNumeric(String),
    #[error("'{0}' is not text")]
    NotText(String),
    #[error("'{0}' cannot be indexed")]
    NotIndexable(String),
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("index must be a non-negative integer, got {0}")]
    BadIndex(String),
    #[error("{0}")]
    Syntax(String),
    #[error("{0}")]
    Lex(String),
    #[error("expression nests too deeply")]
    RecursionLimit,
    #[error("no grammar matched: {}", describe_attempts(.0))]
    NoGrammarMatched(Vec<(Grammar, EvalError)>),
}

fn describe_attempts(attempts: &[(Grammar, EvalError)]) -> String {
    attempts
        .iter()
        .map(|(g, e)| format!("{}: {}", g, e))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum DelegateError {
    #[error("delegate i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("no `public class` found in delegate program")]
    EntryPointNotFound,
    #[error("delegate compilation failed: {0}")]
    Compile(String),
    #[error("delegate run failed: {0}")]
    Runtime(String),
    #[error("unreadable delegate output: {0}")]
    BadOutput(String),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sync key needs 2 parts, got {0}")]
    BadKeyArity(usize),
    #[error("unknown sync channel '{0}'")]
    UnknownChannel(String),
    #[error("unknown key '{key}' on sync channel '{channel}'")]
    UnknownKey { channel: String, key: String },
    #[error("expected a block or statement, got {0}")]
    ExpectedBlock(String),
    #[error("'{0}' is not registered on context-out")]
    MissingContextOut(String),
    #[error("bad sync argument: {0}")]
    BadArgument(String),
    #[error(transparent)]
    Parse(#[from] udil_syntax::Error),
    #[error(transparent)]
    Scope(#[from] ScopeError),
    #[error(transparent)]
    Delegate(#[from] DelegateError),
}

/// Failure of a single statement.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error(transparent)]
    Scope(#[from] ScopeError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("{0} statements are accepted but not executed")]
    NotExecutable(&'static str),
    #[error("'{0}' is not a list")]
    NotAList(String),
    #[error("at most 2 indices are supported in assignments, got {0}")]
    TooManyIndices(usize),
    #[error("index {index} would grow the list past {limit} elements")]
    IndexTooLarge { index: usize, limit: usize },
    #[error("'{name}' expects {expected}, got {found}")]
    ValueTypeMismatch {
        name: String,
        expected: TypeTag,
        found: String,
    },
}
