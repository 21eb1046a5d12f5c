//! Positioned error type shared by the UDIL front end.
//!
//! Lexing and parsing either succeed completely or stop with one of these
//! errors. Each error carries a message, what phase raised it, and (when the
//! problem can be pinned to the source) a 1-based row and column.
//!
//! Runtime failures (scope, evaluation, sync) are modelled separately by the
//! interpreter crate; they are statement-local and never abort a program.
//!
//! # Examples
//!
//! ```rust
//! use udil_syntax::error::{Error, ErrorKind, Result, error_at};
//!
//! let located = Error::syntax("unexpected ';'", 3, 15);
//! assert_eq!(located.kind, ErrorKind::Syntax);
//! assert_eq!(located.to_string(), "unexpected ';' at 3:15");
//!
//! fn might_fail() -> Result<i32> {
//!     error_at(1, 1, "unterminated block comment")
//! }
//! assert!(might_fail().is_err());
//! ```

use std::fmt;

/// Which front-end phase produced an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unrecognized character, unterminated literal or comment
    Lex,
    /// Unexpected token while building statements
    Syntax,
    /// Anything without a more precise classification
    Other,
}

/// An error that occurred while turning UDIL source into statements.
///
/// # Fields
///
/// - `msg`: Human-readable error description
/// - `kind`: The phase that raised the error
/// - `line`: Optional 1-based line number in source file
/// - `col`: Optional 1-based column number in source file
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    /// Human-readable error message
    pub msg: String,

    /// Phase that produced the error
    pub kind: ErrorKind,

    /// Optional line number in source file (1-based)
    pub line: Option<usize>,

    /// Optional column number in source file (1-based)
    pub col: Option<usize>,
}

impl Error {
    /// Creates a new error with the given message and no location.
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            kind: ErrorKind::Other,
            line: None,
            col: None,
        }
    }

    /// Creates a new error with the given message and source location.
    ///
    /// ```rust
    /// use udil_syntax::Error;
    ///
    /// let error = Error::with_span("unexpected '}'", 5, 12);
    /// assert_eq!(format!("{}", error), "unexpected '}' at 5:12");
    /// ```
    pub fn with_span(msg: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            msg: msg.into(),
            kind: ErrorKind::Other,
            line: Some(line),
            col: Some(col),
        }
    }

    /// A lexical error at the given row/column.
    pub fn lex(msg: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            kind: ErrorKind::Lex,
            ..Self::with_span(msg, line, col)
        }
    }

    /// A syntax error at the given row/column.
    pub fn syntax(msg: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            kind: ErrorKind::Syntax,
            ..Self::with_span(msg, line, col)
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(l), Some(c)) = (self.line, self.col) {
            write!(f, "{} at {}:{}", self.msg, l, c)
        } else {
            write!(f, "{}", self.msg)
        }
    }
}

impl std::error::Error for Error {}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::new(s)
    }
}
impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::new(s)
    }
}

/// A specialized `Result` type for front-end operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Convenience function to create an error result.
pub fn error<T>(msg: impl Into<String>) -> Result<T> {
    Err(Error::new(msg))
}

/// Convenience function to create a lexical error result with source location.
pub fn error_at<T>(line: usize, col: usize, msg: impl Into<String>) -> Result<T> {
    Err(Error::lex(msg, line, col))
}

/// Convenience function to create a syntax error result with source location.
pub fn syntax_error<T>(line: usize, col: usize, msg: impl Into<String>) -> Result<T> {
    Err(Error::syntax(msg, line, col))
}
