//! Token definitions and lexical analysis types for the UDIL language.
//!
//! This module defines all the token types that can be produced by the UDIL lexer.
//! Tokens represent the smallest meaningful units of UDIL source code, such as
//! keywords, identifiers, operators, and literals.
//!
//! # Token Categories
//!
//! The lexer recognizes several categories of tokens:
//!
//! - **Identifiers**: Variable and block names (`counter`, `program`)
//! - **Literals**: Numbers, text and chars (`42`, `3.14`, `"hello"`, `'c'`)
//! - **Keywords**: Language reserved words (`if`, `while`, `sync`, `int`)
//! - **Operators**: Arithmetic, comparison and logic operators (`+`, `==`, `&&`)
//! - **Punctuation**: Structural elements (`(`, `{`, `;`, `,`)
//! - **Special**: End-of-file marker
//!
//! Every token also keeps the exact slice of source it was read from. The
//! canonical rendering of an expression is the concatenation of those slices,
//! which is what lets a statement be turned back into program text.
//!
//! # Examples
//!
//! ```rust
//! use udil_syntax::{Token, TokenKind};
//!
//! let keyword = Token::new(TokenKind::While, "while", 1, 1);
//! let number = Token::new(TokenKind::Int(42), "42", 2, 9);
//! assert_eq!(number.lexeme, "42");
//! assert!(keyword.kind.is_keyword());
//! ```

use std::fmt;

/// Token types that can be produced by the UDIL lexer.
///
/// Literal tokens carry their decoded value; the raw spelling lives in
/// [`Token::lexeme`].
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // === Literals ===
    /// An identifier token (variable names, block names)
    Ident(String),

    /// An integer literal (`0`, `42`)
    Int(i64),

    /// A real literal, always written with a fractional part (`3.14`)
    Real(f64),

    /// A double-quoted text literal with escapes decoded
    Text(String),

    /// A single-quoted char literal with escapes decoded
    Char(String),

    // === Keywords ===
    If,
    Else,
    While,
    For,
    Return,
    Sync,
    Fun,
    Void,
    Break,
    Continue,
    Import,

    // === Type keywords ===
    IntType,
    RealType,
    CharType,
    TextType,
    ListType,
    ObjType,
    BlockType,
    StatementType,

    /// Capitalized aliases (`Integer`, `Text`, `Sync`, ...) reserved by the
    /// language but accepted nowhere in the grammar.
    Reserved(String),

    // === Punctuation ===
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Semicolon,
    Comma,

    // === Operators ===
    /// Assignment operator `=`
    Equal,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    AndAnd,
    OrOr,
    Bang,

    /// End-of-file marker - indicates no more tokens
    Eof,
}

impl TokenKind {
    /// Maps a word to its keyword kind, or `None` for a plain identifier.
    pub fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word {
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "return" => TokenKind::Return,
            "sync" => TokenKind::Sync,
            "fun" => TokenKind::Fun,
            "void" => TokenKind::Void,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "import" => TokenKind::Import,
            "int" => TokenKind::IntType,
            "real" => TokenKind::RealType,
            "char" => TokenKind::CharType,
            "text" => TokenKind::TextType,
            "list" => TokenKind::ListType,
            "obj" => TokenKind::ObjType,
            "block" => TokenKind::BlockType,
            "statement" => TokenKind::StatementType,
            "Sync" | "Fun" | "Integer" | "Real" | "Char" | "Text" | "List" | "Object"
            | "Block" | "Statement" => TokenKind::Reserved(word.to_string()),
            _ => return None,
        };
        Some(kind)
    }

    /// Returns `true` for every reserved word, including type keywords.
    pub fn is_keyword(&self) -> bool {
        !matches!(
            self,
            TokenKind::Ident(_)
                | TokenKind::Int(_)
                | TokenKind::Real(_)
                | TokenKind::Text(_)
                | TokenKind::Char(_)
                | TokenKind::Eof
        ) && !self.is_punctuation()
    }

    fn is_punctuation(&self) -> bool {
        matches!(
            self,
            TokenKind::LParen
                | TokenKind::RParen
                | TokenKind::LBracket
                | TokenKind::RBracket
                | TokenKind::LBrace
                | TokenKind::RBrace
                | TokenKind::Semicolon
                | TokenKind::Comma
                | TokenKind::Equal
                | TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Star
                | TokenKind::Slash
                | TokenKind::Percent
                | TokenKind::EqEq
                | TokenKind::NotEq
                | TokenKind::Less
                | TokenKind::LessEq
                | TokenKind::Greater
                | TokenKind::GreaterEq
                | TokenKind::AndAnd
                | TokenKind::OrOr
                | TokenKind::Bang
        )
    }

    /// Returns `true` for the keywords that can start a declaration.
    pub fn is_type_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::IntType
                | TokenKind::RealType
                | TokenKind::CharType
                | TokenKind::TextType
                | TokenKind::ListType
                | TokenKind::ObjType
                | TokenKind::BlockType
                | TokenKind::StatementType
                | TokenKind::Void
                | TokenKind::Fun
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(name) => write!(f, "identifier '{}'", name),
            TokenKind::Int(n) => write!(f, "number {}", n),
            TokenKind::Real(r) => write!(f, "number {:?}", r),
            TokenKind::Text(_) => write!(f, "text literal"),
            TokenKind::Char(_) => write!(f, "char literal"),
            TokenKind::Reserved(word) => write!(f, "reserved word '{}'", word),
            TokenKind::Eof => write!(f, "end of input"),
            other => write!(f, "'{}'", other.spelling()),
        }
    }
}

impl TokenKind {
    fn spelling(&self) -> &'static str {
        match self {
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::For => "for",
            TokenKind::Return => "return",
            TokenKind::Sync => "sync",
            TokenKind::Fun => "fun",
            TokenKind::Void => "void",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Import => "import",
            TokenKind::IntType => "int",
            TokenKind::RealType => "real",
            TokenKind::CharType => "char",
            TokenKind::TextType => "text",
            TokenKind::ListType => "list",
            TokenKind::ObjType => "obj",
            TokenKind::BlockType => "block",
            TokenKind::StatementType => "statement",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Semicolon => ";",
            TokenKind::Comma => ",",
            TokenKind::Equal => "=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Less => "<",
            TokenKind::LessEq => "<=",
            TokenKind::Greater => ">",
            TokenKind::GreaterEq => ">=",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::Bang => "!",
            _ => "",
        }
    }
}

/// A token with its source location information.
///
/// # Fields
///
/// - `kind`: The type and content of the token
/// - `lexeme`: The exact source text of the token (quotes included for literals)
/// - `line`: 1-based line number in the source file
/// - `col`: 1-based column number in the source file
///
/// # Usage in Error Reporting
///
/// ```text
/// Syntax error: unexpected ';' at 3:15
///   int a = 5 + ;
///               ^
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The type and semantic content of this token
    pub kind: TokenKind,

    /// Source spelling of this token
    pub lexeme: String,

    /// Line number in the source file (1-based)
    pub line: usize,

    /// Column number in the source file (1-based)
    pub col: usize,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            line,
            col,
        }
    }
}
