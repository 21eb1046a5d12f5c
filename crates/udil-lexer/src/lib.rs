//! UDIL lexer: converts source text into tokens.
//!
//! Source goes through a comment-stripping pre-pass first. Comments are
//! blanked with spaces while line breaks are kept, so every token still
//! reports the row and column it had in the original text.
use udil_syntax::error::{error_at, Error, Result};
use udil_syntax::token::{Token, TokenKind};

/// Blanks `// ...` and `/* ... */` comments, preserving line breaks.
///
/// Comment markers inside text or char literals are left alone. An
/// unterminated `/*` or a `*/` with no opening marker is a lexical error at
/// the marker's position.
pub fn strip_comments(src: &str) -> Result<String> {
    let chars: Vec<char> = src.chars().collect();
    let mut out = String::with_capacity(src.len());
    let mut i = 0usize;
    let (mut line, mut col) = (1usize, 1usize);
    let mut quote: Option<char> = None;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(n) = next {
                    out.push(n);
                    i += 1;
                    if n == '\n' {
                        line += 1;
                        col = 0;
                    } else {
                        col += 1;
                    }
                }
            } else if c == q {
                quote = None;
            }
        } else if c == '"' || c == '\'' {
            quote = Some(c);
            out.push(c);
        } else if c == '/' && next == Some('/') {
            while i < chars.len() && chars[i] != '\n' {
                out.push(' ');
                i += 1;
                col += 1;
            }
            continue;
        } else if c == '/' && next == Some('*') {
            let (start_line, start_col) = (line, col);
            out.push_str("  ");
            i += 2;
            col += 2;
            loop {
                match (chars.get(i), chars.get(i + 1)) {
                    (Some('*'), Some('/')) => {
                        out.push_str("  ");
                        i += 2;
                        col += 2;
                        break;
                    }
                    (Some('\n'), _) => {
                        out.push('\n');
                        i += 1;
                        line += 1;
                        col = 1;
                    }
                    (Some(_), _) => {
                        out.push(' ');
                        i += 1;
                        col += 1;
                    }
                    (None, _) => {
                        return error_at(start_line, start_col, "Unterminated block comment");
                    }
                }
            }
            continue;
        } else if c == '*' && next == Some('/') {
            return error_at(line, col, "Unmatched '*/' outside of a block comment");
        } else {
            out.push(c);
        }
        if c == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
        i += 1;
    }
    Ok(out)
}

/// Streaming character scanner that produces tokens with positions.
pub struct Lexer {
    src: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    diagnostics: Vec<Error>,
}

impl Lexer {
    /// Create a new lexer over the given source string.
    pub fn new(input: &str) -> Self {
        Self {
            src: input.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            diagnostics: Vec::new(),
        }
    }

    /// Every problem found by the last [`Lexer::tokenize`] call, in source order.
    pub fn diagnostics(&self) -> &[Error] {
        &self.diagnostics
    }

    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }
    fn peek_next(&self) -> Option<char> {
        self.src.get(self.pos + 1).copied()
    }
    fn advance(&mut self) -> Option<char> {
        let ch = self.src.get(self.pos).copied();
        if let Some(c) = ch {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        ch
    }

    fn slice(&self, start: usize) -> String {
        self.src[start..self.pos].iter().collect()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> Result<Token> {
        let (start, line, col) = (self.pos, self.line, self.col);
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        let is_real = self.peek() == Some('.') && matches!(self.peek_next(), Some(c) if c.is_ascii_digit());
        if is_real {
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        let lexeme = self.slice(start);
        let kind = if is_real {
            TokenKind::Real(lexeme.parse().map_err(|_| Error::lex("Invalid number", line, col))?)
        } else {
            TokenKind::Int(lexeme.parse().map_err(|_| Error::lex("Invalid number", line, col))?)
        };
        Ok(Token::new(kind, lexeme, line, col))
    }

    fn read_ident_or_keyword(&mut self) -> Token {
        let (start, line, col) = (self.pos, self.line, self.col);
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.advance();
        }
        let word = self.slice(start);
        let kind = TokenKind::keyword(&word).unwrap_or_else(|| TokenKind::Ident(word.clone()));
        Token::new(kind, word, line, col)
    }

    /// Reads a quoted literal; the opening quote has not been consumed yet.
    fn read_quoted(&mut self, quote: char) -> Result<Token> {
        let (start, line, col) = (self.pos, self.line, self.col);
        self.advance();
        let mut s = String::new();
        while let Some(c) = self.advance() {
            match c {
                c if c == quote => {
                    let kind = if quote == '"' {
                        TokenKind::Text(s)
                    } else {
                        TokenKind::Char(s)
                    };
                    return Ok(Token::new(kind, self.slice(start), line, col));
                }
                '\\' => match self.advance() {
                    Some(n) => s.push(match n {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    }),
                    None => break,
                },
                other => s.push(other),
            }
        }
        let what = if quote == '"' { "text" } else { "char" };
        error_at(line, col, format!("Unterminated {} literal", what))
    }

    fn single(&mut self, kind: TokenKind) -> Token {
        let (start, line, col) = (self.pos, self.line, self.col);
        self.advance();
        Token::new(kind, self.slice(start), line, col)
    }

    /// Consumes the current char, plus the next one if it equals `second`.
    fn one_or_two(&mut self, second: char, one: TokenKind, two: TokenKind) -> Token {
        let (start, line, col) = (self.pos, self.line, self.col);
        self.advance();
        let kind = if self.peek() == Some(second) {
            self.advance();
            two
        } else {
            one
        };
        Token::new(kind, self.slice(start), line, col)
    }

    /// Tokenize the entire input into a vector of tokens ending with Eof.
    ///
    /// Unrecognized characters are skipped and recorded; if any were seen the
    /// call fails with the first one after scanning the rest of the input.
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let stripped: String = strip_comments(&self.src.iter().collect::<String>())?;
        self.src = stripped.chars().collect();
        self.pos = 0;
        self.line = 1;
        self.col = 1;
        self.diagnostics.clear();

        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let (line, col) = (self.line, self.col);
            let tk = match self.peek() {
                None => {
                    tokens.push(Token::new(TokenKind::Eof, "", line, col));
                    break;
                }
                Some('(') => self.single(TokenKind::LParen),
                Some(')') => self.single(TokenKind::RParen),
                Some('[') => self.single(TokenKind::LBracket),
                Some(']') => self.single(TokenKind::RBracket),
                Some('{') => self.single(TokenKind::LBrace),
                Some('}') => self.single(TokenKind::RBrace),
                Some(';') => self.single(TokenKind::Semicolon),
                Some(',') => self.single(TokenKind::Comma),
                Some('+') => self.single(TokenKind::Plus),
                Some('-') => self.single(TokenKind::Minus),
                Some('*') => self.single(TokenKind::Star),
                Some('/') => self.single(TokenKind::Slash),
                Some('%') => self.single(TokenKind::Percent),
                Some('=') => self.one_or_two('=', TokenKind::Equal, TokenKind::EqEq),
                Some('!') => self.one_or_two('=', TokenKind::Bang, TokenKind::NotEq),
                Some('<') => self.one_or_two('=', TokenKind::Less, TokenKind::LessEq),
                Some('>') => self.one_or_two('=', TokenKind::Greater, TokenKind::GreaterEq),
                Some('&') if self.peek_next() == Some('&') => {
                    self.one_or_two('&', TokenKind::AndAnd, TokenKind::AndAnd)
                }
                Some('|') if self.peek_next() == Some('|') => {
                    self.one_or_two('|', TokenKind::OrOr, TokenKind::OrOr)
                }
                Some('"') => self.read_quoted('"')?,
                Some('\'') => self.read_quoted('\'')?,
                Some(c) if c.is_ascii_digit() => self.read_number()?,
                Some(c) if c.is_ascii_alphabetic() || c == '_' => self.read_ident_or_keyword(),
                Some(other) => {
                    self.diagnostics
                        .push(Error::lex(format!("Illegal character '{}'", other), line, col));
                    self.advance();
                    continue;
                }
            };
            tokens.push(tk);
        }
        match self.diagnostics.first() {
            Some(first) => Err(first.clone()),
            None => Ok(tokens),
        }
    }
}

/// Tokenizes `input` in one call.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    Lexer::new(input).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use udil_syntax::ErrorKind;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .expect("Lexing should succeed")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_operators_and_punctuation() {
        assert_eq!(
            kinds("a<=b!=c&&!d||e%2"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::LessEq,
                TokenKind::Ident("b".into()),
                TokenKind::NotEq,
                TokenKind::Ident("c".into()),
                TokenKind::AndAnd,
                TokenKind::Bang,
                TokenKind::Ident("d".into()),
                TokenKind::OrOr,
                TokenKind::Ident("e".into()),
                TokenKind::Percent,
                TokenKind::Int(2),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers_keep_lexemes() {
        let tokens = tokenize("3.50 42").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Real(3.5));
        assert_eq!(tokens[0].lexeme, "3.50");
        assert_eq!(tokens[1].kind, TokenKind::Int(42));
    }

    #[test]
    fn test_text_literal_spans_lines() {
        let tokens = tokenize("text p = \"\nb = a + 76\n\";\nint x;").unwrap();
        assert_eq!(tokens[3].kind, TokenKind::Text("\nb = a + 76\n".into()));
        assert_eq!(tokens[3].lexeme, "\"\nb = a + 76\n\"");
        let int_kw = tokens.iter().find(|t| t.kind == TokenKind::IntType).unwrap();
        assert_eq!((int_kw.line, int_kw.col), (4, 1));
    }

    #[test]
    fn test_escapes() {
        let tokens = tokenize(r#""say \"hi\"\n" 'x'"#).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Text("say \"hi\"\n".into()));
        assert_eq!(tokens[1].kind, TokenKind::Char("x".into()));
    }

    #[test]
    fn test_comments_preserve_positions() {
        let src = "int a; // trailing\n/* multi\nline */ int b;";
        let tokens = tokenize(src).unwrap();
        let b = tokens
            .iter()
            .find(|t| t.kind == TokenKind::Ident("b".into()))
            .unwrap();
        assert_eq!((b.line, b.col), (3, 13));
    }

    #[test]
    fn test_comment_markers_inside_text() {
        let tokens = tokenize("text u = \"http://x/*y\";").unwrap();
        assert_eq!(tokens[3].kind, TokenKind::Text("http://x/*y".into()));
    }

    #[test]
    fn test_unterminated_block_comment() {
        let err = tokenize("int a;\n  /* never closed").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Lex);
        assert_eq!((err.line, err.col), (Some(2), Some(3)));

        let err = tokenize("a */").unwrap_err();
        assert_eq!((err.line, err.col), (Some(1), Some(3)));
    }

    #[test]
    fn test_illegal_characters_are_collected() {
        let mut lexer = Lexer::new("int a = 1 $ 2 @;");
        let err = lexer.tokenize().unwrap_err();
        assert!(err.msg.contains("'$'"));
        assert_eq!(lexer.diagnostics().len(), 2);
        assert_eq!(lexer.diagnostics()[1].col, Some(15));
    }

    #[test]
    fn test_reserved_aliases() {
        assert_eq!(kinds("Integer")[0], TokenKind::Reserved("Integer".into()));
        assert_eq!(kinds("statement")[0], TokenKind::StatementType);
    }

    #[test]
    fn test_unterminated_text() {
        let err = tokenize("text a = \"open").unwrap_err();
        assert!(err.msg.contains("Unterminated text"));
    }
}
