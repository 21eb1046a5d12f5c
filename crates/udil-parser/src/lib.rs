pub mod parser;

pub use parser::{Parser, MAX_NESTING};

use udil_syntax::ast::Program;
use udil_syntax::error::Result;

/// Lexes and parses a complete program.
pub fn parse_source(src: &str) -> Result<Program> {
    let tokens = udil_lexer::tokenize(src)?;
    Parser::new(tokens).parse_program()
}
