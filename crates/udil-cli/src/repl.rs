use std::io::{self, Write};

use owo_colors::OwoColorize;
use udil_interpreter::Interpreter;
use udil_syntax::token::TokenKind;

use crate::common::{print_bindings, render_error, render_report};

pub fn start_repl(mut interpreter: Interpreter) {
    println!("{}", "UDIL REPL. Type :help for help, :quit to exit.".bold().green());

    let mut buffer = String::new();
    loop {
        let prompt = if buffer.is_empty() {
            "udil> ".cyan().to_string()
        } else {
            "... > ".cyan().to_string()
        };
        print!("{}", prompt);
        if let Err(error) = io::stdout().flush() {
            tracing::warn!(%error, "could not flush the prompt");
        }

        let mut line = String::new();
        let n = match io::stdin().read_line(&mut line) {
            Ok(n) => n,
            Err(_) => {
                println!("<input error>");
                break;
            }
        };
        if n == 0 {
            println!("\nGoodbye.");
            break;
        }
        let trimmed = line.trim_end();

        if buffer.is_empty() && trimmed.starts_with(':') {
            match trimmed {
                ":quit" | ":q" | ":exit" => {
                    println!("Goodbye.");
                    break;
                }
                ":help" | ":h" => {
                    println!("{}", "Commands:".bold());
                    println!("  {}  {}", ":help".yellow(), "Show this help");
                    println!("  {}  {}", ":vars".yellow(), "List visible variables");
                    println!("  {}  {}", ":pc".yellow(), "Show the program counter");
                    println!("  {}  {}", ":reset".yellow(), "Clear variables, program and sync state");
                    println!("  {}  {}", ":quit".yellow(), "Exit the REPL");
                    println!("Statements run as soon as braces balance and the input ends with ';' or '}}'.");
                    continue;
                }
                ":vars" => {
                    print_bindings(&interpreter.table().visible_bindings());
                    continue;
                }
                ":pc" => {
                    println!("{}", interpreter.pc_counter());
                    continue;
                }
                ":reset" => {
                    interpreter.reset();
                    println!("{}", "State reset.".yellow());
                    continue;
                }
                _ => {
                    println!("{}", "Unknown command. Type :help.".red());
                    continue;
                }
            }
        }

        buffer.push_str(&line);
        if !is_complete(&buffer) {
            continue;
        }

        match udil_parser::parse_source(&buffer) {
            Ok(program) => {
                for stmt in &program.statements {
                    interpreter.parse_statement(stmt);
                }
                for report in interpreter.take_reports() {
                    render_report(&report);
                }
            }
            Err(e) => render_error(&buffer, &e),
        }
        buffer.clear();
    }
}

/// Input is complete once brackets balance and it ends a statement.
fn is_complete(input: &str) -> bool {
    let tokens = match udil_lexer::tokenize(input) {
        Ok(t) => t,
        Err(_) => return false,
    };
    let mut depth = 0i32;
    let mut last = None;
    for tk in tokens.iter() {
        match &tk.kind {
            TokenKind::LBrace | TokenKind::LParen | TokenKind::LBracket => depth += 1,
            TokenKind::RBrace | TokenKind::RParen | TokenKind::RBracket => depth -= 1,
            TokenKind::Eof => continue,
            _ => {}
        }
        last = Some(&tk.kind);
    }
    depth <= 0 && matches!(last, Some(TokenKind::Semicolon | TokenKind::RBrace))
}

#[cfg(test)]
mod tests {
    use super::is_complete;

    #[test]
    fn test_is_complete() {
        assert!(is_complete("int a = 1;"));
        assert!(is_complete("if (a) {\n a = 1;\n}"));
        assert!(!is_complete("if (a) {\n a = 1;"));
        assert!(!is_complete("int a = 1"));
        assert!(!is_complete("text t = \"open"));
    }
}
