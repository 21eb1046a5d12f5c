use owo_colors::OwoColorize;
use udil_interpreter::{
    Binding, DelegateError, EvalError, ExecError, Report, ScopeError, SyncError,
};
use udil_syntax::error::{Error, ErrorKind};

fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Lex => "Lex error",
        ErrorKind::Syntax => "Parse error",
        ErrorKind::Other => "Error",
    }
}

/// Prints a front-end error with the offending source line and a caret.
pub fn render_error(source: &str, err: &Error) {
    eprintln!("{}: {}", kind_label(err.kind).red().bold(), err.msg.red());
    if let (Some(line), Some(col)) = (err.line, err.col) {
        eprintln!("  --> line {}, column {}", line, col);
        if let Some(src_line) = line.checked_sub(1).and_then(|i| source.lines().nth(i)) {
            let gutter = format!("{:3} | ", line);
            eprintln!("     |");
            eprintln!("{}{}", gutter.bright_black(), src_line);
            let marker = format!("{}{}^", " ".repeat(gutter.len()), " ".repeat(col.saturating_sub(1)));
            eprintln!("{}{}", marker.red(), " error here".red());
            eprintln!("     |");
        }
    }
    syntax_suggestions(&err.msg);
}

/// Prints one failed statement.
pub fn render_report(report: &Report) {
    eprintln!(
        "{}: {}: {}",
        format!("line {}", report.position).red().bold(),
        report.text.bright_black(),
        report.error.to_string().red()
    );
    runtime_suggestions(&report.error);
}

/// One `name: type = value` line per binding, uncolored so it can be piped.
pub fn print_bindings(bindings: &[(String, Binding)]) {
    if bindings.is_empty() {
        println!("{}", "<no vars>".dimmed());
        return;
    }
    for (name, binding) in bindings {
        println!("{}: {} = {}", name, binding.ty, binding.value);
    }
}

fn help(line: &str) {
    eprintln!("{}", format!("Help: {}", line).yellow());
}

fn example(line: &str) {
    eprintln!("    {}", line.bright_black());
}

fn syntax_suggestions(msg: &str) {
    if msg.contains("Unterminated block comment") {
        help("Every '/*' needs a matching '*/'.");
    } else if msg.contains("Unterminated") {
        help("A text or char literal is missing its closing quote.");
    } else if msg.contains("Illegal character") {
        help("Only letters, digits, operators and ( ) [ ] { } ; , are allowed outside literals.");
    } else if msg.contains("expected ';'") {
        help("Statements end with ';'.");
        example("int a = 1;");
    } else if msg.contains("expected '='") && msg.contains("sync") {
        help("A sync write needs a value.");
        example("sync(\"context-in\", \"a\") = a;");
    }
}

fn runtime_suggestions(error: &ExecError) {
    match error {
        ExecError::Scope(ScopeError::Undefined(_)) | ExecError::Eval(EvalError::Undefined(_)) => {
            help("Declare the variable with a type before assigning to it.");
            example("int a;  a = 20;");
        }
        ExecError::Scope(ScopeError::AlreadyDeclared(_)) => {
            help("Names can be declared once per scope; assign to change the value.");
        }
        ExecError::ValueTypeMismatch { .. } | ExecError::Scope(ScopeError::TypeMismatch { .. }) => {
            help("The value's type must match the declared type; write 2.0 for a real.");
        }
        ExecError::Eval(EvalError::NoGrammarMatched(_)) => {
            help("The expression is not valid arithmetic, text concatenation, or a list/name reference.");
        }
        ExecError::IndexTooLarge { .. } => {
            help("Indexed stores grow a list one element at a time; use a smaller index.");
        }
        ExecError::NotExecutable(_) => {
            help("for loops, functions and return are parsed but never run; use while instead.");
        }
        ExecError::Sync(SyncError::UnknownChannel(_)) => {
            help("Channels: context-in, context-out, context-current, program, statement, udil, java, python.");
        }
        ExecError::Sync(SyncError::MissingContextOut(_)) => {
            help("Register the name first.");
            example("sync(\"context-out\", \"b\") = 0;");
        }
        ExecError::Sync(SyncError::Delegate(DelegateError::Io(_))) => {
            help("The delegate executable could not be started; check --python, --javac and --java.");
        }
        ExecError::Sync(SyncError::Delegate(DelegateError::EntryPointNotFound)) => {
            help("The JVM program needs a 'public class Name {' declaration.");
        }
        _ => {}
    }
}
