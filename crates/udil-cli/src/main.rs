mod common;
mod repl;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use owo_colors::OwoColorize;
use udil_interpreter::{Interpreter, Toolchain};
use udil_syntax::ast::Program;

#[derive(Parser, Debug)]
#[command(name = "udil", version, about = "Run, format and explore UDIL programs")]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    toolchain: ToolchainArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args, Debug)]
struct ToolchainArgs {
    /// Python executable used by `sync("program", "python")`
    #[arg(long, env = "UDIL_PYTHON", default_value = "python3", global = true)]
    python: String,

    /// Java compiler used by `sync("program", "java")`
    #[arg(long, env = "UDIL_JAVAC", default_value = "javac", global = true)]
    javac: String,

    /// Java launcher used by `sync("program", "java")`
    #[arg(long, env = "UDIL_JAVA", default_value = "java", global = true)]
    java: String,
}

impl From<ToolchainArgs> for Toolchain {
    fn from(args: ToolchainArgs) -> Self {
        Toolchain {
            python: args.python,
            javac: args.javac,
            java: args.java,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a program
    Run {
        file: PathBuf,
        /// Print the final top-level bindings
        #[arg(long)]
        vars: bool,
        /// Do not print statement failures
        #[arg(long, short)]
        quiet: bool,
    },
    /// Re-render a program in canonical statement text
    Fmt {
        file: PathBuf,
        /// Exit non-zero if the file is not already canonical
        #[arg(long, conflicts_with = "write")]
        check: bool,
        /// Rewrite the file in place
        #[arg(long)]
        write: bool,
    },
    /// Start an interactive session (the default)
    Repl,
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = match verbose {
        0 => std::env::var("UDIL_LOG")
            .ok()
            .and_then(|directives| EnvFilter::try_new(directives).ok())
            .or_else(|| EnvFilter::try_from_default_env().ok())
            .unwrap_or_else(|| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(filter)
        .init();
}

fn read_source(path: &Path) -> Result<String, ExitCode> {
    fs::read_to_string(path).map_err(|e| {
        eprintln!(
            "{}: {}",
            "error".red().bold(),
            format!("Failed to read {}: {}", path.display(), e).red()
        );
        ExitCode::FAILURE
    })
}

fn render(program: &Program) -> String {
    let mut out = String::new();
    for stmt in &program.statements {
        out.push_str(&stmt.to_string());
        out.push('\n');
    }
    out
}

fn run(interp: &mut Interpreter, path: &Path, vars: bool, quiet: bool) -> ExitCode {
    let src = match read_source(path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    if let Err(e) = interp.parse_program(&src) {
        common::render_error(&src, &e);
        return ExitCode::FAILURE;
    }
    let clean = interp.exec_root();
    if !quiet {
        for report in interp.reports() {
            common::render_report(report);
        }
    }
    if vars {
        common::print_bindings(&interp.table().root_bindings());
    }
    if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn fmt(path: &Path, check: bool, write: bool) -> ExitCode {
    let src = match read_source(path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let program = match udil_parser::parse_source(&src) {
        Ok(p) => p,
        Err(e) => {
            common::render_error(&src, &e);
            return ExitCode::FAILURE;
        }
    };
    let rendered = render(&program);
    if check {
        if rendered == src {
            return ExitCode::SUCCESS;
        }
        eprintln!("{} is not canonical", path.display());
        return ExitCode::FAILURE;
    }
    if write {
        if let Err(e) = fs::write(path, &rendered) {
            eprintln!(
                "{}: {}",
                "error".red().bold(),
                format!("Failed to write {}: {}", path.display(), e).red()
            );
            return ExitCode::FAILURE;
        }
        return ExitCode::SUCCESS;
    }
    print!("{}", rendered);
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut interp = Interpreter::new();
    *interp.toolchain_mut() = cli.toolchain.into();

    match cli.command.unwrap_or(Command::Repl) {
        Command::Run { file, vars, quiet } => run(&mut interp, &file, vars, quiet),
        Command::Fmt { file, check, write } => fmt(&file, check, write),
        Command::Repl => {
            repl::start_repl(interp);
            ExitCode::SUCCESS
        }
    }
}
