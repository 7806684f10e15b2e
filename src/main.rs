use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, ValueEnum};

use nol::bytecode::disassemble;
use nol::scanner::Scanner;
use nol::{ErrorPolicy, Session};

const EXIT_USAGE: u8 = 64;
const EXIT_COMPILE_ERROR: u8 = 65;
const EXIT_RUNTIME_ERROR: u8 = 70;
const EXIT_IO_ERROR: u8 = 74;

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum OnError {
    /// Report every diagnostic the compiler can find
    #[default]
    Continue,
    /// Stop compiling at the first diagnostic
    Abort,
}

impl From<OnError> for ErrorPolicy {
    fn from(value: OnError) -> Self {
        match value {
            OnError::Continue => ErrorPolicy::Continue,
            OnError::Abort => ErrorPolicy::Abort,
        }
    }
}

#[derive(Parser)]
#[command(name = "nol", bin_name = "nol")]
#[command(about = "Compile and run typed expressions on a bytecode VM")]
struct Cli {
    /// Script to run; starts a REPL when omitted
    path: Option<PathBuf>,

    /// How the compiler proceeds after a diagnostic
    #[arg(long, value_enum, default_value_t)]
    on_error: OnError,

    /// Execute the bytecode even when compilation reported errors
    #[arg(long)]
    run_on_error: bool,

    /// Print the compiled bytecode before running it
    #[arg(long)]
    disassemble: bool,

    /// Print the token stream before compiling
    #[arg(long)]
    tokens: bool,
}

/// How a single compile-and-run cycle ended.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Outcome {
    Ok,
    CompileError,
    RuntimeError,
}

impl Outcome {
    fn exit_code(self) -> u8 {
        match self {
            Outcome::Ok => 0,
            Outcome::CompileError => EXIT_COMPILE_ERROR,
            Outcome::RuntimeError => EXIT_RUNTIME_ERROR,
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let mut session = Session::new(cli.on_error.into());
    let result = match &cli.path {
        Some(path) => run_file(&cli, &mut session, path),
        None => repl(&cli, &mut session),
    };

    match result {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(EXIT_IO_ERROR)
        }
    }
}

fn run_file(cli: &Cli, session: &mut Session, path: &Path) -> anyhow::Result<Outcome> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("Could not read file \"{}\".", path.display()))?;
    log::info!("running {}", path.display());
    Ok(execute(cli, session, &source))
}

fn repl(cli: &Cli, session: &mut Session) -> anyhow::Result<Outcome> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();

    loop {
        print!("> ");
        stdout.flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            return Ok(Outcome::Ok);
        }

        execute(cli, session, &line);
    }
}

fn execute(cli: &Cli, session: &mut Session, source: &str) -> Outcome {
    if cli.tokens {
        print_tokens(source);
    }

    let compilation = session.compile(source);
    for diagnostic in &compilation.diagnostics {
        eprintln!("{diagnostic}");
    }

    if cli.disassemble {
        print!("{}", disassemble(session.code()));
    }

    if compilation.had_error() && !cli.run_on_error {
        return Outcome::CompileError;
    }

    let outcome = match session.run() {
        Ok(value) => {
            println!("{value}");
            Outcome::Ok
        }
        Err(err) => {
            eprintln!("Runtime error: {err}");
            Outcome::RuntimeError
        }
    };

    if compilation.had_error() {
        Outcome::CompileError
    } else {
        outcome
    }
}

/// One token per line, with the line number shown only when it changes.
fn print_tokens(source: &str) {
    let mut line = 0;
    for token in Scanner::new(source) {
        if token.line != line {
            print!("{:4} ", token.line);
            line = token.line;
        } else {
            print!("   | ");
        }
        println!("{:<14} '{}'", format!("{:?}", token.kind), token.lexeme);
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn outcome(args: &[&str], source: &str) -> Outcome {
        let cli = Cli::parse_from(std::iter::once("nol").chain(args.iter().copied()));
        let mut session = Session::new(cli.on_error.into());
        execute(&cli, &mut session, source)
    }

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn success() {
        assert_eq!(outcome(&[], "1 + 2"), Outcome::Ok);
        assert_eq!(outcome(&[], "1 + 2").exit_code(), 0);
    }

    #[test]
    fn compile_error_is_not_run() {
        assert_eq!(outcome(&[], "1 +"), Outcome::CompileError);
        assert_eq!(outcome(&[], "1 == true"), Outcome::CompileError);
        assert_eq!(outcome(&["--on-error", "abort"], "1 +").exit_code(), 65);
    }

    #[test]
    fn runtime_error() {
        assert_eq!(outcome(&[], "1 / 0"), Outcome::RuntimeError);
        assert_eq!(outcome(&[], "1 / 0").exit_code(), 70);
        assert_eq!(outcome(&["--run-on-error"], "1 / 0"), Outcome::RuntimeError);
    }

    #[test]
    fn run_on_error_still_reports_compile_error() {
        // Runs to completion and prints 1.
        assert_eq!(outcome(&["--run-on-error"], "1 +"), Outcome::CompileError);
        // Fails at run time too, the compile error wins.
        assert_eq!(outcome(&["--run-on-error"], "1 == true"), Outcome::CompileError);
        assert_eq!(outcome(&["--run-on-error"], "1 +").exit_code(), 65);
    }
}
