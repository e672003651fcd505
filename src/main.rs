//! minicc
//!
//! Compiles minic, a small C subset, to MIPS assembly for the SPIM simulator.

mod backend;
mod config;
mod driver;
mod feedback;
mod frontend;
mod stdlib;
mod types;
mod utils;

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::info;

use config::{CompilerOptions, ErrorFormat};
use driver::{CompileFailure, Compilation};
use feedback::{CompilationFeedback, CompilationStats, ErrorReport};
use frontend::lexer::Lexer;
use frontend::token::TokenKind;

/// minic compiler
#[derive(Parser, Debug)]
#[command(name = "minicc")]
#[command(version = "0.1.0")]
#[command(about = "minic compiler - C subset to MIPS assembly")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input source file
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output file (defaults to the input with an .asm extension)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Function the program starts in
    #[arg(long, default_value = "main", global = true)]
    entry: String,

    /// Leave comments out of the generated assembly
    #[arg(long, global = true)]
    no_comments: bool,

    /// How errors are printed
    #[arg(long, value_enum, default_value_t = ErrorFormat::Human, global = true)]
    error_format: ErrorFormat,

    /// Print the token stream and stop
    #[arg(long, global = true)]
    emit_tokens: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a source file
    Build {
        /// Input source file
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check a source file for errors
    Check {
        /// Input source file
        input: PathBuf,
    },
}

impl Cli {
    fn options(&self) -> CompilerOptions {
        CompilerOptions::default()
            .with_entry(self.entry.clone())
            .with_annotations(!self.no_comments)
            .with_error_format(self.error_format)
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Some(Commands::Build { input, output }) => compile_file(input, output.clone(), &cli),
        Some(Commands::Check { input }) => check_file(input, &cli),
        None => match &cli.input {
            Some(input) => compile_file(input, cli.output.clone(), &cli),
            None => {
                eprintln!("Error: No input file specified");
                eprintln!("Usage: minicc <FILE> or minicc build <FILE>");
                process::exit(2);
            }
        },
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn read_source(input: &Path) -> anyhow::Result<String> {
    fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))
}

fn print_tokens(source: &str) {
    let mut lexer = Lexer::new(source, 0);
    loop {
        let token = lexer.next_token();
        println!("{:>5}..{:<5} {:?}", token.span.start, token.span.end, token.kind);
        if token.kind == TokenKind::Eof {
            break;
        }
    }
}

/// Compile a source file. Returns false if the program had errors.
fn compile_file(input: &Path, output: Option<PathBuf>, cli: &Cli) -> anyhow::Result<bool> {
    let source = read_source(input)?;
    if cli.emit_tokens {
        print_tokens(&source);
        return Ok(true);
    }

    let options = cli.options();
    info!("compiling {} with entry '{}'", input.display(), options.entry);

    match driver::compile_source(&source, &options) {
        Ok(Compilation { assembly, stats, .. }) => {
            let out_path = output.unwrap_or_else(|| input.with_extension("asm"));
            fs::write(&out_path, assembly.to_string())
                .with_context(|| format!("writing {}", out_path.display()))?;

            if options.error_format == ErrorFormat::Json {
                let feedback = CompilationFeedback::success(input.display().to_string(), stats);
                println!("{}", feedback.to_json());
            } else {
                println!("Wrote {}", out_path.display());
            }
            Ok(true)
        }
        Err(failure) => {
            report_failure(input, &source, &failure, options.error_format);
            Ok(false)
        }
    }
}

/// Check a source file for errors without generating code
fn check_file(input: &Path, cli: &Cli) -> anyhow::Result<bool> {
    let source = read_source(input)?;
    if cli.emit_tokens {
        print_tokens(&source);
        return Ok(true);
    }

    match driver::check_source(&source) {
        Ok(analysis) => {
            let stats = driver::stats_for(&analysis.program, &source);
            if cli.error_format == ErrorFormat::Json {
                let feedback = CompilationFeedback::success(input.display().to_string(), stats);
                println!("{}", feedback.to_json());
            } else {
                println!("No errors found");
            }
            Ok(true)
        }
        Err(failure) => {
            report_failure(input, &source, &failure, cli.error_format);
            Ok(false)
        }
    }
}

fn report_failure(input: &Path, source: &str, failure: &CompileFailure, format: ErrorFormat) {
    let file = input.display().to_string();
    let reports: Vec<ErrorReport> = failure
        .errors
        .iter()
        .map(|e| ErrorReport::from_error(e, &file, source))
        .collect();

    match format {
        ErrorFormat::Json => {
            let stats = CompilationStats {
                loc: source.lines().count(),
                ..CompilationStats::default()
            };
            let feedback = CompilationFeedback::failure(file, reports, stats);
            println!("{}", feedback.to_json());
        }
        ErrorFormat::Human => {
            for report in &reports {
                eprintln!("{}", report);
            }
            eprintln!("{}", failure);
        }
    }
}
