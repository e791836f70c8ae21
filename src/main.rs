use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use loxrs::ast_printer::AstPrinter;
use loxrs::error::LoxError;
use loxrs::interpreter::Interpreter;
use loxrs::parser::Parser;
use loxrs::resolver::Resolver;
use loxrs::scanner::Scanner;
use loxrs::token::Token;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize { filename: Option<PathBuf> },

    /// Parses input from a file as a single expression and prints its AST
    Parse { filename: Option<PathBuf> },

    /// Evaluates input from a file as a single expression and prints the result
    Evaluate { filename: Option<PathBuf> },

    /// Runs input from a file as a Lox program
    Run { filename: Option<PathBuf> },
}

/// Static (lex/parse/resolve) errors exit with 65, runtime errors with 70.
const EXIT_STATIC_ERROR: i32 = 65;
const EXIT_RUNTIME_ERROR: i32 = 70;

fn read_file(filename: PathBuf) -> Result<Vec<u8>> {
    info!("Reading file: {:?}", filename);

    let file = File::open(&filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    let bytes = reader
        .read_to_end(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    Ok(buf)
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("loxrs::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));

            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // override with RUST_LOG
        .init();

    info!("Logger initialized, writing to app.log");

    Ok(())
}

/// Scan the whole buffer up front. Lexical errors are printed but do not
/// stop the scan, so every bad character in the file is reported at once.
fn scan_all(buf: &[u8]) -> std::result::Result<Vec<Token<'_>>, ()> {
    let mut tokens = Vec::new();
    let mut failed = false;

    for token in Scanner::new(buf) {
        match token {
            Ok(token) => tokens.push(token),
            Err(e) => {
                debug!("Lex error: {}", e);
                eprintln!("{}", e);
                failed = true;
            }
        }
    }

    if failed {
        Err(())
    } else {
        Ok(tokens)
    }
}

fn report_all(errors: &[LoxError]) {
    for e in errors {
        debug!("Static error: {}", e);
        eprintln!("{}", e);
    }
}

fn no_input_file() -> ! {
    println!("No input filepath was provided. Exiting...");
    std::process::exit(0);
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        // Minimal logger so log macros never hit an uninitialized backend.
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match args.commands {
        Commands::Tokenize { filename } => {
            let Some(filename) = filename else {
                no_input_file()
            };

            info!("Running Tokenize subcommand");

            let buf = read_file(filename)?;
            let mut failed = false;

            for token in Scanner::new(&buf) {
                match token {
                    Ok(token) => {
                        debug!("Scanned token: {}", token);
                        println!("{}", token);
                    }
                    Err(e) => {
                        debug!("Lex error: {}", e);
                        eprintln!("{}", e);
                        failed = true;
                    }
                }
            }

            if failed {
                std::process::exit(EXIT_STATIC_ERROR);
            }

            info!("Tokenization completed successfully");
        }

        Commands::Parse { filename } => {
            let Some(filename) = filename else {
                no_input_file()
            };

            info!("Running Parse subcommand");

            let buf = read_file(filename)?;

            let Ok(tokens) = scan_all(&buf) else {
                std::process::exit(EXIT_STATIC_ERROR);
            };

            match Parser::new(&tokens).parse_expression() {
                Ok(expr) => {
                    let ast_str = AstPrinter.print(&expr);

                    debug!("AST: {}", ast_str);
                    println!("{}", ast_str);
                }

                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(EXIT_STATIC_ERROR);
                }
            }

            info!("Parse subcommand completed");
        }

        Commands::Evaluate { filename } => {
            let Some(filename) = filename else {
                no_input_file()
            };

            info!("Running Evaluate subcommand");

            let buf = read_file(filename)?;

            let Ok(tokens) = scan_all(&buf) else {
                std::process::exit(EXIT_STATIC_ERROR);
            };

            let expr = match Parser::new(&tokens).parse_expression() {
                Ok(expr) => expr,
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(EXIT_STATIC_ERROR);
                }
            };

            match Interpreter::new().evaluate(&expr) {
                Ok(value) => {
                    debug!("Evaluated to: {}", value);
                    println!("{}", value);
                }

                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(EXIT_RUNTIME_ERROR);
                }
            }

            info!("Evaluate subcommand completed");
        }

        Commands::Run { filename } => {
            let Some(filename) = filename else {
                no_input_file()
            };

            info!("Running Run subcommand");

            let buf = read_file(filename)?;

            let Ok(tokens) = scan_all(&buf) else {
                std::process::exit(EXIT_STATIC_ERROR);
            };

            let statements = match Parser::new(&tokens).parse() {
                Ok(statements) => statements,
                Err(errors) => {
                    report_all(&errors);
                    std::process::exit(EXIT_STATIC_ERROR);
                }
            };

            info!("Parsed {} statement(s)", statements.len());

            let locals = match Resolver::new().resolve(&statements) {
                Ok(locals) => locals,
                Err(errors) => {
                    report_all(&errors);
                    std::process::exit(EXIT_STATIC_ERROR);
                }
            };

            if let Err(e) = Interpreter::new().interpret(&statements, locals) {
                debug!("Runtime error: {}", e);
                eprintln!("{}", e);
                std::process::exit(EXIT_RUNTIME_ERROR);
            }

            info!("Program executed successfully");
        }
    }

    Ok(())
}
