//! Binary entry point for the doxbind CLI.
//!
//! ```bash
//! # Expand wrapper.cc.in against two corpus roots, writing wrapper.cc
//! doxbind wrapper.cc.in geom/xml image/xml
//!
//! # Roots may also be resolved through the DOXBIND_PATH search path
//! DOXBIND_PATH=/corpora/a:/corpora/b doxbind wrapper.cc.in geom/xml
//! ```

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use thiserror::Error;

use doxbind::process::{resolve_roots, GenerateError, Processor, RootError};
use doxbind_core::{Corpus, CorpusError};

/// Expand wrapper-generation templates against a documentation XML corpus.
#[derive(Parser, Debug)]
#[command(
    name = "doxbind",
    version,
    about = "Generate binding wrapper source from a documentation XML corpus"
)]
struct Cli {
    /// Template file containing %%...%% directives.
    template: PathBuf,

    /// Corpus search roots: explicit paths or names resolved against the
    /// current directory and DOXBIND_PATH.
    #[arg(required = true)]
    roots: Vec<String>,

    /// Output path (default: the template path minus its extension).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Log level for tracing output.
    #[arg(long, value_enum, default_value = "warn")]
    log_level: LogLevel,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Top-level CLI failures, bridged from every subsystem.
#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Roots(#[from] RootError),

    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error(transparent)]
    Generate(#[from] GenerateError),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("doxbind: {err}");
            // Surface the cause chain; the line-annotated directive errors
            // carry their detail one level down.
            let mut source = std::error::Error::source(&err);
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let roots = resolve_roots(&cli.roots)?;
    let corpus = Corpus::load(&roots)?;
    let mut processor = Processor::new(corpus);
    processor.process_file(&cli.template, cli.output.as_deref())?;
    Ok(())
}
