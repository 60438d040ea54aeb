//! The Indigo Command-Line Interface.
//!
//! This module is the main entry point for all CLI commands and orchestrates
//! the core library functions.

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use crate::cli::args::{Command, ExpandArgs, IndigoArgs};
use crate::config::EngineConfig;
use crate::driver::Preprocessor;
use crate::errors::CollectingSink;
use crate::macros::parse_definition;
use crate::{err_msg, IndigoError};

pub mod args;
pub mod output;

/// Dispatches a parsed command line. The exit code is 1 when the command
/// failed or produced an error diagnostic.
pub fn run(args: IndigoArgs) -> ExitCode {
    let result = match args.command {
        Command::Expand(expand) => handle_expand(&expand, false),
        Command::Trace(expand) => handle_expand(&expand, true),
        Command::Define { definition } => handle_define(&definition),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            ExitCode::from(1)
        }
    }
}

/// Builds the engine configuration from a file and the command-line flags.
fn load_config(args: &ExpandArgs, trace: bool) -> Result<EngineConfig, IndigoError> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_path(path)?,
        None => EngineConfig::default(),
    };
    config.trace_calls_enabled |= trace || args.trace;
    config.gnu_compatible_recursion |= args.compat;
    Ok(config)
}

fn read_source(path: &Path) -> Result<String, IndigoError> {
    fs::read_to_string(path)
        .map_err(|e| err_msg!(Io, "Failed to read {}", path.display()).with_cause(e))
}

/// Handles the `expand` and `trace` subcommands.
fn handle_expand(args: &ExpandArgs, trace: bool) -> Result<bool, IndigoError> {
    let config = load_config(args, trace)?;
    let source = read_source(&args.file)?;
    let filename = args.file.display().to_string();

    let mut preprocessor = Preprocessor::new(config);
    for define in &args.defines {
        preprocessor.define_option(define)?;
    }
    let mut sink = CollectingSink::new();
    let mut processed = preprocessor.process(&filename, &source, &mut sink)?;
    let ok = !sink.has_errors() && processed.definition_errors.is_empty();

    if args.json {
        let json = output::json_report(&filename, &processed, &sink.diagnostics)
            .map_err(|e| err_msg!(Internal, "Failed to serialize the report").with_cause(e))?;
        println!("{json}");
        return Ok(ok);
    }

    output::print_diagnostics(&sink.diagnostics);
    print_definition_errors(std::mem::take(&mut processed.definition_errors));
    if trace {
        output::print_trace(&source, &processed);
    } else {
        print!("{}", processed.text);
    }
    Ok(ok)
}

/// Handles the `define` subcommand.
fn handle_define(text: &str) -> Result<bool, IndigoError> {
    let def = parse_definition(text)?;
    output::print_definition(&def);
    Ok(true)
}

fn print_definition_errors(errors: Vec<IndigoError>) {
    for error in errors {
        eprintln!("{:?}", miette::Report::new(error));
    }
}
