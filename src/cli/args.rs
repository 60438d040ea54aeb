//! Defines the command-line arguments and subcommands for the Indigo CLI.
//!
//! This module uses the `clap` crate with its "derive" feature to create a
//! declarative and type-safe argument parsing structure.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "indigo",
    version,
    about = "A C preprocessor macro-expansion engine with call tracing."
)]
pub struct IndigoArgs {
    /// Log engine internals at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Expand every macro call in a file and print the result.
    Expand(ExpandArgs),
    /// Expand with call tracing on and print a per-call summary.
    Trace(ExpandArgs),
    /// Compile one definition, written as after `#define`, and print it.
    Define {
        #[arg(required = true)]
        definition: String,
    },
}

#[derive(Debug, Args)]
pub struct ExpandArgs {
    /// The path to the C source file.
    #[arg(required = true)]
    pub file: PathBuf,

    /// Engine configuration file (YAML or JSON).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Wrap calls and arguments in trace comments.
    #[arg(long)]
    pub trace: bool,

    /// Use the looser GNU-compatible recursion rule.
    #[arg(long)]
    pub compat: bool,

    /// Predefine a macro, `NAME` or `NAME=VALUE`.
    #[arg(short = 'D', value_name = "NAME[=VALUE]")]
    pub defines: Vec<String>,

    /// Print expansions and diagnostics as JSON.
    #[arg(long)]
    pub json: bool,
}
