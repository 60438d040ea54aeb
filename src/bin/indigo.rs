use std::process::ExitCode;

use clap::Parser;
use indigo::cli::args::IndigoArgs;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = IndigoArgs::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    indigo::cli::run(args)
}
