//! `apimock` command-line entry point: scenario matching, normalization and chaos for API mocks.

use clap::Parser;

use apimock::cli::args::{Cli, OutputFormat};
use apimock::cli::commands;
use apimock::error::ExitCode;
use apimock::observability::{LogFormat, init_logging};

fn main() {
    let cli = Cli::parse();

    if !cli.quiet {
        let format = match cli.log_format {
            OutputFormat::Json => LogFormat::Json,
            OutputFormat::Human => LogFormat::Human,
        };
        init_logging(format, cli.verbose, cli.color);
    }

    match commands::dispatch(cli) {
        Ok(()) => std::process::exit(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
