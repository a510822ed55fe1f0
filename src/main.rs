//! improver entrypoint.

mod cli;

use clap::Parser;
use std::fmt::Display;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    if let Err(err) = cli::init_logging(cli.verbose, cli.log_level.as_deref()) {
        return exit_with_error(&err);
    }

    match cli::commands::handle(cli.command, cli.config.as_deref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => exit_with_error(&err),
    }
}

fn exit_with_error(error: &dyn Display) -> ExitCode {
    eprintln!("{error}");
    ExitCode::from(1)
}
