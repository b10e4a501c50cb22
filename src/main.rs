//! Tierwatch CLI entry point.
//!
//! Parses arguments, installs diagnostics, dispatches to the command handler,
//! and maps errors to exit codes.

use std::process::ExitCode;
use tierwatch::cli::Cli;
use tierwatch::{commands, exit_codes, logging};

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    logging::init(cli.verbose);

    match commands::dispatch(&cli.config, cli.command) {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {}", err);

            if err.exit_code() == exit_codes::LOCK_FAILURE {
                eprintln!("Another tierwatch process holds the state directory; retry shortly.");
            }
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
