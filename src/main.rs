//! `epps` binary: run the CLI and map errors to exit codes.

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(err) = epps_shocks::app::run() {
        eprintln!("epps: {err}");
        return ExitCode::from(err.exit_code());
    }
    ExitCode::SUCCESS
}
