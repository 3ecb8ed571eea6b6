//! elktail binary entrypoint.

use std::process::ExitCode;

use elk_cli::{Invocation, Verbosity, app, logging};
use tracing::error;

fn main() -> ExitCode {
    let invocation = Invocation::parse();

    let cli = &invocation.cli;
    logging::init(Verbosity::from_flags(
        cli.verbose,
        cli.more_verbose,
        cli.trace_requests,
    ));

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(app::run(invocation));
    // Tunnel connections run on blocking threads that never finish by themselves.
    runtime.shutdown_background();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "elktail failed");
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
