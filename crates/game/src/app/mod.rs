mod bootstrap;
mod canvas;
mod gameplay;
mod host;
mod loop_runner;

use std::process::ExitCode;

use tracing::error;

pub(crate) fn run() -> ExitCode {
    let config = match bootstrap::build_app() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "config_failed");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = loop_runner::run_app(config) {
        error!(error = %err, "startup_failed");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
