use anyhow::{Context, Result};
use human_panic::setup_panic;
use log::debug;

use crate::helpers::logging;

/// Common entry point for all binaries: panic handler, `.env`, CLI, logger.
/// The logger handle is flushed after `fn_run` returns, whatever the outcome.
pub fn run<CliType>(
    fn_cli_parse: fn() -> CliType,
    fn_extract_logging: fn(&CliType) -> &logging::Params,
    fn_run: fn(CliType) -> Result<()>,
) -> Result<()> {
    setup_panic!();
    // Parameters may also come from the environment; a missing .env is fine here
    let dotenv_missing = match dotenvy::dotenv() {
        Ok(_) => false,
        Err(env_err) if env_err.not_found() => true,
        Err(env_err) => return Err(env_err).with_context(|| "Failed to load `.env` file"),
    };

    let cli = fn_cli_parse();
    let logger_handle = logging::configure_from(fn_extract_logging(&cli))?;
    if dotenv_missing {
        debug!("No `.env` file found (recursively), using CLI and environment only.");
    }

    let command_result = fn_run(cli);
    debug!("Finished command execution. Result: {:?}", command_result);

    // Important with non-direct write mode
    // Handle needs to be kept alive until end of program
    logger_handle.flush();

    command_result
}
