//! CLI command implementations

mod drift;
mod generate;
mod predict;
mod search;
mod train;

use super::logging::init_tracing;
use super::{Cli, Command, LogLevel};

/// Execute a CLI command and return its process exit code
///
/// `Ok(0)` is success, `Ok(1)` is a drift verdict asking for retraining.
/// Errors are hard failures and map to exit code 2 in the binary.
pub fn run_command(cli: Cli) -> Result<u8, String> {
    let log_level = LogLevel::from_flags(cli.verbose, cli.quiet);
    init_tracing(log_level);

    match cli.command {
        Command::Train(args) => train::run_train(args, log_level),
        Command::Predict(args) => predict::run_predict(args, log_level),
        Command::Drift(args) => drift::run_drift(args, log_level),
        Command::Generate(args) => generate::run_generate(args, log_level),
        Command::Search(args) => search::run_search(args, log_level),
    }
}
