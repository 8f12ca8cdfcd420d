//! aircast CLI
//!
//! # Usage
//!
//! ```bash
//! # Synthetic dataset
//! aircast generate data/sensors.csv --rows 2000
//!
//! # Train from config, with overrides
//! aircast train config.yaml --epochs 50 --promote production
//!
//! # Six-hour forecast from the latest bundle
//! aircast predict data/recent.csv --horizon 6
//!
//! # Train every combination of the config's search grid
//! aircast search config.yaml --promote staging
//!
//! # Drift gate: exit 1 asks for retraining
//! aircast drift data/sensors.csv
//! ```

use aircast::cli::{run_command, Cli};
use clap::Parser;
use std::process::ExitCode;

/// Exit code for hard failures
const EXIT_FAILURE: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run_command(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
