//! Generate command implementation

use crate::cli::logging::log;
use crate::cli::{GenerateArgs, LogLevel};
use crate::data::source::write_csv;
use crate::data::SyntheticGenerator;
use chrono::Duration;

/// Columns written for synthetic rows
const COLUMNS: [&str; 4] = ["co2_ppm", "temperature", "humidity", "aqi"];

pub fn run_generate(args: GenerateArgs, level: LogLevel) -> Result<u8, String> {
    if args.interval_minutes <= 0 {
        return Err("interval must be > 0 minutes".into());
    }
    let rows = SyntheticGenerator::new(args.seed)
        .every(Duration::minutes(args.interval_minutes))
        .generate(args.rows);
    let fields: Vec<String> = COLUMNS.iter().map(|c| (*c).to_string()).collect();
    write_csv(&rows, &fields, &args.output).map_err(|e| format!("Write error: {e}"))?;
    log(
        level,
        LogLevel::Normal,
        &format!("Wrote {} rows to {}", rows.len(), args.output.display()),
    );
    Ok(0)
}
