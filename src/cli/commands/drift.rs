//! Drift command implementation

use crate::cli::logging::log;
use crate::cli::{DriftArgs, LogLevel};
use crate::config::TrainSpec;
use crate::data::CsvSource;
use crate::monitor::{DriftConfig, DriftMonitor, DriftOutcome};

pub fn run_drift(args: DriftArgs, level: LogLevel) -> Result<u8, String> {
    let mut config = match &args.config {
        Some(path) => TrainSpec::load(path).map_err(|e| format!("Config error: {e}"))?.drift,
        None => DriftConfig::default(),
    };
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if let Some(min_samples) = args.min_samples {
        config.min_samples = min_samples;
    }
    let monitor = DriftMonitor::new(config).map_err(|e| format!("Config error: {e}"))?;

    let source = CsvSource::new(&args.data).rolling(true);
    let outcome = monitor.check(&source);

    if args.json {
        let json = serde_json::to_string_pretty(&outcome).map_err(|e| e.to_string())?;
        println!("{json}");
    } else {
        log(level, LogLevel::Normal, &describe(&outcome));
    }
    Ok(outcome.exit_code() as u8)
}

fn describe(outcome: &DriftOutcome) -> String {
    match outcome {
        DriftOutcome::Drift(r) => format!(
            "DATA DRIFT DETECTED on {}: statistic={:.4}, p-value={:.4} < {}",
            r.metric_name, r.statistic, r.p_value, r.threshold
        ),
        DriftOutcome::NoDrift(r) => format!(
            "No meaningful drift on {}: statistic={:.4}, p-value={:.4}",
            r.metric_name, r.statistic, r.p_value
        ),
        DriftOutcome::Inconclusive {
            reference_size,
            current_size,
            min_samples,
            ..
        } => format!(
            "Not enough data for a drift test (reference={reference_size}, current={current_size}, need {min_samples})"
        ),
        DriftOutcome::NoValidMetric => "No valid metric found in the current window".into(),
    }
}
