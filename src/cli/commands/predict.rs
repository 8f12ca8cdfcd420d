//! Predict command implementation

use crate::cli::logging::log;
use crate::cli::{LogLevel, PredictArgs};
use crate::data::{CsvSource, DataSource, Lookback};
use crate::inference::{classify, ForecastStep, InferenceEngine};
use crate::io::ArtifactStore;
use chrono::Duration;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

#[derive(Serialize)]
struct PredictionOutput<'a> {
    run_id: &'a str,
    forecasts: &'a [ForecastStep],
}

pub fn run_predict(args: PredictArgs, level: LogLevel) -> Result<u8, String> {
    if args.horizon == 0 {
        return Err("horizon must be > 0".into());
    }
    if args.interval_minutes <= 0 {
        return Err("interval must be > 0 minutes".into());
    }
    let store = ArtifactStore::new(&args.artifacts);
    let bundle = store.load(&args.run).map_err(|e| format!("Artifact error: {e}"))?;
    let engine = InferenceEngine::new(bundle)
        .map_err(|e| format!("Model error: {e}"))?
        .with_interval(Duration::minutes(args.interval_minutes));

    let rows = CsvSource::new(&args.data)
        .fetch(Lookback::All)
        .map_err(|e| format!("Data error: {e}"))?;
    let forecasts = match args.seed {
        Some(seed) => engine.predict_multi_step_with(&rows, args.horizon, &mut StdRng::seed_from_u64(seed)),
        None => engine.predict_multi_step(&rows, args.horizon),
    }
    .map_err(|e| format!("Prediction error: {e}"))?;

    if args.json {
        let output = PredictionOutput {
            run_id: engine.run_id(),
            forecasts: &forecasts,
        };
        let json = serde_json::to_string_pretty(&output).map_err(|e| e.to_string())?;
        println!("{json}");
        return Ok(0);
    }

    log(
        level,
        LogLevel::Normal,
        &format!("Forecasts from run {} ({} rows read)", engine.run_id(), rows.len()),
    );
    for f in &forecasts {
        let class = classify(f.forecast_value);
        log(
            level,
            LogLevel::Normal,
            &format!(
                "  +{} {}  {:>8.2}  {:<30} (confidence {:.2})",
                f.step,
                f.predicted_time.format("%Y-%m-%d %H:%M"),
                f.forecast_value,
                class.category.label(),
                f.confidence
            ),
        );
        log(level, LogLevel::Verbose, &format!("      {}", class.recommendation));
    }
    Ok(0)
}
