//! Search command implementation

use crate::cli::logging::log;
use crate::cli::{LogLevel, SearchArgs};
use crate::config::TrainSpec;
use crate::io::ArtifactStore;
use crate::tracking::storage::JsonFileBackend;
use crate::tracking::{ExperimentTracker, TrackingSink};
use crate::train::{GridSearch, SearchReport, TrialResult};

pub fn run_search(args: SearchArgs, level: LogLevel) -> Result<u8, String> {
    let mut spec = TrainSpec::load(&args.config).map_err(|e| format!("Config error: {e}"))?;
    spec.apply(&args.overrides());
    spec.validate(true).map_err(|e| format!("Config error: {e}"))?;

    let search = GridSearch::new(spec.search.clone(), spec.pipeline_settings())
        .map_err(|e| format!("Config error: {e}"))?;
    log(
        level,
        LogLevel::Normal,
        &format!(
            "aircast: searching {} combinations from {}",
            spec.search.num_trials(),
            args.config.display()
        ),
    );

    let source = spec.data_source().map_err(|e| e.to_string())?;
    let store = ArtifactStore::new(&spec.output.artifact_dir);
    let mut tracker = spec
        .output
        .tracking_dir
        .as_ref()
        .map(|dir| ExperimentTracker::new(spec.output.experiment.clone(), JsonFileBackend::new(dir)));
    let sink = tracker.as_mut().map(|t| t as &mut dyn TrackingSink);

    let report = search
        .run(source.as_ref(), &store, sink)
        .map_err(|e| format!("Search error: {e}"))?;

    if args.json {
        let json = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
        println!("{json}");
    } else {
        for result in &report.trials {
            log(level, LogLevel::Normal, &describe(result));
        }
    }

    match report.best_trial() {
        Some(best) => {
            log(level, LogLevel::Normal, &best_line(&report, best));
            Ok(0)
        }
        None => Err("Search error: no trial completed".into()),
    }
}

fn describe(result: &TrialResult) -> String {
    let t = &result.trial;
    let params = format!(
        "lr={} hidden={} layers={} epochs={} window={}",
        t.learning_rate, t.hidden_size, t.num_layers, t.epochs, t.sequence_length
    );
    match (&result.error, result.best_val_loss) {
        (Some(error), _) => format!("  {} {params}: failed ({error})", result.run_id),
        (None, Some(val)) => format!("  {} {params}: val_loss {val:.5}", result.run_id),
        (None, None) => format!("  {} {params}: no validation loss", result.run_id),
    }
}

fn best_line(report: &SearchReport, best: &TrialResult) -> String {
    let completed = report.trials.iter().filter(|r| r.succeeded()).count();
    format!(
        "Best of {completed}/{} completed: {} (val_loss {})",
        report.trials.len(),
        best.run_id,
        best.best_val_loss
            .map(|v| format!("{v:.5}"))
            .unwrap_or_else(|| "n/a".into())
    )
}
