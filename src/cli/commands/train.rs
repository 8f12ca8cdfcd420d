//! Train command implementation

use crate::cli::logging::log;
use crate::cli::{LogLevel, TrainArgs};
use crate::config::TrainSpec;
use crate::io::ArtifactStore;
use crate::tracking::storage::JsonFileBackend;
use crate::tracking::{ExperimentTracker, TrackingSink};
use crate::train::TrainingPipeline;

pub fn run_train(args: TrainArgs, level: LogLevel) -> Result<u8, String> {
    log(
        level,
        LogLevel::Normal,
        &format!("aircast: training from {}", args.config.display()),
    );

    let mut spec = TrainSpec::load(&args.config).map_err(|e| format!("Config error: {e}"))?;
    spec.apply(&args.overrides());
    spec.validate(true).map_err(|e| format!("Config error: {e}"))?;

    let settings = spec.pipeline_settings();
    log(
        level,
        LogLevel::Verbose,
        &format!(
            "  Features: {:?} -> {} (window {})",
            settings.schema.features, settings.schema.target, settings.sequence_length
        ),
    );
    log(
        level,
        LogLevel::Verbose,
        &format!(
            "  Epochs: {} (lr={}, physics_weight={})",
            settings.training.epochs, settings.training.learning_rate, settings.training.physics_weight
        ),
    );
    if args.dry_run {
        log(level, LogLevel::Normal, "Dry run - config validated successfully");
        return Ok(0);
    }

    let source = spec.data_source().map_err(|e| e.to_string())?;
    let store = ArtifactStore::new(&spec.output.artifact_dir);
    let pipeline = TrainingPipeline::new(settings).map_err(|e| format!("Config error: {e}"))?;

    let mut tracker = spec
        .output
        .tracking_dir
        .as_ref()
        .map(|dir| ExperimentTracker::new(spec.output.experiment.clone(), JsonFileBackend::new(dir)));
    let sink = tracker.as_mut().map(|t| t as &mut dyn TrackingSink);

    match pipeline.run(source.as_ref(), &store, sink) {
        Ok(outcome) => {
            log(
                level,
                LogLevel::Normal,
                &format!(
                    "Run {} complete: {} epochs, test MAE {:.4}, R² {:.4}",
                    outcome.run_id,
                    outcome.report.epochs_run(),
                    outcome.evaluation.mae,
                    outcome.evaluation.r2
                ),
            );
            log(
                level,
                LogLevel::Normal,
                &format!("Artifacts: {}", outcome.artifact_dir.display()),
            );
            Ok(0)
        }
        Err(e) if e.is_recoverable() => {
            tracing::warn!(error = %e, "training skipped");
            log(level, LogLevel::Normal, &format!("Training skipped: {e}"));
            Ok(0)
        }
        Err(e) => Err(format!("Training error: {e}")),
    }
}
