//! End-to-end training run: rows in, persisted bundle out

use super::callback::{EpochCallback, NoCallback, SinkCallback};
use super::config::TrainConfig;
use super::metrics::{evaluate, RegressionReport};
use super::trainer::{TrainReport, Trainer};
use crate::data::{DataSource, FeatureSchema, Lookback, SequenceBuilder, Sequences};
use crate::io::{ArtifactBundle, ArtifactStore, Metadata};
use crate::model::ForecastModel;
use crate::scale::{StandardScaler, TargetScaler};
use crate::tracking::{ModelStage, RunStatus, TrackingSink};
use crate::{Error, Result};
use chrono::Utc;
use std::path::PathBuf;

/// What to train on and how
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub schema: FeatureSchema,
    pub sequence_length: usize,
    pub lookback: Lookback,
    pub train_fraction: f64,
    pub val_fraction: f64,
    pub training: TrainConfig,
    /// Stage to move the new version to after a successful run
    pub promote_to: Option<ModelStage>,
    /// Fixed run id; generated from the clock when absent
    pub run_id: Option<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            schema: FeatureSchema::default(),
            sequence_length: 10,
            lookback: Lookback::All,
            train_fraction: 0.64,
            val_fraction: 0.16,
            training: TrainConfig::default(),
            promote_to: None,
            run_id: None,
        }
    }
}

/// Result of a successful pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub run_id: String,
    pub artifact_dir: PathBuf,
    pub report: TrainReport,
    pub evaluation: RegressionReport,
    pub bundle: ArtifactBundle,
}

/// Sequences of every split, standardized with training statistics
struct ScaledSplit {
    train: Sequences,
    validation: Sequences,
    test: Sequences,
    scaler_x: StandardScaler,
    scaler_y: TargetScaler,
}

fn scale(seqs: &Sequences, x: &StandardScaler, y: &TargetScaler) -> Result<Sequences> {
    Ok(Sequences {
        inputs: x.transform(&seqs.inputs)?,
        targets: y.transform(&seqs.targets),
        target_times: seqs.target_times.clone(),
    })
}

/// Final metrics at step 0, then the bundle path
fn log_outcome(sink: &mut (dyn TrackingSink + '_), outcome: &PipelineOutcome) -> Result<()> {
    for (key, value) in &outcome.bundle.metadata.metrics {
        sink.log_metric(key, *value, 0)?;
    }
    sink.log_artifact(&outcome.artifact_dir)
}

/// Source → sequences → split → scalers → trainer → evaluation → store
pub struct TrainingPipeline {
    settings: PipelineSettings,
}

impl TrainingPipeline {
    pub fn new(settings: PipelineSettings) -> Result<Self> {
        settings.training.validate()?;
        if settings.sequence_length == 0 {
            return Err(Error::Configuration("sequence_length must be > 0".into()));
        }
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Execute one training run
    ///
    /// Nothing is written to `store` unless training and evaluation succeed.
    /// With a sink, per-epoch metrics are logged as epochs finish and the
    /// run is ended as `Failed` on error, keeping what was already logged.
    pub fn run(
        &self,
        source: &dyn DataSource,
        store: &ArtifactStore,
        mut sink: Option<&mut (dyn TrackingSink + '_)>,
    ) -> Result<PipelineOutcome> {
        let run_id = self
            .settings
            .run_id
            .clone()
            .unwrap_or_else(|| Utc::now().format("%Y%m%d-%H%M%S-%3f").to_string());
        tracing::info!(run_id = %run_id, source = source.name(), "starting training run");

        if let Some(sink) = &mut sink {
            let mut params = self.settings.training.to_params();
            params.insert("sequence_length".into(), self.settings.sequence_length.to_string());
            params.insert("target".into(), self.settings.schema.target.clone());
            sink.start_run(&run_id, &params)?;
        }

        let result = match sink.as_deref_mut() {
            Some(sink) => self.execute(&run_id, source, store, &mut SinkCallback::new(sink)),
            None => self.execute(&run_id, source, store, &mut NoCallback),
        };
        let Some(sink) = sink else {
            return result;
        };
        let result = result.and_then(|outcome| {
            log_outcome(&mut *sink, &outcome)?;
            Ok(outcome)
        });
        let status = if result.is_ok() { RunStatus::Completed } else { RunStatus::Failed };
        sink.end_run(status)?;
        if let (Ok(outcome), Some(stage)) = (&result, self.settings.promote_to) {
            sink.promote(&outcome.run_id, stage)?;
        }
        result
    }

    fn execute(
        &self,
        run_id: &str,
        source: &dyn DataSource,
        store: &ArtifactStore,
        callback: &mut dyn EpochCallback,
    ) -> Result<PipelineOutcome> {
        let rows = source.fetch(self.settings.lookback)?;
        let schema = self.settings.schema.restrict_to(&rows);
        if !rows.iter().any(|r| r.has(&schema.target)) {
            return Err(Error::Configuration(format!(
                "target field {} absent from source {}",
                schema.target,
                source.name()
            )));
        }
        let builder = SequenceBuilder::new(schema.clone(), self.settings.sequence_length)?;
        let sequences = builder.build(&rows)?;
        tracing::info!(
            rows = rows.len(),
            sequences = sequences.len(),
            features = ?schema.features,
            "built training windows"
        );

        let split = self.split(&sequences)?;
        let model_config = self.settings.training.model_config(schema.num_features());
        let mut model = ForecastModel::new(model_config, self.settings.training.seed)?;
        let mut trainer = Trainer::new(self.settings.training.clone())?;
        let report = trainer.fit_with(&mut model, &split.train, &split.validation, callback)?;
        let evaluation = evaluate(&model, &split.test, &split.scaler_y);
        tracing::info!(
            run_id,
            test_mse = evaluation.mse,
            test_mae = evaluation.mae,
            test_r2 = evaluation.r2,
            epochs_run = report.epochs_run(),
            "evaluation complete"
        );

        let mut metrics = evaluation.to_metrics();
        metrics.extend(report.to_metrics());
        let bundle = ArtifactBundle {
            weights: model.to_weights(run_id),
            scaler_x: split.scaler_x.params().clone(),
            scaler_y: split.scaler_y.params().clone(),
            metadata: Metadata {
                run_id: run_id.to_string(),
                created_at: Utc::now(),
                feature_list: schema.features.clone(),
                target: schema.target.clone(),
                sequence_length: self.settings.sequence_length,
                input_size: model_config.input_size,
                hidden_size: model_config.hidden_size,
                num_layers: model_config.num_layers,
                dropout: model_config.dropout,
                metrics,
                hyperparameters: self.settings.training.to_params(),
            },
        };
        let artifact_dir = store.save(&bundle)?;

        Ok(PipelineOutcome {
            run_id: run_id.to_string(),
            artifact_dir,
            report,
            evaluation,
            bundle,
        })
    }

    /// Chronological split, scalers fit on the training windows only
    fn split(&self, sequences: &Sequences) -> Result<ScaledSplit> {
        let raw = sequences.split_chronological(self.settings.train_fraction, self.settings.val_fraction)?;
        let scaler_x = StandardScaler::fit(&raw.train.inputs)?;
        let scaler_y = TargetScaler::fit(&raw.train.targets)?;
        tracing::debug!(
            train = raw.train.len(),
            validation = raw.validation.len(),
            test = raw.test.len(),
            "chronological split"
        );
        Ok(ScaledSplit {
            train: scale(&raw.train, &scaler_x, &scaler_y)?,
            validation: scale(&raw.validation, &scaler_x, &scaler_y)?,
            test: scale(&raw.test, &scaler_x, &scaler_y)?,
            scaler_x,
            scaler_y,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MemorySource, SyntheticGenerator};
    use crate::io::ArtifactRef;
    use crate::tracking::storage::InMemoryBackend;
    use crate::tracking::ExperimentTracker;
    use tempfile::TempDir;

    fn settings(run_id: &str) -> PipelineSettings {
        PipelineSettings {
            training: TrainConfig {
                hidden_size: 8,
                num_layers: 1,
                epochs: 3,
                batch_size: 16,
                ..TrainConfig::default()
            },
            run_id: Some(run_id.into()),
            ..PipelineSettings::default()
        }
    }

    #[test]
    fn test_run_persists_loadable_bundle() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let source = MemorySource::new(SyntheticGenerator::new(1).generate(150));
        let pipeline = TrainingPipeline::new(settings("run-1")).unwrap();
        let outcome = pipeline.run(&source, &store, None).unwrap();

        let loaded = store.load(&ArtifactRef::Latest).unwrap();
        assert_eq!(loaded, outcome.bundle);
        assert_eq!(loaded.metadata.feature_list, vec!["co2_ppm", "humidity", "temperature"]);
        for key in ["test_mse", "test_mae", "test_r2", "best_val_loss", "epochs_run"] {
            assert!(loaded.metadata.metrics.contains_key(key), "missing {key}");
        }
    }

    #[test]
    fn test_sink_receives_metrics_and_promotion() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let source = MemorySource::new(SyntheticGenerator::new(2).generate(150));
        let mut tracker = ExperimentTracker::new("exp", InMemoryBackend::new());
        let pipeline = TrainingPipeline::new(PipelineSettings {
            promote_to: Some(ModelStage::Production),
            ..settings("run-2")
        })
        .unwrap();
        pipeline.run(&source, &store, Some(&mut tracker)).unwrap();

        let run = tracker.get_run("run-2").unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.metrics["train_loss"].len(), 3);
        assert_eq!(run.metrics["val_loss"].last().map(|(_, s)| *s), Some(2));
        assert!(run.metrics.contains_key("test_r2"));
        assert_eq!(run.params["sequence_length"], "10");
        assert_eq!(run.artifacts.len(), 1);
        assert_eq!(tracker.stage_of("run-2").unwrap(), ModelStage::Production);
    }

    #[test]
    fn test_insufficient_rows_marks_run_failed() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let source = MemorySource::new(SyntheticGenerator::new(3).generate(8));
        let mut tracker = ExperimentTracker::new("exp", InMemoryBackend::new());
        let pipeline = TrainingPipeline::new(settings("run-3")).unwrap();
        let err = pipeline.run(&source, &store, Some(&mut tracker)).unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(tracker.get_run("run-3").unwrap().status, RunStatus::Failed);
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_missing_target_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let source = MemorySource::new(SyntheticGenerator::new(4).generate(50));
        let mut s = settings("run-4");
        s.schema = FeatureSchema::new(vec!["temperature".into()], "pm25");
        let err = TrainingPipeline::new(s).unwrap().run(&source, &store, None).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
