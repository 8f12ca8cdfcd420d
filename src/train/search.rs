//! Grid search over training hyperparameters
//!
//! Every combination of the listed values becomes one [`TrainingPipeline`]
//! run with its own artifact bundle and tracking run. An empty list keeps the
//! base value for that hyperparameter. The best trial is the one with the
//! lowest best validation loss.

use super::pipeline::{PipelineSettings, TrainingPipeline};
use crate::data::DataSource;
use crate::io::ArtifactStore;
use crate::tracking::TrackingSink;
use crate::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Candidate values per hyperparameter
///
/// ```yaml
/// search:
///   learning_rate: [0.001, 0.0005]
///   hidden_size: [64, 128]
///   sequence_length: [12, 24]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchGrid {
    pub learning_rate: Vec<f32>,
    pub hidden_size: Vec<usize>,
    pub num_layers: Vec<usize>,
    pub epochs: Vec<usize>,
    pub sequence_length: Vec<usize>,
}

/// One point of the grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub learning_rate: f32,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub epochs: usize,
    pub sequence_length: usize,
}

impl Trial {
    fn from_settings(settings: &PipelineSettings) -> Self {
        Self {
            learning_rate: settings.training.learning_rate,
            hidden_size: settings.training.hidden_size,
            num_layers: settings.training.num_layers,
            epochs: settings.training.epochs,
            sequence_length: settings.sequence_length,
        }
    }

    /// `base` with this trial's hyperparameters
    pub fn apply(&self, base: &PipelineSettings) -> PipelineSettings {
        let mut settings = base.clone();
        settings.training.learning_rate = self.learning_rate;
        settings.training.hidden_size = self.hidden_size;
        settings.training.num_layers = self.num_layers;
        settings.training.epochs = self.epochs;
        settings.sequence_length = self.sequence_length;
        settings
    }
}

fn or_base<T: Copy>(values: &[T], base: T) -> Vec<T> {
    if values.is_empty() {
        vec![base]
    } else {
        values.to_vec()
    }
}

impl SearchGrid {
    /// Description of the first invalid value, if any
    pub fn problem(&self) -> Option<String> {
        if let Some(lr) = self.learning_rate.iter().find(|lr| !(lr.is_finite() && **lr > 0.0)) {
            return Some(format!("learning_rate values must be > 0, got {lr}"));
        }
        let counts = [
            ("hidden_size", &self.hidden_size),
            ("num_layers", &self.num_layers),
            ("epochs", &self.epochs),
            ("sequence_length", &self.sequence_length),
        ];
        counts
            .into_iter()
            .find(|(_, values)| values.contains(&0))
            .map(|(name, _)| format!("{name} values must be > 0"))
    }

    pub fn validate(&self) -> Result<()> {
        match self.problem() {
            Some(problem) => Err(Error::Configuration(format!("invalid search grid: {problem}"))),
            None => Ok(()),
        }
    }

    /// Number of combinations, at least one
    pub fn num_trials(&self) -> usize {
        [
            self.learning_rate.len(),
            self.hidden_size.len(),
            self.num_layers.len(),
            self.epochs.len(),
            self.sequence_length.len(),
        ]
        .iter()
        .map(|n| (*n).max(1))
        .product()
    }

    /// Cartesian product in declaration order, `sequence_length` varying fastest
    pub fn trials(&self, base: &PipelineSettings) -> Vec<Trial> {
        let base = Trial::from_settings(base);
        let mut trials = Vec::with_capacity(self.num_trials());
        for &learning_rate in &or_base(&self.learning_rate, base.learning_rate) {
            for &hidden_size in &or_base(&self.hidden_size, base.hidden_size) {
                for &num_layers in &or_base(&self.num_layers, base.num_layers) {
                    for &epochs in &or_base(&self.epochs, base.epochs) {
                        for &sequence_length in &or_base(&self.sequence_length, base.sequence_length) {
                            trials.push(Trial {
                                learning_rate,
                                hidden_size,
                                num_layers,
                                epochs,
                                sequence_length,
                            });
                        }
                    }
                }
            }
        }
        trials
    }
}

/// Outcome of one trial
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialResult {
    pub run_id: String,
    pub trial: Trial,
    pub best_val_loss: Option<f32>,
    pub test_mse: Option<f64>,
    pub test_r2: Option<f64>,
    /// Why the trial produced no bundle
    pub error: Option<String>,
}

impl TrialResult {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchReport {
    pub trials: Vec<TrialResult>,
    /// Index into `trials` of the lowest best validation loss
    pub best: Option<usize>,
}

impl SearchReport {
    pub fn best_trial(&self) -> Option<&TrialResult> {
        self.best.and_then(|i| self.trials.get(i))
    }
}

/// Runs one training pipeline per grid point
#[derive(Debug, Clone)]
pub struct GridSearch {
    grid: SearchGrid,
    base: PipelineSettings,
}

impl GridSearch {
    pub fn new(grid: SearchGrid, base: PipelineSettings) -> Result<Self> {
        grid.validate()?;
        Ok(Self { grid, base })
    }

    pub fn trials(&self) -> Vec<Trial> {
        self.grid.trials(&self.base)
    }

    /// Train every trial in order
    ///
    /// A trial that fails on its data or diverges is recorded and the search
    /// moves on; I/O and tracking failures abort the search. Trial run ids
    /// are `<prefix>-trial<NNN>` where the prefix is the base run id or a
    /// timestamp. When the base settings name a stage, only the best trial
    /// is promoted.
    pub fn run(
        &self,
        source: &dyn DataSource,
        store: &ArtifactStore,
        mut sink: Option<&mut (dyn TrackingSink + '_)>,
    ) -> Result<SearchReport> {
        let prefix = self
            .base
            .run_id
            .clone()
            .unwrap_or_else(|| Utc::now().format("%Y%m%d-%H%M%S").to_string());
        let trials = self.trials();
        let total = trials.len();
        tracing::info!(total, prefix = %prefix, "starting grid search");

        let mut results = Vec::with_capacity(total);
        for (index, trial) in trials.into_iter().enumerate() {
            let run_id = format!("{prefix}-trial{:03}", index + 1);
            let mut settings = trial.apply(&self.base);
            settings.run_id = Some(run_id.clone());
            settings.promote_to = None;
            tracing::info!(
                trial = index + 1,
                total,
                learning_rate = trial.learning_rate,
                hidden_size = trial.hidden_size,
                num_layers = trial.num_layers,
                epochs = trial.epochs,
                sequence_length = trial.sequence_length,
                "starting trial"
            );

            let outcome = TrainingPipeline::new(settings).and_then(|p| p.run(source, store, sink.as_deref_mut()));
            let result = match outcome {
                Ok(outcome) => TrialResult {
                    run_id,
                    trial,
                    best_val_loss: Some(outcome.report.best_val_loss),
                    test_mse: Some(outcome.evaluation.mse),
                    test_r2: Some(outcome.evaluation.r2),
                    error: None,
                },
                Err(e @ (Error::Io(_) | Error::Tracking(_))) => return Err(e),
                Err(e) => {
                    tracing::warn!(trial = index + 1, error = %e, "trial failed");
                    TrialResult {
                        run_id,
                        trial,
                        best_val_loss: None,
                        test_mse: None,
                        test_r2: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            results.push(result);
        }

        let best = results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.best_val_loss.filter(|l| l.is_finite()).map(|l| (i, l)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i);

        match best {
            Some(i) => tracing::info!(run_id = %results[i].run_id, "best trial"),
            None => tracing::warn!("no trial completed"),
        }
        if let (Some(i), Some(stage), Some(sink)) = (best, self.base.promote_to, sink) {
            sink.promote(&results[i].run_id, stage)?;
        }
        Ok(SearchReport { trials: results, best })
    }
}
