//! Experiment tracking
//!
//! Training runs report parameters, step-indexed metrics and artifact paths
//! to a [`TrackingSink`]. [`ExperimentTracker`] implements the sink over a
//! pluggable [`TrackingBackend`](storage::TrackingBackend) and also keeps the
//! lifecycle [`ModelStage`] of every trained model version.
//!
//! ```
//! use aircast::tracking::{ExperimentTracker, ModelStage, RunStatus, TrackingSink};
//! use aircast::tracking::storage::InMemoryBackend;
//! use std::collections::BTreeMap;
//!
//! # fn main() -> aircast::Result<()> {
//! let mut tracker = ExperimentTracker::new("air-quality", InMemoryBackend::new());
//! let params = BTreeMap::from([("learning_rate".to_string(), "0.001".to_string())]);
//! tracker.start_run("20240101-000000", &params)?;
//! tracker.log_metric("train_loss", 0.5, 0)?;
//! tracker.end_run(RunStatus::Completed)?;
//! tracker.promote("20240101-000000", ModelStage::Production)?;
//! assert_eq!(tracker.stage_of("20240101-000000")?, ModelStage::Production);
//! # Ok(())
//! # }
//! ```

mod stage;
pub mod storage;


use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use stage::ModelStage;
use storage::{TrackingBackend, TrackingStorageError};

/// Status of a tracking run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Active,
    Completed,
    Failed,
    Cancelled,
}

/// One training run: parameters, metric series and artifacts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Same id as the artifact bundle the run produced
    pub run_id: String,
    pub experiment_name: String,
    pub status: RunStatus,
    pub params: BTreeMap<String, String>,
    /// key -> (value, step) in logging order
    pub metrics: BTreeMap<String, Vec<(f64, u64)>>,
    pub artifacts: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Run {
    fn new(run_id: String, experiment_name: String) -> Self {
        Self {
            run_id,
            experiment_name,
            status: RunStatus::Active,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            artifacts: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Most recently logged value of `key`
    pub fn last_metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).and_then(|v| v.last()).map(|(value, _)| *value)
    }
}

/// Errors from experiment tracking operations
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("No active run")]
    NoActiveRun,

    #[error("Run already active: {0}")]
    RunAlreadyActive(String),

    #[error("Invalid stage transition for {version}: {from} -> {to}")]
    InvalidTransition {
        version: String,
        from: ModelStage,
        to: ModelStage,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] TrackingStorageError),
}

impl From<TrackingError> for crate::Error {
    fn from(e: TrackingError) -> Self {
        crate::Error::Tracking(e.to_string())
    }
}

/// Experiment-tracking collaborator of the training pipeline
///
/// A sink records at most one active run at a time.
pub trait TrackingSink {
    fn start_run(&mut self, run_id: &str, params: &BTreeMap<String, String>) -> crate::Result<()>;

    fn log_metric(&mut self, key: &str, value: f64, step: u64) -> crate::Result<()>;

    fn log_artifact(&mut self, path: &Path) -> crate::Result<()>;

    fn end_run(&mut self, status: RunStatus) -> crate::Result<()>;

    /// Move a finished model version to `stage`
    fn promote(&mut self, run_id: &str, stage: ModelStage) -> crate::Result<()>;
}

/// Experiment tracker over a storage backend
#[derive(Debug)]
pub struct ExperimentTracker<B: TrackingBackend> {
    experiment_name: String,
    backend: B,
    active: Option<Run>,
}

impl<B: TrackingBackend> ExperimentTracker<B> {
    pub fn new(experiment_name: impl Into<String>, backend: B) -> Self {
        Self {
            experiment_name: experiment_name.into(),
            backend,
            active: None,
        }
    }

    #[must_use]
    pub fn experiment_name(&self) -> &str {
        &self.experiment_name
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The active run, if any
    pub fn active_run(&self) -> Option<&Run> {
        self.active.as_ref()
    }

    fn active_mut(&mut self) -> Result<&mut Run, TrackingError> {
        self.active.as_mut().ok_or(TrackingError::NoActiveRun)
    }

    /// Retrieve a run, active or persisted
    pub fn get_run(&self, run_id: &str) -> Result<Run, TrackingError> {
        if let Some(run) = self.active.as_ref().filter(|r| r.run_id == run_id) {
            return Ok(run.clone());
        }
        self.backend
            .load_run(run_id)
            .map_err(|e| TrackingError::RunNotFound(format!("{run_id}: {e}")))
    }

    /// Persisted runs followed by the active one
    pub fn list_runs(&self) -> Result<Vec<Run>, TrackingError> {
        let mut runs = self.backend.list_runs()?;
        if let Some(active) = &self.active {
            runs.retain(|r| r.run_id != active.run_id);
            runs.push(active.clone());
        }
        Ok(runs)
    }

    pub fn stage_of(&self, run_id: &str) -> Result<ModelStage, TrackingError> {
        Ok(self.backend.load_stages()?.get(run_id).copied().unwrap_or_default())
    }

    /// Version currently serving in production
    pub fn production_version(&self) -> Result<Option<String>, TrackingError> {
        Ok(self
            .backend
            .load_stages()?
            .into_iter()
            .find(|(_, stage)| *stage == ModelStage::Production)
            .map(|(version, _)| version))
    }

    /// Walk `run_id` through the lifecycle to `target`
    ///
    /// Promoting to production archives any other production version.
    pub fn transition(&mut self, run_id: &str, target: ModelStage) -> Result<(), TrackingError> {
        self.backend.load_run(run_id).map_err(|_| TrackingError::RunNotFound(run_id.to_string()))?;

        let mut stages = self.backend.load_stages()?;
        let current = stages.get(run_id).copied().unwrap_or_default();
        let path = current.path_to(target).ok_or_else(|| TrackingError::InvalidTransition {
            version: run_id.to_string(),
            from: current,
            to: target,
        })?;

        if target == ModelStage::Production {
            for (version, stage) in stages.iter_mut() {
                if version != run_id && *stage == ModelStage::Production {
                    tracing::info!(version = %version, "archiving previous production version");
                    *stage = ModelStage::Archived;
                }
            }
        }
        for step in &path {
            tracing::debug!(run_id, stage = %step, "stage transition");
        }
        stages.insert(run_id.to_string(), target);
        self.backend.save_stages(&stages)?;
        tracing::info!(run_id, from = %current, to = %target, "model version promoted");
        Ok(())
    }
}

impl<B: TrackingBackend> TrackingSink for ExperimentTracker<B> {
    fn start_run(&mut self, run_id: &str, params: &BTreeMap<String, String>) -> crate::Result<()> {
        if let Some(active) = &self.active {
            return Err(TrackingError::RunAlreadyActive(active.run_id.clone()).into());
        }
        let mut run = Run::new(run_id.to_string(), self.experiment_name.clone());
        run.params = params.clone();
        self.active = Some(run);
        Ok(())
    }

    fn log_metric(&mut self, key: &str, value: f64, step: u64) -> crate::Result<()> {
        self.active_mut()?
            .metrics
            .entry(key.to_string())
            .or_default()
            .push((value, step));
        Ok(())
    }

    fn log_artifact(&mut self, path: &Path) -> crate::Result<()> {
        self.active_mut()?.artifacts.push(path.display().to_string());
        Ok(())
    }

    fn end_run(&mut self, status: RunStatus) -> crate::Result<()> {
        let mut run = self.active.take().ok_or(TrackingError::NoActiveRun)?;
        run.status = status;
        run.ended_at = Some(Utc::now());
        self.backend.save_run(&run).map_err(TrackingError::from)?;
        Ok(())
    }

    fn promote(&mut self, run_id: &str, stage: ModelStage) -> crate::Result<()> {
        Ok(self.transition(run_id, stage)?)
    }
}
