//! Tracking storage backends
//!
//! Provides the `TrackingBackend` trait, a JSON file-based implementation
//! and an in-memory one for tests.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stage::ModelStage;
use super::{Run, RunStatus};

/// Errors from tracking storage operations
#[derive(Debug, thiserror::Error)]
pub enum TrackingStorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Run not found: {0}")]
    RunNotFound(String),
}

/// Result alias for tracking storage operations
pub type Result<T> = std::result::Result<T, TrackingStorageError>;

/// Serializable snapshot of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub experiment_name: String,
    pub status: RunStatus,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, Vec<MetricEntry>>,
    pub artifacts: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// A single metric data point
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MetricEntry {
    pub value: f64,
    pub step: u64,
}

impl From<&Run> for RunRecord {
    fn from(run: &Run) -> Self {
        Self {
            run_id: run.run_id.clone(),
            experiment_name: run.experiment_name.clone(),
            status: run.status,
            params: run.params.clone(),
            metrics: run
                .metrics
                .iter()
                .map(|(k, v)| {
                    let entries = v.iter().map(|&(value, step)| MetricEntry { value, step }).collect();
                    (k.clone(), entries)
                })
                .collect(),
            artifacts: run.artifacts.clone(),
            started_at: run.started_at,
            ended_at: run.ended_at,
        }
    }
}

impl RunRecord {
    pub fn into_run(self) -> Run {
        Run {
            run_id: self.run_id,
            experiment_name: self.experiment_name,
            status: self.status,
            params: self.params,
            metrics: self
                .metrics
                .into_iter()
                .map(|(k, v)| (k, v.into_iter().map(|e| (e.value, e.step)).collect()))
                .collect(),
            artifacts: self.artifacts,
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }
}

/// Persistence for finished runs and model version stages
pub trait TrackingBackend {
    fn save_run(&mut self, run: &Run) -> Result<()>;

    fn load_run(&self, run_id: &str) -> Result<Run>;

    /// All stored runs ordered by start time
    fn list_runs(&self) -> Result<Vec<Run>>;

    /// Stage of every model version that has one
    fn load_stages(&self) -> Result<BTreeMap<String, ModelStage>>;

    fn save_stages(&mut self, stages: &BTreeMap<String, ModelStage>) -> Result<()>;
}

fn sort_runs(runs: &mut [Run]) {
    runs.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.run_id.cmp(&b.run_id)));
}

/// JSON file-based tracking backend
///
/// ```text
/// <dir>/runs/<run_id>.json
/// <dir>/stages.json
/// ```
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    dir: PathBuf,
}

impl JsonFileBackend {
    /// Directories are created on first write
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn runs_dir(&self) -> PathBuf {
        self.dir.join("runs")
    }

    fn run_path(&self, run_id: &str) -> PathBuf {
        self.runs_dir().join(format!("{run_id}.json"))
    }

    fn stages_path(&self) -> PathBuf {
        self.dir.join("stages.json")
    }

    fn write_atomic(path: &Path, json: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl TrackingBackend for JsonFileBackend {
    fn save_run(&mut self, run: &Run) -> Result<()> {
        let json = serde_json::to_string_pretty(&RunRecord::from(run))?;
        Self::write_atomic(&self.run_path(&run.run_id), &json)
    }

    fn load_run(&self, run_id: &str) -> Result<Run> {
        let path = self.run_path(run_id);
        if !path.exists() {
            return Err(TrackingStorageError::RunNotFound(run_id.to_string()));
        }
        let record: RunRecord = serde_json::from_str(&fs::read_to_string(path)?)?;
        Ok(record.into_run())
    }

    fn list_runs(&self) -> Result<Vec<Run>> {
        let dir = self.runs_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut runs = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                let record: RunRecord = serde_json::from_str(&fs::read_to_string(&path)?)?;
                runs.push(record.into_run());
            }
        }
        sort_runs(&mut runs);
        Ok(runs)
    }

    fn load_stages(&self) -> Result<BTreeMap<String, ModelStage>> {
        let path = self.stages_path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    fn save_stages(&mut self, stages: &BTreeMap<String, ModelStage>) -> Result<()> {
        let json = serde_json::to_string_pretty(stages)?;
        Self::write_atomic(&self.stages_path(), &json)
    }
}

/// In-memory tracking backend for testing
#[derive(Debug, Default, Clone)]
pub struct InMemoryBackend {
    runs: BTreeMap<String, RunRecord>,
    stages: BTreeMap<String, ModelStage>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TrackingBackend for InMemoryBackend {
    fn save_run(&mut self, run: &Run) -> Result<()> {
        self.runs.insert(run.run_id.clone(), RunRecord::from(run));
        Ok(())
    }

    fn load_run(&self, run_id: &str) -> Result<Run> {
        self.runs
            .get(run_id)
            .map(|r| r.clone().into_run())
            .ok_or_else(|| TrackingStorageError::RunNotFound(run_id.to_string()))
    }

    fn list_runs(&self) -> Result<Vec<Run>> {
        let mut runs: Vec<Run> = self.runs.values().map(|r| r.clone().into_run()).collect();
        sort_runs(&mut runs);
        Ok(runs)
    }

    fn load_stages(&self) -> Result<BTreeMap<String, ModelStage>> {
        Ok(self.stages.clone())
    }

    fn save_stages(&mut self, stages: &BTreeMap<String, ModelStage>) -> Result<()> {
        self.stages = stages.clone();
        Ok(())
    }
}
