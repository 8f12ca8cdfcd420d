//! Command-line argument types

use crate::config::Overrides;
use crate::io::ArtifactRef;
use crate::tracking::ModelStage;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// aircast: physics-regularized air-quality forecasting
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "aircast")]
#[command(version)]
#[command(about = "Train, serve and monitor physics-regularized LSTM air-quality forecasts")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Train a model from YAML configuration and persist its bundle
    Train(TrainArgs),

    /// Forecast from recent readings with a stored bundle
    Predict(PredictArgs),

    /// Compare recent readings against the reference window
    Drift(DriftArgs),

    /// Write a synthetic sensor dataset as CSV
    Generate(GenerateArgs),

    /// Train every combination of the config's `search` grid
    Search(SearchArgs),
}

/// Arguments for the train command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct TrainArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Override the data path
    #[arg(short, long)]
    pub data: Option<PathBuf>,

    /// Override the artifact directory
    #[arg(short, long)]
    pub artifacts: Option<PathBuf>,

    /// Override the tracking directory
    #[arg(long)]
    pub tracking: Option<PathBuf>,

    /// Override number of epochs
    #[arg(short, long)]
    pub epochs: Option<usize>,

    /// Override learning rate
    #[arg(short, long)]
    pub lr: Option<f32>,

    /// Override window length
    #[arg(long)]
    pub sequence_length: Option<usize>,

    /// Random seed for reproducibility
    #[arg(long)]
    pub seed: Option<u64>,

    /// Promote the new version to this stage
    #[arg(long)]
    pub promote: Option<ModelStage>,

    /// Validate config but don't train
    #[arg(long)]
    pub dry_run: bool,
}

impl TrainArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            data_path: self.data.clone(),
            artifact_dir: self.artifacts.clone(),
            tracking_dir: self.tracking.clone(),
            epochs: self.epochs,
            learning_rate: self.lr,
            sequence_length: self.sequence_length,
            seed: self.seed,
            promote: self.promote,
        }
    }
}

/// Arguments for the search command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct SearchArgs {
    /// Path to YAML configuration file with a `search` section
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Override the data path
    #[arg(short, long)]
    pub data: Option<PathBuf>,

    /// Override the artifact directory
    #[arg(short, long)]
    pub artifacts: Option<PathBuf>,

    /// Override the tracking directory
    #[arg(long)]
    pub tracking: Option<PathBuf>,

    /// Random seed shared by every trial
    #[arg(long)]
    pub seed: Option<u64>,

    /// Promote the best trial to this stage
    #[arg(long)]
    pub promote: Option<ModelStage>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            data_path: self.data.clone(),
            artifact_dir: self.artifacts.clone(),
            tracking_dir: self.tracking.clone(),
            seed: self.seed,
            promote: self.promote,
            ..Overrides::default()
        }
    }
}

/// Arguments for the predict command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct PredictArgs {
    /// CSV of recent readings
    #[arg(value_name = "DATA")]
    pub data: PathBuf,

    /// Artifact directory
    #[arg(short, long, default_value = "artifacts")]
    pub artifacts: PathBuf,

    /// Bundle to load: "latest" or a run id
    #[arg(short, long, default_value = "latest")]
    pub run: ArtifactRef,

    /// Number of steps to forecast
    #[arg(long, default_value_t = 1)]
    pub horizon: usize,

    /// Minutes between forecast steps
    #[arg(long, default_value_t = 60, allow_negative_numbers = true)]
    pub interval_minutes: i64,

    /// Seed for the multi-step rollout noise
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print forecasts as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the drift command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct DriftArgs {
    /// CSV of sensor readings covering the reference window
    #[arg(value_name = "DATA")]
    pub data: PathBuf,

    /// YAML configuration whose `drift` section is used
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the p-value threshold
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Override the minimum sample count
    #[arg(long)]
    pub min_samples: Option<usize>,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the generate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct GenerateArgs {
    /// Output CSV path
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Number of rows
    #[arg(short, long, default_value_t = 1000)]
    pub rows: usize,

    /// Random seed
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Minutes between rows
    #[arg(long, default_value_t = 5, allow_negative_numbers = true)]
    pub interval_minutes: i64,
}
