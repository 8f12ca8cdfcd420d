//! Epoch loop: combined loss, clipping, early stopping, best-weight restore

use super::callback::{EpochCallback, NoCallback};
use super::config::TrainConfig;
use super::early_stopping::EarlyStopping;
use crate::data::Sequences;
use crate::model::{physics_residual_grad, ForecastModel};
use crate::optim::{clip_grad_norm, Adam, Optimizer};
use crate::{Error, Result};
use ndarray::{s, Array1, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

/// Metrics recorded at the end of one epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    /// Mean total loss (mse + λ·physics) over the epoch's batches
    pub train_loss: f32,
    /// MSE on the validation split, eval mode
    pub val_loss: Option<f32>,
    pub physics_loss: f32,
    /// Mean pre-clip global gradient norm
    pub grad_norm: f32,
}

impl EpochMetrics {
    /// Stable per-epoch metric keys, step = epoch
    pub fn to_metrics(&self) -> Vec<(&'static str, f64)> {
        let mut out = vec![
            ("train_loss", f64::from(self.train_loss)),
            ("physics_loss", f64::from(self.physics_loss)),
            ("grad_norm", f64::from(self.grad_norm)),
        ];
        if let Some(v) = self.val_loss {
            out.insert(1, ("val_loss", f64::from(v)));
        }
        out
    }

    fn monitored(&self) -> f32 {
        self.val_loss.unwrap_or(self.train_loss)
    }
}

/// Outcome of [`Trainer::fit`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainReport {
    pub history: Vec<EpochMetrics>,
    pub best_epoch: usize,
    pub best_val_loss: f32,
    pub stopped_early: bool,
    pub elapsed_secs: f64,
}

impl TrainReport {
    pub fn epochs_run(&self) -> usize {
        self.history.len()
    }

    pub fn final_train_loss(&self) -> Option<f32> {
        self.history.last().map(|m| m.train_loss)
    }

    /// `best_val_loss` and `epochs_run`
    pub fn to_metrics(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("best_val_loss".to_string(), f64::from(self.best_val_loss)),
            ("epochs_run".to_string(), self.epochs_run() as f64),
        ])
    }
}

/// Mean squared error and its gradient with respect to `pred`
fn mse_with_grad(pred: ArrayView1<'_, f32>, target: ArrayView1<'_, f32>) -> (f32, Array1<f32>) {
    let n = pred.len().max(1) as f32;
    let diff = &pred - &target;
    let loss = diff.mapv(|d| d * d).sum() / n;
    (loss, diff * (2.0 / n))
}

/// Trains a [`ForecastModel`] on standardized sequences
///
/// Windows are visited in chronological order, `batch_size` at a time. Each
/// step minimizes `mse + λ·physics_residual` where the physics horizon is the
/// batch of consecutive window forecasts.
pub struct Trainer {
    config: TrainConfig,
    optimizer: Box<dyn Optimizer>,
    early_stopping: EarlyStopping,
    rng: StdRng,
}

impl Trainer {
    pub fn new(config: TrainConfig) -> Result<Self> {
        config.validate()?;
        let optimizer = Adam::default_params(config.learning_rate, config.weight_decay);
        Ok(Self {
            early_stopping: EarlyStopping::new(config.patience, config.min_delta),
            rng: StdRng::seed_from_u64(config.seed),
            optimizer: Box::new(optimizer),
            config,
        })
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn lr(&self) -> f32 {
        self.optimizer.lr()
    }

    /// Train `model` in place, leaving it at the best-validation weights
    ///
    /// Aborts with [`Error::DivergedTraining`] as soon as a loss becomes
    /// non-finite; `model` is then left in its diverged state and nothing is
    /// persisted.
    pub fn fit(&mut self, model: &mut ForecastModel, train: &Sequences, validation: &Sequences) -> Result<TrainReport> {
        self.fit_with(model, train, validation, &mut NoCallback)
    }

    /// [`fit`](Self::fit), reporting every finished epoch to `callback`
    pub fn fit_with(
        &mut self,
        model: &mut ForecastModel,
        train: &Sequences,
        validation: &Sequences,
        callback: &mut dyn EpochCallback,
    ) -> Result<TrainReport> {
        if train.is_empty() {
            return Err(Error::insufficient(1, 0, "training split"));
        }
        let start = Instant::now();
        self.early_stopping.reset();

        let mut history: Vec<EpochMetrics> = Vec::with_capacity(self.config.epochs);
        let mut best_model = model.clone();
        let mut stopped_early = false;

        for epoch in 0..self.config.epochs {
            let metrics = match self.train_epoch(model, train, epoch) {
                Ok(mut m) => {
                    m.val_loss = validation_loss(model, validation);
                    m
                }
                Err(e) => return Err(self.diverged(e, epoch, history)),
            };

            if !metrics.monitored().is_finite() {
                tracing::error!(epoch, "validation loss is not finite");
                return Err(Error::DivergedTraining { epoch, history });
            }

            tracing::info!(
                epoch,
                train_loss = metrics.train_loss,
                val_loss = ?metrics.val_loss,
                physics_loss = metrics.physics_loss,
                grad_norm = metrics.grad_norm,
                "epoch complete"
            );
            history.push(metrics);
            callback.on_epoch_end(&metrics)?;

            if self.early_stopping.observe(epoch, metrics.monitored()) {
                best_model = model.clone();
            } else if self.early_stopping.should_stop() {
                tracing::info!(
                    epoch,
                    patience = self.config.patience,
                    best_loss = self.early_stopping.best_loss(),
                    "early stopping"
                );
                stopped_early = true;
                break;
            }
        }

        *model = best_model;
        Ok(TrainReport {
            best_epoch: self.early_stopping.best_epoch().unwrap_or(0),
            best_val_loss: self.early_stopping.best_loss(),
            history,
            stopped_early,
            elapsed_secs: start.elapsed().as_secs_f64(),
        })
    }

    fn diverged(&self, err: Error, epoch: usize, history: Vec<EpochMetrics>) -> Error {
        match err {
            Error::DivergedTraining { .. } => {
                tracing::error!(epoch, logged_epochs = history.len(), "training diverged");
                Error::DivergedTraining { epoch, history }
            }
            other => other,
        }
    }

    fn train_epoch(&mut self, model: &mut ForecastModel, train: &Sequences, epoch: usize) -> Result<EpochMetrics> {
        let n = train.len();
        let batch_size = if self.config.batch_size == 0 { n } else { self.config.batch_size };
        let last_step = train.sequence_length().saturating_sub(1);
        let lambda = self.config.physics_weight;

        let (mut total_sum, mut physics_sum, mut norm_sum, mut batches) = (0.0f32, 0.0f32, 0.0f32, 0usize);
        let mut start = 0;
        while start < n {
            let end = (start + batch_size).min(n);
            let x = train.inputs.slice(s![start..end, .., ..]);
            let y = train.targets.slice(s![start..end]);
            let last_rows = x.index_axis(Axis(1), last_step);

            model.zero_grad();
            let (pred, cache) = model.forward_train(x, &mut self.rng);
            let (mse, d_mse) = mse_with_grad(pred.view(), y);
            let (physics, d_physics) = physics_residual_grad(pred.view(), last_rows);
            let total = mse + lambda * physics;
            if !total.is_finite() {
                return Err(Error::DivergedTraining {
                    epoch,
                    history: Vec::new(),
                });
            }

            model.backward(&cache, (d_mse + &(d_physics * lambda)).view());
            let mut params = model.parameters_mut();
            let norm = clip_grad_norm(&mut params, self.config.grad_clip);
            if !norm.is_finite() {
                return Err(Error::DivergedTraining {
                    epoch,
                    history: Vec::new(),
                });
            }
            self.optimizer.step(&mut params);

            total_sum += total;
            physics_sum += physics;
            norm_sum += norm;
            batches += 1;
            start = end;
        }

        let count = batches.max(1) as f32;
        Ok(EpochMetrics {
            epoch,
            train_loss: total_sum / count,
            val_loss: None,
            physics_loss: physics_sum / count,
            grad_norm: norm_sum / count,
        })
    }
}

/// Eval-mode MSE in standardized space, `None` for an empty split
fn validation_loss(model: &ForecastModel, validation: &Sequences) -> Option<f32> {
    if validation.is_empty() {
        return None;
    }
    let pred = model.predict(validation.inputs.view());
    Some(mse_with_grad(pred.view(), validation.targets.view()).0)
}
