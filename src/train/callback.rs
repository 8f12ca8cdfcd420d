//! Hooks invoked by the trainer as epochs complete

use super::trainer::EpochMetrics;
use crate::tracking::TrackingSink;
use crate::Result;

/// Observer of finished epochs
///
/// Called once per epoch after validation and before early stopping decides
/// whether to continue. Epochs that end with a non-finite loss are never
/// reported. An error aborts training.
pub trait EpochCallback {
    fn on_epoch_end(&mut self, metrics: &EpochMetrics) -> Result<()>;
}

impl<F> EpochCallback for F
where
    F: FnMut(&EpochMetrics) -> Result<()>,
{
    fn on_epoch_end(&mut self, metrics: &EpochMetrics) -> Result<()> {
        self(metrics)
    }
}

/// Ignores every epoch
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCallback;

impl EpochCallback for NoCallback {
    fn on_epoch_end(&mut self, _metrics: &EpochMetrics) -> Result<()> {
        Ok(())
    }
}

/// Streams per-epoch metrics to a tracking sink with step = epoch
pub struct SinkCallback<'a, 'b> {
    sink: &'a mut (dyn TrackingSink + 'b),
}

impl<'a, 'b> SinkCallback<'a, 'b> {
    pub fn new(sink: &'a mut (dyn TrackingSink + 'b)) -> Self {
        Self { sink }
    }
}

impl EpochCallback for SinkCallback<'_, '_> {
    fn on_epoch_end(&mut self, metrics: &EpochMetrics) -> Result<()> {
        let step = metrics.epoch as u64;
        for (key, value) in metrics.to_metrics() {
            self.sink.log_metric(key, value, step)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::storage::InMemoryBackend;
    use crate::tracking::{ExperimentTracker, RunStatus};
    use std::collections::BTreeMap;

    fn epoch(epoch: usize, val_loss: Option<f32>) -> EpochMetrics {
        EpochMetrics {
            epoch,
            train_loss: 1.0 / (epoch + 1) as f32,
            val_loss,
            physics_loss: 0.0,
            grad_norm: 0.5,
        }
    }

    #[test]
    fn test_sink_callback_logs_each_epoch() {
        let mut tracker = ExperimentTracker::new("exp", InMemoryBackend::new());
        tracker.start_run("r-1", &BTreeMap::new()).unwrap();
        {
            let mut callback = SinkCallback::new(&mut tracker);
            callback.on_epoch_end(&epoch(0, Some(2.0))).unwrap();
            callback.on_epoch_end(&epoch(1, None)).unwrap();
        }
        tracker.end_run(RunStatus::Completed).unwrap();

        let run = tracker.get_run("r-1").unwrap();
        let steps: Vec<u64> = run.metrics["train_loss"].iter().map(|(_, s)| *s).collect();
        assert_eq!(steps, vec![0, 1]);
        assert_eq!(run.metrics["val_loss"], vec![(2.0, 0)]);
        assert_eq!(run.metrics["grad_norm"].len(), 2);
    }

    #[test]
    fn test_sink_callback_without_run_fails() {
        let mut tracker = ExperimentTracker::new("exp", InMemoryBackend::new());
        let mut callback = SinkCallback::new(&mut tracker);
        assert!(callback.on_epoch_end(&epoch(0, None)).is_err());
    }

    #[test]
    fn test_closure_callback() {
        let mut seen = Vec::new();
        let mut callback = |m: &EpochMetrics| -> crate::Result<()> {
            seen.push(m.epoch);
            Ok(())
        };
        callback.on_epoch_end(&epoch(3, None)).unwrap();
        assert_eq!(seen, vec![3]);
    }
}
