//! Early stopping on a plateaued validation loss

/// Halts training when the monitored loss stops improving
///
/// A loss counts as an improvement only when it beats the best value seen so
/// far by more than `min_delta`. Training should stop once `patience`
/// consecutive epochs pass without improvement.
#[derive(Clone, Debug)]
pub struct EarlyStopping {
    patience: usize,
    min_delta: f32,
    best_loss: f32,
    best_epoch: Option<usize>,
    epochs_without_improvement: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize, min_delta: f32) -> Self {
        Self {
            patience,
            min_delta,
            best_loss: f32::INFINITY,
            best_epoch: None,
            epochs_without_improvement: 0,
        }
    }

    pub fn reset(&mut self) {
        self.best_loss = f32::INFINITY;
        self.best_epoch = None;
        self.epochs_without_improvement = 0;
    }

    /// Record the loss of `epoch`, returning whether it improved
    pub fn observe(&mut self, epoch: usize, loss: f32) -> bool {
        if loss < self.best_loss - self.min_delta {
            self.best_loss = loss;
            self.best_epoch = Some(epoch);
            self.epochs_without_improvement = 0;
            true
        } else {
            self.epochs_without_improvement += 1;
            false
        }
    }

    pub fn should_stop(&self) -> bool {
        self.epochs_without_improvement >= self.patience
    }

    pub fn best_loss(&self) -> f32 {
        self.best_loss
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    pub fn epochs_without_improvement(&self) -> usize {
        self.epochs_without_improvement
    }
}
