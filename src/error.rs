//! Crate-wide error type

use crate::train::EpochMetrics;
use thiserror::Error;

/// Result alias for aircast operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the forecasting pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Architecture mismatch, invalid hyperparameters, missing data source
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Not enough rows for a sequence or a statistical test
    #[error("Insufficient data for {context}: need more than {needed}, have {available}")]
    InsufficientData {
        needed: usize,
        available: usize,
        context: String,
    },

    /// Total loss became NaN or infinite
    #[error("Training diverged at epoch {epoch} (non-finite loss after {} logged epochs)", history.len())]
    DivergedTraining {
        epoch: usize,
        history: Vec<EpochMetrics>,
    },

    /// No bundle exists for the requested reference
    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    /// Bundle present but unreadable or internally inconsistent
    #[error("Corrupt artifact: {0}")]
    CorruptArtifact(String),

    /// Structurally malformed input rows
    #[error("Preprocessing error: {0}")]
    Preprocessing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Tracking error: {0}")]
    Tracking(String),
}

impl Error {
    /// Shorthand for [`Error::InsufficientData`]
    pub fn insufficient(needed: usize, available: usize, context: impl Into<String>) -> Self {
        Self::InsufficientData {
            needed,
            available,
            context: context.into(),
        }
    }

    /// Whether the caller should skip this cycle and retry later
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InsufficientData { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON: {e}"))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Serialization(format!("YAML: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_is_recoverable() {
        let err = Error::insufficient(10, 4, "sequence window");
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("sequence window"));
    }

    #[test]
    fn test_fatal_errors_not_recoverable() {
        assert!(!Error::Configuration("x".into()).is_recoverable());
        assert!(!Error::CorruptArtifact("x".into()).is_recoverable());
        assert!(!Error::DivergedTraining { epoch: 3, history: vec![] }.is_recoverable());
    }

    #[test]
    fn test_diverged_message_reports_epoch() {
        let err = Error::DivergedTraining { epoch: 7, history: vec![] };
        assert!(err.to_string().contains("epoch 7"));
    }
}
