//! Data drift monitoring
//!
//! Compares the distribution of one sensor metric in a recent window against
//! a longer reference window with a two-sample Kolmogorov-Smirnov test. The
//! verdict maps onto a process exit code so a scheduler can trigger retraining.

mod drift;
pub mod statistical;

pub use drift::{DriftConfig, DriftMonitor, DriftOutcome, DriftReport};
pub use statistical::{ks_two_sample, KsResult};
