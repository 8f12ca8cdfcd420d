//! Distribution drift gate between a reference and a current window

use super::statistical::ks_two_sample;
use crate::data::{DataSource, FeatureRow, Lookback};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Drift check settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriftConfig {
    /// Current window length in days
    pub current_days: i64,
    /// Reference window length in days
    pub reference_days: i64,
    /// Candidate metrics, first present one wins
    pub metrics: Vec<String>,
    /// Minimum non-missing values required in each window
    pub min_samples: usize,
    /// p-value below which the distributions are considered different
    pub threshold: f64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            current_days: 1,
            reference_days: 7,
            metrics: vec!["co2_ppm".into(), "pm25".into(), "aqi".into()],
            min_samples: 50,
            threshold: 0.05,
        }
    }
}

impl DriftConfig {
    pub fn validate(&self) -> Result<()> {
        if self.current_days <= 0 || self.reference_days <= 0 {
            return Err(Error::Configuration("drift windows must span at least one day".into()));
        }
        if self.metrics.is_empty() {
            return Err(Error::Configuration("drift metric list is empty".into()));
        }
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(Error::Configuration(format!(
                "drift threshold must be in (0, 1), got {}",
                self.threshold
            )));
        }
        if self.min_samples == 0 {
            return Err(Error::Configuration("min_samples must be > 0".into()));
        }
        Ok(())
    }
}

/// Outcome of one KS comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub metric_name: String,
    pub statistic: f64,
    pub p_value: f64,
    pub threshold: f64,
    pub drift_detected: bool,
    pub reference_size: usize,
    pub current_size: usize,
}

/// Verdict of a drift check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DriftOutcome {
    Drift(DriftReport),
    NoDrift(DriftReport),
    /// Too few samples in one of the windows
    Inconclusive {
        metric_name: Option<String>,
        reference_size: usize,
        current_size: usize,
        min_samples: usize,
    },
    /// None of the candidate metrics is present in the current window
    NoValidMetric,
}

impl DriftOutcome {
    /// Process exit code: 1 requests retraining, 0 means no action
    pub fn exit_code(&self) -> i32 {
        match self {
            DriftOutcome::Drift(_) => 1,
            _ => 0,
        }
    }

    pub fn is_drift(&self) -> bool {
        matches!(self, DriftOutcome::Drift(_))
    }

    pub fn report(&self) -> Option<&DriftReport> {
        match self {
            DriftOutcome::Drift(r) | DriftOutcome::NoDrift(r) => Some(r),
            _ => None,
        }
    }
}

/// Stateless KS drift monitor
#[derive(Debug, Clone)]
pub struct DriftMonitor {
    config: DriftConfig,
}

impl DriftMonitor {
    pub fn new(config: DriftConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    /// Fetch both windows from `source` and compare them
    ///
    /// A failed fetch counts as an empty window.
    pub fn check(&self, source: &dyn DataSource) -> DriftOutcome {
        let current = self.fetch(source, self.config.current_days, "current");
        let reference = self.fetch(source, self.config.reference_days, "reference");

        if current.is_empty() || reference.is_empty() {
            tracing::warn!(
                current = current.len(),
                reference = reference.len(),
                "not enough data to check for drift"
            );
            return DriftOutcome::Inconclusive {
                metric_name: None,
                reference_size: reference.len(),
                current_size: current.len(),
                min_samples: self.config.min_samples,
            };
        }

        let Some(metric) = self.select_metric(&current) else {
            tracing::error!(candidates = ?self.config.metrics, "no valid metric found in current window");
            return DriftOutcome::NoValidMetric;
        };
        self.compare(metric, &column(&reference, metric), &column(&current, metric))
    }

    /// KS comparison of two already-extracted samples
    pub fn compare(&self, metric: &str, reference: &[f64], current: &[f64]) -> DriftOutcome {
        let reference: Vec<f64> = reference.iter().copied().filter(|v| v.is_finite()).collect();
        let current: Vec<f64> = current.iter().copied().filter(|v| v.is_finite()).collect();

        let min = self.config.min_samples;
        if reference.len() < min || current.len() < min {
            tracing::warn!(
                metric,
                reference = reference.len(),
                current = current.len(),
                min_samples = min,
                "insufficient samples for drift test"
            );
            return DriftOutcome::Inconclusive {
                metric_name: Some(metric.to_string()),
                reference_size: reference.len(),
                current_size: current.len(),
                min_samples: min,
            };
        }

        let ks = ks_two_sample(&reference, &current);
        let report = DriftReport {
            metric_name: metric.to_string(),
            statistic: ks.statistic,
            p_value: ks.p_value,
            threshold: self.config.threshold,
            drift_detected: ks.p_value < self.config.threshold,
            reference_size: reference.len(),
            current_size: current.len(),
        };
        tracing::info!(metric, statistic = report.statistic, p_value = report.p_value, "drift test");

        if report.drift_detected {
            tracing::warn!(metric, p_value = report.p_value, threshold = report.threshold, "data drift detected");
            DriftOutcome::Drift(report)
        } else {
            tracing::info!(metric, "no meaningful drift detected");
            DriftOutcome::NoDrift(report)
        }
    }

    /// First candidate with a value in at least one row
    pub fn select_metric<'a>(&'a self, rows: &[FeatureRow]) -> Option<&'a str> {
        self.config
            .metrics
            .iter()
            .find(|m| rows.iter().any(|r| r.has(m)))
            .map(String::as_str)
    }

    fn fetch(&self, source: &dyn DataSource, days: i64, window: &str) -> Vec<FeatureRow> {
        source.fetch(Lookback::Days(days)).unwrap_or_else(|e| {
            tracing::error!(window, error = %e, "error fetching drift window");
            Vec::new()
        })
    }
}

/// Non-missing values of `metric`
fn column(rows: &[FeatureRow], metric: &str) -> Vec<f64> {
    rows.iter().filter_map(|r| r.get(metric)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::gaussian;
    use crate::data::MemorySource;
    use chrono::{Duration, TimeZone, Utc};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// One week of 10-minute readings; the last `shifted_hours` get `shift` added
    fn week(seed: u64, metric: &str, shift: f64, shifted_hours: i64) -> MemorySource {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let end = start + Duration::days(7);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut rows = Vec::new();
        let mut t = start;
        while t <= end {
            let mut v = 500.0 + 10.0 * gaussian(&mut rng);
            if t > end - Duration::hours(shifted_hours) {
                v += shift;
            }
            rows.push(FeatureRow::new(t).with(metric, v));
            t += Duration::minutes(10);
        }
        MemorySource::new(rows)
    }

    fn monitor() -> DriftMonitor {
        DriftMonitor::new(DriftConfig::default()).unwrap()
    }

    #[test]
    fn test_large_shift_is_drift() {
        for seed in 0..5 {
            let outcome = monitor().check(&week(seed, "co2_ppm", 100.0, 24));
            assert!(outcome.is_drift(), "seed {seed}: {outcome:?}");
            assert_eq!(outcome.exit_code(), 1);
        }
    }

    #[test]
    fn test_stable_distribution_mostly_passes() {
        let passes = (0..20)
            .filter(|seed| !monitor().check(&week(*seed, "co2_ppm", 0.0, 0)).is_drift())
            .count();
        assert!(passes >= 15, "only {passes}/20 passed");
    }

    #[test]
    fn test_independent_samples_mostly_pass() {
        let m = monitor();
        let mut rng = StdRng::seed_from_u64(7);
        let mut passes = 0;
        for _ in 0..20 {
            let a: Vec<f64> = (0..200).map(|_| gaussian(&mut rng)).collect();
            let b: Vec<f64> = (0..100).map(|_| gaussian(&mut rng)).collect();
            if m.compare("x", &a, &b).exit_code() == 0 {
                passes += 1;
            }
        }
        assert!(passes >= 15);
    }

    #[test]
    fn test_ten_sigma_shift_always_detected() {
        let m = monitor();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..10 {
            let a: Vec<f64> = (0..100).map(|_| gaussian(&mut rng)).collect();
            let b: Vec<f64> = (0..60).map(|_| 10.0 + gaussian(&mut rng)).collect();
            assert!(m.compare("x", &a, &b).is_drift());
        }
    }

    #[test]
    fn test_metric_fallback() {
        let outcome = monitor().check(&week(1, "aqi", 0.0, 0));
        assert_eq!(outcome.report().map(|r| r.metric_name.as_str()), Some("aqi"));
    }

    #[test]
    fn test_no_valid_metric() {
        let outcome = monitor().check(&week(1, "temperature", 0.0, 0));
        assert_eq!(outcome, DriftOutcome::NoValidMetric);
        assert_eq!(outcome.exit_code(), 0);
    }

    #[test]
    fn test_too_few_samples_is_inconclusive() {
        let outcome = monitor().compare("co2_ppm", &[1.0; 100], &[1.0, f64::NAN, 2.0]);
        assert!(matches!(
            outcome,
            DriftOutcome::Inconclusive { current_size: 2, .. }
        ));
        assert_eq!(outcome.exit_code(), 0);
    }

    #[test]
    fn test_empty_source_is_inconclusive() {
        let outcome = monitor().check(&MemorySource::default());
        assert!(matches!(outcome, DriftOutcome::Inconclusive { metric_name: None, .. }));
    }

    #[test]
    fn test_invalid_config() {
        let config = DriftConfig {
            threshold: 0.0,
            ..DriftConfig::default()
        };
        assert!(DriftMonitor::new(config).is_err());
    }
}
