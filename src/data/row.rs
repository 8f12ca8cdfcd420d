//! Timestamped sensor rows and the feature schema that projects them

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;

/// Derived feature: sine of the hour of day
pub const HOUR_SIN: &str = "hour_sin";
/// Derived feature: cosine of the hour of day
pub const HOUR_COS: &str = "hour_cos";

/// One sensor reading: a timestamp plus named numeric fields
///
/// A field is missing when it is absent from `values` or holds a non-finite
/// number. Missing fields are resolved by the fill policy in
/// [`fill`](super::fill), never by dropping the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub timestamp: DateTime<Utc>,
    pub values: BTreeMap<String, f64>,
}

impl FeatureRow {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style field setter
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    /// Value of a field, `None` if missing or malformed
    ///
    /// The cyclical hour encodings are derived from the timestamp unless the
    /// row stores them explicitly.
    pub fn get(&self, name: &str) -> Option<f64> {
        if let Some(v) = self.values.get(name) {
            return v.is_finite().then_some(*v);
        }
        match name {
            HOUR_SIN => Some((2.0 * PI * f64::from(self.timestamp.hour()) / 24.0).sin()),
            HOUR_COS => Some((2.0 * PI * f64::from(self.timestamp.hour()) / 24.0).cos()),
            _ => None,
        }
    }

    /// Whether the row carries a usable value for `name`
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// Ordered feature list plus the predicted field
///
/// The order of `features` is the column order of every tensor built from
/// rows and must equal the feature list stored with a trained model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub features: Vec<String>,
    pub target: String,
}

impl FeatureSchema {
    pub fn new(features: Vec<String>, target: impl Into<String>) -> Self {
        Self {
            features,
            target: target.into(),
        }
    }

    /// Append the cyclical hour encodings if not already present
    pub fn with_cyclical_hour(mut self) -> Self {
        for name in [HOUR_SIN, HOUR_COS] {
            if !self.features.iter().any(|f| f == name) {
                self.features.push(name.to_string());
            }
        }
        self
    }

    /// Keep only the features that appear in at least one row
    ///
    /// Derived hour features always survive. Mirrors selecting the available
    /// columns of a dataset before training.
    pub fn restrict_to(&self, rows: &[FeatureRow]) -> Self {
        let features = self
            .features
            .iter()
            .filter(|f| f.as_str() == HOUR_SIN || f.as_str() == HOUR_COS || rows.iter().any(|r| r.has(f)))
            .cloned()
            .collect();
        Self {
            features,
            target: self.target.clone(),
        }
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::new(
            vec!["co2_ppm".into(), "humidity".into(), "temperature".into()],
            "co2_ppm",
        )
    }
}
