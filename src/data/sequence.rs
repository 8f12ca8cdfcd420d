//! Sliding-window sequence construction and chronological splitting

use super::fill::{fill_column, fill_matrix};
use super::row::{FeatureRow, FeatureSchema};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use ndarray::{s, Array1, Array2, Array3, ArrayView1, ArrayView2, Axis};
use std::ops::Range;

/// Windowed training examples
///
/// `inputs` is `(N, L, F)`: N windows of L consecutive rows with F features.
/// `targets[i]` is the target field of the row right after window `i`.
#[derive(Debug, Clone)]
pub struct Sequences {
    pub inputs: Array3<f32>,
    pub targets: Array1<f32>,
    pub target_times: Vec<DateTime<Utc>>,
}

impl Sequences {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn sequence_length(&self) -> usize {
        self.inputs.shape()[1]
    }

    pub fn num_features(&self) -> usize {
        self.inputs.shape()[2]
    }

    /// Contiguous sub-range of windows, order preserved
    pub fn slice(&self, range: Range<usize>) -> Self {
        Self {
            inputs: self.inputs.slice(s![range.clone(), .., ..]).to_owned(),
            targets: self.targets.slice(s![range.clone()]).to_owned(),
            target_times: self.target_times[range].to_vec(),
        }
    }

    /// First `n` windows and the remainder
    pub fn split_at(&self, n: usize) -> (Self, Self) {
        let n = n.min(self.len());
        (self.slice(0..n), self.slice(n..self.len()))
    }

    /// Time-ordered train/validation/test partition
    ///
    /// No shuffling: every validation window follows every training window and
    /// every test window follows every validation window.
    pub fn split_chronological(&self, train_fraction: f64, val_fraction: f64) -> Result<Split> {
        if !(train_fraction > 0.0 && val_fraction >= 0.0 && train_fraction + val_fraction < 1.0) {
            return Err(Error::Configuration(format!(
                "invalid split fractions train={train_fraction} val={val_fraction}"
            )));
        }
        let n = self.len();
        let n_train = (n as f64 * train_fraction).floor() as usize;
        let n_val = (n as f64 * val_fraction).floor() as usize;
        let n_test = n.saturating_sub(n_train + n_val);
        if n_train == 0 || n_test == 0 || (val_fraction > 0.0 && n_val == 0) {
            return Err(Error::insufficient(3, n, "train/validation/test split"));
        }
        Ok(Split {
            train: self.slice(0..n_train),
            validation: self.slice(n_train..n_train + n_val),
            test: self.slice(n_train + n_val..n),
        })
    }

    /// Last time step of every window, `(N, F)`
    pub fn last_rows(&self) -> Array2<f32> {
        let l = self.sequence_length();
        if l == 0 {
            return Array2::zeros((self.len(), self.num_features()));
        }
        self.inputs.index_axis(Axis(1), l - 1).to_owned()
    }
}

/// Chronological data partition
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Sequences,
    pub validation: Sequences,
    pub test: Sequences,
}

/// Cut `(T, F)` features into `max(0, T - L)` windows of length `L`
///
/// Window `i` covers rows `i..i+L`; its target is `target[i + L]`.
pub fn build_windows(
    features: ArrayView2<'_, f32>,
    target: ArrayView1<'_, f32>,
    sequence_length: usize,
) -> (Array3<f32>, Array1<f32>) {
    let rows = features.nrows();
    let n_features = features.ncols();
    let count = rows.saturating_sub(sequence_length);
    let mut inputs = Array3::<f32>::zeros((count, sequence_length, n_features));
    let mut targets = Array1::<f32>::zeros(count);
    for i in 0..count {
        inputs
            .index_axis_mut(Axis(0), i)
            .assign(&features.slice(s![i..i + sequence_length, ..]));
        targets[i] = target[i + sequence_length];
    }
    (inputs, targets)
}

/// Turns ordered feature rows into fixed-length windows plus aligned targets
#[derive(Debug, Clone)]
pub struct SequenceBuilder {
    schema: FeatureSchema,
    sequence_length: usize,
}

impl SequenceBuilder {
    pub fn new(schema: FeatureSchema, sequence_length: usize) -> Result<Self> {
        if sequence_length == 0 {
            return Err(Error::Configuration("sequence_length must be > 0".into()));
        }
        if schema.features.is_empty() {
            return Err(Error::Configuration("feature list is empty".into()));
        }
        Ok(Self {
            schema,
            sequence_length,
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    /// Build windows from rows, sorting them by timestamp first if needed
    ///
    /// Fails with [`Error::InsufficientData`] when there are not more rows
    /// than the window length.
    pub fn build(&self, rows: &[FeatureRow]) -> Result<Sequences> {
        let sorted;
        let rows = if rows.windows(2).all(|w| w[0].timestamp <= w[1].timestamp) {
            rows
        } else {
            let mut owned = rows.to_vec();
            owned.sort_by_key(|r| r.timestamp);
            sorted = owned;
            &sorted
        };

        if rows.len() <= self.sequence_length {
            return Err(Error::insufficient(
                self.sequence_length,
                rows.len(),
                "sequence window",
            ));
        }

        let features = fill_matrix(rows, &self.schema.features);
        let target = fill_column(rows, &self.schema.target);
        let (inputs, targets) = build_windows(features.view(), target.view(), self.sequence_length);
        let target_times = rows[self.sequence_length..].iter().map(|r| r.timestamp).collect();

        Ok(Sequences {
            inputs,
            targets,
            target_times,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::SyntheticGenerator;
    use proptest::prelude::*;

    fn rows(n: usize) -> Vec<FeatureRow> {
        SyntheticGenerator::new(7).generate(n)
    }

    #[test]
    fn test_build_count_and_shape() {
        let builder = SequenceBuilder::new(FeatureSchema::default(), 10).unwrap();
        let seqs = builder.build(&rows(200)).unwrap();
        assert_eq!(seqs.len(), 190);
        assert_eq!(seqs.inputs.shape(), &[190, 10, 3]);
    }

    #[test]
    fn test_too_few_rows_is_insufficient() {
        let builder = SequenceBuilder::new(FeatureSchema::default(), 10).unwrap();
        let err = builder.build(&rows(10)).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_target_is_row_after_window() {
        let data = rows(30);
        let builder = SequenceBuilder::new(FeatureSchema::default(), 5).unwrap();
        let seqs = builder.build(&data).unwrap();
        for i in 0..seqs.len() {
            let expected = data[i + 5].get("co2_ppm").unwrap() as f32;
            assert_eq!(seqs.targets[i], expected);
            assert!(seqs.target_times[i] > data[i + 4].timestamp);
        }
    }

    #[test]
    fn test_unsorted_rows_are_ordered() {
        let mut data = rows(20);
        data.reverse();
        let builder = SequenceBuilder::new(FeatureSchema::default(), 4).unwrap();
        let seqs = builder.build(&data).unwrap();
        assert!(seqs.target_times.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_zero_length_rejected() {
        assert!(SequenceBuilder::new(FeatureSchema::default(), 0).is_err());
    }

    #[test]
    fn test_split_chronological() {
        let builder = SequenceBuilder::new(FeatureSchema::default(), 10).unwrap();
        let seqs = builder.build(&rows(110)).unwrap();
        let split = seqs.split_chronological(0.64, 0.16).unwrap();
        assert_eq!(split.train.len(), 64);
        assert_eq!(split.validation.len(), 16);
        assert_eq!(split.test.len(), 20);
        assert!(split.train.target_times.last() < split.validation.target_times.first());
        assert!(split.validation.target_times.last() < split.test.target_times.first());
    }

    #[test]
    fn test_split_rejects_bad_fractions() {
        let builder = SequenceBuilder::new(FeatureSchema::default(), 10).unwrap();
        let seqs = builder.build(&rows(50)).unwrap();
        assert!(seqs.split_chronological(0.9, 0.2).is_err());
        assert!(seqs.split_chronological(0.0, 0.2).is_err());
    }

    #[test]
    fn test_last_rows_matches_window_end() {
        let builder = SequenceBuilder::new(FeatureSchema::default(), 3).unwrap();
        let seqs = builder.build(&rows(10)).unwrap();
        let last = seqs.last_rows();
        assert_eq!(last.row(0), seqs.inputs.slice(s![0, 2, ..]));
    }

    proptest! {
        #[test]
        fn prop_window_count(n in 0usize..60, l in 1usize..20) {
            let features = Array2::from_shape_fn((n, 2), |(i, j)| (i * 2 + j) as f32);
            let target = Array1::from_shape_fn(n, |i| i as f32);
            let (inputs, targets) = build_windows(features.view(), target.view(), l);
            let expected = n.saturating_sub(l);
            prop_assert_eq!(inputs.shape(), &[expected, l, 2]);
            prop_assert_eq!(targets.len(), expected);
            for i in 0..expected {
                // chronological: first column encodes the row index
                for t in 0..l {
                    prop_assert_eq!(inputs[[i, t, 0]], ((i + t) * 2) as f32);
                }
                prop_assert_eq!(targets[i], (i + l) as f32);
            }
        }
    }
}
