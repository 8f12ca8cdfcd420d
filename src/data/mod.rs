//! Sensor rows, missing-value policy, windowing and row sources

pub mod fill;
mod row;
mod sequence;
pub mod source;
pub mod synthetic;

pub use fill::{fill_column, fill_matrix, forward_fill};
pub use row::{FeatureRow, FeatureSchema, HOUR_COS, HOUR_SIN};
pub use sequence::{build_windows, SequenceBuilder, Sequences, Split};
pub use source::{CsvSource, DataSource, Lookback, MemorySource};
pub use synthetic::SyntheticGenerator;
