//! Missing-value policy shared by training and inference
//!
//! Each column is forward-filled from its most recent valid value; leading
//! gaps with no prior value become 0.

use super::row::FeatureRow;
use ndarray::{Array1, Array2};

/// Forward-fill a column of optional values, zero-filling leading gaps
pub fn forward_fill<I>(column: I) -> Vec<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let mut last: Option<f64> = None;
    column
        .into_iter()
        .map(|v| {
            if let Some(x) = v.filter(|x| x.is_finite()) {
                last = Some(x);
            }
            last.unwrap_or(0.0)
        })
        .collect()
}

/// Project rows onto `fields` and apply the fill policy column by column
///
/// Returns a dense `(rows, fields)` matrix in field order.
pub fn fill_matrix(rows: &[FeatureRow], fields: &[String]) -> Array2<f32> {
    let mut out = Array2::<f32>::zeros((rows.len(), fields.len()));
    for (j, field) in fields.iter().enumerate() {
        let filled = forward_fill(rows.iter().map(|r| r.get(field)));
        for (i, v) in filled.into_iter().enumerate() {
            out[[i, j]] = v as f32;
        }
    }
    out
}

/// Fill a single field into a vector
pub fn fill_column(rows: &[FeatureRow], field: &str) -> Array1<f32> {
    forward_fill(rows.iter().map(|r| r.get(field)))
        .into_iter()
        .map(|v| v as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn test_forward_fill_carries_last_value() {
        let out = forward_fill(vec![Some(1.0), None, None, Some(3.0), None]);
        assert_eq!(out, vec![1.0, 1.0, 1.0, 3.0, 3.0]);
    }

    #[test]
    fn test_leading_gap_is_zero() {
        let out = forward_fill(vec![None, None, Some(2.0)]);
        assert_eq!(out, vec![0.0, 0.0, 2.0]);
    }

    #[test]
    fn test_non_finite_treated_as_missing() {
        let out = forward_fill(vec![Some(5.0), Some(f64::INFINITY), Some(f64::NAN)]);
        assert_eq!(out, vec![5.0, 5.0, 5.0]);
    }

    #[test]
    fn test_fill_matrix_keeps_every_row() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap();
        let rows: Vec<FeatureRow> = (0..4)
            .map(|i| {
                let row = FeatureRow::new(t0 + Duration::minutes(5 * i));
                if i == 2 {
                    row.with("a", 1.0)
                } else {
                    row.with("a", f64::from(i as i32)).with("b", 10.0)
                }
            })
            .collect();
        let m = fill_matrix(&rows, &["a".to_string(), "b".to_string()]);
        assert_eq!(m.shape(), &[4, 2]);
        assert_eq!(m[[2, 1]], 10.0);
        assert_eq!(m[[2, 0]], 1.0);
    }
}
