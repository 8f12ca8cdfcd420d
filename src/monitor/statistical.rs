//! Two-sample Kolmogorov-Smirnov test

/// Result of a two-sample KS test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KsResult {
    /// sup |F₁ − F₂| over the pooled sample
    pub statistic: f64,
    pub p_value: f64,
}

/// Survival function of the Kolmogorov distribution, `P(K > λ)`
pub fn ks_p_value(lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return 1.0;
    }
    // P(K > λ) = 2 Σ_{k≥1} (-1)^{k+1} exp(-2 k² λ²)
    let mut p = 0.0;
    for k in 1..=100 {
        let sign = if k % 2 == 1 { 1.0 } else { -1.0 };
        let term = sign * (-2.0 * f64::from(k).powi(2) * lambda.powi(2)).exp();
        p += term;
        if term.abs() < 1e-10 {
            break;
        }
    }
    (2.0 * p).clamp(0.0, 1.0)
}

/// Largest distance between the empirical CDFs of two samples
///
/// Tied values advance both CDFs together before the distance is taken.
/// Non-finite values must be removed by the caller.
pub fn ks_statistic(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_by(f64::total_cmp);
    b.sort_by(f64::total_cmp);

    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let (mut i, mut j) = (0usize, 0usize);
    let mut d_max = 0.0f64;
    while i < a.len() && j < b.len() {
        let x = a[i].min(b[j]);
        while i < a.len() && a[i] <= x {
            i += 1;
        }
        while j < b.len() && b[j] <= x {
            j += 1;
        }
        d_max = d_max.max((i as f64 / n1 - j as f64 / n2).abs());
    }
    d_max
}

/// Two-sample KS test with the Stephens small-sample correction
///
/// `λ = (√nₑ + 0.12 + 0.11/√nₑ)·D` with `nₑ = n₁n₂/(n₁+n₂)`.
pub fn ks_two_sample(reference: &[f64], current: &[f64]) -> KsResult {
    let statistic = ks_statistic(reference, current);
    if reference.is_empty() || current.is_empty() {
        return KsResult {
            statistic,
            p_value: 1.0,
        };
    }
    let (n1, n2) = (reference.len() as f64, current.len() as f64);
    let en = (n1 * n2 / (n1 + n2)).sqrt();
    let lambda = (en + 0.12 + 0.11 / en) * statistic;
    KsResult {
        statistic,
        p_value: ks_p_value(lambda),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    #[test]
    fn test_identical_samples() {
        let a: Vec<f64> = (0..100).map(f64::from).collect();
        let r = ks_two_sample(&a, &a);
        assert_abs_diff_eq!(r.statistic, 0.0);
        assert_abs_diff_eq!(r.p_value, 1.0);
    }

    #[test]
    fn test_disjoint_samples() {
        let a: Vec<f64> = (0..60).map(f64::from).collect();
        let b: Vec<f64> = (100..160).map(f64::from).collect();
        let r = ks_two_sample(&a, &b);
        assert_abs_diff_eq!(r.statistic, 1.0);
        assert!(r.p_value < 1e-6);
    }

    #[test]
    fn test_ties_are_grouped() {
        let a = [1.0, 1.0, 2.0, 2.0];
        let b = [1.0, 2.0];
        assert_abs_diff_eq!(ks_statistic(&a, &b), 0.0);
    }

    #[test]
    fn test_half_shift() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [3.0, 4.0, 5.0, 6.0];
        assert_abs_diff_eq!(ks_statistic(&a, &b), 0.5);
    }

    #[test]
    fn test_p_value_bounds() {
        assert_abs_diff_eq!(ks_p_value(0.0), 1.0);
        assert!(ks_p_value(0.5) > 0.9);
        // critical value at α = 0.05
        assert_abs_diff_eq!(ks_p_value(1.358), 0.05, epsilon = 1e-3);
        assert!(ks_p_value(3.0) < 1e-6);
    }

    #[test]
    fn test_empty_sample() {
        let r = ks_two_sample(&[], &[1.0, 2.0]);
        assert_abs_diff_eq!(r.p_value, 1.0);
    }

    proptest! {
        #[test]
        fn prop_statistic_in_unit_interval(
            a in prop::collection::vec(-1e3f64..1e3, 1..50),
            b in prop::collection::vec(-1e3f64..1e3, 1..50),
        ) {
            let d = ks_statistic(&a, &b);
            prop_assert!((0.0..=1.0).contains(&d));
            prop_assert!((d - ks_statistic(&b, &a)).abs() < 1e-12);
        }
    }
}
