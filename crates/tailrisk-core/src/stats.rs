//! Shared series statistics used by every engine.

/// Arithmetic mean. Returns 0 for an empty slice; callers enforce their own
/// minimum-sample rules before getting here.
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Unbiased sample variance (ddof = 1).
pub(crate) fn sample_variance(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64
}

/// Sample standard deviation (ddof = 1).
pub(crate) fn sample_std(values: &[f64]) -> f64 {
    sample_variance(values).sqrt()
}

/// Quantile of a **sorted** slice with linear interpolation between order
/// statistics. `q` in [0, 1].
pub(crate) fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = q * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

/// Ascending sort that tolerates the total-order quirks of f64. Inputs are
/// validated finite at the type boundary, so the fallback ordering is moot.
pub(crate) fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    out
}

/// Deterministic per-unit sub-seed for parallel stochastic work. The odd
/// multiplier decorrelates consecutive unit indices so chunk boundaries do
/// not matter for reproducibility.
pub(crate) fn sub_seed(base: u64, unit: u64) -> u64 {
    base.wrapping_add(unit.wrapping_mul(6_364_136_223_846_793_005))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------
    // 1. Quantile interpolation
    // ------------------------------------------------------------------
    #[test]
    fn test_quantile_interpolates() {
        let sorted = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile_sorted(&sorted, 0.0), 1.0);
        assert_eq!(quantile_sorted(&sorted, 1.0), 5.0);
        assert_eq!(quantile_sorted(&sorted, 0.5), 3.0);
        // Rank 0.1 * 4 = 0.4 -> between first and second order statistic
        assert!((quantile_sorted(&sorted, 0.1) - 1.4).abs() < 1e-12);
    }

    // ------------------------------------------------------------------
    // 2. Sample variance uses ddof = 1
    // ------------------------------------------------------------------
    #[test]
    fn test_sample_variance() {
        let values = vec![1.0, 2.0, 3.0, 4.0];
        // mean 2.5, squared deviations sum 5.0, / 3
        assert!((sample_variance(&values) - 5.0 / 3.0).abs() < 1e-12);
        assert_eq!(sample_variance(&[1.0]), 0.0);
    }

    // ------------------------------------------------------------------
    // 3. Sub-seeds differ across units and repeat across calls
    // ------------------------------------------------------------------
    #[test]
    fn test_sub_seed_deterministic() {
        assert_eq!(sub_seed(42, 7), sub_seed(42, 7));
        assert_ne!(sub_seed(42, 7), sub_seed(42, 8));
    }
}
