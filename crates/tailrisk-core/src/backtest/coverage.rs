use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::error::RiskError;
use crate::types::{BreachObservation, TestDecision, TestResult};
use crate::RiskResult;

// ---------------------------------------------------------------------------
// Shared pieces
// ---------------------------------------------------------------------------

/// x * ln(y) with the 0 * ln(0) = 0 convention used throughout the
/// likelihood-ratio statistics. Keeps x = 0 or x = n from producing ln(0).
pub(crate) fn xlogy(x: f64, y: f64) -> f64 {
    if x == 0.0 {
        0.0
    } else {
        x * y.ln()
    }
}

fn chi_square_p_value(statistic: f64, df: u32) -> RiskResult<f64> {
    let chi = ChiSquared::new(df as f64).map_err(|e| {
        RiskError::NumericalInstability(format!("Chi-squared({}) construction failed: {e}", df))
    })?;
    Ok(1.0 - chi.cdf(statistic))
}

fn validate_significance(significance: f64) -> RiskResult<()> {
    if !significance.is_finite() || significance <= 0.0 || significance >= 1.0 {
        return Err(RiskError::InvalidInput {
            field: "significance".into(),
            reason: format!(
                "Significance level must be in (0, 1) exclusive, got {}",
                significance
            ),
        });
    }
    Ok(())
}

fn validate_confidence(confidence_level: f64) -> RiskResult<()> {
    if !confidence_level.is_finite() || confidence_level <= 0.0 || confidence_level >= 1.0 {
        return Err(RiskError::InvalidInput {
            field: "confidence_level".into(),
            reason: format!(
                "Confidence level must be in (0, 1) exclusive, got {}",
                confidence_level
            ),
        });
    }
    Ok(())
}

fn breach_indicators(breaches: &[BreachObservation]) -> Vec<bool> {
    breaches.iter().map(|b| b.breach).collect()
}

/// Decision rule shared by the coverage tests: a zero-breach sample has no
/// statistical power and is reported inconclusive instead of passing.
fn decide(x: usize, p_value: f64, significance: f64, flags: &mut Vec<String>) -> TestDecision {
    if x == 0 {
        flags.push("insufficient breaches: 0 observed".into());
        return TestDecision::Inconclusive;
    }
    if p_value < significance {
        TestDecision::Reject
    } else {
        TestDecision::FailToReject
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Kupiec proportion-of-failures likelihood ratio, asymptotically chi2(1).
pub(crate) fn kupiec_statistic(n: usize, x: usize, p: f64) -> f64 {
    let nf = n as f64;
    let xf = x as f64;
    let pi = xf / nf;
    let null = xlogy(nf - xf, 1.0 - p) + xlogy(xf, p);
    let alt = xlogy(nf - xf, 1.0 - pi) + xlogy(xf, pi);
    -2.0 * (null - alt)
}

/// Christoffersen independence likelihood ratio from breach-indicator
/// transition counts, asymptotically chi2(1). Returns the statistic plus
/// the counts (n00, n01, n10, n11) for diagnostics.
pub(crate) fn independence_statistic(indicators: &[bool]) -> (f64, [usize; 4]) {
    let mut counts = [0usize; 4];
    for pair in indicators.windows(2) {
        let idx = (pair[0] as usize) * 2 + pair[1] as usize;
        counts[idx] += 1;
    }
    let [n00, n01, n10, n11] = counts;
    let (n00f, n01f, n10f, n11f) = (n00 as f64, n01 as f64, n10 as f64, n11 as f64);

    let total = n00f + n01f + n10f + n11f;
    let pi = (n01f + n11f) / total;
    let from0 = n00f + n01f;
    let from1 = n10f + n11f;
    let pi01 = if from0 > 0.0 { n01f / from0 } else { 0.0 };
    let pi11 = if from1 > 0.0 { n11f / from1 } else { 0.0 };

    let null = xlogy(n00f + n10f, 1.0 - pi) + xlogy(n01f + n11f, pi);
    let alt = xlogy(n00f, 1.0 - pi01)
        + xlogy(n01f, pi01)
        + xlogy(n10f, 1.0 - pi11)
        + xlogy(n11f, pi11);
    (-2.0 * (null - alt), counts)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Kupiec proportion-of-failures test of unconditional breach coverage.
///
/// Null hypothesis: breaches occur with probability 1 - alpha. Rejection
/// means the breach *frequency* is wrong in either direction.
pub fn kupiec_pof(
    breaches: &[BreachObservation],
    confidence_level: f64,
    significance: f64,
) -> RiskResult<TestResult> {
    validate_confidence(confidence_level)?;
    validate_significance(significance)?;
    let n = breaches.len();
    if n == 0 {
        return Err(RiskError::InsufficientData(
            "Kupiec test needs at least one forecast".into(),
        ));
    }

    let x = breaches.iter().filter(|b| b.breach).count();
    let p = 1.0 - confidence_level;
    let statistic = kupiec_statistic(n, x, p);
    let p_value = chi_square_p_value(statistic, 1)?;

    let mut flags = Vec::new();
    if x == n {
        flags.push("every forecast breached".into());
    }
    let decision = decide(x, p_value, significance, &mut flags);

    Ok(TestResult {
        name: "Kupiec POF".into(),
        statistic,
        df: Some(1),
        p_value,
        significance,
        decision,
        flags,
    })
}

/// Christoffersen independence test: Bernoulli breaches against a 2-state
/// Markov chain with state-dependent breach probability. Rejection means
/// breaches cluster in time.
pub fn christoffersen_independence(
    breaches: &[BreachObservation],
    significance: f64,
) -> RiskResult<TestResult> {
    validate_significance(significance)?;
    if breaches.len() < 2 {
        return Err(RiskError::InsufficientData(
            "Independence test needs at least two consecutive forecasts".into(),
        ));
    }

    let indicators = breach_indicators(breaches);
    let x = indicators.iter().filter(|b| **b).count();
    let (statistic, [n00, n01, n10, n11]) = independence_statistic(&indicators);
    let p_value = chi_square_p_value(statistic, 1)?;

    let mut flags = vec![format!(
        "transitions n00={} n01={} n10={} n11={}",
        n00, n01, n10, n11
    )];
    let decision = decide(x, p_value, significance, &mut flags);

    Ok(TestResult {
        name: "Christoffersen Independence".into(),
        statistic,
        df: Some(1),
        p_value,
        significance,
        decision,
        flags,
    })
}

/// Christoffersen conditional-coverage test: joint statistic
/// LR_cc = LR_uc + LR_ind, asymptotically chi2(2). Rejection means the
/// breach process has the wrong frequency, clusters in time, or both.
pub fn christoffersen_cc(
    breaches: &[BreachObservation],
    confidence_level: f64,
    significance: f64,
) -> RiskResult<TestResult> {
    validate_confidence(confidence_level)?;
    validate_significance(significance)?;
    if breaches.len() < 2 {
        return Err(RiskError::InsufficientData(
            "Conditional coverage test needs at least two consecutive forecasts".into(),
        ));
    }

    let indicators = breach_indicators(breaches);
    let n = indicators.len();
    let x = indicators.iter().filter(|b| **b).count();
    let lr_uc = kupiec_statistic(n, x, 1.0 - confidence_level);
    let (lr_ind, _) = independence_statistic(&indicators);
    let statistic = lr_uc + lr_ind;
    let p_value = chi_square_p_value(statistic, 2)?;

    let mut flags = Vec::new();
    let decision = decide(x, p_value, significance, &mut flags);

    Ok(TestResult {
        name: "Christoffersen Conditional Coverage".into(),
        statistic,
        df: Some(2),
        p_value,
        significance,
        decision,
        flags,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BreachObservation, BreachSequence};
    use chrono::{Days, NaiveDate};

    /// Breach sequence from a plain indicator pattern.
    fn sequence(indicators: &[bool]) -> BreachSequence {
        let d0 = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
        indicators
            .iter()
            .enumerate()
            .map(|(i, breach)| BreachObservation {
                date: d0 + Days::new(i as u64),
                loss: if *breach { 0.05 } else { 0.001 },
                var: 0.03,
                es: 0.04,
                breach: *breach,
            })
            .collect()
    }

    fn n_breaches(n: usize, x: usize) -> BreachSequence {
        let mut ind = vec![false; n];
        for slot in ind.iter_mut().take(x) {
            *slot = true;
        }
        sequence(&ind)
    }

    // ------------------------------------------------------------------
    // 1. Kupiec statistic and decision at the chi2(1) boundary
    // ------------------------------------------------------------------
    #[test]
    fn test_kupiec_boundary_cases() {
        // 6 breaches in 250 days at 99%: LR ~ 3.55 < 3.84 -> no rejection
        let r6 = kupiec_pof(&n_breaches(250, 6), 0.99, 0.05).unwrap();
        assert!((r6.statistic - 3.548).abs() < 5e-3, "{}", r6.statistic);
        assert_eq!(r6.decision, TestDecision::FailToReject);

        // 8 breaches: LR ~ 7.73 > 3.84 -> rejection
        let r8 = kupiec_pof(&n_breaches(250, 8), 0.99, 0.05).unwrap();
        assert!((r8.statistic - 7.734).abs() < 5e-3, "{}", r8.statistic);
        assert_eq!(r8.decision, TestDecision::Reject);
    }

    // ------------------------------------------------------------------
    // 2. Near-expected breach count does not reject
    // ------------------------------------------------------------------
    #[test]
    fn test_kupiec_expected_rate() {
        // Expected breaches at 99% over 250 days ~ 2.5; x = 3 is healthy
        let r = kupiec_pof(&n_breaches(250, 3), 0.99, 0.05).unwrap();
        assert!(r.statistic < 0.2, "{}", r.statistic);
        assert!(r.p_value > 0.05);
        assert_eq!(r.decision, TestDecision::FailToReject);
    }

    // ------------------------------------------------------------------
    // 3. Exact coverage gives a zero statistic
    // ------------------------------------------------------------------
    #[test]
    fn test_kupiec_exact_coverage() {
        // x/n = 1/100 exactly matches p = 0.01
        let r = kupiec_pof(&n_breaches(100, 1), 0.99, 0.05).unwrap();
        assert!(r.statistic.abs() < 1e-12);
        assert!((r.p_value - 1.0).abs() < 1e-9);
    }

    // ------------------------------------------------------------------
    // 4. Zero breaches are inconclusive, never a domain error
    // ------------------------------------------------------------------
    #[test]
    fn test_zero_breaches_inconclusive() {
        let seq = n_breaches(250, 0);
        let k = kupiec_pof(&seq, 0.99, 0.05).unwrap();
        assert_eq!(k.decision, TestDecision::Inconclusive);
        assert!(k.flags.iter().any(|f| f.contains("insufficient breaches")));
        assert!(k.statistic.is_finite());

        let i = christoffersen_independence(&seq, 0.05).unwrap();
        assert_eq!(i.decision, TestDecision::Inconclusive);
        let cc = christoffersen_cc(&seq, 0.99, 0.05).unwrap();
        assert_eq!(cc.decision, TestDecision::Inconclusive);
    }

    // ------------------------------------------------------------------
    // 5. Clustered breaches fail the independence test
    // ------------------------------------------------------------------
    #[test]
    fn test_independence_detects_clustering() {
        // 10 breaches in a single run at the end of 250 days
        let mut ind = vec![false; 250];
        for slot in ind.iter_mut().skip(240) {
            *slot = true;
        }
        let r = christoffersen_independence(&sequence(&ind), 0.05).unwrap();
        assert!(r.statistic > 10.0, "{}", r.statistic);
        assert_eq!(r.decision, TestDecision::Reject);
    }

    // ------------------------------------------------------------------
    // 6. Evenly spread breaches pass the independence test
    // ------------------------------------------------------------------
    #[test]
    fn test_independence_accepts_spread_breaches() {
        let ind: Vec<bool> = (0..250).map(|i| i % 25 == 24).collect();
        let r = christoffersen_independence(&sequence(&ind), 0.05).unwrap();
        assert!(r.statistic < 3.84, "{}", r.statistic);
        assert_eq!(r.decision, TestDecision::FailToReject);
    }

    // ------------------------------------------------------------------
    // 7. Conditional coverage is the sum of the component statistics
    // ------------------------------------------------------------------
    #[test]
    fn test_conditional_coverage_additive() {
        let seq = n_breaches(250, 6);
        let uc = kupiec_pof(&seq, 0.99, 0.05).unwrap();
        let ind = christoffersen_independence(&seq, 0.05).unwrap();
        let cc = christoffersen_cc(&seq, 0.99, 0.05).unwrap();
        assert!((cc.statistic - (uc.statistic + ind.statistic)).abs() < 1e-12);
        assert_eq!(cc.df, Some(2));
    }

    // ------------------------------------------------------------------
    // 8. Parameter validation
    // ------------------------------------------------------------------
    #[test]
    fn test_parameter_validation() {
        let seq = n_breaches(100, 2);
        assert!(kupiec_pof(&seq, 1.0, 0.05).is_err());
        assert!(kupiec_pof(&seq, 0.99, 0.0).is_err());
        assert!(kupiec_pof(&[], 0.99, 0.05).is_err());
        assert!(christoffersen_independence(&n_breaches(1, 0), 0.05).is_err());
    }

    // ------------------------------------------------------------------
    // 9. xlogy convention
    // ------------------------------------------------------------------
    #[test]
    fn test_xlogy_convention() {
        assert_eq!(xlogy(0.0, 0.0), 0.0);
        assert_eq!(xlogy(0.0, 5.0), 0.0);
        assert!((xlogy(2.0, std::f64::consts::E) - 2.0).abs() < 1e-15);
    }
}
