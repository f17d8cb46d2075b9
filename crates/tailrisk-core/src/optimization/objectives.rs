use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::historical::var_es::var_es_from_series;
use crate::optimization::solver::{minimize_on_simplex, SolverOptions};
use crate::stats;
use crate::types::{with_metadata, ComputationOutput, OptimizationResult, ReturnMatrix, WeightVector};
use crate::RiskResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input to ES-minimizing portfolio optimization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsOptimizationInput {
    pub returns: ReturnMatrix,
    #[serde(default = "default_confidence")]
    pub confidence_level: f64,
    #[serde(default = "default_horizon")]
    pub horizon_days: u32,
    #[serde(default)]
    pub solver: SolverOptions,
}

/// Input to Sharpe-maximizing portfolio optimization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharpeOptimizationInput {
    pub returns: ReturnMatrix,
    /// Annual risk-free rate.
    #[serde(default)]
    pub risk_free_rate: f64,
    /// Trading periods per year (252 for daily data).
    #[serde(default = "default_annualization")]
    pub annualization_factor: f64,
    #[serde(default)]
    pub solver: SolverOptions,
}

fn default_confidence() -> f64 {
    0.95
}

fn default_horizon() -> u32 {
    1
}

fn default_annualization() -> f64 {
    252.0
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Find the long-only, fully-invested weights minimizing historical ES.
///
/// The objective is the sample ES of `returns · w`, so it stays well-defined
/// even when the asset covariance is singular. Non-convergence within the
/// iteration budget returns the best iterate with `converged = false`.
pub fn minimize_es(
    input: &EsOptimizationInput,
) -> RiskResult<ComputationOutput<OptimizationResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let returns = &input.returns;
    let outcome = minimize_on_simplex(
        |w| {
            let series = returns.series_raw(w);
            let (_, es) = var_es_from_series(&series, input.confidence_level, input.horizon_days)?;
            Ok(es)
        },
        returns.n_assets(),
        &input.solver,
    )?;

    if !outcome.converged {
        warnings.push(format!(
            "Solver stopped after {} iterations without converging; best iterate returned",
            outcome.iterations
        ));
    }

    let result = OptimizationResult {
        weights: WeightVector::normalized(outcome.weights)?,
        objective_value: outcome.objective,
        converged: outcome.converged,
        iterations: outcome.iterations,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Historical ES Minimization",
        &serde_json::json!({
            "confidence_level": input.confidence_level,
            "horizon_days": input.horizon_days,
            "constraints": "long-only, fully-invested",
            "initial_guess": "equal weights",
            "max_iterations": input.solver.max_iterations,
        }),
        warnings,
        elapsed,
        result,
    ))
}

/// Find the long-only, fully-invested weights maximizing the annualized
/// Sharpe ratio. The reported objective value is the Sharpe ratio at the
/// optimum (positive; the solver internally minimizes its negation).
pub fn maximize_sharpe(
    input: &SharpeOptimizationInput,
) -> RiskResult<ComputationOutput<OptimizationResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let returns = &input.returns;
    let af = input.annualization_factor;
    if !af.is_finite() || af <= 0.0 {
        return Err(crate::RiskError::InvalidInput {
            field: "annualization_factor".into(),
            reason: format!("Must be positive, got {}", af),
        });
    }
    let rf_periodic = input.risk_free_rate / af;

    let outcome = minimize_on_simplex(
        |w| {
            let series = returns.series_raw(w);
            let mu = stats::mean(&series);
            let sigma = stats::sample_std(&series);
            if sigma == 0.0 {
                // Degenerate: a riskless series has no defined Sharpe;
                // treat as neutral so the solver can move off it.
                return Ok(0.0);
            }
            let sharpe_annual = (mu - rf_periodic) / sigma * af.sqrt();
            Ok(-sharpe_annual)
        },
        returns.n_assets(),
        &input.solver,
    )?;

    if !outcome.converged {
        warnings.push(format!(
            "Solver stopped after {} iterations without converging; best iterate returned",
            outcome.iterations
        ));
    }

    let result = OptimizationResult {
        weights: WeightVector::normalized(outcome.weights)?,
        objective_value: -outcome.objective,
        converged: outcome.converged,
        iterations: outcome.iterations,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Annualized Sharpe Maximization",
        &serde_json::json!({
            "risk_free_rate": input.risk_free_rate,
            "annualization_factor": af,
            "constraints": "long-only, fully-invested",
            "initial_guess": "equal weights",
            "max_iterations": input.solver.max_iterations,
        }),
        warnings,
        elapsed,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, NaiveDate};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use statrs::distribution::Normal;

    /// Three assets with distinct volatilities and a mild mean spread,
    /// 400 observations from a fixed seed.
    fn three_asset_matrix() -> ReturnMatrix {
        let d0 = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let vols = [0.02, 0.008, 0.03];
        let means = [0.0006, 0.0002, 0.0004];

        let mut dates = Vec::new();
        let mut rows = Vec::new();
        for i in 0..400u64 {
            dates.push(d0 + Days::new(i));
            let row = (0..3)
                .map(|j| {
                    let n = Normal::new(means[j], vols[j]).unwrap();
                    rng.sample(n)
                })
                .collect();
            rows.push(row);
        }
        ReturnMatrix::new(dates, vec!["EQ".into(), "BOND".into(), "CRYPTO".into()], rows).unwrap()
    }

    fn es_of(returns: &ReturnMatrix, w: &[f64], cl: f64) -> f64 {
        let series = returns.series_raw(w);
        var_es_from_series(&series, cl, 1).unwrap().1
    }

    // ------------------------------------------------------------------
    // 1. Optimized ES beats equal weights and every vertex
    // ------------------------------------------------------------------
    #[test]
    fn test_es_optimum_dominates_baselines() {
        let returns = three_asset_matrix();
        let input = EsOptimizationInput {
            returns: returns.clone(),
            confidence_level: 0.95,
            horizon_days: 1,
            solver: SolverOptions::default(),
        };
        let out = minimize_es(&input).unwrap();
        let opt_es = out.result.objective_value;

        let equal = es_of(&returns, &[1.0 / 3.0; 3], 0.95);
        assert!(opt_es <= equal + 1e-9, "{} vs equal {}", opt_es, equal);

        for j in 0..3 {
            let mut vertex = [0.0; 3];
            vertex[j] = 1.0;
            let v_es = es_of(&returns, &vertex, 0.95);
            assert!(opt_es <= v_es + 1e-9, "{} vs vertex {} {}", opt_es, j, v_es);
        }
    }

    // ------------------------------------------------------------------
    // 2. Result is a valid long-only allocation
    // ------------------------------------------------------------------
    #[test]
    fn test_es_result_feasible() {
        let input = EsOptimizationInput {
            returns: three_asset_matrix(),
            confidence_level: 0.95,
            horizon_days: 1,
            solver: SolverOptions::default(),
        };
        let out = minimize_es(&input).unwrap();
        let w = out.result.weights.as_slice();
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-8);
        assert!(w.iter().all(|wi| *wi >= 0.0));
        assert!(out.result.iterations > 0);
    }

    // ------------------------------------------------------------------
    // 3. Objective value equals the ES at the returned weights
    // ------------------------------------------------------------------
    #[test]
    fn test_es_objective_consistent() {
        let returns = three_asset_matrix();
        let input = EsOptimizationInput {
            returns: returns.clone(),
            confidence_level: 0.95,
            horizon_days: 1,
            solver: SolverOptions::default(),
        };
        let out = minimize_es(&input).unwrap();
        let recomputed = es_of(&returns, out.result.weights.as_slice(), 0.95);
        assert!((out.result.objective_value - recomputed).abs() < 1e-9);
    }

    // ------------------------------------------------------------------
    // 4. Sharpe optimizer prefers the higher risk-adjusted asset
    // ------------------------------------------------------------------
    #[test]
    fn test_sharpe_prefers_better_asset() {
        let d0 = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let mut dates = Vec::new();
        let mut rows = Vec::new();
        for i in 0..400u64 {
            dates.push(d0 + Days::new(i));
            let good = rng.sample(Normal::new(0.0010, 0.01).unwrap());
            let flat = rng.sample(Normal::new(0.0000, 0.01).unwrap());
            rows.push(vec![good, flat]);
        }
        let returns =
            ReturnMatrix::new(dates, vec!["GOOD".into(), "FLAT".into()], rows).unwrap();

        let input = SharpeOptimizationInput {
            returns,
            risk_free_rate: 0.0,
            annualization_factor: 252.0,
            solver: SolverOptions::default(),
        };
        let out = maximize_sharpe(&input).unwrap();
        let w = out.result.weights.as_slice();
        assert!(w[0] > w[1], "weights {:?}", w);
        assert!(out.result.objective_value > 0.0);
    }

    // ------------------------------------------------------------------
    // 5. Insufficient sample fails fast at the boundary
    // ------------------------------------------------------------------
    #[test]
    fn test_es_insufficient_sample() {
        let d0 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates: Vec<NaiveDate> = (0..5u64).map(|i| d0 + Days::new(i)).collect();
        let rows = vec![vec![0.01, 0.0]; 5];
        let returns = ReturnMatrix::new(dates, vec!["A".into(), "B".into()], rows).unwrap();
        let input = EsOptimizationInput {
            returns,
            confidence_level: 0.95,
            horizon_days: 1,
            solver: SolverOptions::default(),
        };
        assert!(minimize_es(&input).is_err());
    }
}
