use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};
use std::time::Instant;

use crate::error::RiskError;
use crate::stats;
use crate::types::{
    with_metadata, ComputationOutput, ModelTag, ReturnMatrix, RiskForecast, WeightVector,
};
use crate::RiskResult;

/// Daily RiskMetrics decay convention.
pub const DEFAULT_LAMBDA: f64 = 0.94;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input to EWMA (RiskMetrics) conditional VaR/ES estimation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EwmaVarInput {
    pub returns: ReturnMatrix,
    pub weights: WeightVector,
    /// Decay factor lambda in (0, 1).
    #[serde(default = "default_lambda")]
    pub lambda: f64,
    #[serde(default = "default_confidence")]
    pub confidence_level: f64,
    #[serde(default = "default_horizon")]
    pub horizon_days: u32,
}

fn default_lambda() -> f64 {
    DEFAULT_LAMBDA
}

fn default_confidence() -> f64 {
    0.95
}

fn default_horizon() -> u32 {
    1
}

/// Output of EWMA VaR/ES estimation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EwmaVarOutput {
    /// Conditional volatility sigma_t, one per observation. sigma_t uses
    /// returns strictly before t, so forecasts[t] is causal for day t.
    pub volatility: Vec<f64>,
    /// Per-step parametric forecasts aligned with `volatility`.
    pub forecasts: Vec<RiskForecast>,
    /// One-step-ahead forecast beyond the end of the sample.
    pub latest: RiskForecast,
}

// ---------------------------------------------------------------------------
// Recursion
// ---------------------------------------------------------------------------

/// EWMA conditional volatility series.
///
/// sigma^2_t = lambda * sigma^2_{t-1} + (1 - lambda) * r^2_{t-1}, seeded
/// with the sample variance of the full series. The recursion is inherently
/// sequential: sigma_t cannot be computed without replaying every step
/// before it.
pub fn ewma_volatility(series: &[f64], lambda: f64) -> RiskResult<Vec<f64>> {
    validate_lambda(lambda)?;
    if series.len() < 2 {
        return Err(RiskError::InsufficientData(
            "EWMA recursion needs at least 2 observations".into(),
        ));
    }

    let mut variance = vec![0.0; series.len()];
    variance[0] = stats::sample_variance(series);
    for t in 1..series.len() {
        variance[t] = lambda * variance[t - 1] + (1.0 - lambda) * series[t - 1].powi(2);
    }

    Ok(variance.into_iter().map(f64::sqrt).collect())
}

/// One-step-ahead conditional variance given the last sigma and return.
pub(crate) fn next_variance(lambda: f64, sigma_last: f64, r_last: f64) -> f64 {
    lambda * sigma_last.powi(2) + (1.0 - lambda) * r_last.powi(2)
}

/// z_alpha and the closed-form normal ES multiplier phi(z)/(1 - alpha).
pub(crate) fn normal_tail_factors(confidence_level: f64) -> RiskResult<(f64, f64)> {
    if !confidence_level.is_finite() || confidence_level <= 0.0 || confidence_level >= 1.0 {
        return Err(RiskError::InvalidInput {
            field: "confidence_level".into(),
            reason: format!(
                "Confidence level must be in (0, 1) exclusive, got {}",
                confidence_level
            ),
        });
    }
    let std_normal = Normal::new(0.0, 1.0).map_err(|e| {
        RiskError::NumericalInstability(format!("Standard normal construction failed: {e}"))
    })?;
    let z = std_normal.inverse_cdf(confidence_level);
    let es_factor = std_normal.pdf(z) / (1.0 - confidence_level);
    Ok((z, es_factor))
}

fn validate_lambda(lambda: f64) -> RiskResult<()> {
    if !lambda.is_finite() || lambda <= 0.0 || lambda >= 1.0 {
        return Err(RiskError::InvalidInput {
            field: "lambda".into(),
            reason: format!("Decay factor must be in (0, 1) exclusive, got {}", lambda),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// EWMA conditional VaR/ES under conditional normality: one forecast per
/// time step plus the one-step-ahead estimate.
pub fn ewma_var_es(input: &EwmaVarInput) -> RiskResult<ComputationOutput<EwmaVarOutput>> {
    let start = Instant::now();
    let warnings: Vec<String> = Vec::new();

    if input.horizon_days < 1 {
        return Err(RiskError::InvalidInput {
            field: "horizon_days".into(),
            reason: "Horizon must be at least 1 trading day".into(),
        });
    }

    let series = input.returns.portfolio_returns(&input.weights)?;
    let volatility = ewma_volatility(&series, input.lambda)?;
    let (z, es_factor) = normal_tail_factors(input.confidence_level)?;
    let scale = (input.horizon_days as f64).sqrt();

    let forecast_at = |sigma: f64| RiskForecast {
        confidence_level: input.confidence_level,
        horizon_days: input.horizon_days,
        var: sigma * z * scale,
        es: sigma * es_factor * scale,
        model: ModelTag::Ewma,
    };

    let forecasts: Vec<RiskForecast> = volatility.iter().map(|s| forecast_at(*s)).collect();

    let sigma_last = volatility[volatility.len() - 1];
    let r_last = series[series.len() - 1];
    let sigma_next = next_variance(input.lambda, sigma_last, r_last).sqrt();
    let latest = forecast_at(sigma_next);

    let output = EwmaVarOutput {
        volatility,
        forecasts,
        latest,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "EWMA (RiskMetrics) Conditional VaR/ES",
        &serde_json::json!({
            "lambda": input.lambda,
            "confidence_level": input.confidence_level,
            "horizon_days": input.horizon_days,
            "n_obs": series.len(),
            "variance_seed": "sample variance of the full series",
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
