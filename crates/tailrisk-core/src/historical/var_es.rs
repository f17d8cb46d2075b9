use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::RiskError;
use crate::stats;
use crate::types::{
    with_metadata, ComputationOutput, ModelTag, ReturnMatrix, RiskForecast, WeightVector,
};
use crate::RiskResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input to historical (empirical) VaR/ES estimation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalVarInput {
    /// Asset log-returns.
    pub returns: ReturnMatrix,
    /// Portfolio weights, one per asset column.
    pub weights: WeightVector,
    /// Confidence levels to evaluate, e.g. [0.95, 0.99, 0.995].
    #[serde(default = "default_confidence_levels")]
    pub confidence_levels: Vec<f64>,
    /// Holding period in trading days (results scale by sqrt(h)).
    #[serde(default = "default_horizon")]
    pub horizon_days: u32,
}

fn default_confidence_levels() -> Vec<f64> {
    vec![0.95, 0.99]
}

fn default_horizon() -> u32 {
    1
}

// ---------------------------------------------------------------------------
// Core formula
// ---------------------------------------------------------------------------

/// Empirical VaR and ES of a portfolio return series, as positive loss
/// magnitudes scaled by sqrt(horizon).
///
/// The quantile interpolates linearly between order statistics; ES averages
/// the returns at or below the quantile cutoff. The sqrt-time rule assumes
/// iid returns and is an approximation, not an exact law.
pub(crate) fn var_es_from_series(
    series: &[f64],
    confidence_level: f64,
    horizon_days: u32,
) -> RiskResult<(f64, f64)> {
    validate_confidence(confidence_level)?;
    validate_horizon(horizon_days)?;

    let n = series.len();
    let required = (1.0 / (1.0 - confidence_level)).ceil() as usize;
    if n < required {
        return Err(RiskError::InsufficientData(format!(
            "{} observations, need at least {} for the {} quantile",
            n, required, confidence_level
        )));
    }

    let sorted = stats::sorted_copy(series);
    let q = stats::quantile_sorted(&sorted, 1.0 - confidence_level);
    let scale = (horizon_days as f64).sqrt();

    let var = -q * scale;

    // Tail beyond the VaR cutoff. The minimum is always <= q, so the tail
    // is never empty once the sample-size check passed.
    let tail: Vec<f64> = sorted.iter().copied().take_while(|r| *r <= q).collect();
    let es = -stats::mean(&tail) * scale;

    Ok((var, es))
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

fn validate_horizon(horizon_days: u32) -> RiskResult<()> {
    if horizon_days < 1 {
        return Err(RiskError::InvalidInput {
            field: "horizon_days".into(),
            reason: "Horizon must be at least 1 trading day".into(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Historical VaR and ES for a weighted portfolio, one forecast per
/// requested confidence level.
pub fn historical_var_es(
    input: &HistoricalVarInput,
) -> RiskResult<ComputationOutput<Vec<RiskForecast>>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.confidence_levels.is_empty() {
        return Err(RiskError::InvalidInput {
            field: "confidence_levels".into(),
            reason: "At least one confidence level is required".into(),
        });
    }

    let series = input.returns.portfolio_returns(&input.weights)?;
    let n = series.len();

    let mut forecasts = Vec::with_capacity(input.confidence_levels.len());
    for &cl in &input.confidence_levels {
        let (var, es) = var_es_from_series(&series, cl, input.horizon_days)?;
        let tail_count = ((1.0 - cl) * n as f64).floor() as usize;
        if tail_count < 10 {
            warnings.push(format!(
                "Tail at level {} holds only {} observations; estimates will be noisy",
                cl, tail_count
            ));
        }
        forecasts.push(RiskForecast {
            confidence_level: cl,
            horizon_days: input.horizon_days,
            var,
            es,
            model: ModelTag::Historical,
        });
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Historical Simulation VaR/ES",
        &serde_json::json!({
            "n_obs": n,
            "n_assets": input.returns.n_assets(),
            "confidence_levels": input.confidence_levels,
            "horizon_days": input.horizon_days,
            "horizon_scaling": "sqrt-time (iid approximation)",
        }),
        warnings,
        elapsed,
        forecasts,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
