use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::RiskError;
use crate::ewma::volatility::{ewma_volatility, next_variance, normal_tail_factors};
use crate::historical::var_es::var_es_from_series;
use crate::types::{BreachObservation, BreachSequence, ReturnMatrix, WeightVector};
use crate::RiskResult;

/// Rolling-window length convention: one trading year.
pub const DEFAULT_WINDOW: usize = 250;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which engine produces the rolling out-of-sample forecasts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ForecastModel {
    #[default]
    Historical,
    Ewma {
        lambda: f64,
    },
}

/// Input to rolling forecast generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingForecastInput {
    pub returns: ReturnMatrix,
    pub weights: WeightVector,
    /// Window length W: day t is forecast from returns in [t - W, t - 1].
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default = "default_confidence")]
    pub confidence_level: f64,
    #[serde(default)]
    pub model: ForecastModel,
}

fn default_window() -> usize {
    DEFAULT_WINDOW
}

fn default_confidence() -> f64 {
    0.99
}

// ---------------------------------------------------------------------------
// Forecast generation
// ---------------------------------------------------------------------------

/// Roll the chosen engine forward in time and label breaches.
///
/// For each day t >= W the forecast uses the window [t - W, t - 1] only, so
/// every entry is strictly out of sample. A breach is a realized loss
/// strictly greater than the forecast VaR.
///
/// Historical windows are independent of each other and are evaluated in
/// parallel. The EWMA recursion is sequential within a window, so that arm
/// replays each window in time order.
pub fn rolling_forecasts(input: &RollingForecastInput) -> RiskResult<BreachSequence> {
    let window = input.window;
    if window < 2 {
        return Err(RiskError::InvalidInput {
            field: "window".into(),
            reason: format!("Rolling window must span at least 2 days, got {}", window),
        });
    }

    let series = input.returns.portfolio_returns(&input.weights)?;
    let n = series.len();
    if n <= window {
        return Err(RiskError::InsufficientData(format!(
            "{} observations leave no out-of-sample days after a {}-day window",
            n, window
        )));
    }

    let dates = input.returns.dates();
    let entry = |t: usize, var: f64, es: f64| {
        let loss = -series[t];
        BreachObservation {
            date: dates[t],
            loss,
            var,
            es,
            breach: loss > var,
        }
    };

    match input.model {
        ForecastModel::Historical => (window..n)
            .into_par_iter()
            .map(|t| {
                let (var, es) =
                    var_es_from_series(&series[t - window..t], input.confidence_level, 1)?;
                Ok(entry(t, var, es))
            })
            .collect(),
        ForecastModel::Ewma { lambda } => {
            let (z, es_factor) = normal_tail_factors(input.confidence_level)?;
            let mut out = Vec::with_capacity(n - window);
            for t in window..n {
                let w = &series[t - window..t];
                let vol = ewma_volatility(w, lambda)?;
                let sigma = next_variance(lambda, vol[window - 1], w[window - 1]).sqrt();
                out.push(entry(t, sigma * z, sigma * es_factor));
            }
            Ok(out)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, NaiveDate};

    /// 500-day single-asset history with a repeating non-trivial pattern.
    fn history(n: u64) -> ReturnMatrix {
        let d0 = NaiveDate::from_ymd_opt(2017, 1, 2).unwrap();
        let mut dates = Vec::new();
        let mut rows = Vec::new();
        for i in 0..n {
            dates.push(d0 + Days::new(i));
            let r = (((i * 17) % 101) as f64 - 50.0) / 2500.0;
            rows.push(vec![r]);
        }
        ReturnMatrix::new(dates, vec!["PORT".into()], rows).unwrap()
    }

    fn input_for(n: u64, model: ForecastModel) -> RollingForecastInput {
        RollingForecastInput {
            returns: history(n),
            weights: WeightVector::new(vec![1.0]).unwrap(),
            window: 250,
            confidence_level: 0.99,
            model,
        }
    }

    // ------------------------------------------------------------------
    // 1. 500 days with W = 250 yield exactly 250 out-of-sample entries
    // ------------------------------------------------------------------
    #[test]
    fn test_out_of_sample_count_and_dates() {
        let input = input_for(500, ForecastModel::Historical);
        let breaches = rolling_forecasts(&input).unwrap();
        assert_eq!(breaches.len(), 250);
        assert_eq!(breaches[0].date, input.returns.dates()[250]);
        assert_eq!(breaches[249].date, *input.returns.dates().last().unwrap());
    }

    // ------------------------------------------------------------------
    // 2. First forecast equals a direct evaluation of the first window
    // ------------------------------------------------------------------
    #[test]
    fn test_first_historical_forecast_causal() {
        let input = input_for(400, ForecastModel::Historical);
        let breaches = rolling_forecasts(&input).unwrap();

        let series = input
            .returns
            .portfolio_returns(&input.weights)
            .unwrap();
        let (var, es) = var_es_from_series(&series[0..250], 0.99, 1).unwrap();
        assert_eq!(breaches[0].var, var);
        assert_eq!(breaches[0].es, es);
        assert_eq!(breaches[0].loss, -series[250]);
    }

    // ------------------------------------------------------------------
    // 3. EWMA arm matches a manual window replay
    // ------------------------------------------------------------------
    #[test]
    fn test_ewma_forecast_matches_replay() {
        let input = input_for(300, ForecastModel::Ewma { lambda: 0.94 });
        let breaches = rolling_forecasts(&input).unwrap();

        let series = input
            .returns
            .portfolio_returns(&input.weights)
            .unwrap();
        let w = &series[0..250];
        let vol = ewma_volatility(w, 0.94).unwrap();
        let sigma = next_variance(0.94, vol[249], w[249]).sqrt();
        let (z, es_factor) = normal_tail_factors(0.99).unwrap();

        assert!((breaches[0].var - sigma * z).abs() < 1e-15);
        assert!((breaches[0].es - sigma * es_factor).abs() < 1e-15);
    }

    // ------------------------------------------------------------------
    // 4. Breach labeling is strict loss > VaR
    // ------------------------------------------------------------------
    #[test]
    fn test_breach_labeling() {
        let input = input_for(500, ForecastModel::Historical);
        let breaches = rolling_forecasts(&input).unwrap();
        for b in &breaches {
            assert_eq!(b.breach, b.loss > b.var);
            assert!(b.es >= b.var);
        }
    }

    // ------------------------------------------------------------------
    // 5. Sample shorter than the window is rejected
    // ------------------------------------------------------------------
    #[test]
    fn test_no_out_of_sample_days() {
        let mut input = input_for(250, ForecastModel::Historical);
        assert!(matches!(
            rolling_forecasts(&input),
            Err(RiskError::InsufficientData(_))
        ));
        input.window = 1;
        assert!(matches!(
            rolling_forecasts(&input),
            Err(RiskError::InvalidInput { .. })
        ));
    }

    // ------------------------------------------------------------------
    // 6. Window too small for the requested quantile fails per window
    // ------------------------------------------------------------------
    #[test]
    fn test_window_quantile_mismatch() {
        let mut input = input_for(120, ForecastModel::Historical);
        // 50-day window cannot resolve the 99% quantile
        input.window = 50;
        assert!(rolling_forecasts(&input).is_err());
    }
}
