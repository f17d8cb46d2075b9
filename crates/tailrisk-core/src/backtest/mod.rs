pub mod coverage;
pub mod rolling;

pub use coverage::{christoffersen_cc, christoffersen_independence, kupiec_pof};
pub use es_test::{acerbi_szekely, EsTestOptions};
pub use rolling::{rolling_forecasts, ForecastModel, RollingForecastInput, DEFAULT_WINDOW};

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::types::{
    with_metadata, BreachSequence, ComputationOutput, ReturnMatrix, TestDecision, TestResult,
    WeightVector,
};
use crate::RiskResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input to a full rolling backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestInput {
    pub returns: ReturnMatrix,
    pub weights: WeightVector,
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default = "default_confidence")]
    pub confidence_level: f64,
    /// Significance threshold shared by all tests.
    #[serde(default = "default_significance")]
    pub significance: f64,
    #[serde(default)]
    pub model: ForecastModel,
    #[serde(default)]
    pub es_test: EsTestOptions,
}

fn default_window() -> usize {
    DEFAULT_WINDOW
}

fn default_confidence() -> f64 {
    0.99
}

fn default_significance() -> f64 {
    0.05
}

/// Full backtest report: the labeled breach record plus all four tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestOutput {
    pub breaches: BreachSequence,
    pub n_forecasts: usize,
    pub n_breaches: usize,
    pub breach_rate: f64,
    pub kupiec: TestResult,
    pub independence: TestResult,
    pub conditional_coverage: TestResult,
    pub es_adequacy: TestResult,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Roll the chosen engine through the sample, label breaches, and run the
/// Kupiec, Christoffersen and Acerbi-Szekely tests on the result.
///
/// Inconclusive tests (e.g. zero breaches) are reported in the output, not
/// raised: only data and parameter problems abort the run.
pub fn run_backtest(input: &BacktestInput) -> RiskResult<ComputationOutput<BacktestOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let rolling_input = RollingForecastInput {
        returns: input.returns.clone(),
        weights: input.weights.clone(),
        window: input.window,
        confidence_level: input.confidence_level,
        model: input.model,
    };
    let breaches = rolling_forecasts(&rolling_input)?;

    let n_forecasts = breaches.len();
    let n_breaches = breaches.iter().filter(|b| b.breach).count();
    let breach_rate = n_breaches as f64 / n_forecasts as f64;

    let kupiec = kupiec_pof(&breaches, input.confidence_level, input.significance)?;
    let independence = christoffersen_independence(&breaches, input.significance)?;
    let conditional_coverage =
        christoffersen_cc(&breaches, input.confidence_level, input.significance)?;
    let es_adequacy = acerbi_szekely(
        &breaches,
        input.confidence_level,
        input.significance,
        &input.es_test,
    )?;

    for test in [&kupiec, &independence, &conditional_coverage, &es_adequacy] {
        if test.decision == TestDecision::Inconclusive {
            warnings.push(format!("{} is inconclusive: low statistical power", test.name));
        }
    }

    let output = BacktestOutput {
        breaches,
        n_forecasts,
        n_breaches,
        breach_rate,
        kupiec,
        independence,
        conditional_coverage,
        es_adequacy,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Rolling Out-of-Sample VaR/ES Backtest",
        &serde_json::json!({
            "window": input.window,
            "confidence_level": input.confidence_level,
            "significance": input.significance,
            "model": input.model,
            "breach_rule": "realized loss strictly greater than forecast VaR",
            "es_null_model": "iid standard normal with analytic VaR/ES",
            "es_bootstrap_reps": input.es_test.n_reps,
            "es_bootstrap_seed": input.es_test.seed,
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
