use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::RiskError;
use crate::RiskResult;

/// Tolerance for the fully-invested constraint (sum of weights = 1).
pub const WEIGHT_TOLERANCE: f64 = 1e-8;

// ---------------------------------------------------------------------------
// Return matrix
// ---------------------------------------------------------------------------

/// Time-indexed matrix of asset log-returns.
///
/// Shape invariants are enforced at construction: one row per date, a
/// constant number of columns equal to the number of assets, all values
/// finite, dates strictly increasing. Collaborators that load prices must
/// resolve gaps before building a `ReturnMatrix`; the engines assume a
/// clean sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawReturnMatrix")]
pub struct ReturnMatrix {
    dates: Vec<NaiveDate>,
    assets: Vec<String>,
    rows: Vec<Vec<f64>>,
}

#[derive(Deserialize)]
struct RawReturnMatrix {
    dates: Vec<NaiveDate>,
    assets: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl TryFrom<RawReturnMatrix> for ReturnMatrix {
    type Error = RiskError;

    fn try_from(raw: RawReturnMatrix) -> RiskResult<Self> {
        ReturnMatrix::new(raw.dates, raw.assets, raw.rows)
    }
}

impl ReturnMatrix {
    /// Build a validated return matrix.
    pub fn new(
        dates: Vec<NaiveDate>,
        assets: Vec<String>,
        rows: Vec<Vec<f64>>,
    ) -> RiskResult<Self> {
        let n = assets.len();
        if n == 0 {
            return Err(RiskError::InvalidInput {
                field: "assets".into(),
                reason: "At least one asset is required".into(),
            });
        }
        if rows.is_empty() {
            return Err(RiskError::InsufficientData(
                "Return matrix has no observations".into(),
            ));
        }
        if dates.len() != rows.len() {
            return Err(RiskError::InvalidInput {
                field: "dates".into(),
                reason: format!("{} dates for {} return rows", dates.len(), rows.len()),
            });
        }
        for (t, row) in rows.iter().enumerate() {
            if row.len() != n {
                return Err(RiskError::InvalidInput {
                    field: "rows".into(),
                    reason: format!("Row {} has {} columns, expected {}", t, row.len(), n),
                });
            }
            if let Some(j) = row.iter().position(|v| !v.is_finite()) {
                return Err(RiskError::InvalidInput {
                    field: "rows".into(),
                    reason: format!("Non-finite return at row {}, column {}", t, j),
                });
            }
        }
        for w in dates.windows(2) {
            if w[1] <= w[0] {
                return Err(RiskError::InvalidInput {
                    field: "dates".into(),
                    reason: format!("Dates not strictly increasing at {}", w[1]),
                });
            }
        }
        Ok(Self {
            dates,
            assets,
            rows,
        })
    }

    pub fn n_assets(&self) -> usize {
        self.assets.len()
    }

    /// Number of time observations.
    pub fn n_obs(&self) -> usize {
        self.rows.len()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Column of returns for a single asset.
    pub fn column(&self, j: usize) -> Vec<f64> {
        self.rows.iter().map(|row| row[j]).collect()
    }

    /// Portfolio return series r_p = returns · weights.
    pub fn portfolio_returns(&self, weights: &WeightVector) -> RiskResult<Vec<f64>> {
        if weights.len() != self.n_assets() {
            return Err(RiskError::InvalidInput {
                field: "weights".into(),
                reason: format!(
                    "{} weights for {} assets",
                    weights.len(),
                    self.n_assets()
                ),
            });
        }
        Ok(self.series_raw(weights.as_slice()))
    }

    /// Dot each row with an arbitrary weight slice. Used by the optimizer,
    /// whose trial points are not yet validated weight vectors.
    pub(crate) fn series_raw(&self, w: &[f64]) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| row.iter().zip(w).map(|(r, wi)| r * wi).sum())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Weight vector
// ---------------------------------------------------------------------------

/// Long-only, fully-invested portfolio weights.
///
/// Invariant: every component >= 0 and the components sum to 1 within
/// [`WEIGHT_TOLERANCE`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct WeightVector(Vec<f64>);

impl TryFrom<Vec<f64>> for WeightVector {
    type Error = RiskError;

    fn try_from(w: Vec<f64>) -> RiskResult<Self> {
        WeightVector::new(w)
    }
}

impl From<WeightVector> for Vec<f64> {
    fn from(w: WeightVector) -> Self {
        w.0
    }
}

impl WeightVector {
    /// Build a validated weight vector.
    pub fn new(weights: Vec<f64>) -> RiskResult<Self> {
        if weights.is_empty() {
            return Err(RiskError::InvalidInput {
                field: "weights".into(),
                reason: "Weight vector is empty".into(),
            });
        }
        for (i, w) in weights.iter().enumerate() {
            if !w.is_finite() || *w < -WEIGHT_TOLERANCE {
                return Err(RiskError::InvalidInput {
                    field: "weights".into(),
                    reason: format!("Weight {} is {} (long-only requires >= 0)", i, w),
                });
            }
        }
        let total: f64 = weights.iter().sum();
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(RiskError::InvalidInput {
                field: "weights".into(),
                reason: format!("Weights sum to {}, expected 1", total),
            });
        }
        Ok(Self(weights))
    }

    /// Rescale a raw non-negative allocation so it sums to 1.
    pub fn normalized(raw: Vec<f64>) -> RiskResult<Self> {
        let total: f64 = raw.iter().sum();
        if !total.is_finite() || total <= 0.0 {
            return Err(RiskError::InvalidInput {
                field: "weights".into(),
                reason: format!("Cannot normalize weights with sum {}", total),
            });
        }
        Self::new(raw.into_iter().map(|w| w / total).collect())
    }

    /// Equal-weight allocation across `n` assets.
    pub fn equal(n: usize) -> RiskResult<Self> {
        if n == 0 {
            return Err(RiskError::InvalidInput {
                field: "n".into(),
                reason: "Cannot build weights for zero assets".into(),
            });
        }
        Ok(Self(vec![1.0 / n as f64; n]))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Forecasts, breaches, test results
// ---------------------------------------------------------------------------

/// Which risk model produced a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelTag {
    Historical,
    Ewma,
    StudentT,
}

/// A VaR/ES forecast. Both values are positive loss magnitudes; the
/// invariant ES >= VaR holds for every model in this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskForecast {
    /// Confidence level alpha in (0, 1), e.g. 0.99.
    pub confidence_level: f64,
    /// Holding period in trading days.
    pub horizon_days: u32,
    /// Loss threshold exceeded with probability 1 - alpha.
    pub var: f64,
    /// Expected loss conditional on exceeding VaR.
    pub es: f64,
    pub model: ModelTag,
}

/// One out-of-sample day in a backtest: the forecast made strictly before
/// the day, the realized loss, and whether the loss breached the VaR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreachObservation {
    pub date: NaiveDate,
    /// Realized portfolio loss (-return).
    pub loss: f64,
    pub var: f64,
    pub es: f64,
    pub breach: bool,
}

/// Ordered out-of-sample breach record, one entry per forecast day.
pub type BreachSequence = Vec<BreachObservation>;

/// Verdict of a statistical backtest at its stated significance level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestDecision {
    Reject,
    FailToReject,
    /// Too few breaches for the test to carry statistical power. Not a
    /// failure: reported instead of raised (a zero-breach sample must not
    /// be silently treated as a perfect model).
    Inconclusive,
}

/// Outcome of a single backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub statistic: f64,
    /// Degrees of freedom of the asymptotic distribution, where one applies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub df: Option<u32>,
    pub p_value: f64,
    /// Significance threshold the decision was taken at.
    pub significance: f64,
    pub decision: TestDecision,
    /// Diagnostic flags, e.g. "insufficient breaches".
    pub flags: Vec<String>,
}

/// Outcome of a constrained portfolio optimization.
///
/// `converged == false` is not an error: the best iterate found within the
/// iteration budget is still returned, and callers must check the flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub weights: WeightVector,
    pub objective_value: f64,
    pub converged: bool,
    pub iterations: u32,
}

// ---------------------------------------------------------------------------
// Computation envelope
// ---------------------------------------------------------------------------

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "ieee754_f64".to_string(),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
