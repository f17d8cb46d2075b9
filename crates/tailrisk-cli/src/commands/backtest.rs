use clap::{Args, ValueEnum};
use serde_json::Value;

use tailrisk_core::backtest::{self, BacktestInput, EsTestOptions, ForecastModel};

use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModelChoice {
    Historical,
    Ewma,
}

/// Arguments for a rolling out-of-sample backtest
#[derive(Args)]
pub struct BacktestArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
    /// Path to a CSV of dated asset returns (date column first)
    #[arg(long)]
    pub returns: Option<String>,
    /// Comma-separated portfolio weights (default: equal weights)
    #[arg(long)]
    pub weights: Option<String>,
    /// Rolling window length in trading days
    #[arg(long, default_value_t = 250)]
    pub window: usize,
    /// Confidence level of the rolling forecasts
    #[arg(long, default_value_t = 0.99)]
    pub confidence: f64,
    /// Significance threshold shared by all tests
    #[arg(long, default_value_t = 0.05)]
    pub significance: f64,
    /// Forecasting model rolled through the sample
    #[arg(long, value_enum, default_value = "historical")]
    pub model: ModelChoice,
    /// EWMA decay factor (ewma model only)
    #[arg(long, default_value_t = 0.94)]
    pub lambda: f64,
    /// Bootstrap replications for the ES test p-value
    #[arg(long, default_value_t = 5000)]
    pub bootstrap_reps: usize,
    /// Seed for the ES test bootstrap
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

pub fn run_backtest(args: BacktestArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let bt_input: BacktestInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(ref path) = args.returns {
        let returns = input::file::read_returns_csv(path)?;
        let weights = input::parse_weights(args.weights.as_deref(), returns.n_assets())?;
        let model = match args.model {
            ModelChoice::Historical => ForecastModel::Historical,
            ModelChoice::Ewma => ForecastModel::Ewma { lambda: args.lambda },
        };
        BacktestInput {
            returns,
            weights,
            window: args.window,
            confidence_level: args.confidence,
            significance: args.significance,
            model,
            es_test: EsTestOptions {
                n_reps: args.bootstrap_reps,
                seed: args.seed,
            },
        }
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file.json>, --returns <file.csv>, or stdin required".into());
    };
    let result = backtest::run_backtest(&bt_input)?;
    Ok(serde_json::to_value(result)?)
}
