use clap::Args;
use serde_json::Value;

use tailrisk_core::ewma::volatility::{ewma_var_es, EwmaVarInput};
use tailrisk_core::historical::var_es::{historical_var_es, HistoricalVarInput};

use crate::input;

/// Arguments for historical VaR/ES estimation
#[derive(Args)]
pub struct VarArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
    /// Path to a CSV of dated asset returns (date column first)
    #[arg(long)]
    pub returns: Option<String>,
    /// Comma-separated portfolio weights (default: equal weights)
    #[arg(long)]
    pub weights: Option<String>,
    /// Confidence levels to evaluate
    #[arg(long, value_delimiter = ',', default_values_t = [0.95, 0.99])]
    pub confidence: Vec<f64>,
    /// Holding period in trading days
    #[arg(long, default_value_t = 1)]
    pub horizon: u32,
}

/// Arguments for EWMA conditional VaR/ES estimation
#[derive(Args)]
pub struct EwmaArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
    /// Path to a CSV of dated asset returns (date column first)
    #[arg(long)]
    pub returns: Option<String>,
    /// Comma-separated portfolio weights (default: equal weights)
    #[arg(long)]
    pub weights: Option<String>,
    /// EWMA decay factor
    #[arg(long, default_value_t = 0.94)]
    pub lambda: f64,
    /// Confidence level
    #[arg(long, default_value_t = 0.95)]
    pub confidence: f64,
    /// Holding period in trading days
    #[arg(long, default_value_t = 1)]
    pub horizon: u32,
}

pub fn run_var(args: VarArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let var_input: HistoricalVarInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(ref path) = args.returns {
        let returns = input::file::read_returns_csv(path)?;
        let weights = input::parse_weights(args.weights.as_deref(), returns.n_assets())?;
        HistoricalVarInput {
            returns,
            weights,
            confidence_levels: args.confidence.clone(),
            horizon_days: args.horizon,
        }
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file.json>, --returns <file.csv>, or stdin required".into());
    };
    let result = historical_var_es(&var_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_ewma(args: EwmaArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let ewma_input: EwmaVarInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(ref path) = args.returns {
        let returns = input::file::read_returns_csv(path)?;
        let weights = input::parse_weights(args.weights.as_deref(), returns.n_assets())?;
        EwmaVarInput {
            returns,
            weights,
            lambda: args.lambda,
            confidence_level: args.confidence,
            horizon_days: args.horizon,
        }
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file.json>, --returns <file.csv>, or stdin required".into());
    };
    let result = ewma_var_es(&ewma_input)?;
    Ok(serde_json::to_value(result)?)
}
