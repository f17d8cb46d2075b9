use clap::Args;
use serde_json::Value;

use tailrisk_core::optimization::objectives::{
    maximize_sharpe, minimize_es, EsOptimizationInput, SharpeOptimizationInput,
};
use tailrisk_core::optimization::solver::SolverOptions;

use crate::input;

/// Arguments for ES-minimizing portfolio optimization
#[derive(Args)]
pub struct MinimizeEsArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
    /// Path to a CSV of dated asset returns (date column first)
    #[arg(long)]
    pub returns: Option<String>,
    /// Confidence level of the ES objective
    #[arg(long, default_value_t = 0.95)]
    pub confidence: f64,
    /// Holding period in trading days
    #[arg(long, default_value_t = 1)]
    pub horizon: u32,
    /// Solver iteration budget
    #[arg(long, default_value_t = 200)]
    pub max_iterations: u32,
}

/// Arguments for Sharpe-maximizing portfolio optimization
#[derive(Args)]
pub struct MaximizeSharpeArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
    /// Path to a CSV of dated asset returns (date column first)
    #[arg(long)]
    pub returns: Option<String>,
    /// Annual risk-free rate
    #[arg(long, default_value_t = 0.0)]
    pub risk_free: f64,
    /// Trading periods per year
    #[arg(long, default_value_t = 252.0)]
    pub annualization: f64,
    /// Solver iteration budget
    #[arg(long, default_value_t = 200)]
    pub max_iterations: u32,
}

fn solver_with_budget(max_iterations: u32) -> SolverOptions {
    SolverOptions {
        max_iterations,
        ..SolverOptions::default()
    }
}

pub fn run_minimize_es(args: MinimizeEsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let opt_input: EsOptimizationInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(ref path) = args.returns {
        EsOptimizationInput {
            returns: input::file::read_returns_csv(path)?,
            confidence_level: args.confidence,
            horizon_days: args.horizon,
            solver: solver_with_budget(args.max_iterations),
        }
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file.json>, --returns <file.csv>, or stdin required".into());
    };
    let result = minimize_es(&opt_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_maximize_sharpe(args: MaximizeSharpeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let opt_input: SharpeOptimizationInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(ref path) = args.returns {
        SharpeOptimizationInput {
            returns: input::file::read_returns_csv(path)?,
            risk_free_rate: args.risk_free,
            annualization_factor: args.annualization,
            solver: solver_with_budget(args.max_iterations),
        }
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file.json>, --returns <file.csv>, or stdin required".into());
    };
    let result = maximize_sharpe(&opt_input)?;
    Ok(serde_json::to_value(result)?)
}
