mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::backtest::BacktestArgs;
use commands::optimize::{MaximizeSharpeArgs, MinimizeEsArgs};
use commands::risk::{EwmaArgs, VarArgs};
use commands::simulate::SimulateArgs;

/// Portfolio tail-risk measurement, optimization, and backtesting
#[derive(Parser)]
#[command(
    name = "tailrisk",
    version,
    about = "Portfolio tail-risk measurement, optimization, and backtesting",
    long_about = "A CLI for measuring portfolio tail risk. Computes historical and \
                  EWMA VaR/ES, simulates heavy-tailed Student-t return paths, solves \
                  long-only ES-minimization and Sharpe-maximization problems, and \
                  validates forecasts with Kupiec, Christoffersen, and Acerbi-Szekely \
                  backtests."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Historical simulation VaR/ES for a weighted portfolio
    Var(VarArgs),
    /// EWMA (RiskMetrics) conditional VaR/ES
    Ewma(EwmaArgs),
    /// Simulate multivariate Student-t return paths
    Simulate(SimulateArgs),
    /// Find the long-only weights minimizing historical ES
    MinimizeEs(MinimizeEsArgs),
    /// Find the long-only weights maximizing the annualized Sharpe ratio
    MaximizeSharpe(MaximizeSharpeArgs),
    /// Rolling out-of-sample backtest with coverage and ES tests
    Backtest(BacktestArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Minimal,
}

fn main() {
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Var(args) => commands::risk::run_var(args),
        Commands::Ewma(args) => commands::risk::run_ewma(args),
        Commands::Simulate(args) => commands::simulate::run_simulate(args),
        Commands::MinimizeEs(args) => commands::optimize::run_minimize_es(args),
        Commands::MaximizeSharpe(args) => commands::optimize::run_maximize_sharpe(args),
        Commands::Backtest(args) => commands::backtest::run_backtest(args),
        Commands::Version => {
            println!("tailrisk {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
