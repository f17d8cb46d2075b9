use clap::Args;
use serde_json::Value;

use tailrisk_core::simulation::student_t::{simulate_student_t, StudentTSimInput, DEFAULT_DF};

use crate::input;

/// Arguments for Student-t Monte Carlo path simulation
#[derive(Args)]
pub struct SimulateArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
    /// Path to a CSV of dated asset returns (date column first)
    #[arg(long)]
    pub returns: Option<String>,
    /// Student-t degrees of freedom (must exceed 2)
    #[arg(long, default_value_t = DEFAULT_DF)]
    pub df: f64,
    /// Number of simulated days
    #[arg(long, default_value_t = 10_000)]
    pub paths: usize,
    /// Random seed
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

pub fn run_simulate(args: SimulateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let sim_input: StudentTSimInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(ref path) = args.returns {
        StudentTSimInput {
            returns: input::file::read_returns_csv(path)?,
            degrees_of_freedom: args.df,
            n_paths: args.paths,
            seed: args.seed,
        }
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file.json>, --returns <file.csv>, or stdin required".into());
    };
    let result = simulate_student_t(&sim_input)?;
    Ok(serde_json::to_value(result)?)
}
