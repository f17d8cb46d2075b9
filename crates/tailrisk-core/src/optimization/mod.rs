pub mod objectives;
pub mod solver;

pub use objectives::{
    maximize_sharpe, minimize_es, EsOptimizationInput, SharpeOptimizationInput,
};
pub use solver::{minimize_on_simplex, SolverOptions, SolverOutcome};
