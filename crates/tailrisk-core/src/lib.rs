pub mod backtest;
pub mod error;
pub mod ewma;
pub mod historical;
pub mod optimization;
pub mod simulation;
pub mod types;

pub(crate) mod stats;

pub use error::RiskError;
pub use types::*;

/// Standard result type for all tail-risk operations
pub type RiskResult<T> = Result<T, RiskError>;
