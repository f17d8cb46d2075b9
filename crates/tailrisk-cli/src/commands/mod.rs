pub mod backtest;
pub mod optimize;
pub mod risk;
pub mod simulate;
