pub mod var_es;

pub use var_es::{historical_var_es, HistoricalVarInput};
