pub mod volatility;

pub use volatility::{ewma_var_es, ewma_volatility, EwmaVarInput, EwmaVarOutput};
