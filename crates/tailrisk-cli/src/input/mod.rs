pub mod file;
pub mod stdin;

use tailrisk_core::WeightVector;

/// Parse a comma-separated weight list, falling back to equal weights.
pub fn parse_weights(
    spec: Option<&str>,
    n_assets: usize,
) -> Result<WeightVector, Box<dyn std::error::Error>> {
    match spec {
        Some(s) => {
            let parsed = s
                .split(',')
                .map(|p| p.trim().parse::<f64>())
                .collect::<Result<Vec<f64>, _>>()
                .map_err(|e| format!("Invalid weight list '{}': {}", s, e))?;
            Ok(WeightVector::new(parsed)?)
        }
        None => Ok(WeightVector::equal(n_assets)?),
    }
}
