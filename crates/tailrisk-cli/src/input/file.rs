use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

use tailrisk_core::ReturnMatrix;

/// Read a JSON file and deserialise into a typed struct.
pub fn read_json<T: DeserializeOwned>(path: &str) -> Result<T, Box<dyn std::error::Error>> {
    let canonical = resolve_path(path)?;
    let contents = fs::read_to_string(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;
    let value: T = serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e))?;
    Ok(value)
}

/// Read a return matrix from CSV: a `date` column first, then one column of
/// log-returns per asset, dates in ISO format and strictly increasing.
pub fn read_returns_csv(path: &str) -> Result<ReturnMatrix, Box<dyn std::error::Error>> {
    let canonical = resolve_path(path)?;
    let mut reader = csv::Reader::from_path(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;

    let headers = reader.headers()?.clone();
    if headers.len() < 2 {
        return Err(format!(
            "'{}' needs a date column plus at least one asset column",
            canonical.display()
        )
        .into());
    }
    let assets: Vec<String> = headers.iter().skip(1).map(String::from).collect();

    let mut dates = Vec::new();
    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let date_field = record
            .get(0)
            .ok_or_else(|| format!("Row {}: missing date", line + 2))?;
        let date: NaiveDate = date_field
            .parse()
            .map_err(|e| format!("Row {}: invalid date '{}': {}", line + 2, date_field, e))?;
        let values = record
            .iter()
            .skip(1)
            .map(|v| v.trim().parse::<f64>())
            .collect::<Result<Vec<f64>, _>>()
            .map_err(|e| format!("Row {}: invalid return value: {}", line + 2, e))?;
        dates.push(date);
        rows.push(values);
    }

    Ok(ReturnMatrix::new(dates, assets, rows)?)
}

/// Resolve and validate the path, preventing directory traversal.
fn resolve_path(path: &str) -> Result<std::path::PathBuf, Box<dyn std::error::Error>> {
    let p = Path::new(path);
    let canonical = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()?.join(p)
    };

    if !canonical.exists() {
        return Err(format!("File not found: {}", canonical.display()).into());
    }

    if !canonical.is_file() {
        return Err(format!("Not a file: {}", canonical.display()).into());
    }

    Ok(canonical)
}
