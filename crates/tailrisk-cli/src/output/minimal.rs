use serde_json::Value;

/// Print just the key answer value from the output.
///
/// Heuristic: unwrap the computation envelope, look for well-known result
/// fields in order of priority, then fall back to the first field.
pub fn print_minimal(value: &Value) {
    // Unwrap the "result" envelope
    let mut result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    // A forecast list collapses to its first entry
    if let Value::Array(items) = result_obj {
        if let Some(first) = items.first() {
            result_obj = first;
        }
    }

    // Priority list of key output fields
    let priority_keys = [
        "var",
        "es",
        "objective_value",
        "breach_rate",
        "weights",
        "latest",
        "p_value",
    ];

    if let Value::Object(map) = result_obj {
        for key in &priority_keys {
            if let Some(val) = map.get(*key) {
                if !val.is_null() {
                    println!("{}", format_minimal(val));
                    return;
                }
            }
        }

        // Fall back to first field
        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(result_obj));
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
