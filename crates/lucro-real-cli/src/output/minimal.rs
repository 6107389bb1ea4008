use serde_json::Value;

/// The headline figure of each command, in the order they are looked up.
const HEADLINE_KEYS: [&str; 10] = [
    "total_due",
    "incremental_tax_savings",
    "total_rationed",
    "offset_applied",
    "total_charges",
    "total_credits",
    "total_remaining_credit",
    "gross",
    "base_total_due",
    "law_reference",
];

/// Print only the headline value of the result.
pub fn print_minimal(value: &Value) {
    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if let Value::Object(map) = result {
        let headline = HEADLINE_KEYS
            .iter()
            .find_map(|key| map.get(*key).filter(|v| !v.is_null()));
        if let Some(val) = headline {
            println!("{}", format_minimal(val));
            return;
        }
        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(result));
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        // Per-tax amounts print as one compact object.
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
