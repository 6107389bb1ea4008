use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::DETAIL_ARRAYS;

/// Render the envelope as tables: the result's scalar fields, then one table
/// per detail array, then warnings and methodology.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(envelope) => match envelope.get("result") {
            Some(Value::Object(result)) => {
                print_result(result);
                print_envelope_notes(envelope);
            }
            _ => print_fields(envelope),
        },
        Value::Array(arr) => print_rows(arr),
        _ => println!("{value}"),
    }
}

fn print_result(result: &Map<String, Value>) {
    print_fields(result);

    for key in DETAIL_ARRAYS {
        if let Some(Value::Array(rows)) = result.get(key) {
            if rows.is_empty() {
                continue;
            }
            println!("\n{}:", key.replace('_', " "));
            print_rows(rows);
        }
    }
}

fn print_fields(map: &Map<String, Value>) {
    let mut flat: Vec<(String, String)> = Vec::new();
    flatten("", map, &mut flat);

    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in flat {
        builder.push_record([key, val]);
    }
    println!("{}", Table::from(builder));
}

/// Nested objects become dotted keys; detail arrays are left to their own tables.
fn flatten(prefix: &str, map: &Map<String, Value>, out: &mut Vec<(String, String)>) {
    for (key, val) in map {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match val {
            Value::Object(inner) => flatten(&name, inner, out),
            Value::Array(_) if prefix.is_empty() && DETAIL_ARRAYS.contains(&key.as_str()) => {}
            Value::Array(arr) if arr.iter().any(Value::is_object) => {
                out.push((name, format!("[{} entries]", arr.len())));
            }
            _ => out.push((name, format_value(val))),
        }
    }
}

fn print_rows(rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        for row in rows {
            println!("{}", format_value(row));
        }
        return;
    };

    let headers: Vec<String> = first.keys().cloned().collect();
    let mut builder = Builder::default();
    builder.push_record(headers.iter().cloned());
    for row in rows {
        if let Value::Object(map) = row {
            builder.push_record(
                headers
                    .iter()
                    .map(|h| map.get(h).map(format_value).unwrap_or_default()),
            );
        }
    }
    println!("{}", Table::from(builder));
}

fn print_envelope_notes(envelope: &Map<String, Value>) {
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {w}");
            }
        }
    }
    if let Some(Value::String(methodology)) = envelope.get("methodology") {
        println!("\nMethodology: {methodology}");
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(arr) => arr.iter().map(format_value).collect::<Vec<_>>().join(", "),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
