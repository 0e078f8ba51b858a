//! Text renderings of knowledge-graph context for prompts.

use serde_json::{Map, Value};

use super::Row;

/// Value-dictionary keys surfaced to the retrieval prompt, in order.
pub const FOCUS_KEYS: [&str; 16] = [
    "component.chemistry",
    "component.ratedCapacity_Ah",
    "context.temperature_C",
    "context.lifeStage",
    "context.operatingSubphase",
    "state.SOC.stateType",
    "state.SOH.stateType",
    "measurement.summary.voltage_v.start",
    "measurement.summary.voltage_v.end",
    "measurement.summary.voltage_v.mean",
    "measurement.summary.current_a.start",
    "measurement.summary.current_a.end",
    "measurement.summary.current_a.mean",
    "measurement.summary.temperature_c.start",
    "measurement.summary.temperature_c.end",
    "measurement.summary.temperature_c.mean",
];

/// Renders the focused part of a value dictionary.
///
/// `dict` maps dotted property keys to entries shaped like
/// `{"type": "float", "examples": [...], "min": 0, "max": 1}`. Only
/// [`FOCUS_KEYS`] are rendered, truncated to `max_keys` when `max_keys > 0`.
/// Keys that are absent or map to an empty entry are skipped.
#[must_use]
pub fn format_value_dict(dict: &Map<String, Value>, max_keys: usize) -> String {
    let keys = if max_keys > 0 {
        &FOCUS_KEYS[..max_keys.min(FOCUS_KEYS.len())]
    } else {
        &FOCUS_KEYS[..]
    };

    let mut lines = vec!["Focused KG value dictionary:".to_string()];
    for key in keys {
        let Some(Value::Object(entry)) = dict.get(*key) else {
            continue;
        };
        if entry.is_empty() {
            continue;
        }
        lines.push(format!("- {key}: {}", format_entry(entry)));
    }
    lines.join("\n")
}

fn format_entry(entry: &Map<String, Value>) -> String {
    let mut parts = vec![format!(
        "type={}",
        entry.get("type").map_or_else(|| "unknown".to_string(), display_value)
    )];

    if let Some(Value::Array(examples)) = entry.get("examples")
        && !examples.is_empty()
    {
        let rendered: Vec<String> = examples.iter().map(display_value).collect();
        parts.push(format!("examples=[{}]", rendered.join(", ")));
    }

    let min = entry.get("min").filter(|v| !v.is_null());
    let max = entry.get("max").filter(|v| !v.is_null());
    if min.is_some() || max.is_some() {
        let bound = |v: Option<&Value>| v.map_or_else(|| "-".to_string(), display_value);
        parts.push(format!("range=[{}, {}]", bound(min), bound(max)));
    }

    parts.join(", ")
}

/// Renders result rows as evidence lines.
///
/// Each of the first `max_rows` rows becomes one line of `key=value` pairs
/// joined by `"; "`, in column order.
#[must_use]
pub fn format_evidence(rows: &[Row], max_rows: usize) -> String {
    rows.iter()
        .take(max_rows)
        .map(|row| {
            row.iter()
                .map(|(key, value)| format!("{key}={}", display_value(value)))
                .collect::<Vec<_>>()
                .join("; ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Strings print bare; everything else prints as compact JSON.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
