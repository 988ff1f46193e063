//! Lenient decoding of model output.

use serde_json::Value;

use backstory_core::types::Verdict;

pub const API_ERROR: &str = "API Error";
pub const PARSE_ERROR: &str = "JSON Parse Error";
pub const MISSING_PREDICTION: &str = "Missing prediction (Benefit of Doubt)";

/// The outermost `{ ... }` span of `raw`, ignoring any prose or fences around it.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Judge response to a [`Verdict`]; anything undecodable becomes a consistent
/// verdict with the `JSON Parse Error` rationale. A reply without a
/// prediction is consistent and always carries a rationale.
pub fn parse_verdict(raw: &str) -> Verdict {
    let Some(Value::Object(map)) = extract_json_object(raw).and_then(|s| serde_json::from_str::<Value>(s).ok()) else {
        return Verdict::consistent(PARSE_ERROR);
    };
    let rationale = match map.get("rationale") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    match map.get("prediction") {
        Some(value) => Verdict { prediction: prediction_from(value), rationale },
        None if rationale.is_empty() => Verdict::consistent(MISSING_PREDICTION),
        None => Verdict::consistent(rationale),
    }
}

/// Only an explicit zero counts as a contradiction.
fn prediction_from(value: &Value) -> u8 {
    let is_zero = match value {
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => matches!(s.trim(), "0" | "0.0"),
        Value::Bool(b) => !*b,
        _ => false,
    };
    if is_zero { Verdict::CONTRADICTION } else { Verdict::CONSISTENT }
}

/// `{"facts": [...]}` to a list of non-empty strings.
pub fn parse_facts(raw: &str) -> Option<Vec<String>> {
    let value: Value = serde_json::from_str(extract_json_object(raw)?).ok()?;
    let facts: Vec<String> = value
        .get("facts")?
        .as_array()?
        .iter()
        .filter_map(|f| match f {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Null => None,
            other => Some(other.to_string()),
        })
        .filter(|f| !f.is_empty())
        .collect();
    (!facts.is_empty()).then_some(facts)
}
