//! Batch response and inline row rendering.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tally_eval::{DynamicValue, Value};

/// What a batch returns to its caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    /// Output keys in declaration order.
    pub headers: Vec<String>,
    /// One JSON object per produced row, in input order.
    pub rows: Vec<String>,
    pub errors: Vec<String>,
    pub groups_visited: BTreeSet<String>,
}

impl BatchResponse {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// One row as a JSON object with keys in `headers` order. Errors render as
/// `error_placeholder`; strings and timestamps are quoted; numbers, booleans
/// and objects are written as is. Keys missing from the row render null.
pub fn render_json_line(
    row: &BTreeMap<String, DynamicValue>,
    headers: &[String],
    error_placeholder: &str,
) -> String {
    let fields: Vec<String> = headers
        .iter()
        .map(|h| {
            let value = row.get(h).map_or_else(|| "null".to_string(), |v| render(v, error_placeholder));
            format!("{}:{}", quote(h), value)
        })
        .collect();
    format!("{{{}}}", fields.join(","))
}

fn render(v: &DynamicValue, error_placeholder: &str) -> String {
    match &v.value {
        Value::Error(_) => quote(error_placeholder),
        Value::Null => "null".to_string(),
        Value::String(_) | Value::Timestamp(_) => quote(&v.canonical()),
        Value::Number(_) | Value::Boolean(_) | Value::Object(_) => v.canonical(),
    }
}

fn quote(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}
