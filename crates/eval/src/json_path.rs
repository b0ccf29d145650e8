//! JSONPath extraction behind `GET_VALUE`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json_path::JsonPath;

use crate::types::{DynamicValue, EvalError};

/// Bracket selectors that can match more than one node: slices, unions,
/// wildcards and filters.
static MULTI_SELECTOR: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\[[^\]]*(?:[:,*?])[^\]]*\]").ok());

/// True when `path` can select at most one node.
pub fn is_singular(path: &str) -> bool {
    if path.contains("..") || path.contains(".*") {
        return false;
    }
    match MULTI_SELECTOR.as_ref() {
        Some(re) => !re.is_match(&strip_quoted(path)),
        None => !path.contains(['*', '?', ':', ',']),
    }
}

/// Evaluate `path` against `json`.
///
/// A singular path yields the matched value typed from JSON and fails when
/// nothing matches. Other paths yield every match as a JSON array object.
pub fn get_value(json: &str, path: &str) -> Result<DynamicValue, EvalError> {
    let document: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| EvalError::invalid_arguments(format!("Unable to parse json: {}", e)))?;
    let compiled = JsonPath::parse(path).map_err(|e| {
        EvalError::invalid_arguments(format!("Invalid json path '{}': {}", path, e))
    })?;
    let nodes = compiled.query(&document).all();

    if is_singular(path) {
        return match nodes.first() {
            Some(node) => Ok(DynamicValue::from_json(node)),
            None => Err(EvalError::invalid_arguments(format!(
                "No results for path: {}",
                path
            ))),
        };
    }
    let array = serde_json::Value::Array(nodes.into_iter().cloned().collect());
    Ok(DynamicValue::object(array.to_string()))
}

/// Drop quoted member names so their contents are not read as selectors.
fn strip_quoted(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut quote: Option<char> = None;
    for c in path.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    const DOC: &str = r#"{"site": {"name": "North", "meters": [{"id": "a", "kwh": 12.5}, {"id": "b", "kwh": 4}]}}"#;

    #[test]
    fn singular_detection() {
        assert!(is_singular("$.site.name"));
        assert!(is_singular("$.site.meters[0].kwh"));
        assert!(is_singular("$['a,b']"));
        assert!(!is_singular("$.site.meters[*].kwh"));
        assert!(!is_singular("$..kwh"));
        assert!(!is_singular("$.site.meters[0:1]"));
        assert!(!is_singular("$.site.meters[?@.kwh > 5]"));
    }

    #[test]
    fn singular_value_is_typed() {
        assert_eq!(get_value(DOC, "$.site.name").unwrap(), DynamicValue::string("North"));
        assert_eq!(
            get_value(DOC, "$.site.meters[1].kwh").unwrap(),
            DynamicValue::number(Decimal::from(4))
        );
    }

    #[test]
    fn wildcard_returns_array() {
        assert_eq!(
            get_value(DOC, "$.site.meters[*].id").unwrap(),
            DynamicValue::object(r#"["a","b"]"#)
        );
    }

    #[test]
    fn missing_singular_path() {
        let err = get_value(DOC, "$.site.owner").unwrap_err();
        assert_eq!(err.to_string(), "No results for path: $.site.owner");
    }

    #[test]
    fn bad_json() {
        let err = get_value("{not json", "$.a").unwrap_err();
        assert!(err.to_string().starts_with("Unable to parse json:"));
    }

    #[test]
    fn bad_path() {
        assert!(get_value(DOC, "site[").is_err());
    }
}
