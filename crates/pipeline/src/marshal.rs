//! Raw input rows and their conversion into typed evaluator parameters.

use std::fmt;

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use tally_eval::{parse_decimal, DeclaredType, DynamicValue, ValueMap};

use crate::request::TransformParameter;
use crate::ROW_IDENTIFIER;

/// Errors that abort a single row.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowError {
    #[error("row is not a JSON object: {0}")]
    Malformed(String),
    #[error("Parameter '{parameter}' value '{value}' is not a valid number.")]
    InvalidNumber { parameter: String, value: String },
    #[error("Row '{row}' column '{column}' encountered error uniqueKey value cannot be null")]
    EmptyUniqueKey { row: String, column: String },
}

// ──────────────────────────────────────────────
// RawRow
// ──────────────────────────────────────────────

/// One input row: field name → raw text, in the order the fields appeared.
///
/// Scalars are kept as their text; JSON null is `None`; nested arrays and
/// objects are kept as JSON text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    fields: Vec<(String, Option<String>)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(line: &str) -> Result<Self, RowError> {
        serde_json::from_str(line).map_err(|e| RowError::Malformed(e.to_string()))
    }

    pub fn with(mut self, name: &str, value: Option<&str>) -> Self {
        self.insert(name.to_string(), value.map(str::to_string));
        self
    }

    pub fn insert(&mut self, name: String, value: Option<String>) {
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// `None` when the field is absent or null.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn values(&self) -> impl Iterator<Item = Option<&str>> {
        self.fields.iter().map(|(_, v)| v.as_deref())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<'de> Deserialize<'de> for RawRow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = RawRow;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object of row fields")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RawRow, A::Error> {
                let mut row = RawRow::new();
                while let Some((name, value)) = map.next_entry::<String, serde_json::Value>()? {
                    let text = match value {
                        serde_json::Value::Null => None,
                        serde_json::Value::String(s) => Some(s),
                        other => Some(other.to_string()),
                    };
                    row.insert(name, text);
                }
                Ok(row)
            }
        }

        deserializer.deserialize_map(RowVisitor)
    }
}

impl fmt::Display for RawRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut obj = serde_json::Map::new();
        for (name, value) in &self.fields {
            let v = match value {
                Some(s) => serde_json::Value::String(s.clone()),
                None => serde_json::Value::Null,
            };
            obj.insert(name.clone(), v);
        }
        write!(f, "{}", serde_json::Value::Object(obj))
    }
}

// ──────────────────────────────────────────────
// Marshalling
// ──────────────────────────────────────────────

/// A row's typed parameters, including the synthetic row identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct MarshalledRow {
    pub identifier: String,
    pub parameters: ValueMap,
}

pub fn marshal_row(
    row: &RawRow,
    parameters: &[TransformParameter],
    unique_key: &[String],
) -> Result<MarshalledRow, RowError> {
    let identifier = row_identifier(row, unique_key);
    let mut values = ValueMap::new();
    values.insert(ROW_IDENTIFIER.to_string(), DynamicValue::string(identifier.clone()));

    for p in parameters {
        let Some(key) = p.key.as_deref() else {
            continue;
        };
        let value = marshal_value(key, row.get(key), p.declared_type)?;
        values.insert(key.to_string(), value);
    }

    Ok(MarshalledRow {
        identifier,
        parameters: values,
    })
}

fn marshal_value(
    key: &str,
    raw: Option<&str>,
    declared: Option<DeclaredType>,
) -> Result<DynamicValue, RowError> {
    let raw = match raw {
        Some(r) if !r.is_empty() => r,
        _ => return Ok(DynamicValue::null()),
    };
    match declared {
        Some(DeclaredType::Number) => {
            parse_decimal(raw)
                .map(DynamicValue::number)
                .ok_or_else(|| RowError::InvalidNumber {
                    parameter: key.to_string(),
                    value: raw.to_string(),
                })
        }
        Some(DeclaredType::Boolean) => Ok(DynamicValue::boolean(raw.eq_ignore_ascii_case("true"))),
        _ => {
            let unquoted = raw
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .unwrap_or(raw);
            Ok(DynamicValue::string(unquoted))
        }
    }
}

/// Unique-key column values URL-encoded and joined with `-`; every raw
/// value joined with `-` when no unique key is configured.
pub fn row_identifier(row: &RawRow, unique_key: &[String]) -> String {
    if unique_key.is_empty() {
        return row
            .values()
            .map(|v| v.unwrap_or(""))
            .collect::<Vec<_>>()
            .join("-");
    }
    unique_key
        .iter()
        .map(|k| url_encode(row.get(k).unwrap_or("")))
        .collect::<Vec<_>>()
        .join("-")
}

/// `application/x-www-form-urlencoded` encoding: alphanumerics and `.-*_`
/// pass through, space becomes `+`, everything else is `%XX` per UTF-8 byte.
fn url_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'-' | b'*' | b'_' => {
                out.push(b as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn param(key: &str, t: DeclaredType) -> TransformParameter {
        TransformParameter {
            key: Some(key.into()),
            declared_type: Some(t),
            ..Default::default()
        }
    }

    #[test]
    fn raw_row_keeps_field_order() {
        let row = RawRow::from_json(r#"{"zone":"CO","reading":12.5,"ok":true,"note":null}"#).unwrap();
        let values: Vec<_> = row.values().collect();
        assert_eq!(values, [Some("CO"), Some("12.5"), Some("true"), None]);
        assert_eq!(row.get("note"), None);
        assert!(matches!(RawRow::from_json("[1,2]"), Err(RowError::Malformed(_))));
    }

    #[test]
    fn typed_parameters() {
        let row = RawRow::new()
            .with("reading", Some("12.50"))
            .with("flag", Some("TRUE"))
            .with("site", Some("\"north\""))
            .with("blank", Some(""));
        let params = [
            param("reading", DeclaredType::Number),
            param("flag", DeclaredType::Boolean),
            param("site", DeclaredType::String),
            param("blank", DeclaredType::Number),
            param("absent", DeclaredType::String),
        ];
        let m = marshal_row(&row, &params, &[]).unwrap();
        assert_eq!(
            m.parameters["reading"],
            DynamicValue::number(Decimal::from_str("12.5").unwrap())
        );
        assert_eq!(m.parameters["flag"], DynamicValue::boolean(true));
        assert_eq!(m.parameters["site"], DynamicValue::string("north"));
        assert!(m.parameters["blank"].is_null());
        assert!(m.parameters["absent"].is_null());
        assert_eq!(m.parameters[ROW_IDENTIFIER], DynamicValue::string("12.50-TRUE-\"north\"-"));
    }

    #[test]
    fn bad_number_fails_row() {
        let row = RawRow::new().with("reading", Some("twelve"));
        let err = marshal_row(&row, &[param("reading", DeclaredType::Number)], &[]).unwrap_err();
        assert_eq!(err.to_string(), "Parameter 'reading' value 'twelve' is not a valid number.");
    }

    #[test]
    fn identifier_from_unique_key() {
        let row = RawRow::new()
            .with("site", Some("North Plant"))
            .with("meter", Some("a/b&c"))
            .with("reading", Some("1"));
        let id = row_identifier(&row, &["site".to_string(), "meter".to_string()]);
        assert_eq!(id, "North+Plant-a%2Fb%26c");
    }

    #[test]
    fn url_encoding_multibyte() {
        assert_eq!(url_encode("café*_.-"), "caf%C3%A9*_.-");
    }
}
