//! Runtime value types flowing through formula evaluation.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_core::ParamName;

use super::EvalError;

// ──────────────────────────────────────────────
// Runtime values
// ──────────────────────────────────────────────

/// The payload of a dynamic value.
///
/// All numeric values use `rust_decimal::Decimal`. `Error` is the sentinel a
/// failed output leaves behind in the row context; it never compares equal
/// to anything, itself included.
#[derive(Debug, Clone)]
pub enum Value {
    Number(Decimal),
    String(String),
    Boolean(bool),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),
    Null,
    Error(String),
    /// Structured data (arrays, maps) carried as JSON text.
    Object(String),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Returns a human-readable type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Timestamp(_) => "timestamp",
            Value::Null => "null",
            Value::Error(_) => "error",
            Value::Object(_) => "object",
        }
    }

    /// True when both values are the same variant. Numbers and timestamps
    /// count as one numeric kind.
    pub fn same_kind(&self, other: &Value) -> bool {
        (self.is_numeric() && other.is_numeric())
            || std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Number(_) | Value::Timestamp(_))
    }

    /// The numeric payload of a number or timestamp.
    pub fn numeric(&self) -> Option<Decimal> {
        match self {
            Value::Number(d) => Some(*d),
            Value::Timestamp(ms) => Some(Decimal::from(*ms)),
            _ => None,
        }
    }
}

// ──────────────────────────────────────────────
// Metadata
// ──────────────────────────────────────────────

/// How a formula output is used downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputRole {
    #[default]
    #[serde(rename = "none")]
    Unclassified,
    Time,
    Value,
    UniqueId,
    GroupId,
    AuditId,
}

/// One of the five unique-key slots an output can be mapped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeySlot {
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
}

/// Declared type of a pipeline parameter, output or custom formula argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclaredType {
    Number,
    String,
    Boolean,
    Timestamp,
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeclaredType::Number => "number",
            DeclaredType::String => "string",
            DeclaredType::Boolean => "boolean",
            DeclaredType::Timestamp => "timestamp",
        };
        f.write_str(s)
    }
}

// ──────────────────────────────────────────────
// DynamicValue
// ──────────────────────────────────────────────

/// A value plus the metadata the pipeline attaches to it.
///
/// Equality compares the payload, role and key slot; the parameter tag is
/// transient and ignored.
#[derive(Debug, Clone)]
pub struct DynamicValue {
    pub value: Value,
    pub role: OutputRole,
    pub key_slot: Option<KeySlot>,
    /// Set when the value was produced for a named optional parameter.
    pub param: Option<ParamName>,
}

impl PartialEq for DynamicValue {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.role == other.role && self.key_slot == other.key_slot
    }
}

impl From<Value> for DynamicValue {
    fn from(value: Value) -> Self {
        DynamicValue {
            value,
            role: OutputRole::Unclassified,
            key_slot: None,
            param: None,
        }
    }
}

impl DynamicValue {
    pub fn number(d: Decimal) -> Self {
        Value::Number(d).into()
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into()).into()
    }

    pub fn boolean(b: bool) -> Self {
        Value::Boolean(b).into()
    }

    pub fn timestamp(millis: i64) -> Self {
        Value::Timestamp(millis).into()
    }

    pub fn null() -> Self {
        Value::Null.into()
    }

    pub fn error(message: impl Into<String>) -> Self {
        Value::Error(message.into()).into()
    }

    pub fn object(json: impl Into<String>) -> Self {
        Value::Object(json.into()).into()
    }

    /// Typed construction from resolver text: a decimal becomes a number,
    /// `true`/`false` a boolean, anything else a string. Absent is null.
    pub fn infer(text: Option<&str>) -> Self {
        let Some(text) = text else {
            return DynamicValue::null();
        };
        if let Some(d) = parse_decimal(text) {
            return DynamicValue::number(d);
        }
        match text {
            "true" => DynamicValue::boolean(true),
            "false" => DynamicValue::boolean(false),
            _ => DynamicValue::string(text),
        }
    }

    /// Typed construction from a JSON value; arrays and maps become objects.
    pub fn from_json(v: &serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => DynamicValue::null(),
            serde_json::Value::Bool(b) => DynamicValue::boolean(*b),
            serde_json::Value::Number(n) => match parse_decimal(&n.to_string()) {
                Some(d) => DynamicValue::number(d),
                None => DynamicValue::string(n.to_string()),
            },
            serde_json::Value::String(s) => DynamicValue::string(s.clone()),
            other => DynamicValue::object(other.to_string()),
        }
    }

    pub fn with_role(mut self, role: OutputRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_key_slot(mut self, slot: Option<KeySlot>) -> Self {
        self.key_slot = slot;
        self
    }

    pub fn with_param(mut self, param: ParamName) -> Self {
        self.param = Some(param);
        self
    }

    /// The bare payload, with role, key slot and parameter tag cleared.
    pub fn without_metadata(&self) -> Self {
        self.value.clone().into()
    }

    pub fn is_null(&self) -> bool {
        matches!(self.value, Value::Null)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.value, Value::Error(_))
    }

    pub fn type_name(&self) -> &'static str {
        self.value.type_name()
    }

    /// The canonical string form used for concatenation, audit entries and
    /// string comparison. Numbers drop trailing zeros; null and errors
    /// render empty.
    pub fn canonical(&self) -> String {
        match &self.value {
            Value::Number(d) => d.normalize().to_string(),
            Value::String(s) | Value::Object(s) => s.clone(),
            Value::Boolean(b) => b.to_string(),
            Value::Timestamp(ms) => ms.to_string(),
            Value::Null | Value::Error(_) => String::new(),
        }
    }

    /// Extracts a number or returns a type error. Timestamps read as their
    /// epoch milliseconds.
    pub fn as_number(&self) -> Result<Decimal, EvalError> {
        match &self.value {
            Value::Number(d) => Ok(*d),
            Value::Timestamp(ms) => Ok(Decimal::from(*ms)),
            other => Err(EvalError::type_mismatch(format!(
                "Expected a number but got {}.",
                other.type_name()
            ))),
        }
    }

    /// Extracts a boolean or returns a type error.
    pub fn as_bool(&self) -> Result<bool, EvalError> {
        match &self.value {
            Value::Boolean(b) => Ok(*b),
            other => Err(EvalError::type_mismatch(format!(
                "Expected a boolean but got {}.",
                other.type_name()
            ))),
        }
    }

    /// Extracts a string or returns a type error.
    pub fn as_str(&self) -> Result<&str, EvalError> {
        match &self.value {
            Value::String(s) => Ok(s),
            other => Err(EvalError::type_mismatch(format!(
                "Expected a string but got {}.",
                other.type_name()
            ))),
        }
    }
}

impl fmt::Display for DynamicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Parse plain or scientific decimal text.
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }
    if t.contains(['e', 'E']) {
        return Decimal::from_scientific(t).ok();
    }
    Decimal::from_str(t).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn canonical_strips_trailing_zeros() {
        assert_eq!(DynamicValue::number(dec("100.00")).canonical(), "100");
        assert_eq!(DynamicValue::number(dec("0.100")).canonical(), "0.1");
        assert_eq!(DynamicValue::boolean(true).canonical(), "true");
        assert_eq!(DynamicValue::null().canonical(), "");
        assert_eq!(DynamicValue::error("boom").canonical(), "");
        assert_eq!(DynamicValue::timestamp(1642748400000).canonical(), "1642748400000");
    }

    #[test]
    fn errors_never_equal() {
        let e = DynamicValue::error("x");
        assert_ne!(e, e.clone());
        assert_eq!(DynamicValue::null(), DynamicValue::null());
    }

    #[test]
    fn numbers_equal_across_scale() {
        assert_eq!(DynamicValue::number(dec("3")), DynamicValue::number(dec("3.000")));
    }

    #[test]
    fn role_participates_in_equality() {
        let plain = DynamicValue::string("/acme");
        let tagged = DynamicValue::string("/acme").with_role(OutputRole::GroupId);
        assert_ne!(plain, tagged);
        assert_eq!(tagged.without_metadata(), plain);
    }

    #[test]
    fn param_tag_is_ignored_by_equality() {
        let a = DynamicValue::string("UTC").with_param(ParamName::Timezone);
        assert_eq!(a, DynamicValue::string("UTC"));
    }

    #[test]
    fn infer_types() {
        assert_eq!(DynamicValue::infer(Some("12.5")), DynamicValue::number(dec("12.5")));
        assert_eq!(DynamicValue::infer(Some("false")), DynamicValue::boolean(false));
        assert_eq!(DynamicValue::infer(Some("CO")), DynamicValue::string("CO"));
        assert_eq!(DynamicValue::infer(None), DynamicValue::null());
    }

    #[test]
    fn from_json_values() {
        let v = serde_json::json!({"a": [1, 2]});
        assert_eq!(DynamicValue::from_json(&v["a"][1]), DynamicValue::number(dec("2")));
        assert_eq!(DynamicValue::from_json(&v["a"]), DynamicValue::object("[1,2]"));
        assert_eq!(DynamicValue::from_json(&v["missing"]), DynamicValue::null());
    }

    #[test]
    fn accessor_type_errors() {
        let err = DynamicValue::string("abc").as_number().unwrap_err();
        assert_eq!(err.to_string(), "Expected a number but got string.");
        assert!(DynamicValue::null().as_bool().is_err());
    }

    #[test]
    fn scientific_decimal() {
        assert_eq!(parse_decimal("1.5e3"), Some(dec("1500")));
        assert_eq!(parse_decimal("abc"), None);
        assert_eq!(parse_decimal(""), None);
    }

    #[test]
    fn role_serializes_as_none() {
        assert_eq!(serde_json::to_string(&OutputRole::Unclassified).unwrap(), "\"none\"");
        assert_eq!(serde_json::to_string(&OutputRole::UniqueId).unwrap(), "\"uniqueId\"");
        assert_eq!(serde_json::to_string(&KeySlot::Key3).unwrap(), "\"key3\"");
    }
}
