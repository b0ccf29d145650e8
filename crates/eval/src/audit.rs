//! Audit trail construction for formula evaluation.
//!
//! Every evaluated token reference, `SET` and function call is recorded
//! under its source text together with its canonical result. Resolution
//! attempts against external resources are recorded separately, one entry
//! per attempt, whether or not the lookup succeeded.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::types::DynamicValue;

// ──────────────────────────────────────────────
// Evaluated expressions
// ──────────────────────────────────────────────

/// Source text → canonical result, in evaluation order.
///
/// Re-recording a text moves it to the end, so a variable read after its
/// last assignment appears after that assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditTrail {
    entries: Vec<(String, String)>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, text: &str, result: &DynamicValue) {
        self.record_text(text, result.canonical());
    }

    pub fn record_text(&mut self, text: &str, result: String) {
        self.entries.retain(|(t, _)| t != text);
        self.entries.push((text.to_string(), result));
    }

    /// The recorded result for a source text.
    pub fn get(&self, text: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(t, _)| t == text)
            .map(|(_, r)| r.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(t, r)| (t.as_str(), r.as_str()))
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|(t, _)| t.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for AuditTrail {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (text, result) in &self.entries {
            map.serialize_entry(text, result)?;
        }
        map.end()
    }
}

// ──────────────────────────────────────────────
// Resource resolution records
// ──────────────────────────────────────────────

/// One custom formula resolution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationRecord {
    pub function: String,
    pub args: Vec<String>,
    pub group: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    /// Resolved version on success, requested version (if any) on failure.
    pub version: Option<u32>,
}

/// One reference dataset lookup attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceDatasetRecord {
    pub value: String,
    pub name: String,
    pub key_column: String,
    pub output_column: String,
    pub group: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    pub version: Option<u32>,
}

/// One activity impact component lookup attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub activity: String,
    pub impact: String,
    pub component: String,
    pub group: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    pub version: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAudit {
    pub calculations: Vec<CalculationRecord>,
    pub reference_datasets: Vec<ReferenceDatasetRecord>,
    pub activities: Vec<ActivityRecord>,
}

impl ResourceAudit {
    pub fn is_empty(&self) -> bool {
        self.calculations.is_empty()
            && self.reference_datasets.is_empty()
            && self.activities.is_empty()
    }
}

/// Everything an evaluation records: evaluated expressions plus resource
/// resolution attempts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationAudit {
    pub evaluated: AuditTrail,
    #[serde(flatten)]
    pub resources: ResourceAudit,
}
