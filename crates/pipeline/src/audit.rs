//! Per-row audit records.

use serde::Serialize;
use tally_eval::{AuditTrail, ResourceAudit, ValueMap};

/// Everything recorded while one row was transformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowAuditRecord {
    pub pipeline_id: String,
    pub execution_id: String,
    pub audit_id: String,
    pub chunk_no: u32,
    pub inputs: Vec<AuditInput>,
    pub outputs: Vec<AuditOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditInput {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditOutput {
    pub index: usize,
    pub name: String,
    pub formula: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluated: Option<AuditTrail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceAudit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl RowAuditRecord {
    pub fn new(
        pipeline_id: &str,
        execution_id: &str,
        audit_id: &str,
        chunk_no: u32,
        parameters: &ValueMap,
    ) -> Self {
        RowAuditRecord {
            pipeline_id: pipeline_id.to_string(),
            execution_id: execution_id.to_string(),
            audit_id: audit_id.to_string(),
            chunk_no,
            inputs: parameters
                .iter()
                .map(|(name, v)| AuditInput {
                    name: name.clone(),
                    value: v.canonical(),
                })
                .collect(),
            outputs: Vec::new(),
        }
    }

    /// Drop every output error message. Deletions only need row identity.
    pub fn clear_errors(&mut self) {
        for o in &mut self.outputs {
            o.error_message = None;
        }
    }

    pub fn has_errors(&self) -> bool {
        self.outputs.iter().any(|o| o.error_message.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_eval::DynamicValue;

    #[test]
    fn serializes_camel_case_without_empty_fields() {
        let mut params = ValueMap::new();
        params.insert("site".into(), DynamicValue::string("north"));
        let mut record = RowAuditRecord::new("p1", "e1", "a1", 2, &params);
        record.outputs.push(AuditOutput {
            index: 0,
            name: "kwh".into(),
            formula: ":x".into(),
            evaluated: None,
            result: None,
            resources: None,
            error_message: Some("boom".into()),
        });
        assert!(record.has_errors());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["pipelineId"], "p1");
        assert_eq!(json["chunkNo"], 2);
        assert_eq!(json["inputs"][0]["value"], "north");
        assert_eq!(json["outputs"][0]["errorMessage"], "boom");
        assert!(json["outputs"][0].get("result").is_none());

        record.clear_errors();
        assert!(!record.has_errors());
    }
}
