//! Batch request model.
//!
//! The wire shape is camelCase JSON. Every field is optional at the serde
//! level so that a malformed request still deserializes and can be reported
//! through [`crate::validate`] rather than failing on the first missing key.

use serde::{Deserialize, Serialize};
use tally_eval::{DeclaredType, KeySlot};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    #[default]
    Create,
    /// Rows are being removed; only their identity matters.
    Delete,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineType {
    #[default]
    Activities,
    Impacts,
    Data,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransformRequest {
    pub group_context_id: Option<String>,
    pub tenant_id: Option<String>,
    pub pipeline_id: Option<String>,
    pub execution_id: Option<String>,
    pub parameters: Vec<TransformParameter>,
    pub transforms: Vec<Transform>,
    /// Raw columns whose values identify a row. All columns when empty.
    pub unique_key: Vec<String>,
    pub chunk_no: Option<u32>,
    /// No audit records are published and no output rows are written.
    pub dry_run: bool,
    pub action_type: ActionType,
    pub pipeline_type: PipelineType,
    /// Inline rows, one JSON object per entry.
    pub source_data: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransformParameter {
    pub index: u32,
    pub key: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub declared_type: Option<DeclaredType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Transform {
    pub index: u32,
    pub formula: Option<String>,
    pub outputs: Vec<TransformOutput>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransformOutput {
    pub index: u32,
    pub key: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub declared_type: Option<DeclaredType>,
    pub include_as_unique: Option<bool>,
    #[serde(rename = "_keyMapping")]
    pub key_mapping: Option<KeySlot>,
}

impl TransformRequest {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn is_deletion(&self) -> bool {
        self.action_type == ActionType::Delete
    }

    pub fn chunk(&self) -> u32 {
        self.chunk_no.unwrap_or(0)
    }

    /// Output keys in declaration order.
    pub fn output_headers(&self) -> Vec<String> {
        self.transforms
            .iter()
            .flat_map(|t| &t.outputs)
            .filter_map(|o| o.key.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_wire_shape() {
        let req = TransformRequest::from_json(
            r#"{
                "groupContextId": "/acme",
                "pipelineId": "p1",
                "executionId": "e1",
                "actionType": "delete",
                "pipelineType": "data",
                "uniqueKey": ["site"],
                "parameters": [{"index": 0, "key": "site", "type": "string"}],
                "transforms": [{
                    "index": 0,
                    "formula": ":site",
                    "outputs": [{"index": 0, "key": "site", "type": "string",
                                 "includeAsUnique": true, "_keyMapping": "key1"}]
                }]
            }"#,
        )
        .unwrap();
        assert!(req.is_deletion());
        assert_eq!(req.pipeline_type, PipelineType::Data);
        assert_eq!(req.unique_key, ["site"]);
        let output = &req.transforms[0].outputs[0];
        assert_eq!(output.include_as_unique, Some(true));
        assert_eq!(output.key_mapping, Some(KeySlot::Key1));
        assert_eq!(req.output_headers(), ["site"]);
    }

    #[test]
    fn defaults() {
        let req = TransformRequest::from_json("{}").unwrap();
        assert_eq!(req.action_type, ActionType::Create);
        assert_eq!(req.pipeline_type, PipelineType::Activities);
        assert!(!req.dry_run);
        assert_eq!(req.chunk(), 0);
    }
}
