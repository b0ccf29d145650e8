//! Batch driver.
//!
//! A batch is validated once, its formulas are parsed once, and then each
//! input row is marshalled, transformed output by output, audited and handed
//! to the output sink. Rows are processed strictly in order; a failing row
//! is recorded and skipped.

use std::collections::BTreeMap;

use tally_core::{ParseError, Program};
use tally_eval::{
    DeclaredType, DynamicValue, EvaluationRequest, Evaluator, KeySlot, OutputRole, ValueMap,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::audit::{AuditOutput, RowAuditRecord};
use crate::classify::{apply_declared_type, classify};
use crate::marshal::{marshal_row, MarshalledRow, RawRow, RowError};
use crate::request::TransformRequest;
use crate::response::{render_json_line, BatchResponse};
use crate::sink::{AuditSink, OutputRecord, OutputSink};
use crate::validate::validate_request;
use crate::{AUDIT_ID_KEY, ERROR_PLACEHOLDER};

/// One declared output with its formula parsed up front.
struct CompiledOutput<'q> {
    index: usize,
    formula_index: usize,
    output_index: usize,
    key: &'q str,
    formula: &'q str,
    program: Result<Program, ParseError>,
    declared_type: Option<DeclaredType>,
    include_as_unique: bool,
    key_slot: Option<KeySlot>,
}

fn compile(req: &TransformRequest) -> Vec<CompiledOutput<'_>> {
    let mut compiled = Vec::new();
    for (formula_index, t) in req.transforms.iter().enumerate() {
        let formula = t.formula.as_deref().unwrap_or("");
        for (output_index, o) in t.outputs.iter().enumerate() {
            compiled.push(CompiledOutput {
                index: compiled.len(),
                formula_index,
                output_index,
                key: o.key.as_deref().unwrap_or(""),
                formula,
                program: tally_core::parse(formula),
                declared_type: o.declared_type,
                include_as_unique: o.include_as_unique.unwrap_or(false),
                key_slot: o.key_mapping,
            });
        }
    }
    compiled
}

/// A transformed row: the classified outputs plus the audit id column.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedRow {
    pub identifier: String,
    pub audit_id: String,
    pub values: OutputRecord,
}

impl TransformedRow {
    /// The row's assigned group, if a formula produced one.
    pub fn group(&self) -> Option<String> {
        self.values
            .values()
            .find(|v| v.role == OutputRole::GroupId)
            .map(DynamicValue::canonical)
    }

    /// What the output sink receives: identity, time, value and group
    /// columns. Deletions carry null payloads.
    pub fn record(&self, deletion: bool) -> OutputRecord {
        self.values
            .iter()
            .filter(|(_, v)| {
                matches!(
                    v.role,
                    OutputRole::UniqueId | OutputRole::Time | OutputRole::Value | OutputRole::GroupId
                )
            })
            .map(|(k, v)| {
                let v = if deletion {
                    DynamicValue::null()
                        .with_role(v.role)
                        .with_key_slot(v.key_slot)
                } else {
                    v.clone()
                };
                (k.clone(), v)
            })
            .collect()
    }
}

pub struct Pipeline<'r> {
    evaluator: Evaluator<'r>,
    error_placeholder: String,
}

impl<'r> Pipeline<'r> {
    pub fn new(evaluator: Evaluator<'r>) -> Self {
        Pipeline {
            evaluator,
            error_placeholder: ERROR_PLACEHOLDER.to_string(),
        }
    }

    pub fn with_error_placeholder(mut self, placeholder: &str) -> Self {
        self.error_placeholder = placeholder.to_string();
        self
    }

    /// Process one batch of JSON-object rows.
    pub fn process<'a, I>(
        &self,
        req: &TransformRequest,
        rows: I,
        output: &mut dyn OutputSink,
        auditor: &mut dyn AuditSink,
    ) -> BatchResponse
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut response = BatchResponse {
            headers: req.output_headers(),
            ..Default::default()
        };

        if let Err(errors) = validate_request(req) {
            debug!(count = errors.len(), "request failed validation");
            response.errors = errors.into_iter().map(|e| e.0).collect();
            return response;
        }

        let pipeline_id = req.pipeline_id.as_deref().unwrap_or("");
        let execution_id = req.execution_id.as_deref().unwrap_or("");
        let group_context = req.group_context_id.as_deref().unwrap_or("");
        debug!(pipeline_id, execution_id, chunk = req.chunk(), "processing batch");

        let compiled = compile(req);
        let output_types: BTreeMap<String, DeclaredType> = compiled
            .iter()
            .filter_map(|o| o.declared_type.map(|t| (o.key.to_string(), t)))
            .collect();
        if let Err(e) = output.init(pipeline_id, execution_id, req.chunk(), &output_types) {
            error!(error = %e, "output sink init failed");
        }

        for line in rows {
            if line.trim().is_empty() {
                continue;
            }
            let outcome = match RawRow::from_json(line)
                .and_then(|raw| marshal_row(&raw, &req.parameters, &req.unique_key))
            {
                Ok(row) => self.transform_row(req, &compiled, row, auditor, &mut response.errors),
                Err(e) => Err(e),
            };
            let row = match outcome {
                Ok(row) => row,
                Err(e) => {
                    error!(error = %e, "row failed");
                    response
                        .errors
                        .push(format!("Failed processing row {}, err: {}", line.trim(), e));
                    continue;
                }
            };

            response
                .rows
                .push(render_json_line(&row.values, &response.headers, &self.error_placeholder));

            if !req.dry_run {
                let group = row.group().unwrap_or_else(|| group_context.to_string());
                response.groups_visited.insert(group);
                if let Err(e) = output.add_record(row.record(req.is_deletion())) {
                    error!(row = %row.identifier, error = %e, "output sink rejected record");
                }
            }
        }

        if let Err(e) = auditor.flush_sync() {
            error!(error = %e, "audit flush failed");
        }
        if let Err(e) = output.submit() {
            error!(error = %e, "output submit failed");
        }

        debug!(
            rows = response.rows.len(),
            errors = response.errors.len(),
            "batch complete"
        );
        response
    }

    fn transform_row(
        &self,
        req: &TransformRequest,
        compiled: &[CompiledOutput<'_>],
        row: MarshalledRow,
        auditor: &mut dyn AuditSink,
        errors: &mut Vec<String>,
    ) -> Result<TransformedRow, RowError> {
        debug!(row = %row.identifier, "transforming row");
        let audit_id = Uuid::new_v4().to_string();
        let mut audit = RowAuditRecord::new(
            req.pipeline_id.as_deref().unwrap_or(""),
            req.execution_id.as_deref().unwrap_or(""),
            &audit_id,
            req.chunk(),
            &row.parameters,
        );
        let mut context = ValueMap::new();

        for output in compiled {
            let mut entry = AuditOutput {
                index: output.index,
                name: output.key.to_string(),
                formula: output.formula.to_string(),
                evaluated: None,
                result: None,
                resources: None,
                error_message: None,
            };

            let evaluated = match &output.program {
                Ok(program) => {
                    let request = EvaluationRequest {
                        parameters: &row.parameters,
                        context: &context,
                        group_context: req.group_context_id.as_deref().unwrap_or(""),
                        tenant: req.tenant_id.as_deref(),
                    };
                    self.evaluator
                        .evaluate_program(program, &request)
                        .map_err(|f| (f.error.to_string(), Some(f.audit)))
                }
                Err(e) => Err((e.to_string(), None)),
            };

            let result = match evaluated {
                Ok(evaluation) => {
                    entry.result = Some(evaluation.result.canonical());
                    entry.evaluated = Some(evaluation.audit.evaluated);
                    if !evaluation.audit.resources.is_empty() {
                        entry.resources = Some(evaluation.audit.resources);
                    }
                    apply_declared_type(evaluation.result, output.declared_type)
                }
                Err((message, failed_audit)) => {
                    let message = format!(
                        "Row '{}' column '{}' encountered error evaluating formula `{}` - {}",
                        row.identifier, output.key, output.formula, message
                    );
                    warn!("{}", message);
                    errors.push(message.clone());
                    if let Some(a) = failed_audit.filter(|a| !a.resources.is_empty()) {
                        entry.resources = Some(a.resources);
                    }
                    entry.error_message = Some(message.clone());
                    DynamicValue::error(message)
                }
            };

            let role = classify(
                output.formula_index,
                output.output_index,
                output.include_as_unique,
                result.role,
            );
            let result = match role {
                OutputRole::UniqueId => {
                    if result.canonical().is_empty() {
                        let e = RowError::EmptyUniqueKey {
                            row: row.identifier.clone(),
                            column: output.key.to_string(),
                        };
                        error!("{}", e);
                        return Err(e);
                    }
                    result.with_role(role).with_key_slot(output.key_slot)
                }
                _ => result.with_role(role),
            };

            context.insert(output.key.to_string(), result);
            audit.outputs.push(entry);
        }

        if req.is_deletion() {
            audit.clear_errors();
        }
        if !req.dry_run {
            if let Err(e) = auditor.log(audit) {
                error!(row = %row.identifier, error = %e, "audit sink rejected record");
            }
        }

        context.insert(
            AUDIT_ID_KEY.to_string(),
            DynamicValue::string(audit_id.clone()).with_role(OutputRole::AuditId),
        );

        Ok(TransformedRow {
            identifier: row.identifier,
            audit_id,
            values: context,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_filters_roles_and_nulls_deletions() {
        let mut values = OutputRecord::new();
        values.insert("time".into(), DynamicValue::timestamp(1).with_role(OutputRole::Time));
        values.insert(
            "site".into(),
            DynamicValue::string("north")
                .with_role(OutputRole::UniqueId)
                .with_key_slot(Some(KeySlot::Key1)),
        );
        values.insert(
            AUDIT_ID_KEY.into(),
            DynamicValue::string("a1").with_role(OutputRole::AuditId),
        );
        let row = TransformedRow {
            identifier: "north".into(),
            audit_id: "a1".into(),
            values,
        };

        let record = row.record(false);
        assert_eq!(record.len(), 2);
        assert_eq!(record["site"].canonical(), "north");

        let deleted = row.record(true);
        assert!(deleted["site"].is_null());
        assert_eq!(deleted["site"].role, OutputRole::UniqueId);
        assert_eq!(deleted["site"].key_slot, Some(KeySlot::Key1));
        assert!(!deleted.contains_key(AUDIT_ID_KEY));
    }

    #[test]
    fn group_from_tagged_output() {
        let mut values = OutputRecord::new();
        values.insert("g".into(), DynamicValue::string("/acme/a").with_role(OutputRole::GroupId));
        let row = TransformedRow {
            identifier: "x".into(),
            audit_id: "a".into(),
            values,
        };
        assert_eq!(row.group().as_deref(), Some("/acme/a"));
    }
}
