//! Batch-level request validation.
//!
//! All problems are collected; a request with any of them processes no rows.

use tally_core::{Builtin, Callee, Expr, ExprKind};
use tally_eval::DeclaredType;

use crate::request::{PipelineType, TransformRequest};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

pub fn validate_request(req: &TransformRequest) -> Result<(), Vec<ValidationError>> {
    let mut errors: Vec<String> = Vec::new();

    if is_blank(&req.group_context_id) {
        errors.push("No groupContextId provided.".into());
    }
    if is_blank(&req.pipeline_id) {
        errors.push("No pipelineId provided.".into());
    }
    if is_blank(&req.execution_id) {
        errors.push("No executionId provided.".into());
    }

    if req.parameters.is_empty() {
        errors.push("No parameters provided.".into());
    }
    for (x, p) in req.parameters.iter().enumerate() {
        if is_blank(&p.key) {
            errors.push(format!("Parameter key at index {} not provided.", x));
        }
        if p.declared_type.is_none() {
            errors.push(format!("Parameter type at index {} not provided.", x));
        }
    }

    if req.transforms.is_empty() {
        errors.push("No transforms provided.".into());
    }
    for t in &req.transforms {
        if is_blank(&t.formula) {
            errors.push(format!("Formula for transform index {} not provided.", t.index));
        }
        match t.outputs.len() {
            0 => errors.push(format!(
                "Outputs for transform index {} not provided.",
                t.index
            )),
            1 => {
                let o = &t.outputs[0];
                if is_blank(&o.key) {
                    errors.push(format!(
                        "Key for output index {} of transform index {} not provided.",
                        o.index, t.index
                    ));
                }
                if o.declared_type.is_none() {
                    errors.push(format!(
                        "Type for output index {} of transform index {} not provided.",
                        o.index, t.index
                    ));
                }
            }
            _ => errors.push(format!(
                "More than 1 output configuration provided for transform {}.",
                t.index
            )),
        }
    }

    let group_assignments = req
        .transforms
        .iter()
        .filter(|t| t.formula.as_deref().is_some_and(assigns_group))
        .count();
    if group_assignments > 1 {
        errors.push(
            "Only one transform may contain a formula with an ASSIGN_TO_GROUP function.".into(),
        );
    }

    let first_output = req.transforms.first().and_then(|t| t.outputs.first());
    if let Some(first) = first_output {
        if req.pipeline_type == PipelineType::Activities
            && !req.dry_run
            && first.declared_type != Some(DeclaredType::Timestamp)
        {
            errors.push("First output of first transform must be configured as the timestamp.".into());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.into_iter().map(ValidationError).collect())
    }
}

fn is_blank(v: &Option<String>) -> bool {
    v.as_deref().map_or(true, |s| s.trim().is_empty())
}

/// True when the formula calls `ASSIGN_TO_GROUP`. Unparseable formulas fall
/// back to a text search; their parse error is reported per row.
fn assigns_group(formula: &str) -> bool {
    match tally_core::parse(formula) {
        Ok(program) => program.statements.iter().any(calls_assign),
        Err(_) => formula.to_ascii_uppercase().contains("ASSIGN_TO_GROUP"),
    }
}

fn calls_assign(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Call(call) => {
            call.callee == Callee::Builtin(Builtin::AssignToGroup)
                || call.args.iter().any(calls_assign)
                || call.named.iter().any(|n| calls_assign(&n.value))
        }
        ExprKind::Neg(inner) => calls_assign(inner),
        ExprKind::Binary { left, right, .. } | ExprKind::Compare { left, right, .. } => {
            calls_assign(left) || calls_assign(right)
        }
        ExprKind::Set { value, .. } => calls_assign(value),
        ExprKind::Number(_)
        | ExprKind::Str(_)
        | ExprKind::Bool(_)
        | ExprKind::Null
        | ExprKind::Var(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{Transform, TransformOutput, TransformParameter};

    fn output(key: &str, ty: DeclaredType) -> TransformOutput {
        TransformOutput {
            key: Some(key.into()),
            declared_type: Some(ty),
            ..Default::default()
        }
    }

    fn transform(index: u32, formula: &str, out: TransformOutput) -> Transform {
        Transform {
            index,
            formula: Some(formula.into()),
            outputs: vec![out],
        }
    }

    fn valid() -> TransformRequest {
        TransformRequest {
            group_context_id: Some("/acme".into()),
            pipeline_id: Some("p1".into()),
            execution_id: Some("e1".into()),
            parameters: vec![TransformParameter {
                key: Some("reading".into()),
                declared_type: Some(DeclaredType::Number),
                ..Default::default()
            }],
            transforms: vec![
                transform(0, "AS_TIMESTAMP(:date, 'M/d/yy')", output("time", DeclaredType::Timestamp)),
                transform(1, ":reading * 2", output("kwh", DeclaredType::Number)),
            ],
            ..Default::default()
        }
    }

    fn messages(req: &TransformRequest) -> Vec<String> {
        validate_request(req)
            .err()
            .unwrap_or_default()
            .into_iter()
            .map(|e| e.0)
            .collect()
    }

    #[test]
    fn valid_request_passes() {
        assert!(validate_request(&valid()).is_ok());
    }

    #[test]
    fn missing_identifiers() {
        let req = TransformRequest::default();
        let errors = messages(&req);
        assert!(errors.contains(&"No groupContextId provided.".to_string()));
        assert!(errors.contains(&"No pipelineId provided.".to_string()));
        assert!(errors.contains(&"No executionId provided.".to_string()));
        assert!(errors.contains(&"No parameters provided.".to_string()));
        assert!(errors.contains(&"No transforms provided.".to_string()));
    }

    #[test]
    fn transform_shape() {
        let mut req = valid();
        req.transforms[1].formula = None;
        req.transforms[1].outputs[0].key = Some("  ".into());
        req.transforms[0].outputs.push(output("extra", DeclaredType::String));
        assert_eq!(
            messages(&req),
            [
                "More than 1 output configuration provided for transform 0.",
                "Formula for transform index 1 not provided.",
                "Key for output index 0 of transform index 1 not provided.",
            ]
        );
    }

    #[test]
    fn single_group_assignment() {
        let mut req = valid();
        req.transforms.push(transform(2, "ASSIGN_TO_GROUP('/acme/a')", output("g1", DeclaredType::String)));
        assert!(validate_request(&req).is_ok());
        req.transforms.push(transform(
            3,
            "IF(:reading > 1, assign_to_group('/acme/b'), null)",
            output("g2", DeclaredType::String),
        ));
        assert_eq!(
            messages(&req),
            ["Only one transform may contain a formula with an ASSIGN_TO_GROUP function."]
        );
    }

    #[test]
    fn activities_need_leading_timestamp() {
        let mut req = valid();
        req.transforms[0].outputs[0].declared_type = Some(DeclaredType::String);
        assert_eq!(
            messages(&req),
            ["First output of first transform must be configured as the timestamp."]
        );
        req.dry_run = true;
        assert!(validate_request(&req).is_ok());
        req.dry_run = false;
        req.pipeline_type = PipelineType::Data;
        assert!(validate_request(&req).is_ok());
    }
}
