//! Tree-walking formula evaluator.
//!
//! One call to [`Evaluator::evaluate`] runs one formula to completion over a
//! row's typed parameters and the outputs already computed for that row.
//! Every `:token` read, `SET` and function call is recorded in the audit
//! trail under its exact source text, nested custom formulas included.

mod builtins;
mod resources;

use std::collections::BTreeMap;

use chrono_tz::Tz;
use rust_decimal::Decimal;
use tally_core::{parse, BinaryOp, Callee, Expr, ExprKind, ParamName, Program};
use tracing::{debug, trace};

use crate::audit::EvaluationAudit;
use crate::numeric;
use crate::predicate;
use crate::resolve::Resources;
use crate::types::{parse_decimal, DynamicValue, EvalError};
use crate::units::UnitTable;

/// Values keyed by parameter name or output key.
pub type ValueMap = BTreeMap<String, DynamicValue>;

/// Default bound on nested custom formula calls.
pub const DEFAULT_MAX_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy)]
pub struct EvaluatorOptions {
    /// Zone for `AS_TIMESTAMP` when neither the value nor the call names one.
    pub default_timezone: Tz,
    pub max_depth: usize,
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        EvaluatorOptions {
            default_timezone: Tz::UTC,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Everything one evaluation reads besides the formula itself.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationRequest<'a> {
    pub parameters: &'a ValueMap,
    pub context: &'a ValueMap,
    pub group_context: &'a str,
    pub tenant: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub result: DynamicValue,
    pub audit: EvaluationAudit,
}

/// A failed evaluation. The audit gathered up to the failure is kept so
/// resolution attempts remain traceable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{error}")]
pub struct EvaluationFailure {
    pub error: EvalError,
    pub audit: EvaluationAudit,
}

impl From<EvalError> for EvaluationFailure {
    fn from(error: EvalError) -> Self {
        EvaluationFailure {
            error,
            audit: EvaluationAudit::default(),
        }
    }
}

pub struct Evaluator<'r> {
    resources: Resources<'r>,
    units: &'r UnitTable,
    options: EvaluatorOptions,
}

impl<'r> Evaluator<'r> {
    pub fn new(resources: Resources<'r>) -> Self {
        Evaluator {
            resources,
            units: UnitTable::builtin(),
            options: EvaluatorOptions::default(),
        }
    }

    pub fn with_units(mut self, units: &'r UnitTable) -> Self {
        self.units = units;
        self
    }

    pub fn with_options(mut self, options: EvaluatorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &EvaluatorOptions {
        &self.options
    }

    /// Parse and evaluate `formula`.
    pub fn evaluate(
        &self,
        formula: &str,
        request: &EvaluationRequest<'_>,
    ) -> Result<Evaluation, EvaluationFailure> {
        let program = parse(formula).map_err(EvalError::from)?;
        self.evaluate_program(&program, request)
    }

    /// Evaluate an already parsed formula.
    pub fn evaluate_program(
        &self,
        program: &Program,
        request: &EvaluationRequest<'_>,
    ) -> Result<Evaluation, EvaluationFailure> {
        debug!(formula = %program.source, group = request.group_context, "evaluating formula");
        let mut walk = Walk {
            evaluator: self,
            audit: EvaluationAudit::default(),
        };
        let mut frame = Frame {
            program,
            parameters: request.parameters,
            context: request.context,
            variables: ValueMap::new(),
            group: request.group_context,
            tenant: request.tenant,
            depth: 0,
        };
        match walk.run(&mut frame) {
            Ok(result) => Ok(Evaluation {
                result,
                audit: walk.audit,
            }),
            Err(error) => {
                debug!(formula = %program.source, %error, "formula failed");
                Err(EvaluationFailure {
                    error,
                    audit: walk.audit,
                })
            }
        }
    }
}

// ──────────────────────────────────────────────
// Walk state
// ──────────────────────────────────────────────

/// Bindings visible to one formula body. Custom formulas get a nested frame.
struct Frame<'a> {
    program: &'a Program,
    parameters: &'a ValueMap,
    context: &'a ValueMap,
    variables: ValueMap,
    group: &'a str,
    tenant: Option<&'a str>,
    depth: usize,
}

impl<'a> Frame<'a> {
    fn text(&self, expr: &Expr) -> &'a str {
        self.program.text(expr.span)
    }
}

/// Shared across the frames of one evaluation.
struct Walk<'e, 'r> {
    evaluator: &'e Evaluator<'r>,
    audit: EvaluationAudit,
}

impl Walk<'_, '_> {
    fn run(&mut self, frame: &mut Frame<'_>) -> Result<DynamicValue, EvalError> {
        let program = frame.program;
        let mut last = DynamicValue::null();
        for stmt in &program.statements {
            last = self.eval(frame, stmt)?;
        }
        Ok(last)
    }

    fn record(&mut self, frame: &Frame<'_>, expr: &Expr, value: &DynamicValue) {
        let text = frame.text(expr);
        trace!(expression = text, result = %value, "evaluated");
        self.audit.evaluated.record(text, value);
    }

    fn eval(&mut self, frame: &mut Frame<'_>, expr: &Expr) -> Result<DynamicValue, EvalError> {
        match &expr.kind {
            ExprKind::Number(text) => parse_decimal(text)
                .map(DynamicValue::number)
                .ok_or_else(|| {
                    EvalError::invalid_arguments(format!("Invalid number literal '{}'.", text))
                }),
            ExprKind::Str(s) => Ok(DynamicValue::string(s.clone())),
            ExprKind::Bool(b) => Ok(DynamicValue::boolean(*b)),
            ExprKind::Null => Ok(DynamicValue::null()),

            ExprKind::Var(name) => {
                let value = frame
                    .variables
                    .get(name)
                    .or_else(|| frame.parameters.get(name))
                    .cloned()
                    .ok_or_else(|| EvalError::UnknownToken { name: name.clone() })?;
                self.record(frame, expr, &value);
                Ok(value)
            }

            ExprKind::Neg(inner) => {
                let v = self.eval(frame, inner)?;
                let n = v.as_number().map_err(|_| {
                    EvalError::type_mismatch(format!(
                        "Operand of '{}' negation must be a number.",
                        frame.text(expr)
                    ))
                })?;
                Ok(DynamicValue::number(numeric::neg(n)))
            }

            ExprKind::Binary { op, left, right } => {
                let l = self.eval(frame, left)?;
                let r = self.eval(frame, right)?;
                let text = frame.text(expr);
                let l = operand(&l, "Left", text, *op)?;
                let r = operand(&r, "Right", text, *op)?;
                let n = match op {
                    BinaryOp::Add => numeric::add(l, r)?,
                    BinaryOp::Sub => numeric::sub(l, r)?,
                    BinaryOp::Mul => numeric::mul(l, r)?,
                    BinaryOp::Div => numeric::div(l, r, text)?,
                    BinaryOp::Pow => numeric::pow(l, r)?,
                };
                Ok(DynamicValue::number(n))
            }

            ExprKind::Compare { op, left, right } => {
                let l = self.eval(frame, left)?;
                let r = self.eval(frame, right)?;
                let holds = predicate::compare(*op, &l, &r, frame.text(expr))?;
                Ok(DynamicValue::boolean(holds))
            }

            ExprKind::Set { name, value } => {
                if frame.parameters.contains_key(name) {
                    return Err(EvalError::ParameterCollision { name: name.clone() });
                }
                let v = self.eval(frame, value)?;
                frame.variables.insert(name.clone(), v.clone());
                self.record(frame, expr, &v);
                Ok(v)
            }

            ExprKind::Call(call) => {
                let value = match &call.callee {
                    Callee::Builtin(builtin) => self.call_builtin(frame, *builtin, call)?,
                    Callee::Custom(name) => self.call_custom(frame, name, call)?,
                };
                self.record(frame, expr, &value);
                Ok(value)
            }
        }
    }

    /// Evaluate named parameters up front, tagging each with its name.
    fn eval_named(
        &mut self,
        frame: &mut Frame<'_>,
        call: &tally_core::Call,
    ) -> Result<Named, EvalError> {
        let mut values = Vec::with_capacity(call.named.len());
        for arg in &call.named {
            let v = self.eval(frame, &arg.value)?;
            values.push(v.with_param(arg.name));
        }
        Ok(Named(values))
    }

    fn eval_args(
        &mut self,
        frame: &mut Frame<'_>,
        args: &[Expr],
    ) -> Result<Vec<DynamicValue>, EvalError> {
        args.iter().map(|a| self.eval(frame, a)).collect()
    }
}

fn operand(v: &DynamicValue, side: &str, text: &str, op: BinaryOp) -> Result<Decimal, EvalError> {
    v.as_number().map_err(|_| {
        let verb = match op {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "subtract",
            BinaryOp::Mul => "multiply",
            BinaryOp::Div => "divide",
            BinaryOp::Pow => "power",
        };
        EvalError::type_mismatch(format!(
            "{} side of '{}' {} operation must be a number.",
            side, text, verb
        ))
    })
}

/// Evaluated named parameters of one call.
struct Named(Vec<DynamicValue>);

impl Named {
    fn get(&self, name: ParamName) -> Option<&DynamicValue> {
        self.0
            .iter()
            .find(|v| v.param == Some(name))
            .filter(|v| !v.is_null())
    }

    fn text(&self, name: ParamName) -> Option<String> {
        self.get(name).map(DynamicValue::canonical)
    }

    fn flag(&self, name: ParamName) -> Result<bool, EvalError> {
        match self.get(name) {
            None => Ok(false),
            Some(v) => v.as_bool().map_err(|_| {
                EvalError::type_mismatch(format!(
                    "Parameter '{}' must be a boolean.",
                    name.name()
                ))
            }),
        }
    }
}
