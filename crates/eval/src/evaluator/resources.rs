//! Calls that go through the resolution capabilities: `IMPACT`, `LOOKUP`
//! and `#custom(...)` formulas.

use rust_decimal::Decimal;
use tally_core::{parse, Call, ParamName};
use tracing::debug;

use super::{Frame, Named, ValueMap, Walk};
use crate::audit::{ActivityRecord, CalculationRecord, ReferenceDatasetRecord};
use crate::resolve::{ImpactQuery, ReferenceQuery, ResolutionScope, Resolved, VersionSelector};
use crate::types::{parse_decimal, DeclaredType, DynamicValue, EvalError, Value};

/// Group, tenant and version a resource call resolves against.
struct Target {
    group: String,
    tenant: Option<String>,
    version: VersionSelector,
}

impl Target {
    fn new(frame: &Frame<'_>, named: &Named) -> Result<Self, EvalError> {
        Ok(Target {
            group: named
                .text(ParamName::Group)
                .unwrap_or_else(|| frame.group.to_string()),
            tenant: named
                .text(ParamName::Tenant)
                .or_else(|| frame.tenant.map(str::to_string)),
            version: VersionSelector::from_params(
                named.get(ParamName::Version),
                named.get(ParamName::VersionAsAt),
            )?,
        })
    }

    fn scope(&self) -> ResolutionScope<'_> {
        ResolutionScope {
            group: &self.group,
            tenant: self.tenant.as_deref(),
            version: &self.version,
        }
    }

    /// Resolved version on success, requested version otherwise.
    fn version_of<T, E>(&self, outcome: &Result<Resolved<T>, E>) -> Option<u32> {
        match outcome {
            Ok(resolved) => Some(resolved.version),
            Err(_) => self.version.requested(),
        }
    }
}

impl Walk<'_, '_> {
    pub(super) fn impact(
        &mut self,
        frame: &mut Frame<'_>,
        call: &Call,
    ) -> Result<DynamicValue, EvalError> {
        let args = self.eval_args(frame, &call.args)?;
        let named = self.eval_named(frame, call)?;
        let target = Target::new(frame, &named)?;
        let activity = args[0].canonical();
        let impact = args[1].canonical();
        let component = args[2].canonical();

        let outcome = self.evaluator.resources.impacts.resolve_impact_component(
            &ImpactQuery {
                activity: &activity,
                impact: &impact,
                component: &component,
            },
            &target.scope(),
        );
        self.audit.resources.activities.push(ActivityRecord {
            activity,
            impact,
            component,
            group: target.group.clone(),
            tenant: target.tenant.clone(),
            version: target.version_of(&outcome),
        });
        Ok(DynamicValue::number(outcome?.value))
    }

    pub(super) fn lookup(
        &mut self,
        frame: &mut Frame<'_>,
        call: &Call,
    ) -> Result<DynamicValue, EvalError> {
        let args = self.eval_args(frame, &call.args)?;
        let named = self.eval_named(frame, call)?;
        let target = Target::new(frame, &named)?;
        let value = args[0].canonical();
        let dataset = args[1].canonical();
        let key_column = args[2].canonical();
        let output_column = args[3].canonical();

        let outcome = self.evaluator.resources.datasets.resolve_reference_value(
            &ReferenceQuery {
                dataset: &dataset,
                value: &value,
                key_column: &key_column,
                output_column: &output_column,
            },
            &target.scope(),
        );
        self.audit
            .resources
            .reference_datasets
            .push(ReferenceDatasetRecord {
                value,
                name: dataset,
                key_column,
                output_column,
                group: target.group.clone(),
                tenant: target.tenant.clone(),
                version: target.version_of(&outcome),
            });
        Ok(DynamicValue::infer(outcome?.value.as_deref()))
    }

    /// Resolve a stored formula and evaluate its body in a nested frame. The
    /// body sees the caller's parameters overlaid with the typed arguments.
    pub(super) fn call_custom(
        &mut self,
        frame: &mut Frame<'_>,
        name: &str,
        call: &Call,
    ) -> Result<DynamicValue, EvalError> {
        let args = self.eval_args(frame, &call.args)?;
        let named = self.eval_named(frame, call)?;
        let limit = self.evaluator.options.max_depth;
        if frame.depth >= limit {
            return Err(EvalError::RecursionLimitExceeded { limit });
        }
        let target = Target::new(frame, &named)?;

        let outcome = self
            .evaluator
            .resources
            .formulas
            .resolve_formula(name, &target.scope());
        self.audit.resources.calculations.push(CalculationRecord {
            function: name.to_string(),
            args: args.iter().map(DynamicValue::canonical).collect(),
            group: target.group.clone(),
            tenant: target.tenant.clone(),
            version: match &outcome {
                Ok(formula) => Some(formula.version),
                Err(_) => target.version.requested(),
            },
        });
        let formula = outcome?;

        if formula.parameters.len() != args.len() {
            return Err(EvalError::invalid_arguments(format!(
                "Custom formula '{}' expects {} argument(s), got {}.",
                name,
                formula.parameters.len(),
                args.len()
            )));
        }
        let mut declared = formula.parameters.clone();
        declared.sort_by_key(|p| p.index);
        let mut parameters: ValueMap = frame.parameters.clone();
        for (param, value) in declared.iter().zip(args) {
            let key = param.key.trim_start_matches(':');
            parameters.insert(key.to_string(), coerce(value, param.declared_type, key)?);
        }

        let program = parse(&formula.formula)?;
        debug!(
            formula = name,
            version = formula.version,
            depth = frame.depth + 1,
            "evaluating custom formula"
        );
        let mut nested = Frame {
            program: &program,
            parameters: &parameters,
            context: frame.context,
            variables: ValueMap::new(),
            group: &target.group,
            tenant: target.tenant.as_deref(),
            depth: frame.depth + 1,
        };
        self.run(&mut nested)
    }
}

/// Convert an argument to the declared type of the parameter it binds to.
fn coerce(value: DynamicValue, ty: DeclaredType, key: &str) -> Result<DynamicValue, EvalError> {
    if value.is_null() {
        return Ok(DynamicValue::null());
    }
    let coerced = match (ty, &value.value) {
        (DeclaredType::Number | DeclaredType::Timestamp, Value::Number(d)) => {
            Some(DynamicValue::number(*d))
        }
        (DeclaredType::Number | DeclaredType::Timestamp, Value::Timestamp(ms)) => {
            Some(DynamicValue::number(Decimal::from(*ms)))
        }
        (DeclaredType::Number | DeclaredType::Timestamp, Value::String(s)) => {
            parse_decimal(s).map(DynamicValue::number)
        }
        (DeclaredType::Boolean, Value::Boolean(b)) => Some(DynamicValue::boolean(*b)),
        (DeclaredType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(DynamicValue::boolean(true)),
            "false" => Some(DynamicValue::boolean(false)),
            _ => None,
        },
        (DeclaredType::String, Value::Error(_)) => None,
        (DeclaredType::String, _) => Some(DynamicValue::string(value.canonical())),
        _ => None,
    };
    coerced.ok_or_else(|| {
        EvalError::type_mismatch(format!(
            "Argument '{}' must be a {} but got {}.",
            key,
            ty,
            value.type_name()
        ))
    })
}
