use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tally_core::{Builtin, Call, Expr, ParamName};

use super::{Frame, Walk};
use crate::json_path;
use crate::text;
use crate::timestamp::{self, RoundDownTo, TimestampOptions};
use crate::types::{DynamicValue, EvalError, OutputRole, Value};

impl Walk<'_, '_> {
    pub(super) fn call_builtin(
        &mut self,
        frame: &mut Frame<'_>,
        builtin: Builtin,
        call: &Call,
    ) -> Result<DynamicValue, EvalError> {
        let args = call.args.as_slice();
        match builtin {
            Builtin::If => self.if_(frame, args),
            Builtin::Coalesce => {
                for arg in args {
                    let v = self.eval(frame, arg)?;
                    if !v.is_null() {
                        return Ok(v);
                    }
                }
                Ok(DynamicValue::null())
            }
            Builtin::Concat => {
                let parts = self.eval_args(frame, args)?;
                Ok(DynamicValue::string(
                    parts.iter().map(DynamicValue::canonical).collect::<String>(),
                ))
            }
            Builtin::Switch => self.switch(frame, call),
            Builtin::Ref => {
                let key = self.eval(frame, &args[0])?.canonical();
                Ok(frame
                    .context
                    .get(&key)
                    .map(DynamicValue::without_metadata)
                    .unwrap_or_else(DynamicValue::null))
            }
            Builtin::Uppercase | Builtin::Lowercase => {
                let v = self.eval(frame, &args[0])?;
                let Value::String(s) = &v.value else {
                    return Err(EvalError::type_mismatch("Evaluated value is not a string."));
                };
                Ok(DynamicValue::string(if builtin == Builtin::Uppercase {
                    s.to_uppercase()
                } else {
                    s.to_lowercase()
                }))
            }
            Builtin::AsTimestamp => self.as_timestamp(frame, call),
            Builtin::Convert => {
                let args = self.eval_args(frame, args)?;
                let named = self.eval_named(frame, call)?;
                let value = args[0].as_number()?;
                let kind = named.text(ParamName::QuantityKind);
                let converted = self.evaluator.units.convert(
                    value,
                    &args[1].canonical(),
                    &args[2].canonical(),
                    kind.as_deref(),
                )?;
                Ok(DynamicValue::number(converted))
            }
            Builtin::Impact => self.impact(frame, call),
            Builtin::Lookup => self.lookup(frame, call),
            Builtin::AssignToGroup => self.assign_to_group(frame, &args[0]),
            Builtin::Split => {
                let args = self.eval_args(frame, args)?;
                let named = self.eval_named(frame, call)?;
                let limit = named
                    .get(ParamName::Limit)
                    .map(|v| whole(v, ParamName::Limit))
                    .transpose()?;
                let parts = text::split(&args[0].canonical(), args[1].as_str()?, limit)?;
                match named.get(ParamName::Index) {
                    None => Ok(DynamicValue::object(serde_json::Value::from(parts).to_string())),
                    Some(index) => {
                        let i = whole(index, ParamName::Index)?;
                        parts
                            .get(i)
                            .map(|p| DynamicValue::infer(Some(p.as_str())))
                            .ok_or_else(|| {
                                EvalError::invalid_arguments(format!(
                                    "Index {} is out of bounds for {} split values.",
                                    i,
                                    parts.len()
                                ))
                            })
                    }
                }
            }
            Builtin::Search => {
                let args = self.eval_args(frame, args)?;
                let named = self.eval_named(frame, call)?;
                let at = text::search(
                    &args[0].canonical(),
                    &args[1].canonical(),
                    named.flag(ParamName::IgnoreCase)?,
                );
                Ok(DynamicValue::number(Decimal::from(at)))
            }
            Builtin::GetValue => {
                let args = self.eval_args(frame, args)?;
                json_path::get_value(&args[0].canonical(), args[1].as_str()?)
            }
            Builtin::Caml => {
                let product = self.eval(frame, &args[0])?;
                if product.is_null() || product.is_error() {
                    return Err(EvalError::invalid_arguments(
                        "CaML input value is not specified",
                    ));
                }
                let matches = self
                    .evaluator
                    .resources
                    .products
                    .product_matches(&product.canonical())?;
                let json = serde_json::to_string(&matches).map_err(|e| {
                    EvalError::invalid_arguments(format!("Unable to encode product matches: {}", e))
                })?;
                Ok(DynamicValue::object(json))
            }
        }
    }

    fn if_(&mut self, frame: &mut Frame<'_>, args: &[Expr]) -> Result<DynamicValue, EvalError> {
        let condition = self.eval(frame, &args[0])?;
        let holds = condition.as_bool().map_err(|_| {
            EvalError::type_mismatch(format!(
                "IF condition '{}' must evaluate to a boolean.",
                frame.text(&args[0])
            ))
        })?;
        self.eval(frame, if holds { &args[1] } else { &args[2] })
    }

    fn switch(&mut self, frame: &mut Frame<'_>, call: &Call) -> Result<DynamicValue, EvalError> {
        let (subject, cases) = match call.args.split_first() {
            Some((subject, cases)) if !cases.is_empty() && cases.len() % 2 == 0 => (subject, cases),
            _ => {
                return Err(EvalError::invalid_arguments(
                    "The SWITCH function requires a list of values to check along with their corresponding results.",
                ))
            }
        };
        let subject = self.eval(frame, subject)?;
        let named = self.eval_named(frame, call)?;
        let ignore_case = named.flag(ParamName::IgnoreCase)?;

        for pair in cases.chunks(2) {
            let candidate = self.eval(frame, &pair[0])?;
            if switch_matches(&subject, &candidate, ignore_case) {
                return self.eval(frame, &pair[1]);
            }
        }
        match named.get(ParamName::DefaultValue) {
            Some(default) => Ok(match &default.value {
                Value::String(s) => DynamicValue::infer(Some(s.as_str())),
                _ => default.without_metadata(),
            }),
            None => Err(EvalError::NoMatch),
        }
    }

    fn as_timestamp(
        &mut self,
        frame: &mut Frame<'_>,
        call: &Call,
    ) -> Result<DynamicValue, EvalError> {
        let args = self.eval_args(frame, &call.args)?;
        let named = self.eval_named(frame, call)?;
        if args[0].is_null() {
            return Err(EvalError::invalid_arguments(
                "AS_TIMESTAMP requires a value to parse.",
            ));
        }
        let pattern = args[1].as_str()?;
        let opts = TimestampOptions {
            timezone: named
                .text(ParamName::Timezone)
                .map(|tz| timestamp::parse_timezone(&tz))
                .transpose()?,
            default_timezone: self.evaluator.options.default_timezone,
            round_down: named
                .text(ParamName::RoundDownTo)
                .map(|unit| unit.parse::<RoundDownTo>())
                .transpose()?,
            language: named
                .text(ParamName::Locale)
                .map(|tag| timestamp::parse_locale(&tag))
                .transpose()?
                .unwrap_or_default(),
        };
        let millis = timestamp::parse_timestamp(&args[0].canonical(), pattern, &opts)?;
        Ok(DynamicValue::number(Decimal::from(millis)))
    }

    fn assign_to_group(
        &mut self,
        frame: &mut Frame<'_>,
        arg: &Expr,
    ) -> Result<DynamicValue, EvalError> {
        let group = self.eval(frame, arg)?.canonical().to_lowercase();
        if !self.evaluator.resources.groups.group_exists(&group)? {
            return Err(EvalError::not_found(format!(
                "Group passed to ASSIGN_TO_GROUP {} does not exist.",
                group
            )));
        }
        if !within_group(&group, frame.group) {
            return Err(EvalError::invalid_arguments(format!(
                "Group passed to ASSIGN_TO_GROUP {} is not a child of the pipeline group context {}.",
                group, frame.group
            )));
        }
        Ok(DynamicValue::string(group).with_role(OutputRole::GroupId))
    }
}

fn switch_matches(subject: &DynamicValue, candidate: &DynamicValue, ignore_case: bool) -> bool {
    if subject.is_error() || candidate.is_error() {
        return false;
    }
    match (&subject.value, &candidate.value) {
        (Value::String(a), Value::String(b)) if ignore_case => a.to_lowercase() == b.to_lowercase(),
        _ => subject.canonical() == candidate.canonical(),
    }
}

/// A non-negative whole number argument.
fn whole(v: &DynamicValue, name: ParamName) -> Result<usize, EvalError> {
    match &v.value {
        Value::Number(d) if d.fract().is_zero() => d.to_usize(),
        _ => None,
    }
    .ok_or_else(|| {
        EvalError::invalid_arguments(format!(
            "Parameter '{}' must be a non-negative whole number, got '{}'.",
            name.name(),
            v.canonical()
        ))
    })
}

/// True when `group` is `context` or lies beneath it.
fn within_group(group: &str, context: &str) -> bool {
    let segments = |g: &str| -> Vec<String> {
        g.split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
            .collect()
    };
    let group = segments(group);
    let context = segments(context);
    group.len() >= context.len() && group[..context.len()] == context[..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_nesting() {
        assert!(within_group("/acme/plant-1", "/acme"));
        assert!(within_group("/acme", "/ACME"));
        assert!(within_group("/acme", "/"));
        assert!(!within_group("/acme-east", "/acme"));
        assert!(!within_group("/other", "/acme"));
    }

    #[test]
    fn switch_matching() {
        let a = DynamicValue::string("Gas");
        let b = DynamicValue::string("gas");
        assert!(!switch_matches(&a, &b, false));
        assert!(switch_matches(&a, &b, true));
        assert!(switch_matches(
            &DynamicValue::number(Decimal::from(2)),
            &DynamicValue::string("2"),
            false
        ));
        let e = DynamicValue::error("x");
        assert!(!switch_matches(&e, &e, false));
    }

    #[test]
    fn whole_numbers_only() {
        let n = DynamicValue::number(Decimal::from(3));
        assert_eq!(whole(&n, ParamName::Index).unwrap(), 3);
        let f = DynamicValue::number(Decimal::new(15, 1));
        assert!(whole(&f, ParamName::Index).is_err());
        assert!(whole(&DynamicValue::string("1"), ParamName::Limit).is_err());
    }
}
