//! Comparison of dynamic values.
//!
//! Both sides of an ordering comparison must be the same kind. Null may be
//! tested for equality against anything but cannot be ordered. Numbers and
//! timestamps compare numerically; every other kind compares by canonical
//! string.

use std::cmp::Ordering;

use tally_core::CompareOp;

use crate::types::{DynamicValue, EvalError, Value};

/// Evaluate `left <op> right`. `expression` is the source text, used in
/// error messages.
pub fn compare(
    op: CompareOp,
    left: &DynamicValue,
    right: &DynamicValue,
    expression: &str,
) -> Result<bool, EvalError> {
    match (&left.value, &right.value) {
        (Value::Error(_), _) | (_, Value::Error(_)) => {
            if op.is_equality() {
                Ok(op == CompareOp::Neq)
            } else {
                Err(EvalError::type_mismatch(format!(
                    "Logical expression '{}' cannot be compared as one side failed to evaluate.",
                    expression
                )))
            }
        }
        (Value::Null, _) | (_, Value::Null) => {
            if !op.is_equality() {
                return Err(EvalError::type_mismatch(format!(
                    "Logical expression '{}' cannot be compared only equal operation can be compared with null value.",
                    expression
                )));
            }
            let both = left.is_null() && right.is_null();
            Ok(if op == CompareOp::Eq { both } else { !both })
        }
        (l, r) if !l.same_kind(r) => Err(EvalError::type_mismatch(format!(
            "Logical expression '{}' cannot be compared as each side of the expression has different types.",
            expression
        ))),
        (l, r) => Ok(apply(op, order(l, r, left, right))),
    }
}

fn order(l: &Value, r: &Value, left: &DynamicValue, right: &DynamicValue) -> Ordering {
    match (l.numeric(), r.numeric()) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => left.canonical().cmp(&right.canonical()),
    }
}

fn apply(op: CompareOp, ord: Ordering) -> bool {
    match op {
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::Gte => ord != Ordering::Less,
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::Lte => ord != Ordering::Greater,
        CompareOp::Eq => ord == Ordering::Equal,
        CompareOp::Neq => ord != Ordering::Equal,
    }
}
