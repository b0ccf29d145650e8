//! Output role classification.

use rust_decimal::prelude::ToPrimitive;
use tally_eval::{DeclaredType, DynamicValue, OutputRole, Value};

/// Role of an output from its position and flags.
///
/// The first output of the first formula is the row timestamp. Other
/// outputs are values unless flagged unique; a `groupId` tag set by the
/// evaluator survives on value outputs.
pub fn classify(
    formula_index: usize,
    output_index: usize,
    include_as_unique: bool,
    tagged: OutputRole,
) -> OutputRole {
    if formula_index == 0 && output_index == 0 {
        OutputRole::Time
    } else if !include_as_unique {
        if tagged == OutputRole::GroupId {
            OutputRole::GroupId
        } else {
            OutputRole::Value
        }
    } else {
        OutputRole::UniqueId
    }
}

/// A number produced for an output declared `timestamp` becomes a
/// timestamp; everything else passes through.
pub fn apply_declared_type(value: DynamicValue, declared: Option<DeclaredType>) -> DynamicValue {
    if declared != Some(DeclaredType::Timestamp) {
        return value;
    }
    if let Value::Number(d) = value.value {
        if let Some(ms) = d.trunc().to_i64() {
            return DynamicValue {
                value: Value::Timestamp(ms),
                ..value
            };
        }
    }
    value
}
