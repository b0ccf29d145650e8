//! Value model and error taxonomy for the formula evaluator.

pub mod values;

use tally_core::ParseError;

pub use values::{parse_decimal, DeclaredType, DynamicValue, KeySlot, OutputRole, Value};

use crate::resolve::ResolverError;

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors that can occur during formula evaluation.
///
/// Messages are user facing: they end up in pipeline error lists and in
/// audit records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    /// The formula text does not parse.
    #[error("{0}")]
    Parse(#[from] ParseError),
    /// An operand or argument has the wrong type.
    #[error("{message}")]
    TypeMismatch { message: String },
    /// Malformed argument list or argument value.
    #[error("{message}")]
    InvalidArguments { message: String },
    /// A `:token` is neither a parameter nor a variable.
    #[error("Provided token '{name}' not found as a pipeline parameter or variable.")]
    UnknownToken { name: String },
    /// `SET` targeted a name that is a parameter.
    #[error("Provided token '{name}' is already being used as a pipeline parameter.")]
    ParameterCollision { name: String },
    #[error("Unit '{unit}' ('{quantity_kind}' quantity kind) not recognized.")]
    UnitNotRecognized { unit: String, quantity_kind: String },
    #[error("Unit '{from}' cannot be converted to '{to}'.")]
    Inconvertible { from: String, to: String },
    /// SWITCH found no matching case and has no default.
    #[error("No possible result identified based on the provided expression to evaluate.")]
    NoMatch,
    /// An external resource (formula, dataset, activity, group) is missing.
    #[error("{message}")]
    NotFound { message: String },
    /// A resolver backend failed for reasons other than a missing resource.
    #[error("{message}")]
    Resolution { message: String },
    /// Numeric overflow during arithmetic.
    #[error("{message}")]
    Overflow { message: String },
    #[error("Division by zero in '{expression}'.")]
    DivisionByZero { expression: String },
    /// Custom formulas nested deeper than the configured limit.
    #[error("Custom formula nesting exceeded the limit of {limit} levels.")]
    RecursionLimitExceeded { limit: usize },
}

impl EvalError {
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        EvalError::TypeMismatch {
            message: message.into(),
        }
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        EvalError::InvalidArguments {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        EvalError::NotFound {
            message: message.into(),
        }
    }

    pub fn overflow(message: impl Into<String>) -> Self {
        EvalError::Overflow {
            message: message.into(),
        }
    }
}

impl From<ResolverError> for EvalError {
    fn from(e: ResolverError) -> Self {
        match e {
            ResolverError::NotFound(message) => EvalError::NotFound { message },
            ResolverError::Invalid(message) => EvalError::InvalidArguments { message },
            ResolverError::NotEnabled(message) | ResolverError::Backend(message) => {
                EvalError::Resolution { message }
            }
        }
    }
}
