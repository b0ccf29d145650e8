//! Formula evaluator for the tally row calculator.
//!
//! Formulas are parsed by `tally-core` and walked here over a dynamically
//! typed value model. External data (stored custom formulas, reference
//! datasets, activity impact factors and group membership) is reached through
//! the capability traits in [`resolve`]; [`adapter::InMemoryResources`] is a
//! JSON-loadable implementation of all of them.

pub mod adapter;
pub mod audit;
pub mod evaluator;
pub mod json_path;
pub mod numeric;
pub mod predicate;
pub mod resolve;
pub mod text;
pub mod timestamp;
pub mod types;
pub mod units;

pub use adapter::InMemoryResources;
pub use audit::{AuditTrail, EvaluationAudit, ResourceAudit};
pub use evaluator::{
    EvaluationFailure, Evaluation, EvaluationRequest, Evaluator, EvaluatorOptions, ValueMap,
    DEFAULT_MAX_DEPTH,
};
pub use resolve::{ProductMatch, Resources, ResolverError, VersionSelector};
pub use types::{parse_decimal, DeclaredType, DynamicValue, EvalError, KeySlot, OutputRole, Value};
pub use units::UnitTable;
