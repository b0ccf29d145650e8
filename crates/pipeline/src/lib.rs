//! Row transformation pipeline for the tally calculator.
//!
//! A batch request declares typed input parameters and an ordered list of
//! formulas, each with one output. Every input row is marshalled into typed
//! parameters, each formula is evaluated against those parameters and the
//! outputs already computed for the row, and the outputs are classified by
//! role (time, value, unique id, group id) before being handed to an
//! [`sink::OutputSink`]. Per-row audit records go to an [`sink::AuditSink`].
//!
//! Errors are caught at the smallest scope: a failing formula leaves an
//! error value in its output and the row continues; a row-fatal condition
//! skips the row; the batch always completes.

pub mod audit;
pub mod classify;
pub mod config;
pub mod marshal;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod sink;
pub mod validate;

pub use audit::{AuditInput, AuditOutput, RowAuditRecord};
pub use classify::classify;
pub use config::{CalculatorConfig, ConfigError};
pub use marshal::{RawRow, RowError};
pub use pipeline::{Pipeline, TransformedRow};
pub use request::{ActionType, PipelineType, TransformRequest};
pub use response::BatchResponse;
pub use sink::{AuditSink, MemoryAudit, MemoryOutput, OutputRecord, OutputSink, SinkError};
pub use validate::{validate_request, ValidationError};

/// Parameter name under which each row's identifier is exposed to formulas.
pub const ROW_IDENTIFIER: &str = "___row_identifier___";

/// Rendered in place of an output whose formula failed.
pub const ERROR_PLACEHOLDER: &str = "___ERROR___";

/// Output key carrying each row's audit id.
pub const AUDIT_ID_KEY: &str = "auditId";
