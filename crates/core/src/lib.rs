//! Formula grammar for the tally row calculator.
//!
//! Formulas are small expression programs: arithmetic over decimals,
//! comparisons, `:token` references to row parameters and variables,
//! `SET` assignments, builtin function calls and `#custom(...)` calls to
//! externally stored formulas. This crate turns formula text into an AST
//! whose nodes keep the byte span of their source text, so that an
//! evaluator can key its audit trail by the exact text that was evaluated.

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;

pub use ast::{
    BinaryOp, Builtin, Call, Callee, CompareOp, Expr, ExprKind, NamedArg, ParamName, Program, Span,
};
pub use error::ParseError;
pub use parser::{parse, MAX_NESTING};
