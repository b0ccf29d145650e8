/// Formula AST produced by the parser.
/// Every node carries the byte span of the source text it was parsed from.
/// No evaluation or resolution happens here -- that is the evaluator's job.
use serde::{Deserialize, Serialize};

// ──────────────────────────────────────────────
// Spans
// ──────────────────────────────────────────────

/// Half-open byte range `[start, end)` into the formula source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// The source text under this span. Out-of-range spans yield "".
    pub fn slice(self, src: &str) -> &str {
        src.get(self.start..self.end).unwrap_or("")
    }
}

// ──────────────────────────────────────────────
// Program
// ──────────────────────────────────────────────

/// A parsed formula: one or more newline-separated statements.
/// The value of the program is the value of its last statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub source: String,
    pub statements: Vec<Expr>,
}

impl Program {
    /// Source text of a node, trimmed of surrounding whitespace.
    pub fn text(&self, span: Span) -> &str {
        span.slice(&self.source).trim()
    }
}

// ──────────────────────────────────────────────
// Expressions
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Decimal literal, kept as written.
    Number(String),
    Str(String),
    Bool(bool),
    Null,
    /// `:name` reference to a parameter or variable (name without the colon).
    Var(String),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `SET :name = value`
    Set {
        name: String,
        value: Box<Expr>,
    },
    Call(Call),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Neq,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Eq => "==",
            CompareOp::Neq => "!=",
        }
    }

    /// True for `==` and `!=`, the only operators defined against null.
    pub fn is_equality(self) -> bool {
        matches!(self, CompareOp::Eq | CompareOp::Neq)
    }
}

// ──────────────────────────────────────────────
// Calls
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub callee: Callee,
    pub args: Vec<Expr>,
    pub named: Vec<NamedArg>,
}

impl Call {
    /// The expression bound to a named parameter, if present.
    pub fn named(&self, name: ParamName) -> Option<&Expr> {
        self.named.iter().find(|n| n.name == name).map(|n| &n.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callee {
    Builtin(Builtin),
    /// `#name(...)` -- an externally stored custom formula.
    Custom(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedArg {
    pub name: ParamName,
    pub value: Expr,
    pub span: Span,
}

/// Builtin functions. Names are matched case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    If,
    Coalesce,
    Concat,
    Switch,
    Ref,
    Uppercase,
    Lowercase,
    AsTimestamp,
    Convert,
    Impact,
    Lookup,
    AssignToGroup,
    Split,
    Search,
    GetValue,
    Caml,
}

/// Inclusive bounds on positional argument count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    pub max: Option<usize>,
}

impl Arity {
    const fn exactly(n: usize) -> Self {
        Arity {
            min: n,
            max: Some(n),
        }
    }

    const fn at_least(n: usize) -> Self {
        Arity { min: n, max: None }
    }

    pub fn admits(self, n: usize) -> bool {
        n >= self.min && self.max.map_or(true, |max| n <= max)
    }
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Builtin> {
        let b = match name.to_ascii_uppercase().as_str() {
            "IF" => Builtin::If,
            "COALESCE" => Builtin::Coalesce,
            "CONCAT" => Builtin::Concat,
            "SWITCH" => Builtin::Switch,
            "REF" => Builtin::Ref,
            "UPPERCASE" => Builtin::Uppercase,
            "LOWERCASE" => Builtin::Lowercase,
            "AS_TIMESTAMP" => Builtin::AsTimestamp,
            "CONVERT" => Builtin::Convert,
            "IMPACT" => Builtin::Impact,
            "LOOKUP" => Builtin::Lookup,
            "ASSIGN_TO_GROUP" => Builtin::AssignToGroup,
            "SPLIT" => Builtin::Split,
            "SEARCH" => Builtin::Search,
            "GET_VALUE" => Builtin::GetValue,
            "CAML" => Builtin::Caml,
            _ => return None,
        };
        Some(b)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::If => "IF",
            Builtin::Coalesce => "COALESCE",
            Builtin::Concat => "CONCAT",
            Builtin::Switch => "SWITCH",
            Builtin::Ref => "REF",
            Builtin::Uppercase => "UPPERCASE",
            Builtin::Lowercase => "LOWERCASE",
            Builtin::AsTimestamp => "AS_TIMESTAMP",
            Builtin::Convert => "CONVERT",
            Builtin::Impact => "IMPACT",
            Builtin::Lookup => "LOOKUP",
            Builtin::AssignToGroup => "ASSIGN_TO_GROUP",
            Builtin::Split => "SPLIT",
            Builtin::Search => "SEARCH",
            Builtin::GetValue => "GET_VALUE",
            Builtin::Caml => "CAML",
        }
    }

    pub fn arity(self) -> Arity {
        match self {
            Builtin::If => Arity::exactly(3),
            Builtin::Coalesce | Builtin::Concat | Builtin::Switch => Arity::at_least(1),
            Builtin::Ref
            | Builtin::Uppercase
            | Builtin::Lowercase
            | Builtin::AssignToGroup
            | Builtin::Caml => Arity::exactly(1),
            Builtin::AsTimestamp | Builtin::Split | Builtin::Search | Builtin::GetValue => {
                Arity::exactly(2)
            }
            Builtin::Convert | Builtin::Impact => Arity::exactly(3),
            Builtin::Lookup => Arity::exactly(4),
        }
    }

    /// Whether this builtin accepts the named optional parameter.
    pub fn accepts(self, param: ParamName) -> bool {
        use ParamName::*;
        match self {
            Builtin::AsTimestamp => matches!(param, Locale | Timezone | RoundDownTo),
            Builtin::Convert => param == QuantityKind,
            Builtin::Switch => matches!(param, IgnoreCase | DefaultValue),
            Builtin::Search => param == IgnoreCase,
            Builtin::Split => matches!(param, Limit | Index),
            Builtin::Impact | Builtin::Lookup => param.is_resource_scope(),
            _ => false,
        }
    }
}

/// Names of the optional `name=value` parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamName {
    Locale,
    Timezone,
    RoundDownTo,
    Group,
    Tenant,
    Version,
    VersionAsAt,
    IgnoreCase,
    DefaultValue,
    QuantityKind,
    Limit,
    Index,
}

impl ParamName {
    /// Case-insensitive lookup, including the legacy spellings
    /// `default` and `qualityKind`.
    pub fn from_name(name: &str) -> Option<ParamName> {
        let p = match name.to_ascii_lowercase().as_str() {
            "locale" => ParamName::Locale,
            "timezone" => ParamName::Timezone,
            "rounddownto" => ParamName::RoundDownTo,
            "group" => ParamName::Group,
            "tenant" => ParamName::Tenant,
            "version" => ParamName::Version,
            "versionasat" => ParamName::VersionAsAt,
            "ignorecase" => ParamName::IgnoreCase,
            "default" | "defaultvalue" => ParamName::DefaultValue,
            "quantitykind" | "qualitykind" => ParamName::QuantityKind,
            "limit" => ParamName::Limit,
            "index" => ParamName::Index,
            _ => return None,
        };
        Some(p)
    }

    pub fn name(self) -> &'static str {
        match self {
            ParamName::Locale => "locale",
            ParamName::Timezone => "timezone",
            ParamName::RoundDownTo => "roundDownTo",
            ParamName::Group => "group",
            ParamName::Tenant => "tenant",
            ParamName::Version => "version",
            ParamName::VersionAsAt => "versionAsAt",
            ParamName::IgnoreCase => "ignoreCase",
            ParamName::DefaultValue => "defaultValue",
            ParamName::QuantityKind => "quantityKind",
            ParamName::Limit => "limit",
            ParamName::Index => "index",
        }
    }

    /// Parameters that scope an external resource lookup.
    pub fn is_resource_scope(self) -> bool {
        matches!(
            self,
            ParamName::Group | ParamName::Tenant | ParamName::Version | ParamName::VersionAsAt
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_names_are_case_insensitive() {
        assert_eq!(Builtin::from_name("as_timestamp"), Some(Builtin::AsTimestamp));
        assert_eq!(Builtin::from_name("Concat"), Some(Builtin::Concat));
        assert_eq!(Builtin::from_name("caml"), Some(Builtin::Caml));
        assert_eq!(Builtin::from_name("camel"), None);
    }

    #[test]
    fn legacy_param_spellings() {
        assert_eq!(ParamName::from_name("default"), Some(ParamName::DefaultValue));
        assert_eq!(ParamName::from_name("qualityKind"), Some(ParamName::QuantityKind));
        assert_eq!(ParamName::from_name("roundDownTo"), Some(ParamName::RoundDownTo));
    }

    #[test]
    fn arity_bounds() {
        assert!(Builtin::If.arity().admits(3));
        assert!(!Builtin::If.arity().admits(2));
        assert!(Builtin::Coalesce.arity().admits(7));
        assert!(!Builtin::Lookup.arity().admits(3));
    }

    #[test]
    fn span_slicing() {
        let src = "set :a = 10";
        assert_eq!(Span::new(4, 6).slice(src), ":a");
        assert_eq!(Span::new(4, 6).to(Span::new(9, 11)), Span::new(4, 11));
        assert_eq!(Span::new(40, 60).slice(src), "");
    }
}
