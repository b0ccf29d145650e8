//! Resource resolution contracts.
//!
//! Formulas reach outside the row through five capabilities: stored custom
//! formulas, reference dataset lookups, activity impact components, group
//! existence and product matching. Each lookup is scoped by group, optional tenant and a
//! version selector. Implementations are synchronous; callers that need
//! concurrency evaluate rows in parallel instead.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{DeclaredType, DynamicValue, EvalError, Value};

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors a resolver can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolverError {
    /// The requested resource does not exist in scope.
    #[error("{0}")]
    NotFound(String),
    /// The request itself is malformed (bad version, bad instant).
    #[error("{0}")]
    Invalid(String),
    /// The capability is switched off for this deployment or tenant.
    #[error("{0}")]
    NotEnabled(String),
    /// The backing store failed.
    #[error("resource backend error: {0}")]
    Backend(String),
}

// ──────────────────────────────────────────────
// Version selection
// ──────────────────────────────────────────────

/// Which version of a resource to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VersionSelector {
    #[default]
    Latest,
    Exact(u32),
    /// The version active at the given instant (ISO-8601 date or date-time).
    AsAt(String),
}

impl VersionSelector {
    /// Build a selector from the `version` / `versionAsAt` named parameters.
    /// Supplying both is an error; `version='latest'` means [`Latest`].
    ///
    /// [`Latest`]: VersionSelector::Latest
    pub fn from_params(
        version: Option<&DynamicValue>,
        as_at: Option<&DynamicValue>,
    ) -> Result<Self, EvalError> {
        let version = version.filter(|v| !v.is_null());
        let as_at = as_at.filter(|v| !v.is_null());
        match (version, as_at) {
            (Some(_), Some(_)) => Err(EvalError::invalid_arguments(
                "Version and VersionAsAt are mutually exclusive parameters, specify one or the other.",
            )),
            (Some(v), None) => {
                let text = v.canonical();
                if text.eq_ignore_ascii_case("latest") {
                    return Ok(VersionSelector::Latest);
                }
                let n = match &v.value {
                    Value::Number(d) if d.fract().is_zero() => d.to_u32(),
                    _ => text.trim().parse::<u32>().ok(),
                };
                n.map(VersionSelector::Exact).ok_or_else(|| {
                    EvalError::invalid_arguments(format!(
                        "Version '{}' must be a positive whole number or 'latest'.",
                        text
                    ))
                })
            }
            (None, Some(t)) => Ok(VersionSelector::AsAt(t.canonical())),
            (None, None) => Ok(VersionSelector::Latest),
        }
    }

    /// The explicitly requested version number, if any.
    pub fn requested(&self) -> Option<u32> {
        match self {
            VersionSelector::Exact(n) => Some(*n),
            _ => None,
        }
    }
}

/// Scope applied to every resolution call.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionScope<'a> {
    pub group: &'a str,
    pub tenant: Option<&'a str>,
    pub version: &'a VersionSelector,
}

/// A resolved value together with the version it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub version: u32,
}

// ──────────────────────────────────────────────
// Resources
// ──────────────────────────────────────────────

/// A stored custom formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFormula {
    pub name: String,
    pub formula: String,
    #[serde(default)]
    pub parameters: Vec<FormulaParameter>,
    pub version: u32,
}

/// A declared parameter of a custom formula, bound positionally by `index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaParameter {
    pub index: u32,
    pub key: String,
    #[serde(rename = "type")]
    pub declared_type: DeclaredType,
}

/// `LOOKUP(value, dataset, keyColumn, outputColumn)`
#[derive(Debug, Clone, Copy)]
pub struct ReferenceQuery<'a> {
    pub dataset: &'a str,
    pub value: &'a str,
    pub key_column: &'a str,
    pub output_column: &'a str,
}

/// One industry classification a product name matched, best match first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductMatch {
    pub title: String,
    pub naics_code: String,
    pub bea_code: String,
    pub confidence: f64,
    pub co2e_per_dollar: f64,
}

/// `IMPACT(activity, impact, component)`
#[derive(Debug, Clone, Copy)]
pub struct ImpactQuery<'a> {
    pub activity: &'a str,
    pub impact: &'a str,
    pub component: &'a str,
}

// ──────────────────────────────────────────────
// Traits
// ──────────────────────────────────────────────

/// Supplies stored custom formulas by name.
pub trait CustomFormulaResolver {
    fn resolve_formula(
        &self,
        name: &str,
        scope: &ResolutionScope<'_>,
    ) -> Result<CustomFormula, ResolverError>;
}

/// Looks up one cell of a reference dataset. `None` means the key has no row
/// or the row has no value in the output column.
pub trait ReferenceDatasetResolver {
    fn resolve_reference_value(
        &self,
        query: &ReferenceQuery<'_>,
        scope: &ResolutionScope<'_>,
    ) -> Result<Resolved<Option<String>>, ResolverError>;
}

/// Looks up the numeric value of an activity impact component.
pub trait ActivityImpactResolver {
    fn resolve_impact_component(
        &self,
        query: &ImpactQuery<'_>,
        scope: &ResolutionScope<'_>,
    ) -> Result<Resolved<Decimal>, ResolverError>;
}

/// Answers whether a group id exists.
pub trait GroupResolver {
    fn group_exists(&self, group_id: &str) -> Result<bool, ResolverError>;
}

/// Matches a free-text product name to industry classifications for
/// spend-based estimates (`CAML(productName)`).
pub trait ProductMatchResolver {
    fn product_matches(&self, product: &str) -> Result<Vec<ProductMatch>, ResolverError>;
}

/// The capabilities an evaluator resolves against.
#[derive(Clone, Copy)]
pub struct Resources<'r> {
    pub formulas: &'r dyn CustomFormulaResolver,
    pub datasets: &'r dyn ReferenceDatasetResolver,
    pub impacts: &'r dyn ActivityImpactResolver,
    pub groups: &'r dyn GroupResolver,
    pub products: &'r dyn ProductMatchResolver,
}

impl<'r> Resources<'r> {
    /// Use one provider for every capability.
    pub fn from_provider<P>(provider: &'r P) -> Self
    where
        P: CustomFormulaResolver
            + ReferenceDatasetResolver
            + ActivityImpactResolver
            + GroupResolver
            + ProductMatchResolver,
    {
        Resources {
            formulas: provider,
            datasets: provider,
            impacts: provider,
            groups: provider,
            products: provider,
        }
    }

    /// Resources where every lookup fails as not found.
    pub fn none() -> Resources<'static> {
        Resources::from_provider(&NoResources)
    }
}

/// A provider with nothing in it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResources;

impl CustomFormulaResolver for NoResources {
    fn resolve_formula(
        &self,
        name: &str,
        _scope: &ResolutionScope<'_>,
    ) -> Result<CustomFormula, ResolverError> {
        Err(ResolverError::NotFound(format!(
            "Custom formula '{}' not found.",
            name
        )))
    }
}

impl ReferenceDatasetResolver for NoResources {
    fn resolve_reference_value(
        &self,
        query: &ReferenceQuery<'_>,
        _scope: &ResolutionScope<'_>,
    ) -> Result<Resolved<Option<String>>, ResolverError> {
        Err(ResolverError::NotFound(format!(
            "Reference dataset '{}' not found.",
            query.dataset
        )))
    }
}

impl ActivityImpactResolver for NoResources {
    fn resolve_impact_component(
        &self,
        query: &ImpactQuery<'_>,
        _scope: &ResolutionScope<'_>,
    ) -> Result<Resolved<Decimal>, ResolverError> {
        Err(ResolverError::NotFound(format!(
            "Referenced activity '{}' not found.",
            query.activity
        )))
    }
}

impl GroupResolver for NoResources {
    fn group_exists(&self, _group_id: &str) -> Result<bool, ResolverError> {
        Ok(false)
    }
}

impl ProductMatchResolver for NoResources {
    fn product_matches(&self, _product: &str) -> Result<Vec<ProductMatch>, ResolverError> {
        Err(ResolverError::NotEnabled(PRODUCT_MATCHING_DISABLED.to_string()))
    }
}

/// Reported by providers with product matching switched off.
pub const PRODUCT_MATCHING_DISABLED: &str = "CaML feature is not enabled for this tenant.";
