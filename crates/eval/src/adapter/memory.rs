//! In-memory resource adapter.
//!
//! Entries are scoped to a group and optionally a tenant. An entry is
//! visible from its own group and every descendant group; when several
//! entries share a name, the one in the most specific group wins. Each
//! entry holds numbered versions, optionally stamped with the instant they
//! became active. Product matching is enabled only when a match table is
//! present.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::resolve::{
    ActivityImpactResolver, CustomFormula, CustomFormulaResolver, FormulaParameter, GroupResolver,
    ImpactQuery, ProductMatch, ProductMatchResolver, ReferenceDatasetResolver, ReferenceQuery,
    ResolutionScope, Resolved, ResolverError, VersionSelector, PRODUCT_MATCHING_DISABLED,
};
use crate::types::DeclaredType;

fn root_group() -> String {
    "/".to_string()
}

/// A named, group-scoped resource with its versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scoped<T> {
    pub name: String,
    #[serde(default = "root_group")]
    pub group: String,
    #[serde(default)]
    pub tenant: Option<String>,
    pub versions: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaVersion {
    pub version: u32,
    #[serde(default)]
    pub active_from: Option<String>,
    pub formula: String,
    #[serde(default)]
    pub parameters: Vec<FormulaParameter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetVersion {
    pub version: u32,
    #[serde(default)]
    pub active_from: Option<String>,
    pub rows: Vec<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityVersion {
    pub version: u32,
    #[serde(default)]
    pub active_from: Option<String>,
    /// impact name → component key → value
    pub impacts: BTreeMap<String, BTreeMap<String, Decimal>>,
}

trait Versioned {
    fn version(&self) -> u32;
    fn active_from(&self) -> Option<&str>;
}

macro_rules! versioned {
    ($($t:ty),*) => {
        $(impl Versioned for $t {
            fn version(&self) -> u32 {
                self.version
            }
            fn active_from(&self) -> Option<&str> {
                self.active_from.as_deref()
            }
        })*
    };
}

versioned!(FormulaVersion, DatasetVersion, ActivityVersion);

// ──────────────────────────────────────────────
// InMemoryResources
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InMemoryResources {
    pub groups: Vec<String>,
    pub formulas: Vec<Scoped<FormulaVersion>>,
    pub datasets: Vec<Scoped<DatasetVersion>>,
    pub activities: Vec<Scoped<ActivityVersion>>,
    /// product name → matches; `None` disables product matching
    pub product_matches: Option<BTreeMap<String, Vec<ProductMatch>>>,
}

impl InMemoryResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_group(mut self, group_id: &str) -> Self {
        self.groups.push(group_id.to_lowercase());
        self
    }

    /// Add a formula version; parameters bind positionally in the order given.
    pub fn with_formula(
        mut self,
        name: &str,
        group: &str,
        version: u32,
        formula: &str,
        parameters: &[(&str, DeclaredType)],
    ) -> Self {
        let v = FormulaVersion {
            version,
            active_from: None,
            formula: formula.to_string(),
            parameters: parameters
                .iter()
                .enumerate()
                .map(|(i, (key, t))| FormulaParameter {
                    index: i as u32,
                    key: key.to_string(),
                    declared_type: *t,
                })
                .collect(),
        };
        entry(&mut self.formulas, name, group).versions.push(v);
        self
    }

    /// Add a dataset version from rows of `(column, value)` pairs.
    pub fn with_dataset(
        mut self,
        name: &str,
        group: &str,
        version: u32,
        rows: &[&[(&str, &str)]],
    ) -> Self {
        let v = DatasetVersion {
            version,
            active_from: None,
            rows: rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect()
                })
                .collect(),
        };
        entry(&mut self.datasets, name, group).versions.push(v);
        self
    }

    /// Set one impact component value, creating the activity version as needed.
    pub fn with_impact(
        mut self,
        activity: &str,
        group: &str,
        version: u32,
        impact: &str,
        component: &str,
        value: Decimal,
    ) -> Self {
        let scoped = entry(&mut self.activities, activity, group);
        let idx = match scoped.versions.iter().position(|v| v.version == version) {
            Some(i) => i,
            None => {
                scoped.versions.push(ActivityVersion {
                    version,
                    active_from: None,
                    impacts: BTreeMap::new(),
                });
                scoped.versions.len() - 1
            }
        };
        scoped.versions[idx]
            .impacts
            .entry(impact.to_string())
            .or_default()
            .insert(component.to_string(), value);
        self
    }

    /// Enable product matching and register the matches for one product.
    pub fn with_product_matches(mut self, product: &str, matches: Vec<ProductMatch>) -> Self {
        self.product_matches
            .get_or_insert_with(BTreeMap::new)
            .insert(product.to_string(), matches);
        self
    }
}

fn entry<'a, T>(entries: &'a mut Vec<Scoped<T>>, name: &str, group: &str) -> &'a mut Scoped<T> {
    let pos = entries
        .iter()
        .position(|e| e.name == name && e.group == group && e.tenant.is_none());
    let idx = match pos {
        Some(i) => i,
        None => {
            entries.push(Scoped {
                name: name.to_string(),
                group: group.to_string(),
                tenant: None,
                versions: Vec::new(),
            });
            entries.len() - 1
        }
    };
    &mut entries[idx]
}

// ──────────────────────────────────────────────
// Scope and version matching
// ──────────────────────────────────────────────

fn segments(group: &str) -> Vec<&str> {
    group.split('/').filter(|s| !s.is_empty()).collect()
}

/// Depth of `owner` when `group` is `owner` or one of its descendants.
fn visibility(owner: &str, group: &str) -> Option<usize> {
    let owner = segments(owner);
    let group = segments(group);
    if group.len() >= owner.len() && group[..owner.len()] == owner[..] {
        Some(owner.len())
    } else {
        None
    }
}

fn find<'a, T>(
    entries: &'a [Scoped<T>],
    name: &str,
    scope: &ResolutionScope<'_>,
) -> Option<&'a Scoped<T>> {
    entries
        .iter()
        .filter(|e| e.name == name && e.tenant.as_deref() == scope.tenant)
        .filter_map(|e| visibility(&e.group, scope.group).map(|depth| (depth, e)))
        .max_by_key(|(depth, _)| *depth)
        .map(|(_, e)| e)
}

/// Milliseconds since epoch for an RFC 3339 date-time or a plain date.
fn parse_instant(text: &str) -> Option<i64> {
    let t = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc().timestamp_millis());
    }
    NaiveDate::parse_from_str(t, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

fn select<'a, T: Versioned>(
    versions: &'a [T],
    selector: &VersionSelector,
) -> Result<Option<&'a T>, ResolverError> {
    let chosen = match selector {
        VersionSelector::Latest => versions.iter().max_by_key(|v| v.version()),
        VersionSelector::Exact(n) => versions.iter().find(|v| v.version() == *n),
        VersionSelector::AsAt(text) => {
            let at = parse_instant(text).ok_or_else(|| {
                ResolverError::Invalid(format!("Invalid versionAsAt instant '{}'.", text))
            })?;
            versions
                .iter()
                .filter(|v| {
                    v.active_from()
                        .and_then(parse_instant)
                        .map_or(true, |from| from <= at)
                })
                .max_by_key(|v| v.version())
        }
    };
    Ok(chosen)
}

fn describe(selector: &VersionSelector) -> String {
    match selector {
        VersionSelector::Latest => "latest version".to_string(),
        VersionSelector::Exact(n) => format!("version {}", n),
        VersionSelector::AsAt(t) => format!("version active at {}", t),
    }
}

// ──────────────────────────────────────────────
// Capabilities
// ──────────────────────────────────────────────

impl CustomFormulaResolver for InMemoryResources {
    fn resolve_formula(
        &self,
        name: &str,
        scope: &ResolutionScope<'_>,
    ) -> Result<CustomFormula, ResolverError> {
        let scoped = find(&self.formulas, name, scope).ok_or_else(|| {
            ResolverError::NotFound(format!("Custom formula '{}' not found.", name))
        })?;
        let v = select(&scoped.versions, scope.version)?.ok_or_else(|| {
            ResolverError::NotFound(format!(
                "Custom formula '{}' has no {}.",
                name,
                describe(scope.version)
            ))
        })?;
        Ok(CustomFormula {
            name: scoped.name.clone(),
            formula: v.formula.clone(),
            parameters: v.parameters.clone(),
            version: v.version,
        })
    }
}

impl ReferenceDatasetResolver for InMemoryResources {
    fn resolve_reference_value(
        &self,
        query: &ReferenceQuery<'_>,
        scope: &ResolutionScope<'_>,
    ) -> Result<Resolved<Option<String>>, ResolverError> {
        let scoped = find(&self.datasets, query.dataset, scope).ok_or_else(|| {
            ResolverError::NotFound(format!("Reference dataset '{}' not found.", query.dataset))
        })?;
        let v = select(&scoped.versions, scope.version)?.ok_or_else(|| {
            ResolverError::NotFound(format!(
                "Reference dataset '{}' has no {}.",
                query.dataset,
                describe(scope.version)
            ))
        })?;
        let value = v
            .rows
            .iter()
            .find(|row| row.get(query.key_column).map(String::as_str) == Some(query.value))
            .and_then(|row| row.get(query.output_column).cloned());
        Ok(Resolved {
            value,
            version: v.version,
        })
    }
}

impl ActivityImpactResolver for InMemoryResources {
    fn resolve_impact_component(
        &self,
        query: &ImpactQuery<'_>,
        scope: &ResolutionScope<'_>,
    ) -> Result<Resolved<Decimal>, ResolverError> {
        let scoped = find(&self.activities, query.activity, scope).ok_or_else(|| {
            ResolverError::NotFound(format!("Referenced activity '{}' not found.", query.activity))
        })?;
        let v = select(&scoped.versions, scope.version)?.ok_or_else(|| {
            ResolverError::NotFound(format!(
                "Referenced activity '{}' has no {}.",
                query.activity,
                describe(scope.version)
            ))
        })?;
        let impact = v.impacts.get(query.impact).ok_or_else(|| {
            ResolverError::NotFound(format!(
                "Referenced activity impact '{}' not found.",
                query.impact
            ))
        })?;
        let value = impact.get(query.component).ok_or_else(|| {
            ResolverError::NotFound(format!(
                "Referenced activity impact component '{}' not found.",
                query.component
            ))
        })?;
        Ok(Resolved {
            value: *value,
            version: v.version,
        })
    }
}

impl GroupResolver for InMemoryResources {
    fn group_exists(&self, group_id: &str) -> Result<bool, ResolverError> {
        Ok(group_id == "/" || self.groups.iter().any(|g| g.eq_ignore_ascii_case(group_id)))
    }
}

impl ProductMatchResolver for InMemoryResources {
    fn product_matches(&self, product: &str) -> Result<Vec<ProductMatch>, ResolverError> {
        let table = self
            .product_matches
            .as_ref()
            .ok_or_else(|| ResolverError::NotEnabled(PRODUCT_MATCHING_DISABLED.to_string()))?;
        Ok(table.get(product).cloned().unwrap_or_default())
    }
}
