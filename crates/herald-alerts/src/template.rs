//! Query template catalog.
//!
//! Templates are addressed as `scope.resource.rule`. A scope is either
//! cluster-wide (only usable from the global namespace) or namespaced; the
//! tenant view of a catalog keeps only the namespaced scopes.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AlertError, Result};
use crate::units::parse_unit;

static TEMPLATE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\w+$").unwrap_or_else(|_| unreachable!()));

const BUILTIN_CATALOG: &str = include_str!("../templates/default.yaml");

/// Returns true if `name` is usable as a scope, resource or rule name.
#[must_use]
pub fn is_valid_template_name(name: &str) -> bool {
    TEMPLATE_NAME.is_match(name)
}

/// A fully resolved query template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromqlTemplate {
    /// Scope name.
    pub scope: String,
    /// Resource name.
    pub resource: String,
    /// Rule name.
    pub rule: String,
    /// Base query.
    pub expr: String,
    /// Display name used in generated messages.
    pub show_name: String,
    /// Labels callers may filter on.
    pub labels: Vec<String>,
    /// Declared unit; empty for none.
    pub unit: String,
    /// Whether the scope is namespaced.
    pub namespaced: bool,
}

impl PromqlTemplate {
    /// Returns the dotted `scope.resource.rule` name.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}.{}.{}", self.scope, self.resource, self.rule)
    }
}

/// Anything that can look up query templates.
pub trait TemplateSource {
    /// Returns the template at `scope.resource.rule`.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::TemplateNotFound` when no such template exists.
    fn template(&self, scope: &str, resource: &str, rule: &str) -> Result<PromqlTemplate>;
}

/// Template tree: scope, then resource, then rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateCatalog {
    /// Severity value to display name.
    #[serde(default)]
    pub severity: BTreeMap<String, String>,
    /// Operators offered to users.
    #[serde(default)]
    pub operators: Vec<String>,
    /// Scopes by name.
    #[serde(default)]
    pub scopes: BTreeMap<String, ScopeDetail>,
}

/// One scope of the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeDetail {
    /// Display name.
    #[serde(default)]
    pub show_name: String,
    /// Whether tenants may use this scope.
    #[serde(default)]
    pub namespaced: bool,
    /// Resources by name.
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceDetail>,
}

/// One resource within a scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDetail {
    /// Display name.
    #[serde(default)]
    pub show_name: String,
    /// Rules by name.
    #[serde(default)]
    pub rules: BTreeMap<String, RuleDetail>,
}

/// One rule template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDetail {
    /// Base query.
    pub expr: String,
    /// Display name.
    #[serde(default)]
    pub show_name: String,
    /// Filterable labels.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Declared unit.
    #[serde(default)]
    pub unit: String,
}

impl TemplateCatalog {
    /// Returns the catalog shipped with the crate.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded catalog is malformed.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_CATALOG)
    }

    /// Parses and validates a catalog from YAML.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::SerializationError` for malformed YAML and
    /// `AlertError::Config` for invalid entries.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let catalog: Self = serde_yaml::from_str(text)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Loads a catalog from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Config` if the file cannot be read.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| AlertError::Config {
            reason: format!("read {}: {e}", path.display()),
        })?;
        Self::from_yaml(&text)
    }

    /// Checks names, units and queries of every template.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Config` describing the first invalid entry.
    pub fn validate(&self) -> Result<()> {
        let config_err = |reason: String| AlertError::Config { reason };
        for (scope, scope_detail) in &self.scopes {
            for (resource, resource_detail) in &scope_detail.resources {
                for (rule, detail) in &resource_detail.rules {
                    let name = format!("{scope}.{resource}.{rule}");
                    for part in [scope, resource, rule] {
                        if !is_valid_template_name(part) {
                            return Err(config_err(format!("template {name}: name {part:?} not valid")));
                        }
                    }
                    if detail.expr.trim().is_empty() {
                        return Err(config_err(format!("template {name}: empty expr")));
                    }
                    parse_unit(&detail.unit)
                        .map_err(|e| config_err(format!("template {name}: {e}")))?;
                }
            }
        }
        Ok(())
    }

    /// Returns the subset of the catalog visible to tenants.
    #[must_use]
    pub fn tenant_view(&self) -> Self {
        Self {
            severity: self.severity.clone(),
            operators: self.operators.clone(),
            scopes: self
                .scopes
                .iter()
                .filter(|(_, detail)| detail.namespaced)
                .map(|(name, detail)| (name.clone(), detail.clone()))
                .collect(),
        }
    }

    /// Iterates over every template in name order.
    pub fn templates(&self) -> impl Iterator<Item = PromqlTemplate> + '_ {
        self.scopes.iter().flat_map(|(scope, scope_detail)| {
            scope_detail.resources.iter().flat_map(move |(resource, resource_detail)| {
                resource_detail.rules.iter().map(move |(rule, detail)| PromqlTemplate {
                    scope: scope.clone(),
                    resource: resource.clone(),
                    rule: rule.clone(),
                    expr: detail.expr.clone(),
                    show_name: detail.show_name.clone(),
                    labels: detail.labels.clone(),
                    unit: detail.unit.clone(),
                    namespaced: scope_detail.namespaced,
                })
            })
        })
    }
}

impl TemplateSource for TemplateCatalog {
    fn template(&self, scope: &str, resource: &str, rule: &str) -> Result<PromqlTemplate> {
        let not_found = || AlertError::TemplateNotFound {
            name: format!("{scope}.{resource}.{rule}"),
        };
        let scope_detail = self.scopes.get(scope).ok_or_else(not_found)?;
        let detail = scope_detail
            .resources
            .get(resource)
            .and_then(|r| r.rules.get(rule))
            .ok_or_else(not_found)?;

        Ok(PromqlTemplate {
            scope: scope.to_string(),
            resource: resource.to_string(),
            rule: rule.to_string(),
            expr: detail.expr.clone(),
            show_name: detail.show_name.clone(),
            labels: detail.labels.clone(),
            unit: detail.unit.clone(),
            namespaced: scope_detail.namespaced,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_parses() {
        let catalog = TemplateCatalog::builtin().unwrap();
        assert!(catalog.scopes.contains_key("system"));
        assert!(catalog.scopes.contains_key("containers"));
        assert_eq!(catalog.operators.len(), 6);
    }

    #[test]
    fn lookup_template() {
        let catalog = TemplateCatalog::builtin().unwrap();
        let tpl = catalog.template("system", "node", "statusCondition").unwrap();
        assert_eq!(tpl.expr, "kube_node_status_condition");
        assert!(tpl.labels.contains(&"condition".to_string()));
        assert!(!tpl.namespaced);
        assert_eq!(tpl.name(), "system.node.statusCondition");
    }

    #[test]
    fn lookup_missing_template() {
        let catalog = TemplateCatalog::builtin().unwrap();
        let err = catalog.template("system", "node", "nope").unwrap_err();
        assert!(matches!(err, AlertError::TemplateNotFound { .. }));
        assert!(err.to_string().contains("system.node.nope"));
    }

    #[test]
    fn tenant_view_keeps_namespaced_scopes() {
        let catalog = TemplateCatalog::builtin().unwrap();
        let tenant = catalog.tenant_view();
        assert!(!tenant.scopes.contains_key("system"));
        assert!(tenant.scopes.contains_key("containers"));
        assert_eq!(tenant.severity, catalog.severity);
        assert!(tenant.templates().all(|t| t.namespaced));
        // admin view is untouched
        assert!(catalog.scopes.contains_key("system"));
    }

    #[test]
    fn templates_iterates_every_rule() {
        let catalog = TemplateCatalog::builtin().unwrap();
        let names: Vec<String> = catalog.templates().map(|t| t.name()).collect();
        assert!(names.contains(&"containers.container.memoryUsage".to_string()));
        assert!(names.contains(&"system.cert.expirationRemainTime".to_string()));
    }

    #[test]
    fn rejects_bad_names() {
        let yaml = r"
scopes:
  bad-scope:
    resources:
      node:
        rules:
          up:
            expr: up
";
        let err = TemplateCatalog::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, AlertError::Config { .. }));
    }

    #[test]
    fn rejects_bad_units() {
        let yaml = r"
scopes:
  system:
    resources:
      node:
        rules:
          up:
            expr: up
            unit: parsecs
";
        let err = TemplateCatalog::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("parsecs"));
    }

    #[test]
    fn name_validation() {
        assert!(is_valid_template_name("cpuUsage_5m"));
        assert!(!is_valid_template_name("cpu.usage"));
        assert!(!is_valid_template_name(""));
    }
}
