//! Conversion between rule groups and alert rules.
//!
//! One rule group holds one alert rule; each member rule is one severity
//! level of the same base query.

use std::collections::BTreeMap;

use crate::error::{AlertError, Result};
use crate::expr::{join, split};
use crate::labels::{
    ALERT_FROM_LABEL, ALERT_NAME_LABEL, ALERT_SCOPE_LABEL, ALERT_TEMPLATE_LABEL, EXPR_JSON_ANNOTATION,
    MESSAGE_ANNOTATION, NAMESPACE_LABEL, SEVERITY_LABEL, VALUE_ANNOTATION, VALUE_ANNOTATION_EXPR,
};
use crate::documents::{Rule, RuleGroup};
use crate::logql::LogqlGenerator;
use crate::promql::PromqlGenerator;
use crate::types::{AlertKind, AlertLevel, AlertRule, QueryGenerator, Severity, scope_for};

/// Reads one rule group back into an alert rule.
///
/// Receivers, inhibit labels and the open flag are not stored in the group;
/// the caller fills them in from the routing document and silences.
///
/// # Errors
///
/// Returns `AlertError::MalformedGroup` if the group is empty, a member's
/// labels disagree with `namespace`, an expression has no comparison, or
/// the stored generator cannot be parsed.
pub fn group_to_rule(group: &RuleGroup, namespace: &str, kind: AlertKind) -> Result<AlertRule> {
    let first = group
        .rules
        .first()
        .ok_or_else(|| AlertError::malformed(&group.name, "rule is null"))?;

    let mut levels = Vec::with_capacity(group.rules.len());
    let mut base = None;
    for member in &group.rules {
        let label = |name: &str| member.labels.get(name).map_or("", String::as_str);
        if label(NAMESPACE_LABEL) != namespace || label(ALERT_NAME_LABEL).is_empty() {
            return Err(AlertError::malformed(&group.name, "rule label not valid"));
        }
        let parts = split(&member.expr)
            .ok_or_else(|| AlertError::malformed(&group.name, format!("expr {:?} not valid", member.expr)))?;
        let severity: Severity = label(SEVERITY_LABEL)
            .parse()
            .map_err(|e: AlertError| AlertError::malformed(&group.name, e.to_string()))?;
        levels.push(AlertLevel::new(parts.op, parts.threshold, severity));
        base.get_or_insert(parts.base);
    }

    let generator = first
        .annotations
        .get(EXPR_JSON_ANNOTATION)
        .filter(|raw| !raw.is_empty())
        .map(|raw| parse_generator(raw, kind))
        .transpose()
        .map_err(|e| AlertError::malformed(&group.name, format!("generator not valid: {e}")))?;

    Ok(AlertRule {
        namespace: namespace.to_string(),
        name: group.name.clone(),
        kind,
        expr: base.unwrap_or_default(),
        for_duration: first.for_duration.clone(),
        message: first
            .annotations
            .get(MESSAGE_ANNOTATION)
            .cloned()
            .unwrap_or_default(),
        inhibit_labels: Vec::new(),
        levels,
        receivers: Vec::new(),
        is_open: true,
        generator,
        tpl_lost: false,
        origin: None,
    })
}

fn parse_generator(raw: &str, kind: AlertKind) -> std::result::Result<QueryGenerator, serde_json::Error> {
    Ok(match kind {
        AlertKind::Monitor => QueryGenerator::Promql(serde_json::from_str::<PromqlGenerator>(raw)?),
        AlertKind::Logging => QueryGenerator::Logql(serde_json::from_str::<LogqlGenerator>(raw)?),
    })
}

/// Writes an alert rule as a rule group, one member per level.
///
/// # Errors
///
/// Returns `AlertError::SerializationError` if the generator cannot be
/// serialized.
pub fn rule_to_group(rule: &AlertRule, global_namespace: &str) -> Result<RuleGroup> {
    let generator_json = match &rule.generator {
        Some(QueryGenerator::Promql(g)) => Some(serde_json::to_string(g)?),
        Some(QueryGenerator::Logql(g)) => Some(serde_json::to_string(g)?),
        None => None,
    };

    let mut base_labels = BTreeMap::from([
        (NAMESPACE_LABEL.to_string(), rule.namespace.clone()),
        (ALERT_NAME_LABEL.to_string(), rule.name.clone()),
        (ALERT_FROM_LABEL.to_string(), rule.kind.as_str().to_string()),
        (
            ALERT_SCOPE_LABEL.to_string(),
            scope_for(&rule.namespace, global_namespace).to_string(),
        ),
    ]);
    if let Some(generator) = rule.promql_generator() {
        base_labels.insert(ALERT_TEMPLATE_LABEL.to_string(), generator.template_name());
    }

    let mut annotations = BTreeMap::from([
        (MESSAGE_ANNOTATION.to_string(), rule.message.clone()),
        (VALUE_ANNOTATION.to_string(), VALUE_ANNOTATION_EXPR.to_string()),
    ]);
    if let Some(json) = generator_json {
        annotations.insert(EXPR_JSON_ANNOTATION.to_string(), json);
    }

    let rules = rule
        .levels
        .iter()
        .map(|level| {
            let mut labels = base_labels.clone();
            labels.insert(SEVERITY_LABEL.to_string(), level.severity.as_str().to_string());
            Rule {
                alert: rule.name.clone(),
                expr: join(&rule.expr, level.compare_op, &level.compare_value),
                for_duration: rule.for_duration.clone(),
                labels,
                annotations: annotations.clone(),
            }
        })
        .collect();

    Ok(RuleGroup {
        name: rule.name.clone(),
        rules,
    })
}
